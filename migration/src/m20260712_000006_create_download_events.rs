use sea_orm_migration::prelude::*;

use super::m20260712_000004_create_licenses::Licenses;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(DownloadEvents::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(DownloadEvents::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(DownloadEvents::LicenseKey).string().not_null())
          .col(
            ColumnDef::new(DownloadEvents::DownloadedAt).date_time().not_null(),
          )
          .col(ColumnDef::new(DownloadEvents::IpAddress).string().null())
          .col(ColumnDef::new(DownloadEvents::UserAgent).string().null())
          .col(ColumnDef::new(DownloadEvents::FileSize).big_integer().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_download_events_license")
              .from(DownloadEvents::Table, DownloadEvents::LicenseKey)
              .to(Licenses::Table, Licenses::Key)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_download_events_license")
          .table(DownloadEvents::Table)
          .col(DownloadEvents::LicenseKey)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(DownloadEvents::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum DownloadEvents {
  Table,
  Id,
  LicenseKey,
  DownloadedAt,
  IpAddress,
  UserAgent,
  FileSize,
}
