use sea_orm_migration::prelude::*;

use super::m20260712_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(AccessPasses::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AccessPasses::Id).string().not_null().primary_key(),
          )
          .col(ColumnDef::new(AccessPasses::UserId).string().not_null())
          .col(ColumnDef::new(AccessPasses::PassType).text().not_null())
          .col(ColumnDef::new(AccessPasses::Status).text().not_null())
          .col(
            ColumnDef::new(AccessPasses::CurrentPeriodStart)
              .date_time()
              .not_null(),
          )
          .col(
            ColumnDef::new(AccessPasses::CurrentPeriodEnd).date_time().null(),
          )
          .col(
            ColumnDef::new(AccessPasses::CancelAtPeriodEnd)
              .boolean()
              .not_null(),
          )
          .col(
            ColumnDef::new(AccessPasses::PriceAmount).big_integer().not_null(),
          )
          .col(ColumnDef::new(AccessPasses::Currency).string().not_null())
          .col(ColumnDef::new(AccessPasses::BillingInterval).string().not_null())
          .col(
            ColumnDef::new(AccessPasses::TotalDownloads)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AccessPasses::DownloadsThisPeriod)
              .big_integer()
              .not_null(),
          )
          .col(ColumnDef::new(AccessPasses::LastDownloadAt).date_time().null())
          .col(
            ColumnDef::new(AccessPasses::StripeSubscriptionId).string().null(),
          )
          .col(ColumnDef::new(AccessPasses::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_access_passes_user")
              .from(AccessPasses::Table, AccessPasses::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_access_passes_user")
          .table(AccessPasses::Table)
          .col(AccessPasses::UserId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(AccessPasses::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum AccessPasses {
  Table,
  Id,
  UserId,
  PassType,
  Status,
  CurrentPeriodStart,
  CurrentPeriodEnd,
  CancelAtPeriodEnd,
  PriceAmount,
  Currency,
  BillingInterval,
  TotalDownloads,
  DownloadsThisPeriod,
  LastDownloadAt,
  StripeSubscriptionId,
  CreatedAt,
}
