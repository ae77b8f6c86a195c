use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Products::Table)
          .if_not_exists()
          .col(ColumnDef::new(Products::Id).string().not_null().primary_key())
          .col(ColumnDef::new(Products::Title).string().not_null())
          .col(ColumnDef::new(Products::FilePath).string().not_null())
          .col(ColumnDef::new(Products::FileSize).big_integer().null())
          .col(ColumnDef::new(Products::PriceAmount).big_integer().not_null())
          .col(ColumnDef::new(Products::Currency).string().not_null())
          .col(ColumnDef::new(Products::IsActive).boolean().not_null())
          .col(ColumnDef::new(Products::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Products::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Products {
  Table,
  Id,
  Title,
  FilePath,
  FileSize,
  PriceAmount,
  Currency,
  IsActive,
  CreatedAt,
}
