use sea_orm_migration::prelude::*;

use super::{
  m20260712_000001_create_users::Users,
  m20260712_000002_create_products::Products,
  m20260712_000003_create_orders::Orders,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Licenses::Table)
          .if_not_exists()
          .col(ColumnDef::new(Licenses::Key).string().not_null().primary_key())
          .col(ColumnDef::new(Licenses::UserId).string().not_null())
          .col(ColumnDef::new(Licenses::ProductId).string().not_null())
          .col(ColumnDef::new(Licenses::OrderId).string().null())
          .col(ColumnDef::new(Licenses::LicenseType).text().not_null())
          .col(ColumnDef::new(Licenses::Status).text().not_null())
          .col(ColumnDef::new(Licenses::DownloadCount).big_integer().not_null())
          .col(ColumnDef::new(Licenses::DownloadLimit).big_integer().null())
          .col(ColumnDef::new(Licenses::IssuedAt).date_time().not_null())
          .col(ColumnDef::new(Licenses::ExpiresAt).date_time().null())
          .col(ColumnDef::new(Licenses::LastDownloadAt).date_time().null())
          .col(ColumnDef::new(Licenses::PriceAmount).big_integer().null())
          .col(ColumnDef::new(Licenses::Currency).string().null())
          .col(ColumnDef::new(Licenses::StripePaymentIntentId).string().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_licenses_user")
              .from(Licenses::Table, Licenses::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_licenses_product")
              .from(Licenses::Table, Licenses::ProductId)
              .to(Products::Table, Products::Id),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_licenses_order")
              .from(Licenses::Table, Licenses::OrderId)
              .to(Orders::Table, Orders::Id),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_licenses_user")
          .table(Licenses::Table)
          .col(Licenses::UserId)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_licenses_user_product")
          .table(Licenses::Table)
          .col(Licenses::UserId)
          .col(Licenses::ProductId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Licenses::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Licenses {
  Table,
  Key,
  UserId,
  ProductId,
  OrderId,
  LicenseType,
  Status,
  DownloadCount,
  DownloadLimit,
  IssuedAt,
  ExpiresAt,
  LastDownloadAt,
  PriceAmount,
  Currency,
  StripePaymentIntentId,
}
