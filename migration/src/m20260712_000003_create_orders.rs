use sea_orm_migration::prelude::*;

use super::{
  m20260712_000001_create_users::Users,
  m20260712_000002_create_products::Products,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Orders::Table)
          .if_not_exists()
          .col(ColumnDef::new(Orders::Id).string().not_null().primary_key())
          .col(ColumnDef::new(Orders::UserId).string().not_null())
          .col(ColumnDef::new(Orders::Status).text().not_null())
          .col(ColumnDef::new(Orders::StripePaymentIntentId).string().null())
          .col(ColumnDef::new(Orders::TotalAmount).big_integer().not_null())
          .col(ColumnDef::new(Orders::Currency).string().not_null())
          .col(ColumnDef::new(Orders::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Orders::CompletedAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_orders_user")
              .from(Orders::Table, Orders::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_orders_user")
          .table(Orders::Table)
          .col(Orders::UserId)
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(OrderItems::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(OrderItems::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(OrderItems::OrderId).string().not_null())
          .col(ColumnDef::new(OrderItems::ProductId).string().not_null())
          .col(ColumnDef::new(OrderItems::LicenseType).text().not_null())
          .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
          .col(ColumnDef::new(OrderItems::UnitAmount).big_integer().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_order_items_order")
              .from(OrderItems::Table, OrderItems::OrderId)
              .to(Orders::Table, Orders::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_order_items_product")
              .from(OrderItems::Table, OrderItems::ProductId)
              .to(Products::Table, Products::Id),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_order_items_order")
          .table(OrderItems::Table)
          .col(OrderItems::OrderId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(OrderItems::Table).to_owned())
      .await?;
    manager.drop_table(Table::drop().table(Orders::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Orders {
  Table,
  Id,
  UserId,
  Status,
  StripePaymentIntentId,
  TotalAmount,
  Currency,
  CreatedAt,
  CompletedAt,
}

#[derive(DeriveIden)]
pub enum OrderItems {
  Table,
  Id,
  OrderId,
  ProductId,
  LicenseType,
  Quantity,
  UnitAmount,
}
