use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{license::LicenseType, order, product};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub order_id: String,
  pub product_id: String,
  pub license_type: LicenseType,
  pub quantity: i32,
  pub unit_amount: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "order::Entity",
    from = "Column::OrderId",
    to = "order::Column::Id"
  )]
  Order,
  #[sea_orm(
    belongs_to = "product::Entity",
    from = "Column::ProductId",
    to = "product::Column::Id"
  )]
  Product,
}

impl Related<order::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Order.def()
  }
}

impl Related<product::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Product.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
