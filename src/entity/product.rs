use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::license;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub title: String,
  pub file_path: String,
  pub file_size: Option<i64>,
  pub price_amount: i64,
  pub currency: String,
  pub is_active: bool,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "license::Entity")]
  Licenses,
}

impl Related<license::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Licenses.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
