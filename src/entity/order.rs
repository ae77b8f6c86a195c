use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{order_item, user};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "paid")]
  Paid,
  #[sea_orm(string_value = "completed")]
  Completed,
  #[sea_orm(string_value = "cancelled")]
  Cancelled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub user_id: String,
  pub status: OrderStatus,
  pub stripe_payment_intent_id: Option<String>,
  pub total_amount: i64,
  pub currency: String,
  pub created_at: DateTime,
  pub completed_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::UserId",
    to = "user::Column::Id"
  )]
  User,
  #[sea_orm(has_many = "order_item::Entity")]
  Items,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl Related<order_item::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Items.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
