use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PassType {
  #[sea_orm(string_value = "monthly")]
  #[default]
  Monthly,
  #[sea_orm(string_value = "yearly")]
  Yearly,
  #[sea_orm(string_value = "lifetime")]
  Lifetime,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
  #[sea_orm(string_value = "active")]
  #[default]
  Active,
  #[sea_orm(string_value = "cancelled")]
  Cancelled,
  #[sea_orm(string_value = "expired")]
  Expired,
  #[sea_orm(string_value = "past_due")]
  PastDue,
  #[sea_orm(string_value = "paused")]
  Paused,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "access_passes")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub user_id: String,
  pub pass_type: PassType,
  pub status: PassStatus,
  pub current_period_start: DateTime,
  /// NULL for lifetime passes.
  pub current_period_end: Option<DateTime>,
  pub cancel_at_period_end: bool,
  pub price_amount: i64,
  pub currency: String,
  pub billing_interval: String,
  pub total_downloads: i64,
  pub downloads_this_period: i64,
  pub last_download_at: Option<DateTime>,
  pub stripe_subscription_id: Option<String>,
  pub created_at: DateTime,
}

impl Model {
  /// A pass grants downloads iff it is lifetime or its period end is still
  /// in the future. Lapsing is observed here at read time, the stored
  /// status is not proactively transitioned.
  pub fn period_valid(&self, now: DateTime) -> bool {
    self.pass_type == PassType::Lifetime
      || self.current_period_end.is_some_and(|end| end > now)
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::UserId",
    to = "user::Column::Id"
  )]
  User,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
