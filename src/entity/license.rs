use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum LicenseType {
  #[sea_orm(string_value = "basic")]
  #[default]
  Basic,
  #[sea_orm(string_value = "extended")]
  Extended,
  /// Routed to access-pass creation at issuance; never stored on a license.
  #[sea_orm(string_value = "access_pass")]
  AccessPass,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
  #[sea_orm(string_value = "active")]
  #[default]
  Active,
  #[sea_orm(string_value = "suspended")]
  Suspended,
  #[sea_orm(string_value = "expired")]
  Expired,
  #[sea_orm(string_value = "revoked")]
  Revoked,
}

impl std::fmt::Display for LicenseStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      LicenseStatus::Active => "active",
      LicenseStatus::Suspended => "suspended",
      LicenseStatus::Expired => "expired",
      LicenseStatus::Revoked => "revoked",
    };
    f.write_str(s)
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "licenses")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub key: String,
  pub user_id: String,
  pub product_id: String,
  pub order_id: Option<String>,
  pub license_type: LicenseType,
  pub status: LicenseStatus,
  pub download_count: i64,
  pub download_limit: Option<i64>,
  pub issued_at: DateTime,
  pub expires_at: Option<DateTime>,
  pub last_download_at: Option<DateTime>,
  pub price_amount: Option<i64>,
  pub currency: Option<String>,
  pub stripe_payment_intent_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::user::Entity",
    from = "Column::UserId",
    to = "super::user::Column::Id"
  )]
  User,
  #[sea_orm(
    belongs_to = "super::product::Entity",
    from = "Column::ProductId",
    to = "super::product::Column::Id"
  )]
  Product,
  #[sea_orm(
    belongs_to = "super::order::Entity",
    from = "Column::OrderId",
    to = "super::order::Column::Id"
  )]
  Order,
  #[sea_orm(has_many = "super::download_event::Entity")]
  DownloadEvents,
}

impl Related<super::user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl Related<super::product::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Product.def()
  }
}

impl Related<super::download_event::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::DownloadEvents.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
