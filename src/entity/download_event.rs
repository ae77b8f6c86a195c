use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::license;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "download_events")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub license_key: String,
  pub downloaded_at: DateTime,
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
  pub file_size: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "license::Entity",
    from = "Column::LicenseKey",
    to = "license::Column::Key"
  )]
  License,
}

impl Related<license::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::License.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
