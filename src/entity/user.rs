use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{access_pass, license, order};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub email: String,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "license::Entity")]
  Licenses,
  #[sea_orm(has_many = "access_pass::Entity")]
  AccessPasses,
  #[sea_orm(has_many = "order::Entity")]
  Orders,
}

impl Related<license::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Licenses.def()
  }
}

impl Related<access_pass::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::AccessPasses.def()
  }
}

impl Related<order::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Orders.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
