pub use std::{sync::Arc, time::Duration};

pub use chrono::{NaiveDateTime as DateTime, TimeDelta, Utc};
pub use sea_orm::{
  ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, Database,
  DatabaseConnection, EntityTrait, NotSet, PaginatorTrait, QueryFilter,
  QueryOrder, Set, TransactionTrait,
};
pub use sea_orm_migration::MigratorTrait;
pub use tracing::{debug, error, info, trace, warn};

pub use crate::error::{Error, Result};
