use thiserror::Error;

pub type Result<T, E = self::Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user not found")]
  UserNotFound,

  #[error("product not found")]
  ProductNotFound,

  #[error("order not found")]
  OrderNotFound,

  #[error("license not found")]
  LicenseNotFound,

  #[error("access pass not found")]
  PassNotFound,

  #[error("download limit exceeded")]
  DownloadLimitExceeded,

  #[error("invalid arguments: {0}")]
  InvalidArgs(String),

  #[error("payment provider error: {0}")]
  Payment(String),

  #[error(transparent)]
  Http(#[from] reqwest::Error),

  #[error(transparent)]
  Db(#[from] sea_orm::DbErr),

  #[error("{0}")]
  Internal(String),
}
