use std::{env, path::PathBuf};

use crate::{prelude::*, sv::Stripe};

pub struct Config {
  pub assets_dir: PathBuf,
  pub token_ttl: Duration,
  pub pending_order_ttl: Duration,
}

impl Config {
  pub fn from_env() -> Self {
    let assets_dir =
      env::var("ASSETS_DIR").unwrap_or_else(|_| "assets".into()).into();

    let token_ttl = env::var("DOWNLOAD_TOKEN_TTL")
      .ok()
      .and_then(|v| humantime::parse_duration(&v).ok())
      .unwrap_or(Duration::from_secs(24 * 3600));

    let pending_order_ttl = env::var("PENDING_ORDER_TTL")
      .ok()
      .and_then(|v| humantime::parse_duration(&v).ok())
      .unwrap_or(Duration::from_secs(24 * 3600));

    Self { assets_dir, token_ttl, pending_order_ttl }
  }
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub secret: String,
  pub config: Config,
  pub stripe: Option<Stripe>,
}

impl AppState {
  pub async fn new(db_url: &str, secret: String, config: Config) -> Self {
    let db =
      Database::connect(db_url).await.expect("Failed to connect database");
    migration::Migrator::up(&db, None).await.expect("Migration failed");

    let stripe = match env::var("STRIPE_API_KEY") {
      Ok(key) if !key.is_empty() => Some(Stripe::new(key)),
      _ => {
        warn!("STRIPE_API_KEY not set, order completion skips payment checks");
        None
      }
    };

    Self { db, secret, config, stripe }
  }
}
