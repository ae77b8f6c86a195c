use std::sync::Arc;

use async_trait::async_trait;

use crate::{prelude::*, state::AppState, sv};

/// Hourly sweep cancelling pending orders that never saw payment.
/// Deliberately does NOT touch access-pass period counters; passes lapse
/// at read time.
pub struct Sweep;

#[async_trait]
impl super::Plugin for Sweep {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let ttl = app.config.pending_order_ttl;
    let mut interval = tokio::time::interval(Duration::from_secs(3600));

    loop {
      interval.tick().await;

      match sv::Order::new(&app.db).cleanup_expired(ttl).await {
        Ok(0) => {}
        Ok(swept) => info!("Cancelled {swept} stale pending orders"),
        Err(err) => error!("Pending order sweep failed: {err}"),
      }
    }
  }
}
