//! Minimal Stripe API client.
//!
//! Only the two lookups order completion needs: the service never creates
//! charges, it just confirms state and carries the provider ids into
//! license/pass metadata. Requires STRIPE_API_KEY.

use reqwest::Client;
use serde::Deserialize;

use crate::prelude::*;

pub const API_URL: &str = "https://api.stripe.com/v1/";

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
  pub id: String,
  pub status: String,
  pub amount: i64,
  pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
  pub id: String,
  pub status: String,
  pub current_period_end: Option<i64>,
  pub cancel_at_period_end: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
  message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  error: ApiError,
}

pub struct Stripe {
  client: Client,
  secret_key: String,
}

impl Stripe {
  pub fn new(secret_key: String) -> Self {
    Self { client: Client::new(), secret_key }
  }

  pub async fn payment_intent(&self, id: &str) -> Result<PaymentIntent> {
    self.get(&format!("payment_intents/{id}")).await
  }

  #[allow(dead_code)]
  pub async fn subscription(&self, id: &str) -> Result<Subscription> {
    self.get(&format!("subscriptions/{id}")).await
  }

  async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
    let response = self
      .client
      .get(format!("{API_URL}{path}"))
      .bearer_auth(&self.secret_key)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let message = response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error.message)
        .unwrap_or_else(|| "unknown error".into());
      return Err(Error::Payment(format!("{status}: {message}")));
    }

    Ok(response.json().await?)
  }
}
