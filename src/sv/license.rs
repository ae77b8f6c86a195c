use rand::Rng;

use crate::{
  entity::{
    LicenseStatus, LicenseType, PassType, license, order, order_item,
  },
  prelude::*,
  sv,
};

pub struct License<'a> {
  db: &'a DatabaseConnection,
}

/// Basic tier quota and validity window. Extended licenses are perpetual
/// and unlimited.
pub const BASIC_DOWNLOAD_LIMIT: i64 = 10;
pub const BASIC_VALIDITY_DAYS: i64 = 365;

const KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const KEY_ATTEMPTS: usize = 8;

/// Human-displayable key, `XXXX-XXXX-XXXX-XXXX` over `[A-Z0-9]`.
/// `gen_range` samples the charset without modulo bias.
pub fn generate_key() -> String {
  let mut rng = rand::thread_rng();

  let group = |rng: &mut rand::rngs::ThreadRng| -> String {
    (0..4)
      .map(|_| KEY_CHARSET[rng.gen_range(0..KEY_CHARSET.len())] as char)
      .collect()
  };

  (0..4).map(|_| group(&mut rng)).collect::<Vec<_>>().join("-")
}

#[derive(Debug, Clone)]
pub struct GenerateLicense {
  pub user_id: String,
  pub product_id: String,
  pub order_id: Option<String>,
  pub license_type: LicenseType,
  pub price_amount: Option<i64>,
  pub currency: Option<String>,
  pub stripe_payment_intent_id: Option<String>,
}

impl<'a> License<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn generate(
    &self,
    params: GenerateLicense,
  ) -> Result<license::Model> {
    if params.license_type == LicenseType::AccessPass {
      return Err(Error::InvalidArgs(
        "access_pass is issued as a pass, not a license".into(),
      ));
    }

    sv::User::new(self.db).require(&params.user_id).await?;
    sv::Catalog::new(self.db).require_active(&params.product_id).await?;

    let now = Utc::now().naive_utc();
    let (download_limit, expires_at) = match params.license_type {
      LicenseType::Basic => (
        Some(BASIC_DOWNLOAD_LIMIT),
        Some(now + TimeDelta::days(BASIC_VALIDITY_DAYS)),
      ),
      LicenseType::Extended => (None, None),
      LicenseType::AccessPass => unreachable!(),
    };

    let key = self.unique_key().await?;

    let license = license::ActiveModel {
      key: Set(key),
      user_id: Set(params.user_id),
      product_id: Set(params.product_id),
      order_id: Set(params.order_id),
      license_type: Set(params.license_type),
      status: Set(LicenseStatus::Active),
      download_count: Set(0),
      download_limit: Set(download_limit),
      issued_at: Set(now),
      expires_at: Set(expires_at),
      last_download_at: Set(None),
      price_amount: Set(params.price_amount),
      currency: Set(params.currency),
      stripe_payment_intent_id: Set(params.stripe_payment_intent_id),
    };

    Ok(license.insert(self.db).await?)
  }

  /// One license per item unit; `access_pass` items become a lifetime pass
  /// instead of license rows.
  pub async fn generate_for_order(
    &self,
    order: &order::Model,
    items: &[order_item::Model],
  ) -> Result<Vec<license::Model>> {
    let mut licenses = Vec::new();

    for item in items {
      if item.license_type == LicenseType::AccessPass {
        let pass = sv::AccessPass::new(self.db)
          .create(sv::access_pass::CreatePass {
            user_id: order.user_id.clone(),
            pass_type: PassType::Lifetime,
            price_amount: item.unit_amount,
            currency: order.currency.clone(),
            stripe_subscription_id: None,
          })
          .await?;
        info!("Issued access pass {} for order {}", pass.id, order.id);
        continue;
      }

      for _ in 0..item.quantity {
        let license = self
          .generate(GenerateLicense {
            user_id: order.user_id.clone(),
            product_id: item.product_id.clone(),
            order_id: Some(order.id.clone()),
            license_type: item.license_type,
            price_amount: Some(item.unit_amount),
            currency: Some(order.currency.clone()),
            stripe_payment_intent_id: order.stripe_payment_intent_id.clone(),
          })
          .await?;
        licenses.push(license);
      }
    }

    Ok(licenses)
  }

  pub async fn by_key(&self, key: &str) -> Result<Option<license::Model>> {
    let license = license::Entity::find_by_id(key).one(self.db).await?;
    Ok(license)
  }

  pub async fn by_user(&self, user_id: &str) -> Result<Vec<license::Model>> {
    Ok(
      license::Entity::find()
        .filter(license::Column::UserId.eq(user_id))
        .order_by_desc(license::Column::IssuedAt)
        .all(self.db)
        .await?,
    )
  }

  pub async fn set_status(
    &self,
    key: &str,
    status: LicenseStatus,
  ) -> Result<()> {
    let license = license::Entity::find_by_id(key)
      .one(self.db)
      .await?
      .ok_or(Error::LicenseNotFound)?;

    license::ActiveModel { status: Set(status), ..license.into() }
      .update(self.db)
      .await?;

    Ok(())
  }

  #[allow(dead_code)]
  pub async fn count_active(&self) -> Result<u64> {
    let count = license::Entity::find()
      .filter(license::Column::Status.eq(LicenseStatus::Active))
      .count(self.db)
      .await?;
    Ok(count)
  }

  /// Random keys are collision-checked against the store before use.
  async fn unique_key(&self) -> Result<String> {
    for _ in 0..KEY_ATTEMPTS {
      let key = generate_key();
      if self.by_key(&key).await?.is_none() {
        return Ok(key);
      }
      warn!("License key collision, regenerating");
    }

    Err(Error::Internal(format!(
      "no unique license key after {KEY_ATTEMPTS} attempts"
    )))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  #[test]
  fn test_key_format() {
    for _ in 0..100 {
      let key = generate_key();
      assert_eq!(key.len(), 19);

      let groups: Vec<&str> = key.split('-').collect();
      assert_eq!(groups.len(), 4);
      for group in groups {
        assert_eq!(group.len(), 4);
        assert!(
          group.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
      }
    }
  }

  #[tokio::test]
  async fn test_basic_tier_defaults() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;

    let license = License::new(&db)
      .generate(GenerateLicense {
        user_id: user.id.clone(),
        product_id: product.id.clone(),
        order_id: None,
        license_type: LicenseType::Basic,
        price_amount: Some(4900),
        currency: Some("usd".into()),
        stripe_payment_intent_id: None,
      })
      .await
      .unwrap();

    assert_eq!(license.download_limit, Some(BASIC_DOWNLOAD_LIMIT));
    assert_eq!(license.download_count, 0);
    assert_eq!(license.status, LicenseStatus::Active);

    let expires = license.expires_at.unwrap();
    let expected = license.issued_at + TimeDelta::days(BASIC_VALIDITY_DAYS);
    assert!((expires - expected).num_seconds().abs() < 5);
  }

  #[tokio::test]
  async fn test_extended_tier_is_perpetual() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;

    let license = License::new(&db)
      .generate(GenerateLicense {
        user_id: user.id.clone(),
        product_id: product.id.clone(),
        order_id: None,
        license_type: LicenseType::Extended,
        price_amount: None,
        currency: None,
        stripe_payment_intent_id: None,
      })
      .await
      .unwrap();

    assert_eq!(license.download_limit, None);
    assert_eq!(license.expires_at, None);
  }

  #[tokio::test]
  async fn test_access_pass_tier_rejected() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;

    let result = License::new(&db)
      .generate(GenerateLicense {
        user_id: user.id.clone(),
        product_id: product.id.clone(),
        order_id: None,
        license_type: LicenseType::AccessPass,
        price_amount: None,
        currency: None,
        stripe_payment_intent_id: None,
      })
      .await;

    assert!(matches!(result, Err(Error::InvalidArgs(_))));
  }

  #[tokio::test]
  async fn test_set_status() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;
    let sv = License::new(&db);

    let license = sv
      .generate(GenerateLicense {
        user_id: user.id.clone(),
        product_id: product.id.clone(),
        order_id: None,
        license_type: LicenseType::Basic,
        price_amount: None,
        currency: None,
        stripe_payment_intent_id: None,
      })
      .await
      .unwrap();

    sv.set_status(&license.key, LicenseStatus::Revoked).await.unwrap();

    let reloaded = sv.by_key(&license.key).await.unwrap().unwrap();
    assert_eq!(reloaded.status, LicenseStatus::Revoked);
  }

  #[tokio::test]
  async fn test_by_user_newest_first() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;
    let sv = License::new(&db);

    for _ in 0..3 {
      sv.generate(GenerateLicense {
        user_id: user.id.clone(),
        product_id: product.id.clone(),
        order_id: None,
        license_type: LicenseType::Extended,
        price_amount: None,
        currency: None,
        stripe_payment_intent_id: None,
      })
      .await
      .unwrap();
    }

    let licenses = sv.by_user(&user.id).await.unwrap();
    assert_eq!(licenses.len(), 3);
    for pair in licenses.windows(2) {
      assert!(pair[0].issued_at >= pair[1].issued_at);
    }
  }
}
