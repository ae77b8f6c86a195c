use serde::Serialize;

use crate::{
  entity::{
    LicenseStatus, PassStatus, PassType, access_pass, download_event, license,
  },
  prelude::*,
};

/// Entitlement resolution and download recording, spanning both grant
/// mechanisms (per-product licenses and subscription access passes).
pub struct Access<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMethod {
  License,
  AccessPass,
  None,
}

#[derive(Debug, Serialize)]
pub struct AccessDecision {
  pub can_download: bool,
  pub method: AccessMethod,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub license: Option<license::Model>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub access_pass: Option<access_pass::Model>,
}

impl AccessDecision {
  fn denied(reason: impl Into<String>) -> Self {
    Self {
      can_download: false,
      method: AccessMethod::None,
      reason: Some(reason.into()),
      license: None,
      access_pass: None,
    }
  }

  fn via_license(license: license::Model) -> Self {
    Self {
      can_download: true,
      method: AccessMethod::License,
      reason: None,
      license: Some(license),
      access_pass: None,
    }
  }

  fn via_pass(pass: access_pass::Model) -> Self {
    Self {
      can_download: true,
      method: AccessMethod::AccessPass,
      reason: None,
      license: None,
      access_pass: Some(pass),
    }
  }
}

/// Reduced shape for UI gating, no entitlement payload attached.
#[derive(Debug, Serialize)]
pub struct AccessCheck {
  pub has_access: bool,
  pub method: AccessMethod,
}

#[derive(Debug, Clone)]
pub struct RecordDownload {
  pub user_id: String,
  pub product_id: Option<String>,
  pub method: AccessMethod,
  pub license_key: Option<String>,
  pub file_size: Option<i64>,
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
}

/// Fails closed, in order: status, then expiry, then quota.
fn license_validity(
  license: &license::Model,
  now: DateTime,
) -> Option<String> {
  if license.status != LicenseStatus::Active {
    return Some(format!("License is {}", license.status));
  }

  if license.expires_at.is_some_and(|at| at < now) {
    return Some("License has expired".into());
  }

  if let Some(limit) = license.download_limit {
    if license.download_count >= limit {
      return Some("Download limit exceeded".into());
    }
  }

  None
}

impl<'a> Access<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Resolution order, first match wins: explicit license key, then any
  /// active access pass, then the active license for the product. A pass
  /// outranks the product lookup so that a subscriber with a stale
  /// product license still downloads through the pass.
  pub async fn validate_download_access(
    &self,
    user_id: &str,
    product_id: Option<&str>,
    license_key: Option<&str>,
  ) -> Result<AccessDecision> {
    let now = Utc::now().naive_utc();

    if let Some(key) = license_key {
      let Some(license) = license::Entity::find()
        .filter(license::Column::Key.eq(key))
        .filter(license::Column::UserId.eq(user_id))
        .one(self.db)
        .await?
      else {
        return Ok(AccessDecision::denied("License not found"));
      };

      return Ok(match license_validity(&license, now) {
        Some(reason) => AccessDecision::denied(reason),
        None => AccessDecision::via_license(license),
      });
    }

    if let Some(pass) =
      crate::sv::AccessPass::new(self.db).active_for_user(user_id).await?
    {
      return Ok(AccessDecision::via_pass(pass));
    }

    if let Some(product_id) = product_id {
      let license = license::Entity::find()
        .filter(license::Column::UserId.eq(user_id))
        .filter(license::Column::ProductId.eq(product_id))
        .filter(license::Column::Status.eq(LicenseStatus::Active))
        .order_by_desc(license::Column::IssuedAt)
        .one(self.db)
        .await?;

      if let Some(license) = license {
        return Ok(match license_validity(&license, now) {
          Some(reason) => AccessDecision::denied(reason),
          None => AccessDecision::via_license(license),
        });
      }
    }

    Ok(AccessDecision::denied("No valid license or access pass found"))
  }

  /// Same policy as `validate_download_access`, expressed as existence
  /// queries so the UI gate costs one count per mechanism.
  pub async fn check_access(
    &self,
    user_id: &str,
    product_id: Option<&str>,
  ) -> Result<AccessCheck> {
    use sea_orm::sea_query::Expr;

    let now = Utc::now().naive_utc();

    let passes = access_pass::Entity::find()
      .filter(access_pass::Column::UserId.eq(user_id))
      .filter(access_pass::Column::Status.eq(PassStatus::Active))
      .filter(
        Condition::any()
          .add(access_pass::Column::PassType.eq(PassType::Lifetime))
          .add(access_pass::Column::CurrentPeriodEnd.gt(now)),
      )
      .count(self.db)
      .await?;

    if passes > 0 {
      return Ok(AccessCheck {
        has_access: true,
        method: AccessMethod::AccessPass,
      });
    }

    if let Some(product_id) = product_id {
      let licenses = license::Entity::find()
        .filter(license::Column::UserId.eq(user_id))
        .filter(license::Column::ProductId.eq(product_id))
        .filter(license::Column::Status.eq(LicenseStatus::Active))
        .filter(
          Condition::any()
            .add(license::Column::ExpiresAt.is_null())
            .add(license::Column::ExpiresAt.gt(now)),
        )
        .filter(
          Condition::any()
            .add(license::Column::DownloadLimit.is_null())
            .add(
              Expr::col(license::Column::DownloadCount)
                .lt(Expr::col(license::Column::DownloadLimit)),
            ),
        )
        .count(self.db)
        .await?;

      if licenses > 0 {
        return Ok(AccessCheck {
          has_access: true,
          method: AccessMethod::License,
        });
      }
    }

    Ok(AccessCheck { has_access: false, method: AccessMethod::None })
  }

  /// Consumption bookkeeping after an authorized download. The quota check
  /// is re-applied inside the increment itself (`download_count <
  /// download_limit` evaluated store-side), so two racers past validation
  /// cannot both claim the last unit; the loser gets
  /// `Error::DownloadLimitExceeded`.
  pub async fn record_download(&self, params: RecordDownload) -> Result<()> {
    use sea_orm::sea_query::Expr;

    let now = Utc::now().naive_utc();

    match params.method {
      AccessMethod::License => {
        let key = params.license_key.ok_or_else(|| {
          Error::InvalidArgs("license_key required to record".into())
        })?;

        let txn = self.db.begin().await?;

        let result = license::Entity::update_many()
          .col_expr(
            license::Column::DownloadCount,
            Expr::col(license::Column::DownloadCount).add(1),
          )
          .col_expr(license::Column::LastDownloadAt, Expr::value(now))
          .filter(license::Column::Key.eq(&key))
          .filter(license::Column::UserId.eq(&params.user_id))
          .filter(
            Condition::any()
              .add(license::Column::DownloadLimit.is_null())
              .add(
                Expr::col(license::Column::DownloadCount)
                  .lt(Expr::col(license::Column::DownloadLimit)),
              ),
          )
          .exec(&txn)
          .await?;

        if result.rows_affected == 0 {
          let exists = license::Entity::find()
            .filter(license::Column::Key.eq(&key))
            .filter(license::Column::UserId.eq(&params.user_id))
            .count(&txn)
            .await?;

          return Err(if exists == 0 {
            Error::LicenseNotFound
          } else {
            Error::DownloadLimitExceeded
          });
        }

        download_event::ActiveModel {
          id: NotSet,
          license_key: Set(key.clone()),
          downloaded_at: Set(now),
          ip_address: Set(params.ip_address),
          user_agent: Set(params.user_agent),
          file_size: Set(params.file_size),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        debug!(
          "Recorded download of {:?} against license {key}",
          params.product_id
        );
        Ok(())
      }
      AccessMethod::AccessPass => {
        let pass = crate::sv::AccessPass::new(self.db)
          .active_for_user(&params.user_id)
          .await?
          .ok_or(Error::PassNotFound)?;

        access_pass::Entity::update_many()
          .col_expr(
            access_pass::Column::TotalDownloads,
            Expr::col(access_pass::Column::TotalDownloads).add(1),
          )
          .col_expr(
            access_pass::Column::DownloadsThisPeriod,
            Expr::col(access_pass::Column::DownloadsThisPeriod).add(1),
          )
          .col_expr(access_pass::Column::LastDownloadAt, Expr::value(now))
          .filter(access_pass::Column::Id.eq(&pass.id))
          .exec(self.db)
          .await?;

        debug!(
          "Recorded download of {:?} against pass {}",
          params.product_id, pass.id
        );
        Ok(())
      }
      AccessMethod::None => Err(Error::InvalidArgs(
        "cannot record a download without an entitlement".into(),
      )),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    entity::LicenseType,
    sv::{
      self,
      license::{BASIC_DOWNLOAD_LIMIT, GenerateLicense},
      test_utils::test_db,
    },
  };

  async fn basic_license(
    db: &DatabaseConnection,
    user_id: &str,
    product_id: &str,
  ) -> license::Model {
    sv::License::new(db)
      .generate(GenerateLicense {
        user_id: user_id.to_string(),
        product_id: product_id.to_string(),
        order_id: None,
        license_type: LicenseType::Basic,
        price_amount: None,
        currency: None,
        stripe_payment_intent_id: None,
      })
      .await
      .unwrap()
  }

  fn record(user_id: &str, key: &str) -> RecordDownload {
    RecordDownload {
      user_id: user_id.to_string(),
      product_id: None,
      method: AccessMethod::License,
      license_key: Some(key.to_string()),
      file_size: Some(1024),
      ip_address: Some("127.0.0.1".into()),
      user_agent: Some("test".into()),
    }
  }

  #[tokio::test]
  async fn test_quota_enforced_after_limit_reached() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;
    let license = basic_license(&db, &user.id, &product.id).await;
    let access = Access::new(&db);

    for _ in 0..BASIC_DOWNLOAD_LIMIT {
      let decision = access
        .validate_download_access(&user.id, None, Some(&license.key))
        .await
        .unwrap();
      assert!(decision.can_download);
      access.record_download(record(&user.id, &license.key)).await.unwrap();
    }

    let decision = access
      .validate_download_access(&user.id, None, Some(&license.key))
      .await
      .unwrap();

    assert!(!decision.can_download);
    assert_eq!(decision.method, AccessMethod::None);
    assert_eq!(decision.reason.as_deref(), Some("Download limit exceeded"));
  }

  #[tokio::test]
  async fn test_expired_license_denied_regardless_of_quota() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;
    let license = basic_license(&db, &user.id, &product.id).await;

    let past = Utc::now().naive_utc() - TimeDelta::days(1);
    license::ActiveModel { expires_at: Set(Some(past)), ..license.into() }
      .update(&db)
      .await
      .unwrap();

    let decision = Access::new(&db)
      .validate_download_access(&user.id, Some(&product.id), None)
      .await
      .unwrap();

    assert!(!decision.can_download);
    assert_eq!(decision.reason.as_deref(), Some("License has expired"));
  }

  #[tokio::test]
  async fn test_status_outranks_expiry_in_reasons() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;
    let license = basic_license(&db, &user.id, &product.id).await;

    let past = Utc::now().naive_utc() - TimeDelta::days(1);
    license::ActiveModel {
      status: Set(LicenseStatus::Suspended),
      expires_at: Set(Some(past)),
      ..license.clone().into()
    }
    .update(&db)
    .await
    .unwrap();

    let decision = Access::new(&db)
      .validate_download_access(&user.id, None, Some(&license.key))
      .await
      .unwrap();

    assert_eq!(decision.reason.as_deref(), Some("License is suspended"));
  }

  #[tokio::test]
  async fn test_pass_outranks_expired_product_license() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;
    let license = basic_license(&db, &user.id, &product.id).await;

    let past = Utc::now().naive_utc() - TimeDelta::days(1);
    license::ActiveModel { expires_at: Set(Some(past)), ..license.into() }
      .update(&db)
      .await
      .unwrap();

    sv::AccessPass::new(&db)
      .create(sv::access_pass::CreatePass {
        user_id: user.id.clone(),
        pass_type: PassType::Lifetime,
        price_amount: 19900,
        currency: "usd".into(),
        stripe_subscription_id: None,
      })
      .await
      .unwrap();

    let decision = Access::new(&db)
      .validate_download_access(&user.id, Some(&product.id), None)
      .await
      .unwrap();

    assert!(decision.can_download);
    assert_eq!(decision.method, AccessMethod::AccessPass);
  }

  #[tokio::test]
  async fn test_foreign_license_key_not_found() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;
    let license = basic_license(&db, &user.id, &product.id).await;

    let decision = Access::new(&db)
      .validate_download_access("someone-else", None, Some(&license.key))
      .await
      .unwrap();

    assert!(!decision.can_download);
    assert_eq!(decision.reason.as_deref(), Some("License not found"));
  }

  #[tokio::test]
  async fn test_no_entitlement_reason() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;

    let decision = Access::new(&db)
      .validate_download_access(&user.id, Some(&product.id), None)
      .await
      .unwrap();

    assert!(!decision.can_download);
    assert_eq!(
      decision.reason.as_deref(),
      Some("No valid license or access pass found")
    );
  }

  #[tokio::test]
  async fn test_record_appends_history_and_counts() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;
    let license = basic_license(&db, &user.id, &product.id).await;
    let access = Access::new(&db);

    access.record_download(record(&user.id, &license.key)).await.unwrap();
    access.record_download(record(&user.id, &license.key)).await.unwrap();

    let reloaded =
      sv::License::new(&db).by_key(&license.key).await.unwrap().unwrap();
    assert_eq!(reloaded.download_count, 2);
    assert!(reloaded.last_download_at.is_some());

    let events = download_event::Entity::find()
      .filter(download_event::Column::LicenseKey.eq(&license.key))
      .all(&db)
      .await
      .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].ip_address.as_deref(), Some("127.0.0.1"));
  }

  #[tokio::test]
  async fn test_last_unit_cannot_be_claimed_twice() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;
    let license = basic_license(&db, &user.id, &product.id).await;
    let access = Access::new(&db);

    license::ActiveModel {
      download_count: Set(BASIC_DOWNLOAD_LIMIT - 1),
      ..license.clone().into()
    }
    .update(&db)
    .await
    .unwrap();

    // Both callers pass validation against the near-limit license; the
    // store-side guard lets only one recording land.
    let first = access
      .validate_download_access(&user.id, None, Some(&license.key))
      .await
      .unwrap();
    let second = access
      .validate_download_access(&user.id, None, Some(&license.key))
      .await
      .unwrap();
    assert!(first.can_download && second.can_download);

    access.record_download(record(&user.id, &license.key)).await.unwrap();
    let loser = access.record_download(record(&user.id, &license.key)).await;

    assert!(matches!(loser, Err(Error::DownloadLimitExceeded)));

    let reloaded =
      sv::License::new(&db).by_key(&license.key).await.unwrap().unwrap();
    assert_eq!(reloaded.download_count, BASIC_DOWNLOAD_LIMIT);
  }

  #[tokio::test]
  async fn test_record_against_pass_updates_usage() {
    let db = test_db::setup().await;
    let (user, _) = test_db::seed(&db).await;
    let access = Access::new(&db);

    let pass = sv::AccessPass::new(&db)
      .create(sv::access_pass::CreatePass {
        user_id: user.id.clone(),
        pass_type: PassType::Monthly,
        price_amount: 1900,
        currency: "usd".into(),
        stripe_subscription_id: None,
      })
      .await
      .unwrap();

    access
      .record_download(RecordDownload {
        user_id: user.id.clone(),
        product_id: None,
        method: AccessMethod::AccessPass,
        license_key: None,
        file_size: None,
        ip_address: None,
        user_agent: None,
      })
      .await
      .unwrap();

    let reloaded =
      sv::AccessPass::new(&db).by_id(&pass.id).await.unwrap().unwrap();
    assert_eq!(reloaded.total_downloads, 1);
    assert_eq!(reloaded.downloads_this_period, 1);
    assert!(reloaded.last_download_at.is_some());
  }

  #[tokio::test]
  async fn test_record_without_pass_is_an_error() {
    let db = test_db::setup().await;
    let (user, _) = test_db::seed(&db).await;

    let result = Access::new(&db)
      .record_download(RecordDownload {
        user_id: user.id.clone(),
        product_id: None,
        method: AccessMethod::AccessPass,
        license_key: None,
        file_size: None,
        ip_address: None,
        user_agent: None,
      })
      .await;

    assert!(matches!(result, Err(Error::PassNotFound)));
  }

  #[tokio::test]
  async fn test_check_access_matches_resolver() {
    let db = test_db::setup().await;
    let (user, product) = test_db::seed(&db).await;
    let access = Access::new(&db);

    let check =
      access.check_access(&user.id, Some(&product.id)).await.unwrap();
    assert!(!check.has_access);

    basic_license(&db, &user.id, &product.id).await;

    let check =
      access.check_access(&user.id, Some(&product.id)).await.unwrap();
    assert!(check.has_access);
    assert_eq!(check.method, AccessMethod::License);
  }

  #[tokio::test]
  async fn test_check_access_sees_pass_without_product() {
    let db = test_db::setup().await;
    let (user, _) = test_db::seed(&db).await;

    sv::AccessPass::new(&db)
      .create(sv::access_pass::CreatePass {
        user_id: user.id.clone(),
        pass_type: PassType::Yearly,
        price_amount: 9900,
        currency: "usd".into(),
        stripe_subscription_id: None,
      })
      .await
      .unwrap();

    let check = Access::new(&db).check_access(&user.id, None).await.unwrap();
    assert!(check.has_access);
    assert_eq!(check.method, AccessMethod::AccessPass);
  }
}
