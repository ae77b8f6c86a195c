use uuid::Uuid;

use crate::{
  entity::{PassStatus, PassType, access_pass},
  prelude::*,
  sv,
};

pub struct AccessPass<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Clone)]
pub struct CreatePass {
  pub user_id: String,
  pub pass_type: PassType,
  pub price_amount: i64,
  pub currency: String,
  pub stripe_subscription_id: Option<String>,
}

impl<'a> AccessPass<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// At most one active pass per user; enforced here by lookup, not by a
  /// store constraint.
  pub async fn create(&self, params: CreatePass) -> Result<access_pass::Model> {
    sv::User::new(self.db).require(&params.user_id).await?;

    if self.active_for_user(&params.user_id).await?.is_some() {
      return Err(Error::InvalidArgs(
        "user already has an active access pass".into(),
      ));
    }

    let now = Utc::now().naive_utc();
    let (period_end, interval) = match params.pass_type {
      PassType::Monthly => (Some(now + TimeDelta::days(30)), "month"),
      PassType::Yearly => (Some(now + TimeDelta::days(365)), "year"),
      PassType::Lifetime => (None, "once"),
    };

    let pass = access_pass::ActiveModel {
      id: Set(Uuid::new_v4().to_string()),
      user_id: Set(params.user_id),
      pass_type: Set(params.pass_type),
      status: Set(PassStatus::Active),
      current_period_start: Set(now),
      current_period_end: Set(period_end),
      cancel_at_period_end: Set(false),
      price_amount: Set(params.price_amount),
      currency: Set(params.currency),
      billing_interval: Set(interval.to_string()),
      total_downloads: Set(0),
      downloads_this_period: Set(0),
      last_download_at: Set(None),
      stripe_subscription_id: Set(params.stripe_subscription_id),
      created_at: Set(now),
    };

    Ok(pass.insert(self.db).await?)
  }

  /// Active AND within its billing period. A lapsed pass is filtered out
  /// here rather than transitioned in the store.
  pub async fn active_for_user(
    &self,
    user_id: &str,
  ) -> Result<Option<access_pass::Model>> {
    let now = Utc::now().naive_utc();

    let pass = access_pass::Entity::find()
      .filter(access_pass::Column::UserId.eq(user_id))
      .filter(access_pass::Column::Status.eq(PassStatus::Active))
      .filter(
        Condition::any()
          .add(access_pass::Column::PassType.eq(PassType::Lifetime))
          .add(access_pass::Column::CurrentPeriodEnd.gt(now)),
      )
      .order_by_desc(access_pass::Column::CreatedAt)
      .one(self.db)
      .await?;

    Ok(pass)
  }

  pub async fn by_id(&self, id: &str) -> Result<Option<access_pass::Model>> {
    let pass = access_pass::Entity::find_by_id(id).one(self.db).await?;
    Ok(pass)
  }

  pub async fn cancel(
    &self,
    id: &str,
    at_period_end: bool,
  ) -> Result<access_pass::Model> {
    let pass = self.by_id(id).await?.ok_or(Error::PassNotFound)?;

    if at_period_end && pass.pass_type == PassType::Lifetime {
      return Err(Error::InvalidArgs(
        "lifetime passes have no period end".into(),
      ));
    }

    let updated = if at_period_end {
      access_pass::ActiveModel {
        cancel_at_period_end: Set(true),
        ..pass.into()
      }
      .update(self.db)
      .await?
    } else {
      access_pass::ActiveModel {
        status: Set(PassStatus::Cancelled),
        ..pass.into()
      }
      .update(self.db)
      .await?
    };

    Ok(updated)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  fn params(user_id: &str, pass_type: PassType) -> CreatePass {
    CreatePass {
      user_id: user_id.to_string(),
      pass_type,
      price_amount: 1900,
      currency: "usd".into(),
      stripe_subscription_id: Some("sub_123".into()),
    }
  }

  #[tokio::test]
  async fn test_create_monthly_pass() {
    let db = test_db::setup().await;
    let (user, _) = test_db::seed(&db).await;

    let pass = AccessPass::new(&db)
      .create(params(&user.id, PassType::Monthly))
      .await
      .unwrap();

    assert_eq!(pass.status, PassStatus::Active);
    assert!(pass.current_period_end.is_some());
    assert_eq!(pass.billing_interval, "month");
    assert_eq!(pass.total_downloads, 0);
  }

  #[tokio::test]
  async fn test_lifetime_pass_has_no_period_end() {
    let db = test_db::setup().await;
    let (user, _) = test_db::seed(&db).await;

    let pass = AccessPass::new(&db)
      .create(params(&user.id, PassType::Lifetime))
      .await
      .unwrap();

    assert_eq!(pass.current_period_end, None);
    assert!(pass.period_valid(Utc::now().naive_utc()));
  }

  #[tokio::test]
  async fn test_second_active_pass_rejected() {
    let db = test_db::setup().await;
    let (user, _) = test_db::seed(&db).await;
    let sv = AccessPass::new(&db);

    sv.create(params(&user.id, PassType::Monthly)).await.unwrap();
    let second = sv.create(params(&user.id, PassType::Yearly)).await;

    assert!(matches!(second, Err(Error::InvalidArgs(_))));
  }

  #[tokio::test]
  async fn test_cancel_at_period_end_keeps_access() {
    let db = test_db::setup().await;
    let (user, _) = test_db::seed(&db).await;
    let sv = AccessPass::new(&db);

    let pass = sv.create(params(&user.id, PassType::Monthly)).await.unwrap();
    let updated = sv.cancel(&pass.id, true).await.unwrap();

    assert!(updated.cancel_at_period_end);
    assert_eq!(updated.status, PassStatus::Active);
    assert!(sv.active_for_user(&user.id).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn test_immediate_cancel_revokes_access() {
    let db = test_db::setup().await;
    let (user, _) = test_db::seed(&db).await;
    let sv = AccessPass::new(&db);

    let pass = sv.create(params(&user.id, PassType::Monthly)).await.unwrap();
    let updated = sv.cancel(&pass.id, false).await.unwrap();

    assert_eq!(updated.status, PassStatus::Cancelled);
    assert!(sv.active_for_user(&user.id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_cancel_lifetime_at_period_end_rejected() {
    let db = test_db::setup().await;
    let (user, _) = test_db::seed(&db).await;
    let sv = AccessPass::new(&db);

    let pass = sv.create(params(&user.id, PassType::Lifetime)).await.unwrap();
    assert!(matches!(
      sv.cancel(&pass.id, true).await,
      Err(Error::InvalidArgs(_))
    ));
  }
}
