use uuid::Uuid;

use crate::{
  entity::{LicenseType, OrderStatus, license, order, order_item},
  prelude::*,
  sv::{self, Stripe},
};

pub struct Order<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
  pub product_id: String,
  pub license_type: LicenseType,
  pub quantity: i32,
}

impl<'a> Order<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn create(
    &self,
    user_id: &str,
    items: Vec<NewOrderItem>,
  ) -> Result<order::Model> {
    if items.is_empty() {
      return Err(Error::InvalidArgs("order needs at least one item".into()));
    }
    if items.iter().any(|item| item.quantity <= 0) {
      return Err(Error::InvalidArgs("item quantity must be positive".into()));
    }

    sv::User::new(self.db).require(user_id).await?;

    let catalog = sv::Catalog::new(self.db);
    let mut priced = Vec::with_capacity(items.len());
    for item in items {
      let product = catalog.require_active(&item.product_id).await?;
      priced.push((item, product));
    }

    let currency = priced[0].1.currency.clone();
    let total: i64 = priced
      .iter()
      .map(|(item, product)| product.price_amount * item.quantity as i64)
      .sum();

    let now = Utc::now().naive_utc();
    let txn = self.db.begin().await?;

    let order = order::ActiveModel {
      id: Set(Uuid::new_v4().to_string()),
      user_id: Set(user_id.to_string()),
      status: Set(OrderStatus::Pending),
      stripe_payment_intent_id: Set(None),
      total_amount: Set(total),
      currency: Set(currency),
      created_at: Set(now),
      completed_at: Set(None),
    }
    .insert(&txn)
    .await?;

    for (item, product) in priced {
      order_item::ActiveModel {
        id: NotSet,
        order_id: Set(order.id.clone()),
        product_id: Set(item.product_id),
        license_type: Set(item.license_type),
        quantity: Set(item.quantity),
        unit_amount: Set(product.price_amount),
      }
      .insert(&txn)
      .await?;
    }

    txn.commit().await?;
    Ok(order)
  }

  pub async fn by_id(&self, order_id: &str) -> Result<Option<order::Model>> {
    let order = order::Entity::find_by_id(order_id).one(self.db).await?;
    Ok(order)
  }

  pub async fn items(
    &self,
    order_id: &str,
  ) -> Result<Vec<order_item::Model>> {
    Ok(
      order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(self.db)
        .await?,
    )
  }

  /// Completion is the issuance trigger: confirm payment with the provider
  /// (when configured), mark the order, then fan out licenses/passes.
  pub async fn complete(
    &self,
    order_id: &str,
    payment_intent_id: Option<String>,
    stripe: Option<&Stripe>,
  ) -> Result<Vec<license::Model>> {
    let order = self.by_id(order_id).await?.ok_or(Error::OrderNotFound)?;

    match order.status {
      OrderStatus::Pending | OrderStatus::Paid => {}
      OrderStatus::Completed => {
        return Err(Error::InvalidArgs("order already completed".into()));
      }
      OrderStatus::Cancelled => {
        return Err(Error::InvalidArgs("order is cancelled".into()));
      }
    }

    let payment_intent_id =
      payment_intent_id.or(order.stripe_payment_intent_id.clone());

    if let (Some(stripe), Some(intent_id)) = (stripe, &payment_intent_id) {
      let intent = stripe.payment_intent(intent_id).await?;
      if intent.status != "succeeded" {
        return Err(Error::Payment(format!(
          "payment intent {} is {}",
          intent.id, intent.status
        )));
      }
    }

    let now = Utc::now().naive_utc();
    let order = order::ActiveModel {
      status: Set(OrderStatus::Completed),
      stripe_payment_intent_id: Set(payment_intent_id),
      completed_at: Set(Some(now)),
      ..order.into()
    }
    .update(self.db)
    .await?;

    let items = self.items(&order.id).await?;
    let licenses =
      sv::License::new(self.db).generate_for_order(&order, &items).await?;

    info!(
      "Completed order {} ({} licenses issued)",
      order.id,
      licenses.len()
    );
    Ok(licenses)
  }

  /// Pending orders that never saw payment are cancelled, not deleted, so
  /// the audit trail survives.
  pub async fn cleanup_expired(&self, ttl: Duration) -> Result<u64> {
    use sea_orm::sea_query::Expr;

    let cutoff = Utc::now().naive_utc()
      - TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::zero());

    let result = order::Entity::update_many()
      .col_expr(order::Column::Status, Expr::value(OrderStatus::Cancelled))
      .filter(order::Column::Status.eq(OrderStatus::Pending))
      .filter(order::Column::CreatedAt.lt(cutoff))
      .exec(self.db)
      .await?;

    Ok(result.rows_affected)
  }
}
