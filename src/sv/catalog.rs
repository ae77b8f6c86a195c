use uuid::Uuid;

use crate::{entity::product, prelude::*};

pub struct Catalog<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Catalog<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn create(
    &self,
    title: &str,
    file_path: &str,
    price_amount: i64,
    currency: &str,
  ) -> Result<product::Model> {
    let now = Utc::now().naive_utc();

    let product = product::ActiveModel {
      id: Set(Uuid::new_v4().to_string()),
      title: Set(title.to_string()),
      file_path: Set(file_path.to_string()),
      file_size: Set(None),
      price_amount: Set(price_amount),
      currency: Set(currency.to_string()),
      is_active: Set(true),
      created_at: Set(now),
    };

    Ok(product.insert(self.db).await?)
  }

  pub async fn by_id(
    &self,
    product_id: &str,
  ) -> Result<Option<product::Model>> {
    let product = product::Entity::find_by_id(product_id).one(self.db).await?;
    Ok(product)
  }

  /// Purchasable lookup: missing and retired products are both "not found".
  pub async fn require_active(
    &self,
    product_id: &str,
  ) -> Result<product::Model> {
    self
      .by_id(product_id)
      .await?
      .filter(|p| p.is_active)
      .ok_or(Error::ProductNotFound)
  }
}
