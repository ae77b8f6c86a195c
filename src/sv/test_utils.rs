//! Shared test utilities for database setup

#[cfg(test)]
pub mod test_db {
  use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema,
  };

  use crate::{entity::*, sv};

  /// Creates an in-memory SQLite database with all required tables
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let schema = Schema::new(DbBackend::Sqlite);

    let stmt = schema.create_table_from_entity(user::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(product::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(order::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(order_item::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(license::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(access_pass::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(download_event::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    db
  }

  /// One buyer and one purchasable product, the fixture most tests want.
  pub async fn seed(
    db: &DatabaseConnection,
  ) -> (user::Model, product::Model) {
    let user = sv::User::new(db)
      .get_or_create("user-1", "buyer@example.com")
      .await
      .unwrap();

    let product = sv::Catalog::new(db)
      .create("UI Kit", "ui-kit.zip", 4900, "usd")
      .await
      .unwrap();

    (user, product)
  }
}
