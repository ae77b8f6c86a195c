pub use sea_orm_migration::prelude::*;

mod m20260712_000001_create_users;
mod m20260712_000002_create_products;
mod m20260712_000003_create_orders;
mod m20260712_000004_create_licenses;
mod m20260712_000005_create_access_passes;
mod m20260712_000006_create_download_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260712_000001_create_users::Migration),
      Box::new(m20260712_000002_create_products::Migration),
      Box::new(m20260712_000003_create_orders::Migration),
      Box::new(m20260712_000004_create_licenses::Migration),
      Box::new(m20260712_000005_create_access_passes::Migration),
      Box::new(m20260712_000006_create_download_events::Migration),
    ]
  }
}
