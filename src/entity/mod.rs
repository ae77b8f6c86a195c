pub mod access_pass;
pub mod download_event;
pub mod license;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;

pub use access_pass::{PassStatus, PassType};
pub use license::{LicenseStatus, LicenseType};
pub use order::OrderStatus;
