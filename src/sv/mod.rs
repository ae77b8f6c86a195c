pub mod access;
pub mod access_pass;
pub mod catalog;
pub mod license;
pub mod order;
pub mod stripe;
#[cfg(test)]
pub mod test_utils;
pub mod token;
pub mod user;

pub use access::Access;
pub use access_pass::AccessPass;
pub use catalog::Catalog;
pub use license::License;
pub use order::Order;
pub use stripe::Stripe;
pub use token::Tokens;
pub use user::User;
