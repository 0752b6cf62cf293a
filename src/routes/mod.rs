//! src/routes/mod.rs

mod auth;
mod health_check;
mod users;

pub use auth::*;
pub use health_check::*;
pub use users::*;
