//! External services.

pub mod graphql;
pub mod lock;
