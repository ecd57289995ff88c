//! Repositories for database operations

mod user;

pub use user::{NewAccount, UserRepository};
