//! Authentication service models

pub mod user;

pub use user::{SignInRequest, SignUpRequest, User};
