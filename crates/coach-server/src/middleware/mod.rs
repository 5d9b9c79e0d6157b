//! Request middleware.

pub mod auth;

pub use auth::auth_middleware;
pub use coach_core::auth::AuthContext;
