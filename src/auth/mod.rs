//! Session checks. Tokens are issued elsewhere; this service only verifies them.

pub mod jwt;

pub use jwt::AuthUser;
