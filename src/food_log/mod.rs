//! Food logging: request validation, food resolution and the write
//! coordinator that keeps Fitbit and the local store consistent.

mod dto;
mod handlers;
pub mod resolver;
pub mod saga;
pub mod types;
pub mod validate;

pub use handlers::router;
