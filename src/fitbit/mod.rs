//! Remote food logging against the Fitbit Web API.

mod client;
mod tokens;

pub use client::FitbitHttpClient;

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, Time};
use uuid::Uuid;

use crate::food_log::types::{MealType, NutrientProfile};

/// Closed set of remote failures. Callers branch on the variant, never on
/// the message text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FitbitError {
    #[error("Fitbit credentials are not configured for this account")]
    CredentialsMissing,
    #[error("Fitbit token is invalid or expired. Please reconnect your Fitbit account.")]
    TokenInvalid,
    #[error("Fitbit account is not connected")]
    NotConnected,
    #[error("Request to Fitbit timed out. Please try again.")]
    Timeout,
    #[error("Fitbit API error: {0}")]
    Api(String),
}

/// Bearer token valid for the rest of the current request.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteFood {
    pub food_id: i64,
    /// An identical food already existed on the account.
    pub reused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteLogResult {
    pub log_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoodLogParams {
    pub food_id: i64,
    pub meal_type: MealType,
    pub amount: f64,
    pub unit_id: i64,
    pub date: Date,
    pub time: Time,
}

#[async_trait]
pub trait FitbitClient: Send + Sync {
    async fn ensure_fresh_token(&self, user_id: Uuid) -> Result<AccessToken, FitbitError>;

    async fn find_or_create_food(
        &self,
        token: &AccessToken,
        profile: &NutrientProfile,
    ) -> Result<RemoteFood, FitbitError>;

    async fn log_food(
        &self,
        token: &AccessToken,
        params: &FoodLogParams,
    ) -> Result<RemoteLogResult, FitbitError>;

    async fn delete_food_log(&self, token: &AccessToken, log_id: i64) -> Result<(), FitbitError>;
}
