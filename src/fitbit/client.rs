use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use sqlx::PgPool;
use time::{macros::format_description, OffsetDateTime};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::tokens::{self, StoredTokens};
use super::{AccessToken, FitbitClient, FitbitError, FoodLogParams, RemoteFood, RemoteLogResult};
use crate::config::FitbitConfig;
use crate::food_log::types::NutrientProfile;

/// Refresh when the access token expires within this window.
const REFRESH_MARGIN_SECS: i64 = 60;

pub struct FitbitHttpClient {
    client: Client,
    db: PgPool,
    config: FitbitConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<SearchFood>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchFood {
    food_id: i64,
    name: String,
    #[serde(default)]
    calories: f64,
    #[serde(default)]
    access_level: Option<String>,
    #[serde(default)]
    default_unit: Option<SearchUnit>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchUnit {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CreateFoodResponse {
    food: CreatedFood,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedFood {
    food_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogFoodResponse {
    food_log: CreatedLog,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedLog {
    log_id: i64,
}

impl FitbitHttpClient {
    pub fn new(db: PgPool, config: FitbitConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .build()
            .context("build fitbit http client")?;
        Ok(Self { client, db, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn refresh(&self, user_id: Uuid, current: StoredTokens) -> Result<AccessToken, FitbitError> {
        let creds = tokens::find_credentials(&self.db, user_id)
            .await
            .map_err(|e| local_failure("load fitbit credentials", e))?
            .ok_or(FitbitError::CredentialsMissing)?;

        info!(%user_id, "refreshing fitbit access token");
        let response = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            warn!(%user_id, %status, "fitbit rejected refresh token");
            return Err(FitbitError::TokenInvalid);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        let fresh: TokenResponse = response
            .json()
            .await
            .map_err(|e| FitbitError::Api(format!("unreadable token response: {e}")))?;

        let stored = StoredTokens {
            access_token: fresh.access_token,
            refresh_token: fresh.refresh_token,
            expires_at: OffsetDateTime::now_utc() + time::Duration::seconds(fresh.expires_in),
        };
        tokens::upsert_tokens(&self.db, user_id, &stored)
            .await
            .map_err(|e| local_failure("store refreshed fitbit tokens", e))?;
        Ok(AccessToken(stored.access_token))
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, FitbitError> {
        let response = req.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        response
            .json()
            .await
            .map_err(|e| FitbitError::Api(format!("unreadable response: {e}")))
    }
}

#[async_trait]
impl FitbitClient for FitbitHttpClient {
    #[instrument(skip(self))]
    async fn ensure_fresh_token(&self, user_id: Uuid) -> Result<AccessToken, FitbitError> {
        let current = tokens::find_tokens(&self.db, user_id)
            .await
            .map_err(|e| local_failure("load fitbit tokens", e))?
            .ok_or(FitbitError::NotConnected)?;

        if current.is_fresh(OffsetDateTime::now_utc(), REFRESH_MARGIN_SECS) {
            debug!(%user_id, "fitbit token still fresh");
            return Ok(AccessToken(current.access_token));
        }
        self.refresh(user_id, current).await
    }

    #[instrument(skip(self, token, profile), fields(food_name = %profile.food_name))]
    async fn find_or_create_food(
        &self,
        token: &AccessToken,
        profile: &NutrientProfile,
    ) -> Result<RemoteFood, FitbitError> {
        let search: SearchResponse = self
            .send_json(
                self.client
                    .get(self.url("/1/foods/search.json"))
                    .bearer_auth(&token.0)
                    .query(&[("query", profile.food_name.as_str())]),
            )
            .await?;

        if let Some(food_id) = matching_food(&search.foods, profile) {
            debug!(food_id, "reusing existing fitbit food");
            return Ok(RemoteFood {
                food_id,
                reused: true,
            });
        }

        let created: CreateFoodResponse = self
            .send_json(
                self.client
                    .post(self.url("/1/user/-/foods.json"))
                    .bearer_auth(&token.0)
                    .form(&create_food_form(profile)),
            )
            .await?;
        info!(food_id = created.food.food_id, "fitbit food created");
        Ok(RemoteFood {
            food_id: created.food.food_id,
            reused: false,
        })
    }

    #[instrument(skip(self, token))]
    async fn log_food(
        &self,
        token: &AccessToken,
        params: &FoodLogParams,
    ) -> Result<RemoteLogResult, FitbitError> {
        let logged: LogFoodResponse = self
            .send_json(
                self.client
                    .post(self.url("/1/user/-/foods/log.json"))
                    .bearer_auth(&token.0)
                    .form(&log_food_form(params)?),
            )
            .await?;
        Ok(RemoteLogResult {
            log_id: logged.food_log.log_id,
        })
    }

    #[instrument(skip(self, token))]
    async fn delete_food_log(&self, token: &AccessToken, log_id: i64) -> Result<(), FitbitError> {
        let response = self
            .client
            .delete(self.url(&format!("/1/user/-/foods/log/{log_id}.json")))
            .bearer_auth(&token.0)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        Ok(())
    }
}

fn transport(e: reqwest::Error) -> FitbitError {
    if e.is_timeout() {
        FitbitError::Timeout
    } else {
        FitbitError::Api(format!("request failed: {e}"))
    }
}

fn status_error(status: StatusCode, body: &str) -> FitbitError {
    error!(%status, body_length = body.len(), "fitbit request failed");
    if status == StatusCode::UNAUTHORIZED {
        return FitbitError::TokenInvalid;
    }
    let snippet: String = body.chars().take(200).collect();
    FitbitError::Api(format!("status {status}: {snippet}"))
}

fn local_failure(what: &str, e: anyhow::Error) -> FitbitError {
    error!(error = %e, "{what} failed");
    FitbitError::Api(format!("{what} failed"))
}

/// A private food on the account with the same name, calories and unit.
fn matching_food(foods: &[SearchFood], profile: &NutrientProfile) -> Option<i64> {
    let name = profile.food_name.trim().to_lowercase();
    let calories = profile.calories.round();
    foods
        .iter()
        .filter(|f| f.access_level.as_deref() == Some("PRIVATE"))
        .filter(|f| f.default_unit.as_ref().map(|u| u.id) == Some(profile.unit_id))
        .find(|f| f.name.trim().to_lowercase() == name && (f.calories - calories).abs() < 0.5)
        .map(|f| f.food_id)
}

fn create_food_form(p: &NutrientProfile) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("name", p.food_name.clone()),
        ("defaultFoodMeasurementUnitId", p.unit_id.to_string()),
        ("defaultServingSize", p.amount.to_string()),
        ("calories", p.calories.round().to_string()),
        ("formType", "DRY".to_owned()),
        ("description", p.description.clone().unwrap_or_default()),
        ("protein", p.protein_g.to_string()),
        ("totalCarbohydrate", p.carbs_g.to_string()),
        ("totalFat", p.fat_g.to_string()),
        ("dietaryFiber", p.fiber_g.to_string()),
        ("sodium", p.sodium_mg.to_string()),
    ];
    let optional = [
        ("saturatedFat", p.saturated_fat_g),
        ("transFat", p.trans_fat_g),
        ("sugars", p.sugars_g),
        ("caloriesFromFat", p.calories_from_fat),
    ];
    form.extend(
        optional
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v.to_string()))),
    );
    form
}

fn log_food_form(p: &FoodLogParams) -> Result<Vec<(&'static str, String)>, FitbitError> {
    let date = p
        .date
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(|e| FitbitError::Api(format!("format date: {e}")))?;
    let time = p
        .time
        .format(format_description!("[hour]:[minute]"))
        .map_err(|e| FitbitError::Api(format!("format time: {e}")))?;
    Ok(vec![
        ("foodId", p.food_id.to_string()),
        ("mealTypeId", p.meal_type.id().to_string()),
        ("unitId", p.unit_id.to_string()),
        ("amount", format!("{:.2}", p.amount)),
        ("date", date),
        ("time", time),
    ])
}
