use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tracing::{error, instrument};

use super::dto::{DayQuery, FoodLogEntryItem, Pagination};
use super::validate::parse_date;
use crate::{auth::AuthUser, error::ApiError, response, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/food-log", get(list_food_log).post(log_food))
        .route("/custom-foods", get(list_custom_foods))
}

/// POST /food-log
///
/// The coordinator runs on its own task so a dropped connection cannot cut
/// it off between the remote log and the local writes.
#[instrument(skip(state, body))]
pub async fn log_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let coordinator = state.coordinator();
    let outcome = tokio::spawn(async move { coordinator.run(user_id, &body).await })
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "food log task aborted");
            ApiError::Internal("Failed to log food".into())
        })??;
    Ok(response::ok(outcome))
}

#[instrument(skip(state))]
pub async fn list_custom_foods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<Pagination>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(p) = query.map_err(|e| ApiError::validation(e.body_text()))?;
    let (limit, offset) = p.clamped();
    let foods = state
        .store
        .list_custom_foods(user_id, limit, offset)
        .await
        .map_err(internal)?;
    Ok(response::ok(foods))
}

#[instrument(skip(state))]
pub async fn list_food_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<DayQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::validation(e.body_text()))?;
    let date = parse_date(&q.date)
        .ok_or_else(|| ApiError::validation("date must be a valid YYYY-MM-DD date"))?;
    let entries = state
        .store
        .list_food_log_entries(user_id, date)
        .await
        .map_err(internal)?;
    let items = entries
        .into_iter()
        .map(FoodLogEntryItem::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| internal(e.into()))?;
    Ok(response::ok(items))
}

fn internal(e: anyhow::Error) -> ApiError {
    error!(error = %e, "store read failed");
    ApiError::Internal("Internal error".into())
}
