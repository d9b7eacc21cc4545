use tracing::{debug, error};
use uuid::Uuid;

use super::types::{LogFlow, ResolvedFood};
use crate::error::ApiError;
use crate::fitbit::{AccessToken, FitbitClient};
use crate::store::FoodStore;

/// Outcome of resolution. `token` is present whenever a remote log will follow.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub food: ResolvedFood,
    pub token: Option<AccessToken>,
}

pub async fn resolve_food(
    fitbit: &dyn FitbitClient,
    store: &dyn FoodStore,
    user_id: Uuid,
    flow: &LogFlow,
    dry_run: bool,
) -> Result<Resolution, ApiError> {
    match flow {
        LogFlow::NewFood(profile) => {
            if dry_run {
                return Ok(Resolution {
                    food: ResolvedFood {
                        fitbit_food_id: None,
                        custom_food_id: None,
                        reused: false,
                        amount: profile.amount,
                        unit_id: profile.unit_id,
                    },
                    token: None,
                });
            }
            let token = fitbit.ensure_fresh_token(user_id).await?;
            let remote = fitbit.find_or_create_food(&token, profile).await?;
            debug!(food_id = remote.food_id, reused = remote.reused, "fitbit food resolved");
            Ok(Resolution {
                food: ResolvedFood {
                    fitbit_food_id: Some(remote.food_id),
                    custom_food_id: None,
                    reused: remote.reused,
                    amount: profile.amount,
                    unit_id: profile.unit_id,
                },
                token: Some(token),
            })
        }
        LogFlow::Reuse { custom_food_id, .. } => {
            let stored = store
                .get_custom_food_by_id(user_id, *custom_food_id)
                .await
                .map_err(|e| {
                    error!(error = %e, %user_id, custom_food_id, "custom food lookup failed");
                    ApiError::Internal("Failed to load custom food".into())
                })?
                .ok_or_else(|| ApiError::validation("Custom food not found"))?;

            let mut food = ResolvedFood {
                fitbit_food_id: None,
                custom_food_id: Some(stored.id),
                reused: true,
                amount: stored.amount,
                unit_id: stored.unit_id,
            };
            if dry_run {
                return Ok(Resolution { food, token: None });
            }

            let fitbit_food_id = stored.fitbit_food_id.ok_or_else(|| {
                ApiError::validation("Custom food has no Fitbit food id and cannot be re-logged")
            })?;
            let token = fitbit.ensure_fresh_token(user_id).await?;
            food.fitbit_food_id = Some(fitbit_food_id);
            Ok(Resolution {
                food,
                token: Some(token),
            })
        }
    }
}
