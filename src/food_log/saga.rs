//! Write coordinator for one food-log request.
//!
//! Each step is a state type whose only way forward is the transition method
//! on it, so the order is fixed at compile time:
//!
//! ```text
//! Validated -> Resolved -> DryRunPending ------------------------> Done
//!                      \-> ReadyToLog -> RemoteLogged -> persist -> Done
//!                                                     \-> compensate -> INTERNAL_ERROR | PARTIAL_ERROR
//! ```
//!
//! Compensation is a method of [`RemoteLogged`] only: it cannot run before a
//! remote log line exists. The coordinator keeps no state between requests.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::resolver::resolve_food;
use super::types::{LogFlow, LogRequest, MetadataPatch, ResolvedFood};
use super::validate::validate_log_request;
use crate::error::ApiError;
use crate::fitbit::{AccessToken, FitbitClient, FoodLogParams};
use crate::store::repo_types::{NewCustomFood, NewFoodLogEntry};
use crate::store::FoodStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSettings {
    pub dry_run: bool,
}

/// Wire-level result of a successful log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitbit_food_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitbit_log_id: Option<i64>,
    pub reused_food: bool,
    pub food_log_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

#[derive(Clone)]
pub struct FoodLogCoordinator {
    fitbit: Arc<dyn FitbitClient>,
    store: Arc<dyn FoodStore>,
    settings: LogSettings,
}

impl FoodLogCoordinator {
    pub fn new(
        fitbit: Arc<dyn FitbitClient>,
        store: Arc<dyn FoodStore>,
        settings: LogSettings,
    ) -> Self {
        Self {
            fitbit,
            store,
            settings,
        }
    }

    #[instrument(skip(self, body), fields(dry_run = self.settings.dry_run))]
    pub async fn run(&self, user_id: Uuid, body: &Value) -> Result<LogOutcome, ApiError> {
        let validated = Validated::new(user_id, body)?;
        let resolved = validated.resolve(self).await?;
        let outcome = match resolved.branch(self.settings.dry_run)? {
            Branch::DryRun(pending) => pending.persist(self).await?,
            Branch::Remote(ready) => ready.log_remote(self).await?.persist(self).await?,
        };
        info!(
            %user_id,
            food_log_id = outcome.food_log_id,
            reused = outcome.reused_food,
            "food logged"
        );
        Ok(outcome)
    }
}

struct Validated {
    user_id: Uuid,
    request: LogRequest,
}

struct Resolved {
    user_id: Uuid,
    request: LogRequest,
    food: ResolvedFood,
    token: Option<AccessToken>,
}

enum Branch {
    DryRun(DryRunPending),
    Remote(ReadyToLog),
}

struct DryRunPending {
    user_id: Uuid,
    request: LogRequest,
    food: ResolvedFood,
}

struct ReadyToLog {
    user_id: Uuid,
    request: LogRequest,
    food: ResolvedFood,
    fitbit_food_id: i64,
    token: AccessToken,
}

struct RemoteLogged {
    user_id: Uuid,
    request: LogRequest,
    food: ResolvedFood,
    fitbit_food_id: i64,
    fitbit_log_id: i64,
    token: AccessToken,
}

impl Validated {
    fn new(user_id: Uuid, body: &Value) -> Result<Self, ApiError> {
        let request = validate_log_request(body)?;
        debug!(%user_id, "request validated");
        Ok(Self { user_id, request })
    }

    async fn resolve(self, ctx: &FoodLogCoordinator) -> Result<Resolved, ApiError> {
        let resolution = resolve_food(
            ctx.fitbit.as_ref(),
            ctx.store.as_ref(),
            self.user_id,
            &self.request.flow,
            ctx.settings.dry_run,
        )
        .await?;
        Ok(Resolved {
            user_id: self.user_id,
            request: self.request,
            food: resolution.food,
            token: resolution.token,
        })
    }
}

impl Resolved {
    fn branch(self, dry_run: bool) -> Result<Branch, ApiError> {
        if dry_run {
            return Ok(Branch::DryRun(DryRunPending {
                user_id: self.user_id,
                request: self.request,
                food: self.food,
            }));
        }
        match (self.food.fitbit_food_id, self.token) {
            (Some(fitbit_food_id), Some(token)) => Ok(Branch::Remote(ReadyToLog {
                user_id: self.user_id,
                request: self.request,
                food: self.food,
                fitbit_food_id,
                token,
            })),
            _ => {
                error!(user_id = %self.user_id, "resolved food is missing its fitbit id or token");
                Err(ApiError::Internal("Food could not be resolved".into()))
            }
        }
    }
}

impl DryRunPending {
    /// Nothing remote was written, so a local failure is a plain internal error.
    async fn persist(self, ctx: &FoodLogCoordinator) -> Result<LogOutcome, ApiError> {
        debug!(user_id = %self.user_id, "dry run: skipping fitbit");
        let food_log_id = persist_local(ctx.store.as_ref(), self.user_id, &self.request, &self.food, None)
            .await
            .map_err(|failure| {
                error!(error = %failure.source, op = failure.op, "dry-run local save failed");
                ApiError::Internal("Failed to save food log locally".into())
            })?;
        Ok(LogOutcome {
            success: true,
            fitbit_food_id: None,
            fitbit_log_id: None,
            reused_food: self.food.reused,
            food_log_id,
            dry_run: Some(true),
        })
    }
}

impl ReadyToLog {
    async fn log_remote(self, ctx: &FoodLogCoordinator) -> Result<RemoteLogged, ApiError> {
        let params = FoodLogParams {
            food_id: self.fitbit_food_id,
            meal_type: self.request.meal_type,
            amount: self.food.amount,
            unit_id: self.food.unit_id,
            date: self.request.date,
            time: self.request.time,
        };
        let logged = ctx.fitbit.log_food(&self.token, &params).await?;
        debug!(log_id = logged.log_id, "fitbit log created");
        Ok(RemoteLogged {
            user_id: self.user_id,
            request: self.request,
            food: self.food,
            fitbit_food_id: self.fitbit_food_id,
            fitbit_log_id: logged.log_id,
            token: self.token,
        })
    }
}

impl RemoteLogged {
    async fn persist(self, ctx: &FoodLogCoordinator) -> Result<LogOutcome, ApiError> {
        let saved = persist_local(
            ctx.store.as_ref(),
            self.user_id,
            &self.request,
            &self.food,
            Some(self.fitbit_log_id),
        )
        .await;
        match saved {
            Ok(food_log_id) => Ok(LogOutcome {
                success: true,
                fitbit_food_id: Some(self.fitbit_food_id),
                fitbit_log_id: Some(self.fitbit_log_id),
                reused_food: self.food.reused,
                food_log_id,
                dry_run: None,
            }),
            Err(failure) => Err(self.compensate(ctx, failure).await),
        }
    }

    async fn compensate(self, ctx: &FoodLogCoordinator, failure: LocalWriteFailed) -> ApiError {
        let log_id = self.fitbit_log_id;
        warn!(
            user_id = %self.user_id,
            log_id,
            op = failure.op,
            error = %failure.source,
            "local save failed, deleting fitbit log"
        );
        match ctx.fitbit.delete_food_log(&self.token, log_id).await {
            Ok(()) => {
                warn!(log_id, "fitbit log removed after local failure");
                ApiError::Internal("Failed to save food log locally; the Fitbit entry was removed".into())
            }
            Err(e) => {
                error!(user_id = %self.user_id, log_id, error = %e, "orphaned fitbit log");
                ApiError::Partial(format!(
                    "Food was logged to Fitbit (log {log_id}) but local save failed and the Fitbit entry could not be removed"
                ))
            }
        }
    }
}

/// Writes the catalog row (new food) and the log entry, then applies the
/// optional metadata patch. Returns the local log entry id.
async fn persist_local(
    store: &dyn FoodStore,
    user_id: Uuid,
    request: &LogRequest,
    food: &ResolvedFood,
    fitbit_log_id: Option<i64>,
) -> Result<i64, LocalWriteFailed> {
    let (custom_food_id, patch) = match &request.flow {
        LogFlow::NewFood(profile) => {
            let new_food = NewCustomFood {
                profile: profile.clone(),
                fitbit_food_id: food.fitbit_food_id,
            };
            let id = PrimaryWrite("insert_custom_food")
                .run(store.insert_custom_food(user_id, &new_food))
                .await?;
            (id, None)
        }
        LogFlow::Reuse {
            custom_food_id,
            metadata,
        } => (*custom_food_id, Some(metadata)),
    };

    let entry = NewFoodLogEntry {
        custom_food_id,
        meal_type: request.meal_type,
        amount: food.amount,
        unit_id: food.unit_id,
        date: request.date,
        time: request.time,
        fitbit_log_id,
    };
    let food_log_id = PrimaryWrite("insert_food_log_entry")
        .run(store.insert_food_log_entry(user_id, &entry))
        .await?;

    if let Some(patch) = patch.filter(|p: &&MetadataPatch| !p.is_empty()) {
        BestEffortWrite("update_custom_food_metadata")
            .run(store.update_custom_food_metadata(user_id, custom_food_id, patch))
            .await;
    }
    Ok(food_log_id)
}

/// A local write whose failure decides the request's outcome.
struct PrimaryWrite(&'static str);

/// A local write whose failure is logged and otherwise ignored.
struct BestEffortWrite(&'static str);

struct LocalWriteFailed {
    op: &'static str,
    source: anyhow::Error,
}

impl PrimaryWrite {
    async fn run<T>(
        self,
        write: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, LocalWriteFailed> {
        write.await.map_err(|source| LocalWriteFailed { op: self.0, source })
    }
}

impl BestEffortWrite {
    async fn run(self, write: impl Future<Output = anyhow::Result<()>>) {
        if let Err(e) = write.await {
            warn!(op = self.0, error = %e, "best-effort write failed; ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitbit::FitbitError;
    use crate::test_support::{
        new_food_body, reuse_body, stored_food, Call, FakeFitbit, FakeStore, StoreCall,
    };
    use serde_json::json;

    fn coordinator(fitbit: &Arc<FakeFitbit>, store: &Arc<FakeStore>, dry_run: bool) -> FoodLogCoordinator {
        FoodLogCoordinator::new(fitbit.clone(), store.clone(), LogSettings { dry_run })
    }

    fn user() -> Uuid {
        Uuid::from_u128(7)
    }

    #[tokio::test]
    async fn new_food_happy_path() {
        let fitbit = Arc::new(FakeFitbit::new(123, false, 456));
        let store = Arc::new(FakeStore::default());

        let outcome = coordinator(&fitbit, &store, false)
            .run(user(), &new_food_body())
            .await
            .expect("logged");

        assert_eq!(outcome.fitbit_food_id, Some(123));
        assert_eq!(outcome.fitbit_log_id, Some(456));
        assert!(!outcome.reused_food);
        assert_eq!(outcome.dry_run, None);
        assert_eq!(store.count(StoreCall::InsertCustomFood), 1);
        assert_eq!(store.count(StoreCall::InsertFoodLogEntry), 1);

        let foods = store.inserted_foods();
        assert_eq!(foods[0].fitbit_food_id, Some(123));
        let entries = store.inserted_entries();
        assert_eq!(entries[0].fitbit_log_id, Some(456));
        assert_eq!(entries[0].custom_food_id, 1);
        assert_eq!(outcome.food_log_id, 1000);
        assert_eq!(
            fitbit.calls(),
            vec![Call::EnsureToken, Call::FindOrCreate, Call::LogFood(123)]
        );
    }

    #[tokio::test]
    async fn reused_flag_comes_from_fitbit() {
        let fitbit = Arc::new(FakeFitbit::new(77, true, 9));
        let store = Arc::new(FakeStore::default());
        let outcome = coordinator(&fitbit, &store, false)
            .run(user(), &new_food_body())
            .await
            .unwrap();
        assert!(outcome.reused_food);
    }

    #[tokio::test]
    async fn invalid_request_touches_nothing() {
        let fitbit = Arc::new(FakeFitbit::new(1, false, 2));
        let store = Arc::new(FakeStore::default());
        let mut body = new_food_body();
        body["mealTypeId"] = json!(6);

        let err = coordinator(&fitbit, &store, false)
            .run(user(), &body)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(fitbit.calls().is_empty());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn token_failure_stops_before_any_write() {
        let fitbit = Arc::new(FakeFitbit::new(1, false, 2).fail_token(FitbitError::TokenInvalid));
        let store = Arc::new(FakeStore::default());

        let err = coordinator(&fitbit, &store, false)
            .run(user(), &new_food_body())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "FITBIT_TOKEN_INVALID");
        assert_eq!(err.status().as_u16(), 401);
        assert_eq!(fitbit.calls(), vec![Call::EnsureToken]);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn log_failure_is_not_compensated() {
        let fitbit = Arc::new(FakeFitbit::new(1, false, 2).fail_log(FitbitError::Timeout));
        let store = Arc::new(FakeStore::default());

        let err = coordinator(&fitbit, &store, false)
            .run(user(), &new_food_body())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "FITBIT_TIMEOUT");
        assert_eq!(err.status().as_u16(), 504);
        assert!(!fitbit.calls().iter().any(|c| matches!(c, Call::DeleteLog(_))));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn custom_food_insert_failure_is_compensated() {
        let fitbit = Arc::new(FakeFitbit::new(123, false, 456));
        let store = Arc::new(FakeStore::default().fail_on(StoreCall::InsertCustomFood));

        let err = coordinator(&fitbit, &store, false)
            .run(user(), &new_food_body())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.status().as_u16(), 500);
        assert_eq!(fitbit.calls().last(), Some(&Call::DeleteLog(456)));
        assert_eq!(store.count(StoreCall::InsertFoodLogEntry), 0);
    }

    #[tokio::test]
    async fn log_entry_insert_failure_is_compensated() {
        let fitbit = Arc::new(FakeFitbit::new(123, false, 456));
        let store = Arc::new(FakeStore::default().fail_on(StoreCall::InsertFoodLogEntry));

        let err = coordinator(&fitbit, &store, false)
            .run(user(), &new_food_body())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(fitbit.calls().last(), Some(&Call::DeleteLog(456)));
    }

    #[tokio::test]
    async fn failed_compensation_is_partial() {
        let fitbit = Arc::new(
            FakeFitbit::new(123, false, 456).fail_delete(FitbitError::Api("gone".into())),
        );
        let store = Arc::new(FakeStore::default().fail_on(StoreCall::InsertCustomFood));

        let err = coordinator(&fitbit, &store, false)
            .run(user(), &new_food_body())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "PARTIAL_ERROR");
        assert_eq!(err.status().as_u16(), 500);
        assert!(err.to_string().contains("local save failed"));
        assert_eq!(fitbit.calls().last(), Some(&Call::DeleteLog(456)));
    }

    #[tokio::test]
    async fn dry_run_skips_fitbit_entirely() {
        let fitbit = Arc::new(FakeFitbit::new(123, false, 456));
        let store = Arc::new(FakeStore::default());

        let outcome = coordinator(&fitbit, &store, true)
            .run(user(), &new_food_body())
            .await
            .expect("logged");

        assert!(fitbit.calls().is_empty());
        assert_eq!(store.inserted_foods()[0].fitbit_food_id, None);
        assert_eq!(store.inserted_entries()[0].fitbit_log_id, None);
        assert_eq!(outcome.dry_run, Some(true));

        let wire = serde_json::to_value(&outcome).unwrap();
        assert_eq!(wire["dryRun"], json!(true));
        assert!(wire.get("fitbitLogId").is_none());
        assert!(wire.get("fitbitFoodId").is_none());
    }

    #[tokio::test]
    async fn dry_run_local_failure_is_internal_without_compensation() {
        let fitbit = Arc::new(FakeFitbit::new(123, false, 456));
        let store = Arc::new(FakeStore::default().fail_on(StoreCall::InsertFoodLogEntry));

        let err = coordinator(&fitbit, &store, true)
            .run(user(), &new_food_body())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(fitbit.calls().is_empty());
    }

    #[tokio::test]
    async fn reuse_flow_logs_stored_food() {
        let fitbit = Arc::new(FakeFitbit::new(0, false, 900));
        let store = Arc::new(FakeStore::default().with_food(stored_food(42, Some(555))));

        let outcome = coordinator(&fitbit, &store, false)
            .run(user(), &reuse_body(42))
            .await
            .expect("logged");

        assert!(outcome.reused_food);
        assert_eq!(outcome.fitbit_food_id, Some(555));
        assert_eq!(outcome.fitbit_log_id, Some(900));
        assert_eq!(fitbit.calls(), vec![Call::EnsureToken, Call::LogFood(555)]);
        assert_eq!(store.count(StoreCall::InsertCustomFood), 0);
        let entry = &store.inserted_entries()[0];
        assert_eq!(entry.custom_food_id, 42);
        assert_eq!(entry.amount, 2.0);
        assert_eq!(entry.unit_id, 147);
        assert_eq!(store.count(StoreCall::UpdateMetadata), 0);
    }

    #[tokio::test]
    async fn reuse_of_unknown_food_is_validation_error() {
        let fitbit = Arc::new(FakeFitbit::new(0, false, 900));
        let store = Arc::new(FakeStore::default());

        let err = coordinator(&fitbit, &store, false)
            .run(user(), &reuse_body(42))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(fitbit.calls().is_empty());
    }

    #[tokio::test]
    async fn reuse_without_fitbit_id_depends_on_dry_run() {
        let fitbit = Arc::new(FakeFitbit::new(0, false, 900));
        let store = Arc::new(FakeStore::default().with_food(stored_food(42, None)));

        let err = coordinator(&fitbit, &store, false)
            .run(user(), &reuse_body(42))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(fitbit.calls().is_empty());

        let outcome = coordinator(&fitbit, &store, true)
            .run(user(), &reuse_body(42))
            .await
            .expect("dry run accepts foods without a fitbit id");
        assert_eq!(outcome.dry_run, Some(true));
        assert!(outcome.reused_food);
        assert!(fitbit.calls().is_empty());
    }

    #[tokio::test]
    async fn metadata_patch_only_sends_supplied_fields() {
        let fitbit = Arc::new(FakeFitbit::new(0, false, 900));
        let store = Arc::new(FakeStore::default().with_food(stored_food(42, Some(555))));
        let mut body = reuse_body(42);
        body["newNotes"] = json!("extra sauce");

        coordinator(&fitbit, &store, false)
            .run(user(), &body)
            .await
            .unwrap();

        let patches = store.patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(
            patches[0],
            (
                42,
                MetadataPatch {
                    notes: Some("extra sauce".into()),
                    ..Default::default()
                }
            )
        );
    }

    #[tokio::test]
    async fn metadata_failure_does_not_change_outcome() {
        let fitbit = Arc::new(FakeFitbit::new(0, false, 900));
        let store = Arc::new(
            FakeStore::default()
                .with_food(stored_food(42, Some(555)))
                .fail_on(StoreCall::UpdateMetadata),
        );
        let mut body = reuse_body(42);
        body["newDescription"] = json!("with extra sauce");
        body["newKeywords"] = json!(["sauce"]);

        let outcome = coordinator(&fitbit, &store, false)
            .run(user(), &body)
            .await
            .expect("metadata failure is swallowed");

        assert_eq!(outcome.fitbit_log_id, Some(900));
        assert_eq!(store.count(StoreCall::UpdateMetadata), 1);
        assert!(!fitbit.calls().iter().any(|c| matches!(c, Call::DeleteLog(_))));
    }

    #[tokio::test]
    async fn reuse_entry_failure_is_compensated() {
        let fitbit = Arc::new(FakeFitbit::new(0, false, 900));
        let store = Arc::new(
            FakeStore::default()
                .with_food(stored_food(42, Some(555)))
                .fail_on(StoreCall::InsertFoodLogEntry),
        );

        let err = coordinator(&fitbit, &store, false)
            .run(user(), &reuse_body(42))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(fitbit.calls().last(), Some(&Call::DeleteLog(900)));
        assert_eq!(store.count(StoreCall::UpdateMetadata), 0);
    }
}
