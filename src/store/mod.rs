//! Local mirror of the user's food catalog and log.

mod repo;
pub mod repo_types;

pub use repo::PgFoodStore;

use async_trait::async_trait;
use time::Date;
use uuid::Uuid;

use crate::food_log::types::MetadataPatch;
use repo_types::{CustomFood, FoodLogEntry, NewCustomFood, NewFoodLogEntry};

/// All operations are scoped to `user_id`; rows of other users are invisible.
#[async_trait]
pub trait FoodStore: Send + Sync {
    /// Returns the new catalog id.
    async fn insert_custom_food(&self, user_id: Uuid, food: &NewCustomFood) -> anyhow::Result<i64>;

    /// Returns the new log entry id.
    async fn insert_food_log_entry(
        &self,
        user_id: Uuid,
        entry: &NewFoodLogEntry,
    ) -> anyhow::Result<i64>;

    async fn get_custom_food_by_id(&self, user_id: Uuid, id: i64)
        -> anyhow::Result<Option<CustomFood>>;

    async fn update_custom_food_metadata(
        &self,
        user_id: Uuid,
        id: i64,
        patch: &MetadataPatch,
    ) -> anyhow::Result<()>;

    /// Most recently used first.
    async fn list_custom_foods(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<CustomFood>>;

    async fn list_food_log_entries(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> anyhow::Result<Vec<FoodLogEntry>>;
}
