use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use super::repo_types::{CustomFood, FoodLogEntry, NewCustomFood, NewFoodLogEntry};
use super::FoodStore;
use crate::food_log::types::MetadataPatch;

const CUSTOM_FOOD_COLUMNS: &str = r#"
    id, food_name, amount, unit_id, calories, protein_g, carbs_g, fat_g, fiber_g,
    sodium_mg, saturated_fat_g, trans_fat_g, sugars_g, calories_from_fat, confidence,
    notes, description, keywords, fitbit_food_id, created_at, last_used_at
"#;

#[derive(Clone)]
pub struct PgFoodStore {
    db: PgPool,
}

impl PgFoodStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FoodStore for PgFoodStore {
    async fn insert_custom_food(&self, user_id: Uuid, food: &NewCustomFood) -> anyhow::Result<i64> {
        let p = &food.profile;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO custom_foods (
                user_id, food_name, amount, unit_id, calories, protein_g, carbs_g, fat_g,
                fiber_g, sodium_mg, saturated_fat_g, trans_fat_g, sugars_g, calories_from_fat,
                confidence, notes, description, keywords, fitbit_food_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(&p.food_name)
        .bind(p.amount)
        .bind(p.unit_id)
        .bind(p.calories)
        .bind(p.protein_g)
        .bind(p.carbs_g)
        .bind(p.fat_g)
        .bind(p.fiber_g)
        .bind(p.sodium_mg)
        .bind(p.saturated_fat_g)
        .bind(p.trans_fat_g)
        .bind(p.sugars_g)
        .bind(p.calories_from_fat)
        .bind(p.confidence.as_str())
        .bind(&p.notes)
        .bind(&p.description)
        .bind(&p.keywords)
        .bind(food.fitbit_food_id)
        .fetch_one(&self.db)
        .await
        .context("insert custom food")?;
        Ok(id)
    }

    async fn insert_food_log_entry(
        &self,
        user_id: Uuid,
        entry: &NewFoodLogEntry,
    ) -> anyhow::Result<i64> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        // the catalog row must belong to the same user
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO food_log_entries (
                user_id, custom_food_id, meal_type_id, amount, unit_id,
                log_date, log_time, fitbit_log_id
            )
            SELECT $1, cf.id, $3, $4, $5, $6, $7, $8
              FROM custom_foods cf
             WHERE cf.id = $2 AND cf.user_id = $1
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(entry.custom_food_id)
        .bind(entry.meal_type.id())
        .bind(entry.amount)
        .bind(entry.unit_id)
        .bind(entry.date)
        .bind(entry.time)
        .bind(entry.fitbit_log_id)
        .fetch_optional(&mut *tx)
        .await
        .context("insert food log entry")?
        .with_context(|| format!("custom food {} not found", entry.custom_food_id))?;

        sqlx::query(r#"UPDATE custom_foods SET last_used_at = now() WHERE id = $1"#)
            .bind(entry.custom_food_id)
            .execute(&mut *tx)
            .await
            .context("touch custom food")?;

        tx.commit().await.context("commit tx")?;
        Ok(id)
    }

    async fn get_custom_food_by_id(
        &self,
        user_id: Uuid,
        id: i64,
    ) -> anyhow::Result<Option<CustomFood>> {
        let sql = format!(
            "SELECT {CUSTOM_FOOD_COLUMNS} FROM custom_foods WHERE id = $1 AND user_id = $2"
        );
        let row = sqlx::query_as::<_, CustomFood>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("get custom food")?;
        Ok(row)
    }

    async fn update_custom_food_metadata(
        &self,
        user_id: Uuid,
        id: i64,
        patch: &MetadataPatch,
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE custom_foods
               SET description = COALESCE($3, description),
                   notes       = COALESCE($4, notes),
                   keywords    = COALESCE($5, keywords),
                   confidence  = COALESCE($6, confidence),
                   updated_at  = now()
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&patch.description)
        .bind(&patch.notes)
        .bind(&patch.keywords)
        .bind(patch.confidence.map(|c| c.as_str()))
        .execute(&self.db)
        .await
        .context("update custom food metadata")?;

        anyhow::ensure!(result.rows_affected() == 1, "custom food {id} not found");
        Ok(())
    }

    async fn list_custom_foods(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<CustomFood>> {
        let sql = format!(
            r#"
            SELECT {CUSTOM_FOOD_COLUMNS}
              FROM custom_foods
             WHERE user_id = $1
             ORDER BY last_used_at DESC, id DESC
             LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, CustomFood>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list custom foods")?;
        Ok(rows)
    }

    async fn list_food_log_entries(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> anyhow::Result<Vec<FoodLogEntry>> {
        let rows = sqlx::query_as::<_, FoodLogEntry>(
            r#"
            SELECT e.id, e.custom_food_id, cf.food_name, e.meal_type_id, e.amount, e.unit_id,
                   e.log_date, e.log_time, e.fitbit_log_id, e.logged_at
              FROM food_log_entries e
              JOIN custom_foods cf ON cf.id = e.custom_food_id
             WHERE e.user_id = $1 AND e.log_date = $2
             ORDER BY e.log_time ASC, e.id ASC
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.db)
        .await
        .context("list food log entries")?;
        Ok(rows)
    }
}
