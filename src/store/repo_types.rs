use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime, Time};

use crate::food_log::types::{MealType, NutrientProfile};

/// Catalog row as stored locally.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomFood {
    pub id: i64,
    pub food_name: String,
    pub amount: f64,
    pub unit_id: i64,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub sodium_mg: f64,
    pub saturated_fat_g: Option<f64>,
    pub trans_fat_g: Option<f64>,
    pub sugars_g: Option<f64>,
    pub calories_from_fat: Option<f64>,
    pub confidence: String,
    pub notes: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub fitbit_food_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_used_at: OffsetDateTime,
}

/// Log line joined with the name of the food it points at.
#[derive(Debug, Clone, FromRow)]
pub struct FoodLogEntry {
    pub id: i64,
    pub custom_food_id: i64,
    pub food_name: String,
    pub meal_type_id: i16,
    pub amount: f64,
    pub unit_id: i64,
    pub log_date: Date,
    pub log_time: Time,
    pub fitbit_log_id: Option<i64>,
    pub logged_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomFood {
    pub profile: NutrientProfile,
    /// `None` in dry-run mode.
    pub fitbit_food_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFoodLogEntry {
    pub custom_food_id: i64,
    pub meal_type: MealType,
    pub amount: f64,
    pub unit_id: i64,
    pub date: Date,
    pub time: Time,
    /// `None` exactly when the remote log step was skipped (dry run).
    pub fitbit_log_id: Option<i64>,
}
