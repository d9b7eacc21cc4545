use serde::{Deserialize, Serialize};
use time::macros::format_description;

use crate::store::repo_types::FoodLogEntry;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { 20 }

pub const MAX_LIMIT: i64 = 100;

impl Pagination {
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, MAX_LIMIT), self.offset.max(0))
    }
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodLogEntryItem {
    pub id: i64,
    pub custom_food_id: i64,
    pub food_name: String,
    pub meal_type_id: i16,
    pub amount: f64,
    pub unit_id: i64,
    pub date: String,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitbit_log_id: Option<i64>,
}

impl TryFrom<FoodLogEntry> for FoodLogEntryItem {
    type Error = time::error::Format;

    fn try_from(e: FoodLogEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            id: e.id,
            custom_food_id: e.custom_food_id,
            food_name: e.food_name,
            meal_type_id: e.meal_type_id,
            amount: e.amount,
            unit_id: e.unit_id,
            date: e.log_date.format(format_description!("[year]-[month]-[day]"))?,
            time: e.log_time.format(format_description!("[hour]:[minute]:[second]"))?,
            fitbit_log_id: e.fitbit_log_id,
        })
    }
}
