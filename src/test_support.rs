//! In-memory fakes for the Fitbit client and the local store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::fitbit::{
    AccessToken, FitbitClient, FitbitError, FoodLogParams, RemoteFood, RemoteLogResult,
};
use crate::food_log::types::{MetadataPatch, NutrientProfile};
use crate::store::repo_types::{CustomFood, FoodLogEntry, NewCustomFood, NewFoodLogEntry};
use crate::store::FoodStore;

pub fn new_food_body() -> Value {
    json!({
        "food_name": "Chicken rice bowl",
        "amount": 1,
        "unit_id": 304,
        "calories": 650,
        "protein_g": 38.5,
        "carbs_g": 72,
        "fat_g": 18,
        "fiber_g": 4,
        "sodium_mg": 820,
        "confidence": "high",
        "keywords": ["chicken", "rice"],
        "mealTypeId": 3,
        "date": "2024-01-15",
        "time": "12:30:00"
    })
}

pub fn reuse_body(id: i64) -> Value {
    json!({
        "reuseCustomFoodId": id,
        "mealTypeId": 1,
        "date": "2024-01-15",
        "time": "08:15"
    })
}

pub fn stored_food(id: i64, fitbit_food_id: Option<i64>) -> CustomFood {
    let now = OffsetDateTime::now_utc();
    CustomFood {
        id,
        food_name: "Overnight oats".into(),
        amount: 2.0,
        unit_id: 147,
        calories: 320.0,
        protein_g: 12.0,
        carbs_g: 50.0,
        fat_g: 8.0,
        fiber_g: 7.0,
        sodium_mg: 90.0,
        saturated_fat_g: None,
        trans_fat_g: None,
        sugars_g: Some(11.0),
        calories_from_fat: None,
        confidence: "medium".into(),
        notes: None,
        description: None,
        keywords: vec!["oats".into()],
        fitbit_food_id,
        created_at: now,
        last_used_at: now,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    EnsureToken,
    FindOrCreate,
    LogFood(i64),
    DeleteLog(i64),
}

pub struct FakeFitbit {
    food: RemoteFood,
    log_id: i64,
    token_error: Option<FitbitError>,
    food_error: Option<FitbitError>,
    log_error: Option<FitbitError>,
    delete_error: Option<FitbitError>,
    calls: Mutex<Vec<Call>>,
}

impl FakeFitbit {
    pub fn new(food_id: i64, reused: bool, log_id: i64) -> Self {
        Self {
            food: RemoteFood { food_id, reused },
            log_id,
            token_error: None,
            food_error: None,
            log_error: None,
            delete_error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_token(mut self, e: FitbitError) -> Self {
        self.token_error = Some(e);
        self
    }

    pub fn fail_food(mut self, e: FitbitError) -> Self {
        self.food_error = Some(e);
        self
    }

    pub fn fail_log(mut self, e: FitbitError) -> Self {
        self.log_error = Some(e);
        self
    }

    pub fn fail_delete(mut self, e: FitbitError) -> Self {
        self.delete_error = Some(e);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call, error: &Option<FitbitError>) -> Result<(), FitbitError> {
        self.calls.lock().unwrap().push(call);
        match error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FitbitClient for FakeFitbit {
    async fn ensure_fresh_token(&self, _user_id: Uuid) -> Result<AccessToken, FitbitError> {
        self.record(Call::EnsureToken, &self.token_error)?;
        Ok(AccessToken("fake-token".into()))
    }

    async fn find_or_create_food(
        &self,
        _token: &AccessToken,
        _profile: &NutrientProfile,
    ) -> Result<RemoteFood, FitbitError> {
        self.record(Call::FindOrCreate, &self.food_error)?;
        Ok(self.food)
    }

    async fn log_food(
        &self,
        _token: &AccessToken,
        params: &FoodLogParams,
    ) -> Result<RemoteLogResult, FitbitError> {
        self.record(Call::LogFood(params.food_id), &self.log_error)?;
        Ok(RemoteLogResult { log_id: self.log_id })
    }

    async fn delete_food_log(&self, _token: &AccessToken, log_id: i64) -> Result<(), FitbitError> {
        self.record(Call::DeleteLog(log_id), &self.delete_error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCall {
    InsertCustomFood,
    InsertFoodLogEntry,
    GetCustomFood,
    UpdateMetadata,
    ListCustomFoods,
    ListFoodLogEntries,
}

#[derive(Default)]
struct StoreState {
    calls: Vec<StoreCall>,
    stored: BTreeMap<i64, CustomFood>,
    inserted_foods: Vec<NewCustomFood>,
    inserted_entries: Vec<NewFoodLogEntry>,
    patches: Vec<(i64, MetadataPatch)>,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
    failing: Vec<StoreCall>,
}

impl FakeStore {
    pub fn with_food(self, food: CustomFood) -> Self {
        self.state.lock().unwrap().stored.insert(food.id, food);
        self
    }

    pub fn fail_on(mut self, call: StoreCall) -> Self {
        self.failing.push(call);
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: StoreCall) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    pub fn inserted_foods(&self) -> Vec<NewCustomFood> {
        self.state.lock().unwrap().inserted_foods.clone()
    }

    pub fn inserted_entries(&self) -> Vec<NewFoodLogEntry> {
        self.state.lock().unwrap().inserted_entries.clone()
    }

    pub fn patches(&self) -> Vec<(i64, MetadataPatch)> {
        self.state.lock().unwrap().patches.clone()
    }

    fn record(&self, call: StoreCall) -> anyhow::Result<()> {
        self.state.lock().unwrap().calls.push(call);
        if self.failing.contains(&call) {
            anyhow::bail!("simulated {call:?} failure");
        }
        Ok(())
    }
}

#[async_trait]
impl FoodStore for FakeStore {
    async fn insert_custom_food(&self, _user_id: Uuid, food: &NewCustomFood) -> anyhow::Result<i64> {
        self.record(StoreCall::InsertCustomFood)?;
        let mut state = self.state.lock().unwrap();
        state.inserted_foods.push(food.clone());
        Ok(state.inserted_foods.len() as i64)
    }

    async fn insert_food_log_entry(
        &self,
        _user_id: Uuid,
        entry: &NewFoodLogEntry,
    ) -> anyhow::Result<i64> {
        self.record(StoreCall::InsertFoodLogEntry)?;
        let mut state = self.state.lock().unwrap();
        state.inserted_entries.push(entry.clone());
        Ok(999 + state.inserted_entries.len() as i64)
    }

    async fn get_custom_food_by_id(
        &self,
        _user_id: Uuid,
        id: i64,
    ) -> anyhow::Result<Option<CustomFood>> {
        self.record(StoreCall::GetCustomFood)?;
        Ok(self.state.lock().unwrap().stored.get(&id).cloned())
    }

    async fn update_custom_food_metadata(
        &self,
        _user_id: Uuid,
        id: i64,
        patch: &MetadataPatch,
    ) -> anyhow::Result<()> {
        self.record(StoreCall::UpdateMetadata)?;
        self.state.lock().unwrap().patches.push((id, patch.clone()));
        Ok(())
    }

    async fn list_custom_foods(
        &self,
        _user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<CustomFood>> {
        self.record(StoreCall::ListCustomFoods)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .stored
            .values()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_food_log_entries(
        &self,
        _user_id: Uuid,
        date: Date,
    ) -> anyhow::Result<Vec<FoodLogEntry>> {
        self.record(StoreCall::ListFoodLogEntries)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .inserted_entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.date == date)
            .map(|(i, e)| FoodLogEntry {
                id: 1000 + i as i64,
                custom_food_id: e.custom_food_id,
                food_name: state
                    .stored
                    .get(&e.custom_food_id)
                    .map(|f| f.food_name.clone())
                    .unwrap_or_default(),
                meal_type_id: e.meal_type.id(),
                amount: e.amount,
                unit_id: e.unit_id,
                log_date: e.date,
                log_time: e.time,
                fitbit_log_id: e.fitbit_log_id,
                logged_at: OffsetDateTime::now_utc(),
            })
            .collect())
    }
}
