use serde::{Deserialize, Serialize};
use time::{Date, Time};

/// Fitbit meal slots accepted by this service. Slot 6 ("evening snack") is
/// not part of the product's meal taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealType {
    Breakfast = 1,
    MorningSnack = 2,
    Lunch = 3,
    AfternoonSnack = 4,
    Dinner = 5,
    Anytime = 7,
}

impl MealType {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Breakfast),
            2 => Some(Self::MorningSnack),
            3 => Some(Self::Lunch),
            4 => Some(Self::AfternoonSnack),
            5 => Some(Self::Dinner),
            7 => Some(Self::Anytime),
            _ => None,
        }
    }

    pub fn id(self) -> i16 {
        self as i16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Nutrition facts for one serving, as produced by meal analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct NutrientProfile {
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
    pub confidence: Confidence,
    pub notes: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

/// Catalog metadata overrides sent with a re-log. Only supplied fields are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub description: Option<String>,
    pub notes: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub confidence: Option<Confidence>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.notes.is_none()
            && self.keywords.is_none()
            && self.confidence.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFlow {
    NewFood(NutrientProfile),
    Reuse {
        custom_food_id: i64,
        metadata: MetadataPatch,
    },
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRequest {
    pub meal_type: MealType,
    pub date: Date,
    pub time: Time,
    pub flow: LogFlow,
}

/// Which catalog entry is being logged, and under which Fitbit food id.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFood {
    /// `None` only in dry-run mode.
    pub fitbit_food_id: Option<i64>,
    /// Set up front for reuse; assigned during persistence for new foods.
    pub custom_food_id: Option<i64>,
    pub reused: bool,
    pub amount: f64,
    pub unit_id: i64,
}
