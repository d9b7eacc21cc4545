//! Turns a raw JSON body into a [`LogRequest`]. The first failing rule wins;
//! nothing here touches Fitbit or the database.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use time::{Date, Month, Time};

use super::types::{
    Confidence, LogFlow, LogRequest, MealType, MetadataPatch, NutrientProfile,
};
use crate::error::ApiError;

pub const MAX_FOOD_NAME_CHARS: usize = 500;
pub const MAX_TEXT_CHARS: usize = 2000;
pub const MAX_KEYWORD_CHARS: usize = 100;
pub const MAX_KEYWORDS: usize = 20;

const REUSE_FIELD: &str = "reuseCustomFoodId";

type Result<T> = std::result::Result<T, ApiError>;

pub fn validate_log_request(body: &Value) -> Result<LogRequest> {
    let obj = body
        .as_object()
        .ok_or_else(|| ApiError::validation("request body must be a JSON object"))?;
    let fields = Fields(obj);

    // flow selector
    let reuse_id = match fields.present(REUSE_FIELD) {
        Some(v) => Some(
            v.as_i64()
                .ok_or_else(|| ApiError::validation("reuseCustomFoodId must be an integer"))?,
        ),
        None => None,
    };
    if reuse_id.is_some() && fields.present("food_name").is_some() {
        return Err(ApiError::validation(
            "provide either reuseCustomFoodId or a food profile, not both",
        ));
    }

    // required fields, typed
    let meal_type_id = fields.required_i64("mealTypeId")?;
    let date = fields.required_str("date")?;
    let time = fields.required_str("time")?;
    let draft = match reuse_id {
        Some(id) => Draft::Reuse(id, fields.reuse_patch()?),
        None => Draft::NewFood(fields.profile()?),
    };

    let meal_type = MealType::from_id(meal_type_id)
        .ok_or_else(|| ApiError::validation("mealTypeId must be one of 1, 2, 3, 4, 5, 7"))?;
    let date = parse_date(date)
        .ok_or_else(|| ApiError::validation("date must be a valid YYYY-MM-DD date"))?;
    let time = parse_time(time)
        .ok_or_else(|| ApiError::validation("time must be a valid HH:mm or HH:mm:ss time"))?;

    let flow = match draft {
        Draft::NewFood(profile) => {
            check_profile(&profile)?;
            LogFlow::NewFood(profile)
        }
        Draft::Reuse(id, metadata) => {
            check_patch(&metadata)?;
            if id <= 0 {
                return Err(ApiError::validation(
                    "reuseCustomFoodId must be a positive integer",
                ));
            }
            LogFlow::Reuse {
                custom_food_id: id,
                metadata,
            }
        }
    };

    Ok(LogRequest {
        meal_type,
        date,
        time,
        flow,
    })
}

enum Draft {
    NewFood(NutrientProfile),
    Reuse(i64, MetadataPatch),
}

struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    /// Absent and explicit `null` are the same thing.
    fn present(&self, name: &str) -> Option<&'a Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    fn required(&self, name: &str) -> Result<&'a Value> {
        self.present(name)
            .ok_or_else(|| ApiError::validation(format!("{name} is required")))
    }

    fn required_i64(&self, name: &str) -> Result<i64> {
        self.required(name)?
            .as_i64()
            .ok_or_else(|| ApiError::validation(format!("{name} must be an integer")))
    }

    fn required_f64(&self, name: &str) -> Result<f64> {
        number(name, self.required(name)?)
    }

    fn required_str(&self, name: &str) -> Result<&'a str> {
        string(name, self.required(name)?)
    }

    fn optional_f64(&self, name: &str) -> Result<Option<f64>> {
        self.present(name).map(|v| number(name, v)).transpose()
    }

    fn optional_string(&self, name: &str) -> Result<Option<String>> {
        self.present(name)
            .map(|v| string(name, v).map(str::to_owned))
            .transpose()
    }

    fn optional_keywords(&self, name: &str) -> Result<Option<Vec<String>>> {
        let Some(v) = self.present(name) else {
            return Ok(None);
        };
        let not_list = || ApiError::validation(format!("{name} must be an array of strings"));
        v.as_array()
            .ok_or_else(not_list)?
            .iter()
            .map(|k| k.as_str().map(str::to_owned).ok_or_else(not_list))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn confidence(&self, name: &str, raw: &str) -> Result<Confidence> {
        Confidence::parse(raw)
            .ok_or_else(|| ApiError::validation(format!("{name} must be one of high, medium, low")))
    }

    fn profile(&self) -> Result<NutrientProfile> {
        let food_name = self.required_str("food_name")?.to_owned();
        let amount = self.required_f64("amount")?;
        let unit_id = self.required_i64("unit_id")?;
        let calories = self.required_f64("calories")?;
        let protein_g = self.required_f64("protein_g")?;
        let carbs_g = self.required_f64("carbs_g")?;
        let fat_g = self.required_f64("fat_g")?;
        let fiber_g = self.required_f64("fiber_g")?;
        let sodium_mg = self.required_f64("sodium_mg")?;
        let confidence = self.required_str("confidence")?;
        let confidence = self.confidence("confidence", confidence)?;

        Ok(NutrientProfile {
            food_name,
            amount,
            unit_id,
            calories,
            protein_g,
            carbs_g,
            fat_g,
            fiber_g,
            sodium_mg,
            saturated_fat_g: self.optional_f64("saturated_fat_g")?,
            trans_fat_g: self.optional_f64("trans_fat_g")?,
            sugars_g: self.optional_f64("sugars_g")?,
            calories_from_fat: self.optional_f64("calories_from_fat")?,
            confidence,
            notes: self.optional_string("notes")?,
            description: self.optional_string("description")?,
            keywords: self.optional_keywords("keywords")?.unwrap_or_default(),
        })
    }

    fn reuse_patch(&self) -> Result<MetadataPatch> {
        let confidence = match self.optional_string("newConfidence")? {
            Some(raw) => Some(self.confidence("newConfidence", &raw)?),
            None => None,
        };
        Ok(MetadataPatch {
            description: self.optional_string("newDescription")?,
            notes: self.optional_string("newNotes")?,
            keywords: self.optional_keywords("newKeywords")?,
            confidence,
        })
    }
}

fn number(name: &str, v: &Value) -> Result<f64> {
    v.as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ApiError::validation(format!("{name} must be a number")))
}

fn string<'a>(name: &str, v: &'a Value) -> Result<&'a str> {
    v.as_str()
        .ok_or_else(|| ApiError::validation(format!("{name} must be a string")))
}

fn check_profile(p: &NutrientProfile) -> Result<()> {
    if p.food_name.trim().is_empty() {
        return Err(ApiError::validation("food_name must not be empty"));
    }
    check_len("food_name", &p.food_name, MAX_FOOD_NAME_CHARS)?;
    check_opt_len("description", p.description.as_deref(), MAX_TEXT_CHARS)?;
    check_opt_len("notes", p.notes.as_deref(), MAX_TEXT_CHARS)?;
    check_keywords("keywords", &p.keywords)?;

    if p.amount <= 0.0 {
        return Err(ApiError::validation("amount must be greater than 0"));
    }
    if p.unit_id <= 0 {
        return Err(ApiError::validation("unit_id must be a positive integer"));
    }
    let nutrients = [
        ("calories", Some(p.calories)),
        ("protein_g", Some(p.protein_g)),
        ("carbs_g", Some(p.carbs_g)),
        ("fat_g", Some(p.fat_g)),
        ("fiber_g", Some(p.fiber_g)),
        ("sodium_mg", Some(p.sodium_mg)),
        ("saturated_fat_g", p.saturated_fat_g),
        ("trans_fat_g", p.trans_fat_g),
        ("sugars_g", p.sugars_g),
        ("calories_from_fat", p.calories_from_fat),
    ];
    for (name, value) in nutrients {
        if value.is_some_and(|v| v < 0.0) {
            return Err(ApiError::validation(format!("{name} must not be negative")));
        }
    }
    Ok(())
}

fn check_patch(p: &MetadataPatch) -> Result<()> {
    check_opt_len("newDescription", p.description.as_deref(), MAX_TEXT_CHARS)?;
    check_opt_len("newNotes", p.notes.as_deref(), MAX_TEXT_CHARS)?;
    if let Some(keywords) = &p.keywords {
        check_keywords("newKeywords", keywords)?;
    }
    Ok(())
}

fn check_len(name: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(ApiError::validation(format!(
            "{name} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn check_opt_len(name: &str, value: Option<&str>, max: usize) -> Result<()> {
    value.map_or(Ok(()), |v| check_len(name, v, max))
}

fn check_keywords(name: &str, keywords: &[String]) -> Result<()> {
    if keywords.len() > MAX_KEYWORDS {
        return Err(ApiError::validation(format!(
            "{name} must have at most {MAX_KEYWORDS} entries"
        )));
    }
    if keywords.iter().any(|k| k.chars().count() > MAX_KEYWORD_CHARS) {
        return Err(ApiError::validation(format!(
            "{name} entries must be at most {MAX_KEYWORD_CHARS} characters"
        )));
    }
    Ok(())
}

pub(crate) fn parse_date(s: &str) -> Option<Date> {
    lazy_static! {
        static ref DATE_RE: Regex = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap();
    }
    let caps = DATE_RE.captures(s)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u8 = caps[2].parse().ok()?;
    let day: u8 = caps[3].parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

fn parse_time(s: &str) -> Option<Time> {
    lazy_static! {
        static ref TIME_RE: Regex = Regex::new(r"^(\d{2}):(\d{2})(?::(\d{2}))?$").unwrap();
    }
    let caps = TIME_RE.captures(s)?;
    let hour: u8 = caps[1].parse().ok()?;
    let minute: u8 = caps[2].parse().ok()?;
    let second: u8 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    Time::from_hms(hour, minute, second).ok()
}
