use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::models::{Macros, MealRecord, NewMeal, UserProfile};
use crate::stats::{self, DailySummary, MonthlyStats, TimeWindow};
use crate::store::{DocumentStore, OrderBy, SetOptions};

fn timestamp(at: DateTime<Utc>) -> Value {
    json!(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// One user's meal history and profile, on top of any [`DocumentStore`].
///
/// Meals live in `users/{uid}/meals`, the profile in `users/{uid}/profile/main`.
#[derive(Clone)]
pub struct MealRepository<S> {
    store: S,
    uid: String,
}

impl<S: DocumentStore> MealRepository<S> {
    pub fn new(store: S, uid: impl Into<String>) -> Self {
        Self {
            store,
            uid: uid.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn meals_path(&self) -> String {
        format!("users/{}/meals", self.uid)
    }

    fn profile_path(&self) -> String {
        format!("users/{}/profile/main", self.uid)
    }

    pub async fn save_meal(&self, meal: &NewMeal) -> Result<String> {
        self.save_meal_at(meal, Utc::now()).await
    }

    /// Save a meal stamped with `created_at` and return its id.
    pub async fn save_meal_at(&self, meal: &NewMeal, created_at: DateTime<Utc>) -> Result<String> {
        let mut doc = Map::new();
        doc.insert("foodName".into(), json!(meal.food_name));
        doc.insert("imageUrl".into(), json!(meal.image_url));
        doc.insert("calories".into(), json!(meal.calories));
        doc.insert(
            "macros".into(),
            json!({
                "protein": meal.macros.protein,
                "carbs": meal.macros.carbs,
                "fat": meal.macros.fat,
                "fiber": meal.macros.fiber,
                "sugar": meal.macros.sugar
            }),
        );
        doc.insert("recommendations".into(), json!(meal.recommendations));
        doc.insert("createdAt".into(), timestamp(created_at));

        let id = self.store.save(&self.meals_path(), doc).await?;
        tracing::info!(uid = %self.uid, meal_id = %id, "saved meal");
        Ok(id)
    }

    /// All meals, newest first. Documents that cannot be read are skipped.
    pub async fn meals(&self) -> Result<Vec<MealRecord>> {
        let docs = self
            .store
            .query(&self.meals_path(), OrderBy::desc("createdAt"))
            .await?;

        let mut meals = Vec::with_capacity(docs.len());
        for doc in docs {
            match parse_meal(&doc.id, &doc.data) {
                Some(meal) => meals.push(meal),
                None => tracing::warn!(meal_id = %doc.id, "skipping unreadable meal document"),
            }
        }
        Ok(meals)
    }

    pub async fn delete_meal(&self, id: &str) -> Result<()> {
        self.store
            .delete(&format!("{}/{}", self.meals_path(), id))
            .await?;
        tracing::info!(uid = %self.uid, meal_id = %id, "deleted meal");
        Ok(())
    }

    pub async fn today_stats<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> Result<DailySummary> {
        let meals = self.meals().await?;
        Ok(stats::today_stats(&meals, now, tz))
    }

    /// Meals grouped by local day, optionally limited to `[start, end)`.
    pub async fn meals_grouped_by_date<Tz: TimeZone>(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        tz: &Tz,
    ) -> Result<BTreeMap<NaiveDate, Vec<MealRecord>>> {
        let window = TimeWindow::new(
            start.unwrap_or(DateTime::<Utc>::MIN_UTC),
            end.unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        let meals: Vec<MealRecord> = self
            .meals()
            .await?
            .into_iter()
            .filter(|m| window.contains(m.created_at))
            .collect();
        Ok(stats::group_by_day(&meals, tz))
    }

    pub async fn monthly_stats<Tz: TimeZone>(
        &self,
        year: i32,
        month: u32,
        tz: &Tz,
    ) -> Result<MonthlyStats> {
        let meals = self.meals().await?;
        stats::monthly_stats(&meals, year, month, tz)
            .ok_or_else(|| anyhow!("invalid month {}-{}", year, month))
    }

    /// Store the full profile, replacing any previous one.
    pub async fn save_profile(&self, profile: &UserProfile, now: DateTime<Utc>) -> Result<()> {
        let mut doc = profile_fields(profile)?;
        doc.insert("uid".into(), json!(self.uid));
        doc.insert("createdAt".into(), timestamp(now));
        doc.insert("updatedAt".into(), timestamp(now));

        self.store
            .set(&self.profile_path(), doc, SetOptions { merge: false })
            .await?;
        tracing::info!(uid = %self.uid, "saved profile");
        Ok(())
    }

    /// `None` until onboarding has stored a profile.
    pub async fn profile(&self) -> Result<Option<UserProfile>> {
        match self.store.get(&self.profile_path()).await? {
            Some(data) => Ok(Some(serde_json::from_value(data)?)),
            None => Ok(None),
        }
    }

    /// Merge the fields set in `changes` into the stored profile.
    pub async fn update_profile(&self, changes: &UserProfile, now: DateTime<Utc>) -> Result<()> {
        let mut doc = profile_fields(changes)?;
        doc.remove("uid");
        doc.remove("createdAt");
        doc.insert("updatedAt".into(), timestamp(now));

        self.store
            .set(&self.profile_path(), doc, SetOptions { merge: true })
            .await?;
        tracing::info!(uid = %self.uid, "updated profile");
        Ok(())
    }
}

fn profile_fields(profile: &UserProfile) -> Result<Map<String, Value>> {
    match serde_json::to_value(profile)? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("profile serialized to non-object: {}", other)),
    }
}

/// Read a meal document written by any client version.
///
/// Numbers may arrive as strings; missing macros read as 0. A document
/// without a readable `createdAt` is rejected.
pub fn parse_meal(id: &str, data: &Value) -> Option<MealRecord> {
    let obj = data.as_object()?;

    let as_num = |v: &Value| -> Option<f64> {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .filter(|n| n.is_finite())
    };

    let created_at = obj
        .get("createdAt")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())?
        .with_timezone(&Utc);

    let macros = obj.get("macros").and_then(|v| v.as_object());
    let macro_num = |k: &str| -> f64 {
        macros
            .and_then(|m| m.get(k))
            .and_then(as_num)
            .unwrap_or(0.0)
    };

    let recommendations = obj
        .get("recommendations")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|r| r.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    Some(MealRecord {
        id: id.to_string(),
        food_name: obj
            .get("foodName")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        image_url: obj
            .get("imageUrl")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from),
        calories: obj.get("calories").and_then(as_num).unwrap_or(0.0),
        macros: Macros {
            protein: macro_num("protein"),
            carbs: macro_num("carbs"),
            fat: macro_num("fat"),
            fiber: macro_num("fiber"),
            sugar: macro_num("sugar"),
        },
        recommendations,
        created_at,
    })
}
