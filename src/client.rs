use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{FirebaseAuth, ProviderCredential, Session};
use crate::config::Config;
use crate::energy::EnergyCalculator;
use crate::firestore::FirestoreClient;
use crate::gemini::{self, FoodAnalysis, FoodQuery, GeminiClient, ImageInput};
use crate::meals::MealRepository;
use crate::models::{EnergyPlan, MealRecord, NewMeal, UserProfile};
use crate::stats::{
    self, Aggregate, DailySummary, MonthCalendar, MonthlyStats, ProfileSummary, WeekComparison,
};
use crate::tracker::{self, CalorieStatus};

/// This week against last week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub current: Aggregate,
    pub previous: Aggregate,
    pub change: WeekComparison,
}

/// Everything the app does for one signed-in user.
#[derive(Clone)]
pub struct NutriScanClient {
    pub auth: FirebaseAuth,
    pub session: Session,
    meals: MealRepository<FirestoreClient>,
    gemini: GeminiClient,
    calculator: EnergyCalculator,
}

impl NutriScanClient {
    /// Sign in with email and password.
    pub async fn login(config: &Config, email: &str, password: &str) -> Result<Self> {
        let auth = FirebaseAuth::new(config.firebase.api_key.clone());
        let session = auth.sign_in(email, password).await?;
        Self::from_session(config, auth, session).await
    }

    /// Create an account and sign in.
    pub async fn sign_up(config: &Config, email: &str, password: &str) -> Result<Self> {
        let auth = FirebaseAuth::new(config.firebase.api_key.clone());
        let session = auth.sign_up(email, password).await?;
        Self::from_session(config, auth, session).await
    }

    pub async fn sign_in_with_provider(
        config: &Config,
        credential: &ProviderCredential,
    ) -> Result<Self> {
        let auth = FirebaseAuth::new(config.firebase.api_key.clone());
        let session = auth.sign_in_with_provider(credential).await?;
        Self::from_session(config, auth, session).await
    }

    /// Resume from a refresh token saved by an earlier session.
    pub async fn restore(config: &Config, refresh_token: String) -> Result<Self> {
        let auth = FirebaseAuth::new(config.firebase.api_key.clone());
        let session = auth.restore(refresh_token).await?;
        Self::from_session(config, auth, session).await
    }

    pub async fn from_session(config: &Config, auth: FirebaseAuth, session: Session) -> Result<Self> {
        let uid = session.uid().await?;
        let firestore = FirestoreClient::new(config.firebase.project_id.clone(), session.clone());
        Ok(Self {
            auth,
            session,
            meals: MealRepository::new(firestore, uid),
            gemini: GeminiClient::with_model(
                config.gemini.api_key.clone(),
                config.gemini.model.clone(),
                config.gemini.base_url.clone(),
            ),
            calculator: EnergyCalculator::new(config.energy.min_daily_calories),
        })
    }

    pub async fn sign_out(self) {
        self.auth.sign_out(&self.session).await;
    }

    pub async fn profile(&self) -> Result<Option<UserProfile>> {
        self.meals.profile().await
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.meals.save_profile(profile, Utc::now()).await
    }

    pub async fn update_profile(&self, changes: &UserProfile) -> Result<()> {
        self.meals.update_profile(changes, Utc::now()).await
    }

    /// Energy plan for the stored profile.
    ///
    /// A user who never finished onboarding gets `IncompleteProfile` listing
    /// every field, so the caller can send them back to complete it.
    pub async fn energy_plan(&self) -> Result<EnergyPlan> {
        let profile = self.profile().await?.unwrap_or_default();
        let plan = self.calculator.compute(&profile)?;
        Ok(plan)
    }

    /// Today's intake against the energy plan.
    pub async fn calorie_status<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> Result<CalorieStatus> {
        let plan = self.energy_plan().await?;
        let today = self.meals.today_stats(now, tz).await?;
        Ok(tracker::calorie_status(&plan, today.total_calories))
    }

    pub async fn analyze_text(&self, dish: &str, description: Option<&str>) -> Result<FoodAnalysis> {
        self.gemini
            .analyze(&FoodQuery {
                image: None,
                text: Some(dish.to_string()),
                description: description.map(String::from),
            })
            .await
    }

    pub async fn analyze_image(
        &self,
        image: ImageInput,
        description: Option<&str>,
    ) -> Result<FoodAnalysis> {
        self.gemini
            .analyze(&FoodQuery {
                image: Some(image),
                text: None,
                description: description.map(String::from),
            })
            .await
    }

    pub async fn save_meal(&self, meal: &NewMeal) -> Result<String> {
        self.meals.save_meal(meal).await
    }

    /// All meals, newest first.
    pub async fn history(&self) -> Result<Vec<MealRecord>> {
        self.meals.meals().await
    }

    /// History grouped by local day, newest day first.
    pub async fn history_by_day<Tz: TimeZone>(&self, tz: &Tz) -> Result<Vec<(NaiveDate, Vec<MealRecord>)>> {
        let groups = self.meals.meals_grouped_by_date(None, None, tz).await?;
        Ok(groups.into_iter().rev().collect())
    }

    pub async fn delete_meal(&self, id: &str) -> Result<()> {
        self.meals.delete_meal(id).await
    }

    pub async fn today_stats<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> Result<DailySummary> {
        self.meals.today_stats(now, tz).await
    }

    pub async fn monthly_stats<Tz: TimeZone>(&self, year: i32, month: u32, tz: &Tz) -> Result<MonthlyStats> {
        self.meals.monthly_stats(year, month, tz).await
    }

    pub async fn month_calendar<Tz: TimeZone>(
        &self,
        year: i32,
        month: u32,
        tz: &Tz,
    ) -> Result<MonthCalendar> {
        let meals = self.meals.meals().await?;
        stats::month_calendar(&meals, year, month, tz)
            .ok_or_else(|| anyhow::anyhow!("invalid month {}-{}", year, month))
    }

    pub async fn profile_summary(&self, now: DateTime<Utc>) -> Result<ProfileSummary> {
        let meals = self.meals.meals().await?;
        Ok(stats::profile_summary(&meals, now))
    }

    pub async fn week_comparison(&self, now: DateTime<Utc>) -> Result<WeeklyReport> {
        let meals = self.meals.meals().await?;
        let (this_week, last_week) = stats::week_windows(now);
        let current = stats::aggregate(&meals, this_week);
        let previous = stats::aggregate(&meals, last_week);
        Ok(WeeklyReport {
            change: stats::week_over_week(&current, &previous),
            current,
            previous,
        })
    }

    /// Tips for today's meals. Never fails: with nothing logged the default
    /// tips are returned, and on any error the fallback tips.
    pub async fn tips<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> Vec<String> {
        let meals = match self.meals.meals().await {
            Ok(meals) => meals,
            Err(e) => {
                tracing::warn!(error = %e, "could not load meals for tips");
                return gemini::fallback_tips();
            }
        };

        let today = stats::day_window(stats::local_date(now, tz), tz);
        let todays: Vec<MealRecord> = meals
            .into_iter()
            .filter(|m| today.contains(m.created_at))
            .collect();
        if todays.is_empty() {
            return gemini::default_tips();
        }

        let total: f64 = todays.iter().map(|m| m.calories).sum();
        match self.gemini.tips(&todays, total).await {
            Ok(tips) => tips,
            Err(e) => {
                tracing::warn!(error = %e, "tip generation failed, using fallback tips");
                gemini::fallback_tips()
            }
        }
    }
}

