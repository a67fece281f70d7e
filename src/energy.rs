//! Energy expenditure and macro allocation.
//!
//! Basal metabolic rate comes from the Mifflin-St Jeor equation (Mifflin et al.,
//! 1990). It is scaled by a fixed activity factor to get TDEE, and then shifted by
//! a goal-specific surplus or deficit. Everything here is pure: no I/O, no
//! clock, no shared state.

use crate::error::EnergyError;
use crate::models::{
    ActivityLevel, Biometrics, EnergyPlan, FitnessGoal, Gender, MacroTargets, UserProfile,
};

pub const MIN_AGE: u32 = 13;
pub const MAX_AGE: u32 = 120;
pub const MAX_WEIGHT_KG: f64 = 700.0;
pub const MAX_HEIGHT_CM: f64 = 300.0;

/// Default lower bound for a goal-adjusted deficit (kcal/day).
pub const DEFAULT_MIN_DAILY_CALORIES: i64 = 1200;

const BULKING_SURPLUS: i64 = 400;
const SHEDDING_DEFICIT: i64 = 500;

const KCAL_PER_G_CARBS: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;

impl Gender {
    /// Constant term of the Mifflin-St Jeor equation.
    ///
    /// `Other` uses -78, the mean of the male and female offsets. This is an
    /// app policy, not a published formula.
    pub fn bmr_offset(self) -> f64 {
        match self {
            Gender::Male => 5.0,
            Gender::Female => -161.0,
            Gender::Other => -78.0,
        }
    }
}

impl ActivityLevel {
    pub fn factor(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very active",
        }
    }
}

/// Per-goal macro policy: protein scales with bodyweight, carbs and fat with
/// the goal-adjusted calories.
struct MacroSplit {
    protein_g_per_kg: f64,
    carbs_share: f64,
    fat_share: f64,
}

impl FitnessGoal {
    fn macro_split(self) -> MacroSplit {
        match self {
            FitnessGoal::Maintenance => MacroSplit {
                protein_g_per_kg: 2.0,
                carbs_share: 0.45,
                fat_share: 0.25,
            },
            FitnessGoal::Bulking => MacroSplit {
                protein_g_per_kg: 2.2,
                carbs_share: 0.55,
                fat_share: 0.225,
            },
            FitnessGoal::Shedding => MacroSplit {
                protein_g_per_kg: 2.5,
                carbs_share: 0.35,
                fat_share: 0.30,
            },
        }
    }

    fn rationale(self) -> &'static str {
        match self {
            FitnessGoal::Maintenance => "eat at TDEE to maintain weight",
            FitnessGoal::Bulking => {
                "400 kcal surplus for roughly 0.25-0.5 kg of muscle gain per month"
            }
            FitnessGoal::Shedding => "500 kcal deficit for roughly 0.5 kg of fat loss per week",
        }
    }
}

impl UserProfile {
    /// Check that every field the calculator needs is present and in range.
    ///
    /// # Errors
    ///
    /// `IncompleteProfile` lists every absent or non-numeric field;
    /// `InvalidDomainValue` names the first field outside its range. Age must
    /// be within [`MIN_AGE`]..=[`MAX_AGE`], weight within (0, [`MAX_WEIGHT_KG`]]
    /// and height within (0, [`MAX_HEIGHT_CM`]].
    pub fn biometrics(&self) -> Result<Biometrics, EnergyError> {
        let weight = self.weight.filter(|w| w.is_finite());
        let height = self.height.filter(|h| h.is_finite());

        let mut missing = Vec::new();
        if self.age.is_none() {
            missing.push("age");
        }
        if self.gender.is_none() {
            missing.push("gender");
        }
        if weight.is_none() {
            missing.push("weight");
        }
        if height.is_none() {
            missing.push("height");
        }
        if self.activity_level.is_none() {
            missing.push("activityLevel");
        }
        if self.fitness_goal.is_none() {
            missing.push("fitnessGoal");
        }

        match (
            self.age,
            self.gender,
            weight,
            height,
            self.activity_level,
            self.fitness_goal,
        ) {
            (
                Some(age),
                Some(gender),
                Some(weight_kg),
                Some(height_cm),
                Some(activity_level),
                Some(fitness_goal),
            ) => {
                if !(MIN_AGE..=MAX_AGE).contains(&age) {
                    return Err(EnergyError::InvalidDomainValue {
                        field: "age",
                        value: f64::from(age),
                    });
                }
                if weight_kg <= 0.0 || weight_kg > MAX_WEIGHT_KG {
                    return Err(EnergyError::InvalidDomainValue {
                        field: "weight",
                        value: weight_kg,
                    });
                }
                if height_cm <= 0.0 || height_cm > MAX_HEIGHT_CM {
                    return Err(EnergyError::InvalidDomainValue {
                        field: "height",
                        value: height_cm,
                    });
                }
                Ok(Biometrics {
                    age,
                    gender,
                    weight_kg,
                    height_cm,
                    activity_level,
                    fitness_goal,
                })
            }
            _ => Err(EnergyError::IncompleteProfile { missing }),
        }
    }
}

/// Mifflin-St Jeor BMR in kcal/day, unrounded.
///
/// Formula: `10 x weight_kg + 6.25 x height_cm - 5 x age + offset`
pub fn basal_metabolic_rate(bio: &Biometrics) -> f64 {
    10.0 * bio.weight_kg + 6.25 * bio.height_cm - 5.0 * f64::from(bio.age)
        + bio.gender.bmr_offset()
}

/// Calculator carrying the calorie floor applied to deficits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyCalculator {
    min_daily_calories: i64,
}

impl Default for EnergyCalculator {
    fn default() -> Self {
        Self {
            min_daily_calories: DEFAULT_MIN_DAILY_CALORIES,
        }
    }
}

impl EnergyCalculator {
    /// Negative floors are treated as zero.
    pub fn new(min_daily_calories: i64) -> Self {
        Self {
            min_daily_calories: min_daily_calories.max(0),
        }
    }

    pub fn min_daily_calories(&self) -> i64 {
        self.min_daily_calories
    }

    /// # Errors
    ///
    /// Fails when the profile is incomplete or out of range, see
    /// [`UserProfile::biometrics`].
    pub fn compute(&self, profile: &UserProfile) -> Result<EnergyPlan, EnergyError> {
        let bio = profile.biometrics()?;
        self.compute_for(&bio)
    }

    /// # Errors
    ///
    /// Fails with `InvalidDomainValue` for `bmr` when the measurements are
    /// too extreme for the equation to yield a positive rate.
    pub fn compute_for(&self, bio: &Biometrics) -> Result<EnergyPlan, EnergyError> {
        let bmr = basal_metabolic_rate(bio);
        if bmr <= 0.0 {
            return Err(EnergyError::InvalidDomainValue {
                field: "bmr",
                value: bmr,
            });
        }

        let factor = bio.activity_level.factor();
        let tdee = (bmr * factor).round() as i64;

        let (daily_calories, floored) = self.adjust_for_goal(tdee, bio.fitness_goal);

        let split = bio.fitness_goal.macro_split();
        let kcal = daily_calories as f64;
        let macros = MacroTargets {
            protein: (bio.weight_kg * split.protein_g_per_kg).round() as u32,
            carbs: (kcal * split.carbs_share / KCAL_PER_G_CARBS).round() as u32,
            fat: (kcal * split.fat_share / KCAL_PER_G_FAT).round() as u32,
        };

        let mut explanation = format!(
            "BMR of {} kcal from the Mifflin-St Jeor equation, multiplied by {} for a {} \
             activity level gives a TDEE of {} kcal. Goal: {}, so the daily target is {} kcal.",
            bmr.round() as i64,
            factor,
            bio.activity_level.label(),
            tdee,
            bio.fitness_goal.rationale(),
            daily_calories,
        );
        if floored {
            explanation.push_str(&format!(
                " The deficit was limited so intake stays at or above {} kcal.",
                self.min_daily_calories.min(tdee)
            ));
        }

        Ok(EnergyPlan {
            bmr: bmr.round() as i64,
            tdee,
            daily_calories,
            macros,
            explanation,
        })
    }

    /// Returns the goal-adjusted intake and whether the floor kicked in.
    ///
    /// A deficit never takes intake below `min(floor, tdee)`, so a very low
    /// TDEE is never turned into a surplus by the floor.
    fn adjust_for_goal(&self, tdee: i64, goal: FitnessGoal) -> (i64, bool) {
        let (raw, floored) = match goal {
            FitnessGoal::Maintenance => (tdee, false),
            FitnessGoal::Bulking => (tdee + BULKING_SURPLUS, false),
            FitnessGoal::Shedding => {
                let target = tdee - SHEDDING_DEFICIT;
                let floor = self.min_daily_calories.min(tdee);
                if target < floor {
                    (floor, true)
                } else {
                    (target, false)
                }
            }
        };
        (raw.max(0), floored)
    }
}

/// Compute an energy plan with the default calorie floor.
///
/// # Errors
///
/// See [`EnergyCalculator::compute`].
pub fn compute_energy_plan(profile: &UserProfile) -> Result<EnergyPlan, EnergyError> {
    EnergyCalculator::default().compute(profile)
}
