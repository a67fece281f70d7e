use serde::{Deserialize, Serialize};

use crate::models::{EnergyPlan, MacroTargets};

/// How today's intake compares with the goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalorieStatus {
    pub daily_goal: i64,
    pub consumed: f64,
    /// Never negative; 0 once the goal is reached.
    pub remaining: f64,
    pub bmr: i64,
    pub tdee: i64,
    pub macros: MacroTargets,
    pub explanation: String,
}

pub fn calorie_status(plan: &EnergyPlan, consumed: f64) -> CalorieStatus {
    CalorieStatus {
        daily_goal: plan.daily_calories,
        consumed,
        remaining: (plan.daily_calories as f64 - consumed).max(0.0),
        bmr: plan.bmr,
        tdee: plan.tdee,
        macros: plan.macros,
        explanation: plan.explanation.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(daily_calories: i64) -> EnergyPlan {
        EnergyPlan {
            bmr: 1500,
            tdee: 2000,
            daily_calories,
            macros: MacroTargets {
                protein: 150,
                carbs: 200,
                fat: 60,
            },
            explanation: String::new(),
        }
    }

    #[test]
    fn remaining_counts_down() {
        let status = calorie_status(&plan(2000), 750.0);
        assert_eq!(status.remaining, 1250.0);
        assert_eq!(status.daily_goal, 2000);
    }

    #[test]
    fn remaining_stops_at_zero() {
        let status = calorie_status(&plan(2000), 2600.0);
        assert_eq!(status.remaining, 0.0);
        assert_eq!(status.consumed, 2600.0);
    }
}
