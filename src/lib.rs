//! Nutrition tracking: AI meal analysis, meal history, and calorie goals
//! derived from a user's biometric profile.

pub mod auth;
pub mod client;
pub mod config;
pub mod energy;
pub mod error;
pub mod firestore;
pub mod gemini;
pub mod meals;
pub mod models;
pub mod observability;
pub mod stats;
pub mod store;
pub mod tracker;

pub use energy::{compute_energy_plan, EnergyCalculator};
pub use error::{AuthError, EnergyError, ParseError};
pub use stats::{aggregate, group_by_day, week_over_week, Aggregate, TimeWindow};
