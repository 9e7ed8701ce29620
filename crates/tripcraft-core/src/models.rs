//! Domain types for trip planning and budget tracking
//!
//! These types are provider-agnostic. Anything that crosses a provider
//! boundary is deserialized leniently (`#[serde(default)]`) and coerced to a
//! fully-typed shape before callers see it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// User trip preferences collected before planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelPreferences {
    /// Destination, free text (e.g., "北京", "东京")
    pub destination: String,
    /// Trip length in days
    pub duration: u32,
    /// Budget tier label (经济型 / 舒适型 / 豪华型)
    pub budget: String,
    /// Travel style label (e.g., "休闲", "深度游")
    pub travel_style: String,
    /// Interest tags (e.g., "美食", "历史")
    pub interests: Vec<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub travelers: Option<u32>,
}

/// A complete generated travel plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelPlan {
    pub id: String,
    pub destination: String,
    pub duration: u32,
    pub itinerary: Vec<DayPlan>,
    pub recommendations: Vec<Recommendation>,
    pub budget: BudgetBreakdown,
    pub created_at: String,
}

/// One day of a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub meals: Vec<Meal>,
    #[serde(default)]
    pub accommodation: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A scheduled activity within a day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub time: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub cost: Option<String>,
}

/// Meal slot within a day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meal {
    #[serde(rename = "type")]
    pub meal_type: MealType,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub cost: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// A recommended attraction, restaurant, hotel, activity, or tip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationCategory {
    Attraction,
    Restaurant,
    Hotel,
    Activity,
    Tip,
}

/// Budget split across expense categories, in yuan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetBreakdown {
    pub total: f64,
    pub accommodation: f64,
    pub food: f64,
    pub transportation: f64,
    pub activities: f64,
    #[serde(default)]
    pub miscellaneous: f64,
}

/// A recorded expense during the trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    /// YYYY-MM-DD
    pub date: String,
    /// Category label (accommodation/住宿, food/餐饮, ...)
    pub category: String,
    pub description: String,
    pub amount: f64,
}

/// Per-category budget usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryUsage {
    pub spent: f64,
    pub budget: f64,
    /// round(spent / budget * 100), 0 when the budget is 0. Negative when
    /// refunds outweigh spending in the category.
    pub percentage: i64,
}

/// Result of AI budget analysis
///
/// Every field is always present with the correct type, no matter how
/// malformed the raw model output was. See [`crate::ai::extract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAnalysis {
    /// Normalized free-text narrative
    pub analysis: String,
    /// Always an array; malformed input is replaced with an empty one
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Always numeric; non-numeric input is coerced to 0
    #[serde(default)]
    pub remaining: f64,
    /// Only populated when the caller supplies both expense records and a
    /// budget breakdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_breakdown: Option<BTreeMap<String, CategoryUsage>>,
}
