//! Tripcraft Core Library
//!
//! Shared functionality for the tripcraft travel-planning assistant:
//! - Pluggable chat providers (Qwen, Ernie, Zhipu) behind one trait
//! - Resilient structured-response extraction from free-text model output
//! - Trip plan generation and budget analysis with deterministic fallbacks
//! - Cached, rate-limit-aware place resolution over a geocoding provider

pub mod ai;
pub mod error;
pub mod geo;
pub mod models;
pub mod planner;

pub use ai::{
    ChatBackend, ChatClient, ChatMessage, ErnieBackend, MockBackend, QwenBackend, ZhipuBackend,
};
pub use error::{Error, Result};
pub use geo::{
    haversine_km, is_international_destination, BaiduProvider, GeoPoint, GeocodeProvider,
    PlaceResolver, ResolverConfig,
};
pub use models::{
    Activity, BudgetAnalysis, BudgetBreakdown, CategoryUsage, DayPlan, Expense, Meal, MealType,
    Recommendation, RecommendationCategory, TravelPlan, TravelPreferences,
};
pub use planner::{default_budget, parse_budget_tier, Planner};
