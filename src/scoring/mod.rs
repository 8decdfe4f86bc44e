//! Credit scoring: weighted scorecard, decision table and fail-closed assessment

mod types;
mod engine;
mod explain;

pub use types::{CreditAssessment, Decision, KeyFactors, RiskFactor, RiskTier};
pub use engine::CreditScorer;
pub use explain::{explain, format_amount};
