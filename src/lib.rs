//! Micro-loan engine - credit scoring and loan lifecycle for mobile-money lending
//!
//! This library provides:
//! - Heuristic credit scoring with a fail-closed path for malformed input
//! - Annuity and equal-principal repayment schedules
//! - Loan lifecycle management on a SQLite store
//! - A mobile-money payment facade with token caching and retry
//! - Borrower notifications and portfolio reporting

pub mod applicant;
pub mod assumptions;
pub mod amortization;
pub mod scoring;
pub mod store;
pub mod payments;
pub mod notify;
pub mod lending;
pub mod error;

// Re-export commonly used types
pub use applicant::{Applicant, Financials, LoanRequest};
pub use assumptions::Assumptions;
pub use amortization::{build_schedule, compute_monthly_payment, ScheduleConfig};
pub use scoring::{CreditAssessment, CreditScorer, Decision, RiskTier};
pub use lending::{LendingService, Loan, LoanApplication};
pub use error::{LendingError, Result};
