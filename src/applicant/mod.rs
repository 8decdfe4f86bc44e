//! Applicant data structures and intake loading

mod data;
pub mod loader;

pub use data::{Applicant, CreditHistory, EmploymentStatus, Financials, LoanRequest};
pub use loader::{load_applicants, load_applicants_from_reader};
