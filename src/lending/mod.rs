//! Loan lifecycle: records, state rules, orchestration and reporting

mod portfolio;
mod records;
mod service;

pub use portfolio::{ApplicationStats, PortfolioStats};
pub use records::{
    ApplicantRecord, ApplicationStatus, AppliedPayment, Installment, InstallmentStatus, Loan,
    LoanApplication, LoanStatus, Transaction, TransactionKind, TransactionStatus,
};
pub use service::{LendingService, LoanDetails, PaymentOutcome, ServiceConfig, Settlement};
