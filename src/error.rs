//! Error types for the lending engine

use thiserror::Error;

use crate::store::StoreError;

/// Result alias used by lifecycle operations
pub type Result<T> = std::result::Result<T, LendingError>;

/// Errors surfaced by amortization and lifecycle operations
#[derive(Debug, Error)]
pub enum LendingError {
    #[error("Invalid loan terms: {0}")]
    InvalidLoanTerms(String),

    #[error("Installment {installment_number} not found on loan {loan_id} ({scheduled} scheduled)")]
    InstallmentNotFound {
        loan_id: String,
        installment_number: u32,
        scheduled: usize,
    },

    #[error("Installment {installment_number} on loan {loan_id} is already paid")]
    InstallmentAlreadyPaid {
        loan_id: String,
        installment_number: u32,
    },

    #[error("Payment amount must be positive, got {0}")]
    InvalidPaymentAmount(f64),

    #[error("Application {application_id} is {status}, not approved")]
    ApplicationNotApproved {
        application_id: String,
        status: String,
    },

    #[error("Application {application_id} cannot move from {from} via {action}")]
    InvalidTransition {
        application_id: String,
        from: String,
        action: &'static str,
    },

    #[error("Application {application_id} already has loan {loan_id}")]
    LoanAlreadyExists {
        application_id: String,
        loan_id: String,
    },

    /// A disbursement is settled or still awaiting the provider
    #[error("Loan {loan_id} already has disbursement {transaction_ref}")]
    AlreadyDisbursed {
        loan_id: String,
        transaction_ref: String,
    },

    #[error("Installment {installment_number} on loan {loan_id} has collection {transaction_id} awaiting settlement")]
    CollectionInProgress {
        loan_id: String,
        installment_number: u32,
        transaction_id: String,
    },

    #[error("Loan {loan_id} is {status}, not active")]
    LoanNotActive { loan_id: String, status: String },

    #[error("Payment provider unavailable: {0}")]
    PaymentFacadeUnavailable(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LendingError {
    /// Whether the caller may retry the same operation later unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            LendingError::PaymentFacadeUnavailable(_) => true,
            LendingError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Malformed applicant financial data.
///
/// Scoring never propagates this; it is carried on the fail-closed assessment.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[error("Invalid input: {field} ({reason})")]
pub struct AssessmentInputError {
    pub field: String,
    pub reason: String,
}

impl AssessmentInputError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
