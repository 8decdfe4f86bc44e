//! Persisted lifecycle records and their state rules

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amortization::{round_cents, ScheduledInstallment};
use crate::applicant::{Applicant, LoanRequest};
use crate::error::{LendingError, Result};
use crate::scoring::{CreditAssessment, Decision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Conditional,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Conditional => "conditional",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// Status an application takes after assessment
    pub fn from_decision(decision: Decision) -> Self {
        match decision {
            Decision::Approved => ApplicationStatus::Approved,
            Decision::Conditional => ApplicationStatus::Conditional,
            Decision::Rejected => ApplicationStatus::Rejected,
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "conditional" => Ok(ApplicationStatus::Conditional),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(format!("Unknown application status: {}", other)),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Completed,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Completed => "completed",
            LoanStatus::Defaulted => "defaulted",
        }
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "completed" => Ok(LoanStatus::Completed),
            "defaulted" => Ok(LoanStatus::Defaulted),
            other => Err(format!("Unknown loan status: {}", other)),
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Partial,
    Overdue,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Partial => "partial",
            InstallmentStatus::Overdue => "overdue",
        }
    }
}

impl FromStr for InstallmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InstallmentStatus::Pending),
            "paid" => Ok(InstallmentStatus::Paid),
            "partial" => Ok(InstallmentStatus::Partial),
            "overdue" => Ok(InstallmentStatus::Overdue),
            other => Err(format!("Unknown installment status: {}", other)),
        }
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Disbursement,
    Repayment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Disbursement => "disbursement",
            TransactionKind::Repayment => "repayment",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "disbursement" => Ok(TransactionKind::Disbursement),
            "repayment" => Ok(TransactionKind::Repayment),
            other => Err(format!("Unknown transaction kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("Unknown transaction status: {}", other)),
        }
    }
}

/// A filed applicant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    pub id: Uuid,
    pub applicant: Applicant,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: Uuid,
    pub applicant_id: Uuid,
    pub request: LoanRequest,
    pub assessment: Option<CreditAssessment>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assessed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl LoanApplication {
    pub fn new(applicant_id: Uuid, request: LoanRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            applicant_id,
            request,
            assessment: None,
            status: ApplicationStatus::Pending,
            created_at: now,
            updated_at: now,
            assessed_at: None,
            approved_at: None,
            rejected_at: None,
        }
    }

    /// pending -> approved | conditional | rejected
    pub fn record_assessment(&mut self, assessment: CreditAssessment, now: DateTime<Utc>) -> Result<()> {
        if self.status != ApplicationStatus::Pending {
            return Err(self.invalid_transition("assess"));
        }

        let status = ApplicationStatus::from_decision(assessment.decision);
        self.assessment = Some(assessment);
        self.assessed_at = Some(now);
        self.set_status(status, now);
        Ok(())
    }

    /// conditional -> approved | rejected
    pub fn review(&mut self, approve: bool, now: DateTime<Utc>) -> Result<()> {
        if self.status != ApplicationStatus::Conditional {
            return Err(self.invalid_transition("review"));
        }

        let status = if approve {
            ApplicationStatus::Approved
        } else {
            ApplicationStatus::Rejected
        };
        self.set_status(status, now);
        Ok(())
    }

    fn set_status(&mut self, status: ApplicationStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
        match status {
            ApplicationStatus::Approved => self.approved_at = Some(now),
            ApplicationStatus::Rejected => self.rejected_at = Some(now),
            _ => {}
        }
    }

    fn invalid_transition(&self, action: &'static str) -> LendingError {
        LendingError::InvalidTransition {
            application_id: self.id.to_string(),
            from: self.status.to_string(),
            action,
        }
    }

    /// Loan creation precondition
    pub fn ensure_approved(&self) -> Result<()> {
        if self.status != ApplicationStatus::Approved {
            return Err(LendingError::ApplicationNotApproved {
                application_id: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub application_id: Uuid,
    pub applicant_id: Uuid,
    pub principal: f64,
    pub annual_rate: f64,
    pub term_months: u32,
    pub monthly_payment: f64,
    pub total_repayment: f64,
    pub amount_paid: f64,
    pub remaining_balance: f64,
    pub next_payment_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub disbursement_ref: Option<String>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of applying one payment to a loan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedPayment {
    /// Portion of the tendered amount credited to the installment
    pub applied: f64,
    pub installment_status: InstallmentStatus,
    pub remaining_balance: f64,
    pub loan_completed: bool,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    pub fn ensure_active(&self) -> Result<()> {
        if !self.is_active() {
            return Err(LendingError::LoanNotActive {
                loan_id: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Credit a payment to installment `number` (1-based) and update the loan totals.
    ///
    /// The credited amount never exceeds what is still owed on the installment, so
    /// the installments' `amount_paid` always sums to the loan's `amount_paid`.
    pub fn apply_payment(
        &mut self,
        installments: &mut [Installment],
        number: u32,
        amount: f64,
        paid_on: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<AppliedPayment> {
        self.ensure_active()?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LendingError::InvalidPaymentAmount(amount));
        }

        let scheduled = installments.len();
        let installment = installments
            .iter_mut()
            .find(|i| i.installment_number == number)
            .ok_or_else(|| LendingError::InstallmentNotFound {
                loan_id: self.id.to_string(),
                installment_number: number,
                scheduled,
            })?;

        if installment.status == InstallmentStatus::Paid {
            return Err(LendingError::InstallmentAlreadyPaid {
                loan_id: self.id.to_string(),
                installment_number: number,
            });
        }

        let applied = round_cents(amount.min(installment.outstanding()));
        installment.amount_paid = round_cents(installment.amount_paid + applied);
        installment.paid_date = Some(paid_on);
        installment.status = if installment.amount_paid >= installment.amount_due {
            InstallmentStatus::Paid
        } else {
            InstallmentStatus::Partial
        };
        let installment_status = installment.status;

        self.amount_paid = round_cents(self.amount_paid + applied);
        self.remaining_balance = round_cents(self.total_repayment - self.amount_paid).max(0.0);
        self.updated_at = now;

        if self.remaining_balance <= 0.0 {
            self.status = LoanStatus::Completed;
            self.completed_at = Some(now);
        }

        self.next_payment_date = installments
            .iter()
            .filter(|i| i.status == InstallmentStatus::Pending)
            .map(|i| i.due_date)
            .min();

        Ok(AppliedPayment {
            applied,
            installment_status,
            remaining_balance: self.remaining_balance,
            loan_completed: self.status == LoanStatus::Completed,
        })
    }

    /// active -> defaulted
    pub fn mark_defaulted(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_active()?;
        self.status = LoanStatus::Defaulted;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub loan_id: Uuid,
    /// 1-based
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub amount_due: f64,
    pub principal: f64,
    pub interest: f64,
    pub balance_after: f64,
    pub amount_paid: f64,
    pub paid_date: Option<NaiveDate>,
    pub status: InstallmentStatus,
}

impl Installment {
    pub fn from_schedule(loan_id: Uuid, planned: &ScheduledInstallment) -> Self {
        Self {
            loan_id,
            installment_number: planned.installment_number,
            due_date: planned.due_date,
            amount_due: planned.amount_due,
            principal: planned.principal,
            interest: planned.interest,
            balance_after: planned.balance_after,
            amount_paid: 0.0,
            paid_date: None,
            status: InstallmentStatus::Pending,
        }
    }

    /// Amount still owed on this installment
    pub fn outstanding(&self) -> f64 {
        round_cents(self.amount_due - self.amount_paid).max(0.0)
    }

    /// Unpaid and past its due date
    pub fn is_past_due(&self, as_of: NaiveDate) -> bool {
        self.status != InstallmentStatus::Paid && self.due_date < as_of
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub kind: TransactionKind,
    pub amount: f64,
    pub currency: String,
    pub provider: String,
    /// Provider's transfer reference, when one was issued
    pub provider_reference: Option<String>,
    /// MSISDN the money moved to or from
    pub account_ref: String,
    /// Installment a repayment is credited to once it settles
    pub installment_number: Option<u32>,
    pub status: TransactionStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Reference the transfer was submitted to the provider under
    pub fn client_reference(&self) -> String {
        self.id.to_string()
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::{build_schedule, compute_monthly_payment, total_repayment, ScheduleConfig};

    fn loan_with_schedule() -> (Loan, Vec<Installment>) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let payment = compute_monthly_payment(1000.0, 0.15, 12).unwrap();
        let schedule = build_schedule(1000.0, payment, 12, 0.15, start, &ScheduleConfig::default()).unwrap();
        let now = Utc::now();
        let id = Uuid::new_v4();

        let loan = Loan {
            id,
            application_id: Uuid::new_v4(),
            applicant_id: Uuid::new_v4(),
            principal: 1000.0,
            annual_rate: 0.15,
            term_months: 12,
            monthly_payment: payment,
            total_repayment: total_repayment(&schedule),
            amount_paid: 0.0,
            remaining_balance: total_repayment(&schedule),
            next_payment_date: Some(schedule[0].due_date),
            status: LoanStatus::Active,
            disbursement_ref: None,
            disbursed_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let installments = schedule.iter().map(|s| Installment::from_schedule(id, s)).collect();
        (loan, installments)
    }

    fn paid_sum(installments: &[Installment]) -> f64 {
        round_cents(installments.iter().map(|i| i.amount_paid).sum())
    }

    #[test]
    fn test_partial_then_full_payment() {
        let (mut loan, mut installments) = loan_with_schedule();
        let day = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();

        let first = loan.apply_payment(&mut installments, 1, 50.0, day, Utc::now()).unwrap();
        assert_eq!(first.applied, 50.0);
        assert_eq!(first.installment_status, InstallmentStatus::Partial);
        assert_eq!(loan.remaining_balance, 1033.12);
        // A partial installment is no longer pending
        assert_eq!(loan.next_payment_date, Some(installments[1].due_date));

        let second = loan.apply_payment(&mut installments, 1, 100.0, day, Utc::now()).unwrap();
        assert_eq!(second.applied, 40.26);
        assert_eq!(second.installment_status, InstallmentStatus::Paid);
        assert_eq!(loan.amount_paid, 90.26);
        assert_eq!(paid_sum(&installments), loan.amount_paid);
    }

    #[test]
    fn test_repaying_paid_installment_is_rejected() {
        let (mut loan, mut installments) = loan_with_schedule();
        let day = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();

        loan.apply_payment(&mut installments, 1, 90.26, day, Utc::now()).unwrap();
        let before = loan.clone();

        let err = loan.apply_payment(&mut installments, 1, 90.26, day, Utc::now()).unwrap_err();
        assert!(matches!(err, LendingError::InstallmentAlreadyPaid { installment_number: 1, .. }));
        assert_eq!(loan, before);
    }

    #[test]
    fn test_installment_lookup_is_one_based() {
        let (mut loan, mut installments) = loan_with_schedule();
        let day = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();

        assert!(matches!(
            loan.apply_payment(&mut installments, 0, 10.0, day, Utc::now()),
            Err(LendingError::InstallmentNotFound { scheduled: 12, .. })
        ));
        assert!(matches!(
            loan.apply_payment(&mut installments, 13, 10.0, day, Utc::now()),
            Err(LendingError::InstallmentNotFound { .. })
        ));
        assert!(matches!(
            loan.apply_payment(&mut installments, 1, 0.0, day, Utc::now()),
            Err(LendingError::InvalidPaymentAmount(_))
        ));
    }

    #[test]
    fn test_paying_every_installment_completes_loan() {
        let (mut loan, mut installments) = loan_with_schedule();
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        for n in 1..=12 {
            let outcome = loan.apply_payment(&mut installments, n, 200.0, day, Utc::now()).unwrap();
            assert_eq!(outcome.loan_completed, n == 12);
        }

        assert_eq!(loan.status, LoanStatus::Completed);
        assert_eq!(loan.remaining_balance, 0.0);
        assert_eq!(loan.amount_paid, 1083.10);
        assert!(loan.completed_at.is_some());
        assert!(loan.next_payment_date.is_none());
        assert_eq!(paid_sum(&installments), loan.amount_paid);

        // Completed loans take no more payments
        assert!(matches!(
            loan.apply_payment(&mut installments, 1, 1.0, day, Utc::now()),
            Err(LendingError::LoanNotActive { .. })
        ));
    }

    #[test]
    fn test_application_transitions() {
        let now = Utc::now();
        let mut app = LoanApplication::new(Uuid::new_v4(), LoanRequest::new(500.0, "x", 6), now);
        assert!(app.ensure_approved().is_err());
        assert!(app.review(true, now).is_err());

        let mut assessment = CreditAssessment::fail_closed(crate::error::AssessmentInputError::new("x", "y"));
        assessment.decision = Decision::Conditional;
        app.record_assessment(assessment.clone(), now).unwrap();
        assert_eq!(app.status, ApplicationStatus::Conditional);

        // Assessment only runs once
        assert!(matches!(
            app.record_assessment(assessment, now),
            Err(LendingError::InvalidTransition { action: "assess", .. })
        ));

        app.review(true, now).unwrap();
        assert_eq!(app.status, ApplicationStatus::Approved);
        assert!(app.approved_at.is_some());
        assert!(app.ensure_approved().is_ok());
    }
}
