//! Loan lifecycle orchestration
//!
//! [`LendingService`] ties scoring, persistence, the payment gateway and the
//! notifier together. Each operation reads and writes inside a single store
//! transaction; external calls (gateway, notifier) happen outside it.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::portfolio::{ApplicationStats, PortfolioStats};
use super::records::{
    ApplicantRecord, ApplicationStatus, AppliedPayment, Installment, InstallmentStatus, Loan,
    LoanApplication, LoanStatus, Transaction, TransactionKind, TransactionStatus,
};
use crate::amortization::{build_schedule, compute_monthly_payment, round_cents, total_repayment, ScheduleConfig};
use crate::applicant::{Applicant, LoanRequest};
use crate::error::{LendingError, Result};
use crate::notify::{NotificationEvent, NotificationParams, Notifier};
use crate::payments::{PaymentError, PaymentGateway, ServiceProduct, TransferReceipt, TransferStatus};
use crate::scoring::{CreditScorer, Decision};
use crate::store::{queries, Database};

const GENERIC_DECLINE_REASON: &str = "Your application does not meet our current lending criteria";

/// Lifecycle settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub schedule: ScheduleConfig,
    /// Recorded on transactions until the provider prices them
    pub currency: String,
    /// Days ahead covered by payment-due reminders
    pub reminder_window_days: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            currency: "ZAR".to_string(),
            reminder_window_days: 3,
        }
    }
}

/// A loan with its schedule and money movements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanDetails {
    pub loan: Loan,
    pub installments: Vec<Installment>,
    pub transactions: Vec<Transaction>,
}

/// Result of crediting a repayment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentOutcome {
    pub loan: Loan,
    pub payment: AppliedPayment,
}

/// A money movement after submission or reconciliation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement {
    pub transaction: Transaction,
    /// The repayment this call credited, if any
    pub payment: Option<PaymentOutcome>,
}

pub struct LendingService<'a, G: PaymentGateway, N: Notifier> {
    db: Database,
    scorer: CreditScorer,
    gateway: &'a G,
    notifier: &'a N,
    config: ServiceConfig,
}

fn not_found(entity: &'static str, id: Uuid) -> LendingError {
    LendingError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn load_application(conn: &Connection, id: Uuid) -> Result<LoanApplication> {
    queries::get_application(conn, id)?.ok_or_else(|| not_found("Application", id))
}

fn load_applicant(conn: &Connection, id: Uuid) -> Result<ApplicantRecord> {
    queries::get_applicant(conn, id)?.ok_or_else(|| not_found("Applicant", id))
}

fn load_loan(conn: &Connection, id: Uuid) -> Result<Loan> {
    queries::get_loan(conn, id)?.ok_or_else(|| not_found("Loan", id))
}

fn load_transaction(conn: &Connection, id: Uuid) -> Result<Transaction> {
    queries::get_transaction(conn, id)?.ok_or_else(|| not_found("Transaction", id))
}

/// Apply a payment and persist the installment and loan it touched
fn credit_installment(
    conn: &Connection,
    loan_id: Uuid,
    installment_number: u32,
    amount: f64,
    paid_on: NaiveDate,
) -> Result<PaymentOutcome> {
    let mut loan = load_loan(conn, loan_id)?;
    let mut installments = queries::installments_for_loan(conn, loan_id)?;
    let payment = loan.apply_payment(&mut installments, installment_number, amount, paid_on, Utc::now())?;

    if let Some(installment) = installments
        .iter()
        .find(|i| i.installment_number == installment_number)
    {
        queries::update_installment(conn, installment)?;
    }
    queries::update_loan(conn, &loan)?;
    Ok(PaymentOutcome { loan, payment })
}

/// Credit a settled collection to its installment.
///
/// Money already moved, so a loan or installment that can no longer take the
/// payment leaves the transaction completed with the reason it was not credited.
fn credit_collection(conn: &Connection, txn: &mut Transaction, now: DateTime<Utc>) -> Result<Option<PaymentOutcome>> {
    let Some(number) = txn.installment_number else {
        txn.error_message = Some("collected without a target installment".to_string());
        return Ok(None);
    };

    match credit_installment(conn, txn.loan_id, number, txn.amount, now.date_naive()) {
        Ok(outcome) => Ok(Some(outcome)),
        Err(LendingError::Store(e)) => Err(e.into()),
        Err(e) => {
            warn!("Collected {:.2} on loan {} but could not credit it: {}", txn.amount, txn.loan_id, e);
            txn.error_message = Some(format!("collected but not credited: {}", e));
            Ok(None)
        }
    }
}

impl<'a, G: PaymentGateway, N: Notifier> LendingService<'a, G, N> {
    pub fn new(db: Database, scorer: CreditScorer, gateway: &'a G, notifier: &'a N) -> Self {
        Self::with_config(db, scorer, gateway, notifier, ServiceConfig::default())
    }

    pub fn with_config(
        db: Database,
        scorer: CreditScorer,
        gateway: &'a G,
        notifier: &'a N,
        config: ServiceConfig,
    ) -> Self {
        Self {
            db,
            scorer,
            gateway,
            notifier,
            config,
        }
    }

    pub fn scorer(&self) -> &CreditScorer {
        &self.scorer
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run `op` in a store transaction.
    ///
    /// Store errors roll back and follow the database retry policy. Other errors
    /// are returned as-is; operations validate before writing, so nothing is
    /// left half-written.
    fn in_transaction<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(&Connection) -> Result<T>,
    {
        self.db.transaction(|tx| match op(tx) {
            Err(LendingError::Store(e)) => Err(e),
            other => Ok(other),
        })?
    }

    /// Fire-and-forget; a failed send never blocks the transition
    fn notify(&self, event: NotificationEvent, recipient: &str, params: NotificationParams) {
        if !self.notifier.notify(event, recipient, &params) {
            warn!("Could not send {} notification to {}", event, recipient);
        }
    }

    // ========================================================================
    // APPLICATIONS
    // ========================================================================

    /// File the applicant and a pending application
    pub fn submit_application(&self, applicant: Applicant, request: LoanRequest) -> Result<LoanApplication> {
        let now = Utc::now();
        let record = ApplicantRecord {
            id: Uuid::new_v4(),
            applicant,
            created_at: now,
        };
        let application = LoanApplication::new(record.id, request, now);

        self.in_transaction(|tx| {
            queries::insert_applicant(tx, &record)?;
            queries::insert_application(tx, &application)?;
            Ok(())
        })?;
        info!(
            "Application {} submitted for {:.2} by {}",
            application.id, application.request.amount, record.applicant.full_name
        );

        self.notify(
            NotificationEvent::ApplicationReceived,
            &record.applicant.phone_number,
            NotificationParams::default()
                .amount(application.request.amount)
                .reference(application.id.to_string()),
        );
        Ok(application)
    }

    /// Score a pending application and move it to the decided status
    pub fn assess_application(&self, application_id: Uuid) -> Result<LoanApplication> {
        let (application, record) = self.in_transaction(|tx| {
            let mut application = load_application(tx, application_id)?;
            let record = load_applicant(tx, application.applicant_id)?;

            let assessment = self.scorer.score(&record.applicant, &application.request);
            application.record_assessment(assessment, Utc::now())?;
            queries::update_application(tx, &application)?;
            Ok((application, record))
        })?;

        let assessment = application.assessment.as_ref();
        info!(
            "Application {} assessed: {} (score {})",
            application.id,
            application.status,
            assessment.map(|a| a.credit_score).unwrap_or_default()
        );

        let phone = &record.applicant.phone_number;
        match assessment.map(|a| a.decision) {
            Some(Decision::Approved) => {
                let amount = assessment.map(|a| a.suggested_amount).unwrap_or_default();
                self.notify(
                    NotificationEvent::Approved,
                    phone,
                    NotificationParams::default().amount(amount),
                );
            }
            Some(Decision::Rejected) => {
                let reason = self
                    .scorer
                    .risk_factors(&record.applicant, &application.request)
                    .first()
                    .map(|f| f.description)
                    .unwrap_or(GENERIC_DECLINE_REASON);
                self.notify(
                    NotificationEvent::Declined,
                    phone,
                    NotificationParams::default().reason(reason),
                );
            }
            _ => {}
        }
        Ok(application)
    }

    /// Officer decision on a conditional application
    pub fn review_application(&self, application_id: Uuid, approve: bool) -> Result<LoanApplication> {
        let (application, record) = self.in_transaction(|tx| {
            let mut application = load_application(tx, application_id)?;
            application.review(approve, Utc::now())?;
            queries::update_application(tx, &application)?;
            let record = load_applicant(tx, application.applicant_id)?;
            Ok((application, record))
        })?;
        info!("Application {} reviewed: {}", application.id, application.status);

        let phone = &record.applicant.phone_number;
        if application.status == ApplicationStatus::Approved {
            let amount = application
                .assessment
                .as_ref()
                .map(|a| a.suggested_amount)
                .unwrap_or(application.request.amount);
            self.notify(
                NotificationEvent::Approved,
                phone,
                NotificationParams::default().amount(amount),
            );
        } else {
            self.notify(
                NotificationEvent::Declined,
                phone,
                NotificationParams::default().reason(GENERIC_DECLINE_REASON),
            );
        }
        Ok(application)
    }

    pub fn application(&self, application_id: Uuid) -> Result<LoanApplication> {
        self.in_transaction(|tx| load_application(tx, application_id))
    }

    pub fn applicant(&self, applicant_id: Uuid) -> Result<ApplicantRecord> {
        self.in_transaction(|tx| load_applicant(tx, applicant_id))
    }

    // ========================================================================
    // LOANS
    // ========================================================================

    /// Book a loan against an approved application, with its full schedule
    pub fn create_loan(
        &self,
        application_id: Uuid,
        principal: f64,
        annual_rate: f64,
        term_months: u32,
        start: NaiveDate,
    ) -> Result<LoanDetails> {
        let monthly_payment = compute_monthly_payment(principal, annual_rate, term_months)?;
        let schedule = build_schedule(
            principal,
            monthly_payment,
            term_months,
            annual_rate,
            start,
            &self.config.schedule,
        )?;
        let total = total_repayment(&schedule);

        let details = self.in_transaction(|tx| {
            let application = load_application(tx, application_id)?;
            application.ensure_approved()?;
            if let Some(existing) = queries::loan_for_application(tx, application_id)? {
                return Err(LendingError::LoanAlreadyExists {
                    application_id: application_id.to_string(),
                    loan_id: existing.id.to_string(),
                });
            }

            let now = Utc::now();
            let loan = Loan {
                id: Uuid::new_v4(),
                application_id,
                applicant_id: application.applicant_id,
                principal,
                annual_rate,
                term_months,
                monthly_payment,
                total_repayment: total,
                amount_paid: 0.0,
                remaining_balance: total,
                next_payment_date: schedule.first().map(|s| s.due_date),
                status: LoanStatus::Active,
                disbursement_ref: None,
                disbursed_at: None,
                completed_at: None,
                created_at: now,
                updated_at: now,
            };
            let installments: Vec<Installment> = schedule
                .iter()
                .map(|s| Installment::from_schedule(loan.id, s))
                .collect();

            queries::insert_loan(tx, &loan)?;
            queries::insert_installments(tx, &installments)?;
            Ok(LoanDetails {
                loan,
                installments,
                transactions: Vec::new(),
            })
        })?;

        info!(
            "Loan {} created: {:.2} at {:.2}% over {} months, {:.2}/month",
            details.loan.id,
            principal,
            annual_rate * 100.0,
            term_months,
            monthly_payment
        );
        Ok(details)
    }

    pub fn loan_details(&self, loan_id: Uuid) -> Result<LoanDetails> {
        self.in_transaction(|tx| {
            Ok(LoanDetails {
                loan: load_loan(tx, loan_id)?,
                installments: queries::installments_for_loan(tx, loan_id)?,
                transactions: queries::transactions_for_loan(tx, loan_id)?,
            })
        })
    }

    /// Credit a repayment to installment `installment_number` (1-based)
    pub fn record_payment(
        &self,
        loan_id: Uuid,
        installment_number: u32,
        amount: f64,
        paid_on: NaiveDate,
    ) -> Result<PaymentOutcome> {
        let (outcome, phone) = self.in_transaction(|tx| {
            let outcome = credit_installment(tx, loan_id, installment_number, amount, paid_on)?;
            let record = load_applicant(tx, outcome.loan.applicant_id)?;
            Ok((outcome, record.applicant.phone_number))
        })?;

        self.payment_credited(&outcome, installment_number, &phone);
        Ok(outcome)
    }

    /// Send the principal to the borrower's mobile-money account.
    ///
    /// Guards run before any provider call. The disbursement row is stored as
    /// pending before the provider is asked, so a loan with a settled or
    /// unsettled disbursement is never sent money again. A provider failure
    /// marks the row failed and leaves the loan undisbursed.
    pub fn disburse_loan(&self, loan_id: Uuid) -> Result<Transaction> {
        let txn = self.in_transaction(|tx| {
            let loan = load_loan(tx, loan_id)?;
            load_application(tx, loan.application_id)?.ensure_approved()?;
            loan.ensure_active()?;
            if let Some(reference) = &loan.disbursement_ref {
                return Err(LendingError::AlreadyDisbursed {
                    loan_id: loan_id.to_string(),
                    transaction_ref: reference.clone(),
                });
            }
            let open = queries::transactions_for_loan(tx, loan_id)?
                .into_iter()
                .find(|t| t.kind == TransactionKind::Disbursement && t.status != TransactionStatus::Failed);
            if let Some(existing) = open {
                return Err(LendingError::AlreadyDisbursed {
                    loan_id: loan_id.to_string(),
                    transaction_ref: existing
                        .provider_reference
                        .clone()
                        .unwrap_or_else(|| existing.client_reference()),
                });
            }

            let record = load_applicant(tx, loan.applicant_id)?;
            let txn = self.pending_transaction(
                &loan,
                TransactionKind::Disbursement,
                loan.principal,
                &record.applicant.phone_number,
                None,
            );
            queries::insert_transaction(tx, &txn)?;
            Ok(txn)
        })?;

        let memo = format!("Loan disbursement {}", loan_id);
        let submitted = self
            .gateway
            .disburse(&txn.client_reference(), txn.amount, &txn.account_ref, &memo);
        let settlement = self.settle_submission(&txn, submitted)?;
        info!(
            "Loan {} disbursement {} is {}",
            loan_id,
            settlement.transaction.id,
            settlement.transaction.status.as_str()
        );
        Ok(settlement.transaction)
    }

    /// Request a repayment from the borrower for installment `installment_number`.
    ///
    /// Only what is still owed on the installment is requested. The repayment is
    /// credited once the provider reports it successful: immediately when the
    /// receipt says so, otherwise on [`reconcile_transaction`](Self::reconcile_transaction).
    pub fn collect_repayment(&self, loan_id: Uuid, installment_number: u32, amount: f64) -> Result<Settlement> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LendingError::InvalidPaymentAmount(amount));
        }

        let txn = self.in_transaction(|tx| {
            let loan = load_loan(tx, loan_id)?;
            loan.ensure_active()?;
            let installments = queries::installments_for_loan(tx, loan_id)?;
            let installment = match installments.iter().find(|i| i.installment_number == installment_number) {
                None => {
                    return Err(LendingError::InstallmentNotFound {
                        loan_id: loan_id.to_string(),
                        installment_number,
                        scheduled: installments.len(),
                    })
                }
                Some(i) if i.status == InstallmentStatus::Paid || i.outstanding() <= 0.0 => {
                    return Err(LendingError::InstallmentAlreadyPaid {
                        loan_id: loan_id.to_string(),
                        installment_number,
                    })
                }
                Some(i) => i,
            };

            let in_flight = queries::transactions_for_loan(tx, loan_id)?.into_iter().find(|t| {
                t.kind == TransactionKind::Repayment
                    && t.is_pending()
                    && t.installment_number == Some(installment_number)
            });
            if let Some(existing) = in_flight {
                return Err(LendingError::CollectionInProgress {
                    loan_id: loan_id.to_string(),
                    installment_number,
                    transaction_id: existing.id.to_string(),
                });
            }

            let requested = round_cents(amount.min(installment.outstanding()));
            let record = load_applicant(tx, loan.applicant_id)?;
            let txn = self.pending_transaction(
                &loan,
                TransactionKind::Repayment,
                requested,
                &record.applicant.phone_number,
                Some(installment_number),
            );
            queries::insert_transaction(tx, &txn)?;
            Ok(txn)
        })?;

        if txn.amount < amount {
            debug!(
                "Collection on loan {} installment {} capped at {:.2} (tendered {:.2})",
                loan_id, installment_number, txn.amount, amount
            );
        }
        let memo = format!("Loan {} installment {}", loan_id, installment_number);
        let submitted = self
            .gateway
            .collect(&txn.client_reference(), txn.amount, &txn.account_ref, &memo);
        self.settle_submission(&txn, submitted)
    }

    /// Ask the provider where a pending transaction stands and settle it.
    ///
    /// Successful repayments are credited to their installment and successful
    /// disbursements mark the loan disbursed. A transfer the provider has no
    /// record of is failed. Settled transactions are returned unchanged
    /// without a provider call.
    pub fn reconcile_transaction(&self, transaction_id: Uuid) -> Result<Settlement> {
        let txn = self.in_transaction(|tx| load_transaction(tx, transaction_id))?;
        if !txn.is_pending() {
            return Ok(Settlement {
                transaction: txn,
                payment: None,
            });
        }

        let product = match txn.kind {
            TransactionKind::Disbursement => ServiceProduct::Disbursement,
            TransactionKind::Repayment => ServiceProduct::Collection,
        };
        match self.gateway.transaction_status(product, &txn.client_reference()) {
            Ok(status) => self.settle(&txn, status, None, None),
            Err(PaymentError::Rejected(reason)) => {
                warn!("Provider has no usable record of transaction {}: {}", txn.id, reason);
                self.settle(&txn, TransferStatus::Failed, None, Some(reason.as_str()))
            }
            Err(e) => Err(LendingError::PaymentFacadeUnavailable(e.to_string())),
        }
    }

    /// Reconcile every pending transaction, oldest first.
    ///
    /// Transactions the provider cannot be reached for stay pending and are
    /// left out of the result.
    pub fn reconcile_pending(&self) -> Result<Vec<Settlement>> {
        let pending = self.in_transaction(|tx| Ok(queries::pending_transactions(tx)?))?;
        let mut settled = Vec::with_capacity(pending.len());
        for txn in pending {
            match self.reconcile_transaction(txn.id) {
                Ok(settlement) => settled.push(settlement),
                Err(e) if e.is_retryable() => warn!("Transaction {} left pending: {}", txn.id, e),
                Err(e) => return Err(e),
            }
        }
        Ok(settled)
    }

    /// active -> defaulted
    pub fn mark_defaulted(&self, loan_id: Uuid) -> Result<Loan> {
        let loan = self.in_transaction(|tx| {
            let mut loan = load_loan(tx, loan_id)?;
            loan.mark_defaulted(Utc::now())?;
            queries::update_loan(tx, &loan)?;
            Ok(loan)
        })?;
        warn!("Loan {} marked defaulted with {:.2} outstanding", loan.id, loan.remaining_balance);
        Ok(loan)
    }

    /// Flag unpaid installments of active loans due before `as_of`; returns how many changed
    pub fn mark_overdue(&self, as_of: NaiveDate) -> Result<usize> {
        let count = self.in_transaction(|tx| {
            let mut changed = 0;
            for mut installment in queries::past_due_installments(tx, as_of)? {
                installment.status = InstallmentStatus::Overdue;
                queries::update_installment(tx, &installment)?;
                changed += 1;
            }
            Ok(changed)
        })?;
        if count > 0 {
            info!("Marked {} installments overdue as of {}", count, as_of);
        }
        Ok(count)
    }

    /// Remind borrowers of unpaid installments due within `window_days` of `as_of`;
    /// returns how many reminders were sent
    pub fn send_payment_due_reminders(&self, as_of: NaiveDate, window_days: i64) -> Result<usize> {
        let until = as_of + Duration::days(window_days.max(0));
        let due = self.in_transaction(|tx| {
            let mut due = Vec::new();
            for installment in queries::installments_due_between(tx, as_of, until)? {
                let loan = load_loan(tx, installment.loan_id)?;
                let record = load_applicant(tx, loan.applicant_id)?;
                due.push((record.applicant.phone_number, installment));
            }
            Ok(due)
        })?;

        let sent = due
            .iter()
            .filter(|(phone, installment)| {
                self.notifier.notify(
                    NotificationEvent::PaymentDue,
                    phone,
                    &NotificationParams::default()
                        .amount(installment.outstanding())
                        .due_date(installment.due_date)
                        .reference(installment.loan_id.to_string()),
                )
            })
            .count();
        info!("Sent {}/{} payment reminders for {} to {}", sent, due.len(), as_of, until);
        Ok(sent)
    }

    /// Reminders using the configured window
    pub fn send_default_reminders(&self, as_of: NaiveDate) -> Result<usize> {
        self.send_payment_due_reminders(as_of, self.config.reminder_window_days)
    }

    // ========================================================================
    // REPORTING
    // ========================================================================

    pub fn portfolio_stats(&self) -> Result<PortfolioStats> {
        let loans = self.in_transaction(|tx| Ok(queries::list_loans(tx)?))?;
        Ok(PortfolioStats::from_loans(&loans))
    }

    pub fn application_stats(&self) -> Result<ApplicationStats> {
        let applications = self.in_transaction(|tx| Ok(queries::list_applications(tx)?))?;
        Ok(ApplicationStats::from_applications(&applications))
    }

    /// Record what the provider said about a freshly submitted transfer
    fn settle_submission(
        &self,
        txn: &Transaction,
        submitted: std::result::Result<TransferReceipt, PaymentError>,
    ) -> Result<Settlement> {
        match submitted {
            Ok(receipt) if receipt.status == TransferStatus::Failed => {
                warn!("Provider failed {} {} on submission", txn.kind.as_str(), txn.id);
                self.settle(txn, TransferStatus::Failed, Some(&receipt), None)?;
                Err(LendingError::PaymentFacadeUnavailable(format!(
                    "provider reported {} {} failed",
                    txn.kind.as_str(),
                    receipt.transaction_ref
                )))
            }
            Ok(receipt) => self.settle(txn, receipt.status, Some(&receipt), None),
            Err(e) => {
                warn!("{} {} on loan {} failed: {}", txn.kind.as_str(), txn.id, txn.loan_id, e);
                self.settle(txn, TransferStatus::Failed, None, Some(e.to_string().as_str()))?;
                Err(LendingError::PaymentFacadeUnavailable(e.to_string()))
            }
        }
    }

    /// Move a pending transaction to the provider's status and apply its effect
    /// on the loan in the same store transaction
    fn settle(
        &self,
        txn: &Transaction,
        status: TransferStatus,
        receipt: Option<&TransferReceipt>,
        error: Option<&str>,
    ) -> Result<Settlement> {
        let settlement = self.in_transaction(|tx| {
            let mut current = load_transaction(tx, txn.id)?;
            if !current.is_pending() {
                return Ok(Settlement {
                    transaction: current,
                    payment: None,
                });
            }
            if let Some(receipt) = receipt {
                current.provider_reference = Some(receipt.transaction_ref.clone());
                current.currency = receipt.currency.clone();
            }

            let now = Utc::now();
            let mut payment = None;
            match status {
                TransferStatus::Pending => {}
                TransferStatus::Successful => {
                    current.status = TransactionStatus::Completed;
                    current.completed_at = Some(now);
                    match current.kind {
                        TransactionKind::Disbursement => {
                            let mut loan = load_loan(tx, current.loan_id)?;
                            loan.disbursement_ref = Some(
                                current
                                    .provider_reference
                                    .clone()
                                    .unwrap_or_else(|| current.client_reference()),
                            );
                            loan.disbursed_at = Some(now);
                            loan.updated_at = now;
                            queries::update_loan(tx, &loan)?;
                        }
                        TransactionKind::Repayment => payment = credit_collection(tx, &mut current, now)?,
                    }
                }
                TransferStatus::Failed => {
                    current.status = TransactionStatus::Failed;
                    current.error_message =
                        Some(error.unwrap_or("provider reported the transfer failed").to_string());
                }
            }

            queries::update_transaction(tx, &current)?;
            Ok(Settlement {
                transaction: current,
                payment,
            })
        })?;

        if let (Some(outcome), Some(number)) = (&settlement.payment, settlement.transaction.installment_number) {
            self.payment_credited(outcome, number, &settlement.transaction.account_ref);
        }
        Ok(settlement)
    }

    fn payment_credited(&self, outcome: &PaymentOutcome, installment_number: u32, phone: &str) {
        info!(
            "Payment of {:.2} on loan {} installment {}: {}, {:.2} remaining",
            outcome.payment.applied,
            outcome.loan.id,
            installment_number,
            outcome.payment.installment_status,
            outcome.loan.remaining_balance
        );

        self.notify(
            NotificationEvent::PaymentReceived,
            phone,
            NotificationParams::default()
                .amount(outcome.payment.applied)
                .next_due_date(outcome.loan.next_payment_date),
        );
        if outcome.payment.loan_completed {
            info!("Loan {} fully repaid", outcome.loan.id);
            self.notify(NotificationEvent::LoanFullyPaid, phone, NotificationParams::default());
        }
    }

    fn pending_transaction(
        &self,
        loan: &Loan,
        kind: TransactionKind,
        amount: f64,
        account_ref: &str,
        installment_number: Option<u32>,
    ) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            loan_id: loan.id,
            kind,
            amount,
            currency: self.config.currency.clone(),
            provider: self.gateway.provider_name().to_string(),
            provider_reference: None,
            account_ref: account_ref.to_string(),
            installment_number,
            status: TransactionStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}
