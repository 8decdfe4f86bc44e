//! Row-level reads and writes.
//!
//! Every function takes a `&Connection`; pass the transaction handed out by
//! [`Database::transaction`](super::Database::transaction).

use std::error::Error as StdError;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::StoreError;
use crate::applicant::{Applicant, CreditHistory, EmploymentStatus, Financials, LoanRequest};
use crate::error::AssessmentInputError;
use crate::lending::{
    ApplicantRecord, ApplicationStatus, Installment, Loan, LoanApplication, Transaction,
};
use crate::scoring::{CreditAssessment, KeyFactors};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn conversion_error(idx: usize, e: impl Into<Box<dyn StdError + Send + Sync>>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn get_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn get_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_opt_timestamp(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn get_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn get_opt_date(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn get_parsed<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn get_json<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn opt_ts(dt: &Option<DateTime<Utc>>) -> Option<String> {
    dt.as_ref().map(ts)
}

fn date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn opt_date(d: &Option<NaiveDate>) -> Option<String> {
    d.as_ref().map(date)
}

// ============================================================================
// APPLICANTS
// ============================================================================

pub fn insert_applicant(conn: &Connection, record: &ApplicantRecord) -> Result<(), StoreError> {
    let a = &record.applicant;
    conn.execute(
        "INSERT INTO applicants (id, full_name, phone_number, email, age, gender, marital_status,
             education_level, address, dependents, employment_status, employer_name,
             employment_years, credit_history, monthly_income, monthly_expenses, current_debt,
             savings, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            record.id.to_string(),
            a.full_name,
            a.phone_number,
            a.email,
            a.age,
            a.gender,
            a.marital_status,
            a.education_level,
            a.address,
            a.dependents,
            a.employment_status.label(),
            a.employer_name,
            a.employment_years,
            a.credit_history.label(),
            a.financials.monthly_income,
            a.financials.monthly_expenses,
            a.financials.current_debt,
            a.financials.savings,
            ts(&record.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_applicant(conn: &Connection, id: Uuid) -> Result<Option<ApplicantRecord>, StoreError> {
    let record = conn
        .query_row(
            "SELECT id, full_name, phone_number, email, age, gender, marital_status, education_level,
                    address, dependents, employment_status, employer_name, employment_years,
                    credit_history, monthly_income, monthly_expenses, current_debt, savings, created_at
             FROM applicants WHERE id = ?1",
            params![id.to_string()],
            |row| {
                let employment: String = row.get(10)?;
                let credit_history: CreditHistory = get_parsed(row, 13)?;
                Ok(ApplicantRecord {
                    id: get_uuid(row, 0)?,
                    applicant: Applicant {
                        full_name: row.get(1)?,
                        phone_number: row.get(2)?,
                        email: row.get(3)?,
                        age: row.get(4)?,
                        gender: row.get(5)?,
                        marital_status: row.get(6)?,
                        education_level: row.get(7)?,
                        address: row.get(8)?,
                        dependents: row.get(9)?,
                        employment_status: EmploymentStatus::from_label(&employment),
                        employer_name: row.get(11)?,
                        employment_years: row.get(12)?,
                        credit_history,
                        financials: Financials {
                            monthly_income: row.get(14)?,
                            monthly_expenses: row.get(15)?,
                            current_debt: row.get(16)?,
                            savings: row.get(17)?,
                        },
                    },
                    created_at: get_timestamp(row, 18)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

// ============================================================================
// APPLICATIONS
// ============================================================================

const APPLICATION_COLUMNS: &str = "id, applicant_id, amount, purpose, term_months, collateral,
    credit_score, risk_tier, decision, suggested_amount, max_affordable_amount,
    monthly_affordability, confidence, debt_to_income, key_factors, assessment_error,
    status, created_at, updated_at, assessed_at, approved_at, rejected_at";

fn application_from_row(row: &Row) -> rusqlite::Result<LoanApplication> {
    let assessed_at = get_opt_timestamp(row, 19)?;

    // Assessment columns are populated together
    let score: Option<i32> = row.get(6)?;
    let assessment = match (score, assessed_at) {
        (Some(credit_score), Some(assessed)) => Some(CreditAssessment {
            credit_score,
            risk_tier: get_parsed(row, 7)?,
            decision: get_parsed(row, 8)?,
            suggested_amount: row.get(9)?,
            max_affordable_amount: row.get(10)?,
            monthly_affordability: row.get(11)?,
            confidence: row.get(12)?,
            debt_to_income: row.get(13)?,
            key_factors: get_json::<KeyFactors>(row, 14)?,
            assessed_at: assessed,
            input_error: get_json::<AssessmentInputError>(row, 15)?,
        }),
        _ => None,
    };

    Ok(LoanApplication {
        id: get_uuid(row, 0)?,
        applicant_id: get_uuid(row, 1)?,
        request: LoanRequest {
            amount: row.get(2)?,
            purpose: row.get(3)?,
            term_months: row.get(4)?,
            collateral: row.get(5)?,
        },
        assessment,
        status: get_parsed::<ApplicationStatus>(row, 16)?,
        created_at: get_timestamp(row, 17)?,
        updated_at: get_timestamp(row, 18)?,
        assessed_at,
        approved_at: get_opt_timestamp(row, 20)?,
        rejected_at: get_opt_timestamp(row, 21)?,
    })
}

pub fn insert_application(conn: &Connection, app: &LoanApplication) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO loan_applications (id, applicant_id, amount, purpose, term_months, collateral,
             status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            app.id.to_string(),
            app.applicant_id.to_string(),
            app.request.amount,
            app.request.purpose,
            app.request.term_months,
            app.request.collateral,
            app.status.as_str(),
            ts(&app.created_at),
            ts(&app.updated_at),
        ],
    )?;
    Ok(())
}

/// Persist status, timestamps and assessment of an existing application
pub fn update_application(conn: &Connection, app: &LoanApplication) -> Result<(), StoreError> {
    let a = app.assessment.as_ref();
    let key_factors = a
        .and_then(|a| a.key_factors.as_ref())
        .map(serde_json::to_string)
        .transpose()?;
    let input_error = a
        .and_then(|a| a.input_error.as_ref())
        .map(serde_json::to_string)
        .transpose()?;

    let updated = conn.execute(
        "UPDATE loan_applications SET
             credit_score = ?2, risk_tier = ?3, decision = ?4, suggested_amount = ?5,
             max_affordable_amount = ?6, monthly_affordability = ?7, confidence = ?8,
             debt_to_income = ?9, key_factors = ?10, assessment_error = ?11, status = ?12,
             updated_at = ?13, assessed_at = ?14, approved_at = ?15, rejected_at = ?16
         WHERE id = ?1",
        params![
            app.id.to_string(),
            a.map(|a| a.credit_score),
            a.map(|a| a.risk_tier.as_str()),
            a.map(|a| a.decision.as_str()),
            a.map(|a| a.suggested_amount),
            a.map(|a| a.max_affordable_amount),
            a.map(|a| a.monthly_affordability),
            a.map(|a| a.confidence),
            a.map(|a| a.debt_to_income),
            key_factors,
            input_error,
            app.status.as_str(),
            ts(&app.updated_at),
            opt_ts(&app.assessed_at),
            opt_ts(&app.approved_at),
            opt_ts(&app.rejected_at),
        ],
    )?;

    if updated != 1 {
        return Err(StoreError::Corrupt(format!("application {} not stored", app.id)));
    }
    Ok(())
}

pub fn get_application(conn: &Connection, id: Uuid) -> Result<Option<LoanApplication>, StoreError> {
    let sql = format!("SELECT {} FROM loan_applications WHERE id = ?1", APPLICATION_COLUMNS);
    let app = conn
        .query_row(&sql, params![id.to_string()], application_from_row)
        .optional()?;
    Ok(app)
}

pub fn list_applications(conn: &Connection) -> Result<Vec<LoanApplication>, StoreError> {
    let sql = format!("SELECT {} FROM loan_applications ORDER BY created_at ASC", APPLICATION_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let apps = stmt
        .query_map([], application_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(apps)
}

// ============================================================================
// LOANS
// ============================================================================

const LOAN_COLUMNS: &str = "id, application_id, applicant_id, principal, annual_rate, term_months,
    monthly_payment, total_repayment, amount_paid, remaining_balance, next_payment_date, status,
    disbursement_ref, disbursed_at, completed_at, created_at, updated_at";

fn loan_from_row(row: &Row) -> rusqlite::Result<Loan> {
    Ok(Loan {
        id: get_uuid(row, 0)?,
        application_id: get_uuid(row, 1)?,
        applicant_id: get_uuid(row, 2)?,
        principal: row.get(3)?,
        annual_rate: row.get(4)?,
        term_months: row.get(5)?,
        monthly_payment: row.get(6)?,
        total_repayment: row.get(7)?,
        amount_paid: row.get(8)?,
        remaining_balance: row.get(9)?,
        next_payment_date: get_opt_date(row, 10)?,
        status: get_parsed(row, 11)?,
        disbursement_ref: row.get(12)?,
        disbursed_at: get_opt_timestamp(row, 13)?,
        completed_at: get_opt_timestamp(row, 14)?,
        created_at: get_timestamp(row, 15)?,
        updated_at: get_timestamp(row, 16)?,
    })
}

pub fn insert_loan(conn: &Connection, loan: &Loan) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO loans (id, application_id, applicant_id, principal, annual_rate, term_months,
             monthly_payment, total_repayment, amount_paid, remaining_balance, next_payment_date,
             status, disbursement_ref, disbursed_at, completed_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            loan.id.to_string(),
            loan.application_id.to_string(),
            loan.applicant_id.to_string(),
            loan.principal,
            loan.annual_rate,
            loan.term_months,
            loan.monthly_payment,
            loan.total_repayment,
            loan.amount_paid,
            loan.remaining_balance,
            opt_date(&loan.next_payment_date),
            loan.status.as_str(),
            loan.disbursement_ref,
            opt_ts(&loan.disbursed_at),
            opt_ts(&loan.completed_at),
            ts(&loan.created_at),
            ts(&loan.updated_at),
        ],
    )?;
    Ok(())
}

/// Persist the mutable fields of an existing loan
pub fn update_loan(conn: &Connection, loan: &Loan) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE loans SET amount_paid = ?2, remaining_balance = ?3, next_payment_date = ?4,
             status = ?5, disbursement_ref = ?6, disbursed_at = ?7, completed_at = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            loan.id.to_string(),
            loan.amount_paid,
            loan.remaining_balance,
            opt_date(&loan.next_payment_date),
            loan.status.as_str(),
            loan.disbursement_ref,
            opt_ts(&loan.disbursed_at),
            opt_ts(&loan.completed_at),
            ts(&loan.updated_at),
        ],
    )?;

    if updated != 1 {
        return Err(StoreError::Corrupt(format!("loan {} not stored", loan.id)));
    }
    Ok(())
}

pub fn get_loan(conn: &Connection, id: Uuid) -> Result<Option<Loan>, StoreError> {
    let sql = format!("SELECT {} FROM loans WHERE id = ?1", LOAN_COLUMNS);
    let loan = conn.query_row(&sql, params![id.to_string()], loan_from_row).optional()?;
    Ok(loan)
}

pub fn loan_for_application(conn: &Connection, application_id: Uuid) -> Result<Option<Loan>, StoreError> {
    let sql = format!("SELECT {} FROM loans WHERE application_id = ?1", LOAN_COLUMNS);
    let loan = conn
        .query_row(&sql, params![application_id.to_string()], loan_from_row)
        .optional()?;
    Ok(loan)
}

pub fn list_loans(conn: &Connection) -> Result<Vec<Loan>, StoreError> {
    let sql = format!("SELECT {} FROM loans ORDER BY created_at ASC", LOAN_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let loans = stmt.query_map([], loan_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(loans)
}

// ============================================================================
// INSTALLMENTS
// ============================================================================

const INSTALLMENT_COLUMNS: &str = "i.loan_id, i.installment_number, i.due_date, i.amount_due,
    i.principal, i.interest, i.balance_after, i.amount_paid, i.paid_date, i.status";

fn installment_from_row(row: &Row) -> rusqlite::Result<Installment> {
    Ok(Installment {
        loan_id: get_uuid(row, 0)?,
        installment_number: row.get(1)?,
        due_date: get_date(row, 2)?,
        amount_due: row.get(3)?,
        principal: row.get(4)?,
        interest: row.get(5)?,
        balance_after: row.get(6)?,
        amount_paid: row.get(7)?,
        paid_date: get_opt_date(row, 8)?,
        status: get_parsed(row, 9)?,
    })
}

pub fn insert_installments(conn: &Connection, installments: &[Installment]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "INSERT INTO installments (loan_id, installment_number, due_date, amount_due, principal,
             interest, balance_after, amount_paid, paid_date, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    for i in installments {
        stmt.execute(params![
            i.loan_id.to_string(),
            i.installment_number,
            date(&i.due_date),
            i.amount_due,
            i.principal,
            i.interest,
            i.balance_after,
            i.amount_paid,
            opt_date(&i.paid_date),
            i.status.as_str(),
        ])?;
    }
    Ok(())
}

pub fn update_installment(conn: &Connection, installment: &Installment) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE installments SET amount_paid = ?3, paid_date = ?4, status = ?5
         WHERE loan_id = ?1 AND installment_number = ?2",
        params![
            installment.loan_id.to_string(),
            installment.installment_number,
            installment.amount_paid,
            opt_date(&installment.paid_date),
            installment.status.as_str(),
        ],
    )?;
    Ok(())
}

/// Schedule of one loan, ordered by installment number
pub fn installments_for_loan(conn: &Connection, loan_id: Uuid) -> Result<Vec<Installment>, StoreError> {
    let sql = format!(
        "SELECT {} FROM installments i WHERE i.loan_id = ?1 ORDER BY i.installment_number ASC",
        INSTALLMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![loan_id.to_string()], installment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Unpaid installments of active loans due in `[from, to]`
pub fn installments_due_between(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Installment>, StoreError> {
    let sql = format!(
        "SELECT {} FROM installments i JOIN loans l ON l.id = i.loan_id
         WHERE l.status = 'active' AND i.status != 'paid' AND i.due_date BETWEEN ?1 AND ?2
         ORDER BY i.due_date ASC, i.loan_id ASC",
        INSTALLMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![date(&from), date(&to)], installment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Pending or partial installments of active loans due before `as_of`
pub fn past_due_installments(conn: &Connection, as_of: NaiveDate) -> Result<Vec<Installment>, StoreError> {
    let sql = format!(
        "SELECT {} FROM installments i JOIN loans l ON l.id = i.loan_id
         WHERE l.status = 'active' AND i.status IN ('pending', 'partial') AND i.due_date < ?1
         ORDER BY i.due_date ASC",
        INSTALLMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![date(&as_of)], installment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

const TRANSACTION_COLUMNS: &str = "id, loan_id, kind, amount, currency, provider, provider_reference,
    account_ref, installment_number, status, error_message, created_at, completed_at";

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: get_uuid(row, 0)?,
        loan_id: get_uuid(row, 1)?,
        kind: get_parsed(row, 2)?,
        amount: row.get(3)?,
        currency: row.get(4)?,
        provider: row.get(5)?,
        provider_reference: row.get(6)?,
        account_ref: row.get(7)?,
        installment_number: row.get(8)?,
        status: get_parsed(row, 9)?,
        error_message: row.get(10)?,
        created_at: get_timestamp(row, 11)?,
        completed_at: get_opt_timestamp(row, 12)?,
    })
}

pub fn insert_transaction(conn: &Connection, txn: &Transaction) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO transactions (id, loan_id, kind, amount, currency, provider, provider_reference,
             account_ref, installment_number, status, error_message, created_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            txn.id.to_string(),
            txn.loan_id.to_string(),
            txn.kind.as_str(),
            txn.amount,
            txn.currency,
            txn.provider,
            txn.provider_reference,
            txn.account_ref,
            txn.installment_number,
            txn.status.as_str(),
            txn.error_message,
            ts(&txn.created_at),
            opt_ts(&txn.completed_at),
        ],
    )?;
    Ok(())
}

/// Persist the settlement fields of an existing transaction
pub fn update_transaction(conn: &Connection, txn: &Transaction) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE transactions SET currency = ?2, provider_reference = ?3, status = ?4,
             error_message = ?5, completed_at = ?6
         WHERE id = ?1",
        params![
            txn.id.to_string(),
            txn.currency,
            txn.provider_reference,
            txn.status.as_str(),
            txn.error_message,
            opt_ts(&txn.completed_at),
        ],
    )?;

    if updated != 1 {
        return Err(StoreError::Corrupt(format!("transaction {} not stored", txn.id)));
    }
    Ok(())
}

pub fn get_transaction(conn: &Connection, id: Uuid) -> Result<Option<Transaction>, StoreError> {
    let sql = format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS);
    let txn = conn
        .query_row(&sql, params![id.to_string()], transaction_from_row)
        .optional()?;
    Ok(txn)
}

pub fn transactions_for_loan(conn: &Connection, loan_id: Uuid) -> Result<Vec<Transaction>, StoreError> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE loan_id = ?1 ORDER BY created_at ASC, rowid ASC",
        TRANSACTION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![loan_id.to_string()], transaction_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Transactions still waiting on the provider, oldest first
pub fn pending_transactions(conn: &Connection) -> Result<Vec<Transaction>, StoreError> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE status = 'pending' ORDER BY created_at ASC, rowid ASC",
        TRANSACTION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], transaction_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lending::{InstallmentStatus, LoanStatus, TransactionKind, TransactionStatus};
    use crate::scoring::{Decision, RiskTier};
    use crate::store::Database;

    fn sample_applicant() -> ApplicantRecord {
        let applicant = Applicant::new(
            "Naledi Khumalo",
            "0721234567",
            29,
            EmploymentStatus::BusinessOwner,
            4,
            Financials {
                monthly_income: 1800.0,
                monthly_expenses: 900.0,
                current_debt: 1200.0,
                savings: 3000.0,
            },
        )
        .with_credit_history(CreditHistory::Fair);

        ApplicantRecord {
            id: Uuid::new_v4(),
            applicant,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_applicant_and_application_persist() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("loans.db")).unwrap();
        let record = sample_applicant();
        let now = Utc::now();
        let mut app = LoanApplication::new(record.id, LoanRequest::new(800.0, "Sewing machine", 6), now);

        db.transaction(|tx| {
            insert_applicant(tx, &record)?;
            insert_application(tx, &app)
        })
        .unwrap();

        let loaded = db.transaction(|tx| get_applicant(tx, record.id)).unwrap().unwrap();
        assert_eq!(loaded.applicant, record.applicant);

        let fresh = db.transaction(|tx| get_application(tx, app.id)).unwrap().unwrap();
        assert_eq!(fresh.status, ApplicationStatus::Pending);
        assert!(fresh.assessment.is_none());

        let assessment = CreditAssessment {
            credit_score: 690,
            risk_tier: RiskTier::Medium,
            decision: Decision::Approved,
            suggested_amount: 800.0,
            max_affordable_amount: 2990.0,
            monthly_affordability: 270.0,
            confidence: 1.0,
            debt_to_income: 0.056,
            key_factors: Some(KeyFactors {
                monthly_income: 1800.0,
                employment_years: 4,
                debt_to_income: 0.0556,
                savings_ratio: 0.139,
                net_monthly_income: 900.0,
            }),
            assessed_at: now,
            input_error: None,
        };
        app.record_assessment(assessment, now).unwrap();
        db.transaction(|tx| update_application(tx, &app)).unwrap();

        let stored = db.transaction(|tx| get_application(tx, app.id)).unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Approved);
        let stored_assessment = stored.assessment.unwrap();
        assert_eq!(stored_assessment.credit_score, 690);
        assert_eq!(stored_assessment.decision, Decision::Approved);
        assert_eq!(stored_assessment.key_factors.unwrap().employment_years, 4);
        assert!(stored.approved_at.is_some());

        assert!(db.transaction(|tx| get_application(tx, Uuid::new_v4())).unwrap().is_none());
    }

    #[test]
    fn test_loan_schedule_and_transactions_persist() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("loans.db")).unwrap();
        let record = sample_applicant();
        let now = Utc::now();
        let app = LoanApplication::new(record.id, LoanRequest::new(300.0, "Stock", 3), now);
        let due = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let loan = Loan {
            id: Uuid::new_v4(),
            application_id: app.id,
            applicant_id: record.id,
            principal: 300.0,
            annual_rate: 0.0,
            term_months: 3,
            monthly_payment: 100.0,
            total_repayment: 300.0,
            amount_paid: 0.0,
            remaining_balance: 300.0,
            next_payment_date: Some(due),
            status: LoanStatus::Active,
            disbursement_ref: None,
            disbursed_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let installments: Vec<Installment> = (1..=3)
            .map(|n| Installment {
                loan_id: loan.id,
                installment_number: n,
                due_date: due + chrono::Duration::days(30 * (n as i64 - 1)),
                amount_due: 100.0,
                principal: 100.0,
                interest: 0.0,
                balance_after: 300.0 - 100.0 * n as f64,
                amount_paid: 0.0,
                paid_date: None,
                status: InstallmentStatus::Pending,
            })
            .collect();

        db.transaction(|tx| {
            insert_applicant(tx, &record)?;
            insert_application(tx, &app)?;
            insert_loan(tx, &loan)?;
            insert_installments(tx, &installments)
        })
        .unwrap();

        // One loan per application
        let duplicate = Loan { id: Uuid::new_v4(), ..loan.clone() };
        assert!(db.transaction(|tx| insert_loan(tx, &duplicate)).is_err());

        let stored = db.transaction(|tx| installments_for_loan(tx, loan.id)).unwrap();
        assert_eq!(stored, installments);
        assert_eq!(db.transaction(|tx| loan_for_application(tx, app.id)).unwrap(), Some(loan.clone()));

        let due_soon = db
            .transaction(|tx| installments_due_between(tx, due, due + chrono::Duration::days(31)))
            .unwrap();
        assert_eq!(due_soon.len(), 2);

        let late = db
            .transaction(|tx| past_due_installments(tx, due + chrono::Duration::days(1)))
            .unwrap();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].installment_number, 1);

        let txn = Transaction {
            id: Uuid::new_v4(),
            loan_id: loan.id,
            kind: TransactionKind::Disbursement,
            amount: 300.0,
            currency: "ZAR".into(),
            provider: "sandbox".into(),
            provider_reference: None,
            account_ref: "0721234567".into(),
            installment_number: None,
            status: TransactionStatus::Failed,
            error_message: Some("timeout".into()),
            created_at: now,
            completed_at: None,
        };
        db.transaction(|tx| insert_transaction(tx, &txn)).unwrap();
        assert_eq!(db.transaction(|tx| transactions_for_loan(tx, loan.id)).unwrap(), vec![txn.clone()]);

        let mut repayment = Transaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Repayment,
            amount: 25.0,
            installment_number: Some(1),
            status: TransactionStatus::Pending,
            error_message: None,
            ..txn.clone()
        };
        db.transaction(|tx| insert_transaction(tx, &repayment)).unwrap();
        assert_eq!(db.transaction(|tx| pending_transactions(tx)).unwrap(), vec![repayment.clone()]);

        repayment.status = TransactionStatus::Completed;
        repayment.provider_reference = Some("prov-1".into());
        repayment.completed_at = Some(now);
        db.transaction(|tx| update_transaction(tx, &repayment)).unwrap();
        assert_eq!(db.transaction(|tx| get_transaction(tx, repayment.id)).unwrap(), Some(repayment.clone()));
        assert!(db.transaction(|tx| pending_transactions(tx)).unwrap().is_empty());

        let missing = Transaction { id: Uuid::new_v4(), ..repayment };
        assert!(db.transaction(|tx| update_transaction(tx, &missing)).is_err());
    }
}
