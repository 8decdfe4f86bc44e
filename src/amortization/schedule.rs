//! Repayment schedule generation

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::payment::{round_cents, validate_terms};
use crate::error::{LendingError, Result};

/// How principal is spread across installments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScheduleMethod {
    /// Level payment; interest on the declining balance
    #[default]
    Annuity,
    /// Even principal slices; interest on the declining balance, so payments fall over time
    EqualPrincipal,
}

/// Schedule generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub method: ScheduleMethod,
    /// Days between due dates (first due date is one interval after start)
    pub payment_interval_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            method: ScheduleMethod::Annuity,
            payment_interval_days: 30,
        }
    }
}

/// One planned installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledInstallment {
    /// 1-based
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub amount_due: f64,
    pub principal: f64,
    pub interest: f64,
    /// Outstanding principal after this installment is paid
    pub balance_after: f64,
}

/// Build the installment schedule for a loan.
///
/// For `Annuity` every installment is due `monthly_payment` (less, once the
/// balance is retired early); the last one is due exactly the remaining
/// balance plus its interest. `EqualPrincipal` ignores
/// `monthly_payment` and derives each amount from its principal slice.
pub fn build_schedule(
    principal: f64,
    monthly_payment: f64,
    term_months: u32,
    annual_rate: f64,
    start_date: NaiveDate,
    config: &ScheduleConfig,
) -> Result<Vec<ScheduledInstallment>> {
    validate_terms(principal, annual_rate, term_months)?;
    if config.method == ScheduleMethod::Annuity && (!monthly_payment.is_finite() || monthly_payment <= 0.0) {
        return Err(LendingError::InvalidLoanTerms(format!(
            "monthly payment must be positive, got {}",
            monthly_payment
        )));
    }
    if config.payment_interval_days == 0 {
        return Err(LendingError::InvalidLoanTerms("payment interval must be at least one day".into()));
    }

    let r = annual_rate / 12.0;
    let slice = round_cents(principal / term_months as f64);
    let mut balance = round_cents(principal);
    let mut schedule = Vec::with_capacity(term_months as usize);

    for k in 1..=term_months {
        let interest = round_cents(balance * r);
        let last = k == term_months;

        let (principal_part, interest_part) = match config.method {
            // Rounding leaves the final amount a few cents off the level payment
            ScheduleMethod::Annuity if last => (balance, interest),
            ScheduleMethod::Annuity => {
                let part = round_cents(monthly_payment - interest).clamp(0.0, balance);
                (part, interest)
            }
            ScheduleMethod::EqualPrincipal if last => (balance, interest),
            ScheduleMethod::EqualPrincipal => (slice.min(balance), interest),
        };

        balance = round_cents(balance - principal_part).max(0.0);

        schedule.push(ScheduledInstallment {
            installment_number: k,
            due_date: start_date + Duration::days(config.payment_interval_days as i64 * k as i64),
            amount_due: round_cents(principal_part + interest_part),
            principal: principal_part,
            interest: interest_part,
            balance_after: balance,
        });
    }

    Ok(schedule)
}

/// Sum of `amount_due` over a schedule
pub fn total_repayment(schedule: &[ScheduledInstallment]) -> f64 {
    round_cents(schedule.iter().map(|i| i.amount_due).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::compute_monthly_payment;
    use approx::assert_relative_eq;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_reference_annuity_schedule() {
        let payment = compute_monthly_payment(1000.0, 0.15, 12).unwrap();
        let schedule = build_schedule(1000.0, payment, 12, 0.15, start(), &ScheduleConfig::default()).unwrap();

        assert_eq!(schedule.len(), 12);
        assert!(schedule[..11].iter().all(|i| i.amount_due == 90.26));
        // Final installment trues up the cent rounding of the level payment
        assert_eq!(schedule[11].amount_due, 90.24);
        assert_eq!(schedule[11].interest, 1.11);
        assert_relative_eq!(total_repayment(&schedule), 1083.10, epsilon = 1e-9);

        let principal_sum: f64 = schedule.iter().map(|i| i.principal).sum();
        assert_relative_eq!(principal_sum, 1000.0, epsilon = 0.01);
        assert_eq!(schedule.last().unwrap().balance_after, 0.0);

        // First month: 1000 * 0.0125 interest
        assert_eq!(schedule[0].interest, 12.5);
        assert_eq!(schedule[0].principal, 77.76);
    }

    #[test]
    fn test_due_dates_follow_interval() {
        let config = ScheduleConfig { payment_interval_days: 14, ..Default::default() };
        let schedule = build_schedule(600.0, 100.0, 6, 0.0, start(), &config).unwrap();

        assert_eq!(schedule[0].installment_number, 1);
        assert_eq!(schedule[0].due_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(schedule[5].due_date, NaiveDate::from_ymd_opt(2024, 3, 25).unwrap());

        let default_schedule = build_schedule(600.0, 100.0, 6, 0.0, start(), &ScheduleConfig::default()).unwrap();
        assert_eq!(default_schedule[0].due_date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn test_equal_principal_schedule() {
        let config = ScheduleConfig { method: ScheduleMethod::EqualPrincipal, ..Default::default() };
        let schedule = build_schedule(1000.0, 0.0, 3, 0.12, start(), &config).unwrap();

        // 333.33, 333.33, then the remainder
        assert_eq!(schedule[0].principal, 333.33);
        assert_eq!(schedule[1].principal, 333.33);
        assert_eq!(schedule[2].principal, 333.34);

        // Interest declines with the balance
        assert_eq!(schedule[0].interest, 10.0);
        assert_eq!(schedule[1].interest, 6.67);
        assert_eq!(schedule[2].interest, 3.33);
        assert!(schedule[0].amount_due > schedule[2].amount_due);
        assert_eq!(schedule[2].balance_after, 0.0);
    }

    #[test]
    fn test_short_payment_is_settled_by_last_installment() {
        // Payment too small to amortize: the last installment carries the rest
        let schedule = build_schedule(1000.0, 50.0, 4, 0.0, start(), &ScheduleConfig::default()).unwrap();
        assert_eq!(schedule[3].principal, 850.0);
        assert_eq!(schedule[3].amount_due, 850.0);
        assert_relative_eq!(total_repayment(&schedule), 1000.0);
    }

    #[test]
    fn test_oversized_payment_books_no_phantom_interest() {
        let schedule = build_schedule(1000.0, 500.0, 12, 0.0, start(), &ScheduleConfig::default()).unwrap();

        assert_eq!(schedule[0].amount_due, 500.0);
        assert_eq!(schedule[1].amount_due, 500.0);
        assert_eq!(schedule[1].balance_after, 0.0);
        for installment in &schedule[2..] {
            assert_eq!(installment.amount_due, 0.0);
            assert_eq!(installment.interest, 0.0);
            assert_eq!(installment.principal, 0.0);
        }
        assert_relative_eq!(total_repayment(&schedule), 1000.0);

        // Same with interest: nothing is charged once the balance is gone
        let schedule = build_schedule(1000.0, 600.0, 6, 0.12, start(), &ScheduleConfig::default()).unwrap();
        assert_eq!(schedule[1].balance_after, 0.0);
        assert!(schedule[2..].iter().all(|i| i.amount_due == 0.0));
        let interest: f64 = schedule.iter().map(|i| i.interest).sum();
        assert_relative_eq!(total_repayment(&schedule), 1000.0 + interest, epsilon = 1e-9);
    }

    #[test]
    fn test_schedule_invariants_across_terms() {
        let methods = [ScheduleMethod::Annuity, ScheduleMethod::EqualPrincipal];
        let principals = [50.0, 999.99, 1000.0, 2500.0, 25_000.0, 100_000.0];
        let rates = [0.0, 0.05, 0.15, 0.28, 0.6];
        let terms = [1, 2, 3, 6, 7, 12, 24, 36, 60];

        for method in methods {
            let config = ScheduleConfig { method, ..Default::default() };
            for &principal in &principals {
                for &rate in &rates {
                    for &term in &terms {
                        let payment = compute_monthly_payment(principal, rate, term).unwrap();
                        let schedule = build_schedule(principal, payment, term, rate, start(), &config).unwrap();
                        let case = format!("{:?} {} @ {} x {}", method, principal, rate, term);

                        assert_eq!(schedule.len(), term as usize, "{}", case);
                        let principal_sum: f64 = schedule.iter().map(|i| i.principal).sum();
                        assert_relative_eq!(principal_sum, principal, epsilon = 0.01);
                        assert_eq!(schedule.last().unwrap().balance_after, 0.0, "{}", case);

                        let due_sum: f64 = schedule.iter().map(|i| i.amount_due).sum();
                        assert_relative_eq!(total_repayment(&schedule), due_sum, epsilon = 0.005);
                        assert!(total_repayment(&schedule) >= principal - 0.01, "{}", case);
                        if rate == 0.0 {
                            assert_relative_eq!(total_repayment(&schedule), principal, epsilon = 0.01);
                        }

                        for installment in &schedule {
                            assert!(installment.interest >= 0.0 && installment.principal >= 0.0, "{}", case);
                            assert_relative_eq!(
                                installment.amount_due,
                                installment.principal + installment.interest,
                                epsilon = 0.005
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_schedule_guards() {
        let config = ScheduleConfig::default();
        assert!(build_schedule(1000.0, 90.0, 0, 0.15, start(), &config).is_err());
        assert!(build_schedule(0.0, 90.0, 12, 0.15, start(), &config).is_err());
        assert!(build_schedule(1000.0, 0.0, 12, 0.15, start(), &config).is_err());
    }
}
