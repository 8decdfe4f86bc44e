//! Level-payment annuity formulas

use crate::error::{LendingError, Result};

/// Round a currency amount to cents
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub(crate) fn validate_terms(principal: f64, annual_rate: f64, term_months: u32) -> Result<()> {
    if !principal.is_finite() || principal <= 0.0 {
        return Err(LendingError::InvalidLoanTerms(format!(
            "principal must be positive, got {}",
            principal
        )));
    }
    if term_months == 0 {
        return Err(LendingError::InvalidLoanTerms("term must be at least one month".into()));
    }
    if !annual_rate.is_finite() || annual_rate < 0.0 {
        return Err(LendingError::InvalidLoanTerms(format!(
            "annual rate must be a non-negative number, got {}",
            annual_rate
        )));
    }
    Ok(())
}

/// Calculate the level monthly payment for a fully amortizing loan.
///
/// # Arguments
/// * `principal` - Amount lent
/// * `annual_rate` - Nominal annual rate as a decimal (0.15 = 15%), compounded monthly
/// * `term_months` - Number of monthly payments
///
/// # Returns
/// * Payment rounded to cents, or `InvalidLoanTerms`
pub fn compute_monthly_payment(principal: f64, annual_rate: f64, term_months: u32) -> Result<f64> {
    validate_terms(principal, annual_rate, term_months)?;

    let n = term_months as f64;
    if annual_rate == 0.0 {
        return Ok(round_cents(principal / n));
    }

    let r = annual_rate / 12.0;
    let growth = (1.0 + r).powi(term_months as i32);
    Ok(round_cents(principal * r * growth / (growth - 1.0)))
}

/// Present value of `term_months` level payments: the largest principal the
/// payment can service. Zero when payment or term is zero or negative.
pub fn max_affordable_principal(monthly_payment: f64, annual_rate: f64, term_months: u32) -> f64 {
    if !monthly_payment.is_finite() || monthly_payment <= 0.0 || term_months == 0 {
        return 0.0;
    }

    if annual_rate <= 0.0 {
        return monthly_payment * term_months as f64;
    }

    let r = annual_rate / 12.0;
    monthly_payment * (1.0 - (1.0 + r).powi(-(term_months as i32))) / r
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_payment() {
        assert_eq!(compute_monthly_payment(1000.0, 0.15, 12).unwrap(), 90.26);
        assert_eq!(compute_monthly_payment(1200.0, 0.0, 12).unwrap(), 100.0);
        // 1000 / 3 rounds to cents
        assert_eq!(compute_monthly_payment(1000.0, 0.0, 3).unwrap(), 333.33);
    }

    #[test]
    fn test_invalid_terms() {
        assert!(matches!(
            compute_monthly_payment(1000.0, 0.15, 0),
            Err(LendingError::InvalidLoanTerms(_))
        ));
        assert!(compute_monthly_payment(0.0, 0.15, 12).is_err());
        assert!(compute_monthly_payment(-5.0, 0.15, 12).is_err());
        assert!(compute_monthly_payment(1000.0, -0.01, 12).is_err());
        assert!(compute_monthly_payment(1000.0, f64::NAN, 12).is_err());
    }

    #[test]
    fn test_max_affordable_inverts_payment() {
        let pv = max_affordable_principal(90.2583, 0.15, 12);
        assert_relative_eq!(pv, 1000.0, epsilon = 0.01);

        assert_eq!(max_affordable_principal(100.0, 0.0, 12), 1200.0);
        assert_eq!(max_affordable_principal(0.0, 0.15, 12), 0.0);
        assert_eq!(max_affordable_principal(-10.0, 0.15, 12), 0.0);
        assert_eq!(max_affordable_principal(100.0, 0.15, 0), 0.0);
    }
}
