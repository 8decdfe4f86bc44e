//! Portfolio and application summaries

use serde::{Deserialize, Serialize};

use super::records::{ApplicationStatus, Loan, LoanApplication, LoanStatus};
use crate::amortization::round_cents;

/// Summary statistics over every loan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub total_loans: usize,
    /// Sum of principals
    pub total_disbursed: f64,
    pub total_collected: f64,
    /// Remaining balance across active loans
    pub outstanding_balance: f64,
    pub active_loans: usize,
    pub completed_loans: usize,
    pub defaulted_loans: usize,
    /// defaulted / total, as a fraction
    pub default_rate: f64,
    pub average_loan_amount: f64,
    pub average_term_months: f64,
}

impl PortfolioStats {
    pub fn from_loans(loans: &[Loan]) -> Self {
        if loans.is_empty() {
            return Self::default();
        }

        let count_status = |status: LoanStatus| loans.iter().filter(|l| l.status == status).count();
        let total_loans = loans.len();
        let n = total_loans as f64;

        let total_disbursed: f64 = loans.iter().map(|l| l.principal).sum();
        let total_collected: f64 = loans.iter().map(|l| l.amount_paid).sum();
        let outstanding_balance: f64 = loans
            .iter()
            .filter(|l| l.is_active())
            .map(|l| l.remaining_balance)
            .sum();
        let total_term: u32 = loans.iter().map(|l| l.term_months).sum();
        let defaulted_loans = count_status(LoanStatus::Defaulted);

        PortfolioStats {
            total_loans,
            total_disbursed: round_cents(total_disbursed),
            total_collected: round_cents(total_collected),
            outstanding_balance: round_cents(outstanding_balance),
            active_loans: count_status(LoanStatus::Active),
            completed_loans: count_status(LoanStatus::Completed),
            defaulted_loans,
            default_rate: defaulted_loans as f64 / n,
            average_loan_amount: round_cents(total_disbursed / n),
            average_term_months: total_term as f64 / n,
        }
    }
}

/// Counts of applications per status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStats {
    pub total_applications: usize,
    pub pending: usize,
    pub approved: usize,
    pub conditional: usize,
    pub rejected: usize,
    /// approved / total, as a fraction
    pub approval_rate: f64,
}

impl ApplicationStats {
    pub fn from_applications(applications: &[LoanApplication]) -> Self {
        if applications.is_empty() {
            return Self::default();
        }

        let count = |status: ApplicationStatus| applications.iter().filter(|a| a.status == status).count();
        let approved = count(ApplicationStatus::Approved);

        ApplicationStats {
            total_applications: applications.len(),
            pending: count(ApplicationStatus::Pending),
            approved,
            conditional: count(ApplicationStatus::Conditional),
            rejected: count(ApplicationStatus::Rejected),
            approval_rate: approved as f64 / applications.len() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::applicant::LoanRequest;

    fn loan(principal: f64, term_months: u32, amount_paid: f64, status: LoanStatus) -> Loan {
        let now = Utc::now();
        Loan {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            applicant_id: Uuid::new_v4(),
            principal,
            annual_rate: 0.15,
            term_months,
            monthly_payment: 0.0,
            total_repayment: principal * 1.1,
            amount_paid,
            remaining_balance: round_cents(principal * 1.1 - amount_paid),
            next_payment_date: None,
            status,
            disbursement_ref: None,
            disbursed_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_empty_portfolio_is_all_zero() {
        assert_eq!(PortfolioStats::from_loans(&[]), PortfolioStats::default());
        assert_eq!(ApplicationStats::from_applications(&[]), ApplicationStats::default());
    }

    #[test]
    fn test_portfolio_totals() {
        let loans = vec![
            loan(1000.0, 12, 200.0, LoanStatus::Active),
            loan(500.0, 6, 550.0, LoanStatus::Completed),
            loan(1500.0, 12, 0.0, LoanStatus::Defaulted),
            loan(1000.0, 6, 0.0, LoanStatus::Active),
        ];
        let stats = PortfolioStats::from_loans(&loans);

        assert_eq!(stats.total_loans, 4);
        assert_eq!(stats.total_disbursed, 4000.0);
        assert_eq!(stats.total_collected, 750.0);
        assert_eq!(stats.outstanding_balance, 2000.0);
        assert_eq!((stats.active_loans, stats.completed_loans, stats.defaulted_loans), (2, 1, 1));
        assert_relative_eq!(stats.default_rate, 0.25);
        assert_relative_eq!(stats.average_loan_amount, 1000.0);
        assert_relative_eq!(stats.average_term_months, 9.0);
    }

    #[test]
    fn test_application_approval_rate() {
        let now = Utc::now();
        let mut applications: Vec<LoanApplication> = (0..4)
            .map(|_| LoanApplication::new(Uuid::new_v4(), LoanRequest::new(500.0, "stock", 6), now))
            .collect();
        applications[0].status = ApplicationStatus::Approved;
        applications[1].status = ApplicationStatus::Rejected;
        applications[2].status = ApplicationStatus::Conditional;

        let stats = ApplicationStats::from_applications(&applications);
        assert_eq!(stats.total_applications, 4);
        assert_eq!((stats.pending, stats.approved, stats.conditional, stats.rejected), (1, 1, 1, 1));
        assert_relative_eq!(stats.approval_rate, 0.25);
    }
}
