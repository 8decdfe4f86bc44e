//! Heuristic credit scorer

use chrono::Utc;
use log::{debug, warn};

use super::types::{CreditAssessment, KeyFactors, RiskFactor};
use crate::amortization::round_cents;
use crate::applicant::{Applicant, LoanRequest};
use crate::assumptions::{Assumptions, LoanProduct};
use crate::error::AssessmentInputError;

/// Oldest age accepted as valid input
const MAX_AGE: u32 = 120;

/// Scores applicants against a set of lending assumptions
#[derive(Debug, Clone, Default)]
pub struct CreditScorer {
    assumptions: Assumptions,
}

impl CreditScorer {
    pub fn new(assumptions: Assumptions) -> Self {
        Self { assumptions }
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    /// Score an application. Malformed inputs yield the fail-closed assessment
    /// with `input_error` set; this never fails.
    pub fn score(&self, applicant: &Applicant, request: &LoanRequest) -> CreditAssessment {
        match self.try_score(applicant, request) {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!("Scoring {} failed closed: {}", applicant.full_name, e);
                CreditAssessment::fail_closed(e)
            }
        }
    }

    /// Score an application, surfacing malformed inputs as an error
    pub fn try_score(
        &self,
        applicant: &Applicant,
        request: &LoanRequest,
    ) -> Result<CreditAssessment, AssessmentInputError> {
        validate(applicant, request)?;

        let card = &self.assumptions.scorecard;
        let fin = &applicant.financials;
        let dti = fin.debt_to_income();
        let savings_ratio = fin.savings_ratio();
        let net_income = fin.net_monthly_income();

        let raw = card.base_score
            + card.monthly_income.points(fin.monthly_income)
            + card.debt_to_income.points(dti)
            + card.employment_years.points(applicant.employment_years as f64)
            + card.age.points(applicant.age)
            + card.savings_ratio.points(savings_ratio)
            + card.credit_history_points(applicant.credit_history)
            + card.employment_status_points(&applicant.employment_status)
            + card.dependents.points(applicant.dependents as f64);
        let credit_score = card.clamp(raw);

        let policy = &self.assumptions.decision;
        let afford = &self.assumptions.affordability;
        let monthly_affordability = afford.monthly_capacity(net_income);
        let max_affordable = afford.max_affordable(net_income);

        let decision = policy.decide(credit_score, dti, net_income);
        let suggested = policy.suggested_amount(decision, request.amount, max_affordable);

        debug!(
            "Scored {}: raw={} score={} dti={:.3} decision={}",
            applicant.full_name, raw, credit_score, dti, decision
        );

        Ok(CreditAssessment {
            credit_score,
            risk_tier: policy.risk_tier(credit_score),
            decision,
            suggested_amount: round_cents(suggested.max(0.0)),
            max_affordable_amount: round_cents(max_affordable),
            monthly_affordability: round_cents(monthly_affordability),
            confidence: self.confidence(applicant, request),
            debt_to_income: (dti * 1000.0).round() / 1000.0,
            key_factors: Some(KeyFactors {
                monthly_income: fin.monthly_income,
                employment_years: applicant.employment_years,
                debt_to_income: dti,
                savings_ratio,
                net_monthly_income: net_income,
            }),
            assessed_at: Utc::now(),
            input_error: None,
        })
    }

    /// Mean of data completeness, consistency and request reasonableness
    fn confidence(&self, applicant: &Applicant, request: &LoanRequest) -> f64 {
        let policy = &self.assumptions.confidence;
        let fin = &applicant.financials;

        let present = [
            fin.monthly_income > 0.0,
            fin.monthly_expenses > 0.0,
            applicant.employment_years > 0,
            applicant.age > 0,
        ];
        let completeness = present.iter().filter(|&&p| p).count() as f64 / present.len() as f64;

        let consistency = if fin.monthly_income > fin.monthly_expenses {
            1.0
        } else {
            policy.inconsistent_factor
        };

        let reasonable = request.amount > 0.0
            && request.amount <= fin.monthly_income * policy.max_request_income_multiple;
        let reasonableness = if reasonable { 1.0 } else { policy.unreasonable_factor };

        let mean = (completeness + consistency + reasonableness) / 3.0;
        (mean * 100.0).round() / 100.0
    }

    /// Specific concerns in an application, independent of the score
    pub fn risk_factors(&self, applicant: &Applicant, request: &LoanRequest) -> Vec<RiskFactor> {
        let fin = &applicant.financials;
        let net_income = fin.net_monthly_income();
        let mut factors = Vec::new();

        if fin.monthly_income < 300.0 {
            factors.push(RiskFactor {
                category: "income",
                description: "Very low monthly income increases default risk",
            });
        }

        if net_income <= 0.0 {
            factors.push(RiskFactor {
                category: "cashflow",
                description: "Expenses exceed income, negative cash flow",
            });
        } else if net_income < request.amount * 0.1 {
            factors.push(RiskFactor {
                category: "cashflow",
                description: "Very tight cash flow for loan repayment",
            });
        }

        if fin.current_debt > fin.monthly_income * 6.0 {
            factors.push(RiskFactor {
                category: "debt",
                description: "High existing debt burden",
            });
        }

        if applicant.employment_years < 1 {
            factors.push(RiskFactor {
                category: "employment",
                description: "Limited employment history",
            });
        }

        if request.amount > fin.monthly_income * 3.0 {
            factors.push(RiskFactor {
                category: "loan_size",
                description: "Requested amount is high relative to income",
            });
        }

        factors
    }

    /// Catalog products the assessed applicant qualifies for
    pub fn qualified_products(&self, assessment: &CreditAssessment, applicant: &Applicant) -> Vec<&LoanProduct> {
        if assessment.is_fail_closed() {
            return Vec::new();
        }
        self.assumptions
            .catalog
            .qualified(assessment.credit_score, applicant.financials.monthly_income)
    }
}

fn validate(applicant: &Applicant, request: &LoanRequest) -> Result<(), AssessmentInputError> {
    let fin = &applicant.financials;
    let fields = [
        ("monthly_income", fin.monthly_income),
        ("monthly_expenses", fin.monthly_expenses),
        ("current_debt", fin.current_debt),
        ("savings", fin.savings),
        ("amount", request.amount),
    ];

    for (field, value) in fields {
        if !value.is_finite() {
            return Err(AssessmentInputError::new(field, "not a finite number"));
        }
        if value < 0.0 {
            return Err(AssessmentInputError::new(field, format!("negative value {}", value)));
        }
    }

    if applicant.age > MAX_AGE {
        return Err(AssessmentInputError::new(
            "age",
            format!("{} is outside 0..={}", applicant.age, MAX_AGE),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applicant::{CreditHistory, EmploymentStatus, Financials};
    use crate::scoring::{Decision, RiskTier};
    use approx::assert_relative_eq;

    fn strong_applicant() -> Applicant {
        Applicant::new(
            "Thandi Nkosi",
            "0821234567",
            32,
            EmploymentStatus::Employed,
            6,
            Financials {
                monthly_income: 2500.0,
                monthly_expenses: 1000.0,
                current_debt: 3000.0,
                savings: 7000.0,
            },
        )
        .with_credit_history(CreditHistory::Good)
    }

    fn weak_applicant() -> Applicant {
        Applicant::new(
            "Sipho Dlamini",
            "0781234567",
            19,
            EmploymentStatus::Unemployed,
            0,
            Financials {
                monthly_income: 200.0,
                monthly_expenses: 250.0,
                current_debt: 5000.0,
                savings: 0.0,
            },
        )
        .with_credit_history(CreditHistory::Poor)
        .with_dependents(4)
    }

    #[test]
    fn test_strong_applicant_is_approved() {
        let scorer = CreditScorer::default();
        let request = LoanRequest::new(1500.0, "Stock for spaza shop", 12);
        let result = scorer.score(&strong_applicant(), &request);

        // 500 + 80 + 70 + 60 + 30 + 40 + 35 + 20 + 15 = 850
        assert_eq!(result.credit_score, 850);
        assert_eq!(result.risk_tier, RiskTier::Low);
        assert_eq!(result.decision, Decision::Approved);
        assert_eq!(result.suggested_amount, 1500.0);
        assert_eq!(result.monthly_affordability, 450.0);
        assert_relative_eq!(result.max_affordable_amount, 4985.69, epsilon = 0.01);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.debt_to_income, 0.1);
        assert!(result.input_error.is_none());
    }

    #[test]
    fn test_weak_applicant_is_rejected_at_floor() {
        let scorer = CreditScorer::default();
        let request = LoanRequest::new(2000.0, "Emergency", 6);
        let result = scorer.score(&weak_applicant(), &request);

        // 500 - 20 - 50 - 10 + 20 + 0 - 20 - 30 - 10 = 380
        assert_eq!(result.credit_score, 380);
        assert_eq!(result.risk_tier, RiskTier::High);
        assert_eq!(result.decision, Decision::Rejected);
        assert_eq!(result.suggested_amount, 0.0);
        // completeness 0.75 (no employment years), inconsistent 0.5, unreasonable 0.7
        assert_relative_eq!(result.confidence, 0.65);
    }

    #[test]
    fn test_score_is_clamped() {
        let mut assumptions = Assumptions::default_lending();
        assumptions.scorecard.base_score = 100;
        let scorer = CreditScorer::new(assumptions);

        let result = scorer.score(&weak_applicant(), &LoanRequest::new(100.0, "x", 1));
        assert_eq!(result.credit_score, 300);
    }

    #[test]
    fn test_malformed_input_fails_closed() {
        let scorer = CreditScorer::default();
        let mut applicant = strong_applicant();
        applicant.financials.monthly_income = -1.0;

        let request = LoanRequest::new(1000.0, "x", 12);
        let result = scorer.score(&applicant, &request);

        assert!(result.is_fail_closed());
        assert_eq!(result.credit_score, 400);
        assert_eq!(result.risk_tier, RiskTier::High);
        assert_eq!(result.decision, Decision::Rejected);
        assert_eq!(result.confidence, 0.1);
        assert_eq!(result.debt_to_income, 1.0);
        assert_eq!(result.suggested_amount, 0.0);
        assert_eq!(result.input_error.as_ref().unwrap().field, "monthly_income");

        let err = scorer.try_score(&applicant, &request).unwrap_err();
        assert_eq!(err.field, "monthly_income");

        applicant = strong_applicant();
        applicant.age = 130;
        assert_eq!(scorer.score(&applicant, &request).input_error.unwrap().field, "age");

        applicant = strong_applicant();
        applicant.financials.savings = f64::NAN;
        assert!(scorer.score(&applicant, &request).is_fail_closed());
    }

    #[test]
    fn test_conditional_offer_is_reduced() {
        let scorer = CreditScorer::default();
        // 500 + 60 + 10 + 20 + 20 + 0 + 0 + 10 + 5 = 625, below the approval threshold
        let applicant = Applicant::new(
            "Lerato Mokoena",
            "0831234567",
            50,
            EmploymentStatus::SelfEmployed,
            2,
            Financials {
                monthly_income: 1000.0,
                monthly_expenses: 400.0,
                current_debt: 6000.0,
                savings: 0.0,
            },
        )
        .with_dependents(1);

        let result = scorer.score(&applicant, &LoanRequest::new(1000.0, "Tools", 12));
        assert_eq!(result.credit_score, 625);
        assert_eq!(result.decision, Decision::Conditional);
        assert_relative_eq!(result.suggested_amount, 700.0);
    }

    #[test]
    fn test_risk_factors() {
        let scorer = CreditScorer::default();
        let factors = scorer.risk_factors(&weak_applicant(), &LoanRequest::new(2000.0, "x", 6));
        let categories: Vec<&str> = factors.iter().map(|f| f.category).collect();

        assert_eq!(categories, vec!["income", "cashflow", "debt", "employment", "loan_size"]);
        assert!(scorer
            .risk_factors(&strong_applicant(), &LoanRequest::new(1500.0, "x", 12))
            .is_empty());
    }

    #[test]
    fn test_qualified_products_follow_score() {
        let scorer = CreditScorer::default();
        let applicant = strong_applicant();
        let assessment = scorer.score(&applicant, &LoanRequest::new(1500.0, "x", 12));

        let ids: Vec<&str> = scorer
            .qualified_products(&assessment, &applicant)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["emergency_cash"]);
    }

    #[test]
    fn test_score_stays_in_range_for_extreme_inputs() {
        let scorer = CreditScorer::default();
        let statuses = [
            EmploymentStatus::Employed,
            EmploymentStatus::BusinessOwner,
            EmploymentStatus::Farmer,
            EmploymentStatus::Student,
            EmploymentStatus::Unemployed,
            EmploymentStatus::Other("Contractor".into()),
        ];
        let histories = [CreditHistory::Excellent, CreditHistory::Poor, CreditHistory::NoHistory];
        let incomes = [0.0, 0.01, 500.0, 25_000.0, 1e9, -10.0, f64::NAN, f64::INFINITY];
        let debts = [0.0, 1e7, 1e12];
        let ages = [0, 18, 45, 75, 120];
        let amounts = [0.0, 1.0, 5000.0, 1e9];
        let terms = [0, 1, 12, 360];

        for status in &statuses {
            for &history in &histories {
                for &income in &incomes {
                    for &debt in &debts {
                        for &age in &ages {
                            let applicant = Applicant::new(
                                "Sweep",
                                "0821234567",
                                age,
                                status.clone(),
                                if age > 40 { 40 } else { 0 },
                                Financials {
                                    monthly_income: income,
                                    monthly_expenses: income * 0.9,
                                    current_debt: debt,
                                    savings: debt / 2.0,
                                },
                            )
                            .with_credit_history(history)
                            .with_dependents(age / 10);

                            for &amount in &amounts {
                                for &term in &terms {
                                    let result = scorer.score(&applicant, &LoanRequest::new(amount, "x", term));
                                    assert!(
                                        (300..=850).contains(&result.credit_score),
                                        "score {} for income {} debt {} age {} amount {} term {}",
                                        result.credit_score, income, debt, age, amount, term
                                    );
                                    assert!((0.0..=1.0).contains(&result.confidence));
                                    assert!(result.suggested_amount.is_finite() && result.suggested_amount >= 0.0);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
