//! Decision thresholds, affordability and confidence settings

use std::collections::HashMap;

use super::loader::LoadError;
use super::scorecard::Scorecard;
use crate::amortization::max_affordable_principal;
use crate::scoring::{Decision, RiskTier};

/// Threshold table mapping score/DTI/net income to a decision
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPolicy {
    /// Scores at or above this are LOW risk
    pub low_risk_min_score: i32,
    /// Scores at or above this (and below LOW) are MEDIUM risk
    pub medium_risk_min_score: i32,

    pub approve_min_score: i32,
    /// DTI must be strictly below this to approve
    pub approve_max_dti: f64,

    pub conditional_min_score: i32,
    /// DTI must be strictly below this for a conditional offer
    pub conditional_max_dti: f64,
    /// Share of the requested amount offered on a conditional decision
    pub conditional_amount_factor: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            low_risk_min_score: 700,
            medium_risk_min_score: 600,
            approve_min_score: 650,
            approve_max_dti: 0.5,
            conditional_min_score: 550,
            conditional_max_dti: 0.7,
            conditional_amount_factor: 0.7,
        }
    }
}

impl DecisionPolicy {
    pub fn risk_tier(&self, score: i32) -> RiskTier {
        if score >= self.low_risk_min_score {
            RiskTier::Low
        } else if score >= self.medium_risk_min_score {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }

    /// Apply the decision table, first matching row wins
    pub fn decide(&self, score: i32, debt_to_income: f64, net_income: f64) -> Decision {
        if score >= self.approve_min_score && debt_to_income < self.approve_max_dti && net_income > 0.0 {
            Decision::Approved
        } else if score >= self.conditional_min_score && debt_to_income < self.conditional_max_dti {
            Decision::Conditional
        } else {
            Decision::Rejected
        }
    }

    /// Amount to offer for a decision
    pub fn suggested_amount(&self, decision: Decision, requested: f64, max_affordable: f64) -> f64 {
        match decision {
            Decision::Approved => requested.min(max_affordable),
            Decision::Conditional => (requested * self.conditional_amount_factor).min(max_affordable),
            Decision::Rejected => 0.0,
        }
    }
}

/// Reference terms used to turn monthly capacity into a maximum principal
#[derive(Debug, Clone, PartialEq)]
pub struct AffordabilityConfig {
    /// Share of net monthly income available for repayments
    pub payment_share: f64,
    pub reference_annual_rate: f64,
    pub reference_term_months: u32,
}

impl Default for AffordabilityConfig {
    fn default() -> Self {
        Self {
            payment_share: 0.30,
            reference_annual_rate: 0.15,
            reference_term_months: 12,
        }
    }
}

impl AffordabilityConfig {
    /// Monthly repayment the applicant can carry
    pub fn monthly_capacity(&self, net_monthly_income: f64) -> f64 {
        net_monthly_income * self.payment_share
    }

    /// Largest principal serviceable at the reference rate and term
    pub fn max_affordable(&self, net_monthly_income: f64) -> f64 {
        max_affordable_principal(
            self.monthly_capacity(net_monthly_income),
            self.reference_annual_rate,
            self.reference_term_months,
        )
    }
}

/// Inputs to the assessment confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidencePolicy {
    /// Requests above this multiple of monthly income are unreasonable
    pub max_request_income_multiple: f64,
    /// Consistency factor when expenses meet or exceed income
    pub inconsistent_factor: f64,
    /// Reasonableness factor for out-of-range requests
    pub unreasonable_factor: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            max_request_income_multiple: 6.0,
            inconsistent_factor: 0.5,
            unreasonable_factor: 0.7,
        }
    }
}

/// Apply `parameter,value` overrides from decision_policy.csv
pub fn apply_overrides(
    overrides: &HashMap<String, f64>,
    scorecard: &mut Scorecard,
    policy: &mut DecisionPolicy,
    affordability: &mut AffordabilityConfig,
    confidence: &mut ConfidencePolicy,
) -> Result<(), LoadError> {
    for (name, &value) in overrides {
        match name.as_str() {
            "base_score" => scorecard.base_score = value as i32,
            "min_score" => scorecard.min_score = value as i32,
            "max_score" => scorecard.max_score = value as i32,
            "low_risk_min_score" => policy.low_risk_min_score = value as i32,
            "medium_risk_min_score" => policy.medium_risk_min_score = value as i32,
            "approve_min_score" => policy.approve_min_score = value as i32,
            "approve_max_dti" => policy.approve_max_dti = value,
            "conditional_min_score" => policy.conditional_min_score = value as i32,
            "conditional_max_dti" => policy.conditional_max_dti = value,
            "conditional_amount_factor" => policy.conditional_amount_factor = value,
            "affordability_payment_share" => affordability.payment_share = value,
            "affordability_annual_rate" => affordability.reference_annual_rate = value,
            "affordability_term_months" => affordability.reference_term_months = value as u32,
            "max_request_income_multiple" => confidence.max_request_income_multiple = value,
            "inconsistent_factor" => confidence.inconsistent_factor = value,
            "unreasonable_factor" => confidence.unreasonable_factor = value,
            other => {
                return Err(LoadError::Parse {
                    file: "decision_policy.csv".into(),
                    line: 0,
                    detail: format!("Unknown parameter: {}", other),
                })
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_decision_table() {
        let policy = DecisionPolicy::default();

        assert_eq!(policy.decide(660, 0.3, 500.0), Decision::Approved);
        assert_eq!(policy.decide(580, 0.6, 500.0), Decision::Conditional);
        assert_eq!(policy.decide(500, 0.8, 500.0), Decision::Rejected);

        // Approval needs positive net income; falls through to conditional
        assert_eq!(policy.decide(700, 0.1, 0.0), Decision::Conditional);
        // DTI bounds are strict
        assert_eq!(policy.decide(700, 0.5, 100.0), Decision::Conditional);
        assert_eq!(policy.decide(600, 0.7, 100.0), Decision::Rejected);
    }

    #[test]
    fn test_risk_tiers() {
        let policy = DecisionPolicy::default();

        assert_eq!(policy.risk_tier(850), RiskTier::Low);
        assert_eq!(policy.risk_tier(700), RiskTier::Low);
        assert_eq!(policy.risk_tier(699), RiskTier::Medium);
        assert_eq!(policy.risk_tier(600), RiskTier::Medium);
        assert_eq!(policy.risk_tier(599), RiskTier::High);
        assert_eq!(policy.risk_tier(300), RiskTier::High);
    }

    #[test]
    fn test_suggested_amount() {
        let policy = DecisionPolicy::default();

        assert_eq!(policy.suggested_amount(Decision::Approved, 1000.0, 1500.0), 1000.0);
        assert_eq!(policy.suggested_amount(Decision::Approved, 1000.0, 800.0), 800.0);
        assert_relative_eq!(policy.suggested_amount(Decision::Conditional, 1000.0, 1500.0), 700.0);
        assert_eq!(policy.suggested_amount(Decision::Conditional, 1000.0, 500.0), 500.0);
        assert_eq!(policy.suggested_amount(Decision::Rejected, 1000.0, 1500.0), 0.0);
    }

    #[test]
    fn test_max_affordable_at_reference_terms() {
        let afford = AffordabilityConfig::default();

        // 30% of 300 = 90/month for 12 months at 15%
        assert_relative_eq!(afford.monthly_capacity(300.0), 90.0);
        assert_relative_eq!(afford.max_affordable(300.0), 997.14, epsilon = 0.01);
        assert_eq!(afford.max_affordable(-50.0), 0.0);
    }

    #[test]
    fn test_unknown_override_is_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert("approve_max_dti".to_string(), 0.45);

        let mut card = Scorecard::default();
        let mut policy = DecisionPolicy::default();
        let mut afford = AffordabilityConfig::default();
        let mut confidence = ConfidencePolicy::default();
        apply_overrides(&overrides, &mut card, &mut policy, &mut afford, &mut confidence).unwrap();
        assert_eq!(policy.approve_max_dti, 0.45);

        overrides.insert("approve_fast".to_string(), 1.0);
        assert!(apply_overrides(&overrides, &mut card, &mut policy, &mut afford, &mut confidence).is_err());
    }
}
