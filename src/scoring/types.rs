//! Assessment output types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AssessmentInputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(RiskTier::Low),
            "MEDIUM" => Ok(RiskTier::Medium),
            "HIGH" => Ok(RiskTier::High),
            other => Err(format!("Unknown risk tier: {}", other)),
        }
    }
}

/// Lending recommendation from the decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approved,
    Conditional,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "APPROVED",
            Decision::Conditional => "CONDITIONAL",
            Decision::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Decision::Approved),
            "CONDITIONAL" => Ok(Decision::Conditional),
            "REJECTED" => Ok(Decision::Rejected),
            other => Err(format!("Unknown decision: {}", other)),
        }
    }
}

/// Raw inputs behind the score, kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFactors {
    pub monthly_income: f64,
    pub employment_years: u32,
    pub debt_to_income: f64,
    pub savings_ratio: f64,
    pub net_monthly_income: f64,
}

/// Result of scoring one applicant against one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditAssessment {
    /// 300-850
    pub credit_score: i32,
    pub risk_tier: RiskTier,
    pub decision: Decision,
    pub suggested_amount: f64,
    pub max_affordable_amount: f64,
    /// Monthly repayment capacity
    pub monthly_affordability: f64,
    /// 0.0-1.0, two decimals
    pub confidence: f64,
    pub debt_to_income: f64,
    pub key_factors: Option<KeyFactors>,
    pub assessed_at: DateTime<Utc>,
    /// Set when the inputs were malformed and the fail-closed result was returned
    pub input_error: Option<AssessmentInputError>,
}

impl CreditAssessment {
    /// Conservative result used when inputs cannot be scored
    pub fn fail_closed(error: AssessmentInputError) -> Self {
        Self {
            credit_score: 400,
            risk_tier: RiskTier::High,
            decision: Decision::Rejected,
            suggested_amount: 0.0,
            max_affordable_amount: 0.0,
            monthly_affordability: 0.0,
            confidence: 0.1,
            debt_to_income: 1.0,
            key_factors: None,
            assessed_at: Utc::now(),
            input_error: Some(error),
        }
    }

    pub fn is_fail_closed(&self) -> bool {
        self.input_error.is_some()
    }
}

/// A specific concern found in an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskFactor {
    pub category: &'static str,
    pub description: &'static str,
}
