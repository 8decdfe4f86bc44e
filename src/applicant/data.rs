//! Applicant and loan request data structures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Self-reported credit history category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreditHistory {
    Excellent,
    Good,
    Fair,
    Poor,
    NoHistory,
}

impl CreditHistory {
    pub fn label(&self) -> &'static str {
        match self {
            CreditHistory::Excellent => "Excellent",
            CreditHistory::Good => "Good",
            CreditHistory::Fair => "Fair",
            CreditHistory::Poor => "Poor",
            CreditHistory::NoHistory => "No Credit History",
        }
    }
}

impl Default for CreditHistory {
    fn default() -> Self {
        CreditHistory::NoHistory
    }
}

impl FromStr for CreditHistory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Excellent" => Ok(CreditHistory::Excellent),
            "Good" => Ok(CreditHistory::Good),
            "Fair" => Ok(CreditHistory::Fair),
            "Poor" => Ok(CreditHistory::Poor),
            "No Credit History" | "None" | "" => Ok(CreditHistory::NoHistory),
            other => Err(format!("Unknown credit history: {}", other)),
        }
    }
}

impl fmt::Display for CreditHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Employment status of the applicant
///
/// Statuses outside the known set are kept verbatim and score zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmploymentStatus {
    Employed,
    BusinessOwner,
    SelfEmployed,
    Farmer,
    Student,
    Unemployed,
    Other(String),
}

impl EmploymentStatus {
    pub fn label(&self) -> &str {
        match self {
            EmploymentStatus::Employed => "Employed",
            EmploymentStatus::BusinessOwner => "Business Owner",
            EmploymentStatus::SelfEmployed => "Self-Employed",
            EmploymentStatus::Farmer => "Farmer",
            EmploymentStatus::Student => "Student",
            EmploymentStatus::Unemployed => "Unemployed",
            EmploymentStatus::Other(label) => label,
        }
    }

    /// Parse a label; unknown labels become `Other`
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Employed" => EmploymentStatus::Employed,
            "Business Owner" => EmploymentStatus::BusinessOwner,
            "Self-Employed" => EmploymentStatus::SelfEmployed,
            "Farmer" => EmploymentStatus::Farmer,
            "Student" => EmploymentStatus::Student,
            "Unemployed" => EmploymentStatus::Unemployed,
            other => EmploymentStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EmploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Monthly financial position as declared on the application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    /// Total outstanding debt (not monthly)
    pub current_debt: f64,
    pub savings: f64,
}

impl Financials {
    /// Income left after expenses
    pub fn net_monthly_income(&self) -> f64 {
        self.monthly_income - self.monthly_expenses
    }

    /// Debt divided by annualized income; 1.0 when there is no income
    pub fn debt_to_income(&self) -> f64 {
        if self.monthly_income > 0.0 {
            self.current_debt / (self.monthly_income * 12.0)
        } else {
            1.0
        }
    }

    /// Savings divided by annualized income; 0.0 when there is no income
    pub fn savings_ratio(&self) -> f64 {
        if self.monthly_income > 0.0 {
            self.savings / (self.monthly_income * 12.0)
        } else {
            0.0
        }
    }
}

/// Person applying for a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub full_name: String,
    /// Mobile-money account (MSISDN)
    pub phone_number: String,
    #[serde(default)]
    pub email: Option<String>,
    pub age: u32,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub marital_status: Option<String>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub dependents: u32,

    pub employment_status: EmploymentStatus,
    #[serde(default)]
    pub employer_name: Option<String>,
    pub employment_years: u32,
    #[serde(default)]
    pub credit_history: CreditHistory,

    pub financials: Financials,
}

impl Applicant {
    /// Minimal applicant with the fields the scorer reads
    pub fn new(
        full_name: impl Into<String>,
        phone_number: impl Into<String>,
        age: u32,
        employment_status: EmploymentStatus,
        employment_years: u32,
        financials: Financials,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            phone_number: phone_number.into(),
            email: None,
            age,
            gender: None,
            marital_status: None,
            education_level: None,
            address: None,
            dependents: 0,
            employment_status,
            employer_name: None,
            employment_years,
            credit_history: CreditHistory::NoHistory,
            financials,
        }
    }

    pub fn with_credit_history(mut self, history: CreditHistory) -> Self {
        self.credit_history = history;
        self
    }

    pub fn with_dependents(mut self, dependents: u32) -> Self {
        self.dependents = dependents;
        self
    }
}

/// What the applicant is asking for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub amount: f64,
    pub purpose: String,
    pub term_months: u32,
    #[serde(default)]
    pub collateral: Option<String>,
}

impl LoanRequest {
    pub fn new(amount: f64, purpose: impl Into<String>, term_months: u32) -> Self {
        Self {
            amount,
            purpose: purpose.into(),
            term_months,
            collateral: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debt_to_income() {
        let fin = Financials {
            monthly_income: 1000.0,
            monthly_expenses: 400.0,
            current_debt: 3600.0,
            savings: 1200.0,
        };
        assert!((fin.debt_to_income() - 0.3).abs() < 1e-12);
        assert!((fin.savings_ratio() - 0.1).abs() < 1e-12);
        assert_eq!(fin.net_monthly_income(), 600.0);

        // No income: worst-case DTI, no savings credit
        let broke = Financials { current_debt: 500.0, savings: 500.0, ..Default::default() };
        assert_eq!(broke.debt_to_income(), 1.0);
        assert_eq!(broke.savings_ratio(), 0.0);
    }

    #[test]
    fn test_labels_round_trip_through_parsing() {
        for history in [
            CreditHistory::Excellent,
            CreditHistory::Good,
            CreditHistory::Fair,
            CreditHistory::Poor,
            CreditHistory::NoHistory,
        ] {
            assert_eq!(history.label().parse::<CreditHistory>().unwrap(), history);
        }
        assert!("Stellar".parse::<CreditHistory>().is_err());

        assert_eq!(EmploymentStatus::from_label("Self-Employed"), EmploymentStatus::SelfEmployed);
        assert_eq!(
            EmploymentStatus::from_label("Retired"),
            EmploymentStatus::Other("Retired".to_string())
        );
    }
}
