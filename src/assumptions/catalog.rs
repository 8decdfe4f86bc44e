//! Loan product catalog
//!
//! Products are plain table rows; markets differ only by the rows loaded.

use serde::{Deserialize, Serialize};

/// A loan product offered to qualifying applicants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanProduct {
    pub id: String,
    pub name: String,
    pub min_amount: f64,
    pub max_amount: f64,
    /// Flat monthly rate (0.05 = 5% per month)
    pub monthly_rate: f64,
    pub term_months: u32,
    pub min_score: i32,
    pub min_monthly_income: f64,
    pub description: String,
}

impl LoanProduct {
    pub fn qualifies(&self, credit_score: i32, monthly_income: f64) -> bool {
        credit_score >= self.min_score && monthly_income >= self.min_monthly_income
    }

    /// Annualized nominal rate, for amortizing a loan under this product
    pub fn annual_rate(&self) -> f64 {
        self.monthly_rate * 12.0
    }
}

/// Table of loan products loaded at construction
#[derive(Debug, Clone, PartialEq)]
pub struct ProductCatalog {
    products: Vec<LoanProduct>,
    /// Share of monthly income that may go to repayments
    pub affordability_share: f64,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self {
            products: vec![
                product("emergency_cash", "Emergency Cash", 500.0, 3000.0, 0.05, 1, 400, 2000.0,
                    "Quick cash for emergencies."),
                product("payday_advance", "Payday Advance", 1000.0, 8000.0, 0.04, 3, 500, 5000.0,
                    "Bridge to payday with affordable repayments."),
                product("personal_loan", "Personal Loan", 5000.0, 25000.0, 0.035, 6, 600, 8000.0,
                    "Personal loans for life's bigger moments."),
                product("consolidation_loan", "Debt Consolidation", 10000.0, 50000.0, 0.025, 12, 700, 12000.0,
                    "Consolidate your debts into one payment."),
            ],
            affordability_share: 0.25,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn product(
    id: &str,
    name: &str,
    min_amount: f64,
    max_amount: f64,
    monthly_rate: f64,
    term_months: u32,
    min_score: i32,
    min_monthly_income: f64,
    description: &str,
) -> LoanProduct {
    LoanProduct {
        id: id.to_string(),
        name: name.to_string(),
        min_amount,
        max_amount,
        monthly_rate,
        term_months,
        min_score,
        min_monthly_income,
        description: description.to_string(),
    }
}

impl ProductCatalog {
    /// Create from loaded CSV rows
    pub fn from_loaded(products: &[LoanProduct], affordability_share: f64) -> Self {
        Self {
            products: products.to_vec(),
            affordability_share,
        }
    }

    pub fn products(&self) -> &[LoanProduct] {
        &self.products
    }

    pub fn get(&self, id: &str) -> Option<&LoanProduct> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Products the applicant qualifies for, in catalog order
    pub fn qualified(&self, credit_score: i32, monthly_income: f64) -> Vec<&LoanProduct> {
        self.products
            .iter()
            .filter(|p| p.qualifies(credit_score, monthly_income))
            .collect()
    }

    /// Affordable amount under a product, clamped to the product's limits.
    ///
    /// Uses flat (simple) interest over the product term:
    /// `amount = capacity * n / (1 + rate * n)`.
    pub fn suggested_amount(&self, product: &LoanProduct, monthly_income: f64) -> f64 {
        let capacity = monthly_income * self.affordability_share;
        let n = product.term_months as f64;

        let affordable = if product.monthly_rate > 0.0 {
            capacity * n / (1.0 + product.monthly_rate * n)
        } else {
            capacity * n
        };

        affordable.max(product.min_amount).min(product.max_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_qualified_products() {
        let catalog = ProductCatalog::default();

        let ids = |score, income| -> Vec<String> {
            catalog.qualified(score, income).iter().map(|p| p.id.clone()).collect()
        };

        assert!(ids(399, 50_000.0).is_empty());
        assert_eq!(ids(450, 2500.0), vec!["emergency_cash"]);
        assert_eq!(ids(650, 9000.0), vec!["emergency_cash", "payday_advance", "personal_loan"]);
        assert_eq!(ids(800, 12_000.0).len(), 4);
        // Score is enough but income is not
        assert_eq!(ids(800, 4000.0), vec!["emergency_cash"]);
    }

    #[test]
    fn test_suggested_amount_is_clamped() {
        let catalog = ProductCatalog::default();
        let personal = catalog.get("personal_loan").unwrap();

        // 25% of 10000 = 2500/month * 6 / (1 + 0.035 * 6)
        assert_relative_eq!(
            catalog.suggested_amount(personal, 10_000.0),
            15_000.0 / 1.21,
            epsilon = 1e-9
        );

        // Below the floor and above the ceiling
        assert_eq!(catalog.suggested_amount(personal, 1000.0), 5000.0);
        assert_eq!(catalog.suggested_amount(personal, 1_000_000.0), 25_000.0);
    }
}
