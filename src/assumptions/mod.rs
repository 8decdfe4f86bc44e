//! Lending assumptions: scorecard tables, decision thresholds, products and networks

mod scorecard;
mod decision;
mod catalog;
mod networks;
pub mod loader;

pub use scorecard::{AgeBand, AgeBands, Comparison, Scorecard, Tier, TierTable};
pub use decision::{apply_overrides, AffordabilityConfig, ConfidencePolicy, DecisionPolicy};
pub use catalog::{LoanProduct, ProductCatalog};
pub use networks::{MobileNetwork, NetworkDirectory};
pub use loader::{LoadError, LoadedAssumptions};

use std::path::Path;

/// decision_policy.csv key for the catalog affordability share
const CATALOG_SHARE_KEY: &str = "catalog_affordability_share";

/// Container for all scoring and lending assumptions
#[derive(Debug, Clone, PartialEq)]
pub struct Assumptions {
    pub scorecard: Scorecard,
    pub decision: DecisionPolicy,
    pub affordability: AffordabilityConfig,
    pub confidence: ConfidencePolicy,
    pub catalog: ProductCatalog,
    pub networks: NetworkDirectory,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self::default_lending()
    }
}

impl Assumptions {
    /// Built-in tables for the South African mobile-money market
    pub fn default_lending() -> Self {
        Self {
            scorecard: Scorecard::default(),
            decision: DecisionPolicy::default(),
            affordability: AffordabilityConfig::default(),
            confidence: ConfidencePolicy::default(),
            catalog: ProductCatalog::default(),
            networks: NetworkDirectory::default(),
        }
    }

    /// Load assumptions from CSV files in the default location (data/assumptions/)
    pub fn from_csv() -> Result<Self, LoadError> {
        Self::from_csv_path(Path::new(loader::DEFAULT_ASSUMPTIONS_PATH))
    }

    /// Load assumptions from CSV files in a specific directory
    ///
    /// Factors missing from score_tiers.csv keep their built-in tables.
    pub fn from_csv_path(path: &Path) -> Result<Self, LoadError> {
        let loaded = LoadedAssumptions::load_from(path)?;
        Self::from_loaded(loaded)
    }

    fn from_loaded(mut loaded: LoadedAssumptions) -> Result<Self, LoadError> {
        let mut scorecard = Scorecard::default();

        for (factor, table) in &loaded.score_tiers {
            let target = match factor.as_str() {
                "monthly_income" => &mut scorecard.monthly_income,
                "debt_to_income" => &mut scorecard.debt_to_income,
                "employment_years" => &mut scorecard.employment_years,
                "savings_ratio" => &mut scorecard.savings_ratio,
                "dependents" => &mut scorecard.dependents,
                other => {
                    return Err(LoadError::Parse {
                        file: "score_tiers.csv".into(),
                        line: 0,
                        detail: format!("Unknown factor: {}", other),
                    })
                }
            };
            let fallback = table.fallback.unwrap_or(0);
            *target = TierTable::from_loaded(target.comparison(), &table.tiers, fallback);
        }

        let (bands, age_fallback) = &loaded.age_bands;
        if !bands.is_empty() {
            scorecard.age = AgeBands::from_loaded(bands, age_fallback.unwrap_or(0));
        }

        if !loaded.credit_history_scores.is_empty() {
            scorecard.credit_history = loaded.credit_history_scores.clone();
        }
        if !loaded.employment_status_scores.is_empty() {
            scorecard.employment_status = loaded.employment_status_scores.clone();
        }

        let mut catalog = ProductCatalog::default();
        let share = loaded
            .decision_policy
            .remove(CATALOG_SHARE_KEY)
            .unwrap_or(catalog.affordability_share);
        if !loaded.products.is_empty() {
            catalog = ProductCatalog::from_loaded(&loaded.products, share);
        } else {
            catalog.affordability_share = share;
        }

        let mut decision = DecisionPolicy::default();
        let mut affordability = AffordabilityConfig::default();
        let mut confidence = ConfidencePolicy::default();
        apply_overrides(
            &loaded.decision_policy,
            &mut scorecard,
            &mut decision,
            &mut affordability,
            &mut confidence,
        )?;

        let (country_code, networks) = &loaded.networks;

        Ok(Self {
            scorecard,
            decision,
            affordability,
            confidence,
            catalog,
            networks: NetworkDirectory::from_loaded(country_code, networks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_tables_match_builtin_defaults() {
        let from_csv = Assumptions::from_csv().expect("load data/assumptions");
        let builtin = Assumptions::default_lending();

        assert_eq!(from_csv.scorecard, builtin.scorecard);
        assert_eq!(from_csv.decision, builtin.decision);
        assert_eq!(from_csv.affordability, builtin.affordability);
        assert_eq!(from_csv.confidence, builtin.confidence);
        assert_eq!(from_csv.catalog, builtin.catalog);
        assert_eq!(from_csv.networks, builtin.networks);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(Assumptions::from_csv_path(Path::new("data/does-not-exist")).is_err());
    }
}
