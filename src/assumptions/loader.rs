//! CSV-based assumption loader
//!
//! Loads scoring tables, decision thresholds, products and networks from data/assumptions/

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use super::catalog::LoanProduct;
use super::networks::MobileNetwork;
use super::scorecard::{AgeBand, Tier};
use crate::applicant::{CreditHistory, EmploymentStatus};

/// Default path to assumptions directory
pub const DEFAULT_ASSUMPTIONS_PATH: &str = "data/assumptions";

/// Error raised while reading assumption or intake files
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("{file} line {line}: {detail}")]
    Parse {
        file: String,
        line: usize,
        detail: String,
    },
}

fn parse_err(file: &str, line: usize, detail: impl Into<String>) -> LoadError {
    LoadError::Parse {
        file: file.to_string(),
        line,
        detail: detail.into(),
    }
}

fn parse_field<T: std::str::FromStr>(file: &str, line: usize, raw: &str) -> Result<T, LoadError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| parse_err(file, line, format!("'{}': {}", raw, e)))
}

/// Tier rows for one scoring factor
#[derive(Debug, Clone, Default)]
pub struct LoadedTiers {
    pub tiers: Vec<Tier>,
    /// Points when no tier matches (row with an empty threshold)
    pub fallback: Option<i32>,
}

/// Load score tiers from CSV
/// Returns HashMap<factor, tiers> with tiers in file order
pub fn load_score_tiers(path: &Path) -> Result<HashMap<String, LoadedTiers>, LoadError> {
    const FILE: &str = "score_tiers.csv";
    let mut reader = csv::Reader::from_path(path.join(FILE))?;

    let mut tables: HashMap<String, LoadedTiers> = HashMap::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let line = idx + 2;
        let factor = record[0].trim().to_string();
        let points: i32 = parse_field(FILE, line, &record[2])?;

        let entry = tables.entry(factor).or_default();
        if record[1].trim().is_empty() {
            entry.fallback = Some(points);
        } else {
            let threshold: f64 = parse_field(FILE, line, &record[1])?;
            entry.tiers.push(Tier { threshold, points });
        }
    }

    Ok(tables)
}

/// Load age bands from CSV
/// A row with empty bounds sets the fallback points
pub fn load_age_bands(path: &Path) -> Result<(Vec<AgeBand>, Option<i32>), LoadError> {
    const FILE: &str = "age_bands.csv";
    let mut reader = csv::Reader::from_path(path.join(FILE))?;

    let mut bands = Vec::new();
    let mut fallback = None;

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let line = idx + 2;
        let points: i32 = parse_field(FILE, line, &record[2])?;

        if record[0].trim().is_empty() && record[1].trim().is_empty() {
            fallback = Some(points);
            continue;
        }

        bands.push(AgeBand {
            min_age: parse_field(FILE, line, &record[0])?,
            max_age: parse_field(FILE, line, &record[1])?,
            points,
        });
    }

    Ok((bands, fallback))
}

/// Load credit history points from CSV
pub fn load_credit_history_scores(path: &Path) -> Result<HashMap<CreditHistory, i32>, LoadError> {
    const FILE: &str = "credit_history_scores.csv";
    let mut reader = csv::Reader::from_path(path.join(FILE))?;

    let mut scores = HashMap::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let line = idx + 2;
        let history: CreditHistory = record[0].parse().map_err(|e: String| parse_err(FILE, line, e))?;
        let points: i32 = parse_field(FILE, line, &record[1])?;
        scores.insert(history, points);
    }

    Ok(scores)
}

/// Load employment status points from CSV
pub fn load_employment_status_scores(path: &Path) -> Result<HashMap<EmploymentStatus, i32>, LoadError> {
    const FILE: &str = "employment_status_scores.csv";
    let mut reader = csv::Reader::from_path(path.join(FILE))?;

    let mut scores = HashMap::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let points: i32 = parse_field(FILE, idx + 2, &record[1])?;
        scores.insert(EmploymentStatus::from_label(&record[0]), points);
    }

    Ok(scores)
}

/// Load decision policy overrides from CSV
/// Returns HashMap<parameter, value>
pub fn load_decision_policy(path: &Path) -> Result<HashMap<String, f64>, LoadError> {
    const FILE: &str = "decision_policy.csv";
    let mut reader = csv::Reader::from_path(path.join(FILE))?;

    let mut params = HashMap::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let value: f64 = parse_field(FILE, idx + 2, &record[1])?;
        params.insert(record[0].trim().to_string(), value);
    }

    Ok(params)
}

/// Load the product catalog rows from CSV
pub fn load_products(path: &Path) -> Result<Vec<LoanProduct>, LoadError> {
    let mut reader = csv::Reader::from_path(path.join("products.csv"))?;

    let mut products = Vec::new();
    for result in reader.deserialize() {
        let product: LoanProduct = result?;
        products.push(product);
    }

    Ok(products)
}

#[derive(Debug, serde::Deserialize)]
struct NetworkRow {
    country_code: String,
    id: String,
    name: String,
    /// ';'-separated
    prefixes: String,
    currency: String,
}

/// Load mobile networks from CSV
/// Returns (country_code, networks); all rows must share one country code
pub fn load_networks(path: &Path) -> Result<(String, Vec<MobileNetwork>), LoadError> {
    const FILE: &str = "networks.csv";
    let mut reader = csv::Reader::from_path(path.join(FILE))?;

    let mut country_code: Option<String> = None;
    let mut networks = Vec::new();

    for (idx, result) in reader.deserialize().enumerate() {
        let row: NetworkRow = result?;

        match &country_code {
            None => country_code = Some(row.country_code.clone()),
            Some(code) if *code != row.country_code => {
                return Err(parse_err(
                    FILE,
                    idx + 2,
                    format!("country code {} differs from {}", row.country_code, code),
                ))
            }
            Some(_) => {}
        }

        networks.push(MobileNetwork {
            id: row.id,
            name: row.name,
            prefixes: row
                .prefixes
                .split(';')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            currency: row.currency,
        });
    }

    let country_code = country_code.ok_or_else(|| parse_err(FILE, 1, "no networks listed"))?;
    Ok((country_code, networks))
}

/// Load all assumptions from the given directory
pub struct LoadedAssumptions {
    pub score_tiers: HashMap<String, LoadedTiers>,
    pub age_bands: (Vec<AgeBand>, Option<i32>),
    pub credit_history_scores: HashMap<CreditHistory, i32>,
    pub employment_status_scores: HashMap<EmploymentStatus, i32>,
    pub decision_policy: HashMap<String, f64>,
    pub products: Vec<LoanProduct>,
    pub networks: (String, Vec<MobileNetwork>),
}

impl LoadedAssumptions {
    /// Load all assumptions from the default path
    pub fn load_default() -> Result<Self, LoadError> {
        Self::load_from(Path::new(DEFAULT_ASSUMPTIONS_PATH))
    }

    /// Load all assumptions from a specific path
    pub fn load_from(path: &Path) -> Result<Self, LoadError> {
        Ok(Self {
            score_tiers: load_score_tiers(path)?,
            age_bands: load_age_bands(path)?,
            credit_history_scores: load_credit_history_scores(path)?,
            employment_status_scores: load_employment_status_scores(path)?,
            decision_policy: load_decision_policy(path)?,
            products: load_products(path)?,
            networks: load_networks(path)?,
        })
    }
}
