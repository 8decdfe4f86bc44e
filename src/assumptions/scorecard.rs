//! Scorecard point tables for the heuristic credit score

use std::collections::HashMap;

use crate::applicant::{CreditHistory, EmploymentStatus};

/// How a tier threshold is compared against the factor value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// value >= threshold
    AtLeast,
    /// value < threshold
    Below,
    /// value <= threshold
    AtMost,
}

impl Comparison {
    fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::AtLeast => value >= threshold,
            Comparison::Below => value < threshold,
            Comparison::AtMost => value <= threshold,
        }
    }
}

/// One row of a tier table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub threshold: f64,
    pub points: i32,
}

/// Ordered tier table; the first matching tier wins, otherwise the fallback applies
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    comparison: Comparison,
    tiers: Vec<Tier>,
    fallback: i32,
}

impl TierTable {
    pub fn new(comparison: Comparison, tiers: &[(f64, i32)], fallback: i32) -> Self {
        Self {
            comparison,
            tiers: tiers
                .iter()
                .map(|&(threshold, points)| Tier { threshold, points })
                .collect(),
            fallback,
        }
    }

    /// Create from loaded CSV rows (file order is evaluation order)
    pub fn from_loaded(comparison: Comparison, tiers: &[Tier], fallback: i32) -> Self {
        Self {
            comparison,
            tiers: tiers.to_vec(),
            fallback,
        }
    }

    pub fn points(&self, value: f64) -> i32 {
        self.tiers
            .iter()
            .find(|tier| self.comparison.matches(value, tier.threshold))
            .map(|tier| tier.points)
            .unwrap_or(self.fallback)
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }
}

/// Inclusive age band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeBand {
    pub min_age: u32,
    pub max_age: u32,
    pub points: i32,
}

/// Age bands, checked in order (inner bands first)
#[derive(Debug, Clone, PartialEq)]
pub struct AgeBands {
    bands: Vec<AgeBand>,
    fallback: i32,
}

impl AgeBands {
    pub fn from_loaded(bands: &[AgeBand], fallback: i32) -> Self {
        Self {
            bands: bands.to_vec(),
            fallback,
        }
    }

    pub fn points(&self, age: u32) -> i32 {
        self.bands
            .iter()
            .find(|band| age >= band.min_age && age <= band.max_age)
            .map(|band| band.points)
            .unwrap_or(self.fallback)
    }
}

/// All point tables used by the scorer
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    /// Starting score before any factor is applied
    pub base_score: i32,
    pub min_score: i32,
    pub max_score: i32,

    pub monthly_income: TierTable,
    pub debt_to_income: TierTable,
    pub employment_years: TierTable,
    pub age: AgeBands,
    pub savings_ratio: TierTable,
    pub dependents: TierTable,
    pub credit_history: HashMap<CreditHistory, i32>,
    /// Statuses missing from the table score zero
    pub employment_status: HashMap<EmploymentStatus, i32>,
}

impl Default for Scorecard {
    fn default() -> Self {
        let credit_history = HashMap::from([
            (CreditHistory::Excellent, 50),
            (CreditHistory::Good, 35),
            (CreditHistory::Fair, 15),
            (CreditHistory::Poor, -20),
            (CreditHistory::NoHistory, 0),
        ]);

        let employment_status = HashMap::from([
            (EmploymentStatus::Employed, 20),
            (EmploymentStatus::BusinessOwner, 15),
            (EmploymentStatus::SelfEmployed, 10),
            (EmploymentStatus::Farmer, 10),
            (EmploymentStatus::Student, 5),
            (EmploymentStatus::Unemployed, -30),
        ]);

        Self {
            base_score: 500,
            min_score: 300,
            max_score: 850,
            monthly_income: TierTable::new(
                Comparison::AtLeast,
                &[(2000.0, 80), (1000.0, 60), (500.0, 40), (250.0, 20)],
                -20,
            ),
            debt_to_income: TierTable::new(
                Comparison::Below,
                &[(0.2, 70), (0.4, 40), (0.6, 10)],
                -50,
            ),
            employment_years: TierTable::new(
                Comparison::AtLeast,
                &[(5.0, 60), (3.0, 40), (1.0, 20)],
                -10,
            ),
            age: AgeBands::from_loaded(
                &[
                    AgeBand { min_age: 25, max_age: 45, points: 30 },
                    AgeBand { min_age: 18, max_age: 65, points: 20 },
                ],
                5,
            ),
            savings_ratio: TierTable::new(
                Comparison::AtLeast,
                &[(0.2, 40), (0.1, 25), (0.05, 15)],
                0,
            ),
            dependents: TierTable::new(Comparison::AtMost, &[(0.0, 15), (2.0, 5)], -10),
            credit_history,
            employment_status,
        }
    }
}

impl Scorecard {
    pub fn credit_history_points(&self, history: CreditHistory) -> i32 {
        self.credit_history.get(&history).copied().unwrap_or(0)
    }

    pub fn employment_status_points(&self, status: &EmploymentStatus) -> i32 {
        self.employment_status.get(status).copied().unwrap_or(0)
    }

    /// Clamp a raw score into the scorecard's range
    pub fn clamp(&self, raw: i32) -> i32 {
        raw.clamp(self.min_score, self.max_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_income_tiers() {
        let card = Scorecard::default();

        assert_eq!(card.monthly_income.points(2000.0), 80);
        assert_eq!(card.monthly_income.points(1999.99), 60);
        assert_eq!(card.monthly_income.points(500.0), 40);
        assert_eq!(card.monthly_income.points(250.0), 20);
        assert_eq!(card.monthly_income.points(249.0), -20);
        assert_eq!(card.monthly_income.points(0.0), -20);
    }

    #[test]
    fn test_dti_tiers_are_strict() {
        let card = Scorecard::default();

        assert_eq!(card.debt_to_income.points(0.0), 70);
        assert_eq!(card.debt_to_income.points(0.2), 40);
        assert_eq!(card.debt_to_income.points(0.59), 10);
        assert_eq!(card.debt_to_income.points(0.6), -50);
        assert_eq!(card.debt_to_income.points(1.0), -50);
    }

    #[test]
    fn test_age_bands() {
        let card = Scorecard::default();

        assert_eq!(card.age.points(25), 30);
        assert_eq!(card.age.points(45), 30);
        assert_eq!(card.age.points(46), 20);
        assert_eq!(card.age.points(18), 20);
        assert_eq!(card.age.points(65), 20);
        assert_eq!(card.age.points(17), 5);
        assert_eq!(card.age.points(70), 5);
    }

    #[test]
    fn test_dependents_and_categories() {
        let card = Scorecard::default();

        assert_eq!(card.dependents.points(0.0), 15);
        assert_eq!(card.dependents.points(1.0), 5);
        assert_eq!(card.dependents.points(2.0), 5);
        assert_eq!(card.dependents.points(3.0), -10);

        assert_eq!(card.credit_history_points(CreditHistory::Poor), -20);
        assert_eq!(card.employment_status_points(&EmploymentStatus::Unemployed), -30);
        assert_eq!(
            card.employment_status_points(&EmploymentStatus::Other("Retired".into())),
            0
        );
    }

    #[test]
    fn test_clamp() {
        let card = Scorecard::default();
        assert_eq!(card.clamp(200), 300);
        assert_eq!(card.clamp(900), 850);
        assert_eq!(card.clamp(640), 640);
    }
}
