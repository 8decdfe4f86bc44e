//! Load applicants and their loan requests from CSV

use std::path::Path;

use csv::Reader;

use super::{Applicant, CreditHistory, EmploymentStatus, Financials, LoanRequest};
use crate::assumptions::LoadError;

/// Raw CSV row matching the applicant intake export
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "FullName")]
    full_name: String,
    #[serde(rename = "Phone")]
    phone_number: String,
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "Dependents", default)]
    dependents: u32,
    #[serde(rename = "EmploymentStatus")]
    employment_status: String,
    #[serde(rename = "EmploymentYears")]
    employment_years: u32,
    #[serde(rename = "CreditHistory", default)]
    credit_history: String,
    #[serde(rename = "MonthlyIncome")]
    monthly_income: f64,
    #[serde(rename = "MonthlyExpenses")]
    monthly_expenses: f64,
    #[serde(rename = "CurrentDebt", default)]
    current_debt: f64,
    #[serde(rename = "Savings", default)]
    savings: f64,
    #[serde(rename = "Amount")]
    amount: f64,
    #[serde(rename = "Purpose", default)]
    purpose: String,
    #[serde(rename = "TermMonths")]
    term_months: u32,
}

impl CsvRow {
    fn into_record(self, line: usize) -> Result<(Applicant, LoanRequest), LoadError> {
        let credit_history: CreditHistory = self
            .credit_history
            .parse()
            .map_err(|detail| LoadError::Parse { file: "applicants".into(), line, detail })?;

        let financials = Financials {
            monthly_income: self.monthly_income,
            monthly_expenses: self.monthly_expenses,
            current_debt: self.current_debt,
            savings: self.savings,
        };

        let applicant = Applicant::new(
            self.full_name,
            self.phone_number,
            self.age,
            EmploymentStatus::from_label(&self.employment_status),
            self.employment_years,
            financials,
        )
        .with_credit_history(credit_history)
        .with_dependents(self.dependents);

        Ok((applicant, LoanRequest::new(self.amount, self.purpose, self.term_months)))
    }
}

/// Load all applicants from a CSV file
pub fn load_applicants<P: AsRef<Path>>(path: P) -> Result<Vec<(Applicant, LoanRequest)>, LoadError> {
    let reader = Reader::from_path(path)?;
    collect_rows(reader)
}

/// Load applicants from any reader (e.g., string buffer, request body)
pub fn load_applicants_from_reader<R: std::io::Read>(
    reader: R,
) -> Result<Vec<(Applicant, LoanRequest)>, LoadError> {
    collect_rows(Reader::from_reader(reader))
}

fn collect_rows<R: std::io::Read>(
    mut reader: Reader<R>,
) -> Result<Vec<(Applicant, LoanRequest)>, LoadError> {
    let mut records = Vec::new();

    for (idx, result) in reader.deserialize().enumerate() {
        let row: CsvRow = result?;
        // +2: header line, 1-indexed
        records.push(row.into_record(idx + 2)?);
    }

    Ok(records)
}
