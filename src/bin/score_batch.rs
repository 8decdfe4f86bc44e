//! Score every applicant in an intake CSV
//!
//! Writes one assessment row per applicant plus a decision summary.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;

use microloan_engine::applicant::load_applicants;
use microloan_engine::scoring::{CreditScorer, Decision};
use microloan_engine::Assumptions;

#[derive(Parser)]
#[command(name = "score_batch", about = "Score an applicant CSV in parallel")]
struct Args {
    /// Applicant CSV file
    #[arg(long, default_value = "data/applicants.csv")]
    input: String,

    /// Assessment CSV to write
    #[arg(long, default_value = "assessments.csv")]
    output: String,

    /// Directory of assumption CSV files
    #[arg(long)]
    assumptions: Option<String>,
}

/// One output row
#[derive(Debug, Serialize)]
struct AssessmentRow {
    full_name: String,
    phone_number: String,
    requested_amount: f64,
    credit_score: i32,
    risk_tier: String,
    decision: String,
    suggested_amount: f64,
    max_affordable_amount: f64,
    confidence: f64,
    debt_to_income: f64,
    input_error: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    let assumptions = match &args.assumptions {
        Some(dir) => Assumptions::from_csv_path(std::path::Path::new(dir))?,
        None => Assumptions::default_lending(),
    };

    println!("Loading applicants from {}...", args.input);
    let applicants = load_applicants(&args.input).with_context(|| format!("reading {}", args.input))?;
    println!("Loaded {} applicants in {:?}", applicants.len(), start.elapsed());

    let scorer = CreditScorer::new(assumptions);
    let score_start = Instant::now();

    // Applicants are independent; score in parallel
    let rows: Vec<AssessmentRow> = applicants
        .par_iter()
        .map(|(applicant, request)| {
            let assessment = scorer.score(applicant, request);
            AssessmentRow {
                full_name: applicant.full_name.clone(),
                phone_number: applicant.phone_number.clone(),
                requested_amount: request.amount,
                credit_score: assessment.credit_score,
                risk_tier: assessment.risk_tier.to_string(),
                decision: assessment.decision.to_string(),
                suggested_amount: assessment.suggested_amount,
                max_affordable_amount: assessment.max_affordable_amount,
                confidence: assessment.confidence,
                debt_to_income: assessment.debt_to_income,
                input_error: assessment.input_error.map(|e| e.to_string()).unwrap_or_default(),
            }
        })
        .collect();

    println!("Scoring complete in {:?}", score_start.elapsed());

    let mut writer = csv::Writer::from_path(&args.output).with_context(|| format!("creating {}", args.output))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    println!("Output written to {}", args.output);

    let count = |decision: Decision| rows.iter().filter(|r| r.decision == decision.to_string()).count();
    let total_offered: f64 = rows.iter().map(|r| r.suggested_amount).sum();

    println!("\nBatch Summary:");
    println!("  Approved:    {}", count(Decision::Approved));
    println!("  Conditional: {}", count(Decision::Conditional));
    println!("  Rejected:    {}", count(Decision::Rejected));
    println!("  Total offered: {:.2}", total_offered);
    println!("\nTotal time: {:?}", start.elapsed());
    Ok(())
}
