//! AWS Lambda handler for scoring a loan application
//!
//! Accepts an applicant and loan request as JSON and returns the credit
//! assessment, an explanation, qualifying products and (when an amount is
//! offered) the repayment schedule.
//!
//! Supports Lambda Function URLs for direct HTTP access.

use aws_lambda_events::event::lambda_function_urls::{LambdaFunctionUrlRequest, LambdaFunctionUrlResponse};
use chrono::{NaiveDate, Utc};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};

use microloan_engine::amortization::{build_schedule, compute_monthly_payment, total_repayment, ScheduleConfig, ScheduledInstallment};
use microloan_engine::applicant::{Applicant, LoanRequest};
use microloan_engine::assumptions::LoanProduct;
use microloan_engine::scoring::{explain, CreditAssessment, CreditScorer, RiskFactor};
use microloan_engine::Assumptions;

/// Input for a scoring call
#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub applicant: Applicant,
    pub request: LoanRequest,

    /// Annual rate for the offered schedule (default: 15%)
    #[serde(default = "default_annual_rate")]
    pub annual_rate: f64,

    /// First day of the schedule (default: today)
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

fn default_annual_rate() -> f64 { 0.15 }

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub assessment: CreditAssessment,
    pub explanation: String,
    pub risk_factors: Vec<RiskFactor>,
    pub products: Vec<LoanProduct>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer: Option<Offer>,
    pub execution_time_ms: u64,
}

/// Repayment plan for the suggested amount
#[derive(Debug, Serialize)]
pub struct Offer {
    pub principal: f64,
    pub annual_rate: f64,
    pub monthly_payment: f64,
    pub total_repayment: f64,
    pub schedule: Vec<ScheduledInstallment>,
}

fn response(status: i64, body: String) -> Result<LambdaFunctionUrlResponse, Error> {
    let mut response = LambdaFunctionUrlResponse {
        status_code: status,
        headers: Default::default(),
        body: Some(body),
        is_base64_encoded: false,
        cookies: Vec::new(),
    };
    response.headers.insert("content-type", "application/json".parse()?);
    response.headers.insert("access-control-allow-origin", "*".parse()?);
    response.headers.insert("access-control-allow-methods", "POST, OPTIONS".parse()?);
    response.headers.insert("access-control-allow-headers", "Content-Type".parse()?);
    Ok(response)
}

fn error_response(status: i64, message: &str) -> Result<LambdaFunctionUrlResponse, Error> {
    response(status, serde_json::json!({ "error": message }).to_string())
}

fn offer(assessment: &CreditAssessment, request: &ScoreRequest) -> Result<Option<Offer>, Error> {
    let principal = assessment.suggested_amount;
    if principal <= 0.0 {
        return Ok(None);
    }

    let term = request.request.term_months;
    let start = request.start_date.unwrap_or_else(|| Utc::now().date_naive());
    let monthly_payment = compute_monthly_payment(principal, request.annual_rate, term)?;
    let schedule = build_schedule(principal, monthly_payment, term, request.annual_rate, start, &ScheduleConfig::default())?;

    Ok(Some(Offer {
        principal,
        annual_rate: request.annual_rate,
        monthly_payment,
        total_repayment: total_repayment(&schedule),
        schedule,
    }))
}

/// Lambda handler function
async fn handler(scorer: &CreditScorer, event: LambdaEvent<LambdaFunctionUrlRequest>) -> Result<LambdaFunctionUrlResponse, Error> {
    let start = std::time::Instant::now();
    let event = event.payload;

    // Handle CORS preflight
    if event.request_context.http.method.as_deref() == Some("OPTIONS") {
        return response(200, String::new());
    }

    if event.is_base64_encoded {
        return error_response(400, "Binary request bodies are not supported");
    }

    let body = event.body.as_deref().unwrap_or("{}");
    let request: ScoreRequest = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => return error_response(400, &format!("Invalid JSON: {}", e)),
    };

    let assessment = scorer.score(&request.applicant, &request.request);
    let offer = match offer(&assessment, &request) {
        Ok(o) => o,
        Err(e) => return error_response(400, &e.to_string()),
    };

    let body = ScoreResponse {
        explanation: explain(&assessment),
        risk_factors: scorer.risk_factors(&request.applicant, &request.request),
        products: scorer
            .qualified_products(&assessment, &request.applicant)
            .into_iter()
            .cloned()
            .collect(),
        assessment,
        offer,
        execution_time_ms: start.elapsed().as_millis() as u64,
    };

    response(200, serde_json::to_string(&body)?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let assumptions = match std::env::var("MICROLOAN_ASSUMPTIONS") {
        Ok(dir) => Assumptions::from_csv_path(std::path::Path::new(&dir))?,
        Err(_) => Assumptions::default_lending(),
    };
    let scorer = CreditScorer::new(assumptions);
    let scorer = &scorer;

    run(service_fn(move |event| async move { handler(scorer, event).await })).await
}
