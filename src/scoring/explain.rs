//! Plain-text summary of an assessment

use std::fmt::Write;

use super::types::{CreditAssessment, Decision};

/// Format an amount with thousands separators and two decimals
pub fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{}.{:02}", sign, grouped, cents % 100)
}

/// Human-readable explanation of a credit assessment
pub fn explain(assessment: &CreditAssessment) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "Credit Assessment Summary");
    let _ = writeln!(
        out,
        "Credit score: {}/850 | Risk: {} | Decision: {}",
        assessment.credit_score, assessment.risk_tier, assessment.decision
    );

    if let Some(err) = &assessment.input_error {
        let _ = writeln!(out, "\nThe application could not be scored: {}.", err);
        let _ = writeln!(out, "A conservative rejection was recorded; correct the data and resubmit.");
        return out;
    }

    let _ = writeln!(out, "\nKey factors:");

    if let Some(factors) = &assessment.key_factors {
        let income = format_amount(factors.monthly_income);
        if factors.monthly_income >= 2000.0 {
            let _ = writeln!(out, "[+] Strong income: monthly income of {} demonstrates good earning capacity.", income);
        } else if factors.monthly_income >= 500.0 {
            let _ = writeln!(out, "[~] Moderate income: monthly income of {} is acceptable but limits loan capacity.", income);
        } else {
            let _ = writeln!(out, "[-] Low income: monthly income of {} is below the recommended minimum.", income);
        }

        let years = factors.employment_years;
        if years >= 3 {
            let _ = writeln!(out, "[+] Stable employment: {} years of employment history.", years);
        } else if years >= 1 {
            let _ = writeln!(out, "[~] Moderate stability: {} years of employment is acceptable.", years);
        } else {
            let _ = writeln!(out, "[-] Limited employment history: under 1 year increases risk.");
        }
    }

    let dti_pct = assessment.debt_to_income * 100.0;
    if assessment.debt_to_income < 0.3 {
        let _ = writeln!(out, "[+] Low debt burden: debt-to-income of {:.1}% is excellent.", dti_pct);
    } else if assessment.debt_to_income < 0.5 {
        let _ = writeln!(out, "[~] Moderate debt: debt-to-income of {:.1}% is manageable.", dti_pct);
    } else {
        let _ = writeln!(out, "[-] High debt burden: debt-to-income of {:.1}% is concerning.", dti_pct);
    }

    if assessment.monthly_affordability > 0.0 {
        let _ = writeln!(
            out,
            "\nMonthly affordability: {} available for loan payments.",
            format_amount(assessment.monthly_affordability)
        );
    }

    let _ = writeln!(out, "\nDecision rationale:");
    match assessment.decision {
        Decision::Approved => {
            let _ = writeln!(out, "LOAN APPROVED for {}.", format_amount(assessment.suggested_amount));
            let _ = writeln!(out, "Income supports the repayments and debt levels are manageable.");
            let _ = writeln!(out, "Next: proceed with disbursement and the repayment schedule.");
        }
        Decision::Conditional => {
            let _ = writeln!(out, "CONDITIONAL APPROVAL for {}.", format_amount(assessment.suggested_amount));
            let _ = writeln!(out, "The amount is reduced and an officer review is required before a loan is created.");
            let _ = writeln!(out, "Next: review the terms and supply any additional documentation requested.");
        }
        Decision::Rejected => {
            let _ = writeln!(out, "LOAN REJECTED.");
            let _ = writeln!(out, "The application does not currently meet the lending criteria.");
            let _ = writeln!(out, "Next: improve the financial profile and reapply in 3-6 months.");
        }
    }

    let pct = assessment.confidence * 100.0;
    let confidence = if assessment.confidence >= 0.8 {
        format!("High ({:.0}%), based on complete and consistent data", pct)
    } else if assessment.confidence >= 0.6 {
        format!("Medium ({:.0}%), some data gaps or inconsistencies noted", pct)
    } else {
        format!("Low ({:.0}%), limited or inconsistent data affects reliability", pct)
    };
    let _ = write!(out, "\nAssessment confidence: {}.", confidence);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssessmentInputError;
    use crate::scoring::{KeyFactors, RiskTier};
    use chrono::Utc;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(1234.567), "1,234.57");
        assert_eq!(format_amount(1_000_000.0), "1,000,000.00");
        assert_eq!(format_amount(-42.1), "-42.10");
    }

    #[test]
    fn test_explain_approved() {
        let assessment = CreditAssessment {
            credit_score: 720,
            risk_tier: RiskTier::Low,
            decision: Decision::Approved,
            suggested_amount: 1500.0,
            max_affordable_amount: 4985.69,
            monthly_affordability: 450.0,
            confidence: 1.0,
            debt_to_income: 0.1,
            key_factors: Some(KeyFactors {
                monthly_income: 2500.0,
                employment_years: 6,
                debt_to_income: 0.1,
                savings_ratio: 0.2,
                net_monthly_income: 1500.0,
            }),
            assessed_at: Utc::now(),
            input_error: None,
        };

        let text = explain(&assessment);
        assert!(text.contains("720/850"));
        assert!(text.contains("Strong income: monthly income of 2,500.00"));
        assert!(text.contains("debt-to-income of 10.0%"));
        assert!(text.contains("LOAN APPROVED for 1,500.00"));
        assert!(text.contains("High (100%)"));
    }

    #[test]
    fn test_explain_fail_closed() {
        let assessment = CreditAssessment::fail_closed(AssessmentInputError::new("age", "too old"));
        let text = explain(&assessment);

        assert!(text.contains("400/850"));
        assert!(text.contains("could not be scored"));
        assert!(!text.contains("Decision rationale"));
    }
}
