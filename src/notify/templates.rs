//! SMS message templates

use chrono::NaiveDate;
use thiserror::Error;

use super::{NotificationEvent, NotificationParams, NotifierConfig};
use crate::scoring::format_amount;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("{event} message needs a {param}")]
    MissingParam {
        event: NotificationEvent,
        param: &'static str,
    },
}

fn whole_amount(symbol: &str, amount: f64) -> String {
    let formatted = format_amount(amount.round());
    let whole = formatted.strip_suffix(".00").unwrap_or(&formatted);
    format!("{}{}", symbol, whole)
}

fn date_text(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

/// Render the message body for an event
pub fn render(
    event: NotificationEvent,
    params: &NotificationParams,
    config: &NotifierConfig,
) -> Result<String, RenderError> {
    let missing = |param| RenderError::MissingParam { event, param };
    let amount = || {
        params
            .amount
            .map(|a| whole_amount(&config.currency_symbol, a))
            .ok_or(missing("amount"))
    };

    let body = match event {
        NotificationEvent::ApplicationReceived => format!(
            "APPLICATION RECEIVED: Your loan application for {} is received. Decision in 24hrs.",
            amount()?
        ),
        NotificationEvent::Approved => format!(
            "LOAN APPROVED! Your loan of {} is approved and will be paid to this number.",
            amount()?
        ),
        NotificationEvent::Declined => format!(
            "LOAN DECLINED: {}. Improve your mobile money activity and reapply in 30 days.",
            params.reason.as_deref().ok_or(missing("reason"))?
        ),
        NotificationEvent::PaymentDue => format!(
            "PAYMENT DUE: {} due on {}. Pay now to avoid late fees.",
            amount()?,
            date_text(params.due_date.ok_or(missing("due date"))?)
        ),
        NotificationEvent::PaymentReceived => {
            let next = params
                .next_due_date
                .map(date_text)
                .unwrap_or_else(|| "none scheduled".to_string());
            format!(
                "PAYMENT RECEIVED: {} received. Thank you! Next payment: {}.",
                amount()?,
                next
            )
        }
        NotificationEvent::LoanFullyPaid => {
            "CONGRATULATIONS! Loan fully repaid. You're eligible for a higher loan amount. Apply now!".to_string()
        }
    };

    Ok(format!("{} {}", body, config.brand))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_payment_due() {
        let params = NotificationParams::default()
            .amount(90.26)
            .due_date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        let body = render(NotificationEvent::PaymentDue, &params, &NotifierConfig::default()).unwrap();

        assert_eq!(
            body,
            "PAYMENT DUE: R90 due on 31 Jan 2024. Pay now to avoid late fees. CreditSwift SA"
        );
    }

    #[test]
    fn test_render_payment_received_without_next_date() {
        let params = NotificationParams::default().amount(1083.12);
        let body = render(NotificationEvent::PaymentReceived, &params, &NotifierConfig::default()).unwrap();
        assert!(body.starts_with("PAYMENT RECEIVED: R1,083 received."));
        assert!(body.contains("Next payment: none scheduled."));
    }

    #[test]
    fn test_missing_params() {
        let config = NotifierConfig::default();
        assert_eq!(
            render(NotificationEvent::Declined, &NotificationParams::default(), &config),
            Err(RenderError::MissingParam {
                event: NotificationEvent::Declined,
                param: "reason"
            })
        );
        assert!(render(NotificationEvent::LoanFullyPaid, &NotificationParams::default(), &config).is_ok());
    }
}
