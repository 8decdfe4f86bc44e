//! Borrower notifications
//!
//! Delivery is fire-and-forget: [`Notifier::notify`] reports success as a
//! bool and lifecycle operations never fail because a message did not go out.

mod templates;

pub use templates::{render, RenderError};

use std::fmt;
use std::sync::Mutex;

use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;

use crate::assumptions::NetworkDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    ApplicationReceived,
    Approved,
    Declined,
    PaymentDue,
    PaymentReceived,
    LoanFullyPaid,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::ApplicationReceived => "application_received",
            NotificationEvent::Approved => "approved",
            NotificationEvent::Declined => "declined",
            NotificationEvent::PaymentDue => "payment_due",
            NotificationEvent::PaymentReceived => "payment_received",
            NotificationEvent::LoanFullyPaid => "loan_fully_paid",
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values substituted into a message template
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationParams {
    pub amount: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub reference: Option<String>,
}

impl NotificationParams {
    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn next_due_date(mut self, date: Option<NaiveDate>) -> Self {
        self.next_due_date = date;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Borrower notification capability
pub trait Notifier {
    /// Deliver a message; returns whether it was sent
    fn notify(&self, event: NotificationEvent, recipient: &str, params: &NotificationParams) -> bool;
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Sign-off appended to every message
    pub brand: String,
    pub currency_symbol: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            brand: "CreditSwift SA".to_string(),
            currency_symbol: "R".to_string(),
        }
    }
}

/// A rendered message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub event: NotificationEvent,
    /// International format
    pub recipient: String,
    pub body: String,
}

/// Renders templates and logs each message; keeps an outbox of what was sent
#[derive(Debug)]
pub struct TemplateNotifier {
    config: NotifierConfig,
    networks: NetworkDirectory,
    outbox: Mutex<Vec<OutboundMessage>>,
}

impl TemplateNotifier {
    pub fn new(networks: NetworkDirectory) -> Self {
        Self::with_config(networks, NotifierConfig::default())
    }

    pub fn with_config(networks: NetworkDirectory, config: NotifierConfig) -> Self {
        Self {
            config,
            networks,
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Messages sent so far
    pub fn outbox(&self) -> Vec<OutboundMessage> {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Notifier for TemplateNotifier {
    fn notify(&self, event: NotificationEvent, recipient: &str, params: &NotificationParams) -> bool {
        let body = match render(event, params, &self.config) {
            Ok(body) => body,
            Err(e) => {
                warn!("Notification {} to {} not sent: {}", event, recipient, e);
                return false;
            }
        };

        let recipient = self.networks.international_format(recipient);
        info!("SMS to {}: {}", recipient, body);

        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(OutboundMessage { event, recipient, body });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_notifier_formats_and_records() {
        let notifier = TemplateNotifier::new(NetworkDirectory::default());

        let sent = notifier.notify(
            NotificationEvent::ApplicationReceived,
            "082 123 4567",
            &NotificationParams::default().amount(1500.0),
        );
        assert!(sent);

        let outbox = notifier.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].recipient, "+27821234567");
        assert!(outbox[0].body.contains("R1,500"));
    }

    #[test]
    fn test_missing_parameter_is_logged_not_sent() {
        let notifier = TemplateNotifier::new(NetworkDirectory::default());
        assert!(!notifier.notify(NotificationEvent::PaymentDue, "0821234567", &NotificationParams::default()));
        assert!(notifier.outbox().is_empty());
    }
}
