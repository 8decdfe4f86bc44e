//! Amortization: payment formula, affordability and schedule generation

mod payment;
mod schedule;

pub use payment::{compute_monthly_payment, max_affordable_principal, round_cents};
pub use schedule::{build_schedule, total_repayment, ScheduleConfig, ScheduleMethod, ScheduledInstallment};
