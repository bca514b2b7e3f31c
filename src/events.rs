use chrono::{DateTime, Utc};
use serde::Serialize;

/// Structured notifications emitted by the core. Delivery is a collaborator
/// concern; the default sink writes tracing records.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimeClockEvent {
    ClockedIn {
        entry_id: u64,
        employee_id: u64,
        company_id: u64,
        at: DateTime<Utc>,
    },
    ClockedOut {
        entry_id: u64,
        employee_id: u64,
        company_id: u64,
        at: DateTime<Utc>,
        total_minutes: i64,
    },
    AutoClockedOut {
        entry_id: u64,
        employee_id: u64,
        company_id: u64,
        at: DateTime<Utc>,
    },
    PayPeriodApproved {
        pay_period_id: u64,
        company_id: u64,
        approved_by: u64,
        entries_approved: u64,
    },
    EntriesExported {
        pay_period_id: u64,
        company_id: u64,
        batch_id: String,
        count: u64,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &TimeClockEvent);
}

/// Default sink: structured tracing records, one per event.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &TimeClockEvent) {
        match event {
            TimeClockEvent::ClockedIn {
                entry_id,
                employee_id,
                company_id,
                at,
            } => {
                tracing::info!(entry_id, employee_id, company_id, at = %at, "clocked in");
            }
            TimeClockEvent::ClockedOut {
                entry_id,
                employee_id,
                company_id,
                at,
                total_minutes,
            } => {
                tracing::info!(
                    entry_id,
                    employee_id,
                    company_id,
                    at = %at,
                    total_minutes,
                    "clocked out"
                );
            }
            TimeClockEvent::AutoClockedOut {
                entry_id,
                employee_id,
                company_id,
                at,
            } => {
                tracing::info!(entry_id, employee_id, company_id, at = %at, "auto clocked out");
            }
            TimeClockEvent::PayPeriodApproved {
                pay_period_id,
                company_id,
                approved_by,
                entries_approved,
            } => {
                tracing::info!(
                    pay_period_id,
                    company_id,
                    approved_by,
                    entries_approved,
                    "pay period approved"
                );
            }
            TimeClockEvent::EntriesExported {
                pay_period_id,
                company_id,
                batch_id,
                count,
            } => {
                tracing::info!(pay_period_id, company_id, batch_id = %batch_id, count, "entries exported");
            }
        }
    }
}
