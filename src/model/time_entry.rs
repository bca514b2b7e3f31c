use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EntryType {
    Clock,
    Manual,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TimeEntryStatus {
    InProgress,
    Completed,
    Approved,
    Rejected,
    Paid,
}

/// One clock-in/clock-out session for an employee.
///
/// Minute fields are net of the break deduction; `paid` rows are immutable
/// to every recalculation path once `exported_to_payroll` is set.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TimeEntry {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1001)]
    pub employee_id: u64,

    #[schema(example = 1)]
    pub company_id: u64,

    pub shift_id: Option<u64>,
    pub pay_period_id: Option<u64>,

    pub entry_type: EntryType,
    pub status: TimeEntryStatus,

    #[schema(example = "2026-01-05T09:00:00Z", value_type = String, format = "date-time")]
    pub clock_in: DateTime<Utc>,

    #[schema(example = "2026-01-05T17:00:00Z", value_type = String, format = "date-time", nullable = true)]
    pub clock_out: Option<DateTime<Utc>>,

    #[schema(example = 450)]
    pub total_minutes: i64,
    #[schema(example = 30)]
    pub break_minutes: i64,
    #[schema(example = 450)]
    pub regular_minutes: i64,
    #[schema(example = 0)]
    pub overtime_minutes: i64,
    #[schema(example = 0)]
    pub double_time_minutes: i64,

    pub clock_in_ip: Option<String>,
    pub clock_out_ip: Option<String>,
    pub clock_in_lat: Option<f64>,
    pub clock_in_lng: Option<f64>,
    pub clock_out_lat: Option<f64>,
    pub clock_out_lng: Option<f64>,

    #[schema(value_type = Object, nullable = true)]
    pub metadata: Option<serde_json::Value>,

    pub exported_to_payroll: bool,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub exported_at: Option<DateTime<Utc>>,
    pub payroll_batch_id: Option<String>,

    pub approved_by: Option<u64>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub approved_at: Option<DateTime<Utc>>,

    pub notes: Option<String>,
}

impl TimeEntry {
    pub fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }

    /// Export is a point of no return: once a row is paid it may not be
    /// touched by recalculation.
    pub fn is_locked(&self) -> bool {
        self.exported_to_payroll || self.status == TimeEntryStatus::Paid
    }
}

/// Optional request context captured at clock time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ClockContext {
    #[schema(example = "203.0.113.7", nullable = true)]
    pub ip: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[schema(value_type = Object, nullable = true)]
    pub device: Option<serde_json::Value>,
}

impl ClockContext {
    pub fn has_gps(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}
