pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::TimeClockError;
use crate::model::employee::EmployeeProfile;
use crate::model::employee_schedule::EmployeeSchedule;
use crate::model::pay_period::{PayFrequency, PayPeriod};
use crate::model::policy::TimePolicy;
use crate::model::shift::Shift;
use crate::model::time_entry::{EntryType, TimeEntry, TimeEntryStatus};

/// Fields of a freshly opened clock session.
#[derive(Debug, Clone)]
pub struct NewTimeEntry {
    pub employee_id: u64,
    pub company_id: u64,
    pub shift_id: Option<u64>,
    pub entry_type: EntryType,
    pub clock_in: DateTime<Utc>,
    pub clock_in_ip: Option<String>,
    pub clock_in_lat: Option<f64>,
    pub clock_in_lng: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    pub notes: Option<String>,
}

/// Everything a clock-out writes in one conditional update.
#[derive(Debug, Clone)]
pub struct ClockOutUpdate {
    pub entry_id: u64,
    pub clock_out: DateTime<Utc>,
    pub clock_out_ip: Option<String>,
    pub clock_out_lat: Option<f64>,
    pub clock_out_lng: Option<f64>,
    pub status: TimeEntryStatus,
    pub approved_by: Option<u64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub total_minutes: i64,
    pub break_minutes: i64,
    pub regular_minutes: i64,
    pub overtime_minutes: i64,
    pub double_time_minutes: i64,
}

/// Persistence seam for clock sessions.
///
/// The single-active-entry invariant lives here: `insert_active` must reject
/// a second open entry for the same employee atomically, and `close_entry`
/// must fail when `clock_out` is already set, so concurrent writers resolve
/// inside one store call.
#[async_trait]
pub trait TimeEntryStore: Send + Sync {
    async fn insert_active(&self, new: NewTimeEntry) -> Result<TimeEntry, TimeClockError>;

    async fn find(&self, id: u64) -> Result<Option<TimeEntry>, TimeClockError>;

    async fn find_active(
        &self,
        company_id: u64,
        employee_id: u64,
    ) -> Result<Option<TimeEntry>, TimeClockError>;

    /// Open entries whose clock-in is older than `cutoff`.
    async fn find_active_before(
        &self,
        company_id: u64,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, TimeClockError>;

    /// Companies that currently have at least one open entry.
    async fn companies_with_active(&self) -> Result<Vec<u64>, TimeClockError>;

    /// Conditional clock-out; fails `AlreadyClockedOut` when another writer
    /// closed the entry first.
    async fn close_entry(&self, update: ClockOutUpdate) -> Result<TimeEntry, TimeClockError>;

    /// Entries whose clock-in date falls within `[start, end]`.
    async fn entries_in_range(
        &self,
        company_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<u64>,
    ) -> Result<Vec<TimeEntry>, TimeClockError>;

    /// Write back reclassified minute buckets. Paid rows are refused with
    /// `ExportedEntryImmutable`.
    async fn save_minutes(&self, entry: &TimeEntry) -> Result<(), TimeClockError>;

    /// Flip every `completed` entry in range to `approved`; returns the
    /// number of rows touched.
    async fn approve_completed_in_range(
        &self,
        company_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        approver: u64,
        at: DateTime<Utc>,
    ) -> Result<u64, TimeClockError>;

    /// Flip every `approved`, not-yet-exported entry in range to `paid` with
    /// export markers; returns the number of rows touched.
    async fn mark_exported_in_range(
        &self,
        company_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        batch_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, TimeClockError>;
}

#[derive(Debug, Clone)]
pub struct NewPayPeriod {
    pub company_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub frequency: PayFrequency,
}

#[async_trait]
pub trait PayPeriodStore: Send + Sync {
    /// Insert with status `open`; fails `PeriodAlreadyExists` on a duplicate
    /// (company, frequency, start, end) range.
    async fn insert_open(&self, new: NewPayPeriod) -> Result<PayPeriod, TimeClockError>;

    async fn find(&self, id: u64) -> Result<Option<PayPeriod>, TimeClockError>;

    async fn find_exact(
        &self,
        company_id: u64,
        frequency: PayFrequency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<PayPeriod>, TimeClockError>;

    async fn set_approved(
        &self,
        id: u64,
        approver: u64,
        at: DateTime<Utc>,
    ) -> Result<PayPeriod, TimeClockError>;
}

/// Read-only lookups into the company directory.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn employee(
        &self,
        company_id: u64,
        employee_id: u64,
    ) -> Result<Option<EmployeeProfile>, TimeClockError>;

    async fn shift(&self, company_id: u64, shift_id: u64)
        -> Result<Option<Shift>, TimeClockError>;

    async fn schedule_for(
        &self,
        company_id: u64,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<EmployeeSchedule>, TimeClockError>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Resolved policy snapshot for one company.
    async fn policy_for(&self, company_id: u64) -> Result<TimePolicy, TimeClockError>;
}
