//! MySQL-backed stores.
//!
//! Queries use runtime binding so the crate builds without a live database.
//! The single-active-entry invariant rides the `active` key column: 1 while a
//! session is open, NULL once closed, under a unique index on
//! (company_id, employee_id, active).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::MySqlPool;

use crate::error::TimeClockError;
use crate::model::employee::EmployeeProfile;
use crate::model::employee_schedule::EmployeeSchedule;
use crate::model::pay_period::{PayFrequency, PayPeriod};
use crate::model::policy::{OvertimeRule, TimePolicy};
use crate::model::shift::Shift;
use crate::model::time_entry::{TimeEntry, TimeEntryStatus};

use super::{
    ClockOutUpdate, DirectoryStore, NewPayPeriod, NewTimeEntry, PayPeriodStore, PolicyStore,
    TimeEntryStore,
};

const ENTRY_COLUMNS: &str = "id, employee_id, company_id, shift_id, pay_period_id, entry_type, \
     status, clock_in, clock_out, total_minutes, break_minutes, regular_minutes, \
     overtime_minutes, double_time_minutes, clock_in_ip, clock_out_ip, clock_in_lat, \
     clock_in_lng, clock_out_lat, clock_out_lng, metadata, exported_to_payroll, exported_at, \
     payroll_batch_id, approved_by, approved_at, notes";

const PERIOD_COLUMNS: &str =
    "id, company_id, start_date, end_date, frequency, status, approved_by, approved_at";

fn is_duplicate_key(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23000"))
}

pub struct MySqlTimeEntryStore {
    pool: MySqlPool,
}

impl MySqlTimeEntryStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TimeEntryStore for MySqlTimeEntryStore {
    async fn insert_active(&self, new: NewTimeEntry) -> Result<TimeEntry, TimeClockError> {
        let sql = "INSERT INTO time_entries \
             (employee_id, company_id, shift_id, entry_type, status, active, clock_in, \
              clock_in_ip, clock_in_lat, clock_in_lng, metadata, notes) \
             VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?)";

        let result = sqlx::query(sql)
            .bind(new.employee_id)
            .bind(new.company_id)
            .bind(new.shift_id)
            .bind(new.entry_type)
            .bind(TimeEntryStatus::InProgress)
            .bind(new.clock_in)
            .bind(new.clock_in_ip)
            .bind(new.clock_in_lat)
            .bind(new.clock_in_lng)
            .bind(new.metadata)
            .bind(new.notes)
            .execute(&self.pool)
            .await;

        let result = match result {
            Ok(r) => r,
            Err(e) if is_duplicate_key(&e) => return Err(TimeClockError::AlreadyActiveEntry),
            Err(e) => return Err(e.into()),
        };

        self.find(result.last_insert_id())
            .await?
            .ok_or(TimeClockError::EntryNotFound)
    }

    async fn find(&self, id: u64) -> Result<Option<TimeEntry>, TimeClockError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM time_entries WHERE id = ?");
        let entry = sqlx::query_as::<_, TimeEntry>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    async fn find_active(
        &self,
        company_id: u64,
        employee_id: u64,
    ) -> Result<Option<TimeEntry>, TimeClockError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM time_entries \
             WHERE company_id = ? AND employee_id = ? AND status = ?"
        );
        let entry = sqlx::query_as::<_, TimeEntry>(&sql)
            .bind(company_id)
            .bind(employee_id)
            .bind(TimeEntryStatus::InProgress)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    async fn find_active_before(
        &self,
        company_id: u64,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, TimeClockError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM time_entries \
             WHERE company_id = ? AND status = ? AND clock_in < ? \
             ORDER BY clock_in"
        );
        let entries = sqlx::query_as::<_, TimeEntry>(&sql)
            .bind(company_id)
            .bind(TimeEntryStatus::InProgress)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    async fn companies_with_active(&self) -> Result<Vec<u64>, TimeClockError> {
        let ids = sqlx::query_scalar::<_, u64>(
            "SELECT DISTINCT company_id FROM time_entries WHERE status = ?",
        )
        .bind(TimeEntryStatus::InProgress)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn close_entry(&self, update: ClockOutUpdate) -> Result<TimeEntry, TimeClockError> {
        let sql = "UPDATE time_entries \
             SET clock_out = ?, clock_out_ip = ?, clock_out_lat = ?, clock_out_lng = ?, \
                 status = ?, active = NULL, approved_by = ?, approved_at = ?, \
                 total_minutes = ?, break_minutes = ?, regular_minutes = ?, \
                 overtime_minutes = ?, double_time_minutes = ? \
             WHERE id = ? AND clock_out IS NULL";

        let result = sqlx::query(sql)
            .bind(update.clock_out)
            .bind(update.clock_out_ip.clone())
            .bind(update.clock_out_lat)
            .bind(update.clock_out_lng)
            .bind(update.status)
            .bind(update.approved_by)
            .bind(update.approved_at)
            .bind(update.total_minutes)
            .bind(update.break_minutes)
            .bind(update.regular_minutes)
            .bind(update.overtime_minutes)
            .bind(update.double_time_minutes)
            .bind(update.entry_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return match self.find(update.entry_id).await? {
                Some(_) => Err(TimeClockError::AlreadyClockedOut),
                None => Err(TimeClockError::EntryNotFound),
            };
        }

        self.find(update.entry_id)
            .await?
            .ok_or(TimeClockError::EntryNotFound)
    }

    async fn entries_in_range(
        &self,
        company_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<u64>,
    ) -> Result<Vec<TimeEntry>, TimeClockError> {
        let mut sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM time_entries \
             WHERE company_id = ? AND DATE(clock_in) BETWEEN ? AND ?"
        );
        if employee_id.is_some() {
            sql.push_str(" AND employee_id = ?");
        }
        sql.push_str(" ORDER BY clock_in");

        let mut query = sqlx::query_as::<_, TimeEntry>(&sql)
            .bind(company_id)
            .bind(start)
            .bind(end);
        if let Some(id) = employee_id {
            query = query.bind(id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn save_minutes(&self, entry: &TimeEntry) -> Result<(), TimeClockError> {
        let sql = "UPDATE time_entries \
             SET total_minutes = ?, break_minutes = ?, regular_minutes = ?, \
                 overtime_minutes = ?, double_time_minutes = ? \
             WHERE id = ? AND status <> ? AND exported_to_payroll = 0";

        let result = sqlx::query(sql)
            .bind(entry.total_minutes)
            .bind(entry.break_minutes)
            .bind(entry.regular_minutes)
            .bind(entry.overtime_minutes)
            .bind(entry.double_time_minutes)
            .bind(entry.id)
            .bind(TimeEntryStatus::Paid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return match self.find(entry.id).await? {
                Some(_) => Err(TimeClockError::ExportedEntryImmutable),
                None => Err(TimeClockError::EntryNotFound),
            };
        }
        Ok(())
    }

    async fn approve_completed_in_range(
        &self,
        company_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        approver: u64,
        at: DateTime<Utc>,
    ) -> Result<u64, TimeClockError> {
        let result = sqlx::query(
            "UPDATE time_entries \
             SET status = ?, approved_by = ?, approved_at = ? \
             WHERE company_id = ? AND status = ? AND DATE(clock_in) BETWEEN ? AND ?",
        )
        .bind(TimeEntryStatus::Approved)
        .bind(approver)
        .bind(at)
        .bind(company_id)
        .bind(TimeEntryStatus::Completed)
        .bind(start)
        .bind(end)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn mark_exported_in_range(
        &self,
        company_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        batch_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, TimeClockError> {
        let result = sqlx::query(
            "UPDATE time_entries \
             SET status = ?, exported_to_payroll = 1, exported_at = ?, payroll_batch_id = ? \
             WHERE company_id = ? AND status = ? AND exported_to_payroll = 0 \
               AND DATE(clock_in) BETWEEN ? AND ?",
        )
        .bind(TimeEntryStatus::Paid)
        .bind(at)
        .bind(batch_id)
        .bind(company_id)
        .bind(TimeEntryStatus::Approved)
        .bind(start)
        .bind(end)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

pub struct MySqlPayPeriodStore {
    pool: MySqlPool,
}

impl MySqlPayPeriodStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PayPeriodStore for MySqlPayPeriodStore {
    async fn insert_open(&self, new: NewPayPeriod) -> Result<PayPeriod, TimeClockError> {
        let result = sqlx::query(
            "INSERT INTO pay_periods (company_id, start_date, end_date, frequency, status) \
             VALUES (?, ?, ?, ?, 'open')",
        )
        .bind(new.company_id)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.frequency)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) if is_duplicate_key(&e) => return Err(TimeClockError::PeriodAlreadyExists),
            Err(e) => return Err(e.into()),
        };

        self.find(result.last_insert_id())
            .await?
            .ok_or(TimeClockError::PayPeriodNotFound)
    }

    async fn find(&self, id: u64) -> Result<Option<PayPeriod>, TimeClockError> {
        let sql = format!("SELECT {PERIOD_COLUMNS} FROM pay_periods WHERE id = ?");
        let period = sqlx::query_as::<_, PayPeriod>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(period)
    }

    async fn find_exact(
        &self,
        company_id: u64,
        frequency: PayFrequency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<PayPeriod>, TimeClockError> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM pay_periods \
             WHERE company_id = ? AND frequency = ? AND start_date = ? AND end_date = ?"
        );
        let period = sqlx::query_as::<_, PayPeriod>(&sql)
            .bind(company_id)
            .bind(frequency)
            .bind(start)
            .bind(end)
            .fetch_optional(&self.pool)
            .await?;
        Ok(period)
    }

    async fn set_approved(
        &self,
        id: u64,
        approver: u64,
        at: DateTime<Utc>,
    ) -> Result<PayPeriod, TimeClockError> {
        let result = sqlx::query(
            "UPDATE pay_periods SET status = 'approved', approved_by = ?, approved_at = ? \
             WHERE id = ?",
        )
        .bind(approver)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TimeClockError::PayPeriodNotFound);
        }
        self.find(id).await?.ok_or(TimeClockError::PayPeriodNotFound)
    }
}

pub struct MySqlDirectoryStore {
    pool: MySqlPool,
}

impl MySqlDirectoryStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryStore for MySqlDirectoryStore {
    async fn employee(
        &self,
        company_id: u64,
        employee_id: u64,
    ) -> Result<Option<EmployeeProfile>, TimeClockError> {
        let employee = sqlx::query_as::<_, EmployeeProfile>(
            "SELECT id, company_id, first_name, last_name, email, overtime_exempt \
             FROM employees WHERE company_id = ? AND id = ?",
        )
        .bind(company_id)
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn shift(
        &self,
        company_id: u64,
        shift_id: u64,
    ) -> Result<Option<Shift>, TimeClockError> {
        let shift = sqlx::query_as::<_, Shift>(
            "SELECT id, company_id, name, start_time, end_time, break_minutes, days_of_week, \
                    is_active \
             FROM shifts WHERE company_id = ? AND id = ?",
        )
        .bind(company_id)
        .bind(shift_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(shift)
    }

    async fn schedule_for(
        &self,
        company_id: u64,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<EmployeeSchedule>, TimeClockError> {
        let schedule = sqlx::query_as::<_, EmployeeSchedule>(
            "SELECT id, company_id, employee_id, shift_id, date \
             FROM employee_schedules WHERE company_id = ? AND employee_id = ? AND date = ?",
        )
        .bind(company_id)
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(schedule)
    }
}

#[derive(sqlx::FromRow)]
struct PolicyRow {
    round_to_minutes: u32,
    auto_deduct_breaks: bool,
    break_threshold_minutes: i64,
    required_break_minutes: i64,
    require_approval: bool,
    approval_threshold_hours: f64,
    state_overtime_rules: String,
    double_time_threshold_minutes: Option<i64>,
    require_gps: bool,
    allowed_ips: sqlx::types::Json<Vec<String>>,
    auto_clock_out_hours: i64,
}

impl From<PolicyRow> for TimePolicy {
    fn from(row: PolicyRow) -> Self {
        TimePolicy {
            round_to_minutes: row.round_to_minutes,
            auto_deduct_breaks: row.auto_deduct_breaks,
            break_threshold_minutes: row.break_threshold_minutes,
            required_break_minutes: row.required_break_minutes,
            require_approval: row.require_approval,
            approval_threshold_hours: row.approval_threshold_hours,
            overtime_rule: OvertimeRule::from_code(&row.state_overtime_rules),
            double_time_threshold_minutes: row.double_time_threshold_minutes,
            require_gps: row.require_gps,
            allowed_ips: row.allowed_ips.0,
            auto_clock_out_hours: row.auto_clock_out_hours,
        }
    }
}

pub struct MySqlPolicyStore {
    pool: MySqlPool,
}

impl MySqlPolicyStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyStore for MySqlPolicyStore {
    async fn policy_for(&self, company_id: u64) -> Result<TimePolicy, TimeClockError> {
        let row = sqlx::query_as::<_, PolicyRow>(
            "SELECT round_to_minutes, auto_deduct_breaks, break_threshold_minutes, \
                    required_break_minutes, require_approval, approval_threshold_hours, \
                    state_overtime_rules, double_time_threshold_minutes, require_gps, \
                    allowed_ips, auto_clock_out_hours \
             FROM time_policies WHERE company_id = ?",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                tracing::debug!(company_id, "no stored time policy, using defaults");
                Ok(TimePolicy::default())
            }
        }
    }
}
