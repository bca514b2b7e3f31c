//! In-memory store implementations backing unit tests and local tooling.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::TimeClockError;
use crate::model::employee::EmployeeProfile;
use crate::model::employee_schedule::EmployeeSchedule;
use crate::model::pay_period::{PayFrequency, PayPeriod, PayPeriodStatus};
use crate::model::policy::TimePolicy;
use crate::model::shift::Shift;
use crate::model::time_entry::{TimeEntry, TimeEntryStatus};

use super::{
    ClockOutUpdate, DirectoryStore, NewPayPeriod, NewTimeEntry, PayPeriodStore, PolicyStore,
    TimeEntryStore,
};

#[derive(Default)]
struct EntryState {
    next_id: u64,
    entries: BTreeMap<u64, TimeEntry>,
}

#[derive(Default)]
pub struct InMemoryTimeEntryStore {
    inner: Mutex<EntryState>,
}

impl InMemoryTimeEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed entry (manual corrections, seeded fixtures).
    pub fn insert_entry(&self, mut entry: TimeEntry) -> TimeEntry {
        let mut state = self.inner.lock().unwrap();
        state.next_id += 1;
        entry.id = state.next_id;
        state.entries.insert(entry.id, entry.clone());
        entry
    }
}

fn in_range(entry: &TimeEntry, start: NaiveDate, end: NaiveDate) -> bool {
    let date = entry.clock_in.date_naive();
    start <= date && date <= end
}

#[async_trait]
impl TimeEntryStore for InMemoryTimeEntryStore {
    async fn insert_active(&self, new: NewTimeEntry) -> Result<TimeEntry, TimeClockError> {
        let mut state = self.inner.lock().unwrap();
        let clash = state.entries.values().any(|e| {
            e.company_id == new.company_id
                && e.employee_id == new.employee_id
                && e.status == TimeEntryStatus::InProgress
        });
        if clash {
            return Err(TimeClockError::AlreadyActiveEntry);
        }

        state.next_id += 1;
        let entry = TimeEntry {
            id: state.next_id,
            employee_id: new.employee_id,
            company_id: new.company_id,
            shift_id: new.shift_id,
            pay_period_id: None,
            entry_type: new.entry_type,
            status: TimeEntryStatus::InProgress,
            clock_in: new.clock_in,
            clock_out: None,
            total_minutes: 0,
            break_minutes: 0,
            regular_minutes: 0,
            overtime_minutes: 0,
            double_time_minutes: 0,
            clock_in_ip: new.clock_in_ip,
            clock_out_ip: None,
            clock_in_lat: new.clock_in_lat,
            clock_in_lng: new.clock_in_lng,
            clock_out_lat: None,
            clock_out_lng: None,
            metadata: new.metadata,
            exported_to_payroll: false,
            exported_at: None,
            payroll_batch_id: None,
            approved_by: None,
            approved_at: None,
            notes: new.notes,
        };
        state.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn find(&self, id: u64) -> Result<Option<TimeEntry>, TimeClockError> {
        Ok(self.inner.lock().unwrap().entries.get(&id).cloned())
    }

    async fn find_active(
        &self,
        company_id: u64,
        employee_id: u64,
    ) -> Result<Option<TimeEntry>, TimeClockError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .entries
            .values()
            .find(|e| {
                e.company_id == company_id
                    && e.employee_id == employee_id
                    && e.status == TimeEntryStatus::InProgress
            })
            .cloned())
    }

    async fn find_active_before(
        &self,
        company_id: u64,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, TimeClockError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .entries
            .values()
            .filter(|e| {
                e.company_id == company_id
                    && e.status == TimeEntryStatus::InProgress
                    && e.clock_in < cutoff
            })
            .cloned()
            .collect())
    }

    async fn companies_with_active(&self) -> Result<Vec<u64>, TimeClockError> {
        let state = self.inner.lock().unwrap();
        let ids: BTreeSet<u64> = state
            .entries
            .values()
            .filter(|e| e.status == TimeEntryStatus::InProgress)
            .map(|e| e.company_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn close_entry(&self, update: ClockOutUpdate) -> Result<TimeEntry, TimeClockError> {
        let mut state = self.inner.lock().unwrap();
        let entry = state
            .entries
            .get_mut(&update.entry_id)
            .ok_or(TimeClockError::EntryNotFound)?;
        if !entry.is_open() {
            return Err(TimeClockError::AlreadyClockedOut);
        }

        entry.clock_out = Some(update.clock_out);
        entry.clock_out_ip = update.clock_out_ip;
        entry.clock_out_lat = update.clock_out_lat;
        entry.clock_out_lng = update.clock_out_lng;
        entry.status = update.status;
        entry.approved_by = update.approved_by;
        entry.approved_at = update.approved_at;
        entry.total_minutes = update.total_minutes;
        entry.break_minutes = update.break_minutes;
        entry.regular_minutes = update.regular_minutes;
        entry.overtime_minutes = update.overtime_minutes;
        entry.double_time_minutes = update.double_time_minutes;
        Ok(entry.clone())
    }

    async fn entries_in_range(
        &self,
        company_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<u64>,
    ) -> Result<Vec<TimeEntry>, TimeClockError> {
        let state = self.inner.lock().unwrap();
        let mut out: Vec<TimeEntry> = state
            .entries
            .values()
            .filter(|e| e.company_id == company_id && in_range(e, start, end))
            .filter(|e| employee_id.map_or(true, |id| e.employee_id == id))
            .cloned()
            .collect();
        out.sort_by_key(|e| e.clock_in);
        Ok(out)
    }

    async fn save_minutes(&self, entry: &TimeEntry) -> Result<(), TimeClockError> {
        let mut state = self.inner.lock().unwrap();
        let stored = state
            .entries
            .get_mut(&entry.id)
            .ok_or(TimeClockError::EntryNotFound)?;
        if stored.is_locked() {
            return Err(TimeClockError::ExportedEntryImmutable);
        }

        stored.total_minutes = entry.total_minutes;
        stored.break_minutes = entry.break_minutes;
        stored.regular_minutes = entry.regular_minutes;
        stored.overtime_minutes = entry.overtime_minutes;
        stored.double_time_minutes = entry.double_time_minutes;
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
        let mut state = self.inner.lock().unwrap();
        let mut touched = 0;
        for entry in state.entries.values_mut() {
            if entry.company_id == company_id
                && entry.status == TimeEntryStatus::Completed
                && in_range(entry, start, end)
            {
                entry.status = TimeEntryStatus::Approved;
                entry.approved_by = Some(approver);
                entry.approved_at = Some(at);
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn mark_exported_in_range(
        &self,
        company_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        batch_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, TimeClockError> {
        let mut state = self.inner.lock().unwrap();
        let mut touched = 0;
        for entry in state.entries.values_mut() {
            if entry.company_id == company_id
                && entry.status == TimeEntryStatus::Approved
                && !entry.exported_to_payroll
                && in_range(entry, start, end)
            {
                entry.status = TimeEntryStatus::Paid;
                entry.exported_to_payroll = true;
                entry.exported_at = Some(at);
                entry.payroll_batch_id = Some(batch_id.to_string());
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[derive(Default)]
struct PeriodState {
    next_id: u64,
    periods: BTreeMap<u64, PayPeriod>,
}

#[derive(Default)]
pub struct InMemoryPayPeriodStore {
    inner: Mutex<PeriodState>,
}

impl InMemoryPayPeriodStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayPeriodStore for InMemoryPayPeriodStore {
    async fn insert_open(&self, new: NewPayPeriod) -> Result<PayPeriod, TimeClockError> {
        let mut state = self.inner.lock().unwrap();
        let dup = state.periods.values().any(|p| {
            p.company_id == new.company_id
                && p.frequency == new.frequency
                && p.start_date == new.start_date
                && p.end_date == new.end_date
        });
        if dup {
            return Err(TimeClockError::PeriodAlreadyExists);
        }

        state.next_id += 1;
        let period = PayPeriod {
            id: state.next_id,
            company_id: new.company_id,
            start_date: new.start_date,
            end_date: new.end_date,
            frequency: new.frequency,
            status: PayPeriodStatus::Open,
            approved_by: None,
            approved_at: None,
        };
        state.periods.insert(period.id, period.clone());
        Ok(period)
    }

    async fn find(&self, id: u64) -> Result<Option<PayPeriod>, TimeClockError> {
        Ok(self.inner.lock().unwrap().periods.get(&id).cloned())
    }

    async fn find_exact(
        &self,
        company_id: u64,
        frequency: PayFrequency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<PayPeriod>, TimeClockError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .periods
            .values()
            .find(|p| {
                p.company_id == company_id
                    && p.frequency == frequency
                    && p.start_date == start
                    && p.end_date == end
            })
            .cloned())
    }

    async fn set_approved(
        &self,
        id: u64,
        approver: u64,
        at: DateTime<Utc>,
    ) -> Result<PayPeriod, TimeClockError> {
        let mut state = self.inner.lock().unwrap();
        let period = state
            .periods
            .get_mut(&id)
            .ok_or(TimeClockError::PayPeriodNotFound)?;
        period.status = PayPeriodStatus::Approved;
        period.approved_by = Some(approver);
        period.approved_at = Some(at);
        Ok(period.clone())
    }
}

#[derive(Default)]
pub struct InMemoryDirectoryStore {
    employees: Mutex<Vec<EmployeeProfile>>,
    shifts: Mutex<Vec<Shift>>,
    schedules: Mutex<Vec<EmployeeSchedule>>,
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_employee(&self, employee: EmployeeProfile) {
        self.employees.lock().unwrap().push(employee);
    }

    pub fn add_shift(&self, shift: Shift) {
        self.shifts.lock().unwrap().push(shift);
    }

    pub fn add_schedule(&self, schedule: EmployeeSchedule) {
        self.schedules.lock().unwrap().push(schedule);
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn employee(
        &self,
        company_id: u64,
        employee_id: u64,
    ) -> Result<Option<EmployeeProfile>, TimeClockError> {
        Ok(self
            .employees
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.company_id == company_id && e.id == employee_id)
            .cloned())
    }

    async fn shift(
        &self,
        company_id: u64,
        shift_id: u64,
    ) -> Result<Option<Shift>, TimeClockError> {
        Ok(self
            .shifts
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.company_id == company_id && s.id == shift_id)
            .cloned())
    }

    async fn schedule_for(
        &self,
        company_id: u64,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<EmployeeSchedule>, TimeClockError> {
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.company_id == company_id && s.employee_id == employee_id && s.date == date)
            .cloned())
    }
}

/// Policy store holding resolved snapshots per company; companies without an
/// explicit snapshot get the defaults.
#[derive(Default)]
pub struct StaticPolicyStore {
    policies: Mutex<HashMap<u64, TimePolicy>>,
}

impl StaticPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, company_id: u64, policy: TimePolicy) {
        self.policies.lock().unwrap().insert(company_id, policy);
    }
}

#[async_trait]
impl PolicyStore for StaticPolicyStore {
    async fn policy_for(&self, company_id: u64) -> Result<TimePolicy, TimeClockError> {
        Ok(self
            .policies
            .lock()
            .unwrap()
            .get(&company_id)
            .cloned()
            .unwrap_or_default())
    }
}
