//! Clock-in/out state machine, pre-flight validation and stale-entry
//! reconciliation.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use strum::Display;
use utoipa::ToSchema;

use crate::error::TimeClockError;
use crate::events::{EventSink, TimeClockEvent};
use crate::model::policy::TimePolicy;
use crate::model::time_entry::{ClockContext, EntryType, TimeEntry, TimeEntryStatus};
use crate::service::overtime::OvertimeCalculationService;
use crate::store::{ClockOutUpdate, DirectoryStore, NewTimeEntry, TimeEntryStore};
use crate::utils::net::ip_allowed;

/// Pre-flight check result. Collects every failing rule instead of stopping
/// at the first, so a client can show them all at once.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClockInValidation {
    pub errors: Vec<String>,
}

impl ClockInValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReconcileStatus {
    Success,
    Failure,
}

/// Per-entry outcome of a stale-entry sweep.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileOutcome {
    pub entry_id: u64,
    pub status: ReconcileStatus,
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct TimeClockService {
    entries: Arc<dyn TimeEntryStore>,
    directory: Arc<dyn DirectoryStore>,
    events: Arc<dyn EventSink>,
    overtime: OvertimeCalculationService,
}

impl TimeClockService {
    pub fn new(
        entries: Arc<dyn TimeEntryStore>,
        directory: Arc<dyn DirectoryStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            entries,
            directory,
            events,
            overtime: OvertimeCalculationService::new(),
        }
    }

    /// Open a clock session for the employee.
    ///
    /// The check-then-act sequence is race-safe: the pre-read gives the
    /// friendly fast path, and the store's guarded insert settles concurrent
    /// requests, so the loser always sees `AlreadyActiveEntry`. GPS and IP
    /// policy rules are enforced here too, so callers that skip the
    /// pre-flight check cannot sidestep them.
    pub async fn clock_in(
        &self,
        company_id: u64,
        employee_id: u64,
        policy: &TimePolicy,
        ctx: &ClockContext,
        shift_id: Option<u64>,
        notes: Option<String>,
    ) -> Result<TimeEntry, TimeClockError> {
        if self.has_active_entry(company_id, employee_id).await? {
            return Err(TimeClockError::AlreadyActiveEntry);
        }

        let violations = context_violations(policy, ctx);
        if !violations.is_empty() {
            return Err(TimeClockError::ValidationFailed(violations));
        }

        let clock_in = self.overtime.round_time(Utc::now(), policy.round_to_minutes);
        let shift_id = match shift_id {
            // An explicit shift must exist and be active to be associated.
            Some(id) => {
                let shift = self.directory.shift(company_id, id).await?;
                if !shift.as_ref().map_or(false, |s| s.is_active) {
                    tracing::debug!(shift_id = id, "ignoring unknown or inactive shift");
                }
                shift.filter(|s| s.is_active).map(|s| s.id)
            }
            None => self
                .directory
                .schedule_for(company_id, employee_id, clock_in.date_naive())
                .await?
                .map(|s| s.shift_id),
        };

        let entry = self
            .entries
            .insert_active(NewTimeEntry {
                employee_id,
                company_id,
                shift_id,
                entry_type: EntryType::Clock,
                clock_in,
                clock_in_ip: ctx.ip.clone(),
                clock_in_lat: ctx.lat,
                clock_in_lng: ctx.lng,
                metadata: ctx.device.clone(),
                notes,
            })
            .await?;

        self.events.emit(&TimeClockEvent::ClockedIn {
            entry_id: entry.id,
            employee_id,
            company_id,
            at: entry.clock_in,
        });
        Ok(entry)
    }

    /// Close an open session: round the out-time, run the first-pass minute
    /// split and settle the approval status.
    pub async fn clock_out(
        &self,
        entry: &TimeEntry,
        policy: &TimePolicy,
        ctx: &ClockContext,
    ) -> Result<TimeEntry, TimeClockError> {
        if !entry.is_open() {
            return Err(TimeClockError::AlreadyClockedOut);
        }

        let clock_out = self.overtime.round_time(Utc::now(), policy.round_to_minutes);
        let mut candidate = entry.clone();
        candidate.clock_out = Some(clock_out);
        let minutes = self.overtime.calculate_entry_minutes(&candidate, policy);

        let total_hours = minutes.total as f64 / 60.0;
        let auto_approve = !policy.require_approval || total_hours <= policy.approval_threshold_hours;
        let (status, approved_at) = if auto_approve {
            (TimeEntryStatus::Approved, Some(clock_out))
        } else {
            (TimeEntryStatus::Completed, None)
        };

        let updated = self
            .entries
            .close_entry(ClockOutUpdate {
                entry_id: entry.id,
                clock_out,
                clock_out_ip: ctx.ip.clone(),
                clock_out_lat: ctx.lat,
                clock_out_lng: ctx.lng,
                status,
                approved_by: None,
                approved_at,
                total_minutes: minutes.total,
                break_minutes: minutes.break_minutes,
                regular_minutes: minutes.regular,
                overtime_minutes: minutes.overtime,
                double_time_minutes: 0,
            })
            .await?;

        self.events.emit(&TimeClockEvent::ClockedOut {
            entry_id: updated.id,
            employee_id: updated.employee_id,
            company_id: updated.company_id,
            at: clock_out,
            total_minutes: updated.total_minutes,
        });
        Ok(updated)
    }

    pub async fn active_entry(
        &self,
        company_id: u64,
        employee_id: u64,
    ) -> Result<Option<TimeEntry>, TimeClockError> {
        self.entries.find_active(company_id, employee_id).await
    }

    pub async fn has_active_entry(
        &self,
        company_id: u64,
        employee_id: u64,
    ) -> Result<bool, TimeClockError> {
        Ok(self.active_entry(company_id, employee_id).await?.is_some())
    }

    /// Pre-flight check used by clients before committing to `clock_in`.
    /// Never fails on rule violations; only a store fault is an error.
    pub async fn validate_clock_in(
        &self,
        company_id: u64,
        employee_id: u64,
        policy: &TimePolicy,
        ctx: &ClockContext,
    ) -> Result<ClockInValidation, TimeClockError> {
        let mut errors = Vec::new();

        if self.has_active_entry(company_id, employee_id).await? {
            errors.push("You already have an active time entry".to_string());
        }
        errors.extend(context_violations(policy, ctx));

        Ok(ClockInValidation { errors })
    }

    /// Force-close every open entry older than the policy's auto-clock-out
    /// window. Safe to re-run: closed entries drop out of the stale set, and
    /// an entry that loses a race to a genuine clock-out is reported as a
    /// failure without aborting the rest of the batch.
    pub async fn auto_clock_out_stale(
        &self,
        company_id: u64,
        policy: &TimePolicy,
    ) -> Result<Vec<ReconcileOutcome>, TimeClockError> {
        let cutoff = Utc::now() - Duration::hours(policy.auto_clock_out_hours);
        let stale = self.entries.find_active_before(company_id, cutoff).await?;

        let mut outcomes = Vec::with_capacity(stale.len());
        for entry in stale {
            match self.clock_out(&entry, policy, &ClockContext::default()).await {
                Ok(closed) => {
                    self.events.emit(&TimeClockEvent::AutoClockedOut {
                        entry_id: closed.id,
                        employee_id: closed.employee_id,
                        company_id: closed.company_id,
                        at: closed.clock_out.unwrap_or_else(Utc::now),
                    });
                    outcomes.push(ReconcileOutcome {
                        entry_id: closed.id,
                        status: ReconcileStatus::Success,
                        reason: None,
                    });
                }
                Err(err) => {
                    tracing::warn!(entry_id = entry.id, error = %err, "auto clock-out failed");
                    outcomes.push(ReconcileOutcome {
                        entry_id: entry.id,
                        status: ReconcileStatus::Failure,
                        reason: Some(err.to_string()),
                    });
                }
            }
        }
        Ok(outcomes)
    }
}

/// GPS and IP allow-list rules, in the order clients display them.
fn context_violations(policy: &TimePolicy, ctx: &ClockContext) -> Vec<String> {
    let mut violations = Vec::new();

    if policy.require_gps && !ctx.has_gps() {
        violations.push("GPS coordinates are required to clock in".to_string());
    }

    if !policy.allowed_ips.is_empty() {
        match ctx.ip.as_deref() {
            None => violations.push("An IP address is required to clock in".to_string()),
            Some(ip) if !ip_allowed(ip, &policy.allowed_ips) => {
                violations.push(format!("IP address {ip} is not allowed to clock in"));
            }
            Some(_) => {}
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::employee_schedule::EmployeeSchedule;
    use crate::model::shift::Shift;
    use crate::store::memory::{InMemoryDirectoryStore, InMemoryTimeEntryStore};

    #[derive(Default)]
    struct CollectingSink {
        events: Mutex<Vec<TimeClockEvent>>,
    }

    impl EventSink for CollectingSink {
        fn emit(&self, event: &TimeClockEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn service() -> (TimeClockService, Arc<InMemoryTimeEntryStore>, Arc<CollectingSink>) {
        let entries = Arc::new(InMemoryTimeEntryStore::new());
        let sink = Arc::new(CollectingSink::default());
        let service = TimeClockService::new(
            entries.clone(),
            Arc::new(InMemoryDirectoryStore::new()),
            sink.clone(),
        );
        (service, entries, sink)
    }

    fn open_entry_hours_ago(hours: i64) -> TimeEntry {
        TimeEntry {
            id: 0,
            employee_id: 1001,
            company_id: 1,
            shift_id: None,
            pay_period_id: None,
            entry_type: EntryType::Clock,
            status: TimeEntryStatus::InProgress,
            clock_in: Utc::now() - Duration::hours(hours),
            clock_out: None,
            total_minutes: 0,
            break_minutes: 0,
            regular_minutes: 0,
            overtime_minutes: 0,
            double_time_minutes: 0,
            clock_in_ip: None,
            clock_out_ip: None,
            clock_in_lat: None,
            clock_in_lng: None,
            clock_out_lat: None,
            clock_out_lng: None,
            metadata: None,
            exported_to_payroll: false,
            exported_at: None,
            payroll_batch_id: None,
            approved_by: None,
            approved_at: None,
            notes: None,
        }
    }

    #[actix_web::test]
    async fn second_clock_in_is_rejected() {
        let (service, _, _) = service();
        let policy = TimePolicy::default();
        let ctx = ClockContext::default();

        service
            .clock_in(1, 1001, &policy, &ctx, None, None)
            .await
            .unwrap();
        let second = service.clock_in(1, 1001, &policy, &ctx, None, None).await;
        assert!(matches!(second, Err(TimeClockError::AlreadyActiveEntry)));
    }

    #[actix_web::test]
    async fn clock_in_snaps_to_the_rounding_grid() {
        let (service, _, sink) = service();
        let policy = TimePolicy {
            round_to_minutes: 15,
            ..TimePolicy::default()
        };

        let entry = service
            .clock_in(1, 1001, &policy, &ClockContext::default(), None, None)
            .await
            .unwrap();
        assert_eq!(entry.clock_in.timestamp() % (15 * 60), 0);
        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn clock_in_picks_up_the_scheduled_shift() {
        let entries = Arc::new(InMemoryTimeEntryStore::new());
        let directory = Arc::new(InMemoryDirectoryStore::new());
        directory.add_schedule(EmployeeSchedule {
            id: 1,
            company_id: 1,
            employee_id: 1001,
            shift_id: 7,
            date: Utc::now().date_naive(),
        });
        let service = TimeClockService::new(
            entries,
            directory,
            Arc::new(CollectingSink::default()),
        );

        let entry = service
            .clock_in(1, 1001, &TimePolicy::default(), &ClockContext::default(), None, None)
            .await
            .unwrap();
        assert_eq!(entry.shift_id, Some(7));
    }

    #[actix_web::test]
    async fn explicit_shift_must_be_active() {
        let entries = Arc::new(InMemoryTimeEntryStore::new());
        let directory = Arc::new(InMemoryDirectoryStore::new());
        directory.add_shift(Shift {
            id: 7,
            company_id: 1,
            name: "Night".to_string(),
            start_time: chrono::NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end_time: chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            break_minutes: 30,
            days_of_week: sqlx::types::Json(vec![0, 1, 2, 3, 4]),
            is_active: false,
        });
        let service = TimeClockService::new(
            entries,
            directory,
            Arc::new(CollectingSink::default()),
        );

        let entry = service
            .clock_in(1, 1001, &TimePolicy::default(), &ClockContext::default(), Some(7), None)
            .await
            .unwrap();
        assert_eq!(entry.shift_id, None);
    }

    #[actix_web::test]
    async fn clock_out_closes_and_auto_approves() {
        let (service, entries, sink) = service();
        let entry = entries.insert_entry(open_entry_hours_ago(8));

        let policy = TimePolicy::default();
        let closed = service
            .clock_out(&entry, &policy, &ClockContext::default())
            .await
            .unwrap();
        assert_eq!(closed.status, TimeEntryStatus::Approved);
        assert!(closed.approved_at.is_some());
        assert!((closed.total_minutes - 480).abs() <= 1);
        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn long_entry_awaits_approval() {
        let (service, entries, _) = service();
        let entry = entries.insert_entry(open_entry_hours_ago(10));

        let policy = TimePolicy {
            require_approval: true,
            approval_threshold_hours: 8.0,
            ..TimePolicy::default()
        };
        let closed = service
            .clock_out(&entry, &policy, &ClockContext::default())
            .await
            .unwrap();
        assert_eq!(closed.status, TimeEntryStatus::Completed);
        assert!(closed.approved_at.is_none());
    }

    #[actix_web::test]
    async fn clock_out_twice_is_rejected() {
        let (service, entries, _) = service();
        let entry = entries.insert_entry(open_entry_hours_ago(1));

        let policy = TimePolicy::default();
        let closed = service
            .clock_out(&entry, &policy, &ClockContext::default())
            .await
            .unwrap();
        let again = service
            .clock_out(&closed, &policy, &ClockContext::default())
            .await;
        assert!(matches!(again, Err(TimeClockError::AlreadyClockedOut)));
    }

    #[actix_web::test]
    async fn validation_reports_every_failing_rule() {
        let (service, _, _) = service();
        let policy = TimePolicy {
            require_gps: true,
            allowed_ips: vec!["10.0.0.0/8".to_string()],
            ..TimePolicy::default()
        };

        service
            .clock_in(1, 1001, &TimePolicy::default(), &ClockContext::default(), None, None)
            .await
            .unwrap();

        let ctx = ClockContext {
            ip: Some("203.0.113.9".to_string()),
            ..ClockContext::default()
        };
        let validation = service
            .validate_clock_in(1, 1001, &policy, &ctx)
            .await
            .unwrap();
        assert!(!validation.is_valid());
        assert_eq!(validation.errors.len(), 3);
    }

    #[actix_web::test]
    async fn clock_in_enforces_context_rules_itself() {
        let (service, _, _) = service();
        let policy = TimePolicy {
            require_gps: true,
            ..TimePolicy::default()
        };

        let result = service
            .clock_in(1, 1001, &policy, &ClockContext::default(), None, None)
            .await;
        match result {
            Err(TimeClockError::ValidationFailed(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn validation_passes_with_gps_and_allowed_ip() {
        let (service, _, _) = service();
        let policy = TimePolicy {
            require_gps: true,
            allowed_ips: vec!["10.0.0.0/8".to_string()],
            ..TimePolicy::default()
        };

        let ctx = ClockContext {
            ip: Some("10.1.2.3".to_string()),
            lat: Some(37.77),
            lng: Some(-122.42),
            device: None,
        };
        let validation = service
            .validate_clock_in(1, 1001, &policy, &ctx)
            .await
            .unwrap();
        assert!(validation.is_valid());
    }

    #[actix_web::test]
    async fn stale_entries_are_reconciled_once() {
        let (service, entries, sink) = service();
        entries.insert_entry(open_entry_hours_ago(20));
        let mut fresh = open_entry_hours_ago(2);
        fresh.employee_id = 1002;
        entries.insert_entry(fresh);

        let policy = TimePolicy {
            auto_clock_out_hours: 16,
            ..TimePolicy::default()
        };
        let outcomes = service.auto_clock_out_stale(1, &policy).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, ReconcileStatus::Success);
        // clocked out + auto clocked out
        assert_eq!(sink.events.lock().unwrap().len(), 2);

        let second = service.auto_clock_out_stale(1, &policy).await.unwrap();
        assert!(second.is_empty());
    }
}
