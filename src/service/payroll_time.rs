//! Pay-period lifecycle: generation, aggregation, approval cascade and
//! export marking.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Datelike, Duration, Months, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::TimeClockError;
use crate::events::{EventSink, TimeClockEvent};
use crate::model::pay_period::{PayFrequency, PayPeriod};
use crate::model::policy::TimePolicy;
use crate::model::time_entry::{TimeEntry, TimeEntryStatus};
use crate::service::overtime::OvertimeCalculationService;
use crate::store::{DirectoryStore, NewPayPeriod, PayPeriodStore, TimeEntryStore};

/// Per-employee rollup of a pay period, ready for payroll export.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmployeePeriodHours {
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "john.doe@company.com")]
    pub email: String,
    pub entry_count: u64,
    #[schema(example = 80.0)]
    pub total_hours: f64,
    #[schema(example = 76.5)]
    pub regular_hours: f64,
    #[schema(example = 3.5)]
    pub overtime_hours: f64,
    #[schema(example = 0.0)]
    pub double_time_hours: f64,
}

/// One aggregate pass over every entry in a period, regardless of status.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct PeriodSummary {
    pub total_entries: u64,
    pub approved_entries: u64,
    pub pending_entries: u64,
    pub exported_entries: u64,
    pub not_exported_entries: u64,
    pub total_hours: f64,
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub unique_employees: u64,
}

fn hours(minutes: i64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    first
        .checked_add_months(Months::new(1))
        .map(|next| next - Duration::days(1))
        .unwrap_or(date)
}

/// Deterministic partition of `[start, end]` into consecutive period ranges.
/// Weekly and biweekly spans are fixed-length; monthly spans snap to
/// calendar month ends. The final span is clamped to `end`.
pub fn partition_range(
    start: NaiveDate,
    end: NaiveDate,
    frequency: PayFrequency,
) -> Vec<(NaiveDate, NaiveDate)> {
    let mut ranges = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let period_end = match frequency {
            PayFrequency::Weekly => cursor + Duration::days(6),
            PayFrequency::Biweekly => cursor + Duration::days(13),
            PayFrequency::Monthly => last_day_of_month(cursor),
        };
        let period_end = period_end.min(end);
        ranges.push((cursor, period_end));
        cursor = period_end + Duration::days(1);
    }
    ranges
}

#[derive(Clone)]
pub struct PayrollTimeCalculationService {
    entries: Arc<dyn TimeEntryStore>,
    periods: Arc<dyn PayPeriodStore>,
    directory: Arc<dyn DirectoryStore>,
    events: Arc<dyn EventSink>,
    overtime: OvertimeCalculationService,
}

impl PayrollTimeCalculationService {
    pub fn new(
        entries: Arc<dyn TimeEntryStore>,
        periods: Arc<dyn PayPeriodStore>,
        directory: Arc<dyn DirectoryStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            entries,
            periods,
            directory,
            events,
            overtime: OvertimeCalculationService::new(),
        }
    }

    /// Payroll-ready per-employee totals over the period's approved and paid
    /// entries, re-aggregated week by week so the weekly jurisdiction rules
    /// hold across entry boundaries.
    pub async fn calculate_pay_period_hours(
        &self,
        period: &PayPeriod,
        policy: &TimePolicy,
        employee_filter: Option<u64>,
    ) -> Result<Vec<EmployeePeriodHours>, TimeClockError> {
        let entries = self
            .entries
            .entries_in_range(
                period.company_id,
                period.start_date,
                period.end_date,
                employee_filter,
            )
            .await?;

        let mut by_employee: BTreeMap<u64, Vec<TimeEntry>> = BTreeMap::new();
        for entry in entries.into_iter().filter(|e| {
            matches!(e.status, TimeEntryStatus::Approved | TimeEntryStatus::Paid)
        }) {
            by_employee.entry(entry.employee_id).or_default().push(entry);
        }

        let mut summaries = Vec::with_capacity(by_employee.len());
        for (employee_id, entries) in by_employee {
            let profile = self
                .directory
                .employee(period.company_id, employee_id)
                .await?;
            let (name, email, exempt) = match profile {
                Some(p) => (p.full_name(), p.email.clone(), p.overtime_exempt),
                None => {
                    tracing::warn!(employee_id, "employee missing from directory");
                    (String::new(), String::new(), false)
                }
            };

            let mut total_minutes = 0;
            let mut regular = 0;
            let mut overtime = 0;
            let mut double_time = 0;
            for week in group_by_week(&entries).values() {
                let minutes = self.overtime.calculate_weekly_overtime(week, policy, exempt);
                total_minutes += week.iter().map(|e| e.total_minutes).sum::<i64>();
                regular += minutes.regular;
                overtime += minutes.overtime;
                double_time += minutes.double_time;
            }

            summaries.push(EmployeePeriodHours {
                employee_id,
                name,
                email,
                entry_count: entries.len() as u64,
                total_hours: hours(total_minutes),
                regular_hours: hours(regular),
                overtime_hours: hours(overtime),
                double_time_hours: hours(double_time),
            });
        }
        Ok(summaries)
    }

    /// Approve the period and cascade to its `completed` entries; entries
    /// already approved or paid are untouched. Idempotent.
    pub async fn approve_pay_period(
        &self,
        period: &PayPeriod,
        approver: u64,
    ) -> Result<PayPeriod, TimeClockError> {
        let now = Utc::now();
        let approved = self.periods.set_approved(period.id, approver, now).await?;
        let cascaded = self
            .entries
            .approve_completed_in_range(
                period.company_id,
                period.start_date,
                period.end_date,
                approver,
                now,
            )
            .await?;

        self.events.emit(&TimeClockEvent::PayPeriodApproved {
            pay_period_id: period.id,
            company_id: period.company_id,
            approved_by: approver,
            entries_approved: cascaded,
        });
        Ok(approved)
    }

    /// Flag every approved entry in range as exported under `batch_id` and
    /// flip it to `paid`. Entries exported by an earlier batch are never
    /// re-exported. Returns the number of entries mutated.
    pub async fn mark_as_exported(
        &self,
        period: &PayPeriod,
        batch_id: &str,
    ) -> Result<u64, TimeClockError> {
        let count = self
            .entries
            .mark_exported_in_range(
                period.company_id,
                period.start_date,
                period.end_date,
                batch_id,
                Utc::now(),
            )
            .await?;

        self.events.emit(&TimeClockEvent::EntriesExported {
            pay_period_id: period.id,
            company_id: period.company_id,
            batch_id: batch_id.to_string(),
            count,
        });
        Ok(count)
    }

    /// Partition `[start, end]` into pay periods, inserting the missing ones
    /// with status `open`. Re-invoking with identical arguments creates
    /// nothing new; existing rows are returned in their place.
    pub async fn generate_pay_periods(
        &self,
        company_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        frequency: PayFrequency,
    ) -> Result<Vec<PayPeriod>, TimeClockError> {
        let mut out = Vec::new();
        for (range_start, range_end) in partition_range(start, end, frequency) {
            if let Some(existing) = self
                .periods
                .find_exact(company_id, frequency, range_start, range_end)
                .await?
            {
                out.push(existing);
                continue;
            }

            let new = NewPayPeriod {
                company_id,
                start_date: range_start,
                end_date: range_end,
                frequency,
            };
            match self.periods.insert_open(new).await {
                Ok(period) => out.push(period),
                // A concurrent generator won the insert; take its row.
                Err(TimeClockError::PeriodAlreadyExists) => {
                    if let Some(existing) = self
                        .periods
                        .find_exact(company_id, frequency, range_start, range_end)
                        .await?
                    {
                        out.push(existing);
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }

    /// One aggregate pass over all entries in range regardless of status.
    pub async fn summary_statistics(
        &self,
        period: &PayPeriod,
    ) -> Result<PeriodSummary, TimeClockError> {
        let entries = self
            .entries
            .entries_in_range(period.company_id, period.start_date, period.end_date, None)
            .await?;

        let mut summary = PeriodSummary::default();
        let mut total_minutes = 0;
        let mut regular_minutes = 0;
        let mut overtime_minutes = 0;
        let mut employees = BTreeSet::new();
        for entry in &entries {
            summary.total_entries += 1;
            match entry.status {
                TimeEntryStatus::Approved | TimeEntryStatus::Paid => summary.approved_entries += 1,
                _ => summary.pending_entries += 1,
            }
            if entry.exported_to_payroll {
                summary.exported_entries += 1;
            } else {
                summary.not_exported_entries += 1;
            }
            total_minutes += entry.total_minutes;
            regular_minutes += entry.regular_minutes;
            overtime_minutes += entry.overtime_minutes;
            employees.insert(entry.employee_id);
        }
        summary.total_hours = hours(total_minutes);
        summary.regular_hours = hours(regular_minutes);
        summary.overtime_hours = hours(overtime_minutes);
        summary.unique_employees = employees.len() as u64;
        Ok(summary)
    }

    /// Re-run weekly classification over the period and persist the
    /// reclassified buckets. Paid entries are excluded up front; the store
    /// refuses them besides.
    pub async fn recalculate_pay_period(
        &self,
        period: &PayPeriod,
        policy: &TimePolicy,
    ) -> Result<u64, TimeClockError> {
        let entries = self
            .entries
            .entries_in_range(period.company_id, period.start_date, period.end_date, None)
            .await?;

        let mut by_employee: BTreeMap<u64, Vec<TimeEntry>> = BTreeMap::new();
        for entry in entries.into_iter().filter(|e| {
            matches!(
                e.status,
                TimeEntryStatus::Completed | TimeEntryStatus::Approved
            )
        }) {
            by_employee.entry(entry.employee_id).or_default().push(entry);
        }

        let mut updated = 0;
        for (employee_id, entries) in by_employee {
            let exempt = self
                .directory
                .employee(period.company_id, employee_id)
                .await?
                .map(|p| p.overtime_exempt)
                .unwrap_or(false);

            for week in group_by_week(&entries).values() {
                let mut week = week.clone();
                self.overtime
                    .recalculate_week_entries(&mut week, policy, exempt);
                for entry in &week {
                    self.entries.save_minutes(entry).await?;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}

/// Group one employee's entries by ISO work week.
fn group_by_week(entries: &[TimeEntry]) -> BTreeMap<(i32, u32), Vec<TimeEntry>> {
    let mut weeks: BTreeMap<(i32, u32), Vec<TimeEntry>> = BTreeMap::new();
    for entry in entries {
        let week = entry.clock_in.date_naive().iso_week();
        weeks
            .entry((week.year(), week.week()))
            .or_default()
            .push(entry.clone());
    }
    weeks
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::events::EventSink;
    use crate::model::employee::EmployeeProfile;
    use crate::model::pay_period::PayPeriodStatus;
    use crate::model::policy::OvertimeRule;
    use crate::model::time_entry::EntryType;
    use crate::store::memory::{
        InMemoryDirectoryStore, InMemoryPayPeriodStore, InMemoryTimeEntryStore,
    };

    struct NullSink;

    impl EventSink for NullSink {
        fn emit(&self, _event: &TimeClockEvent) {}
    }

    struct Fixture {
        service: PayrollTimeCalculationService,
        entries: Arc<InMemoryTimeEntryStore>,
        periods: Arc<InMemoryPayPeriodStore>,
        directory: Arc<InMemoryDirectoryStore>,
    }

    fn fixture() -> Fixture {
        let entries = Arc::new(InMemoryTimeEntryStore::new());
        let periods = Arc::new(InMemoryPayPeriodStore::new());
        let directory = Arc::new(InMemoryDirectoryStore::new());
        let service = PayrollTimeCalculationService::new(
            entries.clone(),
            periods.clone(),
            directory.clone(),
            Arc::new(NullSink),
        );
        Fixture {
            service,
            entries,
            periods,
            directory,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry_on(
        employee_id: u64,
        day: NaiveDate,
        minutes: i64,
        status: TimeEntryStatus,
    ) -> TimeEntry {
        let clock_in = Utc
            .with_ymd_and_hms(day.year(), day.month(), day.day(), 9, 0, 0)
            .unwrap();
        TimeEntry {
            id: 0,
            employee_id,
            company_id: 1,
            shift_id: None,
            pay_period_id: None,
            entry_type: EntryType::Clock,
            status,
            clock_in,
            clock_out: Some(clock_in + Duration::minutes(minutes)),
            total_minutes: minutes,
            break_minutes: 0,
            regular_minutes: minutes,
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

    fn profile(employee_id: u64, exempt: bool) -> EmployeeProfile {
        EmployeeProfile {
            id: employee_id,
            company_id: 1,
            first_name: "Jane".to_string(),
            last_name: "Smith".to_string(),
            email: "jane.smith@company.com".to_string(),
            overtime_exempt: exempt,
        }
    }

    #[test]
    fn weekly_partition_covers_the_range() {
        let ranges = partition_range(date(2026, 1, 5), date(2026, 2, 1), PayFrequency::Weekly);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0], (date(2026, 1, 5), date(2026, 1, 11)));
        assert_eq!(ranges[3], (date(2026, 1, 26), date(2026, 2, 1)));
    }

    #[test]
    fn monthly_partition_snaps_to_calendar_months() {
        let ranges = partition_range(date(2026, 1, 15), date(2026, 3, 10), PayFrequency::Monthly);
        assert_eq!(
            ranges,
            vec![
                (date(2026, 1, 15), date(2026, 1, 31)),
                (date(2026, 2, 1), date(2026, 2, 28)),
                (date(2026, 3, 1), date(2026, 3, 10)),
            ]
        );
    }

    #[actix_web::test]
    async fn generating_pay_periods_twice_is_idempotent() {
        let f = fixture();
        let first = f
            .service
            .generate_pay_periods(1, date(2026, 1, 5), date(2026, 2, 1), PayFrequency::Weekly)
            .await
            .unwrap();
        let second = f
            .service
            .generate_pay_periods(1, date(2026, 1, 5), date(2026, 2, 1), PayFrequency::Weekly)
            .await
            .unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 4);
        let first_ids: Vec<u64> = first.iter().map(|p| p.id).collect();
        let second_ids: Vec<u64> = second.iter().map(|p| p.id).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[actix_web::test]
    async fn approval_cascades_to_completed_entries_only() {
        let f = fixture();
        let period = f
            .periods
            .insert_open(NewPayPeriod {
                company_id: 1,
                start_date: date(2026, 1, 5),
                end_date: date(2026, 1, 11),
                frequency: PayFrequency::Weekly,
            })
            .await
            .unwrap();

        let completed =
            f.entries
                .insert_entry(entry_on(1001, date(2026, 1, 5), 480, TimeEntryStatus::Completed));
        let already = f.entries.insert_entry(entry_on(
            1001,
            date(2026, 1, 6),
            480,
            TimeEntryStatus::Approved,
        ));
        let mut paid = entry_on(1001, date(2026, 1, 7), 480, TimeEntryStatus::Paid);
        paid.exported_to_payroll = true;
        let paid = f.entries.insert_entry(paid);

        let approved = f.service.approve_pay_period(&period, 42).await.unwrap();
        assert_eq!(approved.status, PayPeriodStatus::Approved);
        assert_eq!(approved.approved_by, Some(42));

        let after = f
            .entries
            .entries_in_range(1, date(2026, 1, 5), date(2026, 1, 11), None)
            .await
            .unwrap();
        let by_id =
            |id: u64| after.iter().find(|e| e.id == id).cloned().unwrap();
        assert_eq!(by_id(completed.id).status, TimeEntryStatus::Approved);
        assert_eq!(by_id(completed.id).approved_by, Some(42));
        // untouched: approved entry keeps no approver, paid entry stays paid
        assert_eq!(by_id(already.id).approved_by, None);
        assert_eq!(by_id(paid.id).status, TimeEntryStatus::Paid);
    }

    #[actix_web::test]
    async fn export_marks_approved_entries_exactly_once() {
        let f = fixture();
        let period = f
            .periods
            .insert_open(NewPayPeriod {
                company_id: 1,
                start_date: date(2026, 1, 5),
                end_date: date(2026, 1, 11),
                frequency: PayFrequency::Weekly,
            })
            .await
            .unwrap();

        f.entries
            .insert_entry(entry_on(1001, date(2026, 1, 5), 480, TimeEntryStatus::Approved));
        f.entries
            .insert_entry(entry_on(1001, date(2026, 1, 6), 480, TimeEntryStatus::Completed));

        let count = f.service.mark_as_exported(&period, "BATCH-1").await.unwrap();
        assert_eq!(count, 1);

        let entries = f
            .entries
            .entries_in_range(1, date(2026, 1, 5), date(2026, 1, 11), None)
            .await
            .unwrap();
        let exported: Vec<&TimeEntry> =
            entries.iter().filter(|e| e.exported_to_payroll).collect();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].status, TimeEntryStatus::Paid);
        assert_eq!(exported[0].payroll_batch_id.as_deref(), Some("BATCH-1"));

        // already-exported rows are not picked up again
        let again = f.service.mark_as_exported(&period, "BATCH-2").await.unwrap();
        assert_eq!(again, 0);
    }

    #[actix_web::test]
    async fn period_hours_reaggregate_weekly_overtime() {
        let f = fixture();
        f.directory.add_employee(profile(1001, false));
        let period = f
            .periods
            .insert_open(NewPayPeriod {
                company_id: 1,
                start_date: date(2026, 1, 5),
                end_date: date(2026, 1, 11),
                frequency: PayFrequency::Weekly,
            })
            .await
            .unwrap();

        // Six days in one week totalling 44h: 40 regular + 4 overtime.
        for day in 5..=9 {
            f.entries.insert_entry(entry_on(
                1001,
                date(2026, 1, day),
                480,
                TimeEntryStatus::Approved,
            ));
        }
        f.entries
            .insert_entry(entry_on(1001, date(2026, 1, 10), 240, TimeEntryStatus::Approved));
        // pending entries are excluded from payroll hours
        f.entries
            .insert_entry(entry_on(1001, date(2026, 1, 11), 480, TimeEntryStatus::Completed));

        let summaries = f
            .service
            .calculate_pay_period_hours(&period, &TimePolicy::default(), None)
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.name, "Jane Smith");
        assert_eq!(summary.entry_count, 6);
        assert_eq!(summary.total_hours, 44.0);
        assert_eq!(summary.regular_hours, 40.0);
        assert_eq!(summary.overtime_hours, 4.0);
    }

    #[actix_web::test]
    async fn exempt_employee_hours_stay_regular() {
        let f = fixture();
        f.directory.add_employee(profile(1001, true));
        let period = f
            .periods
            .insert_open(NewPayPeriod {
                company_id: 1,
                start_date: date(2026, 1, 5),
                end_date: date(2026, 1, 11),
                frequency: PayFrequency::Weekly,
            })
            .await
            .unwrap();

        // 09:00-22:00: 780 minutes, all regular for exempt staff.
        f.entries
            .insert_entry(entry_on(1001, date(2026, 1, 5), 780, TimeEntryStatus::Approved));

        let summaries = f
            .service
            .calculate_pay_period_hours(&period, &TimePolicy::default(), None)
            .await
            .unwrap();
        assert_eq!(summaries[0].regular_hours, 13.0);
        assert_eq!(summaries[0].overtime_hours, 0.0);
    }

    #[actix_web::test]
    async fn summary_counts_every_status() {
        let f = fixture();
        let period = f
            .periods
            .insert_open(NewPayPeriod {
                company_id: 1,
                start_date: date(2026, 1, 5),
                end_date: date(2026, 1, 11),
                frequency: PayFrequency::Weekly,
            })
            .await
            .unwrap();

        f.entries
            .insert_entry(entry_on(1001, date(2026, 1, 5), 480, TimeEntryStatus::Approved));
        f.entries
            .insert_entry(entry_on(1002, date(2026, 1, 6), 480, TimeEntryStatus::Completed));
        let mut paid = entry_on(1003, date(2026, 1, 7), 480, TimeEntryStatus::Paid);
        paid.exported_to_payroll = true;
        f.entries.insert_entry(paid);

        let summary = f.service.summary_statistics(&period).await.unwrap();
        assert_eq!(summary.total_entries, 3);
        assert_eq!(summary.approved_entries, 2);
        assert_eq!(summary.pending_entries, 1);
        assert_eq!(summary.exported_entries, 1);
        assert_eq!(summary.not_exported_entries, 2);
        assert_eq!(summary.unique_employees, 3);
        assert_eq!(summary.total_hours, 24.0);
    }

    #[actix_web::test]
    async fn recalculation_persists_daily_splits() {
        let f = fixture();
        f.directory.add_employee(profile(1001, false));
        let period = f
            .periods
            .insert_open(NewPayPeriod {
                company_id: 1,
                start_date: date(2026, 1, 5),
                end_date: date(2026, 1, 11),
                frequency: PayFrequency::Weekly,
            })
            .await
            .unwrap();

        // A 13-hour day under the california rule.
        f.entries
            .insert_entry(entry_on(1001, date(2026, 1, 5), 780, TimeEntryStatus::Approved));
        let policy = TimePolicy {
            overtime_rule: OvertimeRule::California,
            ..TimePolicy::default()
        };

        let updated = f.service.recalculate_pay_period(&period, &policy).await.unwrap();
        assert_eq!(updated, 1);

        let entries = f
            .entries
            .entries_in_range(1, date(2026, 1, 5), date(2026, 1, 11), None)
            .await
            .unwrap();
        assert_eq!(entries[0].regular_minutes, 480);
        assert_eq!(entries[0].overtime_minutes, 240);
        assert_eq!(entries[0].double_time_minutes, 60);
    }
}
