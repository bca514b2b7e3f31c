//! Minute classification: break deduction, time rounding, and the
//! jurisdictional weekly overtime rules.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::model::policy::{OvertimeRule, TimePolicy};
use crate::model::time_entry::TimeEntry;

/// 40 hours: weekly regular-minute cap in every jurisdiction.
pub const WEEKLY_REGULAR_CAP_MINUTES: i64 = 2400;
/// 8 hours: daily regular cap under the california rule.
pub const DAILY_REGULAR_CAP_MINUTES: i64 = 480;
/// 12 hours: daily double-time boundary under the california rule.
pub const DAILY_DOUBLE_TIME_BOUNDARY_MINUTES: i64 = 720;

/// Per-entry split produced at clock-out, before weekly reclassification.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EntryMinutes {
    pub total: i64,
    pub regular: i64,
    pub overtime: i64,
    pub break_minutes: i64,
}

/// Weekly buckets for one employee.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WeekMinutes {
    pub regular: i64,
    pub overtime: i64,
    pub double_time: i64,
}

/// Snap a timestamp to the nearest multiple of `granularity` minutes past
/// the hour; ties round up, carrying into the next hour. Seconds are
/// discarded. Granularity 0 leaves the timestamp untouched.
pub fn round_time(t: DateTime<Utc>, granularity: u32) -> DateTime<Utc> {
    if granularity == 0 {
        return t;
    }
    let n = granularity as i64;
    let floored =
        t - Duration::seconds(t.second() as i64) - Duration::nanoseconds(t.nanosecond() as i64);
    let minute = floored.minute() as i64;
    let rem = minute % n;
    let delta = if rem * 2 >= n { n - rem } else { -rem };
    floored + Duration::minutes(delta)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OvertimeCalculationService;

impl OvertimeCalculationService {
    pub fn new() -> Self {
        Self
    }

    /// First-pass split for a single entry.
    ///
    /// Both timestamps must be present, otherwise every bucket is zero. The
    /// returned total is net of the break. Weekly overtime is not split here;
    /// regular carries the full net total until the weekly pass reclassifies
    /// it (exempt employees never get reclassified).
    pub fn calculate_entry_minutes(
        &self,
        entry: &TimeEntry,
        policy: &TimePolicy,
    ) -> EntryMinutes {
        let Some(clock_out) = entry.clock_out else {
            return EntryMinutes::default();
        };

        let worked = (clock_out - entry.clock_in).num_minutes().max(0);
        let break_minutes = if policy.auto_deduct_breaks {
            self.calculate_break_minutes(worked, policy)
        } else {
            entry.break_minutes
        };
        let total = (worked - break_minutes).max(0);

        EntryMinutes {
            total,
            regular: total,
            overtime: 0,
            break_minutes,
        }
    }

    /// Break to deduct for a session of `total_minutes` gross minutes.
    pub fn calculate_break_minutes(&self, total_minutes: i64, policy: &TimePolicy) -> i64 {
        if !policy.auto_deduct_breaks || total_minutes < policy.break_threshold_minutes {
            return 0;
        }
        policy.required_break_minutes
    }

    /// Classify one employee's work week into regular, overtime and
    /// double-time buckets under the policy's jurisdiction.
    pub fn calculate_weekly_overtime(
        &self,
        entries: &[TimeEntry],
        policy: &TimePolicy,
        exempt: bool,
    ) -> WeekMinutes {
        let sum: i64 = entries.iter().map(|e| e.total_minutes).sum();
        if exempt {
            return WeekMinutes {
                regular: sum,
                overtime: 0,
                double_time: 0,
            };
        }

        match policy.overtime_rule {
            OvertimeRule::California => self.california_week(entries),
            OvertimeRule::Federal => self.federal_week(sum, policy),
        }
    }

    fn federal_week(&self, sum: i64, policy: &TimePolicy) -> WeekMinutes {
        let regular = sum.min(WEEKLY_REGULAR_CAP_MINUTES);
        let remainder = sum - regular;
        match policy.double_time_threshold_minutes {
            None => WeekMinutes {
                regular,
                overtime: remainder,
                double_time: 0,
            },
            Some(threshold) => {
                let overtime = remainder.min((threshold - regular).max(0));
                WeekMinutes {
                    regular,
                    overtime,
                    double_time: remainder - overtime,
                }
            }
        }
    }

    fn california_week(&self, entries: &[TimeEntry]) -> WeekMinutes {
        let mut week = WeekMinutes::default();
        for entry in entries {
            let (regular, overtime, double_time) = daily_split(entry.total_minutes);
            week.regular += regular;
            week.overtime += overtime;
            week.double_time += double_time;
        }
        // The weekly 40h cap applies to the regular bucket only; daily
        // double time stays where the daily rule put it.
        if week.regular > WEEKLY_REGULAR_CAP_MINUTES {
            week.overtime += week.regular - WEEKLY_REGULAR_CAP_MINUTES;
            week.regular = WEEKLY_REGULAR_CAP_MINUTES;
        }
        week
    }

    /// Write weekly buckets back onto the individual entries.
    ///
    /// The california rule keeps its per-day split, with any weekly-cap
    /// excess moved out of regular by largest-remainder proportional
    /// allocation; the federal weekly buckets are attributed to entries the
    /// same way. Paid entries are left untouched and excluded from the
    /// write-back (their stored minutes stand).
    pub fn recalculate_week_entries(
        &self,
        entries: &mut [TimeEntry],
        policy: &TimePolicy,
        exempt: bool,
    ) -> WeekMinutes {
        let week = self.calculate_weekly_overtime(entries, policy, exempt);

        if exempt {
            for entry in entries.iter_mut().filter(|e| !e.is_locked()) {
                entry.regular_minutes = entry.total_minutes;
                entry.overtime_minutes = 0;
                entry.double_time_minutes = 0;
            }
            return week;
        }

        match policy.overtime_rule {
            OvertimeRule::California => {
                let mut regulars: Vec<i64> = Vec::with_capacity(entries.len());
                let mut overtimes: Vec<i64> = Vec::with_capacity(entries.len());
                let mut doubles: Vec<i64> = Vec::with_capacity(entries.len());
                for entry in entries.iter() {
                    let (r, o, d) = daily_split(entry.total_minutes);
                    regulars.push(r);
                    overtimes.push(o);
                    doubles.push(d);
                }
                let summed_regular: i64 = regulars.iter().sum();
                let excess = (summed_regular - WEEKLY_REGULAR_CAP_MINUTES).max(0);
                let cuts = allocate_proportionally(excess, &regulars);
                for (i, entry) in entries.iter_mut().enumerate() {
                    if entry.is_locked() {
                        continue;
                    }
                    entry.regular_minutes = regulars[i] - cuts[i];
                    entry.overtime_minutes = overtimes[i] + cuts[i];
                    entry.double_time_minutes = doubles[i];
                }
            }
            OvertimeRule::Federal => {
                let totals: Vec<i64> = entries.iter().map(|e| e.total_minutes).collect();
                let regular_shares = allocate_proportionally(week.regular, &totals);
                let remainders: Vec<i64> = totals
                    .iter()
                    .zip(&regular_shares)
                    .map(|(t, r)| t - r)
                    .collect();
                let double_shares = allocate_proportionally(week.double_time, &remainders);
                for (i, entry) in entries.iter_mut().enumerate() {
                    if entry.is_locked() {
                        continue;
                    }
                    entry.regular_minutes = regular_shares[i];
                    entry.double_time_minutes = double_shares[i];
                    entry.overtime_minutes = totals[i] - regular_shares[i] - double_shares[i];
                }
            }
        }
        week
    }

    /// Rounding helper re-exported on the service for callers that snap
    /// timestamps before classification.
    pub fn round_time(&self, t: DateTime<Utc>, granularity: u32) -> DateTime<Utc> {
        round_time(t, granularity)
    }
}

/// California daily split: 8h regular, 8-12h overtime, beyond 12h double.
fn daily_split(total: i64) -> (i64, i64, i64) {
    let regular = total.min(DAILY_REGULAR_CAP_MINUTES);
    let overtime = (total - DAILY_REGULAR_CAP_MINUTES)
        .clamp(0, DAILY_DOUBLE_TIME_BOUNDARY_MINUTES - DAILY_REGULAR_CAP_MINUTES);
    let double_time = (total - DAILY_DOUBLE_TIME_BOUNDARY_MINUTES).max(0);
    (regular, overtime, double_time)
}

/// Split `amount` across slots proportionally to `weights` using the
/// largest-remainder method. Quotas never exceed their weight, the result
/// sums to `amount` exactly (given `amount <= sum(weights)`), and ties are
/// broken by slot order, so the distribution is deterministic.
fn allocate_proportionally(amount: i64, weights: &[i64]) -> Vec<i64> {
    let total: i64 = weights.iter().sum();
    if amount <= 0 || total <= 0 {
        return vec![0; weights.len()];
    }

    let mut shares: Vec<i64> = weights.iter().map(|w| amount * w / total).collect();
    let mut leftover = amount - shares.iter().sum::<i64>();

    let mut by_fraction: Vec<(usize, i64)> = weights
        .iter()
        .enumerate()
        .map(|(i, w)| (i, (amount * w) % total))
        .collect();
    by_fraction.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    for (i, fraction) in by_fraction {
        if leftover == 0 {
            break;
        }
        if fraction > 0 && shares[i] < weights[i] {
            shares[i] += 1;
            leftover -= 1;
        }
    }
    shares
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::time_entry::{EntryType, TimeEntryStatus};

    fn entry_with_minutes(total: i64) -> TimeEntry {
        let clock_in = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        TimeEntry {
            id: 0,
            employee_id: 1001,
            company_id: 1,
            shift_id: None,
            pay_period_id: None,
            entry_type: EntryType::Clock,
            status: TimeEntryStatus::Completed,
            clock_in,
            clock_out: Some(clock_in + Duration::minutes(total)),
            total_minutes: total,
            break_minutes: 0,
            regular_minutes: total,
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

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, h, m, 0).unwrap()
    }

    #[test]
    fn round_time_snaps_down_below_the_midpoint() {
        assert_eq!(round_time(at(9, 7), 15), at(9, 0));
    }

    #[test]
    fn round_time_snaps_up_from_the_midpoint() {
        assert_eq!(round_time(at(9, 8), 15), at(9, 15));
        // Exact midpoint of a 10-minute grid rounds up.
        assert_eq!(round_time(at(9, 5), 10), at(9, 10));
    }

    #[test]
    fn round_time_carries_into_the_next_hour() {
        assert_eq!(round_time(at(9, 55), 15), at(10, 0));
    }

    #[test]
    fn round_time_zero_granularity_is_a_no_op() {
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 9, 7, 42).unwrap();
        assert_eq!(round_time(t, 0), t);
    }

    #[test]
    fn round_time_discards_seconds() {
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 9, 7, 59).unwrap();
        assert_eq!(round_time(t, 15), at(9, 0));
    }

    #[test]
    fn eight_hour_entry_without_break_is_480_minutes() {
        let service = OvertimeCalculationService::new();
        let mut entry = entry_with_minutes(0);
        entry.clock_in = at(9, 0);
        entry.clock_out = Some(at(17, 0));

        let minutes = service.calculate_entry_minutes(&entry, &TimePolicy::default());
        assert_eq!(minutes.total, 480);
        assert_eq!(minutes.regular, 480);
        assert_eq!(minutes.break_minutes, 0);
    }

    #[test]
    fn open_entry_yields_all_zeroes() {
        let service = OvertimeCalculationService::new();
        let mut entry = entry_with_minutes(480);
        entry.clock_out = None;

        let minutes = service.calculate_entry_minutes(&entry, &TimePolicy::default());
        assert_eq!(minutes, EntryMinutes::default());
    }

    #[test]
    fn auto_deducted_break_comes_off_the_total() {
        let service = OvertimeCalculationService::new();
        let policy = TimePolicy {
            auto_deduct_breaks: true,
            break_threshold_minutes: 360,
            required_break_minutes: 30,
            ..TimePolicy::default()
        };

        let mut entry = entry_with_minutes(0);
        entry.clock_in = at(9, 0);
        entry.clock_out = Some(at(17, 0));
        let minutes = service.calculate_entry_minutes(&entry, &policy);
        assert_eq!(minutes.break_minutes, 30);
        assert_eq!(minutes.total, 450);
    }

    #[test]
    fn short_entry_stays_below_the_break_threshold() {
        let service = OvertimeCalculationService::new();
        let policy = TimePolicy {
            auto_deduct_breaks: true,
            break_threshold_minutes: 360,
            required_break_minutes: 30,
            ..TimePolicy::default()
        };

        let mut entry = entry_with_minutes(0);
        entry.clock_in = at(9, 0);
        entry.clock_out = Some(at(13, 0));
        let minutes = service.calculate_entry_minutes(&entry, &policy);
        assert_eq!(minutes.break_minutes, 0);
        assert_eq!(minutes.total, 240);
    }

    #[test]
    fn manual_break_is_used_when_auto_deduct_is_off() {
        let service = OvertimeCalculationService::new();
        let mut entry = entry_with_minutes(0);
        entry.clock_in = at(9, 0);
        entry.clock_out = Some(at(17, 0));
        entry.break_minutes = 45;

        let minutes = service.calculate_entry_minutes(&entry, &TimePolicy::default());
        assert_eq!(minutes.break_minutes, 45);
        assert_eq!(minutes.total, 435);
    }

    #[test]
    fn exempt_week_is_entirely_regular() {
        let service = OvertimeCalculationService::new();
        // 09:00-22:00 is 780 minutes.
        let entries = vec![entry_with_minutes(780)];
        let week = service.calculate_weekly_overtime(&entries, &TimePolicy::default(), true);
        assert_eq!(week.regular, 780);
        assert_eq!(week.overtime, 0);
        assert_eq!(week.double_time, 0);
    }

    #[test]
    fn federal_week_under_forty_hours_has_no_overtime() {
        let service = OvertimeCalculationService::new();
        let entries = vec![
            entry_with_minutes(480),
            entry_with_minutes(480),
            entry_with_minutes(480),
        ];
        let week = service.calculate_weekly_overtime(&entries, &TimePolicy::default(), false);
        assert_eq!(week.regular, 1440);
        assert_eq!(week.overtime, 0);
    }

    #[test]
    fn federal_week_over_forty_hours_splits_at_2400() {
        let service = OvertimeCalculationService::new();
        // Five full days plus a half day: 2640 minutes.
        let mut entries: Vec<TimeEntry> = (0..5).map(|_| entry_with_minutes(480)).collect();
        entries.push(entry_with_minutes(240));

        let week = service.calculate_weekly_overtime(&entries, &TimePolicy::default(), false);
        assert_eq!(week.regular, 2400);
        assert_eq!(week.overtime, 240);
        assert_eq!(week.double_time, 0);
    }

    #[test]
    fn federal_double_time_threshold_splits_the_remainder() {
        let service = OvertimeCalculationService::new();
        let policy = TimePolicy {
            double_time_threshold_minutes: Some(3600),
            ..TimePolicy::default()
        };
        // 66 hours: 40 regular, 20 overtime, 6 double time.
        let entries = vec![entry_with_minutes(3960)];
        let week = service.calculate_weekly_overtime(&entries, &policy, false);
        assert_eq!(week.regular, 2400);
        assert_eq!(week.overtime, 1200);
        assert_eq!(week.double_time, 360);
    }

    #[test]
    fn california_ten_hour_day() {
        let service = OvertimeCalculationService::new();
        let policy = TimePolicy {
            overtime_rule: OvertimeRule::California,
            ..TimePolicy::default()
        };
        let entries = vec![entry_with_minutes(600)];
        let week = service.calculate_weekly_overtime(&entries, &policy, false);
        assert_eq!(week.regular, 480);
        assert_eq!(week.overtime, 120);
        assert_eq!(week.double_time, 0);
    }

    #[test]
    fn california_thirteen_hour_day() {
        let service = OvertimeCalculationService::new();
        let policy = TimePolicy {
            overtime_rule: OvertimeRule::California,
            ..TimePolicy::default()
        };
        let entries = vec![entry_with_minutes(780)];
        let week = service.calculate_weekly_overtime(&entries, &policy, false);
        assert_eq!(week.regular, 480);
        assert_eq!(week.overtime, 240);
        assert_eq!(week.double_time, 60);
    }

    #[test]
    fn california_weekly_cap_moves_regular_into_overtime() {
        let service = OvertimeCalculationService::new();
        let policy = TimePolicy {
            overtime_rule: OvertimeRule::California,
            ..TimePolicy::default()
        };
        // Six 8h days: 2880 daily-regular minutes, 480 above the weekly cap.
        let entries: Vec<TimeEntry> = (0..6).map(|_| entry_with_minutes(480)).collect();
        let week = service.calculate_weekly_overtime(&entries, &policy, false);
        assert_eq!(week.regular, 2400);
        assert_eq!(week.overtime, 480);
        assert_eq!(week.double_time, 0);
    }

    #[test]
    fn unknown_jurisdiction_code_resolves_to_federal() {
        assert_eq!(OvertimeRule::from_code("texas"), OvertimeRule::Federal);
        assert_eq!(OvertimeRule::from_code("california"), OvertimeRule::California);
    }

    #[test]
    fn proportional_allocation_is_exact_and_capped() {
        let shares = allocate_proportionally(2400, &[480, 480, 480, 480, 480, 240]);
        assert_eq!(shares.iter().sum::<i64>(), 2400);
        for (share, weight) in shares.iter().zip([480, 480, 480, 480, 480, 240]) {
            assert!(*share <= weight);
            assert!(*share > 0);
        }
    }

    #[test]
    fn recalculate_federal_week_keeps_per_entry_sums() {
        let service = OvertimeCalculationService::new();
        let mut entries: Vec<TimeEntry> = (0..5).map(|_| entry_with_minutes(480)).collect();
        entries.push(entry_with_minutes(240));

        let week = service.recalculate_week_entries(&mut entries, &TimePolicy::default(), false);
        assert_eq!(week.regular, 2400);
        assert_eq!(week.overtime, 240);

        let regular: i64 = entries.iter().map(|e| e.regular_minutes).sum();
        let overtime: i64 = entries.iter().map(|e| e.overtime_minutes).sum();
        assert_eq!(regular, 2400);
        assert_eq!(overtime, 240);
        for entry in &entries {
            assert!(entry.regular_minutes > 0);
            assert_eq!(
                entry.regular_minutes + entry.overtime_minutes + entry.double_time_minutes,
                entry.total_minutes
            );
        }
    }

    #[test]
    fn recalculate_california_week_keeps_daily_split() {
        let service = OvertimeCalculationService::new();
        let policy = TimePolicy {
            overtime_rule: OvertimeRule::California,
            ..TimePolicy::default()
        };
        let mut entries = vec![entry_with_minutes(780), entry_with_minutes(480)];

        let week = service.recalculate_week_entries(&mut entries, &policy, false);
        assert_eq!(week.double_time, 60);
        assert_eq!(entries[0].regular_minutes, 480);
        assert_eq!(entries[0].overtime_minutes, 240);
        assert_eq!(entries[0].double_time_minutes, 60);
        assert_eq!(entries[1].regular_minutes, 480);
        assert_eq!(entries[1].overtime_minutes, 0);
    }

    #[test]
    fn recalculate_skips_paid_entries() {
        let service = OvertimeCalculationService::new();
        let mut entries = vec![entry_with_minutes(480), entry_with_minutes(480)];
        entries[0].status = TimeEntryStatus::Paid;
        entries[0].exported_to_payroll = true;
        entries[0].regular_minutes = 123;

        service.recalculate_week_entries(&mut entries, &TimePolicy::default(), false);
        assert_eq!(entries[0].regular_minutes, 123);
        assert_eq!(entries[1].regular_minutes, 480);
    }
}
