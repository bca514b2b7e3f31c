use crate::api::pay_period::{ExportRequest, GeneratePeriods, HoursQuery};
use crate::api::time_clock::{ClockInRequest, ClockOutRequest};
use crate::model::employee::EmployeeProfile;
use crate::model::pay_period::{PayFrequency, PayPeriod, PayPeriodStatus};
use crate::model::policy::{OvertimeRule, TimePolicy};
use crate::model::time_entry::{ClockContext, EntryType, TimeEntry, TimeEntryStatus};
use crate::service::payroll_time::{EmployeePeriodHours, PeriodSummary};
use crate::service::time_clock::{ClockInValidation, ReconcileOutcome, ReconcileStatus};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Time & Attendance API",
        version = "1.0.0",
        description = r#"
## Time & Attendance Service

Clock-in/out capture with payroll-grade overtime classification and
pay-period lifecycle management.

### Key Features
- **Time clock**
  - Clock in/out with rounding, GPS/IP policy checks and break deduction
  - Pre-flight validation listing every failing rule at once
  - Automatic reconciliation of stale entries
- **Overtime**
  - Federal and California-style weekly classification
  - Regular / overtime / double-time minute buckets per entry
- **Pay periods**
  - Idempotent generation (weekly, biweekly, monthly)
  - Approval cascade and payroll export marking
  - Per-employee hour reports and aggregate statistics

### Identity
Requests are authenticated by the upstream gateway, which injects trusted
`X-Auth-*` identity headers.

### Response Format
- JSON-based RESTful responses

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::time_clock::clock_in,
        crate::api::time_clock::clock_out,
        crate::api::time_clock::active_entry,
        crate::api::time_clock::validate,

        crate::api::pay_period::generate,
        crate::api::pay_period::approve,
        crate::api::pay_period::export,
        crate::api::pay_period::recalculate,
        crate::api::pay_period::hours,
        crate::api::pay_period::summary
    ),
    components(
        schemas(
            ClockInRequest,
            ClockOutRequest,
            ClockContext,
            ClockInValidation,
            ReconcileOutcome,
            ReconcileStatus,
            TimeEntry,
            TimeEntryStatus,
            EntryType,
            EmployeeProfile,
            TimePolicy,
            OvertimeRule,
            GeneratePeriods,
            ExportRequest,
            HoursQuery,
            PayPeriod,
            PayPeriodStatus,
            PayFrequency,
            EmployeePeriodHours,
            PeriodSummary
        )
    ),
    tags(
        (name = "Time clock", description = "Clock-in/out APIs"),
        (name = "Pay periods", description = "Pay period lifecycle APIs"),
    )
)]
pub struct ApiDoc;
