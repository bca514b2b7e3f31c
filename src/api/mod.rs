pub mod pay_period;
pub mod time_clock;

use std::sync::Arc;

use crate::service::payroll_time::PayrollTimeCalculationService;
use crate::service::time_clock::TimeClockService;
use crate::store::{PayPeriodStore, PolicyStore};

/// Shared handler state: the two stateful services plus the stores the
/// handlers read directly.
#[derive(Clone)]
pub struct AppState {
    pub time_clock: TimeClockService,
    pub payroll: PayrollTimeCalculationService,
    pub policies: Arc<dyn PolicyStore>,
    pub periods: Arc<dyn PayPeriodStore>,
}
