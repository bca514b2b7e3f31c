use derive_more::{Display, Error};

/// Domain failures of the time & attendance core.
///
/// Clock state-machine violations fail hard; pre-flight validation reports
/// every broken rule at once instead.
#[derive(Debug, Display, Error)]
pub enum TimeClockError {
    #[display(fmt = "You already have an active time entry")]
    AlreadyActiveEntry,

    #[display(fmt = "Already clocked out")]
    AlreadyClockedOut,

    #[display(fmt = "Clock-in validation failed: {}", "_0.join(\"; \")")]
    ValidationFailed(#[error(not(source))] Vec<String>),

    #[display(fmt = "Time entry has been exported to payroll and is immutable")]
    ExportedEntryImmutable,

    /// Swallowed inside pay-period generation; duplicates are a no-op there.
    #[display(fmt = "Pay period already exists for this range")]
    PeriodAlreadyExists,

    #[display(fmt = "Time entry not found")]
    EntryNotFound,

    #[display(fmt = "Pay period not found")]
    PayPeriodNotFound,

    #[display(fmt = "storage error: {}", _0)]
    Store(sqlx::Error),
}

impl From<sqlx::Error> for TimeClockError {
    fn from(err: sqlx::Error) -> Self {
        TimeClockError::Store(err)
    }
}
