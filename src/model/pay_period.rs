use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PayFrequency {
    Weekly,
    Biweekly,
    Monthly,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PayPeriodStatus {
    Open,
    Approved,
    Closed,
}

/// Company-scoped date range over which hours are aggregated, approved and
/// exported. Ranges for one (company, frequency) never overlap.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PayPeriod {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1)]
    pub company_id: u64,

    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub start_date: NaiveDate,

    #[schema(example = "2026-01-11", value_type = String, format = "date")]
    pub end_date: NaiveDate,

    pub frequency: PayFrequency,
    pub status: PayPeriodStatus,

    pub approved_by: Option<u64>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub approved_at: Option<DateTime<Utc>>,
}
