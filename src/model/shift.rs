use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Reusable schedule template. Read-only input to clock-in association.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Shift {
    #[schema(example = 10)]
    pub id: u64,

    #[schema(example = 1)]
    pub company_id: u64,

    #[schema(example = "Morning")]
    pub name: String,

    #[schema(example = "09:00:00", value_type = String, format = "time")]
    pub start_time: NaiveTime,

    #[schema(example = "17:00:00", value_type = String, format = "time")]
    pub end_time: NaiveTime,

    #[schema(example = 30)]
    pub break_minutes: i64,

    /// Weekday indices, Monday = 0.
    #[schema(value_type = Vec<u8>)]
    pub days_of_week: sqlx::types::Json<Vec<u8>>,

    pub is_active: bool,
}
