use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Jurisdiction selecting the weekly overtime rule. Unknown stored values
/// resolve to `Federal` at policy load time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OvertimeRule {
    Federal,
    California,
}

impl OvertimeRule {
    pub fn from_code(code: &str) -> Self {
        code.parse().unwrap_or(OvertimeRule::Federal)
    }
}

/// Resolved time & attendance configuration for one company.
///
/// Built once per operation by the policy store; services never reach into
/// a settings table themselves.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimePolicy {
    /// Minute grid clock timestamps snap to; 0 disables rounding.
    #[schema(example = 15)]
    pub round_to_minutes: u32,

    pub auto_deduct_breaks: bool,
    #[schema(example = 360)]
    pub break_threshold_minutes: i64,
    #[schema(example = 30)]
    pub required_break_minutes: i64,

    pub require_approval: bool,
    /// Entries at or below this many hours are auto-approved on clock-out.
    #[schema(example = 8.0)]
    pub approval_threshold_hours: f64,

    pub overtime_rule: OvertimeRule,
    /// Federal rule only; weekly minutes beyond this become double time.
    pub double_time_threshold_minutes: Option<i64>,

    pub require_gps: bool,
    /// Exact IPv4 addresses or CIDR blocks; empty list allows any address.
    #[schema(example = json!(["203.0.113.7", "10.0.0.0/8"]))]
    pub allowed_ips: Vec<String>,

    /// Entries left in progress this long are force-closed by the reconciler.
    #[schema(example = 16)]
    pub auto_clock_out_hours: i64,
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self {
            round_to_minutes: 0,
            auto_deduct_breaks: false,
            break_threshold_minutes: 360,
            required_break_minutes: 30,
            require_approval: false,
            approval_threshold_hours: 12.0,
            overtime_rule: OvertimeRule::Federal,
            double_time_threshold_minutes: None,
            require_gps: false,
            allowed_ips: Vec::new(),
            auto_clock_out_hours: 16,
        }
    }
}
