pub mod overtime;
pub mod payroll_time;
pub mod time_clock;
