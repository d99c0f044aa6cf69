pub mod calendar;
pub mod check;

pub use calendar::{run_calendar, CalendarOptions, DEFAULT_API_URL};
pub use check::{run_check, CheckOptions, OutputFormat};
