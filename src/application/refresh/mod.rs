//! Scheduled and on-demand refresh of stale records.

mod schedule;
mod scheduler;

pub use schedule::{next_wake, WeeklyAnchor};
pub use scheduler::{
    RefreshReport, RefreshScheduler, RefreshSettings, SchedulerState, SchedulerStatus,
};
