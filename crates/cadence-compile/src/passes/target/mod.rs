//! Timing-aware compilation passes.
//!
//! These passes read instruction durations from a
//! [`DurationModel`](crate::target::DurationModel) and communicate through
//! the schedule stored in the `PropertySet`.

pub mod dynamical_decoupling;
pub mod scheduling;

pub use dynamical_decoupling::{PadDynamicalDecoupling, SlackDistribution};
pub use scheduling::{IdleInterval, Schedule, ScheduleAnalysis, SchedulingPolicy};
