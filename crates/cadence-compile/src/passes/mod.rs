//! Built-in compilation passes.
//!
//! Passes are organized into two categories:
//! - [`agnostic`]: passes that operate purely on DAG structure
//! - [`target`]: passes that need instruction durations

pub mod agnostic;
pub mod target;

pub use agnostic::{cancellation, dependency, integrity};
pub use target::{dynamical_decoupling, scheduling};

pub use agnostic::{
    BuildDependencyGraph, CancellationRule, InverseCancellation, LinearizeDependencyGraph,
    WireIntegrityCheck,
};
pub use target::{
    IdleInterval, PadDynamicalDecoupling, Schedule, ScheduleAnalysis, SchedulingPolicy,
    SlackDistribution,
};
