//! Target-agnostic compilation passes.
//!
//! These passes only look at the DAG structure and the gates' matrices;
//! they never consult a duration model.

pub mod cancellation;
pub mod dependency;
pub mod integrity;

pub use cancellation::{CancellationRule, InverseCancellation};
pub use dependency::{BuildDependencyGraph, LinearizeDependencyGraph};
pub use integrity::WireIntegrityCheck;
