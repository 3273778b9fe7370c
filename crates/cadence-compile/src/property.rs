//! `PropertySet` and related types for pass communication.
//!
//! Analysis passes write their results here and later passes read them.
//! The two standard analyses, the [`Schedule`] and the dependency graph,
//! have dedicated fields; anything else goes into the type-keyed custom
//! storage.
//!
//! # Examples
//!
//! ```
//! use cadence_compile::PropertySet;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct PaddingStats {
//!     intervals: usize,
//! }
//!
//! let mut props = PropertySet::new();
//! props.insert(PaddingStats { intervals: 4 });
//!
//! let stats = props.get::<PaddingStats>().unwrap();
//! assert_eq!(stats.intervals, 4);
//! ```

use std::any::{Any, TypeId};
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::dependency::DagDependency;
use crate::passes::scheduling::Schedule;

/// Names of the standard properties, used to declare pass prerequisites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKey {
    /// Start times of every operation, see [`Schedule`].
    Schedule,
    /// Commutation-aware dependency graph, see [`DagDependency`].
    DependencyGraph,
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Schedule => write!(f, "schedule"),
            PropertyKey::DependencyGraph => write!(f, "dependency_graph"),
        }
    }
}

/// Properties shared between compilation passes.
///
/// | Field | Producer | Consumers |
/// |-------|----------|-----------|
/// | `schedule` | `ScheduleAnalysis` | `PadDynamicalDecoupling` |
/// | `dependency_graph` | `BuildDependencyGraph` | `LinearizeDependencyGraph` |
#[derive(Debug, Default)]
pub struct PropertySet {
    /// Operation start times. Cleared by any pass that moves or inserts
    /// operations.
    pub schedule: Option<Schedule>,

    /// Dependency graph of the current DAG.
    pub dependency_graph: Option<DagDependency>,

    /// Custom properties storage (type-erased).
    custom: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PropertySet {
    /// Create a new empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Whether a standard property is present.
    pub fn contains(&self, key: PropertyKey) -> bool {
        match key {
            PropertyKey::Schedule => self.schedule.is_some(),
            PropertyKey::DependencyGraph => self.dependency_graph.is_some(),
        }
    }

    /// Drop a standard property.
    pub fn invalidate(&mut self, key: PropertyKey) {
        match key {
            PropertyKey::Schedule => self.schedule = None,
            PropertyKey::DependencyGraph => self.dependency_graph = None,
        }
    }

    /// Insert a custom property.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.custom.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a custom property.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.custom
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Get a mutable custom property.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.custom
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Remove a custom property.
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.custom
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }
}
