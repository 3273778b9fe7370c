//! Cadence compilation passes.
//!
//! This crate transforms a [`CircuitDag`](cadence_ir::CircuitDag) through a
//! sequence of passes that communicate through a [`PropertySet`]. Analyses
//! store their results there (a schedule, a dependency graph); the
//! transformations read them and rewrite the DAG while keeping the
//! program's operator unchanged.
//!
//! # Architecture
//!
//! ```text
//! Input Circuit
//!       |
//!       v
//! +-------------+
//! | PassManager | <-- PropertySet (schedule, dependency graph)
//! +-------------+
//!       |
//!       |-- BuildDependencyGraph / LinearizeDependencyGraph
//!       |-- InverseCancellation
//!       |-- ScheduleAnalysis (ALAP / ASAP)
//!       |-- PadDynamicalDecoupling
//!       '-- WireIntegrityCheck
//!       |
//!       v
//! Output Circuit
//! ```
//!
//! Timing-aware passes read instruction durations from a [`DurationModel`],
//! either a flat [`InstructionDurations`] table or a per-qubit [`Target`].
//!
//! # Example: Dynamical Decoupling
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cadence_compile::{DynamicalDecouplingConfig, InstructionDurations, PassManagerBuilder};
//! use cadence_ir::{Circuit, Gate, StandardGate};
//!
//! let durations = Arc::new(
//!     InstructionDurations::new()
//!         .with_global("h", 50)
//!         .with_global("x", 50)
//!         .with_global("cx", 700),
//! );
//!
//! let pm = PassManagerBuilder::new()
//!     .with_durations(durations)
//!     .with_dynamical_decoupling(DynamicalDecouplingConfig::new(vec![
//!         Gate::standard(StandardGate::X),
//!         Gate::standard(StandardGate::X),
//!     ]))
//!     .build()
//!     .unwrap();
//!
//! let padded = pm.compile(Circuit::ghz(4).unwrap()).unwrap();
//! assert!(padded.dag().count_ops()["x"] > 0);
//! ```
//!
//! # Custom Passes
//!
//! Implement the [`Pass`] trait to create custom compilation passes:
//!
//! ```rust
//! use cadence_compile::{CompileResult, Pass, PassKind, PropertySet};
//! use cadence_ir::CircuitDag;
//!
//! struct CountGates;
//!
//! impl Pass for CountGates {
//!     fn name(&self) -> &str { "count_gates" }
//!     fn kind(&self) -> PassKind { PassKind::Analysis }
//!
//!     fn run(&self, dag: &mut CircuitDag, props: &mut PropertySet) -> CompileResult<()> {
//!         props.insert(dag.num_ops());
//!         Ok(())
//!     }
//! }
//! ```

pub mod commutation;
pub mod dependency;
pub mod error;
pub mod manager;
pub mod operator;
pub mod pass;
pub mod property;
pub mod target;
pub mod unitary;

// Built-in passes
pub mod passes;

pub use commutation::CommutationChecker;
pub use dependency::DagDependency;
pub use error::{CompileError, CompileResult};
pub use manager::{
    CancellationConfig, DynamicalDecouplingConfig, PassManager, PassManagerBuilder,
    PipelineConfig, SchedulingConfig,
};
pub use operator::Operator;
pub use pass::{Pass, PassKind};
pub use property::{PropertyKey, PropertySet};
pub use target::{DurationLookup, DurationModel, InstructionDurations, Target};
pub use unitary::Unitary2x2;
