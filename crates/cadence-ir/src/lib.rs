//! Cadence circuit intermediate representation.
//!
//! The core data structures consumed by the `cadence-compile` passes:
//!
//! - **Wires**: [`QubitId`], [`ClbitId`], [`WireId`]
//! - **Gates**: [`StandardGate`], [`CustomGate`], with optional control state
//! - **Parameters**: [`ParameterExpression`], symbolic angles and phases
//! - **Instructions**: [`Instruction`], including delays and structured
//!   [`ControlFlow`] with nested [`Block`] bodies
//! - **DAG**: [`CircuitDag`], a stable-index graph with one edge per wire
//!   between consecutive operations
//! - **Circuit**: [`Circuit`], a builder over the DAG
//!
//! # Example
//!
//! ```rust
//! use cadence_ir::{Circuit, QubitId};
//!
//! let mut circuit = Circuit::with_size("bell", 2, 0);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//!
//! let dag = circuit.into_dag();
//! assert_eq!(dag.num_ops(), 2);
//! assert_eq!(dag.depth(), 2);
//! ```

pub mod circuit;
pub mod control_flow;
pub mod dag;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod parameter;
pub mod qubit;

pub use circuit::Circuit;
pub use control_flow::{Block, Condition, ControlFlow};
pub use dag::{CircuitDag, DagEdge, DagNode, NodeIndex, WireId};
pub use error::{IrError, IrResult};
pub use gate::{CustomGate, Gate, GateKind, StandardGate};
pub use instruction::{Instruction, InstructionKind};
pub use parameter::ParameterExpression;
pub use qubit::{ClbitId, QubitId};
