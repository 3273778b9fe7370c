//! Error types for the IR crate.

use crate::qubit::{ClbitId, QubitId};
use thiserror::Error;

/// Errors raised while building or editing a circuit DAG.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Qubit not present on the DAG.
    #[error("Qubit {qubit} not found in circuit{}", format_op_context(.op_name))]
    QubitNotFound {
        /// The missing qubit.
        qubit: QubitId,
        /// Operation that referenced it, if any.
        op_name: Option<String>,
    },

    /// Classical bit not present on the DAG.
    #[error("Classical bit {clbit} not found in circuit{}", format_op_context(.op_name))]
    ClbitNotFound {
        /// The missing bit.
        clbit: ClbitId,
        /// Operation that referenced it, if any.
        op_name: Option<String>,
    },

    /// The same wire was added twice.
    #[error("Wire {0} already exists in circuit")]
    DuplicateWire(String),

    /// Broken wire structure.
    #[error("Invalid DAG structure: {0}")]
    InvalidDag(String),

    /// Node index does not refer to an operation node.
    #[error("Invalid node index")]
    InvalidNode,

    /// Operation arity does not match its operands.
    #[error("Operation '{op_name}' requires {expected} {wire_kind}, got {got}")]
    ArityMismatch {
        /// Name of the operation.
        op_name: String,
        /// Either "qubits" or "clbits".
        wire_kind: &'static str,
        /// Expected count.
        expected: u32,
        /// Provided count.
        got: u32,
    },

    /// Control state outside the range of the gate's controls.
    #[error("Control state {state} is invalid for gate '{gate_name}' with {num_ctrl_qubits} controls")]
    InvalidCtrlState {
        /// Name of the gate.
        gate_name: String,
        /// Requested control state.
        state: u32,
        /// Number of control qubits of the gate.
        num_ctrl_qubits: u32,
    },

    /// Explicit unitary with the wrong number of entries.
    #[error("Matrix for gate '{gate_name}' has {got} entries, expected {expected}")]
    InvalidMatrix {
        /// Name of the gate.
        gate_name: String,
        /// Expected entry count.
        expected: usize,
        /// Provided entry count.
        got: usize,
    },

    /// Parameter is unbound.
    #[error("Parameter '{0}' is unbound")]
    UnboundParameter(String),

    /// Duplicate qubit in operation.
    #[error("Duplicate qubit {qubit} in operation{}", format_op_context(.op_name))]
    DuplicateQubit {
        /// The duplicate qubit.
        qubit: QubitId,
        /// Operation that referenced it, if any.
        op_name: Option<String>,
    },
}

#[allow(clippy::ref_option)]
fn format_op_context(op_name: &Option<String>) -> String {
    match op_name {
        Some(name) => format!(" (op: {name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
