//! Error types for the compilation crate.

use thiserror::Error;

use cadence_ir::QubitId;

use crate::property::PropertyKey;

/// Errors raised while configuring or running passes.
///
/// Configuration errors are raised when a pass is constructed; precondition
/// errors when a pass is run on input it cannot handle; structural errors
/// when the program violates a hardware constraint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] cadence_ir::IrError),

    /// Invalid pass configuration.
    #[error("Invalid pass configuration: {0}")]
    InvalidConfiguration(String),

    /// Malformed inverse-cancellation rule.
    #[error("Invalid cancellation rule {rule}: {reason}")]
    InvalidCancellationRule { rule: String, reason: String },

    /// Echo sequence does not compose to the identity.
    #[error("Dynamical decoupling sequence [{sequence}] is not the identity up to global phase")]
    NonIdentitySequence { sequence: String },

    /// Echo gate not available on the target at all.
    #[error("Echo gate '{gate}' is not supported by the target")]
    UnsupportedEchoGate { gate: String },

    /// A pass ran without a property it requires.
    #[error("Pass '{pass}' requires property {property:?}, which no earlier pass provides")]
    MissingProperty { pass: String, property: PropertyKey },

    /// Operation without a usable duration.
    #[error("No duration for '{name}' on qubits {qubits:?}")]
    MissingDuration { name: String, qubits: Vec<QubitId> },

    /// Operation missing from the schedule.
    #[error("Operation '{name}' was not scheduled; rerun scheduling after modifying the circuit")]
    UnscheduledNode { name: String },

    /// Idle interval is not a multiple of the pulse alignment.
    #[error(
        "Idle interval of {duration} on {qubit} between '{after}' and '{before}' is not a multiple of the pulse alignment {alignment}"
    )]
    Misaligned {
        qubit: QubitId,
        duration: u64,
        alignment: u64,
        after: String,
        before: String,
    },

    /// Echo gate duration is not a multiple of the pulse alignment.
    #[error(
        "Duration {duration} of echo gate '{gate}' on {qubit} is not a multiple of the pulse alignment {alignment}"
    )]
    UnalignedEchoDuration {
        gate: String,
        qubit: QubitId,
        duration: u64,
        alignment: u64,
    },

    /// Configuration document could not be parsed.
    #[error("Invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),

    /// Pass execution failed.
    #[error("Pass '{name}' failed: {reason}")]
    PassFailed { name: String, reason: String },
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
