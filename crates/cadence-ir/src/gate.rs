//! Gate definitions.
//!
//! A [`Gate`] is a unitary operation: either one of the [`StandardGate`]s,
//! whose matrices are known to the compiler, or a [`CustomGate`] that may
//! carry its own matrix. Controlled gates can have open controls through
//! their control state.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::parameter::ParameterExpression;

/// Built-in gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StandardGate {
    /// Identity.
    I,
    /// Pauli-X.
    X,
    /// Pauli-Y.
    Y,
    /// Pauli-Z.
    Z,
    /// Hadamard.
    H,
    /// sqrt(Z).
    S,
    /// S-dagger.
    Sdg,
    /// Fourth root of Z.
    T,
    /// T-dagger.
    Tdg,
    /// sqrt(X).
    SX,
    /// sqrt(X)-dagger.
    SXdg,
    /// Rotation around X.
    Rx(ParameterExpression),
    /// Rotation around Y.
    Ry(ParameterExpression),
    /// Rotation around Z.
    Rz(ParameterExpression),
    /// Phase gate.
    P(ParameterExpression),
    /// U(θ, φ, λ).
    U(
        ParameterExpression,
        ParameterExpression,
        ParameterExpression,
    ),
    /// Controlled-X.
    CX,
    /// Controlled-Y.
    CY,
    /// Controlled-Z.
    CZ,
    /// Controlled-Hadamard.
    CH,
    /// Controlled phase.
    CP(ParameterExpression),
    /// Controlled Z rotation.
    CRz(ParameterExpression),
    /// SWAP.
    Swap,
    /// ZZ rotation.
    RZZ(ParameterExpression),
    /// Toffoli.
    CCX,
    /// Fredkin.
    CSwap,
}

impl StandardGate {
    /// Lower-case gate name, as used in duration tables.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::T => "t",
            StandardGate::Tdg => "tdg",
            StandardGate::SX => "sx",
            StandardGate::SXdg => "sxdg",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::P(_) => "p",
            StandardGate::U(..) => "u",
            StandardGate::CX => "cx",
            StandardGate::CY => "cy",
            StandardGate::CZ => "cz",
            StandardGate::CH => "ch",
            StandardGate::CP(_) => "cp",
            StandardGate::CRz(_) => "crz",
            StandardGate::Swap => "swap",
            StandardGate::RZZ(_) => "rzz",
            StandardGate::CCX => "ccx",
            StandardGate::CSwap => "cswap",
        }
    }

    /// Number of qubits the gate acts on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            StandardGate::CX
            | StandardGate::CY
            | StandardGate::CZ
            | StandardGate::CH
            | StandardGate::CP(_)
            | StandardGate::CRz(_)
            | StandardGate::Swap
            | StandardGate::RZZ(_) => 2,
            StandardGate::CCX | StandardGate::CSwap => 3,
            _ => 1,
        }
    }

    /// Number of leading control qubits.
    #[inline]
    pub fn num_ctrl_qubits(&self) -> u32 {
        match self {
            StandardGate::CX
            | StandardGate::CY
            | StandardGate::CZ
            | StandardGate::CH
            | StandardGate::CP(_)
            | StandardGate::CRz(_)
            | StandardGate::CSwap => 1,
            StandardGate::CCX => 2,
            _ => 0,
        }
    }

    /// Gate parameters in declaration order.
    pub fn parameters(&self) -> Vec<&ParameterExpression> {
        match self {
            StandardGate::Rx(p)
            | StandardGate::Ry(p)
            | StandardGate::Rz(p)
            | StandardGate::P(p)
            | StandardGate::CP(p)
            | StandardGate::CRz(p)
            | StandardGate::RZZ(p) => vec![p],
            StandardGate::U(a, b, c) => vec![a, b, c],
            _ => vec![],
        }
    }

    /// Whether any parameter is still symbolic.
    pub fn is_parameterized(&self) -> bool {
        self.parameters().iter().any(|p| p.is_symbolic())
    }
}

/// Standard or custom gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateKind {
    /// A built-in gate.
    Standard(StandardGate),
    /// A user-defined gate.
    Custom(CustomGate),
}

impl GateKind {
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            GateKind::Standard(g) => g.name(),
            GateKind::Custom(g) => &g.name,
        }
    }

    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            GateKind::Standard(g) => g.num_qubits(),
            GateKind::Custom(g) => g.num_qubits,
        }
    }

    /// Parameters, standard or custom.
    pub fn parameters(&self) -> Vec<&ParameterExpression> {
        match self {
            GateKind::Standard(g) => g.parameters(),
            GateKind::Custom(g) => g.params.iter().collect(),
        }
    }
}

/// A user-defined gate, optionally with an explicit unitary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomGate {
    pub name: String,
    pub num_qubits: u32,
    #[serde(default)]
    pub params: Vec<ParameterExpression>,
    /// Row-major `2^n x 2^n` unitary; qubit 0 is the least significant bit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Vec<Complex64>>,
}

impl CustomGate {
    pub fn new(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            params: vec![],
            matrix: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<ParameterExpression>) -> Self {
        self.params = params;
        self
    }

    /// Attach an explicit unitary.
    pub fn with_matrix(mut self, matrix: Vec<Complex64>) -> IrResult<Self> {
        let dim = 1usize << self.num_qubits;
        if matrix.len() != dim * dim {
            return Err(IrError::InvalidMatrix {
                gate_name: self.name,
                expected: dim * dim,
                got: matrix.len(),
            });
        }
        self.matrix = Some(matrix);
        Ok(self)
    }
}

/// A gate together with its presentation and control metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub kind: GateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Control state as an integer, bit `i` for control `i`. `None` means
    /// every control is closed (all ones).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctrl_state: Option<u32>,
}

impl Gate {
    pub fn standard(gate: StandardGate) -> Self {
        Self {
            kind: GateKind::Standard(gate),
            label: None,
            ctrl_state: None,
        }
    }

    pub fn custom(gate: CustomGate) -> Self {
        Self {
            kind: GateKind::Custom(gate),
            label: None,
            ctrl_state: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the control state. Only meaningful for controlled standard gates.
    pub fn with_ctrl_state(mut self, state: u32) -> IrResult<Self> {
        let num_ctrl_qubits = self.num_ctrl_qubits();
        if num_ctrl_qubits == 0 || state >= (1 << num_ctrl_qubits) {
            return Err(IrError::InvalidCtrlState {
                gate_name: self.name().to_string(),
                state,
                num_ctrl_qubits,
            });
        }
        self.ctrl_state = Some(state);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn num_qubits(&self) -> u32 {
        self.kind.num_qubits()
    }

    pub fn num_ctrl_qubits(&self) -> u32 {
        match &self.kind {
            GateKind::Standard(g) => g.num_ctrl_qubits(),
            GateKind::Custom(_) => 0,
        }
    }

    /// The control state with the closed-control default filled in.
    pub fn effective_ctrl_state(&self) -> u32 {
        let all_closed = (1u32 << self.num_ctrl_qubits()) - 1;
        self.ctrl_state.unwrap_or(all_closed)
    }

    /// Whether any parameter is still symbolic.
    pub fn is_parameterized(&self) -> bool {
        self.kind.parameters().iter().any(|p| p.is_symbolic())
    }

    /// Whether two gates denote the same operation.
    ///
    /// Names, arity and control state must match exactly. Numeric parameters
    /// are compared within `tolerance`, symbolic ones structurally. Labels
    /// are ignored.
    pub fn same_operation(&self, other: &Gate, tolerance: f64) -> bool {
        if self.name() != other.name()
            || self.num_qubits() != other.num_qubits()
            || self.effective_ctrl_state() != other.effective_ctrl_state()
        {
            return false;
        }
        let (lhs, rhs) = (self.kind.parameters(), other.kind.parameters());
        if lhs.len() != rhs.len() {
            return false;
        }
        if !lhs.iter().zip(&rhs).all(|(a, b)| a.approx_eq(b, tolerance)) {
            return false;
        }
        match (&self.kind, &other.kind) {
            (GateKind::Custom(a), GateKind::Custom(b)) => a.matrix == b.matrix,
            _ => true,
        }
    }
}

impl From<StandardGate> for Gate {
    fn from(gate: StandardGate) -> Self {
        Gate::standard(gate)
    }
}

impl From<CustomGate> for Gate {
    fn from(gate: CustomGate) -> Self {
        Gate::custom(gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_standard_gate_properties() {
        assert_eq!(StandardGate::H.num_qubits(), 1);
        assert_eq!(StandardGate::CX.num_qubits(), 2);
        assert_eq!(StandardGate::CCX.num_qubits(), 3);
        assert_eq!(StandardGate::CCX.num_ctrl_qubits(), 2);
        assert_eq!(StandardGate::Swap.num_ctrl_qubits(), 0);

        assert!(!StandardGate::Rx(ParameterExpression::constant(PI)).is_parameterized());
        assert!(StandardGate::Rx(ParameterExpression::symbol("theta")).is_parameterized());
    }

    #[test]
    fn test_ctrl_state() {
        let cx = Gate::standard(StandardGate::CX);
        assert_eq!(cx.effective_ctrl_state(), 1);

        let open = Gate::standard(StandardGate::CX).with_ctrl_state(0).unwrap();
        assert_eq!(open.effective_ctrl_state(), 0);
        assert!(!cx.same_operation(&open, 1e-9));

        let explicit = Gate::standard(StandardGate::CX).with_ctrl_state(1).unwrap();
        assert!(cx.same_operation(&explicit, 1e-9));

        assert!(Gate::standard(StandardGate::H).with_ctrl_state(0).is_err());
        assert!(Gate::standard(StandardGate::CX).with_ctrl_state(2).is_err());
    }

    #[test]
    fn test_same_operation_parameters() {
        let a = Gate::standard(StandardGate::Rz(ParameterExpression::constant(0.5)));
        let b = Gate::standard(StandardGate::Rz(ParameterExpression::constant(0.5 + 1e-13)));
        let c = Gate::standard(StandardGate::Rz(ParameterExpression::constant(0.6)));
        assert!(a.same_operation(&b, 1e-9));
        assert!(!a.same_operation(&c, 1e-9));

        let s = Gate::standard(StandardGate::Rz(ParameterExpression::symbol("t")));
        assert!(s.same_operation(&s.clone().with_label("other"), 1e-9));
        assert!(!s.same_operation(&a, 1e-9));
    }

    #[test]
    fn test_custom_matrix_size() {
        let one = Complex64::new(1.0, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        assert!(CustomGate::new("g", 1).with_matrix(vec![one, zero, zero, one]).is_ok());
        assert!(CustomGate::new("g", 1).with_matrix(vec![one]).is_err());
    }
}
