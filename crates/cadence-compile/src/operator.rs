//! Dense n-qubit operators.
//!
//! Matrices use little-endian qubit order: the `k`-th qubit an operator
//! acts on is bit `k` of the basis index. Controlled gates take their
//! controls first.

use ndarray::Array2;
use num_complex::Complex64;

use cadence_ir::{CircuitDag, Gate, GateKind, Instruction, InstructionKind, StandardGate};

use crate::unitary::Unitary2x2;

/// A dense unitary on `num_qubits` qubits.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    num_qubits: usize,
    data: Array2<Complex64>,
}

impl Operator {
    pub fn identity(num_qubits: usize) -> Self {
        Self {
            num_qubits,
            data: Array2::eye(1 << num_qubits),
        }
    }

    /// Wrap a square matrix whose dimension is a power of two.
    pub fn from_matrix(data: Array2<Complex64>) -> Option<Self> {
        let dim = data.nrows();
        if dim != data.ncols() || !dim.is_power_of_two() {
            return None;
        }
        Some(Self {
            num_qubits: dim.trailing_zeros() as usize,
            data,
        })
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn data(&self) -> &Array2<Complex64> {
        &self.data
    }

    /// Matrix of a gate with numeric parameters, control state applied.
    pub fn from_gate(gate: &Gate) -> Option<Self> {
        let data = match &gate.kind {
            GateKind::Standard(std) => standard_matrix(std, gate.effective_ctrl_state())?,
            GateKind::Custom(custom) => {
                let dim = 1usize << custom.num_qubits;
                Array2::from_shape_vec((dim, dim), custom.matrix.clone()?).ok()?
            }
        };
        Self::from_matrix(data)
    }

    /// Matrix of a gate instruction. Everything else has no matrix.
    pub fn from_instruction(inst: &Instruction) -> Option<Self> {
        match &inst.kind {
            InstructionKind::Gate(gate) => Self::from_gate(gate),
            _ => None,
        }
    }

    /// Lift onto `num_qubits` qubits, acting on `positions[k]` for local qubit `k`.
    pub fn embed(&self, positions: &[usize], num_qubits: usize) -> Self {
        let dim = 1usize << num_qubits;
        let local_dim = 1usize << self.num_qubits;
        let position_mask = positions.iter().fold(0usize, |m, &p| m | (1 << p));
        let scatter = |local: usize| {
            positions
                .iter()
                .enumerate()
                .fold(0usize, |acc, (k, &p)| acc | (((local >> k) & 1) << p))
        };
        let gather = |global: usize| {
            positions
                .iter()
                .enumerate()
                .fold(0usize, |acc, (k, &p)| acc | (((global >> p) & 1) << k))
        };

        let mut data = Array2::zeros((dim, dim));
        for col in 0..dim {
            let local_col = gather(col);
            let rest = col & !position_mask;
            for local_row in 0..local_dim {
                data[[rest | scatter(local_row), col]] = self.data[[local_row, local_col]];
            }
        }
        Self { num_qubits, data }
    }

    /// Matrix product `self * other`: `other` acts first.
    pub fn dot(&self, other: &Self) -> Self {
        Self {
            num_qubits: self.num_qubits,
            data: self.data.dot(&other.data),
        }
    }

    /// Conjugate transpose.
    pub fn adjoint(&self) -> Self {
        Self {
            num_qubits: self.num_qubits,
            data: self.data.t().mapv(|x| x.conj()),
        }
    }

    /// Multiply by `e^{i phase}`.
    #[must_use]
    pub fn with_phase(mut self, phase: f64) -> Self {
        let factor = Complex64::from_polar(1.0, phase);
        self.data.mapv_inplace(|x| x * factor);
        self
    }

    /// Exactly the identity, global phase included.
    pub fn is_identity(&self, tolerance: f64) -> bool {
        self.data.indexed_iter().all(|((i, j), x)| {
            let expected = if i == j { 1.0 } else { 0.0 };
            (x - Complex64::new(expected, 0.0)).norm() <= tolerance
        })
    }

    /// Element-wise comparison.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.data.dim() == other.data.dim()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a - b).norm() <= tolerance)
    }

    /// Equality up to a global phase; returns the phase `p` such that
    /// `self = e^{ip} other`.
    pub fn equiv(&self, other: &Self, tolerance: f64) -> Option<f64> {
        if self.data.dim() != other.data.dim() {
            return None;
        }
        let (pivot, _) = other
            .data
            .indexed_iter()
            .max_by(|(_, a), (_, b)| a.norm().total_cmp(&b.norm()))?;
        let ratio = self.data[pivot] / other.data[pivot];
        let phase = ratio.arg();
        let rephased = other.clone().with_phase(phase);
        self.approx_eq(&rephased, tolerance).then_some(phase)
    }

    /// `second * first` on the union of both instructions' qubits, ordered
    /// as `first`'s qubits followed by the new ones of `second`.
    pub fn compose(first: &Instruction, second: &Instruction) -> Option<Self> {
        let mut qubits = first.qubits.clone();
        for q in &second.qubits {
            if !qubits.contains(q) {
                qubits.push(*q);
            }
        }
        let position = |q| qubits.iter().position(|x| *x == q);
        let lift = |inst: &Instruction| -> Option<Self> {
            let positions: Option<Vec<usize>> = inst.qubits.iter().map(|&q| position(q)).collect();
            Some(Self::from_instruction(inst)?.embed(&positions?, qubits.len()))
        };
        Some(lift(second)?.dot(&lift(first)?))
    }

    /// Unitary of a whole circuit, qubit `k` in sorted order being bit `k`.
    ///
    /// Delays and barriers are identities; any other non-gate operation, a
    /// symbolic parameter or a symbolic global phase yields `None`.
    pub fn from_dag(dag: &CircuitDag) -> Option<Self> {
        let mut qubits: Vec<_> = dag.qubits().collect();
        qubits.sort();
        let mut total = Self::identity(qubits.len());
        for (_, inst) in dag.topological_ops() {
            if inst.is_delay() || inst.is_barrier() {
                continue;
            }
            let positions: Option<Vec<usize>> = inst
                .qubits
                .iter()
                .map(|q| qubits.binary_search(q).ok())
                .collect();
            let op = Self::from_instruction(inst)?.embed(&positions?, qubits.len());
            total = op.dot(&total);
        }
        Some(total.with_phase(dag.global_phase().as_f64()?))
    }
}

fn from_2x2(u: &Unitary2x2) -> Array2<Complex64> {
    Array2::from_shape_fn((2, 2), |(row, col)| u.data[2 * row + col])
}

/// Controls on the low bits, `base` on the high bits.
fn controlled(base: &Array2<Complex64>, num_ctrl: usize, ctrl_state: u32) -> Array2<Complex64> {
    let target_dim = base.nrows();
    let ctrl_mask = (1usize << num_ctrl) - 1;
    let dim = target_dim << num_ctrl;
    let mut data = Array2::zeros((dim, dim));
    for col in 0..dim {
        let ctrl = col & ctrl_mask;
        if ctrl != ctrl_state as usize {
            data[[col, col]] = Complex64::new(1.0, 0.0);
            continue;
        }
        let target_col = col >> num_ctrl;
        for target_row in 0..target_dim {
            data[[(target_row << num_ctrl) | ctrl, col]] = base[[target_row, target_col]];
        }
    }
    data
}

fn swap_matrix() -> Array2<Complex64> {
    let mut data = Array2::zeros((4, 4));
    for (row, col) in [(0, 0), (2, 1), (1, 2), (3, 3)] {
        data[[row, col]] = Complex64::new(1.0, 0.0);
    }
    data
}

fn standard_matrix(gate: &StandardGate, ctrl_state: u32) -> Option<Array2<Complex64>> {
    if let Some(u) = Unitary2x2::from_standard(gate) {
        return Some(from_2x2(&u));
    }
    let one_ctrl = |u: Unitary2x2| controlled(&from_2x2(&u), 1, ctrl_state);
    let matrix = match gate {
        StandardGate::CX => one_ctrl(Unitary2x2::x()),
        StandardGate::CY => one_ctrl(Unitary2x2::y()),
        StandardGate::CZ => one_ctrl(Unitary2x2::z()),
        StandardGate::CH => one_ctrl(Unitary2x2::h()),
        StandardGate::CP(theta) => one_ctrl(Unitary2x2::p(theta.as_f64()?)),
        StandardGate::CRz(theta) => one_ctrl(Unitary2x2::rz(theta.as_f64()?)),
        StandardGate::CCX => controlled(&from_2x2(&Unitary2x2::x()), 2, ctrl_state),
        StandardGate::CSwap => controlled(&swap_matrix(), 1, ctrl_state),
        StandardGate::Swap => swap_matrix(),
        StandardGate::RZZ(theta) => {
            let half = theta.as_f64()? / 2.0;
            Array2::from_diag(&ndarray::arr1(&[
                Complex64::from_polar(1.0, -half),
                Complex64::from_polar(1.0, half),
                Complex64::from_polar(1.0, half),
                Complex64::from_polar(1.0, -half),
            ]))
        }
        _ => return None,
    };
    Some(matrix)
}
