//! Pairwise commutation of instructions.

use cadence_ir::Instruction;

use crate::operator::Operator;

/// Default tolerance on matrix entries.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Largest joint space checked with dense matrices.
pub const DEFAULT_MAX_QUBITS: usize = 6;

/// Decides whether two instructions may be reordered.
///
/// Operations on disjoint wires always commute. Anything without a numeric
/// unitary (measurements, resets, barriers, delays, control flow, symbolic
/// gates) is treated as non-commuting with whatever shares a wire with it.
#[derive(Debug, Clone, Copy)]
pub struct CommutationChecker {
    tolerance: f64,
    max_qubits: usize,
}

impl CommutationChecker {
    pub fn new() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_qubits: DEFAULT_MAX_QUBITS,
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_max_qubits(mut self, max_qubits: usize) -> Self {
        self.max_qubits = max_qubits;
        self
    }

    pub fn commute(&self, a: &Instruction, b: &Instruction) -> bool {
        let shares_qubit = a.qubits.iter().any(|q| b.qubits.contains(q));
        let shares_clbit = a.clbits.iter().any(|c| b.clbits.contains(c));
        if !shares_qubit && !shares_clbit {
            return true;
        }
        if shares_clbit {
            return false;
        }

        let (Some(ga), Some(gb)) = (a.as_gate(), b.as_gate()) else {
            return false;
        };
        if ga.is_parameterized() || gb.is_parameterized() {
            return false;
        }
        if a.qubits == b.qubits && ga.same_operation(gb, 0.0) {
            return true;
        }

        let joint = a.qubits.len() + b.qubits.iter().filter(|q| !a.qubits.contains(q)).count();
        if joint > self.max_qubits {
            return false;
        }

        match (Operator::compose(a, b), Operator::compose(b, a)) {
            (Some(ab), Some(ba)) => {
                // `compose` orders qubits by its first argument; realign `ba`.
                let mut joint_qubits = a.qubits.clone();
                joint_qubits.extend(b.qubits.iter().filter(|q| !a.qubits.contains(q)));
                let mut ba_qubits = b.qubits.clone();
                ba_qubits.extend(a.qubits.iter().filter(|q| !b.qubits.contains(q)));
                let positions: Vec<usize> = ba_qubits
                    .iter()
                    .filter_map(|q| joint_qubits.iter().position(|x| x == q))
                    .collect();
                ab.approx_eq(&ba.embed(&positions, joint), self.tolerance)
            }
            _ => false,
        }
    }
}

impl Default for CommutationChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_ir::{ClbitId, QubitId, StandardGate};

    fn q(i: u32) -> QubitId {
        QubitId(i)
    }

    #[test]
    fn test_disjoint_commute() {
        let checker = CommutationChecker::new();
        let a = Instruction::single_qubit_gate(StandardGate::H, q(0));
        let b = Instruction::measure(q(1), ClbitId(0));
        assert!(checker.commute(&a, &b));
    }

    #[test]
    fn test_cx_shared_control_commutes() {
        let checker = CommutationChecker::new();
        let a = Instruction::two_qubit_gate(StandardGate::CX, q(0), q(1));
        let b = Instruction::two_qubit_gate(StandardGate::CX, q(0), q(2));
        assert!(checker.commute(&a, &b));

        let z = Instruction::single_qubit_gate(StandardGate::Z, q(0));
        assert!(checker.commute(&a, &z));
        let x = Instruction::single_qubit_gate(StandardGate::X, q(0));
        assert!(!checker.commute(&a, &x));
        let x_target = Instruction::single_qubit_gate(StandardGate::X, q(1));
        assert!(checker.commute(&x_target, &a));
    }

    #[test]
    fn test_cx_target_to_control_does_not_commute() {
        let checker = CommutationChecker::new();
        let a = Instruction::two_qubit_gate(StandardGate::CX, q(0), q(1));
        let b = Instruction::two_qubit_gate(StandardGate::CX, q(1), q(2));
        assert!(!checker.commute(&a, &b));
        assert!(!checker.commute(&b, &a));
    }

    #[test]
    fn test_non_unitary_blocks() {
        let checker = CommutationChecker::new();
        let z = Instruction::single_qubit_gate(StandardGate::Z, q(0));
        assert!(!checker.commute(&z, &Instruction::measure(q(0), ClbitId(0))));
        assert!(!checker.commute(&z, &Instruction::delay(q(0), 10)));
        assert!(!checker.commute(&z, &Instruction::barrier([q(0)])));
    }

    #[test]
    fn test_symbolic_never_commutes() {
        let checker = CommutationChecker::new();
        let a = Instruction::single_qubit_gate(StandardGate::Rz("a".into()), q(0));
        let b = Instruction::single_qubit_gate(StandardGate::Z, q(0));
        assert!(!checker.commute(&a, &b));
    }
}
