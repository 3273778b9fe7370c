//! Instructions: an operation bound to the wires it acts on.

use serde::{Deserialize, Serialize};

use crate::control_flow::{Block, Condition, ControlFlow};
use crate::error::{IrError, IrResult};
use crate::gate::{Gate, StandardGate};
use crate::qubit::{ClbitId, QubitId};

/// The operation carried by an [`Instruction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// A unitary gate.
    Gate(Gate),
    /// Measurement into classical bits.
    Measure,
    /// Reset to |0⟩.
    Reset,
    /// Scheduling barrier.
    Barrier,
    /// Idle for a fixed number of time units.
    Delay { duration: u64 },
    /// Structured control flow with nested bodies.
    ControlFlow(ControlFlow),
}

/// An operation applied to an ordered tuple of qubits and bits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub qubits: Vec<QubitId>,
    #[serde(default)]
    pub clbits: Vec<ClbitId>,
}

impl Instruction {
    pub fn gate(gate: impl Into<Gate>, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate(gate.into()),
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    pub fn reset(qubit: QubitId) -> Self {
        Self {
            kind: InstructionKind::Reset,
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    pub fn delay(qubit: QubitId, duration: u64) -> Self {
        Self {
            kind: InstructionKind::Delay { duration },
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// Wrap a control-flow operation. The bodies must all match the given
    /// wire counts.
    pub fn control_flow(
        op: ControlFlow,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> IrResult<Self> {
        let qubits: Vec<QubitId> = qubits.into_iter().collect();
        let clbits: Vec<ClbitId> = clbits.into_iter().collect();
        for block in op.blocks() {
            check_arity(op.name(), "qubits", block.num_qubits, qubits.len())?;
            check_arity(op.name(), "clbits", block.num_clbits, clbits.len())?;
        }
        if let Some(condition) = op.condition() {
            if !clbits.contains(&condition.clbit) {
                return Err(IrError::ClbitNotFound {
                    clbit: condition.clbit,
                    op_name: Some(op.name().to_string()),
                });
            }
        }
        Ok(Self {
            kind: InstructionKind::ControlFlow(op),
            qubits,
            clbits,
        })
    }

    /// `if (condition) { true_body } else { false_body }`.
    pub fn if_else(
        condition: Condition,
        true_body: Block,
        false_body: Option<Block>,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> IrResult<Self> {
        Self::control_flow(
            ControlFlow::IfElse {
                condition,
                true_body,
                false_body,
            },
            qubits,
            clbits,
        )
    }

    pub fn for_loop(
        indices: Vec<i64>,
        body: Block,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> IrResult<Self> {
        Self::control_flow(
            ControlFlow::ForLoop {
                indices,
                loop_parameter: None,
                body,
            },
            qubits,
            clbits,
        )
    }

    pub fn while_loop(
        condition: Condition,
        body: Block,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> IrResult<Self> {
        Self::control_flow(ControlFlow::WhileLoop { condition, body }, qubits, clbits)
    }

    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_))
    }

    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    pub fn is_reset(&self) -> bool {
        matches!(self.kind, InstructionKind::Reset)
    }

    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    pub fn is_delay(&self) -> bool {
        matches!(self.kind, InstructionKind::Delay { .. })
    }

    pub fn is_control_flow(&self) -> bool {
        matches!(self.kind, InstructionKind::ControlFlow(_))
    }

    pub fn as_gate(&self) -> Option<&Gate> {
        match &self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    pub fn gate_mut(&mut self) -> Option<&mut Gate> {
        match &mut self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_control_flow(&self) -> Option<&ControlFlow> {
        match &self.kind {
            InstructionKind::ControlFlow(op) => Some(op),
            _ => None,
        }
    }

    pub fn control_flow_mut(&mut self) -> Option<&mut ControlFlow> {
        match &mut self.kind {
            InstructionKind::ControlFlow(op) => Some(op),
            _ => None,
        }
    }

    /// Duration of a delay instruction.
    pub fn delay_duration(&self) -> Option<u64> {
        match self.kind {
            InstructionKind::Delay { duration } => Some(duration),
            _ => None,
        }
    }

    /// Operation name, as used in duration tables.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate(g) => g.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Reset => "reset",
            InstructionKind::Barrier => "barrier",
            InstructionKind::Delay { .. } => "delay",
            InstructionKind::ControlFlow(op) => op.name(),
        }
    }

    /// Check operand counts against the operation's arity.
    pub fn validate_arity(&self) -> IrResult<()> {
        match &self.kind {
            InstructionKind::Gate(g) => {
                check_arity(g.name(), "qubits", g.num_qubits(), self.qubits.len())?;
                check_arity(g.name(), "clbits", 0, self.clbits.len())
            }
            InstructionKind::Measure => check_arity(
                "measure",
                "clbits",
                u32::try_from(self.qubits.len()).unwrap_or(u32::MAX),
                self.clbits.len(),
            ),
            InstructionKind::Reset | InstructionKind::Delay { .. } => {
                check_arity(self.name(), "qubits", 1, self.qubits.len())
            }
            InstructionKind::Barrier => Ok(()),
            InstructionKind::ControlFlow(op) => op.blocks().into_iter().try_for_each(|block| {
                check_arity(op.name(), "qubits", block.num_qubits, self.qubits.len())?;
                check_arity(op.name(), "clbits", block.num_clbits, self.clbits.len())
            }),
        }
    }
}

fn check_arity(op_name: &str, wire_kind: &'static str, expected: u32, got: usize) -> IrResult<()> {
    if expected as usize == got {
        return Ok(());
    }
    Err(IrError::ArityMismatch {
        op_name: op_name.to_string(),
        wire_kind,
        expected,
        got: u32::try_from(got).unwrap_or(u32::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_instruction() {
        let inst = Instruction::single_qubit_gate(StandardGate::H, QubitId(0));
        assert!(inst.is_gate());
        assert_eq!(inst.name(), "h");
        assert!(inst.validate_arity().is_ok());
    }

    #[test]
    fn test_arity_mismatch() {
        let inst = Instruction::gate(StandardGate::CX, [QubitId(0)]);
        assert!(matches!(
            inst.validate_arity(),
            Err(IrError::ArityMismatch { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn test_delay_instruction() {
        let inst = Instruction::delay(QubitId(1), 160);
        assert!(inst.is_delay());
        assert_eq!(inst.delay_duration(), Some(160));
        assert_eq!(inst.name(), "delay");
    }

    #[test]
    fn test_control_flow_constructor_checks_body() {
        let body = Block::new(2, 0);
        let err = Instruction::for_loop(vec![0, 1], body.clone(), [QubitId(0)], []);
        assert!(err.is_err());

        let ok = Instruction::for_loop(vec![0, 1], body, [QubitId(0), QubitId(1)], []).unwrap();
        assert_eq!(ok.name(), "for_loop");
        assert!(ok.is_control_flow());
    }

    #[test]
    fn test_condition_bit_must_be_operand() {
        let cond = Condition::new(ClbitId(3), true);
        let res = Instruction::if_else(cond, Block::new(1, 1), None, [QubitId(0)], [ClbitId(0)]);
        assert!(matches!(res, Err(IrError::ClbitNotFound { .. })));
    }
}
