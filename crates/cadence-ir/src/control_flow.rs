//! Control-flow operations and their bodies.
//!
//! A control-flow instruction owns one or more [`Block`]s. A block is a
//! self-contained sub-program on local wires: block qubit `i` is bound to
//! `qubits[i]` of the enclosing instruction, and block clbit `j` to
//! `clbits[j]`.

use serde::{Deserialize, Serialize};

use crate::instruction::Instruction;
use crate::parameter::ParameterExpression;
use crate::qubit::ClbitId;

/// A single-bit classical condition on a wire of the enclosing circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub clbit: ClbitId,
    pub value: bool,
}

impl Condition {
    pub fn new(clbit: ClbitId, value: bool) -> Self {
        Self { clbit, value }
    }
}

/// A linear sub-program nested inside a control-flow instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub num_qubits: u32,
    pub num_clbits: u32,
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub global_phase: ParameterExpression,
}

impl Block {
    /// An empty body on `num_qubits` qubits and `num_clbits` bits.
    pub fn new(num_qubits: u32, num_clbits: u32) -> Self {
        Self {
            num_qubits,
            num_clbits,
            instructions: vec![],
            global_phase: ParameterExpression::default(),
        }
    }

    /// Append an instruction (local wire indices).
    #[must_use]
    pub fn with(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Structured control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlFlow {
    /// Two-way branch on a classical bit.
    IfElse {
        condition: Condition,
        true_body: Block,
        false_body: Option<Block>,
    },
    /// Loop over a fixed index set.
    ForLoop {
        indices: Vec<i64>,
        loop_parameter: Option<String>,
        body: Block,
    },
    /// Loop while a classical bit holds a value.
    WhileLoop { condition: Condition, body: Block },
}

impl ControlFlow {
    pub fn name(&self) -> &'static str {
        match self {
            ControlFlow::IfElse { .. } => "if_else",
            ControlFlow::ForLoop { .. } => "for_loop",
            ControlFlow::WhileLoop { .. } => "while_loop",
        }
    }

    /// All bodies, in declaration order.
    pub fn blocks(&self) -> Vec<&Block> {
        match self {
            ControlFlow::IfElse {
                true_body,
                false_body,
                ..
            } => std::iter::once(true_body).chain(false_body.as_ref()).collect(),
            ControlFlow::ForLoop { body, .. } | ControlFlow::WhileLoop { body, .. } => vec![body],
        }
    }

    /// All bodies, mutably.
    pub fn blocks_mut(&mut self) -> Vec<&mut Block> {
        match self {
            ControlFlow::IfElse {
                true_body,
                false_body,
                ..
            } => std::iter::once(true_body).chain(false_body.as_mut()).collect(),
            ControlFlow::ForLoop { body, .. } | ControlFlow::WhileLoop { body, .. } => vec![body],
        }
    }

    /// Classical condition, if the operation has one.
    pub fn condition(&self) -> Option<Condition> {
        match self {
            ControlFlow::IfElse { condition, .. } | ControlFlow::WhileLoop { condition, .. } => {
                Some(*condition)
            }
            ControlFlow::ForLoop { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::StandardGate;
    use crate::qubit::QubitId;

    #[test]
    fn test_if_else_blocks() {
        let body = Block::new(1, 0).with(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
        let op = ControlFlow::IfElse {
            condition: Condition::new(ClbitId(0), true),
            true_body: body.clone(),
            false_body: Some(Block::new(1, 0)),
        };
        assert_eq!(op.name(), "if_else");
        assert_eq!(op.blocks().len(), 2);
        assert_eq!(op.blocks()[0], &body);
        assert_eq!(op.condition(), Some(Condition::new(ClbitId(0), true)));
    }

    #[test]
    fn test_loop_blocks_mut() {
        let mut op = ControlFlow::ForLoop {
            indices: vec![0, 1, 2],
            loop_parameter: None,
            body: Block::new(2, 0),
        };
        for block in op.blocks_mut() {
            block.push(Instruction::two_qubit_gate(StandardGate::CX, QubitId(0), QubitId(1)));
        }
        assert_eq!(op.blocks()[0].len(), 1);
        assert!(op.condition().is_none());
    }
}
