//! High-level circuit builder.

use crate::control_flow::{Block, Condition};
use crate::dag::CircuitDag;
use crate::error::IrResult;
use crate::gate::{Gate, StandardGate};
use crate::instruction::Instruction;
use crate::parameter::ParameterExpression;
use crate::qubit::{ClbitId, QubitId};

/// A circuit under construction.
///
/// Thin builder over a [`CircuitDag`]: every call appends one instruction
/// and returns `&mut Self` so calls can be chained with `?`.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    dag: CircuitDag,
}

impl Circuit {
    /// A named circuit with qubits `0..num_qubits` and clbits `0..num_clbits`.
    pub fn with_size(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        let mut dag = CircuitDag::with_wires(num_qubits, num_clbits);
        dag.set_name(name);
        Self { dag }
    }

    fn std1(&mut self, gate: StandardGate, qubit: QubitId) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::single_qubit_gate(gate, qubit))?;
        Ok(self)
    }

    fn std2(&mut self, gate: StandardGate, q0: QubitId, q1: QubitId) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::two_qubit_gate(gate, q0, q1))?;
        Ok(self)
    }

    pub fn id(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::I, qubit)
    }

    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::H, qubit)
    }

    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::X, qubit)
    }

    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::Y, qubit)
    }

    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::Z, qubit)
    }

    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::S, qubit)
    }

    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::Sdg, qubit)
    }

    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::T, qubit)
    }

    pub fn tdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::Tdg, qubit)
    }

    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::SX, qubit)
    }

    pub fn sxdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::SXdg, qubit)
    }

    pub fn rx(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.std1(StandardGate::Rx(theta.into()), qubit)
    }

    pub fn ry(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.std1(StandardGate::Ry(theta.into()), qubit)
    }

    pub fn rz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.std1(StandardGate::Rz(theta.into()), qubit)
    }

    pub fn p(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.std1(StandardGate::P(theta.into()), qubit)
    }

    /// U(θ, φ, λ).
    pub fn u(
        &mut self,
        theta: impl Into<ParameterExpression>,
        phi: impl Into<ParameterExpression>,
        lambda: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.std1(
            StandardGate::U(theta.into(), phi.into(), lambda.into()),
            qubit,
        )
    }

    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.std2(StandardGate::CX, control, target)
    }

    pub fn cy(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.std2(StandardGate::CY, control, target)
    }

    pub fn cz(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.std2(StandardGate::CZ, control, target)
    }

    pub fn ch(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.std2(StandardGate::CH, control, target)
    }

    pub fn cp(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.std2(StandardGate::CP(theta.into()), control, target)
    }

    pub fn crz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.std2(StandardGate::CRz(theta.into()), control, target)
    }

    pub fn swap(&mut self, q0: QubitId, q1: QubitId) -> IrResult<&mut Self> {
        self.std2(StandardGate::Swap, q0, q1)
    }

    pub fn rzz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        q0: QubitId,
        q1: QubitId,
    ) -> IrResult<&mut Self> {
        self.std2(StandardGate::RZZ(theta.into()), q0, q1)
    }

    pub fn ccx(&mut self, c0: QubitId, c1: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::CCX, [c0, c1, target])
    }

    pub fn cswap(&mut self, control: QubitId, t0: QubitId, t1: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::CSwap, [control, t0, t1])
    }

    /// Apply any gate, standard or custom.
    pub fn gate(
        &mut self,
        gate: impl Into<Gate>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::gate(gate, qubits))?;
        Ok(self)
    }

    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::measure(qubit, clbit))?;
        Ok(self)
    }

    pub fn reset(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::reset(qubit))?;
        Ok(self)
    }

    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::barrier(qubits))?;
        Ok(self)
    }

    /// Barrier across every qubit.
    pub fn barrier_all(&mut self) -> IrResult<&mut Self> {
        let qubits: Vec<_> = self.dag.qubits().collect();
        self.barrier(qubits)
    }

    pub fn delay(&mut self, qubit: QubitId, duration: u64) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::delay(qubit, duration))?;
        Ok(self)
    }

    pub fn if_else(
        &mut self,
        condition: Condition,
        true_body: Block,
        false_body: Option<Block>,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> IrResult<&mut Self> {
        let inst = Instruction::if_else(condition, true_body, false_body, qubits, clbits)?;
        self.append(inst)
    }

    pub fn for_loop(
        &mut self,
        indices: Vec<i64>,
        body: Block,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> IrResult<&mut Self> {
        let inst = Instruction::for_loop(indices, body, qubits, clbits)?;
        self.append(inst)
    }

    pub fn while_loop(
        &mut self,
        condition: Condition,
        body: Block,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> IrResult<&mut Self> {
        let inst = Instruction::while_loop(condition, body, qubits, clbits)?;
        self.append(inst)
    }

    /// Append a prebuilt instruction.
    pub fn append(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        self.dag.apply(instruction)?;
        Ok(self)
    }

    pub fn set_global_phase(&mut self, phase: impl Into<ParameterExpression>) -> &mut Self {
        self.dag.set_global_phase(phase);
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.dag.metadata_mut().insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        self.dag.name().unwrap_or_default()
    }

    pub fn num_qubits(&self) -> usize {
        self.dag.num_qubits()
    }

    pub fn num_clbits(&self) -> usize {
        self.dag.num_clbits()
    }

    pub fn depth(&self) -> usize {
        self.dag.depth()
    }

    pub fn dag(&self) -> &CircuitDag {
        &self.dag
    }

    pub fn dag_mut(&mut self) -> &mut CircuitDag {
        &mut self.dag
    }

    pub fn into_dag(self) -> CircuitDag {
        self.dag
    }

    pub fn from_dag(dag: CircuitDag) -> Self {
        Self { dag }
    }

    /// H on qubit 0 followed by a CX ladder.
    pub fn ghz(n: u32) -> IrResult<Self> {
        let mut circuit = Self::with_size("ghz", n, 0);
        if n > 0 {
            circuit.h(QubitId(0))?;
        }
        for i in 1..n {
            circuit.cx(QubitId(i - 1), QubitId(i))?;
        }
        Ok(circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_builder_chain() {
        let mut circuit = Circuit::with_size("chain", 2, 1);
        circuit
            .h(QubitId(0))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .delay(QubitId(1), 100)
            .unwrap()
            .measure(QubitId(0), ClbitId(0))
            .unwrap();
        assert_eq!(circuit.name(), "chain");
        assert_eq!(circuit.dag().num_ops(), 4);
        assert_eq!(circuit.depth(), 3);
    }

    #[test]
    fn test_ghz() {
        let circuit = Circuit::ghz(4).unwrap();
        assert_eq!(circuit.num_qubits(), 4);
        assert_eq!(circuit.dag().count_ops().get("cx"), Some(&3));
        assert_eq!(circuit.depth(), 4);
    }

    #[test]
    fn test_parameterized_gate() {
        let mut circuit = Circuit::with_size("param", 1, 0);
        circuit.rx(ParameterExpression::symbol("theta"), QubitId(0)).unwrap();
        circuit.rz(PI / 2.0, QubitId(0)).unwrap();
        let (_, first) = circuit.dag().topological_ops().next().unwrap();
        assert!(first.as_gate().unwrap().is_parameterized());
    }

    #[test]
    fn test_control_flow_builder() {
        let body = Block::new(1, 0).with(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
        let mut circuit = Circuit::with_size("cf", 2, 1);
        circuit.measure(QubitId(0), ClbitId(0)).unwrap();
        circuit
            .if_else(
                Condition::new(ClbitId(0), true),
                body,
                None,
                [QubitId(1)],
                [ClbitId(0)],
            )
            .unwrap_err();

        let body = Block::new(1, 1).with(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
        circuit
            .if_else(
                Condition::new(ClbitId(0), true),
                body,
                None,
                [QubitId(1)],
                [ClbitId(0)],
            )
            .unwrap();
        assert_eq!(circuit.dag().count_ops().get("if_else"), Some(&1));
        circuit.dag().verify_integrity().unwrap();
    }

    #[test]
    fn test_metadata_and_phase() {
        let mut circuit =
            Circuit::with_size("meta", 1, 0).with_metadata("shots", serde_json::json!(1024));
        circuit.set_global_phase(PI);
        assert_eq!(circuit.dag().metadata()["shots"], serde_json::json!(1024));
        assert_eq!(circuit.dag().global_phase().as_f64(), Some(PI));
    }
}
