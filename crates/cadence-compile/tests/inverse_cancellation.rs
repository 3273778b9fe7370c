//! Inverse cancellation on straight-line code and control-flow bodies.

use std::f64::consts::PI;

use cadence_compile::passes::{CancellationRule, InverseCancellation};
use cadence_compile::{CompileError, Operator, Pass, PropertySet};
use cadence_ir::{
    Block, Circuit, CircuitDag, ClbitId, Condition, Gate, Instruction, QubitId, StandardGate,
};
use proptest::prelude::*;
use serde_json::json;

fn q(i: u32) -> QubitId {
    QubitId(i)
}

fn run(pass: &InverseCancellation, circuit: &Circuit) -> CircuitDag {
    let mut dag = circuit.dag().clone();
    pass.run(&mut dag, &mut PropertySet::new()).unwrap();
    dag
}

fn names(dag: &CircuitDag) -> Vec<String> {
    dag.topological_ops()
        .map(|(_, inst)| inst.name().to_string())
        .collect()
}

fn bodies(dag: &CircuitDag) -> Vec<Block> {
    dag.topological_ops()
        .filter_map(|(_, inst)| inst.as_control_flow())
        .flat_map(|flow| flow.blocks().into_iter().cloned())
        .collect()
}

#[test]
fn test_measurement_blocks_cancellation() {
    let pass = InverseCancellation::standard_gates();
    let mut circuit = Circuit::with_size("measured", 1, 1);
    circuit
        .h(q(0))
        .unwrap()
        .measure(q(0), ClbitId(0))
        .unwrap()
        .h(q(0))
        .unwrap();
    assert_eq!(names(&run(&pass, &circuit)), vec!["h", "measure", "h"]);
}

#[test]
fn test_barrier_blocks_cancellation() {
    let pass = InverseCancellation::standard_gates();
    let mut circuit = Circuit::with_size("barrier", 2, 0);
    circuit.x(q(0)).unwrap();
    circuit.barrier([q(0), q(1)]).unwrap();
    circuit.x(q(0)).unwrap();
    assert_eq!(run(&pass, &circuit).num_ops(), 3);
}

#[test]
fn test_standard_pairs_cancel() {
    let pass = InverseCancellation::standard_gates();
    let mut circuit = Circuit::with_size("pairs", 3, 0);
    circuit.t(q(0)).unwrap().tdg(q(0)).unwrap();
    circuit.sdg(q(1)).unwrap().s(q(1)).unwrap();
    circuit.sx(q(2)).unwrap().sxdg(q(2)).unwrap();
    circuit.ccx(q(0), q(1), q(2)).unwrap();
    circuit.ccx(q(0), q(1), q(2)).unwrap();
    circuit.swap(q(1), q(2)).unwrap().swap(q(1), q(2)).unwrap();
    assert_eq!(run(&pass, &circuit).num_ops(), 0);
}

#[test]
fn test_zero_rotation_rule() {
    let pass = InverseCancellation::new(vec![CancellationRule::SelfInverse(Gate::standard(
        StandardGate::Rz(0.0.into()),
    ))])
    .unwrap();

    let mut separated = Circuit::with_size("separated", 1, 0);
    separated
        .rz(0.0, q(0))
        .unwrap()
        .rz(3.0, q(0))
        .unwrap()
        .rz(0.0, q(0))
        .unwrap();
    assert_eq!(run(&pass, &separated).num_ops(), 3);

    let mut adjacent = Circuit::with_size("adjacent", 1, 0);
    adjacent.rz(0.0, q(0)).unwrap().rz(0.0, q(0)).unwrap();
    assert_eq!(run(&pass, &adjacent).num_ops(), 0);
}

#[test]
fn test_interleaved_pairs() {
    let plus = Gate::standard(StandardGate::P((PI / 4.0).into()));
    let minus = Gate::standard(StandardGate::P((-PI / 4.0).into()));
    let pass = InverseCancellation::new(vec![CancellationRule::InversePair(
        plus.clone(),
        minus.clone(),
    )])
    .unwrap();

    let mut circuit = Circuit::with_size("p", 1, 0);
    for gate in [&plus, &plus, &minus, &minus, &minus, &plus, &plus] {
        circuit.gate(gate.clone(), [q(0)]).unwrap();
    }
    let dag = run(&pass, &circuit);
    assert_eq!(dag.num_ops(), 1);
}

#[test]
fn test_preserves_operator() {
    let pass = InverseCancellation::standard_gates();
    let mut circuit = Circuit::with_size("mixed", 3, 0);
    circuit.h(q(0)).unwrap().t(q(1)).unwrap();
    circuit.cx(q(0), q(1)).unwrap().cx(q(0), q(1)).unwrap();
    circuit.tdg(q(1)).unwrap();
    circuit.cz(q(1), q(2)).unwrap().rz(0.3, q(2)).unwrap();
    circuit.set_global_phase(0.25);
    let dag = run(&pass, &circuit);

    assert_eq!(names(&dag), vec!["h", "cz", "rz"]);
    let before = Operator::from_dag(circuit.dag()).unwrap();
    let after = Operator::from_dag(&dag).unwrap();
    assert!(before.approx_eq(&after, 1e-9));
}

#[test]
fn test_if_else_bodies() {
    let pass = InverseCancellation::standard_gates();
    let true_body = Block::new(2, 1)
        .with(Instruction::single_qubit_gate(StandardGate::H, q(0)))
        .with(Instruction::single_qubit_gate(StandardGate::H, q(0)))
        .with(Instruction::single_qubit_gate(StandardGate::X, q(1)));
    let false_body = Block::new(2, 1)
        .with(Instruction::two_qubit_gate(StandardGate::CX, q(0), q(1)))
        .with(Instruction::two_qubit_gate(StandardGate::CX, q(0), q(1)));

    let mut circuit = Circuit::with_size("branch", 3, 1);
    circuit.x(q(2)).unwrap().x(q(2)).unwrap();
    circuit
        .if_else(
            Condition::new(ClbitId(0), true),
            true_body,
            Some(false_body),
            [q(1), q(2)],
            [ClbitId(0)],
        )
        .unwrap();

    let dag = run(&pass, &circuit);
    assert_eq!(names(&dag), vec!["if_else"]);
    let blocks = bodies(&dag);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].instructions.len(), 1);
    assert_eq!(blocks[0].instructions[0].qubits, vec![q(1)]);
    assert!(blocks[1].is_empty());
}

#[test]
fn test_nested_loops() {
    let pass = InverseCancellation::standard_gates();
    let inner = Block::new(1, 1)
        .with(Instruction::single_qubit_gate(StandardGate::Y, q(0)))
        .with(Instruction::single_qubit_gate(StandardGate::Y, q(0)))
        .with(Instruction::single_qubit_gate(StandardGate::Z, q(0)));
    let while_loop =
        Instruction::while_loop(Condition::new(ClbitId(0), false), inner, [q(0)], [ClbitId(0)])
            .unwrap();
    let outer = Block::new(1, 1)
        .with(Instruction::single_qubit_gate(StandardGate::S, q(0)))
        .with(while_loop)
        .with(Instruction::single_qubit_gate(StandardGate::Sdg, q(0)));

    let mut circuit = Circuit::with_size("loops", 2, 1);
    circuit
        .for_loop(vec![0, 1, 2], outer, [q(1)], [ClbitId(0)])
        .unwrap();
    let dag = run(&pass, &circuit);

    let blocks = bodies(&dag);
    let outer = &blocks[0];
    // The while loop separates S from Sdg.
    assert_eq!(outer.instructions.len(), 3);
    let inner = outer.instructions[1]
        .as_control_flow()
        .unwrap()
        .blocks()[0]
        .clone();
    assert_eq!(inner.instructions.len(), 1);
    assert_eq!(inner.instructions[0].name(), "z");
}

#[test]
fn test_rules_from_json() {
    let h = serde_json::to_value(Gate::standard(StandardGate::H)).unwrap();
    let s = serde_json::to_value(Gate::standard(StandardGate::S)).unwrap();
    let sdg = serde_json::to_value(Gate::standard(StandardGate::Sdg)).unwrap();

    let pass = InverseCancellation::from_json(&json!([h, [s, sdg]])).unwrap();
    let mut circuit = Circuit::with_size("json", 1, 0);
    circuit
        .h(q(0))
        .unwrap()
        .h(q(0))
        .unwrap()
        .sdg(q(0))
        .unwrap()
        .s(q(0))
        .unwrap()
        .x(q(0))
        .unwrap()
        .x(q(0))
        .unwrap();
    assert_eq!(names(&run(&pass, &circuit)), vec!["x", "x"]);
}

#[test]
fn test_rules_from_json_rejects_non_inverse() {
    let x = serde_json::to_value(Gate::standard(StandardGate::X)).unwrap();
    let t = serde_json::to_value(Gate::standard(StandardGate::T)).unwrap();
    assert!(matches!(
        InverseCancellation::from_json(&json!([[x, t]])),
        Err(CompileError::InvalidCancellationRule { .. })
    ));
}

proptest! {
    #[test]
    fn prop_self_inverse_runs_leave_parity(qubits in prop::collection::vec(0u32..3, 0..24)) {
        let pass = InverseCancellation::standard_gates();
        let mut circuit = Circuit::with_size("runs", 3, 0);
        let mut counts = [0usize; 3];
        for &qubit in &qubits {
            circuit.h(q(qubit)).unwrap();
            counts[qubit as usize] += 1;
        }
        let dag = run(&pass, &circuit);
        for (qubit, count) in (0u32..3).zip(counts) {
            let remaining = dag
                .topological_ops()
                .filter(|(_, inst)| inst.qubits == [q(qubit)])
                .count();
            prop_assert_eq!(remaining, count % 2);
        }
    }
}
