//! Inverse cancellation.
//!
//! Removes adjacent pairs of gates that multiply to the identity. Two
//! gates are adjacent when they act on the same ordered qubits and nothing
//! else touches those qubits in between. Pairs are matched left to right, so
//! a removal can expose a new pair (`X H H X` cancels completely) and an odd
//! run of a self-inverse gate leaves its last instance.

use serde_json::Value;
use tracing::{debug, info};

use cadence_ir::{Block, CircuitDag, Gate, NodeIndex, StandardGate, WireId};

use crate::error::{CompileError, CompileResult};
use crate::operator::Operator;
use crate::pass::{Pass, PassKind};
use crate::property::{PropertyKey, PropertySet};

/// Tolerance for rule validation and parameter matching.
const TOLERANCE: f64 = 1e-9;

/// A cancellation rule.
#[derive(Debug, Clone, PartialEq)]
pub enum CancellationRule {
    /// `G G = I`.
    SelfInverse(Gate),
    /// `A B = B A = I`; matches in either order.
    InversePair(Gate, Gate),
}

impl CancellationRule {
    /// Whether `first` followed by `second` is an instance of this rule.
    fn matches(&self, first: &Gate, second: &Gate) -> bool {
        match self {
            CancellationRule::SelfInverse(g) => {
                g.same_operation(first, TOLERANCE) && g.same_operation(second, TOLERANCE)
            }
            CancellationRule::InversePair(a, b) => {
                (a.same_operation(first, TOLERANCE) && b.same_operation(second, TOLERANCE))
                    || (b.same_operation(first, TOLERANCE) && a.same_operation(second, TOLERANCE))
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            CancellationRule::SelfInverse(g) => g.name().to_string(),
            CancellationRule::InversePair(a, b) => format!("({}, {})", a.name(), b.name()),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> CompileError {
        CompileError::InvalidCancellationRule {
            rule: self.describe(),
            reason: reason.into(),
        }
    }

    fn validate(&self) -> CompileResult<()> {
        let matrix = |g: &Gate| {
            Operator::from_gate(g).ok_or_else(|| {
                self.invalid(format!("gate '{}' has no numeric matrix", g.name()))
            })
        };
        match self {
            CancellationRule::SelfInverse(g) => {
                let op = matrix(g)?;
                if !op.dot(&op).is_identity(TOLERANCE) {
                    return Err(self.invalid("gate is not its own inverse"));
                }
            }
            CancellationRule::InversePair(a, b) => {
                if a.num_qubits() != b.num_qubits() {
                    return Err(self.invalid("gates act on different numbers of qubits"));
                }
                let (op_a, op_b) = (matrix(a)?, matrix(b)?);
                if !op_b.dot(&op_a).is_identity(TOLERANCE) {
                    return Err(self.invalid("gates are not inverses of each other"));
                }
            }
        }
        Ok(())
    }
}

/// Transformation pass cancelling adjacent inverse gates.
///
/// Control-flow bodies are rewritten recursively, each as its own circuit.
#[derive(Debug, Clone)]
pub struct InverseCancellation {
    rules: Vec<CancellationRule>,
}

impl InverseCancellation {
    /// Validate and store `rules`. Every rule must be exactly inverse,
    /// global phase included.
    pub fn new(rules: Vec<CancellationRule>) -> CompileResult<Self> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self { rules })
    }

    /// Self-inverse Clifford gates plus the `T`, `S` and `SX` pairs.
    pub fn standard_gates() -> Self {
        let self_inverse = [
            StandardGate::H,
            StandardGate::X,
            StandardGate::Y,
            StandardGate::Z,
            StandardGate::CH,
            StandardGate::CX,
            StandardGate::CY,
            StandardGate::CZ,
            StandardGate::Swap,
            StandardGate::CCX,
            StandardGate::CSwap,
        ];
        let pairs = [
            (StandardGate::T, StandardGate::Tdg),
            (StandardGate::S, StandardGate::Sdg),
            (StandardGate::SX, StandardGate::SXdg),
        ];
        let rules = self_inverse
            .into_iter()
            .map(|g| CancellationRule::SelfInverse(Gate::standard(g)))
            .chain(pairs.into_iter().map(|(a, b)| {
                CancellationRule::InversePair(Gate::standard(a), Gate::standard(b))
            }))
            .collect();
        Self { rules }
    }

    /// Load rules from a JSON array. A gate object is a self-inverse rule,
    /// a two-element array of gate objects is an inverse pair.
    ///
    /// ```
    /// use cadence_compile::passes::InverseCancellation;
    /// use cadence_ir::{Gate, StandardGate};
    ///
    /// let h = serde_json::to_value(Gate::standard(StandardGate::H)).unwrap();
    /// let t = serde_json::to_value(Gate::standard(StandardGate::T)).unwrap();
    /// let tdg = serde_json::to_value(Gate::standard(StandardGate::Tdg)).unwrap();
    ///
    /// let pass = InverseCancellation::from_json(&serde_json::json!([h, [t, tdg]])).unwrap();
    /// assert_eq!(pass.rules().len(), 2);
    ///
    /// assert!(InverseCancellation::from_json(&serde_json::json!(["h"])).is_err());
    /// ```
    pub fn from_json(value: &Value) -> CompileResult<Self> {
        let Value::Array(entries) = value else {
            return Err(CompileError::InvalidConfiguration(
                "cancellation rules must be a JSON array".into(),
            ));
        };
        let gate = |v: &Value| -> CompileResult<Gate> {
            if !v.is_object() {
                return Err(CompileError::InvalidCancellationRule {
                    rule: v.to_string(),
                    reason: "expected a gate object".into(),
                });
            }
            Ok(serde_json::from_value(v.clone())?)
        };

        let mut rules = Vec::with_capacity(entries.len());
        for entry in entries {
            let rule = match entry {
                Value::Object(_) => CancellationRule::SelfInverse(gate(entry)?),
                Value::Array(pair) if pair.len() == 2 => {
                    CancellationRule::InversePair(gate(&pair[0])?, gate(&pair[1])?)
                }
                other => {
                    return Err(CompileError::InvalidCancellationRule {
                        rule: other.to_string(),
                        reason: "expected a gate object or a pair of gate objects".into(),
                    });
                }
            };
            rules.push(rule);
        }
        Self::new(rules)
    }

    pub fn rules(&self) -> &[CancellationRule] {
        &self.rules
    }

    /// Cancel in place, control-flow bodies included. Returns the number of
    /// removed gates.
    pub fn cancel_dag(&self, dag: &mut CircuitDag) -> CompileResult<usize> {
        let mut removed = 0;

        let control_flow: Vec<NodeIndex> = dag
            .topological_ops()
            .filter(|(_, inst)| inst.is_control_flow())
            .map(|(node, _)| node)
            .collect();
        for node in control_flow {
            let Some(flow) = dag
                .get_instruction_mut(node)
                .and_then(|inst| inst.control_flow_mut())
            else {
                continue;
            };
            for block in flow.blocks_mut() {
                let (rewritten, count) = self.cancel_block(block)?;
                *block = rewritten;
                removed += count;
            }
        }

        for node in dag.topological_op_nodes() {
            if !dag.contains_node(node) {
                continue;
            }
            let Some(pred) = self.cancelling_predecessor(dag, node) else {
                continue;
            };
            dag.remove_op(pred)?;
            dag.remove_op(node)?;
            removed += 2;
        }
        Ok(removed)
    }

    fn cancel_block(&self, block: &Block) -> CompileResult<(Block, usize)> {
        let mut dag = CircuitDag::from_block(block)?;
        let removed = self.cancel_dag(&mut dag)?;
        Ok((dag.to_block(), removed))
    }

    /// The gate right before `node` on all its qubits, if the two cancel.
    fn cancelling_predecessor(&self, dag: &CircuitDag, node: NodeIndex) -> Option<NodeIndex> {
        let inst = dag.get_instruction(node)?;
        let gate = inst.as_gate()?;
        let (&first, rest) = inst.qubits.split_first()?;

        let pred = dag.wire_predecessor(node, WireId::Qubit(first))?;
        if rest
            .iter()
            .any(|&q| dag.wire_predecessor(node, WireId::Qubit(q)) != Some(pred))
        {
            return None;
        }
        let pred_inst = dag.get_instruction(pred)?;
        if pred_inst.qubits != inst.qubits || !pred_inst.clbits.is_empty() {
            return None;
        }
        let pred_gate = pred_inst.as_gate()?;
        self.rules
            .iter()
            .any(|rule| rule.matches(pred_gate, gate))
            .then_some(pred)
    }
}

impl Pass for InverseCancellation {
    fn name(&self) -> &'static str {
        "inverse_cancellation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let removed = self.cancel_dag(dag)?;
        if removed > 0 {
            info!("Inverse cancellation removed {removed} gates");
            properties.invalidate(PropertyKey::Schedule);
            properties.invalidate(PropertyKey::DependencyGraph);
        } else {
            debug!("Inverse cancellation found nothing to remove");
        }
        Ok(())
    }

    fn invalidates(&self) -> &[PropertyKey] {
        &[PropertyKey::Schedule, PropertyKey::DependencyGraph]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_ir::{Circuit, QubitId};
    use serde_json::json;
    use std::f64::consts::FRAC_PI_4;

    fn q(i: u32) -> QubitId {
        QubitId(i)
    }

    fn self_inverse(g: StandardGate) -> CancellationRule {
        CancellationRule::SelfInverse(Gate::standard(g))
    }

    fn run(pass: &InverseCancellation, circuit: &Circuit) -> CircuitDag {
        let mut dag = circuit.dag().clone();
        pass.run(&mut dag, &mut PropertySet::new()).unwrap();
        dag
    }

    #[test]
    fn test_rejects_non_inverse_rules() {
        let rx = self_inverse(StandardGate::Rx(0.5.into()));
        assert!(matches!(
            InverseCancellation::new(vec![rx]),
            Err(CompileError::InvalidCancellationRule { .. })
        ));

        let pair = CancellationRule::InversePair(
            Gate::standard(StandardGate::T),
            Gate::standard(StandardGate::T),
        );
        assert!(InverseCancellation::new(vec![pair]).is_err());

        // Rz(pi) squares to -I, not I.
        let rz = self_inverse(StandardGate::Rz(std::f64::consts::PI.into()));
        assert!(InverseCancellation::new(vec![rz]).is_err());
    }

    #[test]
    fn test_rejects_symbolic_rule() {
        let rule = self_inverse(StandardGate::Rz("theta".into()));
        assert!(InverseCancellation::new(vec![rule]).is_err());
    }

    #[test]
    fn test_standard_rules_are_valid() {
        let standard = InverseCancellation::standard_gates();
        assert_eq!(standard.rules().len(), 14);
        assert!(InverseCancellation::new(standard.rules().to_vec()).is_ok());
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let h = serde_json::to_value(Gate::standard(StandardGate::H)).unwrap();
        assert!(InverseCancellation::from_json(&json!(["h"])).is_err());
        assert!(InverseCancellation::from_json(&json!([[h.clone()]])).is_err());
        assert!(InverseCancellation::from_json(&json!({"rules": [h.clone()]})).is_err());
        assert!(InverseCancellation::from_json(&json!([h])).is_ok());
    }

    #[test]
    fn test_self_inverse_parity() {
        let pass = InverseCancellation::new(vec![self_inverse(StandardGate::H)]).unwrap();
        for n in 0..6 {
            let mut circuit = Circuit::with_size("run", 1, 0);
            for _ in 0..n {
                circuit.h(q(0)).unwrap();
            }
            assert_eq!(run(&pass, &circuit).num_ops(), n % 2);
        }
    }

    #[test]
    fn test_cascading_removal() {
        let pass = InverseCancellation::new(vec![
            self_inverse(StandardGate::H),
            self_inverse(StandardGate::X),
        ])
        .unwrap();
        let mut circuit = Circuit::with_size("nest", 1, 0);
        circuit.x(q(0)).unwrap().h(q(0)).unwrap().h(q(0)).unwrap().x(q(0)).unwrap();
        assert_eq!(run(&pass, &circuit).num_ops(), 0);
    }

    #[test]
    fn test_pairs_cancel_left_to_right() {
        let pass = InverseCancellation::new(vec![CancellationRule::InversePair(
            Gate::standard(StandardGate::P(FRAC_PI_4.into())),
            Gate::standard(StandardGate::P((-FRAC_PI_4).into())),
        )])
        .unwrap();

        let mut circuit = Circuit::with_size("alt", 1, 0);
        for angle in [FRAC_PI_4, -FRAC_PI_4, -FRAC_PI_4, FRAC_PI_4, FRAC_PI_4] {
            circuit.p(angle, q(0)).unwrap();
        }
        let dag = run(&pass, &circuit);
        let remaining: Vec<_> = dag.topological_ops().map(|(_, i)| i.clone()).collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(
            remaining[0].as_gate().unwrap(),
            &Gate::standard(StandardGate::P(FRAC_PI_4.into()))
        );
    }

    #[test]
    fn test_qubit_order_matters() {
        let pass = InverseCancellation::new(vec![self_inverse(StandardGate::CX)]).unwrap();
        let mut circuit = Circuit::with_size("rev", 2, 0);
        circuit.cx(q(0), q(1)).unwrap().cx(q(1), q(0)).unwrap();
        assert_eq!(run(&pass, &circuit).num_ops(), 2);
    }

    #[test]
    fn test_open_control_does_not_cancel() {
        let pass = InverseCancellation::new(vec![self_inverse(StandardGate::CX)]).unwrap();
        let mut circuit = Circuit::with_size("ctrl", 2, 0);
        circuit.cx(q(0), q(1)).unwrap();
        circuit
            .gate(
                Gate::standard(StandardGate::CX).with_ctrl_state(0).unwrap(),
                [q(0), q(1)],
            )
            .unwrap();
        assert_eq!(run(&pass, &circuit).num_ops(), 2);
    }

    #[test]
    fn test_unrelated_gate_between_keeps_adjacency() {
        let pass = InverseCancellation::new(vec![self_inverse(StandardGate::CX)]).unwrap();
        let mut circuit = Circuit::with_size("chain", 4, 0);
        circuit.h(q(0)).unwrap().h(q(1)).unwrap();
        circuit.cx(q(0), q(1)).unwrap();
        circuit.cx(q(1), q(2)).unwrap();
        circuit.cx(q(0), q(1)).unwrap();
        circuit.cx(q(2), q(3)).unwrap();
        circuit.cx(q(2), q(3)).unwrap();

        let dag = run(&pass, &circuit);
        assert_eq!(dag.count_ops().get("cx"), Some(&3));
        assert_eq!(dag.count_ops().get("h"), Some(&2));
    }
}
