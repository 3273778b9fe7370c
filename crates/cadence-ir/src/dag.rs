//! DAG-based circuit representation.
//!
//! [`CircuitDag`] stores operations in a petgraph [`StableDiGraph`]: node
//! indices stay valid across removals, so passes can hold on to
//! [`NodeIndex`]es (for example in a schedule) while they rewrite the graph.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::f64::consts::TAU;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex as PetNodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::control_flow::Block;
use crate::error::{IrError, IrResult};
use crate::instruction::Instruction;
use crate::parameter::ParameterExpression;
use crate::qubit::{ClbitId, QubitId};

/// Node index type for the circuit DAG.
pub type NodeIndex = PetNodeIndex<u32>;

/// A node in the circuit DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DagNode {
    /// Start of a wire.
    In(WireId),
    /// End of a wire.
    Out(WireId),
    /// An operation.
    Op(Instruction),
}

impl DagNode {
    #[inline]
    pub fn is_input(&self) -> bool {
        matches!(self, DagNode::In(_))
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        matches!(self, DagNode::Out(_))
    }

    #[inline]
    pub fn is_op(&self) -> bool {
        matches!(self, DagNode::Op(_))
    }

    #[inline]
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            DagNode::Op(inst) => Some(inst),
            _ => None,
        }
    }

    #[inline]
    pub fn instruction_mut(&mut self) -> Option<&mut Instruction> {
        match self {
            DagNode::Op(inst) => Some(inst),
            _ => None,
        }
    }

    /// Short label for diagnostics: `input`, `output` or the operation name.
    pub fn label(&self) -> String {
        match self {
            DagNode::In(_) => "input".to_string(),
            DagNode::Out(_) => "output".to_string(),
            DagNode::Op(inst) => inst.name().to_string(),
        }
    }
}

/// Identifier for a wire in the DAG. Qubit wires sort before clbit wires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WireId {
    Qubit(QubitId),
    Clbit(ClbitId),
}

impl From<QubitId> for WireId {
    fn from(q: QubitId) -> Self {
        WireId::Qubit(q)
    }
}

impl From<ClbitId> for WireId {
    fn from(c: ClbitId) -> Self {
        WireId::Clbit(c)
    }
}

/// An edge in the circuit DAG, labelled with the wire it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DagEdge {
    pub wire: WireId,
}

/// DAG-based circuit representation.
///
/// - every wire has one `In` and one `Out` node;
/// - every operation node has exactly one incoming and one outgoing edge
///   for each wire it acts on, and no others;
/// - following a wire's edges from `In` reaches `Out` and visits that
///   wire's operations in program order.
///
/// A `wire_front` index maps each wire to the node just before its output,
/// so `apply()` appends in O(1) per wire.
///
/// The global phase is a [`ParameterExpression`]; numeric contributions can
/// be added with [`CircuitDag::add_global_phase`] even when the phase is
/// symbolic.
#[derive(Debug, Clone)]
pub struct CircuitDag {
    graph: StableDiGraph<DagNode, DagEdge, u32>,
    qubit_inputs: FxHashMap<QubitId, NodeIndex>,
    qubit_outputs: FxHashMap<QubitId, NodeIndex>,
    clbit_inputs: FxHashMap<ClbitId, NodeIndex>,
    clbit_outputs: FxHashMap<ClbitId, NodeIndex>,
    /// Wires in insertion order.
    qubits: Vec<QubitId>,
    clbits: Vec<ClbitId>,
    wire_front: FxHashMap<WireId, NodeIndex>,
    name: Option<String>,
    metadata: BTreeMap<String, serde_json::Value>,
    global_phase: ParameterExpression,
}

impl CircuitDag {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::default(),
            qubit_inputs: FxHashMap::default(),
            qubit_outputs: FxHashMap::default(),
            clbit_inputs: FxHashMap::default(),
            clbit_outputs: FxHashMap::default(),
            qubits: vec![],
            clbits: vec![],
            wire_front: FxHashMap::default(),
            name: None,
            metadata: BTreeMap::new(),
            global_phase: ParameterExpression::default(),
        }
    }

    /// A DAG with qubits `0..num_qubits` and clbits `0..num_clbits`.
    pub fn with_wires(num_qubits: u32, num_clbits: u32) -> Self {
        let mut dag = Self::new();
        for q in 0..num_qubits {
            dag.add_qubit(QubitId(q));
        }
        for c in 0..num_clbits {
            dag.add_clbit(ClbitId(c));
        }
        dag
    }

    /// Same wires, name, metadata and global phase, but no operations.
    pub fn copy_empty_like(&self) -> Self {
        let mut dag = Self::new();
        for &q in &self.qubits {
            dag.add_qubit(q);
        }
        for &c in &self.clbits {
            dag.add_clbit(c);
        }
        dag.name.clone_from(&self.name);
        dag.metadata.clone_from(&self.metadata);
        dag.global_phase = self.global_phase.clone();
        dag
    }

    /// Add a qubit wire. Adding an existing qubit is a no-op.
    pub fn add_qubit(&mut self, qubit: QubitId) {
        if self.qubit_inputs.contains_key(&qubit) {
            return;
        }
        let (in_node, out_node) = self.add_wire(WireId::Qubit(qubit));
        self.qubit_inputs.insert(qubit, in_node);
        self.qubit_outputs.insert(qubit, out_node);
        self.qubits.push(qubit);
    }

    /// Add a classical wire. Adding an existing bit is a no-op.
    pub fn add_clbit(&mut self, clbit: ClbitId) {
        if self.clbit_inputs.contains_key(&clbit) {
            return;
        }
        let (in_node, out_node) = self.add_wire(WireId::Clbit(clbit));
        self.clbit_inputs.insert(clbit, in_node);
        self.clbit_outputs.insert(clbit, out_node);
        self.clbits.push(clbit);
    }

    fn add_wire(&mut self, wire: WireId) -> (NodeIndex, NodeIndex) {
        let in_node = self.graph.add_node(DagNode::In(wire));
        let out_node = self.graph.add_node(DagNode::Out(wire));
        self.graph.add_edge(in_node, out_node, DagEdge { wire });
        self.wire_front.insert(wire, in_node);
        (in_node, out_node)
    }

    /// Append an instruction at the end of its wires.
    pub fn apply(&mut self, instruction: Instruction) -> IrResult<NodeIndex> {
        instruction.validate_arity()?;
        let op_name = || Some(instruction.name().to_string());

        let mut seen = FxHashSet::default();
        for &qubit in &instruction.qubits {
            if !self.qubit_inputs.contains_key(&qubit) {
                return Err(IrError::QubitNotFound {
                    qubit,
                    op_name: op_name(),
                });
            }
            if !seen.insert(qubit) {
                return Err(IrError::DuplicateQubit {
                    qubit,
                    op_name: op_name(),
                });
            }
        }
        let mut seen_clbits = FxHashSet::default();
        for &clbit in &instruction.clbits {
            if !self.clbit_inputs.contains_key(&clbit) || !seen_clbits.insert(clbit) {
                return Err(IrError::ClbitNotFound {
                    clbit,
                    op_name: op_name(),
                });
            }
        }

        let wires = wires_of(&instruction);
        let op_node = self.graph.add_node(DagNode::Op(instruction));
        for wire in wires {
            self.splice_before_output(wire, op_node)?;
        }
        Ok(op_node)
    }

    /// Insert `op_node` between the current wire front and the output node.
    fn splice_before_output(&mut self, wire: WireId, op_node: NodeIndex) -> IrResult<()> {
        let out_node = self.output_node(wire).ok_or_else(|| missing_wire(wire))?;
        let prev_node = self
            .wire_front
            .get(&wire)
            .copied()
            .ok_or_else(|| missing_wire(wire))?;

        let edge_id = self
            .graph
            .edges_directed(prev_node, Direction::Outgoing)
            .find(|e| e.weight().wire == wire && e.target() == out_node)
            .map(|e| e.id())
            .ok_or_else(|| {
                IrError::InvalidDag(format!("Missing edge into output of wire {wire:?}"))
            })?;
        self.graph.remove_edge(edge_id);
        self.graph.add_edge(prev_node, op_node, DagEdge { wire });
        self.graph.add_edge(op_node, out_node, DagEdge { wire });
        self.wire_front.insert(wire, op_node);
        Ok(())
    }

    /// All nodes (boundary nodes included) in a deterministic topological
    /// order: among ready nodes the smallest index goes first.
    pub fn topological_nodes(&self) -> Vec<NodeIndex> {
        let mut in_degree: FxHashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| (n, self.graph.edges_directed(n, Direction::Incoming).count()))
            .collect();
        let mut ready: BinaryHeap<Reverse<NodeIndex>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| Reverse(*node))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&edge.target()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(edge.target()));
                    }
                }
            }
        }
        order
    }

    /// Operation nodes in topological order.
    pub fn topological_op_nodes(&self) -> Vec<NodeIndex> {
        self.topological_nodes()
            .into_iter()
            .filter(|&n| self.graph[n].is_op())
            .collect()
    }

    /// Operations in topological order.
    pub fn topological_ops(&self) -> impl Iterator<Item = (NodeIndex, &Instruction)> {
        self.topological_op_nodes()
            .into_iter()
            .filter_map(|idx| self.get_instruction(idx).map(|inst| (idx, inst)))
    }

    #[inline]
    pub fn node(&self, node: NodeIndex) -> Option<&DagNode> {
        self.graph.node_weight(node)
    }

    #[inline]
    pub fn contains_node(&self, node: NodeIndex) -> bool {
        self.graph.contains_node(node)
    }

    #[inline]
    pub fn get_instruction(&self, node: NodeIndex) -> Option<&Instruction> {
        self.graph.node_weight(node).and_then(|n| n.instruction())
    }

    /// Mutable access to an operation. Callers must not change its wires;
    /// use [`CircuitDag::substitute_op`] for checked replacement.
    #[inline]
    pub fn get_instruction_mut(&mut self, node: NodeIndex) -> Option<&mut Instruction> {
        self.graph
            .node_weight_mut(node)
            .and_then(|n| n.instruction_mut())
    }

    /// Replace the operation at `node` by one acting on the same wires.
    pub fn substitute_op(
        &mut self,
        node: NodeIndex,
        instruction: Instruction,
    ) -> IrResult<Instruction> {
        instruction.validate_arity()?;
        let slot = self.get_instruction_mut(node).ok_or(IrError::InvalidNode)?;
        if slot.qubits != instruction.qubits || slot.clbits != instruction.clbits {
            return Err(IrError::InvalidDag(format!(
                "Cannot substitute '{}' with '{}' on different wires",
                slot.name(),
                instruction.name()
            )));
        }
        Ok(std::mem::replace(slot, instruction))
    }

    /// Remove an operation node and reconnect each of its wires.
    ///
    /// Indices of the other nodes are unaffected.
    pub fn remove_op(&mut self, node: NodeIndex) -> IrResult<Instruction> {
        if !self.graph.node_weight(node).is_some_and(DagNode::is_op) {
            return Err(IrError::InvalidNode);
        }
        let incoming: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| (e.source(), e.weight().wire))
            .collect();
        let outgoing: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.target(), e.weight().wire))
            .collect();

        for (pred, wire) in &incoming {
            if self.wire_front.get(wire) == Some(&node) {
                self.wire_front.insert(*wire, *pred);
            }
        }

        let Some(DagNode::Op(instruction)) = self.graph.remove_node(node) else {
            return Err(IrError::InvalidNode);
        };

        for (pred, wire) in &incoming {
            for (succ, succ_wire) in &outgoing {
                if wire == succ_wire {
                    self.graph.add_edge(*pred, *succ, DagEdge { wire: *wire });
                }
            }
        }
        Ok(instruction)
    }

    /// The node preceding `node` on `wire`.
    pub fn wire_predecessor(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|e| e.weight().wire == wire)
            .map(|e| e.source())
    }

    /// The node following `node` on `wire`.
    pub fn wire_successor(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find(|e| e.weight().wire == wire)
            .map(|e| e.target())
    }

    pub fn input_node(&self, wire: WireId) -> Option<NodeIndex> {
        match wire {
            WireId::Qubit(q) => self.qubit_inputs.get(&q).copied(),
            WireId::Clbit(c) => self.clbit_inputs.get(&c).copied(),
        }
    }

    pub fn output_node(&self, wire: WireId) -> Option<NodeIndex> {
        match wire {
            WireId::Qubit(q) => self.qubit_outputs.get(&q).copied(),
            WireId::Clbit(c) => self.clbit_outputs.get(&c).copied(),
        }
    }

    /// The last node on `wire` before its output (the input node if the wire
    /// is empty).
    #[inline]
    pub fn wire_front(&self, wire: WireId) -> Option<NodeIndex> {
        self.wire_front.get(&wire).copied()
    }

    /// Operation nodes on `wire`, in program order.
    pub fn nodes_on_wire(&self, wire: WireId) -> Vec<NodeIndex> {
        let mut nodes = vec![];
        let Some(mut current) = self.input_node(wire) else {
            return nodes;
        };
        while let Some(next) = self.wire_successor(current, wire) {
            if !self.graph[next].is_op() {
                break;
            }
            nodes.push(next);
            current = next;
        }
        nodes
    }

    /// Number of qubit wires.
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.qubits.len()
    }

    /// Number of classical wires.
    #[inline]
    pub fn num_clbits(&self) -> usize {
        self.clbits.len()
    }

    /// Number of operation nodes.
    #[inline]
    pub fn num_ops(&self) -> usize {
        let io_nodes = 2 * (self.qubits.len() + self.clbits.len());
        self.graph.node_count().saturating_sub(io_nodes)
    }

    /// Operation counts by name.
    pub fn count_ops(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for inst in self.graph.node_weights().filter_map(DagNode::instruction) {
            *counts.entry(inst.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Longest path counted in operations.
    pub fn depth(&self) -> usize {
        let mut depths: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        let mut max_depth = 0usize;
        for node in self.topological_nodes() {
            let max_pred_depth = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .map(|e| depths.get(&e.source()).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            let node_depth = max_pred_depth + usize::from(self.graph[node].is_op());
            max_depth = max_depth.max(node_depth);
            depths.insert(node, node_depth);
        }
        max_depth
    }

    /// Qubits in insertion order.
    pub fn qubits(&self) -> impl Iterator<Item = QubitId> + '_ {
        self.qubits.iter().copied()
    }

    /// Clbits in insertion order.
    pub fn clbits(&self) -> impl Iterator<Item = ClbitId> + '_ {
        self.clbits.iter().copied()
    }

    /// All wires, qubits first.
    pub fn wires(&self) -> impl Iterator<Item = WireId> + '_ {
        self.qubits()
            .map(WireId::Qubit)
            .chain(self.clbits().map(WireId::Clbit))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Program-level metadata, carried unchanged through every pass.
    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut BTreeMap<String, serde_json::Value> {
        &mut self.metadata
    }

    pub fn global_phase(&self) -> &ParameterExpression {
        &self.global_phase
    }

    pub fn set_global_phase(&mut self, phase: impl Into<ParameterExpression>) {
        self.global_phase = phase.into();
    }

    /// Add a numeric contribution to the global phase.
    pub fn add_global_phase(&mut self, phase: f64) {
        self.global_phase = self.global_phase.accumulate(phase);
    }

    pub fn graph(&self) -> &StableDiGraph<DagNode, DagEdge, u32> {
        &self.graph
    }

    /// Build a DAG from a control-flow body. Wires are the body's local
    /// wires `0..n`.
    pub fn from_block(block: &Block) -> IrResult<Self> {
        let mut dag = Self::with_wires(block.num_qubits, block.num_clbits);
        dag.global_phase = block.global_phase.clone();
        for inst in &block.instructions {
            dag.apply(inst.clone())?;
        }
        Ok(dag)
    }

    /// Linearize back into a body, in topological order.
    pub fn to_block(&self) -> Block {
        Block {
            num_qubits: u32::try_from(self.qubits.len()).unwrap_or(u32::MAX),
            num_clbits: u32::try_from(self.clbits.len()).unwrap_or(u32::MAX),
            instructions: self.topological_ops().map(|(_, inst)| inst.clone()).collect(),
            global_phase: self.global_phase.clone(),
        }
    }

    /// For every wire (sorted), the operations on it in order, each paired
    /// with that node's position along each of its own wires. Two DAGs with
    /// equal signatures have the same wire-wise structure.
    fn wire_signature(&self) -> BTreeMap<WireId, Vec<(&Instruction, Vec<usize>)>> {
        let mut position: FxHashMap<(NodeIndex, WireId), usize> = FxHashMap::default();
        let mut on_wire = BTreeMap::new();
        for wire in self.wires() {
            let nodes = self.nodes_on_wire(wire);
            for (i, &node) in nodes.iter().enumerate() {
                position.insert((node, wire), i);
            }
            on_wire.insert(wire, nodes);
        }
        on_wire
            .into_iter()
            .map(|(wire, nodes)| {
                let ops = nodes
                    .into_iter()
                    .filter_map(|node| {
                        let inst = self.get_instruction(node)?;
                        let coords = wires_of(inst)
                            .into_iter()
                            .map(|w| position.get(&(node, w)).copied().unwrap_or(usize::MAX))
                            .collect();
                        Some((inst, coords))
                    })
                    .collect();
                (wire, ops)
            })
            .collect()
    }

    /// Verify the wire invariants.
    ///
    /// Checks that the graph is acyclic, that every wire runs from its
    /// input node to its output node, and that each operation has exactly
    /// one incoming and one outgoing edge per operand wire and no others.
    pub fn verify_integrity(&self) -> IrResult<()> {
        if self.topological_nodes().len() != self.graph.node_count() {
            return Err(IrError::InvalidDag("Graph contains a cycle".into()));
        }

        for wire in self.wires() {
            let (Some(in_node), Some(out_node)) = (self.input_node(wire), self.output_node(wire))
            else {
                return Err(missing_wire(wire));
            };
            let mut current = in_node;
            let mut steps = 0;
            while current != out_node {
                current = self.wire_successor(current, wire).ok_or_else(|| {
                    IrError::InvalidDag(format!(
                        "Wire {wire:?} is broken: no outgoing edge from node {current:?}"
                    ))
                })?;
                steps += 1;
                if steps > self.graph.node_count() {
                    return Err(IrError::InvalidDag(format!(
                        "Wire {wire:?} does not terminate"
                    )));
                }
            }
            if self.wire_front.get(&wire) != self.wire_predecessor(out_node, wire).as_ref() {
                return Err(IrError::InvalidDag(format!(
                    "Stale wire front for {wire:?}"
                )));
            }
        }

        for node in self.graph.node_indices() {
            let Some(inst) = self.get_instruction(node) else {
                continue;
            };
            let mut expected = wires_of(inst);
            expected.sort();
            for direction in [Direction::Incoming, Direction::Outgoing] {
                let mut actual: Vec<WireId> = self
                    .graph
                    .edges_directed(node, direction)
                    .map(|e| e.weight().wire)
                    .collect();
                actual.sort();
                if actual != expected {
                    return Err(IrError::InvalidDag(format!(
                        "Operation '{}' at {node:?} has {direction:?} wires {actual:?}, expected {expected:?}",
                        inst.name()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for CircuitDag {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural equality: same wires, same operations in the same order on
/// every wire with the same multi-wire joins, same global phase (modulo
/// 2π) and same metadata. Node indices are not compared.
impl PartialEq for CircuitDag {
    fn eq(&self, other: &Self) -> bool {
        let mut lhs_wires: Vec<_> = self.wires().collect();
        let mut rhs_wires: Vec<_> = other.wires().collect();
        lhs_wires.sort();
        rhs_wires.sort();
        lhs_wires == rhs_wires
            && phases_equal(&self.global_phase, &other.global_phase)
            && self.metadata == other.metadata
            && self.wire_signature() == other.wire_signature()
    }
}

fn phases_equal(a: &ParameterExpression, b: &ParameterExpression) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => {
            let diff = (x - y).rem_euclid(TAU);
            diff < 1e-9 || TAU - diff < 1e-9
        }
        _ => a.approx_eq(b, 1e-9),
    }
}

/// Operand wires of an instruction: qubits, then clbits.
fn wires_of(inst: &Instruction) -> Vec<WireId> {
    inst.qubits
        .iter()
        .map(|&q| WireId::Qubit(q))
        .chain(inst.clbits.iter().map(|&c| WireId::Clbit(c)))
        .collect()
}

fn missing_wire(wire: WireId) -> IrError {
    match wire {
        WireId::Qubit(qubit) => IrError::QubitNotFound {
            qubit,
            op_name: None,
        },
        WireId::Clbit(clbit) => IrError::ClbitNotFound {
            clbit,
            op_name: None,
        },
    }
}
