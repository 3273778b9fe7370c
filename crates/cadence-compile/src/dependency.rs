//! Commutation-aware dependency graph.
//!
//! [`DagDependency`] keeps an edge between two operations only when they
//! share a wire and do not commute, so any topological order of it is an
//! equivalent program. Nodes are indexed in the topological order of the
//! source DAG, which lets [`DagDependency::to_dag`] reproduce that order
//! exactly by always emitting the smallest ready index.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use tracing::debug;

use cadence_ir::{CircuitDag, ClbitId, Instruction, ParameterExpression, QubitId};

use crate::commutation::CommutationChecker;
use crate::error::CompileResult;

/// Dependency graph of a circuit.
#[derive(Debug, Clone)]
pub struct DagDependency {
    graph: DiGraph<Instruction, (), u32>,
    qubits: Vec<QubitId>,
    clbits: Vec<ClbitId>,
    name: Option<String>,
    metadata: BTreeMap<String, serde_json::Value>,
    global_phase: ParameterExpression,
}

impl DagDependency {
    /// Build from a DAG.
    ///
    /// Each new operation scans the ones already placed from the most recent
    /// backwards. A non-commuting operation that is still reachable gets an
    /// edge, and everything it depends on is covered transitively.
    pub fn from_dag(dag: &CircuitDag, checker: &CommutationChecker) -> Self {
        let mut graph = DiGraph::default();
        for (_, inst) in dag.topological_ops() {
            let current = graph.add_node(inst.clone());
            let m = current.index();
            let mut reachable = vec![true; m];

            for prev in (0..m).rev() {
                let prev_idx = NodeIndex::new(prev);
                let blocks = reachable[prev] && !checker.commute(&graph[prev_idx], &graph[current]);
                if blocks {
                    graph.add_edge(prev_idx, current, ());
                }
                if blocks || !reachable[prev] {
                    let preds: Vec<_> = graph
                        .neighbors_directed(prev_idx, Direction::Incoming)
                        .collect();
                    for pred in preds {
                        reachable[pred.index()] = false;
                    }
                }
            }
        }
        debug!(
            "Dependency graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Self {
            graph,
            qubits: dag.qubits().collect(),
            clbits: dag.clbits().collect(),
            name: dag.name().map(str::to_string),
            metadata: dag.metadata().clone(),
            global_phase: dag.global_phase().clone(),
        }
    }

    /// Linearize back into a DAG, smallest ready index first.
    pub fn to_dag(&self) -> CompileResult<CircuitDag> {
        let mut dag = CircuitDag::new();
        for &q in &self.qubits {
            dag.add_qubit(q);
        }
        for &c in &self.clbits {
            dag.add_clbit(c);
        }
        if let Some(name) = &self.name {
            dag.set_name(name.clone());
        }
        dag.metadata_mut().clone_from(&self.metadata);
        dag.set_global_phase(self.global_phase.clone());

        for node in self.topological_nodes() {
            dag.apply(self.graph[node].clone())?;
        }
        Ok(dag)
    }

    /// Deterministic topological order: among ready nodes the smallest index
    /// goes first.
    pub fn topological_nodes(&self) -> Vec<NodeIndex> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for succ in self.graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[succ.index()] -= 1;
                if in_degree[succ.index()] == 0 {
                    ready.push(Reverse(succ));
                }
            }
        }
        order
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn instruction(&self, node: NodeIndex) -> Option<&Instruction> {
        self.graph.node_weight(node)
    }

    pub fn graph(&self) -> &DiGraph<Instruction, (), u32> {
        &self.graph
    }

    pub fn direct_predecessors(&self, node: NodeIndex) -> BTreeSet<NodeIndex> {
        self.graph
            .neighbors_directed(node, Direction::Incoming)
            .collect()
    }

    pub fn direct_successors(&self, node: NodeIndex) -> BTreeSet<NodeIndex> {
        self.graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect()
    }

    /// Every node `node` transitively depends on.
    pub fn predecessors(&self, node: NodeIndex) -> BTreeSet<NodeIndex> {
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, node);
        let mut result = BTreeSet::new();
        while let Some(n) = dfs.next(reversed) {
            if n != node {
                result.insert(n);
            }
        }
        result
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn global_phase(&self) -> &ParameterExpression {
        &self.global_phase
    }
}
