//! Passes converting between the circuit DAG and its dependency graph.

use tracing::debug;

use cadence_ir::CircuitDag;

use crate::commutation::CommutationChecker;
use crate::dependency::DagDependency;
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{PropertyKey, PropertySet};

/// Analysis pass storing the commutation-aware dependency graph of the DAG.
#[derive(Debug, Clone, Default)]
pub struct BuildDependencyGraph {
    checker: CommutationChecker,
}

impl BuildDependencyGraph {
    pub fn new(checker: CommutationChecker) -> Self {
        Self { checker }
    }
}

impl Pass for BuildDependencyGraph {
    fn name(&self) -> &'static str {
        "build_dependency_graph"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let graph = DagDependency::from_dag(dag, &self.checker);
        debug!(
            nodes = graph.len(),
            edges = graph.num_edges(),
            "Built dependency graph"
        );
        properties.dependency_graph = Some(graph);
        Ok(())
    }

    fn produces(&self) -> &[PropertyKey] {
        &[PropertyKey::DependencyGraph]
    }
}

/// Transformation pass replacing the DAG with the linearized dependency
/// graph.
///
/// Linearization picks the lowest-numbered ready node first, so a graph
/// built from a DAG reproduces that DAG exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearizeDependencyGraph;

impl Pass for LinearizeDependencyGraph {
    fn name(&self) -> &'static str {
        "linearize_dependency_graph"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let graph = properties
            .dependency_graph
            .take()
            .ok_or_else(|| CompileError::MissingProperty {
                pass: self.name().to_string(),
                property: PropertyKey::DependencyGraph,
            })?;
        *dag = graph.to_dag()?;
        properties.invalidate(PropertyKey::Schedule);
        debug!(ops = dag.num_ops(), "Linearized dependency graph");
        Ok(())
    }

    fn requires(&self) -> &[PropertyKey] {
        &[PropertyKey::DependencyGraph]
    }

    fn invalidates(&self) -> &[PropertyKey] {
        &[PropertyKey::DependencyGraph, PropertyKey::Schedule]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_ir::{Circuit, QubitId};

    #[test]
    fn test_round_trip_through_properties() {
        let mut circuit = Circuit::with_size("rt", 3, 0);
        circuit
            .h(QubitId(0))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .cx(QubitId(0), QubitId(2))
            .unwrap()
            .x(QubitId(1))
            .unwrap();
        let original = circuit.dag().clone();

        let mut dag = original.clone();
        let mut props = PropertySet::new();
        BuildDependencyGraph::default().run(&mut dag, &mut props).unwrap();
        assert!(props.contains(PropertyKey::DependencyGraph));

        LinearizeDependencyGraph.run(&mut dag, &mut props).unwrap();
        assert!(!props.contains(PropertyKey::DependencyGraph));
        assert_eq!(dag, original);
    }

    #[test]
    fn test_linearize_requires_graph() {
        let mut dag = CircuitDag::with_wires(1, 0);
        let err = LinearizeDependencyGraph
            .run(&mut dag, &mut PropertySet::new())
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::MissingProperty {
                property: PropertyKey::DependencyGraph,
                ..
            }
        ));
    }
}
