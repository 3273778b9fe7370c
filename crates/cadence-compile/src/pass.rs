//! Pass trait and types for compilation passes.

use cadence_ir::CircuitDag;

use crate::error::CompileResult;
use crate::property::{PropertyKey, PropertySet};

/// The kind of compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Analysis pass that reads but does not modify the DAG.
    Analysis,
    /// Transformation pass that modifies the DAG.
    Transformation,
}

/// A compilation pass that operates on a circuit DAG.
///
/// Passes declare which standard properties they read, write and discard so
/// the [`PassManager`](crate::PassManager) can reject a pipeline with a
/// missing prerequisite before anything runs.
pub trait Pass: Send + Sync {
    /// Get the name of this pass.
    fn name(&self) -> &str;

    /// Get the kind of this pass.
    fn kind(&self) -> PassKind;

    /// Run the pass on the given DAG.
    ///
    /// Analysis passes must leave the DAG untouched and report through the
    /// `PropertySet`. Transformation passes rewrite the DAG in place or
    /// replace it wholesale.
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()>;

    /// Check if this pass should run based on current state.
    fn should_run(&self, _dag: &CircuitDag, _properties: &PropertySet) -> bool {
        true
    }

    /// Properties that must be present before the pass runs.
    fn requires(&self) -> &[PropertyKey] {
        &[]
    }

    /// Properties present after the pass runs.
    fn produces(&self) -> &[PropertyKey] {
        &[]
    }

    /// Properties no longer valid after the pass runs.
    fn invalidates(&self) -> &[PropertyKey] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestPass;

    impl Pass for TestPass {
        fn name(&self) -> &'static str {
            "test"
        }

        fn kind(&self) -> PassKind {
            PassKind::Transformation
        }

        fn run(&self, _dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pass_kind() {
        let pass = TestPass;
        assert_eq!(pass.kind(), PassKind::Transformation);
        assert_eq!(pass.name(), "test");
        assert!(pass.requires().is_empty());
        assert!(pass.produces().is_empty());
        assert!(pass.invalidates().is_empty());
    }
}
