//! Wire integrity verification.

use tracing::debug;

use cadence_ir::CircuitDag;

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Analysis pass checking that every wire still forms a single path from
/// its input node to its output node.
///
/// Run it last to catch a transformation that left a dangling edge or
/// skipped a wire while rewiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireIntegrityCheck;

impl Pass for WireIntegrityCheck {
    fn name(&self) -> &'static str {
        "wire_integrity_check"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        dag.verify_integrity()?;
        debug!(wires = dag.wires().count(), "Wire integrity verified");
        Ok(())
    }
}
