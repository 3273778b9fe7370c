//! Instruction durations and device targets.
//!
//! Scheduling and padding never read durations directly; they go through the
//! [`DurationModel`] trait. Two sources implement it:
//!
//! - [`InstructionDurations`]: a flat table, keyed by name and optionally by
//!   qubit tuple, where a qubit-specific entry beats the name-wide one;
//! - [`Target`]: per-operation, per-qubit-tuple properties. An operation can
//!   be absent for a tuple (unsupported there) or present with no duration
//!   (legal, but timed per instance, like `delay`).
//!
//! Both load from JSON device descriptions.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use cadence_ir::QubitId;

use crate::error::CompileResult;

/// Result of a duration query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationLookup {
    /// Supported, with a fixed duration.
    Fixed(u64),
    /// Supported, but the duration comes from the instruction instance.
    Parametric,
    /// Not available on these qubits.
    Unsupported,
}

impl DurationLookup {
    pub fn fixed(self) -> Option<u64> {
        match self {
            DurationLookup::Fixed(d) => Some(d),
            _ => None,
        }
    }
}

/// Source of operation durations and placement legality.
pub trait DurationModel: Send + Sync + fmt::Debug {
    /// Duration of `name` on the ordered qubit tuple `qubits`.
    fn lookup(&self, name: &str, qubits: &[QubitId]) -> DurationLookup;

    /// Whether `name` is known on any qubits at all.
    fn has_instruction(&self, name: &str) -> bool;

    /// Whether `name` may be placed on `qubits`, regardless of duration.
    fn is_supported(&self, name: &str, qubits: &[QubitId]) -> bool {
        !matches!(self.lookup(name, qubits), DurationLookup::Unsupported)
    }

    /// Granularity that pulse start times must be multiples of.
    fn pulse_alignment(&self) -> u64 {
        1
    }
}

/// One row of a duration table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationEntry {
    pub name: String,
    /// `None` applies to every qubit tuple.
    #[serde(default)]
    pub qubits: Option<Vec<QubitId>>,
    pub duration: u64,
}

/// A flat duration table.
///
/// `delay` is always supported with an instance-specific duration.
#[derive(Debug, Clone, Default)]
pub struct InstructionDurations {
    global: FxHashMap<String, u64>,
    specific: FxHashMap<(String, Vec<QubitId>), u64>,
    names: FxHashSet<String>,
}

impl InstructionDurations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite an entry.
    pub fn insert(&mut self, name: impl Into<String>, qubits: Option<Vec<QubitId>>, duration: u64) {
        let name = name.into();
        self.names.insert(name.clone());
        match qubits {
            Some(qubits) => {
                self.specific.insert((name, qubits), duration);
            }
            None => {
                self.global.insert(name, duration);
            }
        }
    }

    /// Entry for `name` on the given qubit tuple.
    #[must_use]
    pub fn with(mut self, name: &str, qubits: &[u32], duration: u64) -> Self {
        self.insert(name, Some(qubits.iter().copied().map(QubitId).collect()), duration);
        self
    }

    /// Entry for `name` on every qubit tuple.
    #[must_use]
    pub fn with_global(mut self, name: &str, duration: u64) -> Self {
        self.insert(name, None, duration);
        self
    }

    pub fn from_entries(entries: impl IntoIterator<Item = DurationEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.insert(entry.name, entry.qubits, entry.duration);
        }
        table
    }

    /// Parse a JSON array of [`DurationEntry`] rows.
    pub fn from_json(json: &str) -> CompileResult<Self> {
        let entries: Vec<DurationEntry> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl DurationModel for InstructionDurations {
    fn lookup(&self, name: &str, qubits: &[QubitId]) -> DurationLookup {
        if name == "delay" {
            return DurationLookup::Parametric;
        }
        self.specific
            .get(&(name.to_string(), qubits.to_vec()))
            .or_else(|| self.global.get(name))
            .map_or(DurationLookup::Unsupported, |&d| DurationLookup::Fixed(d))
    }

    fn has_instruction(&self, name: &str) -> bool {
        name == "delay" || self.names.contains(name)
    }
}

/// Where an operation is legal on a [`Target`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    /// Every qubit tuple, same duration.
    Global(Option<u64>),
    /// Only the listed tuples.
    Qargs(FxHashMap<Vec<QubitId>, Option<u64>>),
}

/// Per-qubit device description.
#[derive(Debug, Clone)]
pub struct Target {
    num_qubits: Option<u32>,
    pulse_alignment: u64,
    instructions: BTreeMap<String, Placement>,
}

impl Default for Target {
    fn default() -> Self {
        Self::new()
    }
}

impl Target {
    pub fn new() -> Self {
        Self {
            num_qubits: None,
            pulse_alignment: 1,
            instructions: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_num_qubits(mut self, num_qubits: u32) -> Self {
        self.num_qubits = Some(num_qubits);
        self
    }

    #[must_use]
    pub fn with_pulse_alignment(mut self, alignment: u64) -> Self {
        self.pulse_alignment = alignment.max(1);
        self
    }

    pub fn num_qubits(&self) -> Option<u32> {
        self.num_qubits
    }

    /// Register `name` on specific qubit tuples. A `None` duration marks the
    /// placement legal with an instance-specific duration. Repeated calls
    /// extend the tuple set.
    pub fn add_instruction(
        &mut self,
        name: impl Into<String>,
        qargs: impl IntoIterator<Item = (Vec<QubitId>, Option<u64>)>,
    ) {
        let entry = self
            .instructions
            .entry(name.into())
            .or_insert_with(|| Placement::Qargs(FxHashMap::default()));
        if let Placement::Global(_) = entry {
            *entry = Placement::Qargs(FxHashMap::default());
        }
        if let Placement::Qargs(map) = entry {
            map.extend(qargs);
        }
    }

    /// Register `name` as available on every qubit tuple.
    pub fn add_global_instruction(&mut self, name: impl Into<String>, duration: Option<u64>) {
        self.instructions
            .insert(name.into(), Placement::Global(duration));
    }

    /// Shorthand for a single-qubit operation on qubits `0..n` with one
    /// duration for all of them.
    #[must_use]
    pub fn with_single_qubit(mut self, name: &str, qubits: &[u32], duration: Option<u64>) -> Self {
        self.add_instruction(name, qubits.iter().map(|&q| (vec![QubitId(q)], duration)));
        self
    }

    /// Shorthand for one multi-qubit placement.
    #[must_use]
    pub fn with_qargs(mut self, name: &str, qubits: &[u32], duration: Option<u64>) -> Self {
        self.add_instruction(
            name,
            [(qubits.iter().copied().map(QubitId).collect(), duration)],
        );
        self
    }

    /// Names of all registered operations.
    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.instructions.keys().map(String::as_str)
    }

    /// Parse a JSON device description, see [`TargetDescription`].
    pub fn from_json(json: &str) -> CompileResult<Self> {
        let description: TargetDescription = serde_json::from_str(json)?;
        Ok(Self::from_description(description))
    }

    pub fn from_description(description: TargetDescription) -> Self {
        let mut target = Self::new().with_pulse_alignment(description.pulse_alignment);
        target.num_qubits = description.num_qubits;
        for inst in description.instructions {
            match inst.qargs {
                None => target.add_global_instruction(inst.name, inst.duration),
                Some(qargs) => target.add_instruction(
                    inst.name,
                    qargs.into_iter().map(|q| (q.qubits, q.duration)),
                ),
            }
        }
        target
    }
}

impl DurationModel for Target {
    fn lookup(&self, name: &str, qubits: &[QubitId]) -> DurationLookup {
        let duration = match self.instructions.get(name) {
            None => return DurationLookup::Unsupported,
            Some(Placement::Global(duration)) => *duration,
            Some(Placement::Qargs(map)) => match map.get(qubits) {
                Some(duration) => *duration,
                None => return DurationLookup::Unsupported,
            },
        };
        duration.map_or(DurationLookup::Parametric, DurationLookup::Fixed)
    }

    fn has_instruction(&self, name: &str) -> bool {
        self.instructions.contains_key(name)
    }

    fn pulse_alignment(&self) -> u64 {
        self.pulse_alignment
    }
}

/// Serialized form of a [`Target`].
///
/// ```json
/// {
///   "pulse_alignment": 1,
///   "instructions": [
///     {"name": "x", "qargs": [{"qubits": [0], "duration": 50}]},
///     {"name": "delay"}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDescription {
    #[serde(default)]
    pub num_qubits: Option<u32>,
    #[serde(default = "default_alignment")]
    pub pulse_alignment: u64,
    pub instructions: Vec<TargetInstructionDescription>,
}

/// One operation of a [`TargetDescription`]. Without `qargs` the operation is
/// available everywhere with `duration`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetInstructionDescription {
    pub name: String,
    #[serde(default)]
    pub qargs: Option<Vec<QargSpec>>,
    #[serde(default)]
    pub duration: Option<u64>,
}

/// One legal placement of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QargSpec {
    pub qubits: Vec<QubitId>,
    #[serde(default)]
    pub duration: Option<u64>,
}

fn default_alignment() -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(ids: &[u32]) -> Vec<QubitId> {
        ids.iter().copied().map(QubitId).collect()
    }

    #[test]
    fn test_specific_entry_beats_global() {
        let table = InstructionDurations::new()
            .with_global("x", 50)
            .with("x", &[1], 60);
        assert_eq!(table.lookup("x", &q(&[0])), DurationLookup::Fixed(50));
        assert_eq!(table.lookup("x", &q(&[1])), DurationLookup::Fixed(60));
        assert_eq!(table.lookup("y", &q(&[0])), DurationLookup::Unsupported);
        assert_eq!(table.lookup("delay", &q(&[3])), DurationLookup::Parametric);
        assert!(table.has_instruction("x"));
        assert!(!table.has_instruction("y"));
    }

    #[test]
    fn test_qubit_order_matters() {
        let table = InstructionDurations::new().with("cx", &[0, 1], 700);
        assert_eq!(table.lookup("cx", &q(&[0, 1])), DurationLookup::Fixed(700));
        assert_eq!(table.lookup("cx", &q(&[1, 0])), DurationLookup::Unsupported);
    }

    #[test]
    fn test_durations_from_json() {
        let table = InstructionDurations::from_json(
            r#"[{"name": "h", "qubits": [0], "duration": 50},
                {"name": "measure", "duration": 1000}]"#,
        )
        .unwrap();
        assert_eq!(table.lookup("h", &q(&[0])).fixed(), Some(50));
        assert_eq!(table.lookup("measure", &q(&[4])).fixed(), Some(1000));
        assert!(InstructionDurations::from_json("{").is_err());
    }

    #[test]
    fn test_target_support_without_duration() {
        let target = Target::new()
            .with_single_qubit("x", &[0, 1], Some(100))
            .with_single_qubit("delay", &[0, 1, 2], None);
        assert_eq!(target.lookup("x", &q(&[0])), DurationLookup::Fixed(100));
        assert_eq!(target.lookup("x", &q(&[2])), DurationLookup::Unsupported);
        assert_eq!(target.lookup("delay", &q(&[2])), DurationLookup::Parametric);
        assert!(target.is_supported("delay", &q(&[2])));
        assert!(!target.is_supported("delay", &q(&[3])));
        assert!(target.has_instruction("x"));
        assert!(!target.has_instruction("y"));
    }

    #[test]
    fn test_target_global_instruction() {
        let mut target = Target::new();
        target.add_global_instruction("barrier", Some(0));
        assert_eq!(target.lookup("barrier", &q(&[0, 5])), DurationLookup::Fixed(0));
    }

    #[test]
    fn test_target_from_json() {
        let target = Target::from_json(
            r#"{
                "pulse_alignment": 16,
                "instructions": [
                    {"name": "x", "qargs": [{"qubits": [0], "duration": 160}, {"qubits": [1]}]},
                    {"name": "delay"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(target.pulse_alignment(), 16);
        assert_eq!(target.lookup("x", &q(&[0])), DurationLookup::Fixed(160));
        assert_eq!(target.lookup("x", &q(&[1])), DurationLookup::Parametric);
        assert_eq!(target.lookup("delay", &q(&[7])), DurationLookup::Parametric);
        assert_eq!(target.operation_names().collect::<Vec<_>>(), vec!["delay", "x"]);
    }
}
