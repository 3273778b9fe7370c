//! ALAP and ASAP scheduling analysis.
//!
//! Both policies assign every operation node a start time from the
//! durations in a [`DurationModel`]. Delays use their own duration and
//! barriers take no time. The result is stored as a [`Schedule`] in the
//! property set for the padding passes.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cadence_ir::{CircuitDag, DagNode, Instruction, NodeIndex, QubitId, WireId};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{PropertyKey, PropertySet};
use crate::target::{DurationLookup, DurationModel};

/// Scheduling policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    /// As late as possible: idle time collects at the start of each wire.
    #[default]
    Alap,
    /// As soon as possible: idle time collects at the end of each wire.
    Asap,
}

/// Start times of every operation node of a DAG.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    policy: SchedulingPolicy,
    start_times: FxHashMap<NodeIndex, u64>,
    durations: FxHashMap<NodeIndex, u64>,
    circuit_duration: u64,
}

/// A gap on one qubit between two nodes.
///
/// `after` is the last non-delay node before the gap (possibly the wire's
/// input node) and `before` the first one after it (possibly the output
/// node).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleInterval {
    pub start: u64,
    pub end: u64,
    pub after: NodeIndex,
    pub before: NodeIndex,
}

impl IdleInterval {
    pub fn duration(&self) -> u64 {
        self.end - self.start
    }
}

impl Schedule {
    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    pub fn start_time(&self, node: NodeIndex) -> Option<u64> {
        self.start_times.get(&node).copied()
    }

    pub fn duration(&self, node: NodeIndex) -> Option<u64> {
        self.durations.get(&node).copied()
    }

    pub fn end_time(&self, node: NodeIndex) -> Option<u64> {
        Some(self.start_time(node)? + self.duration(node)?)
    }

    /// Maximum end time over all wires.
    pub fn circuit_duration(&self) -> u64 {
        self.circuit_duration
    }

    pub fn len(&self) -> usize {
        self.start_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start_times.is_empty()
    }

    /// Positive-length gaps per qubit. Delays count as idle time.
    ///
    /// Nodes missing from the schedule are skipped, so call this on the DAG
    /// the schedule was computed for.
    pub fn idle_intervals(&self, dag: &CircuitDag) -> BTreeMap<QubitId, Vec<IdleInterval>> {
        let mut result = BTreeMap::new();
        for qubit in dag.qubits() {
            let wire = WireId::Qubit(qubit);
            let (Some(input), Some(output)) = (dag.input_node(wire), dag.output_node(wire))
            else {
                continue;
            };

            let mut intervals = vec![];
            let mut idle_after = 0;
            let mut after = input;
            for node in dag.nodes_on_wire(wire) {
                let is_delay = dag.get_instruction(node).is_some_and(Instruction::is_delay);
                let (Some(start), Some(end)) = (self.start_time(node), self.end_time(node)) else {
                    continue;
                };
                if is_delay {
                    continue;
                }
                if start > idle_after {
                    intervals.push(IdleInterval {
                        start: idle_after,
                        end: start,
                        after,
                        before: node,
                    });
                }
                idle_after = end;
                after = node;
            }
            if self.circuit_duration > idle_after {
                intervals.push(IdleInterval {
                    start: idle_after,
                    end: self.circuit_duration,
                    after,
                    before: output,
                });
            }
            result.insert(qubit, intervals);
        }
        result
    }
}

/// Analysis pass computing a [`Schedule`].
///
/// `clbit_write_latency` models the delay between the start of a
/// measurement and the moment its result lands in the classical register;
/// with the default of 0 classical bits are written at the end of the
/// measurement.
#[derive(Debug, Clone)]
pub struct ScheduleAnalysis {
    policy: SchedulingPolicy,
    durations: Arc<dyn DurationModel>,
    clbit_write_latency: u64,
}

impl ScheduleAnalysis {
    pub fn new(policy: SchedulingPolicy, durations: Arc<dyn DurationModel>) -> Self {
        Self {
            policy,
            durations,
            clbit_write_latency: 0,
        }
    }

    pub fn alap(durations: Arc<dyn DurationModel>) -> Self {
        Self::new(SchedulingPolicy::Alap, durations)
    }

    pub fn asap(durations: Arc<dyn DurationModel>) -> Self {
        Self::new(SchedulingPolicy::Asap, durations)
    }

    #[must_use]
    pub fn with_clbit_write_latency(mut self, latency: u64) -> Self {
        self.clbit_write_latency = latency;
        self
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Compute the schedule without touching a property set.
    pub fn schedule(&self, dag: &CircuitDag) -> CompileResult<Schedule> {
        let order = dag.topological_op_nodes();
        let mut durations = FxHashMap::default();
        for &node in &order {
            if let Some(inst) = dag.get_instruction(node) {
                durations.insert(node, node_duration(inst, self.durations.as_ref())?);
            }
        }

        let schedule = match self.policy {
            SchedulingPolicy::Asap => self.asap_times(dag, &order, durations),
            SchedulingPolicy::Alap => self.alap_times(dag, &order, durations),
        };
        Ok(schedule)
    }

    fn asap_times(
        &self,
        dag: &CircuitDag,
        order: &[NodeIndex],
        durations: FxHashMap<NodeIndex, u64>,
    ) -> Schedule {
        let mut idle_after: FxHashMap<WireId, u64> = dag.wires().map(|w| (w, 0)).collect();
        let mut start_times = FxHashMap::default();

        for &node in order {
            let Some(inst) = dag.get_instruction(node) else {
                continue;
            };
            let duration = durations.get(&node).copied().unwrap_or(0);
            let qubit_wires = || inst.qubits.iter().map(|&q| WireId::Qubit(q));
            let clbit_wires = || inst.clbits.iter().map(|&c| WireId::Clbit(c));

            let (t0, written_clbits) = if inst.is_measure() {
                let t0q = latest(&idle_after, qubit_wires());
                let t0c = latest(&idle_after, clbit_wires());
                (t0q.max(t0c.saturating_sub(self.clbit_write_latency)), true)
            } else if inst.is_gate() || inst.is_delay() {
                (latest(&idle_after, qubit_wires()), false)
            } else {
                (latest(&idle_after, qubit_wires().chain(clbit_wires())), true)
            };
            let t1 = t0 + duration;

            for wire in qubit_wires() {
                idle_after.insert(wire, t1);
            }
            if written_clbits {
                for wire in clbit_wires() {
                    idle_after.insert(wire, t1);
                }
            }
            start_times.insert(node, t0);
        }

        Schedule {
            policy: SchedulingPolicy::Asap,
            start_times,
            durations,
            circuit_duration: idle_after.values().copied().max().unwrap_or(0),
        }
    }

    fn alap_times(
        &self,
        dag: &CircuitDag,
        order: &[NodeIndex],
        durations: FxHashMap<NodeIndex, u64>,
    ) -> Schedule {
        // Times here count backwards from the end of the circuit.
        let mut idle_before: FxHashMap<WireId, u64> = dag.wires().map(|w| (w, 0)).collect();
        let mut end_times = FxHashMap::default();

        for &node in order.iter().rev() {
            let Some(inst) = dag.get_instruction(node) else {
                continue;
            };
            let duration = durations.get(&node).copied().unwrap_or(0);
            let qubit_wires = || inst.qubits.iter().map(|&q| WireId::Qubit(q));
            let clbit_wires = || inst.clbits.iter().map(|&c| WireId::Clbit(c));

            let t0 = if inst.is_gate() || inst.is_delay() {
                latest(&idle_before, qubit_wires())
            } else {
                latest(&idle_before, qubit_wires().chain(clbit_wires()))
            };
            let t1 = t0 + duration;

            if inst.is_measure() {
                let written = t0 + duration.saturating_sub(self.clbit_write_latency);
                for wire in clbit_wires() {
                    idle_before.insert(wire, written);
                }
            } else if !inst.is_gate() && !inst.is_delay() {
                for wire in clbit_wires() {
                    idle_before.insert(wire, t1);
                }
            }
            for wire in qubit_wires() {
                idle_before.insert(wire, t1);
            }
            end_times.insert(node, t1);
        }

        let circuit_duration = idle_before.values().copied().max().unwrap_or(0);
        Schedule {
            policy: SchedulingPolicy::Alap,
            start_times: end_times
                .into_iter()
                .map(|(node, t1)| (node, circuit_duration - t1))
                .collect(),
            durations,
            circuit_duration,
        }
    }
}

/// Latest time over `wires`, 0 for none.
fn latest(times: &FxHashMap<WireId, u64>, wires: impl Iterator<Item = WireId>) -> u64 {
    wires
        .map(|w| times.get(&w).copied().unwrap_or(0))
        .max()
        .unwrap_or(0)
}

/// Duration of one instruction under `model`.
pub(crate) fn node_duration(inst: &Instruction, model: &dyn DurationModel) -> CompileResult<u64> {
    if let Some(duration) = inst.delay_duration() {
        return Ok(duration);
    }
    if inst.is_barrier() {
        return Ok(0);
    }
    match model.lookup(inst.name(), &inst.qubits) {
        DurationLookup::Fixed(duration) => Ok(duration),
        DurationLookup::Parametric | DurationLookup::Unsupported => {
            Err(CompileError::MissingDuration {
                name: inst.name().to_string(),
                qubits: inst.qubits.clone(),
            })
        }
    }
}

impl Pass for ScheduleAnalysis {
    fn name(&self) -> &str {
        match self.policy {
            SchedulingPolicy::Alap => "alap_schedule_analysis",
            SchedulingPolicy::Asap => "asap_schedule_analysis",
        }
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let schedule = self.schedule(dag)?;
        info!(
            "{:?} schedule: {} operations, duration {}",
            self.policy,
            schedule.len(),
            schedule.circuit_duration()
        );
        properties.schedule = Some(schedule);
        Ok(())
    }

    fn produces(&self) -> &[PropertyKey] {
        &[PropertyKey::Schedule]
    }
}

/// Label of a DAG node for error messages: `input`, `output` or the name.
pub(crate) fn node_label(dag: &CircuitDag, node: NodeIndex) -> String {
    dag.node(node).map_or_else(|| "?".to_string(), DagNode::label)
}
