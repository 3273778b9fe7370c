//! Dynamical decoupling padding.
//!
//! Fills idle time on scheduled qubits with an echo sequence that composes
//! to the identity, e.g. `X X` or `X Y X Y`. The delays around the echo
//! pulses are sized by a spacing distribution and rounded down to the pulse
//! alignment; the rounding residue is redistributed by a
//! [`SlackDistribution`] so that every padded interval keeps its exact
//! length.
//!
//! A single-gate sequence does not compose to the identity on its own. Its
//! inverse is merged into the neighbouring single-qubit gate instead, which
//! becomes a `U` gate; intervals without such a neighbour get a plain delay.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cadence_ir::{
    CircuitDag, DagNode, Gate, Instruction, IrError, QubitId, StandardGate, WireId,
};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::passes::target::scheduling::node_label;
use crate::property::{PropertyKey, PropertySet};
use crate::target::DurationModel;
use crate::unitary::Unitary2x2;

const TOLERANCE: f64 = 1e-9;

/// Where the alignment residue of a padded interval goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlackDistribution {
    /// Aligned part to the middle gap, the rest to the last gap.
    #[default]
    Middle,
    /// Half (aligned) to the first gap, the rest to the last gap.
    Edges,
    /// Aligned units round-robin over all gaps, the rest to the last gap.
    Even,
}

/// How one qubit is padded.
#[derive(Debug, Clone, PartialEq, Eq)]
enum QubitPadding {
    /// `delay` is not available: idle time stays implicit.
    Skip,
    /// Plain delays only.
    DelayOnly,
    /// Echo sequence with these per-gate durations.
    Decouple(Vec<u64>),
}

/// Transformation pass inserting dynamical decoupling sequences.
///
/// Requires a [`Schedule`](super::scheduling::Schedule) for the DAG it runs
/// on. Delays already in the circuit are treated as idle time and re-padded.
/// The schedule is invalidated afterwards.
#[derive(Debug)]
pub struct PadDynamicalDecoupling {
    durations: Arc<dyn DurationModel>,
    sequence: Vec<Gate>,
    matrices: Vec<Unitary2x2>,
    qubits: Option<BTreeSet<QubitId>>,
    spacing: Vec<f64>,
    skip_reset_qubits: bool,
    pulse_alignment: u64,
    slack_distribution: SlackDistribution,
    sequence_phase: f64,
}

impl PadDynamicalDecoupling {
    /// Validate `sequence` against `durations`.
    ///
    /// Every gate must be a single-qubit gate with a numeric matrix known to
    /// the duration model. Sequences of two or more gates must compose to
    /// the identity up to a global phase, which is compensated on every
    /// padded interval.
    pub fn new(durations: Arc<dyn DurationModel>, sequence: Vec<Gate>) -> CompileResult<Self> {
        if sequence.is_empty() {
            return Err(CompileError::InvalidConfiguration(
                "dynamical decoupling sequence is empty".into(),
            ));
        }

        let mut matrices = Vec::with_capacity(sequence.len());
        for gate in &sequence {
            let matrix = (gate.num_qubits() == 1)
                .then(|| Unitary2x2::from_gate(gate))
                .flatten()
                .ok_or_else(|| {
                    CompileError::InvalidConfiguration(format!(
                        "echo gate '{}' must be a single-qubit gate with numeric parameters",
                        gate.name()
                    ))
                })?;
            matrices.push(matrix);
        }

        let mut sequence_phase = 0.0;
        if sequence.len() > 1 {
            let total = matrices
                .iter()
                .fold(Unitary2x2::identity(), |acc, m| m.mul(&acc));
            if !total.is_identity_up_to_phase(TOLERANCE) {
                return Err(CompileError::NonIdentitySequence {
                    sequence: sequence_names(&sequence),
                });
            }
            sequence_phase = Unitary2x2::normalize_angle(-total.data[0].arg());
        }

        for gate in &sequence {
            if !durations.has_instruction(gate.name()) {
                return Err(CompileError::UnsupportedEchoGate {
                    gate: gate.name().to_string(),
                });
            }
        }

        let spacing = default_spacing(sequence.len());
        let pulse_alignment = durations.pulse_alignment().max(1);
        Ok(Self {
            durations,
            sequence,
            matrices,
            qubits: None,
            spacing,
            skip_reset_qubits: true,
            pulse_alignment,
            slack_distribution: SlackDistribution::default(),
            sequence_phase,
        })
    }

    /// Only pad these qubits with echo sequences. Other qubits get delays.
    #[must_use]
    pub fn with_qubits(mut self, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        self.qubits = Some(qubits.into_iter().collect());
        self
    }

    /// Fractions of the slack before, between and after the echo gates.
    ///
    /// Takes `n + 1` entries for an `n`-gate sequence; with `n` entries the
    /// sequence ends on its last gate. Entries must be non-negative and sum
    /// to 1.
    pub fn with_spacing(mut self, spacing: Vec<f64>) -> CompileResult<Self> {
        let n = self.sequence.len();
        let sum: f64 = spacing.iter().sum();
        if spacing.iter().any(|s| *s < 0.0) || (sum - 1.0).abs() > TOLERANCE {
            return Err(CompileError::InvalidConfiguration(format!(
                "spacing {spacing:?} must be non-negative fractions summing to 1"
            )));
        }
        let mut spacing = spacing;
        if spacing.len() == n {
            spacing.push(0.0);
        }
        if spacing.len() != n + 1 {
            return Err(CompileError::InvalidConfiguration(format!(
                "spacing needs {} or {} entries for {n} echo gates, got {}",
                n,
                n + 1,
                spacing.len()
            )));
        }
        self.spacing = spacing;
        Ok(self)
    }

    /// Pad intervals that follow the start of a wire or a reset. Those are
    /// left as plain delays by default, since the qubit is in its ground
    /// state.
    #[must_use]
    pub fn with_skip_reset_qubits(mut self, skip: bool) -> Self {
        self.skip_reset_qubits = skip;
        self
    }

    pub fn with_pulse_alignment(mut self, alignment: u64) -> CompileResult<Self> {
        if alignment == 0 {
            return Err(CompileError::InvalidConfiguration(
                "pulse alignment must be positive".into(),
            ));
        }
        self.pulse_alignment = alignment;
        Ok(self)
    }

    #[must_use]
    pub fn with_slack_distribution(mut self, distribution: SlackDistribution) -> Self {
        self.slack_distribution = distribution;
        self
    }

    pub fn sequence(&self) -> &[Gate] {
        &self.sequence
    }

    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    /// Global phase added per padded interval.
    pub fn sequence_phase(&self) -> f64 {
        self.sequence_phase
    }

    fn qubit_padding(&self, qubit: QubitId) -> CompileResult<QubitPadding> {
        if !self.durations.is_supported("delay", &[qubit]) {
            return Ok(QubitPadding::Skip);
        }
        if self.qubits.as_ref().is_some_and(|q| !q.contains(&qubit)) {
            return Ok(QubitPadding::DelayOnly);
        }

        let mut lengths = Vec::with_capacity(self.sequence.len());
        for gate in &self.sequence {
            let Some(duration) = self.durations.lookup(gate.name(), &[qubit]).fixed() else {
                debug!("Echo gate {} unavailable on {qubit}, padding with delays", gate.name());
                return Ok(QubitPadding::DelayOnly);
            };
            if duration % self.pulse_alignment != 0 {
                return Err(CompileError::UnalignedEchoDuration {
                    gate: gate.name().to_string(),
                    qubit,
                    duration,
                    alignment: self.pulse_alignment,
                });
            }
            lengths.push(duration);
        }
        Ok(QubitPadding::Decouple(lengths))
    }

    /// Fill `[t_start, t_end)` on `qubit` in `dag`. `next` is the operation
    /// about to be applied after the gap, `None` at the end of the wire.
    fn pad(
        &self,
        dag: &mut CircuitDag,
        qubit: QubitId,
        t_start: u64,
        t_end: u64,
        next: Option<&mut Instruction>,
        padding: &QubitPadding,
    ) -> CompileResult<bool> {
        let length = t_end - t_start;
        let prev = dag
            .wire_front(WireId::Qubit(qubit))
            .ok_or(IrError::QubitNotFound {
                qubit,
                op_name: None,
            })?;

        if length % self.pulse_alignment != 0 {
            return Err(CompileError::Misaligned {
                qubit,
                duration: length,
                alignment: self.pulse_alignment,
                after: node_label(dag, prev),
                before: next.map_or_else(|| "output".to_string(), |n| n.name().to_string()),
            });
        }

        let QubitPadding::Decouple(lengths) = padding else {
            dag.apply(Instruction::delay(qubit, length))?;
            return Ok(false);
        };

        let after_ground_state = match dag.node(prev) {
            Some(DagNode::In(_)) => true,
            Some(DagNode::Op(inst)) => inst.is_reset(),
            _ => false,
        };
        let echo_total: u64 = lengths.iter().sum();
        if (self.skip_reset_qubits && after_ground_state) || length <= echo_total {
            dag.apply(Instruction::delay(qubit, length))?;
            return Ok(false);
        }
        let slack = length - echo_total;

        let mut phase = self.sequence_phase;
        if let [echo] = self.matrices.as_slice() {
            let inverse = echo.dagger();
            let next_matrix = next.as_deref().and_then(absorbable_matrix);
            let prev_matrix = dag.get_instruction(prev).and_then(absorbable_matrix);
            match (next, next_matrix, prev_matrix) {
                (Some(next), Some(next_matrix), _) => {
                    *next = u_instruction(&next_matrix.mul(&inverse), qubit, &mut phase);
                }
                (_, _, Some(prev_matrix)) => {
                    let merged = u_instruction(&inverse.mul(&prev_matrix), qubit, &mut phase);
                    dag.substitute_op(prev, merged)?;
                }
                _ => {
                    dag.apply(Instruction::delay(qubit, length))?;
                    return Ok(false);
                }
            }
        }

        let taus = self.distribute(slack);
        for (gate, tau) in self.sequence.iter().zip(&taus) {
            if *tau > 0 {
                dag.apply(Instruction::delay(qubit, *tau))?;
            }
            dag.apply(Instruction::gate(gate.clone(), [qubit]))?;
        }
        if let Some(&last) = taus.last().filter(|t| **t > 0) {
            dag.apply(Instruction::delay(qubit, last))?;
        }

        dag.add_global_phase(phase);
        Ok(true)
    }

    /// Split `slack` into `n + 1` aligned gaps summing to `slack`.
    fn distribute(&self, slack: u64) -> Vec<u64> {
        let align = self.pulse_alignment;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let mut taus: Vec<u64> = self
            .spacing
            .iter()
            .map(|s| align * ((slack as f64 * s) / align as f64).floor() as u64)
            .collect();
        let total: u64 = taus.iter().sum();
        if total > slack {
            // Rounding pushed the gaps past the slack; trim the widest one.
            if let Some(widest) = taus.iter_mut().max() {
                *widest = widest.saturating_sub(total - slack);
            }
        }
        let extra = slack.saturating_sub(taus.iter().sum::<u64>());
        let last = taus.len() - 1;

        match self.slack_distribution {
            SlackDistribution::Middle => {
                let to_middle = align * (extra / align);
                taus[last / 2] += to_middle;
                taus[last] += extra - to_middle;
            }
            SlackDistribution::Edges => {
                let to_begin = align * (extra / 2 / align);
                taus[0] += to_begin;
                taus[last] += extra - to_begin;
            }
            SlackDistribution::Even => {
                let mut gap = 0;
                for _ in 0..extra / align {
                    taus[gap] += align;
                    gap = (gap + 1) % taus.len();
                }
                taus[last] += extra % align;
            }
        }
        taus
    }
}

impl Pass for PadDynamicalDecoupling {
    fn name(&self) -> &'static str {
        "pad_dynamical_decoupling"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let schedule = properties
            .schedule
            .as_ref()
            .ok_or_else(|| CompileError::MissingProperty {
                pass: self.name().to_string(),
                property: PropertyKey::Schedule,
            })?;

        let mut padding = FxHashMap::default();
        for qubit in dag.qubits() {
            padding.insert(qubit, self.qubit_padding(qubit)?);
        }

        let mut new_dag = dag.copy_empty_like();
        let mut idle_after: FxHashMap<QubitId, u64> = dag.qubits().map(|q| (q, 0)).collect();
        let mut padded = 0usize;

        for (node, inst) in dag.topological_ops() {
            let (Some(t0), Some(t1)) = (schedule.start_time(node), schedule.end_time(node)) else {
                return Err(CompileError::UnscheduledNode {
                    name: inst.name().to_string(),
                });
            };
            if inst.is_delay() {
                continue;
            }

            let mut inst = inst.clone();
            for qubit in inst.qubits.clone() {
                let gap_start = idle_after.get(&qubit).copied().unwrap_or(0);
                if let Some(mode) = padding
                    .get(&qubit)
                    .filter(|m| t0 > gap_start && **m != QubitPadding::Skip)
                {
                    let inserted =
                        self.pad(&mut new_dag, qubit, gap_start, t0, Some(&mut inst), mode)?;
                    padded += usize::from(inserted);
                }
                idle_after.insert(qubit, t1);
            }
            new_dag.apply(inst)?;
        }

        let circuit_duration = schedule.circuit_duration();
        let qubits: Vec<QubitId> = new_dag.qubits().collect();
        for qubit in qubits {
            let gap_start = idle_after.get(&qubit).copied().unwrap_or(0);
            if let Some(mode) = padding
                .get(&qubit)
                .filter(|m| circuit_duration > gap_start && **m != QubitPadding::Skip)
            {
                let inserted =
                    self.pad(&mut new_dag, qubit, gap_start, circuit_duration, None, mode)?;
                padded += usize::from(inserted);
            }
        }

        info!(
            "Inserted {} [{}] sequences",
            padded,
            sequence_names(&self.sequence)
        );
        *dag = new_dag;
        properties.invalidate(PropertyKey::Schedule);
        Ok(())
    }

    fn requires(&self) -> &[PropertyKey] {
        &[PropertyKey::Schedule]
    }

    fn invalidates(&self) -> &[PropertyKey] {
        &[PropertyKey::Schedule]
    }
}

/// `[1/2n, 1/n, ..., 1/n, 1/2n]`.
#[allow(clippy::cast_precision_loss)]
fn default_spacing(n: usize) -> Vec<f64> {
    let mid = 1.0 / n as f64;
    let end = mid / 2.0;
    let mut spacing = vec![end];
    spacing.extend(std::iter::repeat_n(mid, n - 1));
    spacing.push(end);
    spacing
}

fn sequence_names(sequence: &[Gate]) -> String {
    sequence
        .iter()
        .map(Gate::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Matrix of a single-qubit gate that can take an absorbed echo.
fn absorbable_matrix(inst: &Instruction) -> Option<Unitary2x2> {
    if inst.qubits.len() != 1 {
        return None;
    }
    Unitary2x2::from_gate(inst.as_gate()?)
}

/// `U` gate equal to `matrix` up to a phase, which is added to `phase`.
fn u_instruction(matrix: &Unitary2x2, qubit: QubitId, phase: &mut f64) -> Instruction {
    let (theta, phi, lambda, global) = matrix.to_u_angles();
    *phase += global;
    Instruction::single_qubit_gate(
        StandardGate::U(theta.into(), phi.into(), lambda.into()),
        qubit,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::target::scheduling::ScheduleAnalysis;
    use crate::target::InstructionDurations;
    use cadence_ir::Circuit;

    fn durations() -> Arc<dyn DurationModel> {
        Arc::new(
            InstructionDurations::new()
                .with_global("x", 50)
                .with_global("y", 50)
                .with_global("h", 50),
        )
    }

    fn xx() -> Vec<Gate> {
        vec![Gate::standard(StandardGate::X), Gate::standard(StandardGate::X)]
    }

    #[test]
    fn test_default_spacing() {
        assert_eq!(default_spacing(1), vec![0.5, 0.5]);
        assert_eq!(default_spacing(2), vec![0.25, 0.5, 0.25]);
    }

    #[test]
    fn test_distribute_never_exceeds_slack() {
        let mut pass = PadDynamicalDecoupling::new(durations(), xx()).unwrap();
        pass.spacing = vec![0.6 + 9e-10, 0.4, 0.0];
        let slack = 1_999_999_900;
        let taus = pass.distribute(slack);
        assert_eq!(taus.iter().sum::<u64>(), slack);
        assert_eq!(taus[2], 0);
    }

    #[test]
    fn test_rejects_non_identity() {
        let sequence = vec![Gate::standard(StandardGate::X), Gate::standard(StandardGate::Y)];
        let err = PadDynamicalDecoupling::new(durations(), sequence).unwrap_err();
        assert!(matches!(err, CompileError::NonIdentitySequence { .. }));
    }

    #[test]
    fn test_rejects_gate_unknown_to_model() {
        let sequence = vec![Gate::standard(StandardGate::Z), Gate::standard(StandardGate::Z)];
        let err = PadDynamicalDecoupling::new(durations(), sequence).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedEchoGate { gate } if gate == "z"));
    }

    #[test]
    fn test_rejects_two_qubit_echo() {
        let sequence = vec![Gate::standard(StandardGate::CX), Gate::standard(StandardGate::CX)];
        assert!(PadDynamicalDecoupling::new(durations(), sequence).is_err());
    }

    #[test]
    fn test_xy4_phase() {
        let sequence = vec![
            Gate::standard(StandardGate::X),
            Gate::standard(StandardGate::Y),
            Gate::standard(StandardGate::X),
            Gate::standard(StandardGate::Y),
        ];
        let pass = PadDynamicalDecoupling::new(durations(), sequence).unwrap();
        assert!((pass.sequence_phase() - std::f64::consts::PI).abs() < 1e-9);

        let xx = PadDynamicalDecoupling::new(durations(), xx()).unwrap();
        assert!(xx.sequence_phase().abs() < 1e-9);
    }

    #[test]
    fn test_spacing_validation() {
        let pass = PadDynamicalDecoupling::new(durations(), xx()).unwrap();
        assert!(pass.with_spacing(vec![0.5, 0.6]).is_err());

        let pass = PadDynamicalDecoupling::new(durations(), xx()).unwrap();
        assert!(pass.with_spacing(vec![0.5, 0.25, 0.25, 0.0]).is_err());

        let pass = PadDynamicalDecoupling::new(durations(), xx())
            .unwrap()
            .with_spacing(vec![0.1, 0.9])
            .unwrap();
        assert_eq!(pass.spacing(), &[0.1, 0.9, 0.0]);
    }

    #[test]
    fn test_distribute_policies() {
        let sequence = vec![
            Gate::standard(StandardGate::X),
            Gate::standard(StandardGate::Y),
            Gate::standard(StandardGate::X),
            Gate::standard(StandardGate::Y),
        ];
        let pass = PadDynamicalDecoupling::new(durations(), sequence).unwrap();
        assert_eq!(pass.distribute(300), vec![37, 75, 76, 75, 37]);

        let pass = pass
            .with_pulse_alignment(10)
            .unwrap()
            .with_slack_distribution(SlackDistribution::Edges);
        assert_eq!(pass.distribute(300), vec![40, 70, 70, 70, 50]);

        let pass = pass.with_slack_distribution(SlackDistribution::Even);
        assert_eq!(pass.distribute(300), vec![40, 80, 80, 70, 30]);
    }

    #[test]
    fn test_requires_schedule() {
        let pass = PadDynamicalDecoupling::new(durations(), xx()).unwrap();
        let mut dag = Circuit::with_size("idle", 1, 0).into_dag();
        let err = pass.run(&mut dag, &mut PropertySet::new()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::MissingProperty { property: PropertyKey::Schedule, .. }
        ));
    }

    #[test]
    fn test_pads_between_gates() {
        let mut circuit = Circuit::with_size("gap", 1, 0);
        circuit.h(QubitId(0)).unwrap();
        circuit.delay(QubitId(0), 500).unwrap();
        circuit.h(QubitId(0)).unwrap();
        let mut dag = circuit.into_dag();

        let mut props = PropertySet::new();
        ScheduleAnalysis::alap(durations()).run(&mut dag, &mut props).unwrap();
        PadDynamicalDecoupling::new(durations(), xx())
            .unwrap()
            .run(&mut dag, &mut props)
            .unwrap();

        let ops: Vec<String> = dag
            .topological_ops()
            .map(|(_, inst)| match inst.delay_duration() {
                Some(d) => format!("delay({d})"),
                None => inst.name().to_string(),
            })
            .collect();
        assert_eq!(
            ops,
            vec!["h", "delay(100)", "x", "delay(200)", "x", "delay(100)", "h"]
        );
        assert!(props.schedule.is_none());
    }
}
