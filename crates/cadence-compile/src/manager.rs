//! Pass manager for orchestrating compilation.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use cadence_ir::{Circuit, CircuitDag, Gate, QubitId};

use crate::error::{CompileError, CompileResult};
use crate::pass::Pass;
use crate::passes::{
    BuildDependencyGraph, InverseCancellation, LinearizeDependencyGraph, PadDynamicalDecoupling,
    ScheduleAnalysis, SchedulingPolicy, SlackDistribution, WireIntegrityCheck,
};
use crate::property::{PropertyKey, PropertySet};
use crate::target::DurationModel;

/// Manages and executes a sequence of compilation passes.
pub struct PassManager {
    /// The passes to execute, in order.
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Create a new empty pass manager.
    pub fn new() -> Self {
        Self { passes: vec![] }
    }

    /// Add a pass to the manager.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Names of the passes, in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Check every pass's prerequisites against what `properties` already
    /// holds plus what earlier passes produce.
    pub fn validate(&self, properties: &PropertySet) -> CompileResult<()> {
        let mut available: FxHashSet<PropertyKey> =
            [PropertyKey::Schedule, PropertyKey::DependencyGraph]
                .into_iter()
                .filter(|key| properties.contains(*key))
                .collect();

        for pass in &self.passes {
            if let Some(missing) = pass.requires().iter().find(|k| !available.contains(*k)) {
                return Err(CompileError::MissingProperty {
                    pass: pass.name().to_string(),
                    property: *missing,
                });
            }
            for key in pass.invalidates() {
                available.remove(key);
            }
            available.extend(pass.produces().iter().copied());
        }
        Ok(())
    }

    /// Run all passes on the given DAG.
    ///
    /// The pipeline is validated first; nothing runs if a prerequisite is
    /// missing.
    #[instrument(skip(self, dag, properties))]
    pub fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        self.validate(properties)?;

        info!(
            "Running pass manager with {} passes on circuit with {} qubits",
            self.passes.len(),
            dag.num_qubits()
        );

        for pass in &self.passes {
            if pass.should_run(dag, properties) {
                debug!("Running pass: {}", pass.name());
                pass.run(dag, properties)?;
                for key in pass.invalidates() {
                    if !pass.produces().contains(key) {
                        properties.invalidate(*key);
                    }
                }
                debug!("Pass {} completed, ops: {}", pass.name(), dag.num_ops());
            } else {
                debug!("Skipping pass: {}", pass.name());
            }
        }

        info!(
            "Pass manager completed, final depth: {}, ops: {}",
            dag.depth(),
            dag.num_ops()
        );

        Ok(())
    }

    /// Compile a circuit with a fresh property set.
    pub fn compile(&self, circuit: Circuit) -> CompileResult<Circuit> {
        let mut dag = circuit.into_dag();
        let mut properties = PropertySet::new();
        self.run(&mut dag, &mut properties)?;
        Ok(Circuit::from_dag(dag))
    }

    /// Get the number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Check if the manager has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduling settings of a [`PipelineConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulingConfig {
    pub policy: SchedulingPolicy,
    pub clbit_write_latency: u64,
}

/// Dynamical-decoupling settings of a [`PipelineConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DynamicalDecouplingConfig {
    /// Echo gates, applied in order.
    pub sequence: Vec<Gate>,
    /// Qubits to pad; all qubits when absent.
    #[serde(default)]
    pub qubits: Option<Vec<QubitId>>,
    /// Fractions of the free time before, between and after the gates.
    #[serde(default)]
    pub spacing: Option<Vec<f64>>,
    #[serde(default = "default_skip_reset_qubits")]
    pub skip_reset_qubits: bool,
    /// Overrides the model's pulse alignment.
    #[serde(default)]
    pub pulse_alignment: Option<u64>,
    #[serde(default)]
    pub slack_distribution: SlackDistribution,
}

fn default_skip_reset_qubits() -> bool {
    true
}

impl DynamicalDecouplingConfig {
    pub fn new(sequence: Vec<Gate>) -> Self {
        Self {
            sequence,
            qubits: None,
            spacing: None,
            skip_reset_qubits: true,
            pulse_alignment: None,
            slack_distribution: SlackDistribution::default(),
        }
    }

    fn build(&self, durations: Arc<dyn DurationModel>) -> CompileResult<PadDynamicalDecoupling> {
        let mut pass = PadDynamicalDecoupling::new(durations, self.sequence.clone())?
            .with_skip_reset_qubits(self.skip_reset_qubits)
            .with_slack_distribution(self.slack_distribution);
        if let Some(qubits) = &self.qubits {
            pass = pass.with_qubits(qubits.iter().copied());
        }
        if let Some(spacing) = &self.spacing {
            pass = pass.with_spacing(spacing.clone())?;
        }
        if let Some(alignment) = self.pulse_alignment {
            pass = pass.with_pulse_alignment(alignment)?;
        }
        Ok(pass)
    }
}

/// Which inverse-cancellation rules to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationConfig {
    /// [`InverseCancellation::standard_gates`].
    Standard,
    /// Rules in the format read by [`InverseCancellation::from_json`].
    Rules(serde_json::Value),
}

/// Serializable description of the canonical pipeline.
///
/// ```
/// use cadence_compile::PipelineConfig;
///
/// let config: PipelineConfig = serde_json::from_str(
///     r#"{ "cancellation": "standard", "scheduling": { "policy": "asap" } }"#,
/// )
/// .unwrap();
/// assert!(config.scheduling.is_some());
/// assert!(!config.dependency_roundtrip);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Rebuild the DAG through its dependency graph first.
    pub dependency_roundtrip: bool,
    pub cancellation: Option<CancellationConfig>,
    pub scheduling: Option<SchedulingConfig>,
    pub dynamical_decoupling: Option<DynamicalDecouplingConfig>,
    /// Finish with a wire integrity check.
    pub verify_integrity: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dependency_roundtrip: false,
            cancellation: None,
            scheduling: None,
            dynamical_decoupling: None,
            verify_integrity: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> CompileResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builder for the canonical pipeline: dependency round trip, inverse
/// cancellation, scheduling, dynamical decoupling, integrity check.
///
/// Every stage is optional. Dynamical decoupling implies an ALAP schedule
/// when no scheduling stage was requested.
#[derive(Default)]
pub struct PassManagerBuilder {
    durations: Option<Arc<dyn DurationModel>>,
    config: PipelineConfig,
    cancellation: Option<InverseCancellation>,
}

impl PassManagerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preset from a configuration. Durations are still supplied
    /// separately.
    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            durations: None,
            config,
            cancellation: None,
        }
    }

    #[must_use]
    pub fn with_durations(mut self, durations: Arc<dyn DurationModel>) -> Self {
        self.durations = Some(durations);
        self
    }

    #[must_use]
    pub fn with_dependency_roundtrip(mut self) -> Self {
        self.config.dependency_roundtrip = true;
        self
    }

    /// Cancel with an already constructed rule set.
    #[must_use]
    pub fn with_inverse_cancellation(mut self, pass: InverseCancellation) -> Self {
        self.cancellation = Some(pass);
        self
    }

    #[must_use]
    pub fn with_scheduling(mut self, policy: SchedulingPolicy) -> Self {
        let scheduling = self.config.scheduling.get_or_insert_with(SchedulingConfig::default);
        scheduling.policy = policy;
        self
    }

    #[must_use]
    pub fn with_clbit_write_latency(mut self, latency: u64) -> Self {
        let scheduling = self.config.scheduling.get_or_insert_with(SchedulingConfig::default);
        scheduling.clbit_write_latency = latency;
        self
    }

    #[must_use]
    pub fn with_dynamical_decoupling(mut self, config: DynamicalDecouplingConfig) -> Self {
        self.config.dynamical_decoupling = Some(config);
        self
    }

    #[must_use]
    pub fn with_integrity_check(mut self, enabled: bool) -> Self {
        self.config.verify_integrity = enabled;
        self
    }

    /// Build the pass manager, constructing and validating every pass.
    pub fn build(self) -> CompileResult<PassManager> {
        let mut pm = PassManager::new();
        let config = self.config;

        if config.dependency_roundtrip {
            pm.add_pass(BuildDependencyGraph::default());
            pm.add_pass(LinearizeDependencyGraph);
        }

        let cancellation = match (self.cancellation, &config.cancellation) {
            (Some(pass), _) => Some(pass),
            (None, Some(CancellationConfig::Standard)) => Some(InverseCancellation::standard_gates()),
            (None, Some(CancellationConfig::Rules(rules))) => {
                Some(InverseCancellation::from_json(rules)?)
            }
            (None, None) => None,
        };
        if let Some(pass) = cancellation {
            pm.add_pass(pass);
        }

        let scheduling = match (&config.scheduling, &config.dynamical_decoupling) {
            (Some(scheduling), _) => Some(scheduling.clone()),
            (None, Some(_)) => Some(SchedulingConfig::default()),
            (None, None) => None,
        };
        if let Some(scheduling) = scheduling {
            let durations = self.durations.clone().ok_or_else(|| {
                CompileError::InvalidConfiguration(
                    "scheduling requires an instruction duration model".into(),
                )
            })?;
            pm.add_pass(
                ScheduleAnalysis::new(scheduling.policy, durations)
                    .with_clbit_write_latency(scheduling.clbit_write_latency),
            );
        }

        if let (Some(dd), Some(durations)) = (&config.dynamical_decoupling, self.durations) {
            pm.add_pass(dd.build(durations)?);
        }

        if config.verify_integrity {
            pm.add_pass(WireIntegrityCheck);
        }

        debug!(passes = ?pm.pass_names(), "Built pass manager");
        Ok(pm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::InstructionDurations;
    use cadence_ir::StandardGate;

    fn durations() -> Arc<dyn DurationModel> {
        Arc::new(
            InstructionDurations::new()
                .with_global("h", 50)
                .with_global("x", 50)
                .with_global("cx", 700),
        )
    }

    #[test]
    fn test_empty_pass_manager() {
        let pm = PassManager::new();
        assert!(pm.is_empty());
        assert_eq!(pm.len(), 0);
    }

    #[test]
    fn test_pass_manager_run() {
        let pm = PassManager::new();
        let mut props = PropertySet::new();

        let mut circuit = Circuit::with_size("test", 2, 0);
        circuit.h(QubitId(0)).unwrap();
        circuit.cx(QubitId(0), QubitId(1)).unwrap();

        let mut dag = circuit.into_dag();
        pm.run(&mut dag, &mut props).unwrap();

        assert_eq!(dag.num_ops(), 2);
    }

    #[test]
    fn test_missing_prerequisite_fails_before_running() {
        let mut pm = PassManager::new();
        pm.add_pass(InverseCancellation::standard_gates());
        pm.add_pass(LinearizeDependencyGraph);

        let mut circuit = Circuit::with_size("test", 1, 0);
        circuit.h(QubitId(0)).unwrap().h(QubitId(0)).unwrap();
        let mut dag = circuit.into_dag();

        let err = pm.run(&mut dag, &mut PropertySet::new()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::MissingProperty {
                property: PropertyKey::DependencyGraph,
                ..
            }
        ));
        // The cancellation pass did not get to run.
        assert_eq!(dag.num_ops(), 2);
    }

    #[test]
    fn test_invalidated_property_is_missing_downstream() {
        let dd = DynamicalDecouplingConfig::new(vec![
            Gate::standard(StandardGate::X),
            Gate::standard(StandardGate::X),
        ])
        .build(durations())
        .unwrap();

        let mut pm = PassManager::new();
        pm.add_pass(ScheduleAnalysis::alap(durations()));
        pm.add_pass(InverseCancellation::standard_gates());
        pm.add_pass(dd);
        assert!(pm.validate(&PropertySet::new()).is_err());
    }

    #[test]
    fn test_builder_order() {
        let pm = PassManagerBuilder::new()
            .with_durations(durations())
            .with_dependency_roundtrip()
            .with_inverse_cancellation(InverseCancellation::standard_gates())
            .with_dynamical_decoupling(DynamicalDecouplingConfig::new(vec![
                Gate::standard(StandardGate::X),
                Gate::standard(StandardGate::X),
            ]))
            .build()
            .unwrap();

        assert_eq!(
            pm.pass_names(),
            vec![
                "build_dependency_graph",
                "linearize_dependency_graph",
                "inverse_cancellation",
                "alap_schedule_analysis",
                "pad_dynamical_decoupling",
                "wire_integrity_check",
            ]
        );
        assert!(pm.validate(&PropertySet::new()).is_ok());
    }

    #[test]
    fn test_scheduling_without_durations_is_rejected() {
        let result = PassManagerBuilder::new()
            .with_scheduling(SchedulingPolicy::Asap)
            .build();
        assert!(matches!(result, Err(CompileError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_config_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.verify_integrity);

        let pm = PassManagerBuilder::from_config(config).build().unwrap();
        assert_eq!(pm.pass_names(), vec!["wire_integrity_check"]);
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        assert!(PipelineConfig::from_json(r#"{ "optimization_level": 2 }"#).is_err());
    }
}
