//! Governance analysis tasks: the pluggable-unit contract, the closed set of
//! task kinds, and the catalog used to instantiate them by name.

pub mod gas;
pub mod mev;
pub mod result;
pub mod scanner;

pub use gas::{GasOptimizerParams, GasParameterOptimizer};
pub use mev::{MevCostEstimator, MevEstimatorParams, MevVector};
pub use result::{
    ArbitrageAssessment, Finding, FindingKind, FrontrunningAssessment, GasPriceBand,
    GasRecommendations, LiquidationAssessment, MevReport, MevVectors, PairRisk,
    RecommendationQuality, RiskLevel, SandwichAssessment, ScanReport, Severity, TaskReport,
    TaskResult,
};
pub use scanner::{ProposalSanityScanner, ScannerParams};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::context::{Requirements, TaskContext};
use crate::error::{AnalystError, Result};

/// Closed set of analysis task kinds.
///
/// The wire names match the registry keys the rest of the system uses
/// (`GasParameterOptimizer`, `ProposalSanityScanner`, `MEVCostEstimator`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    GasParameterOptimizer,
    ProposalSanityScanner,
    MevCostEstimator,
}

/// Audit category tag attached to ledger actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    GasOptimization,
    SecurityAnalysis,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GasOptimization => "gas_optimization",
            Self::SecurityAnalysis => "security_analysis",
        }
    }
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        TaskKind::GasParameterOptimizer,
        TaskKind::ProposalSanityScanner,
        TaskKind::MevCostEstimator,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GasParameterOptimizer => "GasParameterOptimizer",
            Self::ProposalSanityScanner => "ProposalSanityScanner",
            Self::MevCostEstimator => "MEVCostEstimator",
        }
    }

    pub fn category(&self) -> TaskCategory {
        match self {
            Self::GasParameterOptimizer => TaskCategory::GasOptimization,
            Self::ProposalSanityScanner | Self::MevCostEstimator => {
                TaskCategory::SecurityAnalysis
            }
        }
    }

    pub fn parse(name: &str) -> Option<TaskKind> {
        TaskKind::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self> {
        TaskKind::parse(s).ok_or_else(|| AnalystError::UnknownTaskName(s.to_string()))
    }
}

/// Per-execution instantiation inputs: a task id (generated when absent) and
/// optional parameter overrides.
#[derive(Debug, Clone, Default)]
pub struct TaskSpec {
    pub task_id: Option<String>,
    pub parameters: Option<Value>,
}

impl TaskSpec {
    pub fn with_parameters(parameters: Value) -> Self {
        Self {
            task_id: None,
            parameters: Some(parameters),
        }
    }

    /// Resolve the task id, generating `task-<uuid>` when none was supplied.
    pub fn resolve_id(&self) -> String {
        self.task_id
            .clone()
            .unwrap_or_else(|| format!("task-{}", Uuid::new_v4()))
    }

    /// Deserialize the parameter overrides into a typed parameter struct,
    /// falling back to defaults when none were supplied.
    pub fn parameters_as<P>(&self, kind: TaskKind) -> Result<P>
    where
        P: serde::de::DeserializeOwned + Default,
    {
        match &self.parameters {
            None => Ok(P::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                AnalystError::InvalidParameters {
                    task: kind.name().to_string(),
                    message: e.to_string(),
                }
            }),
        }
    }
}

/// Contract every pluggable analysis unit implements.
///
/// `requires` must be pure and stable across calls for a given parameter
/// set. `execute` never panics and never propagates an error: internal
/// computation failures come back as `TaskResult { success: false, .. }`.
pub trait AnalysisTask: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> TaskKind;
    fn task_id(&self) -> &str;
    fn requires(&self) -> Requirements;
    fn execute(&self, context: &TaskContext) -> TaskResult;
}

type TaskFactory = fn(TaskSpec) -> Result<Box<dyn AnalysisTask>>;

/// Catalog of registered task implementations.
///
/// Constructed once at startup and passed by reference wherever tasks are
/// created; there is no process-global registry. Registration order is
/// preserved for listing.
pub struct TaskCatalog {
    entries: Vec<(TaskKind, TaskFactory)>,
}

impl TaskCatalog {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Catalog with the three built-in governance tasks registered.
    pub fn with_builtin_tasks() -> Self {
        let mut catalog = Self::new();
        catalog
            .register(TaskKind::GasParameterOptimizer, GasParameterOptimizer::boxed)
            .expect("empty catalog");
        catalog
            .register(TaskKind::ProposalSanityScanner, ProposalSanityScanner::boxed)
            .expect("empty catalog");
        catalog
            .register(TaskKind::MevCostEstimator, MevCostEstimator::boxed)
            .expect("empty catalog");
        catalog
    }

    /// Register a task factory. Registering the same kind twice is a
    /// conflict error rather than a silent overwrite.
    pub fn register(&mut self, kind: TaskKind, factory: TaskFactory) -> Result<()> {
        if self.entries.iter().any(|(k, _)| *k == kind) {
            return Err(AnalystError::DuplicateTask(kind.name().to_string()));
        }
        info!(task = kind.name(), "Registering task");
        self.entries.push((kind, factory));
        Ok(())
    }

    /// All registered task names in registration order.
    pub fn list_tasks(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(k, _)| k.name()).collect()
    }

    pub fn contains(&self, kind: TaskKind) -> bool {
        self.entries.iter().any(|(k, _)| *k == kind)
    }

    /// Instantiate a registered task kind.
    pub fn create(&self, kind: TaskKind, spec: TaskSpec) -> Result<Box<dyn AnalysisTask>> {
        let factory = self
            .entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, f)| *f)
            .ok_or_else(|| AnalystError::TaskNotFound(kind.name().to_string()))?;
        factory(spec)
    }

    /// Instantiate by wire name, with an optional id and parameter
    /// overrides.
    pub fn create_task(
        &self,
        name: &str,
        task_id: Option<String>,
        parameters: Option<Value>,
    ) -> Result<Box<dyn AnalysisTask>> {
        let kind = TaskKind::parse(name)
            .ok_or_else(|| AnalystError::UnknownTaskName(name.to_string()))?;
        self.create(kind, TaskSpec { task_id, parameters })
    }

    /// Declared requirements of a registered task (with default parameters).
    pub fn requirements_of(&self, kind: TaskKind) -> Result<Requirements> {
        Ok(self.create(kind, TaskSpec::default())?.requires())
    }

    /// Every registered task whose own requirements cover the queried ones,
    /// per category, in registration order.
    pub fn find_tasks_for_requirements(&self, requirements: &Requirements) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter_map(|(kind, factory)| {
                let task = factory(TaskSpec::default()).ok()?;
                requirements
                    .is_subset_of(&task.requires())
                    .then(|| kind.name())
            })
            .collect()
    }
}

impl Default for TaskCatalog {
    fn default() -> Self {
        Self::with_builtin_tasks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_name() {
        for kind in TaskKind::ALL {
            assert_eq!(TaskKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(TaskKind::parse("NoSuchTask"), None);
    }

    #[test]
    fn test_list_tasks_registration_order() {
        let catalog = TaskCatalog::with_builtin_tasks();
        assert_eq!(
            catalog.list_tasks(),
            vec![
                "GasParameterOptimizer",
                "ProposalSanityScanner",
                "MEVCostEstimator"
            ]
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut catalog = TaskCatalog::with_builtin_tasks();
        let err = catalog
            .register(TaskKind::GasParameterOptimizer, GasParameterOptimizer::boxed)
            .unwrap_err();
        assert!(matches!(err, AnalystError::DuplicateTask(_)));
    }

    #[test]
    fn test_create_unknown_name_fails() {
        let catalog = TaskCatalog::with_builtin_tasks();
        let err = catalog.create_task("FeeSweeper", None, None).unwrap_err();
        assert!(matches!(err, AnalystError::UnknownTaskName(_)));
    }

    #[test]
    fn test_create_generates_task_id() {
        let catalog = TaskCatalog::with_builtin_tasks();
        let task = catalog
            .create_task("GasParameterOptimizer", None, None)
            .unwrap();
        assert!(task.task_id().starts_with("task-"));

        let named = catalog
            .create_task("GasParameterOptimizer", Some("task-42".into()), None)
            .unwrap();
        assert_eq!(named.task_id(), "task-42");
    }

    #[test]
    fn test_requires_invariant_across_parameters() {
        let catalog = TaskCatalog::with_builtin_tasks();
        for kind in TaskKind::ALL {
            let defaults = catalog.create(kind, TaskSpec::default()).unwrap();
            let tuned = catalog
                .create(
                    kind,
                    TaskSpec::with_parameters(serde_json::json!({"sample_size": 7})),
                )
                .unwrap();
            assert_eq!(defaults.requires(), tuned.requires(), "{}", kind);
        }
    }

    #[test]
    fn test_find_tasks_for_requirements() {
        let catalog = TaskCatalog::with_builtin_tasks();
        let query = Requirements::new().require("blockchain", ["gas_prices"]);
        let matches = catalog.find_tasks_for_requirements(&query);
        // Every task whose own blockchain requirements include gas_prices.
        assert_eq!(matches, vec!["GasParameterOptimizer", "MEVCostEstimator"]);

        let defi_query = Requirements::new().require("defi", ["trading_pairs"]);
        assert_eq!(
            catalog.find_tasks_for_requirements(&defi_query),
            vec!["MEVCostEstimator"]
        );

        let unknown = Requirements::new().require("blockchain", ["no_such_field"]);
        assert!(catalog.find_tasks_for_requirements(&unknown).is_empty());
    }
}
