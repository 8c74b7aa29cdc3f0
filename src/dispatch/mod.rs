//! Task dispatch.
//!
//! The dispatcher is the only path callers should execute tasks through: it
//! validates the context against the task's declared requirements, records
//! the run on the agency ledger, executes inside the secure wrapper, and
//! anchors significant outcomes. Failures never cross this boundary as
//! errors; they come back as `success: false` results.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::DispatchConfig;
use crate::context::TaskContext;
use crate::enclave::{Attestation, SecureExecutor};
use crate::error::AnalystError;
use crate::ledger::AgencyLedger;
use crate::provider::ChainSnapshot;
use crate::tasks::{
    RecommendationQuality, RiskLevel, TaskCatalog, TaskKind, TaskResult, TaskSpec,
};

/// A task execution wrapped with its bookkeeping metadata.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub task_name: &'static str,
    pub task_id: Option<String>,
    pub action_id: Option<String>,
    pub outcome_id: Option<String>,
    pub anchored: bool,
    pub tx_hash: Option<String>,
    pub attestation: Option<Attestation>,
    pub result: TaskResult,
}

impl DispatchOutcome {
    fn failed(task_name: &'static str, error: impl Into<String>) -> Self {
        Self {
            task_name,
            task_id: None,
            action_id: None,
            outcome_id: None,
            anchored: false,
            tx_hash: None,
            attestation: None,
            result: TaskResult::failed(error),
        }
    }
}

pub struct TaskDispatcher {
    catalog: Arc<TaskCatalog>,
    ledger: Arc<dyn AgencyLedger>,
    executor: Arc<dyn SecureExecutor>,
    config: DispatchConfig,
}

impl TaskDispatcher {
    pub fn new(
        catalog: Arc<TaskCatalog>,
        ledger: Arc<dyn AgencyLedger>,
        executor: Arc<dyn SecureExecutor>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            catalog,
            ledger,
            executor,
            config,
        }
    }

    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    /// Execute a registered task against the supplied context.
    pub fn execute(
        &self,
        kind: TaskKind,
        context: &TaskContext,
        parameters: Option<Value>,
    ) -> DispatchOutcome {
        let task_name = kind.name();
        info!(task = task_name, "Executing governance task");

        let task = match self.catalog.create(
            kind,
            TaskSpec {
                task_id: None,
                parameters,
            },
        ) {
            Ok(task) => task,
            Err(e) => {
                warn!(task = task_name, error = %e, "Task instantiation failed");
                return DispatchOutcome::failed(task_name, e.to_string());
            }
        };
        let task_id = task.task_id().to_string();

        // The validator is authoritative for declared requirements: a
        // context that fails it is refused before anything is logged.
        let requirements = task.requires();
        let missing = requirements.missing_from(context);
        if !missing.is_empty() {
            warn!(task = task_name, ?missing, "Missing required data");
            let error = AnalystError::MissingData {
                task: task_name.to_string(),
                missing: missing.clone(),
            };
            return DispatchOutcome {
                task_name,
                task_id: Some(task_id),
                action_id: None,
                outcome_id: None,
                anchored: false,
                tx_hash: None,
                attestation: None,
                result: TaskResult::failed(error.to_string())
                    .with_metadata("missing", json!(missing)),
            };
        }

        let action_id = match self.ledger.log_action(
            &self.config.agent_id,
            &format!("EXECUTE_TASK_{}", kind.category().as_str().to_uppercase()),
            &format!("Execute governance task: {}", task_name),
            json!({
                "task_id": task_id,
                "task_name": task_name,
                "requirements": requirements,
            }),
        ) {
            Ok(id) => id,
            Err(e) => {
                warn!(task = task_name, error = %e, "Failed to log action");
                let mut outcome = DispatchOutcome::failed(task_name, e.to_string());
                outcome.task_id = Some(task_id);
                return outcome;
            }
        };

        let receipt = match self.executor.execute(task.as_ref(), context) {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(task = task_name, error = %e, "Secure execution failed");
                let mut outcome = DispatchOutcome::failed(task_name, e.to_string());
                outcome.task_id = Some(task_id);
                outcome.action_id = Some(action_id);
                return outcome;
            }
        };
        let result = receipt.result;

        let outcome_id = self
            .ledger
            .record_outcome(
                &action_id,
                result.success,
                self.config.default_impact_score,
                serde_json::to_value(&result).unwrap_or(Value::Null),
            )
            .ok();

        let mut anchored = false;
        let mut tx_hash = None;
        if self.is_significant(&result) {
            match self.ledger.anchor_action(&action_id) {
                Ok(hash) => {
                    anchored = true;
                    tx_hash = Some(hash);
                }
                Err(e) => warn!(task = task_name, error = %e, "Failed to anchor action"),
            }
        }

        DispatchOutcome {
            task_name,
            task_id: Some(task_id),
            action_id: Some(action_id),
            outcome_id,
            anchored,
            tx_hash,
            attestation: Some(receipt.attestation),
            result,
        }
    }

    /// Execute by wire name; unknown names come back as failed results.
    pub fn execute_by_name(
        &self,
        name: &str,
        context: &TaskContext,
        parameters: Option<Value>,
    ) -> DispatchOutcome {
        match TaskKind::parse(name) {
            Some(kind) => self.execute(kind, context, parameters),
            None => {
                warn!(task = name, "Unknown task name");
                DispatchOutcome::failed(
                    "unknown",
                    AnalystError::UnknownTaskName(name.to_string()).to_string(),
                )
            }
        }
    }

    /// An outcome is worth anchoring when it is successful and either risky,
    /// a high-confidence recommendation, or an expensive MEV estimate.
    fn is_significant(&self, result: &TaskResult) -> bool {
        if !result.success {
            return false;
        }
        let Some(report) = &result.report else {
            return false;
        };

        if matches!(report.risk_level(), Some(RiskLevel::High | RiskLevel::Medium)) {
            return true;
        }
        if report.recommendation_quality() == Some(RecommendationQuality::High) {
            return true;
        }
        report.estimated_total_mev_cost().unwrap_or(0.0) > self.config.mev_cost_anchor_threshold
    }
}

/// Pick the task the collected data supports best: gas data first, then
/// pending proposals, MEV estimation as the fallback.
pub fn choose_task(snapshot: &ChainSnapshot) -> TaskKind {
    if !snapshot.gas_prices.is_empty() {
        TaskKind::GasParameterOptimizer
    } else if !snapshot.governance_proposals.is_empty() {
        TaskKind::ProposalSanityScanner
    } else {
        TaskKind::MevCostEstimator
    }
}

/// Build the execution context a task kind needs from a collected snapshot,
/// substituting placeholders for data the snapshot cannot provide.
pub fn execution_context_for(
    kind: TaskKind,
    snapshot: &ChainSnapshot,
    network: &str,
) -> TaskContext {
    let timestamp = chrono::Utc::now().timestamp();

    match kind {
        TaskKind::GasParameterOptimizer => TaskContext::new()
            .with_category(
                "blockchain",
                json!({
                    "recent_blocks": snapshot.recent_blocks,
                    "gas_prices": snapshot.gas_prices,
                    "transaction_history": [],
                }),
            )
            .with_category(
                "governance",
                json!({
                    "proposal_types": ["standard", "complex", "upgrade"],
                    "voting_contract_address": "0x1234567890123456789012345678901234567890",
                }),
            )
            .with_category(
                "context",
                json!({
                    "network_congestion": 0.5,
                    "proposal_type": "standard",
                    "timestamp": timestamp,
                    "network": network,
                }),
            ),
        TaskKind::ProposalSanityScanner => {
            let proposal = snapshot
                .governance_proposals
                .first()
                .cloned()
                .unwrap_or_else(|| json!({}));
            let author = proposal
                .get("proposer")
                .and_then(Value::as_str)
                .unwrap_or("0x0000000000000000000000000000000000000000")
                .to_string();
            TaskContext::new()
                .with_category(
                    "governance",
                    json!({
                        "proposal_data": proposal,
                        "proposal_history": [],
                        "governance_contract": {
                            "address": "0x1234567890123456789012345678901234567890",
                            "type": "governor",
                        },
                        "proposal_author": author,
                    }),
                )
                .with_category(
                    "blockchain",
                    json!({
                        "contract_bytecode": {},
                        "account_history": {},
                    }),
                )
                .with_category(
                    "context",
                    json!({
                        "protocol_parameters": snapshot.protocol_parameters,
                        "known_vulnerabilities": [],
                        "timestamp": timestamp,
                        "network": network,
                    }),
                )
        }
        TaskKind::MevCostEstimator => TaskContext::new()
            .with_category(
                "blockchain",
                json!({
                    "recent_blocks": snapshot.recent_blocks,
                    "gas_prices": snapshot.gas_prices,
                    "mempool_data": snapshot.mempool_data,
                }),
            )
            .with_category(
                "governance",
                json!({
                    "proposal_data": {
                        "id": "mock-proposal-1",
                        "type": "parameter_update",
                        "parameters": snapshot.protocol_parameters,
                    },
                    "protocol_parameters": snapshot.protocol_parameters,
                }),
            )
            .with_category(
                "defi",
                json!({
                    "trading_pairs": snapshot.defi.trading_pairs,
                    "pool_liquidity": snapshot.defi.pool_liquidity,
                    "volume_data": snapshot.defi.volume_data,
                    "active_bots": snapshot.defi.active_bots,
                }),
            ),
    }
}
