pub mod agent;
pub mod cli;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod enclave;
pub mod error;
pub mod ledger;
pub mod provider;
pub mod tasks;

pub use agent::{AnalysisRun, GovernanceAnalyst};
pub use config::{AnalystConfig, DispatchConfig};
pub use context::{find_missing, Requirements, TaskContext};
pub use dispatch::{choose_task, execution_context_for, DispatchOutcome, TaskDispatcher};
pub use enclave::{Attestation, ExecutionReceipt, MockEnclave, SecureExecutor};
pub use error::{AnalystError, Result};
pub use ledger::{ActionFilter, ActionStatus, AgencyLedger, InMemoryLedger};
pub use provider::{ChainDataProvider, ChainSnapshot, DefiSnapshot, MockChainClient};
pub use tasks::{
    AnalysisTask, Finding, FindingKind, GasParameterOptimizer, MevCostEstimator,
    ProposalSanityScanner, RiskLevel, Severity, TaskCatalog, TaskKind, TaskReport, TaskResult,
    TaskSpec,
};
