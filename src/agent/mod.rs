//! Governance analyst harness.
//!
//! Ties the pieces together: collect a chain snapshot from the provider,
//! pick the task the data supports, and run it through the dispatcher.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AnalystConfig;
use crate::dispatch::{choose_task, execution_context_for, DispatchOutcome, TaskDispatcher};
use crate::provider::{ChainDataProvider, ChainSnapshot};
use crate::tasks::TaskKind;

/// One full analysis run: the chosen task plus its dispatch outcome.
#[derive(Debug)]
pub struct AnalysisRun {
    pub selected_task: &'static str,
    pub outcome: DispatchOutcome,
}

pub struct GovernanceAnalyst {
    provider: Arc<dyn ChainDataProvider>,
    dispatcher: TaskDispatcher,
    config: AnalystConfig,
}

impl GovernanceAnalyst {
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        dispatcher: TaskDispatcher,
        config: AnalystConfig,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            config,
        }
    }

    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.dispatcher
    }

    /// Names of every task the analyst can run.
    pub fn available_tasks(&self) -> Vec<&'static str> {
        self.dispatcher.catalog().list_tasks()
    }

    /// Collect a snapshot from the provider, tolerating individual fetch
    /// failures with empty defaults.
    pub fn collect_context(&self) -> ChainSnapshot {
        info!("Collecting blockchain context data");

        let recent_blocks = self
            .provider
            .recent_blocks(self.config.network.block_fetch_count)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Error fetching recent blocks");
                Vec::new()
            });
        let governance_proposals = self.provider.governance_proposals(true).unwrap_or_else(|e| {
            warn!(error = %e, "Error fetching governance proposals");
            Vec::new()
        });
        let gas_prices = self
            .provider
            .gas_prices(self.config.network.gas_price_fetch_count)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Error fetching gas prices");
                Vec::new()
            });
        let mempool_data = self.provider.mempool_data().unwrap_or_else(|e| {
            warn!(error = %e, "Error fetching mempool data");
            serde_json::json!({})
        });
        let protocol_parameters = self.provider.protocol_parameters().unwrap_or_else(|e| {
            warn!(error = %e, "Error fetching protocol parameters");
            serde_json::json!({})
        });
        let defi = self.provider.defi_snapshot().unwrap_or_else(|e| {
            warn!(error = %e, "Error fetching defi snapshot");
            Default::default()
        });

        info!(
            blocks = recent_blocks.len(),
            proposals = governance_proposals.len(),
            "Context collected"
        );

        ChainSnapshot {
            recent_blocks,
            governance_proposals,
            gas_prices,
            mempool_data,
            protocol_parameters,
            defi,
        }
    }

    /// Decide which governance task to run (or take the caller's choice) and
    /// execute it.
    pub fn decide_and_run(&self, task: Option<TaskKind>) -> AnalysisRun {
        let snapshot = self.collect_context();

        let kind = task.unwrap_or_else(|| choose_task(&snapshot));
        info!(task = kind.name(), "Selected task to execute");

        let context = execution_context_for(kind, &snapshot, &self.config.network.name);
        let outcome =
            self.dispatcher
                .execute(kind, &context, self.config.parameters_for(kind));

        AnalysisRun {
            selected_task: kind.name(),
            outcome,
        }
    }
}
