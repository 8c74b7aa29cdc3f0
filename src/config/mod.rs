//! Analyst configuration.
//!
//! One TOML file, one struct per concern, validated as a whole. Task
//! parameter defaults live here so a deployment can tune the scoring knobs
//! without touching code.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use crate::error::{AnalystError, Result};
use crate::tasks::{GasOptimizerParams, MevEstimatorParams, ScannerParams, TaskKind};

pub const CONFIG_FILE: &str = "analyst.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalystConfig {
    pub network: NetworkConfig,
    pub dispatch: DispatchConfig,
    pub gas: GasOptimizerParams,
    pub scanner: ScannerParams,
    pub mev: MevEstimatorParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub name: String,
    pub block_fetch_count: usize,
    pub gas_price_fetch_count: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "ethereum".to_string(),
            block_fetch_count: 100,
            gas_price_fetch_count: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Agent identity recorded on every ledger action.
    pub agent_id: String,
    /// Impact score attached to recorded outcomes.
    pub default_impact_score: f64,
    /// MEV estimates above this total cost anchor even at low risk.
    pub mev_cost_anchor_threshold: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            agent_id: "governance_analyst".to_string(),
            default_impact_score: 0.7,
            mev_cost_anchor_threshold: 1000.0,
        }
    }
}

impl AnalystConfig {
    pub async fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        let content =
            toml::to_string_pretty(self).map_err(|e| AnalystError::Config(e.to_string()))?;
        fs::write(dir.join(CONFIG_FILE), content).await?;
        Ok(())
    }

    /// Validate configuration values for consistency; collects every
    /// violation before failing.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.dispatch.agent_id.is_empty() {
            errors.push("dispatch.agent_id must not be empty");
        }
        if !(0.0..=1.0).contains(&self.dispatch.default_impact_score) {
            errors.push("dispatch.default_impact_score must be between 0.0 and 1.0");
        }

        if self.gas.sample_size == 0 {
            errors.push("gas.sample_size must be greater than 0");
        }
        if self.gas.percentile_base > 100 {
            errors.push("gas.percentile_base must be at most 100");
        }
        if self.gas.volatility_factor < 1.0 {
            errors.push("gas.volatility_factor must be at least 1.0");
        }

        if !(0.0..=1.0).contains(&self.scanner.risk_threshold_high) {
            errors.push("scanner.risk_threshold_high must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&self.scanner.risk_threshold_medium) {
            errors.push("scanner.risk_threshold_medium must be between 0.0 and 1.0");
        }
        if self.scanner.risk_threshold_medium > self.scanner.risk_threshold_high {
            errors.push("scanner.risk_threshold_medium must not exceed risk_threshold_high");
        }
        if self.scanner.max_proposal_size_bytes == 0 {
            errors.push("scanner.max_proposal_size_bytes must be greater than 0");
        }

        if self.mev.mev_estimation_blocks == 0 {
            errors.push("mev.mev_estimation_blocks must be greater than 0");
        }
        if self.mev.block_time_seconds <= 0.0 {
            errors.push("mev.block_time_seconds must be positive");
        }
        if !(0.0..=1.0).contains(&self.mev.liquidation_risk_threshold) {
            errors.push("mev.liquidation_risk_threshold must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&self.mev.max_slippage_tolerance) {
            errors.push("mev.max_slippage_tolerance must be between 0.0 and 1.0");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AnalystError::Config(errors.join("; ")))
        }
    }

    /// Parameter overrides for a task kind, as the dispatcher expects them.
    pub fn parameters_for(&self, kind: TaskKind) -> Option<Value> {
        let value = match kind {
            TaskKind::GasParameterOptimizer => serde_json::to_value(&self.gas),
            TaskKind::ProposalSanityScanner => serde_json::to_value(&self.scanner),
            TaskKind::MevCostEstimator => serde_json::to_value(&self.mev),
        };
        value.ok()
    }
}
