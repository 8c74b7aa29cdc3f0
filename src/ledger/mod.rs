//! Mock agency ledger.
//!
//! Records every dispatched analysis as an action with a lifecycle
//! (pending → verified → completed → anchored), an outcome, and simulated
//! reward accounting. Everything lives in memory; anchoring produces mock
//! transaction hashes, not real chain writes.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AnalystError, Result};

const BASE_REWARD: f64 = 100.0;
const VERIFIER_REWARD_SHARE: f64 = 0.1;
const FAILED_OUTCOME_MULTIPLIER: f64 = 0.25;
const MOCK_BLOCK_NUMBER: u64 = 12_345_678;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Verified,
    Completed,
    Anchored,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Verified => write!(f, "verified"),
            Self::Completed => write!(f, "completed"),
            Self::Anchored => write!(f, "anchored"),
        }
    }
}

/// One logged agent action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub agent_id: String,
    pub action_type: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
    pub status: ActionStatus,
}

/// Recorded result of an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub action_id: String,
    pub success: bool,
    pub impact_score: f64,
    pub results: Value,
    pub recorded_at: DateTime<Utc>,
}

/// Mock on-chain anchor for an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnChainRecord {
    pub transaction_hash: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub action_data_hash: String,
    pub verifiers: Vec<String>,
}

/// Filter for [`AgencyLedger::list_actions`].
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub agent_id: Option<String>,
    pub action_type: Option<String>,
    pub status: Option<ActionStatus>,
}

/// Action/outcome ledger the dispatcher records through.
pub trait AgencyLedger: Send + Sync {
    fn log_action(
        &self,
        agent_id: &str,
        action_type: &str,
        description: &str,
        data: Value,
    ) -> Result<String>;

    fn get_action(&self, action_id: &str) -> Option<ActionRecord>;

    /// Action ids matching the filter, in log order.
    fn list_actions(&self, filter: &ActionFilter) -> Vec<String>;

    fn verify_action(&self, action_id: &str, verifier_id: &str) -> Result<()>;

    fn record_outcome(
        &self,
        action_id: &str,
        success: bool,
        impact_score: f64,
        results: Value,
    ) -> Result<String>;

    fn get_outcome(&self, action_id: &str) -> Option<OutcomeRecord>;

    fn anchor_action(&self, action_id: &str) -> Result<String>;

    fn get_anchor(&self, action_id: &str) -> Option<OnChainRecord>;

    fn compute_rewards(&self, action_id: &str) -> Result<BTreeMap<String, f64>>;

    fn distribute_rewards(&self, action_id: &str) -> Result<String>;
}

#[derive(Default)]
struct LedgerState {
    actions: Vec<ActionRecord>,
    outcomes: HashMap<String, OutcomeRecord>,
    verifications: HashMap<String, Vec<String>>,
    on_chain: HashMap<String, OnChainRecord>,
    rewards: HashMap<String, BTreeMap<String, f64>>,
}

impl LedgerState {
    fn action_mut(&mut self, action_id: &str) -> Result<&mut ActionRecord> {
        self.actions
            .iter_mut()
            .find(|a| a.id == action_id)
            .ok_or_else(|| AnalystError::ActionNotFound(action_id.to_string()))
    }

    fn action(&self, action_id: &str) -> Result<&ActionRecord> {
        self.actions
            .iter()
            .find(|a| a.id == action_id)
            .ok_or_else(|| AnalystError::ActionNotFound(action_id.to_string()))
    }
}

/// In-memory [`AgencyLedger`] implementation.
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AgencyLedger for InMemoryLedger {
    fn log_action(
        &self,
        agent_id: &str,
        action_type: &str,
        description: &str,
        data: Value,
    ) -> Result<String> {
        if agent_id.is_empty() {
            return Err(AnalystError::EmptyAgentId);
        }

        let action_id = Uuid::new_v4().to_string();
        debug!(%action_id, agent_id, action_type, "Logging action");

        let mut state = self.state.write();
        state.actions.push(ActionRecord {
            id: action_id.clone(),
            agent_id: agent_id.to_string(),
            action_type: action_type.to_string(),
            description: description.to_string(),
            timestamp: Utc::now(),
            data,
            status: ActionStatus::Pending,
        });
        state.verifications.insert(action_id.clone(), Vec::new());

        Ok(action_id)
    }

    fn get_action(&self, action_id: &str) -> Option<ActionRecord> {
        self.state
            .read()
            .actions
            .iter()
            .find(|a| a.id == action_id)
            .cloned()
    }

    fn list_actions(&self, filter: &ActionFilter) -> Vec<String> {
        self.state
            .read()
            .actions
            .iter()
            .filter(|a| filter.agent_id.as_deref().is_none_or(|id| a.agent_id == id))
            .filter(|a| {
                filter
                    .action_type
                    .as_deref()
                    .is_none_or(|t| a.action_type == t)
            })
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .map(|a| a.id.clone())
            .collect()
    }

    fn verify_action(&self, action_id: &str, verifier_id: &str) -> Result<()> {
        let mut state = self.state.write();
        let action = state.action_mut(action_id)?;
        if action.status != ActionStatus::Pending {
            return Err(AnalystError::InvalidActionState {
                action_id: action_id.to_string(),
                expected: ActionStatus::Pending.to_string(),
                actual: action.status.to_string(),
            });
        }
        action.status = ActionStatus::Verified;
        state
            .verifications
            .entry(action_id.to_string())
            .or_default()
            .push(verifier_id.to_string());
        Ok(())
    }

    fn record_outcome(
        &self,
        action_id: &str,
        success: bool,
        impact_score: f64,
        results: Value,
    ) -> Result<String> {
        let mut state = self.state.write();
        let action = state.action_mut(action_id)?;
        if !matches!(action.status, ActionStatus::Pending | ActionStatus::Verified) {
            return Err(AnalystError::InvalidActionState {
                action_id: action_id.to_string(),
                expected: "pending or verified".to_string(),
                actual: action.status.to_string(),
            });
        }
        action.status = ActionStatus::Completed;

        state.outcomes.insert(
            action_id.to_string(),
            OutcomeRecord {
                action_id: action_id.to_string(),
                success,
                impact_score,
                results,
                recorded_at: Utc::now(),
            },
        );

        Ok(action_id.to_string())
    }

    fn get_outcome(&self, action_id: &str) -> Option<OutcomeRecord> {
        self.state.read().outcomes.get(action_id).cloned()
    }

    fn anchor_action(&self, action_id: &str) -> Result<String> {
        let mut state = self.state.write();

        if !state.outcomes.contains_key(action_id) {
            state.action(action_id)?;
            return Err(AnalystError::OutcomeNotFound(action_id.to_string()));
        }

        let verifiers = state
            .verifications
            .get(action_id)
            .cloned()
            .unwrap_or_default();
        let action = state.action_mut(action_id)?;
        if action.status != ActionStatus::Completed {
            return Err(AnalystError::InvalidActionState {
                action_id: action_id.to_string(),
                expected: ActionStatus::Completed.to_string(),
                actual: action.status.to_string(),
            });
        }

        let tx_hash = format!("0x{}", Uuid::new_v4().simple());
        let data_hash = hex::encode(Sha256::digest(action.data.to_string().as_bytes()));
        action.status = ActionStatus::Anchored;
        debug!(%action_id, %tx_hash, "Anchoring action");

        state.on_chain.insert(
            action_id.to_string(),
            OnChainRecord {
                transaction_hash: tx_hash.clone(),
                block_number: MOCK_BLOCK_NUMBER,
                timestamp: Utc::now(),
                action_data_hash: data_hash,
                verifiers,
            },
        );

        Ok(tx_hash)
    }

    fn get_anchor(&self, action_id: &str) -> Option<OnChainRecord> {
        self.state.read().on_chain.get(action_id).cloned()
    }

    fn compute_rewards(&self, action_id: &str) -> Result<BTreeMap<String, f64>> {
        let mut state = self.state.write();

        let outcome = state
            .outcomes
            .get(action_id)
            .cloned()
            .ok_or_else(|| AnalystError::OutcomeNotFound(action_id.to_string()))?;
        let action = state.action(action_id)?;
        if !matches!(action.status, ActionStatus::Completed | ActionStatus::Anchored) {
            return Err(AnalystError::InvalidActionState {
                action_id: action_id.to_string(),
                expected: "completed or anchored".to_string(),
                actual: action.status.to_string(),
            });
        }

        let success_multiplier = if outcome.success {
            1.0
        } else {
            FAILED_OUTCOME_MULTIPLIER
        };
        let mut rewards = BTreeMap::new();
        rewards.insert(
            action.agent_id.clone(),
            BASE_REWARD * outcome.impact_score * success_multiplier,
        );

        let verifier_reward = BASE_REWARD * VERIFIER_REWARD_SHARE;
        for verifier in state.verifications.get(action_id).into_iter().flatten() {
            *rewards.entry(verifier.clone()).or_insert(0.0) += verifier_reward;
        }

        state.rewards.insert(action_id.to_string(), rewards.clone());
        Ok(rewards)
    }

    fn distribute_rewards(&self, action_id: &str) -> Result<String> {
        if !self.state.read().rewards.contains_key(action_id) {
            self.compute_rewards(action_id)?;
        }
        let tx_hash = format!("0x{}", Uuid::new_v4().simple());
        debug!(%action_id, %tx_hash, "Distributing rewards");
        Ok(tx_hash)
    }
}
