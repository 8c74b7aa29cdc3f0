//! Result types shared by the analysis tasks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Weight used when aggregating findings into a risk score.
    pub fn weight(&self) -> f64 {
        match self {
            Self::High => 1.0,
            Self::Medium => 0.5,
            Self::Low => 0.2,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Overall risk classification of a scan or estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Confidence band for gas recommendations, derived from data consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationQuality {
    Low,
    Medium,
    High,
}

/// What kind of problem a finding describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    SizeLimit,
    CodeVulnerability,
    KnownVulnerability,
    ParameterOutOfRange,
    LargeParameterChange,
    NewAccount,
    HighRejectionRate,
    HighBytecodeSimilarity,
    ModerateBytecodeSimilarity,
}

/// A single itemized issue raised by a check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<String>,
}

impl Finding {
    pub fn new(kind: FindingKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            recommendation: None,
            cve: None,
            matches: Vec::new(),
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_cve(mut self, cve: impl Into<String>) -> Self {
        self.cve = Some(cve.into());
        self
    }

    pub fn with_matches(mut self, matches: Vec<String>) -> Self {
        self.matches = matches;
        self
    }
}

/// Gas price band in gwei.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasPriceBand {
    pub recommended: u64,
    pub max: u64,
    pub unit: String,
}

/// Output of the gas parameter optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasRecommendations {
    pub gas_price: GasPriceBand,
    pub gas_limit: u64,
    pub estimated_cost_eth: f64,
    pub priority_fee: u64,
    pub recommendation_quality: RecommendationQuality,
    pub proposal_type: String,
    pub validity_blocks: u64,
}

/// Output of the proposal sanity scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub issues: Vec<Finding>,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub recommendations: Vec<String>,
}

/// Sandwich-attack exposure for one trading pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRisk {
    pub pair: String,
    pub risk_score: f64,
    pub potential_mev: f64,
    pub volume: f64,
    pub liquidity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandwichAssessment {
    pub risk_score: f64,
    pub estimated_cost: f64,
    pub affected_pairs: usize,
    pub highest_risk_pairs: Vec<PairRisk>,
    pub slippage_parameter_changes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontrunningAssessment {
    pub risk_score: f64,
    pub estimated_cost: f64,
    pub mempool_density: f64,
    pub gas_price_volatility: f64,
    pub frontrunning_bot_prevalence: f64,
    pub fee_parameter_changes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationAssessment {
    pub risk_score: f64,
    pub estimated_cost: f64,
    pub positions_at_risk: u64,
    pub value_at_risk: f64,
    pub liquidation_parameter_changes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageAssessment {
    pub risk_score: f64,
    pub estimated_cost: f64,
    pub oracle_parameter_changes: bool,
    pub market_making_parameter_changes: bool,
    pub daily_volume: f64,
    pub affected_volume_percentage: f64,
}

/// The four MEV vectors, addressed by name rather than list position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MevVectors {
    pub sandwich_attacks: SandwichAssessment,
    pub frontrunning: FrontrunningAssessment,
    pub liquidations: LiquidationAssessment,
    pub arbitrage: ArbitrageAssessment,
}

/// Output of the MEV cost estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MevReport {
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub estimated_total_mev_cost: f64,
    pub estimated_cost_per_block: f64,
    pub mev_vectors: MevVectors,
    pub mitigations: Vec<String>,
}

/// Task-specific payload of a successful execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskReport {
    GasOptimization {
        recommendations: GasRecommendations,
    },
    ProposalScan(ScanReport),
    MevEstimate(MevReport),
}

impl TaskReport {
    pub fn risk_level(&self) -> Option<RiskLevel> {
        match self {
            Self::GasOptimization { .. } => None,
            Self::ProposalScan(scan) => Some(scan.risk_level),
            Self::MevEstimate(mev) => Some(mev.risk_level),
        }
    }

    pub fn recommendation_quality(&self) -> Option<RecommendationQuality> {
        match self {
            Self::GasOptimization { recommendations } => {
                Some(recommendations.recommendation_quality)
            }
            _ => None,
        }
    }

    pub fn estimated_total_mev_cost(&self) -> Option<f64> {
        match self {
            Self::MevEstimate(mev) => Some(mev.estimated_total_mev_cost),
            _ => None,
        }
    }

    /// Flat recommendation list, regardless of task kind.
    pub fn recommendations(&self) -> Vec<&str> {
        match self {
            Self::GasOptimization { .. } => Vec::new(),
            Self::ProposalScan(scan) => {
                scan.recommendations.iter().map(String::as_str).collect()
            }
            Self::MevEstimate(mev) => mev.mitigations.iter().map(String::as_str).collect(),
        }
    }
}

/// Outcome of a single task execution. Failures carry an error message and
/// no report; no partial results are ever attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TaskReport>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl TaskResult {
    pub fn completed(report: TaskReport) -> Self {
        Self {
            success: true,
            error: None,
            report: Some(report),
            metadata: BTreeMap::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            report: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// De-duplicate strings preserving first-seen order.
pub(crate) fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}
