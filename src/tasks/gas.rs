//! Gas parameter optimization.
//!
//! Analyzes historical gas usage and recommends gas parameters for
//! governance proposals: a percentile-based price, a headroom-scaled limit,
//! and a quality band derived from how consistent the input data was.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::context::{Requirements, TaskContext};
use crate::error::{AnalystError, Result};

use super::result::{GasPriceBand, GasRecommendations, RecommendationQuality};
use super::{AnalysisTask, TaskKind, TaskReport, TaskResult, TaskSpec};

/// Tunable knobs for the optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GasOptimizerParams {
    /// First-N window over the supplied series; not a random sample.
    pub sample_size: usize,
    /// Nearest-rank percentile used for the recommended price.
    pub percentile_base: u32,
    /// Multiplier from recommended to maximum price.
    pub volatility_factor: f64,
    pub min_gas_limit: u64,
    /// How many blocks a recommendation stays valid.
    pub max_recommendation_age_blocks: u64,
}

impl Default for GasOptimizerParams {
    fn default() -> Self {
        Self {
            sample_size: 200,
            percentile_base: 75,
            volatility_factor: 1.2,
            min_gas_limit: 100_000,
            max_recommendation_age_blocks: 10,
        }
    }
}

#[derive(Debug)]
pub struct GasParameterOptimizer {
    task_id: String,
    params: GasOptimizerParams,
}

impl GasParameterOptimizer {
    pub fn new(spec: TaskSpec) -> Result<Self> {
        Ok(Self {
            task_id: spec.resolve_id(),
            params: spec.parameters_as(TaskKind::GasParameterOptimizer)?,
        })
    }

    pub fn boxed(spec: TaskSpec) -> Result<Box<dyn AnalysisTask>> {
        Ok(Box::new(Self::new(spec)?))
    }

    fn calculate(
        &self,
        gas_used: &[u64],
        gas_prices: &[u64],
        context: &TaskContext,
    ) -> Result<GasRecommendations> {
        // First-N window; the window length is driven by the gas-used series.
        let window = gas_used.len().min(self.params.sample_size);
        let gas_used = &gas_used[..window];
        let gas_prices = &gas_prices[..gas_prices.len().min(window)];

        if gas_used.is_empty() || gas_prices.is_empty() {
            return Err(AnalystError::Computation(
                "Insufficient gas data for analysis".to_string(),
            ));
        }

        let avg_gas_used = mean(gas_used);

        let mut sorted_prices = gas_prices.to_vec();
        sorted_prices.sort_unstable();

        // Nearest-rank percentile, clamped so percentile_base = 100 selects
        // the maximum.
        let idx = (sorted_prices.len() * self.params.percentile_base as usize / 100)
            .min(sorted_prices.len() - 1);
        let recommended_gas_price = sorted_prices[idx];
        let max_gas_price =
            (recommended_gas_price as f64 * self.params.volatility_factor) as u64;

        let congestion: f64 = context
            .field_as("context", "network_congestion")
            .unwrap_or(0.5);
        let proposal_type: String = context
            .field_as("context", "proposal_type")
            .unwrap_or_else(|| "standard".to_string());
        let type_multiplier = match proposal_type.as_str() {
            "complex" => 1.5,
            "upgrade" => 2.0,
            _ => 1.0,
        };

        let gas_limit_base = (avg_gas_used * 1.5).max(self.params.min_gas_limit as f64);
        let gas_limit = (gas_limit_base * type_multiplier * (1.0 + congestion * 0.5)) as u64;

        Ok(GasRecommendations {
            gas_price: GasPriceBand {
                recommended: recommended_gas_price,
                max: max_gas_price,
                unit: "gwei".to_string(),
            },
            gas_limit,
            estimated_cost_eth: gas_limit as f64 * recommended_gas_price as f64 / 1e9,
            priority_fee: (recommended_gas_price as f64 * 0.15) as u64,
            recommendation_quality: recommendation_quality(gas_used, gas_prices),
            proposal_type,
            validity_blocks: self.params.max_recommendation_age_blocks,
        })
    }
}

impl AnalysisTask for GasParameterOptimizer {
    fn kind(&self) -> TaskKind {
        TaskKind::GasParameterOptimizer
    }

    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn requires(&self) -> Requirements {
        Requirements::new()
            .require(
                "blockchain",
                ["recent_blocks", "gas_prices", "transaction_history"],
            )
            .require("governance", ["proposal_types", "voting_contract_address"])
            .require("context", ["network_congestion"])
    }

    fn execute(&self, context: &TaskContext) -> TaskResult {
        info!(task_id = %self.task_id, params = ?self.params, "Executing gas parameter optimization");

        let recent_blocks: Vec<Value> = context
            .field_as("blockchain", "recent_blocks")
            .unwrap_or_default();
        let mut gas_prices: Vec<u64> = context
            .field_as::<Vec<Value>>("blockchain", "gas_prices")
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_u64)
            .collect();

        // Documented synthetic fallbacks: they keep direct calls usable but
        // make the output non-deterministic for the price series.
        if gas_prices.is_empty() {
            warn!("No gas price data available, using fallback gas prices");
            let mut rng = rand::thread_rng();
            gas_prices = (0..10)
                .map(|_| 25u64.saturating_add_signed(rng.gen_range(-5..=5)))
                .collect();
        }

        let recent_blocks = if recent_blocks.is_empty() {
            warn!("No block data available, using fallback block data");
            vec![json!({"gasUsed": 12_500_000u64, "gasLimit": 30_000_000u64, "number": 1})]
        } else {
            recent_blocks
        };

        // Blocks missing the gasUsed field are skipped entirely.
        let gas_used: Vec<u64> = recent_blocks
            .iter()
            .filter_map(|b| b.get("gasUsed").and_then(Value::as_u64))
            .collect();

        match self.calculate(&gas_used, &gas_prices, context) {
            Ok(recommendations) => {
                debug!(
                    recommended = recommendations.gas_price.recommended,
                    gas_limit = recommendations.gas_limit,
                    "Gas parameter optimization completed"
                );
                let timestamp = context
                    .get("context", "timestamp")
                    .cloned()
                    .unwrap_or_else(|| json!(chrono::Utc::now().timestamp()));
                let network = context
                    .get("context", "network")
                    .cloned()
                    .unwrap_or_else(|| json!("ethereum"));
                TaskResult::completed(TaskReport::GasOptimization { recommendations })
                    .with_metadata("analyzed_blocks", json!(recent_blocks.len()))
                    .with_metadata("analysis_timestamp", timestamp)
                    .with_metadata("network", network)
            }
            Err(e) => {
                warn!(error = %e, "Gas parameter optimization failed");
                TaskResult::failed(e.to_string())
            }
        }
    }
}

fn mean(values: &[u64]) -> f64 {
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; `None` for fewer than two points.
fn sample_stdev(values: &[u64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - m;
            d * d
        })
        .sum::<f64>()
        / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Quality bands from the relative standard deviation of both series.
/// Statistical failure (too few points, zero mean) degrades to low.
fn recommendation_quality(gas_used: &[u64], gas_prices: &[u64]) -> RecommendationQuality {
    let rsd = |values: &[u64]| -> Option<f64> {
        let m = mean(values);
        if m <= 0.0 {
            return None;
        }
        Some(sample_stdev(values)? / m)
    };

    match (rsd(gas_used), rsd(gas_prices)) {
        (Some(used_rsd), Some(price_rsd)) => {
            if used_rsd < 0.1 && price_rsd < 0.2 {
                RecommendationQuality::High
            } else if used_rsd < 0.3 && price_rsd < 0.5 {
                RecommendationQuality::Medium
            } else {
                RecommendationQuality::Low
            }
        }
        _ => RecommendationQuality::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(blocks: Vec<Value>, prices: Vec<u64>) -> TaskContext {
        TaskContext::new()
            .with_field("blockchain", "recent_blocks", json!(blocks))
            .with_field("blockchain", "gas_prices", json!(prices))
            .with_field("blockchain", "transaction_history", json!([]))
            .with_field("governance", "proposal_types", json!(["standard"]))
            .with_field(
                "governance",
                "voting_contract_address",
                json!("0x1234567890123456789012345678901234567890"),
            )
            .with_field("context", "network_congestion", json!(0.5))
    }

    fn steady_blocks(n: usize, gas_used: u64) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"number": 1_000_000 + i, "gasUsed": gas_used}))
            .collect()
    }

    fn optimizer() -> GasParameterOptimizer {
        GasParameterOptimizer::new(TaskSpec::default()).unwrap()
    }

    fn report(result: &TaskResult) -> &GasRecommendations {
        match result.report.as_ref().unwrap() {
            TaskReport::GasOptimization { recommendations } => recommendations,
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[test]
    fn test_steady_data_yields_high_quality() {
        let ctx = context_with(steady_blocks(100, 12_000_000), vec![30; 100]);
        let result = optimizer().execute(&ctx);

        assert!(result.success);
        let rec = report(&result);
        assert_eq!(rec.recommendation_quality, RecommendationQuality::High);
        assert_eq!(rec.gas_price.recommended, 30);
        assert_eq!(rec.gas_price.max, 36);
        assert_eq!(rec.gas_price.unit, "gwei");
        assert_eq!(rec.priority_fee, 4);
        assert_eq!(rec.validity_blocks, 10);
    }

    #[test]
    fn test_blocks_without_gas_used_fail() {
        let blocks: Vec<Value> = (0..5).map(|i| json!({"number": i})).collect();
        let ctx = context_with(blocks, vec![25; 5]);
        let result = optimizer().execute(&ctx);

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Insufficient gas data"));
        assert!(result.report.is_none());
    }

    #[test]
    fn test_percentile_monotonic_in_base() {
        let prices: Vec<u64> = (1..=100).collect();
        let blocks = steady_blocks(100, 12_000_000);

        let mut last = 0;
        for base in [50u32, 60, 75, 90] {
            let task = GasParameterOptimizer::new(TaskSpec::with_parameters(
                json!({"percentile_base": base}),
            ))
            .unwrap();
            let result = task.execute(&context_with(blocks.clone(), prices.clone()));
            let recommended = report(&result).gas_price.recommended;
            assert!(
                recommended >= last,
                "percentile {} gave {} after {}",
                base,
                recommended,
                last
            );
            last = recommended;
        }
    }

    #[test]
    fn test_percentile_base_100_selects_maximum() {
        let task = GasParameterOptimizer::new(TaskSpec::with_parameters(
            json!({"percentile_base": 100}),
        ))
        .unwrap();
        let result = task.execute(&context_with(steady_blocks(10, 12_000_000), vec![5, 9, 7, 3, 8]));
        assert_eq!(report(&result).gas_price.recommended, 9);
    }

    #[test]
    fn test_proposal_type_scales_gas_limit() {
        let blocks = steady_blocks(50, 12_000_000);
        let prices = vec![30u64; 50];

        let standard = optimizer().execute(&context_with(blocks.clone(), prices.clone()));
        let upgrade_ctx = context_with(blocks, prices)
            .with_field("context", "proposal_type", json!("upgrade"));
        let upgrade = optimizer().execute(&upgrade_ctx);

        assert_eq!(
            report(&upgrade).gas_limit,
            report(&standard).gas_limit * 2
        );
        assert_eq!(report(&upgrade).proposal_type, "upgrade");
    }

    #[test]
    fn test_missing_inputs_fall_back_to_synthetic_data() {
        let ctx = TaskContext::new();
        let result = optimizer().execute(&ctx);

        assert!(result.success);
        let rec = report(&result);
        // Fallback prices sit around 25 gwei.
        assert!(rec.gas_price.recommended >= 20 && rec.gas_price.recommended <= 30);
        assert_eq!(result.metadata["analyzed_blocks"], json!(1));
    }

    #[test]
    fn test_sample_window_is_prefix() {
        // 20 cheap prices then a spike; sample_size 20 must ignore the spike.
        let mut prices = vec![10u64; 20];
        prices.push(500);
        let blocks = steady_blocks(30, 12_000_000);

        let task = GasParameterOptimizer::new(TaskSpec::with_parameters(
            json!({"sample_size": 20}),
        ))
        .unwrap();
        let result = task.execute(&context_with(blocks, prices));
        assert_eq!(report(&result).gas_price.recommended, 10);
    }

    #[test]
    fn test_quality_degrades_with_volatile_prices() {
        let prices: Vec<u64> = (0..100).map(|i| if i % 2 == 0 { 10 } else { 90 }).collect();
        let ctx = context_with(steady_blocks(100, 12_000_000), prices);
        let result = optimizer().execute(&ctx);
        assert_eq!(
            report(&result).recommendation_quality,
            RecommendationQuality::Low
        );
    }

    #[test]
    fn test_single_point_quality_is_low() {
        assert_eq!(
            recommendation_quality(&[12_000_000], &[30]),
            RecommendationQuality::Low
        );
    }
}
