//! Chain-data providers.
//!
//! The analyst consumes a fully-materialized snapshot of chain data; this
//! module defines the provider seam and a mock client that generates
//! plausible data for local runs and tests.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::Result;

/// Defi-side market data consumed by the MEV estimator.
#[derive(Debug, Clone, Default)]
pub struct DefiSnapshot {
    pub trading_pairs: Vec<Value>,
    pub pool_liquidity: Map<String, Value>,
    pub volume_data: Map<String, Value>,
    pub active_bots: Vec<Value>,
}

/// Fully-collected snapshot handed to the decision heuristic.
#[derive(Debug, Clone, Default)]
pub struct ChainSnapshot {
    pub recent_blocks: Vec<Value>,
    pub governance_proposals: Vec<Value>,
    pub gas_prices: Vec<u64>,
    pub mempool_data: Value,
    pub protocol_parameters: Value,
    pub defi: DefiSnapshot,
}

/// Source of already-fetched chain data.
pub trait ChainDataProvider: Send + Sync {
    fn recent_blocks(&self, count: usize) -> Result<Vec<Value>>;
    fn gas_prices(&self, count: usize) -> Result<Vec<u64>>;
    fn governance_proposals(&self, active_only: bool) -> Result<Vec<Value>>;
    fn mempool_data(&self) -> Result<Value>;
    fn protocol_parameters(&self) -> Result<Value>;
    fn defi_snapshot(&self) -> Result<DefiSnapshot>;
}

/// Mock client holding generated data for the process lifetime.
pub struct MockChainClient {
    network: String,
    blocks: Vec<Value>,
    gas_price_series: Vec<u64>,
    proposals: Vec<Value>,
    mempool: Value,
    parameters: Value,
    defi: DefiSnapshot,
}

impl MockChainClient {
    const BLOCK_COUNT: usize = 500;
    const GAS_PRICE_COUNT: usize = 200;
    const PROPOSAL_COUNT: usize = 5;

    pub fn new(network: impl Into<String>) -> Self {
        let network = network.into();
        info!(%network, "Initialized mock blockchain client");

        let mut rng = rand::thread_rng();
        let now = chrono::Utc::now().timestamp();

        let blocks = generate_blocks(&mut rng, now, Self::BLOCK_COUNT);
        let gas_price_series = generate_gas_prices(&mut rng, Self::GAS_PRICE_COUNT);
        let proposals = generate_proposals(&mut rng, now, Self::PROPOSAL_COUNT);
        let mempool = generate_mempool(&mut rng, &gas_price_series);
        let parameters = protocol_parameter_table(now);
        let defi = generate_defi(&mut rng, now);

        Self {
            network,
            blocks,
            gas_price_series,
            proposals,
            mempool,
            parameters,
            defi,
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new("ethereum")
    }
}

impl ChainDataProvider for MockChainClient {
    fn recent_blocks(&self, count: usize) -> Result<Vec<Value>> {
        let start = self.blocks.len().saturating_sub(count);
        Ok(self.blocks[start..].to_vec())
    }

    fn gas_prices(&self, count: usize) -> Result<Vec<u64>> {
        let start = self.gas_price_series.len().saturating_sub(count);
        Ok(self.gas_price_series[start..].to_vec())
    }

    fn governance_proposals(&self, active_only: bool) -> Result<Vec<Value>> {
        Ok(self
            .proposals
            .iter()
            .filter(|p| {
                !active_only
                    || matches!(
                        p.get("status").and_then(Value::as_str),
                        Some("active") | Some("pending")
                    )
            })
            .cloned()
            .collect())
    }

    fn mempool_data(&self) -> Result<Value> {
        Ok(self.mempool.clone())
    }

    fn protocol_parameters(&self) -> Result<Value> {
        Ok(self.parameters.clone())
    }

    fn defi_snapshot(&self) -> Result<DefiSnapshot> {
        Ok(self.defi.clone())
    }
}

fn generate_blocks(rng: &mut impl Rng, now: i64, count: usize) -> Vec<Value> {
    let base_timestamp = now - count as i64 * 12;
    let base_gas_used: i64 = 12_000_000;

    (0..count)
        .map(|i| {
            let gas_used = base_gas_used + rng.gen_range(-2_000_000..=2_000_000);
            json!({
                "number": 1_000_000 + i,
                "hash": random_hash(rng),
                "timestamp": base_timestamp + i as i64 * 12,
                "gasUsed": gas_used,
                "gasLimit": 15_000_000,
                "baseFeePerGas": 20 + rng.gen_range(0..=30),
                "size": 50_000 + rng.gen_range(0..=20_000),
            })
        })
        .collect()
}

/// Random walk starting at 20 gwei, floored at 5.
fn generate_gas_prices(rng: &mut impl Rng, count: usize) -> Vec<u64> {
    let mut prices = Vec::with_capacity(count);
    let mut price: i64 = 20;
    for i in 0..count {
        if i > 0 {
            price = (price + rng.gen_range(-5..=5)).max(5);
        }
        prices.push(price as u64);
    }
    prices
}

fn generate_proposals(rng: &mut impl Rng, now: i64, count: usize) -> Vec<Value> {
    let proposal_types = ["fee_change", "parameter_update", "protocol_upgrade", "emergency_fix"];
    let statuses = ["active", "pending", "executed", "cancelled", "defeated"];

    (0..count)
        .map(|i| {
            let proposal_type = *proposal_types.choose(rng).unwrap_or(&"parameter_update");
            let status = *statuses.choose(rng).unwrap_or(&"active");

            let parameters = match proposal_type {
                "fee_change" => json!({
                    "fee": if rng.gen_bool(0.5) { 0.003 } else { 0.005 },
                    "fee_recipient": random_address(rng),
                }),
                "parameter_update" => json!({
                    "max_slippage": rng.gen_range(0.01..0.05),
                    "liquidation_threshold": rng.gen_range(0.75..0.90),
                    "oracle_update_frequency": *[60, 300, 600, 1800].choose(rng).unwrap_or(&300),
                }),
                "protocol_upgrade" => json!({
                    "new_implementation": random_address(rng),
                    "bytecode": random_bytecode(rng, 1000),
                }),
                _ => json!({
                    "pause_trading": rng.gen_bool(0.5),
                    "max_withdrawal": rng.gen_range(10_000..=1_000_000),
                }),
            };

            json!({
                "id": format!("proposal-{}", i + 1),
                "title": format!("Mock Proposal {}: {}", i + 1, proposal_type.replace('_', " ")),
                "description": format!("This is a mock {} proposal for testing", proposal_type),
                "proposer": random_address(rng),
                "author": random_address(rng),
                "status": status,
                "created_at": now - rng.gen_range(0..86_400 * 30),
                "type": proposal_type,
                "parameters": parameters,
                "votes_for": rng.gen_range(1_000..=10_000),
                "votes_against": rng.gen_range(100..=5_000),
                "quorum": 5_000,
                "expiration": now + rng.gen_range(86_400..86_400 * 7),
            })
        })
        .collect()
}

fn generate_mempool(rng: &mut impl Rng, gas_prices: &[u64]) -> Value {
    let tx_count = rng.gen_range(2_000..=8_000);
    let avg_gas_price = gas_prices.last().copied().unwrap_or(25) as i64;

    json!({
        "transaction_count": tx_count,
        "average_gas_price": avg_gas_price + rng.gen_range(-5..=10),
        "high_priority_count": tx_count / 5,
        "average_transaction_value": rng.gen_range(0.1..2.0),
        "max_gas_price": avg_gas_price + rng.gen_range(10..=50),
        "min_gas_price": (avg_gas_price - rng.gen_range(5..=15)).max(1),
    })
}

fn protocol_parameter_table(now: i64) -> Value {
    json!({
        "fee": {
            "current_value": 0.003,
            "safe_range": [0.001, 0.01],
            "description": "Protocol fee percentage",
            "last_updated": now - 86_400,
        },
        "max_slippage": {
            "current_value": 0.03,
            "safe_range": [0.01, 0.05],
            "description": "Maximum allowed slippage",
            "last_updated": now - 86_400 * 7,
        },
        "liquidation_threshold": {
            "current_value": 0.825,
            "safe_range": [0.75, 0.90],
            "description": "Collateral liquidation threshold",
            "last_updated": now - 86_400 * 30,
        },
        "oracle_update_frequency": {
            "current_value": 300,
            "safe_range": [60, 1800],
            "description": "Oracle price update frequency in seconds",
            "last_updated": now - 86_400 * 14,
        },
        "debt_ceiling": {
            "current_value": 10_000_000,
            "safe_range": [1_000_000, 50_000_000],
            "description": "Maximum protocol debt",
            "last_updated": now - 86_400 * 10,
        },
        "collateral_factor": {
            "current_value": 0.75,
            "safe_range": [0.5, 0.85],
            "description": "Collateral factor for borrowing",
            "last_updated": now - 86_400 * 20,
        },
    })
}

fn generate_defi(rng: &mut impl Rng, now: i64) -> DefiSnapshot {
    let pair_symbols = ["ETH/USDC", "WBTC/USDC", "ETH/WBTC", "LINK/ETH", "UNI/USDC"];

    let trading_pairs: Vec<Value> = pair_symbols
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            json!({
                "id": format!("pair-{}", i + 1),
                "symbol": symbol,
                "volatility": rng.gen_range(0.05..0.3),
                "avg_slippage": rng.gen_range(0.001..0.01),
                "fee_tier": *[0.0005, 0.003, 0.01].choose(rng).unwrap_or(&0.003),
            })
        })
        .collect();

    let mut pool_liquidity = Map::new();
    let mut volume_data = Map::new();
    for pair in &trading_pairs {
        let id = pair["id"].as_str().unwrap_or_default().to_string();
        pool_liquidity.insert(id.clone(), json!(rng.gen_range(100_000.0..10_000_000.0)));
        volume_data.insert(id, json!(rng.gen_range(10_000.0..5_000_000.0)));
    }

    let bot_types = ["arbitrage", "liquidation", "market_making", "sandwich"];
    let active_bots: Vec<Value> = (0..rng.gen_range(5..=20))
        .map(|i| {
            let bot_type = *bot_types.choose(rng).unwrap_or(&"arbitrage");
            json!({
                "id": format!("bot-{}", i + 1),
                "type": bot_type,
                "capabilities": {
                    "frontrunning": matches!(bot_type, "arbitrage" | "sandwich"),
                    "backrunning": matches!(bot_type, "arbitrage" | "liquidation"),
                    "sandwich_attack": bot_type == "sandwich",
                    "liquidation": bot_type == "liquidation",
                },
                "active_since": now - rng.gen_range(3_600..86_400 * 180),
                "success_rate": rng.gen_range(0.5..0.95),
            })
        })
        .collect();

    DefiSnapshot {
        trading_pairs,
        pool_liquidity,
        volume_data,
        active_bots,
    }
}

fn random_address(rng: &mut impl Rng) -> String {
    let bytes: [u8; 20] = rng.gen();
    format!("0x{}", hex::encode(bytes))
}

fn random_hash(rng: &mut impl Rng) -> String {
    let bytes: [u8; 32] = rng.gen();
    format!("0x{}", hex::encode(bytes))
}

fn random_bytecode(rng: &mut impl Rng, len: usize) -> String {
    let bytes: Vec<u8> = (0..len / 2).map(|_| rng.gen()).collect();
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_client_shapes() {
        let client = MockChainClient::default();

        let blocks = client.recent_blocks(100).unwrap();
        assert_eq!(blocks.len(), 100);
        for block in &blocks {
            let gas_used = block["gasUsed"].as_i64().unwrap();
            assert!((10_000_000..=14_000_000).contains(&gas_used));
        }

        let prices = client.gas_prices(100).unwrap();
        assert_eq!(prices.len(), 100);
        assert!(prices.iter().all(|&p| p >= 5));

        let mempool = client.mempool_data().unwrap();
        let tx_count = mempool["transaction_count"].as_u64().unwrap();
        assert!((2_000..=8_000).contains(&tx_count));
    }

    #[test]
    fn test_active_only_proposal_filter() {
        let client = MockChainClient::default();
        let active = client.governance_proposals(true).unwrap();
        for proposal in &active {
            let status = proposal["status"].as_str().unwrap();
            assert!(status == "active" || status == "pending");
        }
        let all = client.governance_proposals(false).unwrap();
        assert!(all.len() >= active.len());
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_defi_snapshot_consistent_ids() {
        let client = MockChainClient::default();
        let defi = client.defi_snapshot().unwrap();
        assert_eq!(defi.trading_pairs.len(), 5);
        for pair in &defi.trading_pairs {
            let id = pair["id"].as_str().unwrap();
            assert!(defi.pool_liquidity.contains_key(id));
            assert!(defi.volume_data.contains_key(id));
        }
        assert!(!defi.active_bots.is_empty());
    }

    #[test]
    fn test_protocol_parameters_carry_safe_ranges() {
        let client = MockChainClient::default();
        let params = client.protocol_parameters().unwrap();
        for (_, spec) in params.as_object().unwrap() {
            let range = spec["safe_range"].as_array().unwrap();
            assert_eq!(range.len(), 2);
        }
    }
}
