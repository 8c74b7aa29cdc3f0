use std::sync::Arc;

use chain_analyst::config::{AnalystConfig, DispatchConfig};
use chain_analyst::enclave::{MockEnclave, SecureExecutor};
use chain_analyst::ledger::{ActionFilter, ActionStatus, AgencyLedger, InMemoryLedger};
use chain_analyst::provider::{ChainDataProvider, ChainSnapshot, MockChainClient};
use chain_analyst::tasks::{RiskLevel, TaskCatalog, TaskKind, TaskReport};
use chain_analyst::{
    execution_context_for, GovernanceAnalyst, TaskContext, TaskDispatcher,
};
use serde_json::json;

fn dispatcher(ledger: Arc<InMemoryLedger>) -> TaskDispatcher {
    TaskDispatcher::new(
        Arc::new(TaskCatalog::with_builtin_tasks()),
        ledger,
        Arc::new(MockEnclave::default()),
        DispatchConfig::default(),
    )
}

fn steady_gas_snapshot() -> ChainSnapshot {
    ChainSnapshot {
        recent_blocks: (0..100)
            .map(|i| json!({"number": 1_000_000 + i, "gasUsed": 12_000_000}))
            .collect(),
        gas_prices: vec![30; 100],
        ..Default::default()
    }
}

// ========== Dispatch Pipeline Tests ==========

#[test]
fn test_full_pipeline_logs_executes_and_anchors() {
    let ledger = Arc::new(InMemoryLedger::new());
    let dispatcher = dispatcher(ledger.clone());

    let ctx = execution_context_for(
        TaskKind::GasParameterOptimizer,
        &steady_gas_snapshot(),
        "ethereum",
    );
    let outcome = dispatcher.execute(TaskKind::GasParameterOptimizer, &ctx, None);

    assert!(outcome.result.success);
    let action_id = outcome.action_id.as_deref().unwrap();

    // Action carries the audit category tag and the task's requirements.
    let action = ledger.get_action(action_id).unwrap();
    assert_eq!(action.action_type, "EXECUTE_TASK_GAS_OPTIMIZATION");
    assert_eq!(action.agent_id, "governance_analyst");
    assert!(action.data["requirements"]["blockchain"]
        .as_array()
        .unwrap()
        .contains(&json!("gas_prices")));

    // Steady data -> high quality recommendation -> anchored.
    assert!(outcome.anchored);
    assert_eq!(action.status, ActionStatus::Anchored);
    let anchor = ledger.get_anchor(action_id).unwrap();
    assert_eq!(Some(anchor.transaction_hash), outcome.tx_hash);

    // The recorded outcome holds the serialized result.
    let recorded = ledger.get_outcome(action_id).unwrap();
    assert!(recorded.success);
    assert_eq!(recorded.results["success"], json!(true));

    // The attestation verifies against the enclave that produced it.
    let enclave = MockEnclave::default();
    enclave.verify(outcome.attestation.as_ref().unwrap()).unwrap();
}

#[test]
fn test_missing_data_refusal_reports_field_list() {
    let ledger = Arc::new(InMemoryLedger::new());
    let dispatcher = dispatcher(ledger.clone());

    let ctx = TaskContext::new().with_field("blockchain", "gas_prices", json!([25]));
    let outcome = dispatcher.execute(TaskKind::GasParameterOptimizer, &ctx, None);

    assert!(!outcome.result.success);
    assert!(outcome.result.report.is_none());
    let error = outcome.result.error.as_deref().unwrap();
    assert!(error.contains("blockchain.recent_blocks"));
    assert!(error.contains("context.network_congestion"));

    // Refusal happens before any ledger write.
    assert!(ledger.list_actions(&ActionFilter::default()).is_empty());
}

#[test]
fn test_task_computation_failure_is_recorded_not_anchored() {
    let ledger = Arc::new(InMemoryLedger::new());
    let dispatcher = dispatcher(ledger.clone());

    // Requirements satisfied, but no block carries gasUsed: the task itself
    // fails with an insufficient-data error.
    let snapshot = ChainSnapshot {
        recent_blocks: (0..10).map(|i| json!({"number": i})).collect(),
        gas_prices: vec![25; 10],
        ..Default::default()
    };
    let ctx = execution_context_for(TaskKind::GasParameterOptimizer, &snapshot, "ethereum");
    let outcome = dispatcher.execute(TaskKind::GasParameterOptimizer, &ctx, None);

    assert!(!outcome.result.success);
    assert!(outcome.result.error.unwrap().contains("Insufficient gas data"));

    let action_id = outcome.action_id.as_deref().unwrap();
    let recorded = ledger.get_outcome(action_id).unwrap();
    assert!(!recorded.success);
    assert!(!outcome.anchored);
    assert_eq!(
        ledger.get_action(action_id).unwrap().status,
        ActionStatus::Completed
    );
}

#[test]
fn test_parameter_overrides_change_behavior() {
    let ledger = Arc::new(InMemoryLedger::new());
    let dispatcher = dispatcher(ledger);

    let ctx = execution_context_for(
        TaskKind::GasParameterOptimizer,
        &steady_gas_snapshot(),
        "ethereum",
    );
    let outcome = dispatcher.execute(
        TaskKind::GasParameterOptimizer,
        &ctx,
        Some(json!({"volatility_factor": 2.0})),
    );

    match outcome.result.report.unwrap() {
        TaskReport::GasOptimization { recommendations } => {
            assert_eq!(recommendations.gas_price.recommended, 30);
            assert_eq!(recommendations.gas_price.max, 60);
        }
        other => panic!("unexpected report: {:?}", other),
    }
}

#[test]
fn test_high_risk_scan_anchors() {
    let ledger = Arc::new(InMemoryLedger::new());
    let dispatcher = dispatcher(ledger);

    // Enough high-severity patterns to clear the high-risk threshold:
    // seven known vulnerabilities at 1.0 weight each.
    let vulns: Vec<_> = (0..7)
        .map(|i| {
            json!({
                "name": format!("vuln-{}", i),
                "pattern": format!("marker{}", i),
                "severity": "high"
            })
        })
        .collect();
    let code = (0..7).map(|i| format!("marker{}", i)).collect::<Vec<_>>().join(" ");

    let ctx = TaskContext::new()
        .with_category(
            "governance",
            json!({
                "proposal_data": {
                    "id": "p-1",
                    "author": "0xabc",
                    "code": code,
                    "calldata": "0x00",
                    "signature": "f()",
                    "parameters": {}
                },
                "proposal_history": [],
                "governance_contract": {"address": "0x0", "type": "governor"},
                "proposal_author": "0xabc",
            }),
        )
        .with_category(
            "blockchain",
            json!({
                "contract_bytecode": {},
                "account_history": {"0xabc": {"age_in_blocks": 50_000, "proposals": []}},
            }),
        )
        .with_category(
            "context",
            json!({"protocol_parameters": {}, "known_vulnerabilities": vulns}),
        );

    let outcome = dispatcher.execute(TaskKind::ProposalSanityScanner, &ctx, None);
    assert!(outcome.result.success);
    match outcome.result.report.as_ref().unwrap() {
        TaskReport::ProposalScan(scan) => {
            assert_eq!(scan.risk_level, RiskLevel::High);
            assert!(scan.risk_score >= 0.7);
        }
        other => panic!("unexpected report: {:?}", other),
    }
    assert!(outcome.anchored);
}

// ========== End-to-End Analyst Tests ==========

#[test]
fn test_analyst_end_to_end_with_mock_chain() {
    let ledger = Arc::new(InMemoryLedger::new());
    let analyst = GovernanceAnalyst::new(
        Arc::new(MockChainClient::default()),
        dispatcher(ledger.clone()),
        AnalystConfig::default(),
    );

    let run = analyst.decide_and_run(None);
    assert_eq!(run.selected_task, "GasParameterOptimizer");
    assert!(run.outcome.result.success);

    // Exactly one action was logged for the run.
    assert_eq!(ledger.list_actions(&ActionFilter::default()).len(), 1);

    // A second run against the same ledger appends another action.
    let run = analyst.decide_and_run(Some(TaskKind::MevCostEstimator));
    assert_eq!(run.selected_task, "MEVCostEstimator");
    assert!(run.outcome.result.success);
    assert_eq!(ledger.list_actions(&ActionFilter::default()).len(), 2);

    // MEV results always expose the cost-sum identity.
    match run.outcome.result.report.as_ref().unwrap() {
        TaskReport::MevEstimate(report) => {
            let v = &report.mev_vectors;
            let sum = v.sandwich_attacks.estimated_cost
                + v.frontrunning.estimated_cost
                + v.liquidations.estimated_cost
                + v.arbitrage.estimated_cost;
            assert_eq!(report.estimated_total_mev_cost, sum);
        }
        other => panic!("unexpected report: {:?}", other),
    }
}

#[test]
fn test_all_execution_contexts_pass_validation() {
    let catalog = TaskCatalog::with_builtin_tasks();
    let client = MockChainClient::default();
    let snapshot = ChainSnapshot {
        recent_blocks: client.recent_blocks(100).unwrap(),
        governance_proposals: client.governance_proposals(true).unwrap(),
        gas_prices: client.gas_prices(100).unwrap(),
        mempool_data: client.mempool_data().unwrap(),
        protocol_parameters: client.protocol_parameters().unwrap(),
        defi: client.defi_snapshot().unwrap(),
    };

    for kind in TaskKind::ALL {
        let ctx = execution_context_for(kind, &snapshot, "ethereum");
        let requirements = catalog.requirements_of(kind).unwrap();
        assert!(
            requirements.missing_from(&ctx).is_empty(),
            "{} context should satisfy its own requirements",
            kind
        );
    }
}
