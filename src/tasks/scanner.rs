//! Proposal sanity scanning.
//!
//! Runs five independent checks over a governance proposal (size,
//! vulnerability patterns, parameter ranges, author history, bytecode
//! similarity) and aggregates their findings into a severity-weighted risk
//! score.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::context::{Requirements, TaskContext};
use crate::error::Result;

use super::result::{dedup_preserving_order, Finding, FindingKind, RiskLevel, ScanReport, Severity};
use super::{AnalysisTask, TaskKind, TaskReport, TaskResult, TaskSpec};

/// Tunable knobs for the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerParams {
    pub risk_threshold_high: f64,
    pub risk_threshold_medium: f64,
    pub skip_historical_check: bool,
    pub check_bytecode_similarity: bool,
    pub max_proposal_size_bytes: usize,
    pub vulnerability_patterns: Vec<String>,
}

impl Default for ScannerParams {
    fn default() -> Self {
        Self {
            risk_threshold_high: 0.7,
            risk_threshold_medium: 0.4,
            skip_historical_check: false,
            check_bytecode_similarity: true,
            max_proposal_size_bytes: 1024 * 1024,
            vulnerability_patterns: vec![
                "selfdestruct".to_string(),
                "delegatecall".to_string(),
                r"transfer.*\(address\([a-zA-Z0-9]*\)\)".to_string(),
                r"approve\(address\([a-zA-Z0-9]*\), uint256\([0-9]+\)\)".to_string(),
            ],
        }
    }
}

struct CheckOutcome {
    passed: bool,
    issues: Vec<Finding>,
}

impl CheckOutcome {
    fn from_issues(issues: Vec<Finding>) -> Self {
        Self {
            passed: issues.is_empty(),
            issues,
        }
    }

    fn clean() -> Self {
        Self::from_issues(Vec::new())
    }
}

#[derive(Debug)]
pub struct ProposalSanityScanner {
    task_id: String,
    params: ScannerParams,
    patterns: Vec<Regex>,
}

impl ProposalSanityScanner {
    pub fn new(spec: TaskSpec) -> Result<Self> {
        let params: ScannerParams = spec.parameters_as(TaskKind::ProposalSanityScanner)?;

        // Invalid patterns are logged and skipped, not fatal.
        let patterns = params
            .vulnerability_patterns
            .iter()
            .filter_map(|p| {
                match RegexBuilder::new(p).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        error!(pattern = %p, error = %e, "Invalid vulnerability pattern");
                        None
                    }
                }
            })
            .collect();

        Ok(Self {
            task_id: spec.resolve_id(),
            params,
            patterns,
        })
    }

    pub fn boxed(spec: TaskSpec) -> Result<Box<dyn AnalysisTask>> {
        Ok(Box::new(Self::new(spec)?))
    }

    fn check_proposal_size(&self, proposal: &Map<String, Value>) -> CheckOutcome {
        let calldata = string_field(proposal, "calldata");
        let size = calldata.len();
        let max = self.params.max_proposal_size_bytes;

        if size > max {
            return CheckOutcome::from_issues(vec![Finding::new(
                FindingKind::SizeLimit,
                Severity::Medium,
                format!(
                    "Proposal size ({} bytes) exceeds maximum recommended size ({} bytes)",
                    size, max
                ),
            )
            .with_recommendation("Break down the proposal into smaller, separate proposals")]);
        }
        CheckOutcome::clean()
    }

    fn check_code_vulnerabilities(
        &self,
        proposal: &Map<String, Value>,
        known_vulnerabilities: &[Value],
    ) -> CheckOutcome {
        let code = string_field(proposal, "code");
        let calldata = string_field(proposal, "calldata");
        let signature = string_field(proposal, "signature");
        let text = format!("{} {} {}", code, calldata, signature);

        let mut issues = Vec::new();

        for pattern in &self.patterns {
            let matches: Vec<String> = pattern
                .find_iter(&text)
                .map(|m| m.as_str().to_string())
                .collect();
            if !matches.is_empty() {
                issues.push(
                    Finding::new(
                        FindingKind::CodeVulnerability,
                        Severity::High,
                        format!("Potential vulnerability detected: {}", pattern.as_str()),
                    )
                    .with_recommendation("Review and secure the code against this vulnerability")
                    .with_matches(matches),
                );
            }
        }

        // Known vulnerabilities match as literal substrings, case-sensitive.
        for vuln in known_vulnerabilities {
            let Some(pattern) = vuln.get("pattern").and_then(Value::as_str) else {
                continue;
            };
            if text.contains(pattern) {
                let name = vuln.get("name").and_then(Value::as_str).unwrap_or("unknown");
                let severity = vuln
                    .get("severity")
                    .and_then(Value::as_str)
                    .map(parse_severity)
                    .unwrap_or(Severity::High);
                let mut finding = Finding::new(
                    FindingKind::KnownVulnerability,
                    severity,
                    format!("Known vulnerability detected: {}", name),
                );
                if let Some(cve) = vuln.get("cve").and_then(Value::as_str) {
                    finding = finding.with_cve(cve);
                }
                if let Some(mitigation) = vuln.get("mitigation").and_then(Value::as_str) {
                    finding = finding.with_recommendation(mitigation);
                }
                issues.push(finding);
            }
        }

        CheckOutcome::from_issues(issues)
    }

    fn validate_parameters(
        &self,
        proposal: &Map<String, Value>,
        protocol_parameters: &Map<String, Value>,
    ) -> CheckOutcome {
        let mut issues = Vec::new();

        let parameters = proposal
            .get("parameters")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        for (name, value) in &parameters {
            let Some(spec) = protocol_parameters.get(name) else {
                continue;
            };
            let Some(value) = value.as_f64() else {
                continue;
            };

            // Safe range is inclusive at both bounds.
            if let Some(range) = spec.get("safe_range").and_then(Value::as_array) {
                if let (Some(min), Some(max)) =
                    (range.first().and_then(Value::as_f64), range.get(1).and_then(Value::as_f64))
                {
                    if value < min || value > max {
                        issues.push(
                            Finding::new(
                                FindingKind::ParameterOutOfRange,
                                Severity::Medium,
                                format!(
                                    "Parameter '{}' value {} is outside safe range ({}, {})",
                                    name, value, min, max
                                ),
                            )
                            .with_recommendation("Adjust parameter to be within the safe range"),
                        );
                    }
                }
            }

            // Relative-change check is skipped when the current value is
            // zero.
            if let Some(current) = spec.get("current_value").and_then(Value::as_f64) {
                if current != 0.0 {
                    let pct_change = ((value - current) / current).abs() * 100.0;
                    if pct_change > 50.0 {
                        issues.push(
                            Finding::new(
                                FindingKind::LargeParameterChange,
                                Severity::Medium,
                                format!(
                                    "Large change ({:.1}%) for parameter '{}': {} -> {}",
                                    pct_change, name, current, value
                                ),
                            )
                            .with_recommendation("Consider a more gradual parameter change"),
                        );
                    }
                }
            }
        }

        CheckOutcome::from_issues(issues)
    }

    fn check_author_history(
        &self,
        proposal: &Map<String, Value>,
        account_history: &Map<String, Value>,
    ) -> CheckOutcome {
        if self.params.skip_historical_check {
            return CheckOutcome::clean();
        }

        let Some(author) = proposal.get("author").and_then(Value::as_str) else {
            return CheckOutcome::clean();
        };

        let history = account_history
            .get(author)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut issues = Vec::new();

        let age_in_blocks = history
            .get("age_in_blocks")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if age_in_blocks < 1000 {
            issues.push(
                Finding::new(
                    FindingKind::NewAccount,
                    Severity::Low,
                    format!(
                        "Proposal author account is relatively new ({} blocks old)",
                        age_in_blocks
                    ),
                )
                .with_recommendation("Verify author's reputation in the community"),
            );
        }

        let proposals = history
            .get("proposals")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total = proposals.len();
        let rejected = proposals
            .iter()
            .filter(|p| p.get("status").and_then(Value::as_str) == Some("rejected"))
            .count();

        if total > 0 && rejected as f64 / total as f64 > 0.7 {
            issues.push(
                Finding::new(
                    FindingKind::HighRejectionRate,
                    Severity::Medium,
                    format!(
                        "Author has high proposal rejection rate ({}/{})",
                        rejected, total
                    ),
                )
                .with_recommendation(
                    "Review author's previous proposals to understand rejection patterns",
                ),
            );
        }

        CheckOutcome::from_issues(issues)
    }

    fn check_bytecode_similarity(
        &self,
        proposal: &Map<String, Value>,
        contract_bytecode: &Map<String, Value>,
    ) -> CheckOutcome {
        let Some(new_bytecode) = proposal.get("bytecode").and_then(Value::as_str) else {
            return CheckOutcome::clean();
        };

        let mut issues = Vec::new();

        for (contract_name, bytecode) in contract_bytecode {
            let Some(bytecode) = bytecode.as_str() else {
                continue;
            };
            let similarity = bytecode_similarity(new_bytecode.as_bytes(), bytecode.as_bytes());
            if similarity > 0.9 {
                issues.push(
                    Finding::new(
                        FindingKind::HighBytecodeSimilarity,
                        Severity::Medium,
                        format!(
                            "New contract is very similar to existing contract '{}' ({:.1}% match)",
                            contract_name,
                            similarity * 100.0
                        ),
                    )
                    .with_recommendation(
                        "Verify that this is not a duplicate or malicious variation of an existing contract",
                    ),
                );
            } else if similarity > 0.7 {
                issues.push(
                    Finding::new(
                        FindingKind::ModerateBytecodeSimilarity,
                        Severity::Low,
                        format!(
                            "New contract has similarities with existing contract '{}' ({:.1}% match)",
                            contract_name,
                            similarity * 100.0
                        ),
                    )
                    .with_recommendation("Review the contract code to understand the similarities"),
                );
            }
        }

        CheckOutcome::from_issues(issues)
    }

    fn generate_recommendations(&self, issues: &[Finding], risk_level: RiskLevel) -> Vec<String> {
        let mut recommendations: Vec<String> = issues
            .iter()
            .filter_map(|i| i.recommendation.clone())
            .collect();

        match risk_level {
            RiskLevel::High => {
                recommendations
                    .push("Consider rejecting this proposal until security issues are addressed".into());
                recommendations.push("Request a formal security audit for this proposal".into());
            }
            RiskLevel::Medium => {
                recommendations.push(
                    "Request more documentation and justification for the proposed changes".into(),
                );
                recommendations
                    .push("Consider a peer review by at least two community members".into());
            }
            RiskLevel::Low => {
                if recommendations.is_empty() {
                    recommendations.push(
                        "No significant issues found. Standard review procedures recommended."
                            .into(),
                    );
                }
            }
        }

        dedup_preserving_order(recommendations)
    }
}

impl AnalysisTask for ProposalSanityScanner {
    fn kind(&self) -> TaskKind {
        TaskKind::ProposalSanityScanner
    }

    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn requires(&self) -> Requirements {
        Requirements::new()
            .require(
                "governance",
                [
                    "proposal_data",
                    "proposal_history",
                    "governance_contract",
                    "proposal_author",
                ],
            )
            .require("blockchain", ["contract_bytecode", "account_history"])
            .require("context", ["protocol_parameters", "known_vulnerabilities"])
    }

    fn execute(&self, context: &TaskContext) -> TaskResult {
        info!(task_id = %self.task_id, "Executing proposal sanity scanner");

        // Synthetic defaults for absent inputs keep direct calls usable.
        let proposal = match context
            .get("governance", "proposal_data")
            .filter(|v| !v.is_null())
            .and_then(Value::as_object)
        {
            Some(p) => p.clone(),
            None => {
                warn!("No proposal data provided for scanning, using mock data");
                mock_proposal_data()
            }
        };

        let account_history = context
            .get("blockchain", "account_history")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(|| default_account_history(&proposal));
        let contract_bytecode = context
            .get("blockchain", "contract_bytecode")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let protocol_parameters = context
            .get("context", "protocol_parameters")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(default_protocol_parameters);
        let known_vulnerabilities = context
            .get("context", "known_vulnerabilities")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_else(default_known_vulnerabilities);

        let checks = [
            self.check_proposal_size(&proposal),
            self.check_code_vulnerabilities(&proposal, &known_vulnerabilities),
            self.validate_parameters(&proposal, &protocol_parameters),
            self.check_author_history(&proposal, &account_history),
            if self.params.check_bytecode_similarity {
                self.check_bytecode_similarity(&proposal, &contract_bytecode)
            } else {
                CheckOutcome::clean()
            },
        ];

        let checks_passed = checks.iter().filter(|c| c.passed).count();
        let checks_failed = checks.len() - checks_passed;
        let issues: Vec<Finding> = checks.into_iter().flat_map(|c| c.issues).collect();

        let risk_score = risk_score(&issues);
        let risk_level = if risk_score >= self.params.risk_threshold_high {
            RiskLevel::High
        } else if risk_score >= self.params.risk_threshold_medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        info!(%risk_level, risk_score, "Proposal scan completed");

        let recommendations = self.generate_recommendations(&issues, risk_level);
        let proposal_id = proposal.get("id").cloned().unwrap_or(Value::Null);
        let timestamp = context
            .get("context", "timestamp")
            .cloned()
            .unwrap_or_else(|| json!(chrono::Utc::now().timestamp()));

        TaskResult::completed(TaskReport::ProposalScan(ScanReport {
            risk_level,
            risk_score,
            issues,
            checks_passed,
            checks_failed,
            recommendations,
        }))
        .with_metadata("proposal_id", proposal_id)
        .with_metadata("scan_timestamp", timestamp)
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "low" => Severity::Low,
        "medium" => Severity::Medium,
        _ => Severity::High,
    }
}

/// Severity-weighted score over all findings, scaled so ten medium-weight
/// points saturate at 1.0.
fn risk_score(issues: &[Finding]) -> f64 {
    let weighted: f64 = issues.iter().map(|i| i.severity.weight()).sum();
    (weighted / 10.0).min(1.0)
}

/// Jaccard similarity over 16-byte chunks taken at a stride of 4.
fn bytecode_similarity(a: &[u8], b: &[u8]) -> f64 {
    const CHUNK: usize = 16;
    const STRIDE: usize = 4;

    fn chunks(data: &[u8]) -> HashSet<&[u8]> {
        if data.len() < CHUNK {
            return HashSet::new();
        }
        (0..=data.len() - CHUNK)
            .step_by(STRIDE)
            .map(|i| &data[i..i + CHUNK])
            .collect()
    }

    let set_a = chunks(a);
    let set_b = chunks(b);
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}

fn mock_proposal_data() -> Map<String, Value> {
    json!({
        "id": "mock-proposal-1",
        "calldata": "0x1234567890abcdef",
        "code": "function updateFeeStructure(uint256 newFee) public onlyOwner { require(newFee <= MAX_FEE); feePercentage = newFee; emit FeeUpdated(newFee); }",
        "signature": "updateFeeStructure(uint256)",
        "author": "0x742d35Cc6634C0532925a3b844Bc454e4438f44e",
        "parameters": {
            "feePercentage": 0.003,
            "maxSlippage": 0.01
        },
        "description": "Update protocol fee structure"
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

fn default_account_history(proposal: &Map<String, Value>) -> Map<String, Value> {
    let author = proposal
        .get("author")
        .and_then(Value::as_str)
        .unwrap_or("0x0000000000000000000000000000000000000000");
    let mut history = Map::new();
    history.insert(
        author.to_string(),
        json!({
            "age_in_blocks": 10_000,
            "proposals": [
                {"id": "prev-1", "status": "accepted"},
                {"id": "prev-2", "status": "rejected"}
            ]
        }),
    );
    history
}

fn default_protocol_parameters() -> Map<String, Value> {
    json!({
        "feePercentage": {
            "current_value": 0.002,
            "safe_range": [0.0001, 0.01]
        },
        "maxSlippage": {
            "current_value": 0.005,
            "safe_range": [0.001, 0.05]
        }
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

fn default_known_vulnerabilities() -> Vec<Value> {
    vec![json!({
        "name": "Reentrancy",
        "pattern": "call.value\\(",
        "severity": "high",
        "cve": "CVE-2018-12056",
        "mitigation": "Use ReentrancyGuard or check-effects-interactions pattern"
    })]
}
