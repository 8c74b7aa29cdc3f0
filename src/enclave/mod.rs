//! Mock secure-execution wrapper.
//!
//! Runs a task and produces an attestation binding the input context to the
//! output result through SHA-256 digests and a mock signature. This
//! simulates the enclave boundary only; nothing here provides real TEE
//! guarantees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::context::TaskContext;
use crate::error::{AnalystError, Result};
use crate::tasks::{AnalysisTask, TaskResult};

/// Proof that a given input produced a given output inside the (mock)
/// enclave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    pub id: String,
    pub enclave: String,
    pub code_hash: String,
    pub input_hash: String,
    pub output_hash: String,
    pub timestamp: DateTime<Utc>,
    pub signature: String,
}

/// A task result together with its attestation.
#[derive(Debug, Clone)]
pub struct ExecutionReceipt {
    pub result: TaskResult,
    pub attestation: Attestation,
}

/// Wrapper the dispatcher runs `execute` through.
pub trait SecureExecutor: Send + Sync {
    fn execute(&self, task: &dyn AnalysisTask, context: &TaskContext) -> Result<ExecutionReceipt>;

    /// Recompute the signature and compare.
    fn verify(&self, attestation: &Attestation) -> Result<()>;
}

/// Deterministic mock enclave with a fixed signing secret.
pub struct MockEnclave {
    name: String,
    signing_secret: String,
}

impl MockEnclave {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signing_secret: "mock-enclave-signing-secret".to_string(),
        }
    }

    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = secret.into();
        self
    }

    fn sign(&self, code_hash: &str, input_hash: &str, output_hash: &str) -> String {
        let payload = format!(
            "{}:{}:{}:{}",
            self.signing_secret, code_hash, input_hash, output_hash
        );
        hex::encode(Sha256::digest(payload.as_bytes()))
    }
}

impl Default for MockEnclave {
    fn default() -> Self {
        Self::new("governance_task")
    }
}

impl SecureExecutor for MockEnclave {
    fn execute(&self, task: &dyn AnalysisTask, context: &TaskContext) -> Result<ExecutionReceipt> {
        let input_hash = hex::encode(Sha256::digest(serde_json::to_string(context)?.as_bytes()));
        let code_hash = hex::encode(Sha256::digest(task.kind().name().as_bytes()));

        let result = task.execute(context);

        let output_hash = hex::encode(Sha256::digest(serde_json::to_string(&result)?.as_bytes()));
        let signature = self.sign(&code_hash, &input_hash, &output_hash);

        debug!(task_id = task.task_id(), enclave = %self.name, "Task executed in mock enclave");

        Ok(ExecutionReceipt {
            result,
            attestation: Attestation {
                id: Uuid::new_v4().to_string(),
                enclave: self.name.clone(),
                code_hash,
                input_hash,
                output_hash,
                timestamp: Utc::now(),
                signature,
            },
        })
    }

    fn verify(&self, attestation: &Attestation) -> Result<()> {
        let expected = self.sign(
            &attestation.code_hash,
            &attestation.input_hash,
            &attestation.output_hash,
        );
        if expected != attestation.signature {
            return Err(AnalystError::AttestationMismatch(attestation.id.clone()));
        }
        Ok(())
    }
}
