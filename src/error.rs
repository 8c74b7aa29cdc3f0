use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalystError {
    #[error("Task not registered: {0}")]
    TaskNotFound(String),

    #[error("Task already registered: {0}")]
    DuplicateTask(String),

    #[error("Unknown task name: {0}")]
    UnknownTaskName(String),

    #[error("Missing required data for {task}: {}", missing.join(", "))]
    MissingData { task: String, missing: Vec<String> },

    #[error("Invalid parameters for {task}: {message}")]
    InvalidParameters { task: String, message: String },

    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Outcome not recorded for action: {0}")]
    OutcomeNotFound(String),

    #[error("Action {action_id} is in state {actual}, expected {expected}")]
    InvalidActionState {
        action_id: String,
        expected: String,
        actual: String,
    },

    #[error("Agent id must not be empty")]
    EmptyAgentId,

    #[error("Attestation verification failed: {0}")]
    AttestationMismatch(String),

    #[error("{0}")]
    Computation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, AnalystError>;
