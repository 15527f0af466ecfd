use thiserror::Error;

/// Errors raised by the splitting core itself.
///
/// Collaborator failures travel as `llm_client::LlmError` wrapped in
/// `anyhow` context by the stage that issued the call.
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Document is empty")]
    EmptyDocument,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid {kind} pattern '{pattern}': {source}")]
    InvalidPattern {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, SplitError>;
