//! Unified error types for perfpair.
//!
//! Crate-local errors (`StatsError`, `SignificanceError`, `QueueError`, ...)
//! convert into [`PerfpairError`] so hosts can handle a single type.
//! Expected data-path failures are contained per unit of work; only
//! configuration and validation errors are fatal.

/// Maximum length of a registered name (class, method or comparison group).
pub const MAX_NAME_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    Empty,

    #[error("name is {len} characters long (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("name {name:?} contains invalid character {ch:?}")]
    InvalidChar { name: String, ch: char },

    #[error("method {method:?} registered twice on class {class:?}")]
    DuplicateMethod { class: String, method: String },

    #[error("class {0:?} registered twice")]
    DuplicateClass(String),
}

/// Validate a class, method or comparison-group name.
///
/// Allowed characters: ASCII alphanumerics plus `_`, `-`, `.`, `:`, `<`, `>`
/// and `,` (generic method names).
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            len,
            max: MAX_NAME_LEN,
        });
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '<' | '>' | ',')))
    {
        return Err(ValidationError::InvalidChar {
            name: name.to_string(),
            ch,
        });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PerfpairError {
    #[error("queue full: test case {test_case_id} rejected after {timeout_ms} ms")]
    QueueFull { test_case_id: String, timeout_ms: u64 },

    #[error("queue closed: test case {test_case_id} rejected")]
    QueueClosed { test_case_id: String },

    #[error("batch {key} timed out with {present} of {expected} members")]
    BatchTimeout {
        key: String,
        present: usize,
        expected: usize,
    },

    #[error("comparison timed out after {timeout_ms} ms")]
    ComparisonTimeout { timeout_ms: u64 },

    #[error("statistical precondition violated: {0}")]
    StatisticalPrecondition(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("processor {processor} failed: {message}")]
    Processor { processor: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl PerfpairError {
    /// Fatal errors abort a run before any batching begins.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PerfpairError::Config(_) | PerfpairError::Validation(_))
    }
}

pub type Result<T, E = PerfpairError> = std::result::Result<T, E>;
