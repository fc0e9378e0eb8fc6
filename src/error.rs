//! Error types for MUSE.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, 5=workflow, 6=paywall, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for MUSE operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    ProjectNotFound,
    ChangeNotFound,
    DocumentNotFound,
    RuleNotFound,
    TranscriptNotFound,
    PhaseEmpty,

    // Validation (exit 4)
    InvalidArgument,
    InvalidPhase,
    InvalidChangeStatus,
    RequiredField,

    // Workflow (exit 5)
    PhaseLocked,
    StaleChange,

    // Paywall (exit 6)
    FeatureLocked,
    UsageLimitExceeded,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // LLM (exit 9)
    LlmError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::ChangeNotFound => "CHANGE_NOT_FOUND",
            Self::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            Self::RuleNotFound => "RULE_NOT_FOUND",
            Self::TranscriptNotFound => "TRANSCRIPT_NOT_FOUND",
            Self::PhaseEmpty => "PHASE_EMPTY",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidPhase => "INVALID_PHASE",
            Self::InvalidChangeStatus => "INVALID_CHANGE_STATUS",
            Self::RequiredField => "REQUIRED_FIELD",
            Self::PhaseLocked => "PHASE_LOCKED",
            Self::StaleChange => "STALE_CHANGE",
            Self::FeatureLocked => "FEATURE_LOCKED",
            Self::UsageLimitExceeded => "USAGE_LIMIT_EXCEEDED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::LlmError => "LLM_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-9).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::ProjectNotFound
            | Self::ChangeNotFound
            | Self::DocumentNotFound
            | Self::RuleNotFound
            | Self::TranscriptNotFound
            | Self::PhaseEmpty => 3,
            Self::InvalidArgument
            | Self::InvalidPhase
            | Self::InvalidChangeStatus
            | Self::RequiredField => 4,
            Self::PhaseLocked | Self::StaleChange => 5,
            Self::FeatureLocked | Self::UsageLimitExceeded => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::LlmError => 9,
        }
    }

    /// Whether a caller should retry with corrected input.
    ///
    /// True for validation errors and transient provider failures.
    /// False for not-found, paywall, I/O, or internal errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument
                | Self::InvalidPhase
                | Self::RequiredField
                | Self::DatabaseError
                | Self::LlmError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in MUSE operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `muse init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Project not found: {id}")]
    ProjectNotFound { id: String },

    #[error("Change not found: {id}")]
    ChangeNotFound { id: String },

    #[error("Bible document not found: {id}")]
    DocumentNotFound { id: String },

    #[error("Bible rule not found: {id}")]
    RuleNotFound { id: String },

    #[error("Transcript not found: {id}")]
    TranscriptNotFound { id: String },

    #[error("Phase '{phase}' has no content yet")]
    PhaseEmpty { phase: String },

    #[error("Invalid phase: {input}")]
    InvalidPhase {
        input: String,
        suggestion: Option<String>,
    },

    #[error("Invalid change status: expected {expected}, got {actual}")]
    InvalidChangeStatus { expected: String, actual: String },

    #[error("Required field missing: {0}")]
    RequiredField(String),

    #[error("Phase '{phase}' is locked: project is at '{current}'")]
    PhaseLocked { phase: String, current: String },

    #[error("Change {id} is stale: {phase} moved from revision {expected} to {actual}")]
    StaleChange {
        id: String,
        phase: String,
        expected: i64,
        actual: i64,
    },

    #[error("Feature '{feature}' is not available on the {tier} plan")]
    FeatureLocked {
        feature: String,
        tier: String,
        required: String,
    },

    #[error("Usage limit reached: {used}/{limit} {what} this period on the {tier} plan")]
    UsageLimitExceeded {
        what: String,
        used: i64,
        limit: i64,
        tier: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::ProjectNotFound { .. } => ErrorCode::ProjectNotFound,
            Self::ChangeNotFound { .. } => ErrorCode::ChangeNotFound,
            Self::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            Self::RuleNotFound { .. } => ErrorCode::RuleNotFound,
            Self::TranscriptNotFound { .. } => ErrorCode::TranscriptNotFound,
            Self::PhaseEmpty { .. } => ErrorCode::PhaseEmpty,
            Self::InvalidPhase { .. } => ErrorCode::InvalidPhase,
            Self::InvalidChangeStatus { .. } => ErrorCode::InvalidChangeStatus,
            Self::RequiredField(_) => ErrorCode::RequiredField,
            Self::PhaseLocked { .. } => ErrorCode::PhaseLocked,
            Self::StaleChange { .. } => ErrorCode::StaleChange,
            Self::FeatureLocked { .. } => ErrorCode::FeatureLocked,
            Self::UsageLimitExceeded { .. } => ErrorCode::UsageLimitExceeded,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Llm(_) => ErrorCode::LlmError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `muse init` to create the database".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::ProjectNotFound { id } => Some(format!(
                "No project with ID '{id}'. Use `muse project list` to see your projects."
            )),

            Self::ChangeNotFound { id } => Some(format!(
                "No change with ID '{id}'. Use `muse change list <project>` to see pending changes."
            )),

            Self::DocumentNotFound { .. } => {
                Some("Use `muse bible list <project>` to see uploaded documents.".to_string())
            }

            Self::TranscriptNotFound { .. } => {
                Some("Use `muse transcript list <project>` to see transcripts.".to_string())
            }

            Self::PhaseEmpty { phase } => Some(format!(
                "Write or generate the {phase} phase first: `muse phase set` or `muse phase generate`."
            )),

            Self::InvalidPhase { suggestion, .. } => Some(match suggestion {
                Some(s) => format!("Did you mean: {s}? Valid phases: summary, scenes, beats, export"),
                None => "Valid phases: summary, scenes, beats, export (or 1-4)".to_string(),
            }),

            Self::InvalidChangeStatus { actual, .. } => Some(format!(
                "This change is already '{actual}'. Only pending changes can be approved or rejected."
            )),

            Self::PhaseLocked { current, .. } => Some(format!(
                "Finish the '{current}' phase, then run `muse project advance <project>`."
            )),

            Self::StaleChange { phase, .. } => Some(format!(
                "The {phase} phase was edited after this proposal was made. \
                 Edit an upstream phase again to get a fresh proposal."
            )),

            Self::FeatureLocked { required, .. } => Some(format!(
                "Upgrade to the {required} plan: `muse plan set {required}`"
            )),

            Self::UsageLimitExceeded { .. } => Some(
                "Wait for the next billing period or upgrade: `muse plan set pro`".to_string(),
            ),

            Self::Llm(_) => Some(
                "Check ANTHROPIC_API_KEY or that Ollama is running (OLLAMA_ENDPOINT).".to_string(),
            ),

            Self::InvalidArgument(msg) => {
                if msg.contains("tier") {
                    Some("Valid tiers: free, pro, studio".to_string())
                } else if msg.contains("format") {
                    Some("Valid export formats: markdown, json".to_string())
                } else {
                    None
                }
            }

            Self::RuleNotFound { .. }
            | Self::RequiredField(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::NotInitialized.exit_code(), 2);
        assert_eq!(Error::ChangeNotFound { id: "chg_1".into() }.exit_code(), 3);
        assert_eq!(Error::InvalidArgument("x".into()).exit_code(), 4);
        let stale = Error::StaleChange {
            id: "chg_1".into(),
            phase: "beats".into(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(stale.exit_code(), 5);
        let locked = Error::FeatureLocked {
            feature: "living_story".into(),
            tier: "free".into(),
            required: "pro".into(),
        };
        assert_eq!(locked.exit_code(), 6);
        assert_eq!(Error::Llm("down".into()).exit_code(), 9);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::FeatureLocked {
            feature: "final_export".into(),
            tier: "free".into(),
            required: "pro".into(),
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "FEATURE_LOCKED");
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"]["hint"].as_str().unwrap().contains("muse plan set pro"));
    }

    #[test]
    fn test_invalid_phase_hint_mentions_suggestion() {
        let err = Error::InvalidPhase {
            input: "beets".into(),
            suggestion: Some("beats".into()),
        };
        assert!(err.hint().unwrap().contains("Did you mean: beats"));
    }
}
