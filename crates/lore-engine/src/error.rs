use lore_core::detection::DetectionError;
use lore_core::suggestion::SuggestionStatus;
use lore_store::StoreError;

/// Typed error hierarchy for lifecycle operations. Every failed
/// mutating call leaves state exactly as it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: suggestion is {from}, wanted {to}")]
    InvalidTransition {
        from: SuggestionStatus,
        to: SuggestionStatus,
    },

    #[error("suggestion quota exceeded: {used} used of {}", limit.map(|l| l.to_string()).unwrap_or_else(|| "unlimited".into()))]
    QuotaExceeded { used: u64, limit: Option<u64> },

    #[error("canonical store publish failed: {0}")]
    PublishFailed(String),

    #[error("malformed detection: {0}")]
    Malformed(#[from] DetectionError),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }
}

impl EngineError {
    /// Short classification string for logging and result codes.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::PublishFailed(_) => "publish_failed",
            Self::Malformed(_) => "malformed_content",
            Self::Store(_) => "store_error",
        }
    }

    /// Errors the reviewer can act on from the UI (upgrade the plan,
    /// refresh the list) rather than operational failures.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. } | Self::QuotaExceeded { .. } | Self::NotFound(_)
        )
    }
}
