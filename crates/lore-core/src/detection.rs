use serde::{Deserialize, Serialize};

use crate::ids::TeamId;
use crate::suggestion::{KnowledgeType, SourceType};

/// Inbound payload from the upstream detection producer.
///
/// The producer is opaque to this system; its output is validated here
/// before any state mutation. A detection whose `needs_triage` flag is
/// set enters the pipeline in `detected` status instead of `pending`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Detection {
    pub team_id: TeamId,
    pub source_type: SourceType,
    pub knowledge_type: KnowledgeType,
    pub title: String,
    #[serde(default)]
    pub current_content: String,
    #[serde(default)]
    pub proposed_content: String,
    pub confidence: f64,
    pub source_link: String,
    #[serde(default)]
    pub needs_triage: bool,
}

/// Why a detection payload was rejected before ingest.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DetectionError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("proposed content empty for a non-deletion change")]
    EmptyProposal,
}

impl Detection {
    /// Validate required fields. Empty `proposed_content` is only legal
    /// when `current_content` is non-empty (a deletion).
    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.title.trim().is_empty() {
            return Err(DetectionError::MissingField("title"));
        }
        if self.source_link.trim().is_empty() {
            return Err(DetectionError::MissingField("source_link"));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(DetectionError::ConfidenceOutOfRange(self.confidence));
        }
        if self.proposed_content.is_empty() && self.current_content.is_empty() {
            return Err(DetectionError::EmptyProposal);
        }
        Ok(())
    }

    /// Whether this detection removes existing content rather than
    /// adding or replacing it.
    pub fn is_deletion(&self) -> bool {
        self.proposed_content.is_empty() && !self.current_content.is_empty()
    }
}
