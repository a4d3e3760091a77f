use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PageId, SuggestionId, TeamId};

/// Platform a detection originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Chat,
    FileStorage,
    MeetingAudio,
    MeetingVideo,
    Docs,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::FileStorage => write!(f, "file_storage"),
            Self::MeetingAudio => write!(f, "meeting_audio"),
            Self::MeetingVideo => write!(f, "meeting_video"),
            Self::Docs => write!(f, "docs"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "file_storage" => Ok(Self::FileStorage),
            "meeting_audio" => Ok(Self::MeetingAudio),
            "meeting_video" => Ok(Self::MeetingVideo),
            "docs" => Ok(Self::Docs),
            other => Err(format!("unknown source type: {other}")),
        }
    }
}

/// Domain tag for the kind of knowledge a suggestion captures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeType {
    Policy,
    Process,
    Faq,
    Reference,
}

impl std::fmt::Display for KnowledgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Policy => write!(f, "policy"),
            Self::Process => write!(f, "process"),
            Self::Faq => write!(f, "faq"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

impl std::str::FromStr for KnowledgeType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "policy" => Ok(Self::Policy),
            "process" => Ok(Self::Process),
            "faq" => Ok(Self::Faq),
            "reference" => Ok(Self::Reference),
            other => Err(format!("unknown knowledge type: {other}")),
        }
    }
}

/// Lifecycle state of a suggestion. Forward-only:
/// detected → pending → {approved, rejected}.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Detected,
    Pending,
    Approved,
    Rejected,
}

impl SuggestionStatus {
    /// Approved and rejected admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Whether the forward-only state machine permits `self → target`.
    pub fn can_transition_to(self, target: SuggestionStatus) -> bool {
        matches!(
            (self, target),
            (Self::Detected, Self::Pending)
                | (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
        )
    }
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detected => write!(f, "detected"),
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for SuggestionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detected" => Ok(Self::Detected),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown suggestion status: {other}")),
        }
    }
}

/// One proposed change to canonical knowledge content.
///
/// `current_content` empty means the suggestion creates a new page;
/// `proposed_content` empty means it deletes one. `decided_at` and
/// `decided_by` are set exactly when the status is terminal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub team_id: TeamId,
    pub source_type: SourceType,
    pub knowledge_type: KnowledgeType,
    pub title: String,
    pub current_content: String,
    pub proposed_content: String,
    pub confidence: f64,
    pub status: SuggestionStatus,
    pub source_link: String,
    pub target_page: Option<PageId>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

impl Suggestion {
    /// True when no canonical page content exists yet for this suggestion.
    pub fn is_new_page(&self) -> bool {
        self.current_content.is_empty()
    }
}
