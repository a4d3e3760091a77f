use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ActivityId, SuggestionId};
use crate::suggestion::{SourceType, SuggestionStatus};

/// Immutable record of one lifecycle transition.
///
/// The activity trail is append-only; `occurred_at` descending is the
/// canonical read order for display.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: ActivityId,
    pub suggestion_id: SuggestionId,
    pub resulting_status: SuggestionStatus,
    pub title: String,
    pub source_type: SourceType,
    pub actor_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
