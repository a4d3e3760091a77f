use serde::{Deserialize, Serialize};

use crate::ids::PageId;

/// One canonical-store page returned by the page-index collaborator.
/// Immutable within a single search response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCandidate {
    pub id: PageId,
    pub url: String,
    pub title: String,
    pub excerpt: String,
}
