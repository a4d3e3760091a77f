use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use lore_core::ids::PageId;
use lore_render::Block;

/// What an approval hands to the canonical store for writing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageDraft {
    pub title: String,
    pub blocks: Vec<Block>,
    pub target_page: Option<PageId>,
}

/// Acknowledgment from the canonical store. `page` is the written
/// page, freshly created when the draft had no target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub page: PageId,
}

/// The canonical store rejected or failed the write.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PublishRejected(pub String);

/// Seam to the external system of record for knowledge pages. The
/// engine only waits for the acknowledgment; a failure rolls the
/// approval back.
#[async_trait]
pub trait CanonicalPublisher: Send + Sync {
    async fn publish(&self, draft: &PageDraft) -> Result<PublishReceipt, PublishRejected>;
}

/// Publisher used when no canonical store is wired up: acknowledges
/// every draft and assigns fresh page ids to new pages.
#[derive(Default)]
pub struct AckPublisher;

#[async_trait]
impl CanonicalPublisher for AckPublisher {
    async fn publish(&self, draft: &PageDraft) -> Result<PublishReceipt, PublishRejected> {
        let page = draft.target_page.clone().unwrap_or_default();
        info!(title = %draft.title, page = %page, blocks = draft.blocks.len(), "draft acknowledged");
        Ok(PublishReceipt { page })
    }
}
