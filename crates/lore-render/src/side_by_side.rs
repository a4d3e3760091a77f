use serde::{Deserialize, Serialize};

/// Shown in place of the current pane when the suggestion creates a
/// brand-new page.
pub const NEW_PAGE_PLACEHOLDER: &str = "No existing content - this is a new page";

/// Raw dual display of both sides. No line alignment, no diffing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideBySide {
    pub current: String,
    pub proposed: String,
}

/// Render current and proposed content verbatim, substituting the
/// new-page placeholder when there is no existing content.
pub fn side_by_side(current: &str, proposed: &str) -> SideBySide {
    SideBySide {
        current: if current.is_empty() {
            NEW_PAGE_PLACEHOLDER.to_string()
        } else {
            current.to_string()
        },
        proposed: proposed.to_string(),
    }
}
