//! # lore-render
//!
//! Pure content rendering for suggestion review. Turns a pair of raw
//! text blobs (current page content, proposed content) into three
//! independent views:
//!
//! - [`preview`]: proposed content as typed structural blocks
//! - [`side_by_side`]: raw dual display of both sides
//! - [`unified`]: naive all-removed-then-all-added line view
//!
//! No state, no IO. Tagging only, never content mutation.

#![deny(unsafe_code)]

mod preview;
mod side_by_side;
mod unified;

pub use preview::{preview, Block, Blocks};
pub use side_by_side::{side_by_side, SideBySide, NEW_PAGE_PLACEHOLDER};
pub use unified::{unified, DiffLine, LineKind};
