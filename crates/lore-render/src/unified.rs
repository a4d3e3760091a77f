use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Removed,
    Added,
}

/// One tagged line of the unified view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: LineKind,
    pub number: usize,
    pub text: String,
}

/// Whole-block replacement view: every current line tagged removed,
/// then every proposed line tagged added. Each side numbers its lines
/// from 1 independently; blank lines are skipped and do not consume a
/// number. Intentionally not a minimal edit script.
pub fn unified(current: &str, proposed: &str) -> Vec<DiffLine> {
    let mut out = Vec::new();
    push_side(&mut out, current, LineKind::Removed);
    push_side(&mut out, proposed, LineKind::Added);
    out
}

fn push_side(out: &mut Vec<DiffLine>, content: &str, kind: LineKind) {
    let mut number = 0;
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        number += 1;
        out.push(DiffLine {
            kind,
            number,
            text: line.to_string(),
        });
    }
}
