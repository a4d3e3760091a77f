use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One typed block of proposed content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: String },
    List { ordered: bool, items: Vec<String> },
    Paragraph { text: String },
}

fn ordered_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\s").expect("valid marker pattern"))
}

/// Restartable iterator over the typed blocks of `content`.
///
/// Blocks are runs of non-blank lines separated by blank-line
/// boundaries, classified in source order. Whitespace-only runs are
/// dropped. Clone to restart from the beginning.
#[derive(Clone, Debug)]
pub struct Blocks<'a> {
    remaining: &'a str,
}

impl<'a> Blocks<'a> {
    pub fn new(content: &'a str) -> Self {
        Self { remaining: content }
    }

    /// Take the next run of non-blank lines as a raw chunk.
    fn next_chunk(&mut self) -> Option<Vec<&'a str>> {
        loop {
            if self.remaining.is_empty() {
                return None;
            }
            let mut lines = Vec::new();
            let mut rest = self.remaining;
            while let Some(line) = next_line(&mut rest) {
                if line.trim().is_empty() {
                    if lines.is_empty() {
                        continue;
                    }
                    break;
                }
                lines.push(line);
            }
            self.remaining = rest;
            if !lines.is_empty() {
                return Some(lines);
            }
            if self.remaining.is_empty() {
                return None;
            }
        }
    }
}

/// Pop the next line off `rest`, consuming the trailing newline.
fn next_line<'a>(rest: &mut &'a str) -> Option<&'a str> {
    if rest.is_empty() {
        return None;
    }
    match rest.find('\n') {
        Some(idx) => {
            let line = &rest[..idx];
            *rest = &rest[idx + 1..];
            Some(line.strip_suffix('\r').unwrap_or(line))
        }
        None => {
            let line = *rest;
            *rest = "";
            Some(line)
        }
    }
}

impl Iterator for Blocks<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let lines = self.next_chunk()?;
        Some(classify(&lines))
    }
}

/// Classify one non-empty run of lines. First matching rule wins:
/// heading prefixes on the first line, then list markers (every line
/// must carry one), then the paragraph fallback. Tagging only; a block
/// with mixed lines falls through to a paragraph rather than losing
/// the non-matching lines.
fn classify(lines: &[&str]) -> Block {
    let first = lines[0].trim_start();

    for (prefix, level) in [("### ", 3u8), ("## ", 2), ("# ", 1)] {
        if let Some(text) = first.strip_prefix(prefix) {
            return Block::Heading {
                level,
                text: text.trim().to_string(),
            };
        }
    }

    if lines.iter().all(|l| is_unordered_item(l.trim_start())) {
        let items = lines
            .iter()
            .map(|l| l.trim_start()[2..].trim().to_string())
            .collect();
        return Block::List { ordered: false, items };
    }

    if lines.iter().all(|l| ordered_marker().is_match(l.trim_start())) {
        let items = lines
            .iter()
            .map(|l| l.trim_start())
            .filter_map(|l| ordered_marker().find(l).map(|m| l[m.end()..].trim().to_string()))
            .collect();
        return Block::List { ordered: true, items };
    }

    Block::Paragraph {
        text: lines
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn is_unordered_item(line: &str) -> bool {
    line.starts_with("- ") || line.starts_with("* ")
}

/// Collect all preview blocks of `content`.
pub fn preview(content: &str) -> Vec<Block> {
    Blocks::new(content).collect()
}
