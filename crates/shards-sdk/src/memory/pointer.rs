//! Pointer Block Codec
//!
//! A parent's content may end with an embedded block listing the children it
//! believes it has:
//!
//! ```text
//! Main text of the memory.
//!
//! <!-- sub-memories:start -->
//! [
//!   {
//!     "id": "…",
//!     "title": "…",
//!     "summary": "…"
//!   }
//! ]
//! <!-- sub-memories:end -->
//! ```
//!
//! The markers and the `{id, title, summary}` field names are a persisted
//! format. Indentation is cosmetic.

use serde::{Deserialize, Serialize};

use crate::{SDKError, SDKResult};

/// Opening delimiter of a pointer block
pub const POINTER_START: &str = "<!-- sub-memories:start -->";

/// Closing delimiter of a pointer block
pub const POINTER_END: &str = "<!-- sub-memories:end -->";

/// One believed child of a parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

impl PointerEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            summary: summary.into(),
        }
    }
}

/// Content split into its main text and pointer entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContent {
    pub main: String,
    pub entries: Vec<PointerEntry>,
}

/// Split content into main text and pointer entries.
///
/// Content without a start marker is returned whole with no entries. The
/// last start marker is the one that counts, so text that merely mentions a
/// marker earlier on does not hide a valid block behind it.
pub fn parse(content: &str) -> SDKResult<ParsedContent> {
    let Some(start) = content.rfind(POINTER_START) else {
        return Ok(ParsedContent {
            main: content.to_string(),
            entries: Vec::new(),
        });
    };

    let body_start = start + POINTER_START.len();
    let Some(end_offset) = content[body_start..].find(POINTER_END) else {
        return Err(SDKError::malformed_block("start marker without matching end marker"));
    };

    let json = content[body_start..body_start + end_offset].trim();
    let entries: Vec<PointerEntry> = serde_json::from_str(json)
        .map_err(|e| SDKError::malformed_block(format!("invalid pointer JSON: {}", e)))?;

    Ok(ParsedContent {
        main: content[..start].trim_end_matches(['\n', '\r']).to_string(),
        entries,
    })
}

/// Reassemble content from main text and entries.
///
/// An empty entry list renders the main text alone, so no empty block is
/// ever written.
pub fn render(main: &str, entries: &[PointerEntry]) -> SDKResult<String> {
    if entries.is_empty() {
        return Ok(main.to_string());
    }

    // `<` only ever appears inside JSON strings, so escaping it keeps a
    // marker quoted in a title or summary from terminating the block.
    let json = serde_json::to_string_pretty(entries)?.replace('<', "\\u003c");
    let mut out = String::with_capacity(main.len() + json.len() + 64);
    if !main.is_empty() {
        out.push_str(main);
        out.push_str("\n\n");
    }
    out.push_str(POINTER_START);
    out.push('\n');
    out.push_str(&json);
    out.push('\n');
    out.push_str(POINTER_END);
    out.push('\n');
    Ok(out)
}

/// Append one entry, creating the block if absent
pub fn append(content: &str, entry: PointerEntry) -> SDKResult<String> {
    let mut parsed = parse(content)?;
    parsed.entries.push(entry);
    render(&parsed.main, &parsed.entries)
}

/// Drop the entry with the given ID. Content is re-rendered unchanged when
/// the ID was never present.
pub fn remove_by_id(content: &str, id: &str) -> SDKResult<String> {
    let mut parsed = parse(content)?;
    parsed.entries.retain(|e| e.id != id);
    render(&parsed.main, &parsed.entries)
}

/// Replace every entry. Malformed blocks are tolerated: the whole content is
/// kept as main text and a fresh block is rendered after it.
pub fn replace_all(content: &str, entries: &[PointerEntry]) -> SDKResult<String> {
    let main = match parse(content) {
        Ok(parsed) => parsed.main,
        Err(e) => {
            tracing::debug!(error = %e, "Treating malformed pointer block as plain text");
            content.trim_end_matches(['\n', '\r']).to_string()
        }
    };
    render(&main, entries)
}

/// Whether the content carries a pointer start marker at all
pub fn has_block(content: &str) -> bool {
    content.contains(POINTER_START)
}
