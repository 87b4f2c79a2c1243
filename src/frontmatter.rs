//! Markdown-with-YAML-frontmatter codec.
//!
//! Splits a file into `(metadata, body)` and emits the reverse without
//! reordering user-authored keys unnecessarily. Uses `serde_yaml::Mapping`,
//! which preserves insertion order instead of hashing keys — a linked-hash
//! map, not a plain map.
//!
//! Files that fail to parse yield `None` and are logged, never raised — a
//! single malformed file must never take the rest of the board down with
//! it.

use serde_yaml::{Mapping, Value};
use tracing::warn;

const DELIMITER: &str = "---";

/// A parsed Markdown-with-frontmatter document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub metadata: Mapping,
    pub body: String,
}

/// Split `contents` into `(metadata, body)`.
///
/// Returns `None` (and logs a warning) if the file has no `---` delimited
/// frontmatter block or the block does not parse as a YAML mapping. This
/// never raises: callers (the Filesystem Store) skip the file and continue.
#[must_use]
pub fn parse(contents: &str, source: &str) -> Option<Document> {
    let rest = contents.strip_prefix(DELIMITER)?;
    // The opening delimiter must be alone on its line.
    let rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n"))?;

    let end = find_closing_delimiter(rest)?;
    let (front, after) = rest.split_at(end);
    let body = after
        .strip_prefix(DELIMITER)
        .map(|s| s.trim_start_matches(['\n', '\r']))
        .unwrap_or(after)
        .to_string();

    let parsed: Value = match serde_yaml::from_str(front) {
        Ok(v) => v,
        Err(e) => {
            warn!(file = source, error = %e, "failed to parse frontmatter, skipping file");
            return None;
        }
    };

    let metadata = match parsed {
        Value::Mapping(m) => m,
        Value::Null => Mapping::new(),
        _ => {
            warn!(file = source, "frontmatter is not a YAML mapping, skipping file");
            return None;
        }
    };

    Some(Document { metadata, body })
}

/// Locate the line starting with `---` that closes the frontmatter block,
/// returning the byte offset of its start within `rest`.
fn find_closing_delimiter(rest: &str) -> Option<usize> {
    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == DELIMITER {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Emit `(metadata, body)` back into Markdown-with-frontmatter text.
///
/// Key order in `metadata` is preserved exactly (`sort_keys=false`
/// semantics) — callers control ordering by how they build the mapping.
#[must_use]
pub fn emit(metadata: &Mapping, body: &str) -> String {
    let yaml = serde_yaml::to_string(&Value::Mapping(metadata.clone()))
        .unwrap_or_default();
    let yaml = yaml.strip_suffix('\n').unwrap_or(&yaml);

    let mut out = String::new();
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(yaml);
    out.push('\n');
    out.push_str(DELIMITER);
    out.push('\n');
    if !body.is_empty() {
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}
