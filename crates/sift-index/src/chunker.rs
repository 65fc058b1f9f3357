//! Character chunking with overlap and newline-preferring split points.

use uuid::Uuid;

use crate::config::ChunkerConfig;

/// Formats where breaking nested structure mid-token hurts retrieval, so the
/// chunk limit is halved.
const STRUCTURED_EXTENSIONS: &[&str] = &["json", "xml", "yaml", "yml", "toml", "html", "htm"];

/// One indexed unit of a file's extracted text.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Deterministic project-scoped identity, stable across both stores.
    pub id: String,
    pub text: String,
    /// Path relative to the indexed root.
    pub file_path: String,
    pub file_name: String,
    pub extension: String,
    /// Position within the source file.
    pub chunk_index: usize,
}

/// Split a file's extracted text into chunks carrying file identity.
///
/// Empty input yields no chunks; input that fits the (format-adjusted)
/// limit is returned as a single unchanged chunk.
#[must_use]
pub fn chunk_file(
    project_id: &str,
    text: &str,
    file_path: &str,
    config: &ChunkerConfig,
) -> Vec<Chunk> {
    let file_name = file_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_path)
        .to_string();
    let extension = file_name
        .rsplit('.')
        .next()
        .filter(|e| *e != file_name)
        .unwrap_or("")
        .to_ascii_lowercase();

    let effective_max = effective_max_chars(config.max_chars_per_chunk, &extension);
    let overlap = config.chunk_overlap.min(effective_max / 4);

    split_text(text, effective_max, overlap)
        .into_iter()
        .enumerate()
        .map(|(i, piece)| Chunk {
            id: chunk_id(project_id, file_path, i),
            text: piece,
            file_path: file_path.to_string(),
            file_name: file_name.clone(),
            extension: extension.clone(),
            chunk_index: i,
        })
        .collect()
}

/// Deterministic chunk identity over (project, path, position).
#[must_use]
pub fn chunk_id(project_id: &str, file_path: &str, chunk_index: usize) -> String {
    let key = format!("{project_id}:{file_path}:{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

fn effective_max_chars(max_chars: usize, extension: &str) -> usize {
    if STRUCTURED_EXTENSIONS.contains(&extension) {
        (max_chars / 2).max(1)
    } else {
        max_chars.max(1)
    }
}

/// Character-based splitting: each piece is at most `max_chars` long,
/// consecutive pieces share `overlap` characters, and a newline past the
/// midpoint of the window is preferred as the split point.
fn split_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + max_chars).min(chars.len());
        let end = if hard_end < chars.len() {
            newline_split(&chars, start, hard_end).unwrap_or(hard_end)
        } else {
            hard_end
        };

        pieces.push(chars[start..end].iter().collect());

        if end >= chars.len() {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    pieces
}

/// Index one past the last newline in `(midpoint, hard_end)`, if any.
fn newline_split(chars: &[char], start: usize, hard_end: usize) -> Option<usize> {
    let midpoint = start + (hard_end - start) / 2;
    (midpoint..hard_end)
        .rev()
        .find(|&i| chars[i] == '\n')
        .map(|i| i + 1)
}
