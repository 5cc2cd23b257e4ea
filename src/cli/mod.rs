pub mod merge;
pub mod summary;

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use anyhow::{Context, Result};
use countprof_engine::parse_folded_line;
use tracing::warn;

/// Stack -> count for one or more profiles.
pub type StackCounts = AHashMap<String, u64>;

/// Add every line of the profile at `path` into `counts`. Returns the number
/// of lines read.
pub fn accumulate(path: &Path, counts: &mut StackCounts) -> Result<usize> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read profile {}", path.display()))?;

    let mut read = 0;
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(parsed) = parse_folded_line(line) else {
            warn!(file = %path.display(), line = number + 1, "skipping malformed line");
            continue;
        };
        let entry = counts.entry(parsed.stack.to_string()).or_insert(0);
        *entry = entry.saturating_add(parsed.count);
        read += 1;
    }
    Ok(read)
}

/// Entries sorted by descending count, then by stack.
pub fn ranked(counts: &AHashMap<String, u64>) -> Vec<(&str, u64)> {
    let mut entries: Vec<(&str, u64)> = counts
        .iter()
        .map(|(stack, &count)| (stack.as_str(), count))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries
}
