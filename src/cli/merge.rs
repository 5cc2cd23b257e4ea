use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use super::{StackCounts, accumulate};

pub fn run(output: &Path, files: &[PathBuf]) -> Result<()> {
    let counts = merge(files)?;
    write_counts(output, &counts)?;
    info!(
        inputs = files.len(),
        stacks = counts.len(),
        output = %output.display(),
        "profiles merged"
    );
    Ok(())
}

pub fn merge(files: &[PathBuf]) -> Result<StackCounts> {
    let mut counts = StackCounts::default();
    for file in files {
        accumulate(file, &mut counts)?;
    }
    Ok(counts)
}

/// Write `counts` as a folded profile, sorted by stack for stable diffs.
pub fn write_counts(output: &Path, counts: &StackCounts) -> Result<()> {
    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut out = BufWriter::new(file);

    let mut stacks: Vec<(&String, &u64)> = counts.iter().collect();
    stacks.sort_by(|a, b| a.0.cmp(b.0));
    for (stack, count) in stacks {
        writeln!(out, "{stack} {count}")
            .with_context(|| format!("failed to write {}", output.display()))?;
    }
    out.flush()
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}
