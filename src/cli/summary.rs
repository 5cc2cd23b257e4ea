use std::path::Path;

use ahash::AHashMap;
use anyhow::Result;
use colored::Colorize;
use countprof_engine::FoldedLine;

use super::{StackCounts, accumulate, ranked};

/// Per-frame totals derived from a profile.
#[derive(Debug, Default)]
pub struct Summary {
    pub total: u64,
    pub stacks: StackCounts,
    /// Samples where the frame was innermost
    pub self_counts: AHashMap<String, u64>,
    /// Samples where the frame appeared anywhere in the path
    pub inclusive_counts: AHashMap<String, u64>,
}

impl Summary {
    pub fn from_counts(stacks: StackCounts) -> Self {
        let mut summary = Self::default();

        for (stack, &count) in &stacks {
            summary.total = summary.total.saturating_add(count);

            let parsed = FoldedLine { stack, count };

            *summary
                .self_counts
                .entry(parsed.leaf().to_string())
                .or_insert(0) += count;

            // Recursive frames count once per path.
            let mut seen: Vec<&str> = Vec::new();
            for frame in parsed.frames() {
                if seen.contains(&frame) {
                    continue;
                }
                seen.push(frame);
                *summary
                    .inclusive_counts
                    .entry(frame.to_string())
                    .or_insert(0) += count;
            }
        }

        summary.stacks = stacks;
        summary
    }

    fn percent(&self, count: u64) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }

    fn print_table(&self, title: &str, counts: &AHashMap<String, u64>, top: usize) {
        println!("{}", title.bold());
        for (name, count) in ranked(counts).into_iter().take(top) {
            println!(
                "  {:>10} {:>6.2}%  {}",
                count,
                self.percent(count),
                name
            );
        }
        println!();
    }

    pub fn print(&self, top: usize) {
        println!("{} {}\n", "total samples:".bold(), self.total);
        self.print_table("hottest paths", &self.stacks, top);
        self.print_table("self samples", &self.self_counts, top);
        self.print_table("inclusive samples", &self.inclusive_counts, top);
    }
}

pub fn run(file: &Path, top: usize) -> Result<()> {
    let mut counts = StackCounts::default();
    accumulate(file, &mut counts)?;
    Summary::from_counts(counts).print(top);
    Ok(())
}
