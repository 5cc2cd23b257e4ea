//! Folded-stack report format.
//!
//! Each line names one call path and its hit count:
//!
//! ```text
//! main.lua:1;util.lua:12;util.lua:40 17
//! ```
//!
//! The output feeds directly into `flamegraph.pl`, inferno or speedscope.

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::tree::{CallTree, NodeId};

/// Depth-first walk over a [`CallTree`] yielding one folded line per node.
///
/// Children are visited in first-seen order. Nodes with zero hits (call
/// sites that only appear as ancestors of sampled frames) are skipped unless
/// `emit_zero_counts` is set. The walk cannot be rewound; build a new
/// iterator for another pass.
pub struct FoldedLines<'a> {
    tree: &'a CallTree,
    pending: Vec<(NodeId, usize)>,
    path: Vec<NodeId>,
    emit_zero_counts: bool,
}

impl<'a> FoldedLines<'a> {
    pub fn new(tree: &'a CallTree, emit_zero_counts: bool) -> Self {
        let pending = tree.roots().iter().rev().map(|&id| (id, 0)).collect();
        Self {
            tree,
            pending,
            path: Vec::new(),
            emit_zero_counts,
        }
    }

    fn render(&self, hits: u64) -> String {
        let mut line = String::new();
        for (i, &id) in self.path.iter().enumerate() {
            if i > 0 {
                line.push(';');
            }
            let key = self.tree.key(id);
            let _ = write!(line, "{}:{}", self.tree.source_name(id), key.line);
        }
        let _ = write!(line, " {hits}");
        line
    }
}

impl Iterator for FoldedLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some((id, depth)) = self.pending.pop() {
            self.path.truncate(depth);
            self.path.push(id);
            self.pending.extend(
                self.tree
                    .children(id)
                    .iter()
                    .rev()
                    .map(|&child| (child, depth + 1)),
            );

            let hits = self.tree.hits(id);
            if hits > 0 || self.emit_zero_counts {
                return Some(self.render(hits));
            }
        }
        None
    }
}

/// Lines for every sampled node of `tree`.
pub fn folded_lines(tree: &CallTree) -> FoldedLines<'_> {
    FoldedLines::new(tree, false)
}

/// Write the folded report, one newline-terminated line per node.
pub fn write_folded<W: Write>(
    tree: &CallTree,
    emit_zero_counts: bool,
    out: &mut W,
) -> io::Result<()> {
    for line in FoldedLines::new(tree, emit_zero_counts) {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// One parsed report line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldedLine<'a> {
    /// The `;`-joined path exactly as written
    pub stack: &'a str,
    pub count: u64,
}

impl<'a> FoldedLine<'a> {
    /// Frames from outermost to innermost.
    pub fn frames(&self) -> std::str::Split<'a, char> {
        self.stack.split(';')
    }

    /// Innermost frame of the path.
    pub fn leaf(&self) -> &'a str {
        self.stack.rsplit(';').next().unwrap_or(self.stack)
    }
}

/// Split a report line into its path and count. Blank or malformed lines
/// yield `None`.
pub fn parse_folded_line(line: &str) -> Option<FoldedLine<'_>> {
    let line = line.trim_end();
    let (stack, count) = line.rsplit_once(' ')?;
    if stack.is_empty() {
        return None;
    }
    let count = count.parse().ok()?;
    Some(FoldedLine { stack, count })
}
