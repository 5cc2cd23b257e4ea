//! Stack capture.
//!
//! The sampler walks the host's frames outward from the triggering depth and
//! produces a root-to-leaf path of [`FrameKey`]s for the aggregator. The walk
//! is an explicit loop bounded by the configured maximum depth.

use countprof_config::{DepthPolicy, LineMode, ProfilerConfig, StackMode};

use crate::error::{ProfilerError, Result};
use crate::host::{FrameInfo, HostRuntime};
use crate::tree::{FrameKey, SourceTable};

#[derive(Debug, Clone)]
pub struct StackSampler {
    line_mode: LineMode,
    stack_mode: StackMode,
    max_depth: usize,
    depth_policy: DepthPolicy,
    scratch: Vec<FrameKey>,
}

impl StackSampler {
    pub fn new(config: &ProfilerConfig) -> Self {
        let max_depth = config.max_stack_depth.max(1);
        Self {
            line_mode: config.line_mode,
            stack_mode: config.stack_mode,
            max_depth,
            depth_policy: config.depth_policy,
            scratch: Vec::with_capacity(max_depth.min(64)),
        }
    }

    fn line_of(&self, info: &FrameInfo<'_>) -> u32 {
        match self.line_mode {
            LineMode::DefinitionLine => info.definition_line,
            LineMode::CurrentLine => info.current_line.unwrap_or(info.definition_line),
        }
    }

    /// Resolve the single frame at `depth`. `None` means the walk is past the
    /// root.
    pub fn capture_frame<H: HostRuntime>(
        &self,
        host: &H,
        sources: &mut SourceTable,
        depth: usize,
    ) -> Result<Option<FrameKey>> {
        let Some(info) = host.frame_info(depth) else {
            return Ok(None);
        };
        let source = sources.intern(info.source)?;
        Ok(Some(FrameKey::new(source, self.line_of(&info))))
    }

    /// Capture the active stack starting at `start_depth`, ordered from the
    /// outermost frame to the sampled one. Empty when the host has no frame at
    /// `start_depth`.
    pub fn capture<H: HostRuntime>(
        &mut self,
        host: &H,
        sources: &mut SourceTable,
        start_depth: usize,
    ) -> Result<&[FrameKey]> {
        self.scratch.clear();

        let limit = match self.stack_mode {
            StackMode::TopFrame => 1,
            StackMode::Full => self.max_depth,
        };

        // Decide on overlong stacks before interning anything, so a rejected
        // sample leaves no source names behind.
        if self.stack_mode == StackMode::Full
            && host.frame_info(start_depth.saturating_add(limit)).is_some()
        {
            match self.depth_policy {
                DepthPolicy::Truncate => {
                    tracing::trace!(limit, "stack truncated to innermost frames");
                }
                DepthPolicy::Reject => {
                    let mut total = limit + 1;
                    while host.frame_info(start_depth + total).is_some() {
                        total += 1;
                    }
                    return Err(ProfilerError::StackTooDeep {
                        depth: total,
                        limit,
                    });
                }
            }
        }

        let mut depth = start_depth;
        while self.scratch.len() < limit {
            match self.capture_frame(host, sources, depth)? {
                Some(key) => self.scratch.push(key),
                None => break,
            }
            depth += 1;
        }

        self.scratch.reverse();
        Ok(&self.scratch)
    }
}

impl Default for StackSampler {
    fn default() -> Self {
        Self::new(&ProfilerConfig::default())
    }
}
