//! Adaptive instruction-count sampling profiler engine.
//!
//! A host script runtime arms an instruction-count hook through
//! [`HostRuntime`] and forwards every hook to [`ProfilerSession::on_hook`].
//! Each interrupt refreshes the throughput estimate, re-arms the hook for
//! about one millisecond of work and folds the active stack into a
//! [`CallTree`]. [`ProfilerSession::dump`] writes the tree as folded stacks.

pub mod error;
pub mod host;
pub mod median;
pub mod rate;
pub mod report;
pub mod sampler;
pub mod session;
pub mod shared;
pub mod tree;

pub use countprof_config::{DepthPolicy, LineMode, ProfilerConfig, StackMode};
pub use countprof_utils::{Clock, ManualClock, MonotonicClock};
pub use error::{ProfilerError, Result};
pub use host::{FrameInfo, HookEvent, HookMask, HostRuntime};
pub use median::{MedianWindow, WINDOW_SIZE};
pub use rate::RateController;
pub use report::{FoldedLine, FoldedLines, folded_lines, parse_folded_line, write_folded};
pub use sampler::StackSampler;
pub use session::{ProfilerSession, SessionStats};
pub use shared::SharedSession;
pub use tree::{CallTree, FrameKey, NodeId, SourceId, SourceTable};
