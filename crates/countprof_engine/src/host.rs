//! Capabilities the profiler needs from the host runtime.

use bitflags::bitflags;

bitflags! {
    /// Interrupt sources the profiler can ask the host for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HookMask: u8 {
        /// Fire after a number of instructions
        const COUNT = 0b01;
        /// Fire on every function call
        const CALL = 0b10;
    }
}

/// Which checkpoint delivered an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Count,
    Call,
}

/// What the host knows about one active frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo<'a> {
    /// Chunk or file name the frame's function was loaded from
    pub source: &'a str,
    /// Currently executing line, if the host tracks one for this frame
    pub current_line: Option<u32>,
    /// Line the frame's function was defined on
    pub definition_line: u32,
}

impl<'a> FrameInfo<'a> {
    pub fn new(source: &'a str, definition_line: u32) -> Self {
        Self {
            source,
            current_line: None,
            definition_line,
        }
    }

    pub fn with_current_line(mut self, line: u32) -> Self {
        self.current_line = Some(line);
        self
    }
}

/// Hook registration and frame introspection offered by a script runtime.
///
/// Implementations deliver interrupts by calling
/// [`ProfilerSession::on_hook`](crate::ProfilerSession::on_hook) from the
/// runtime's hook point, on the thread being profiled.
pub trait HostRuntime {
    /// Arm the interrupt. Replaces any previous registration.
    fn register_interrupt(&mut self, mask: HookMask, instruction_threshold: u64);

    fn deregister_interrupt(&mut self);

    /// Frame `depth` levels above the currently executing one, or `None` once
    /// past the root.
    fn frame_info(&self, depth: usize) -> Option<FrameInfo<'_>>;
}
