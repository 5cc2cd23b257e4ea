//! Profiling session: the start/stop/dump surface a host binds to.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use countprof_config::ProfilerConfig;
use countprof_utils::{Clock, MonotonicClock};
use tracing::{debug, info, trace, warn};

use crate::error::{ProfilerError, Result};
use crate::host::{HookEvent, HookMask, HostRuntime};
use crate::rate::RateController;
use crate::report::{FoldedLines, write_folded};
use crate::sampler::StackSampler;
use crate::tree::CallTree;

/// Counters describing what a session has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Count interrupts handled, including call checks promoted to samples
    pub interrupts: u64,
    /// Call-entry hooks inspected
    pub call_checks: u64,
    /// Samples recorded into the call tree
    pub samples: u64,
    /// Interrupts where the host had no frame at the start depth
    pub empty_samples: u64,
    /// Samples lost to depth limits or allocation failure
    pub dropped_samples: u64,
}

/// One profiler instance bound to one host execution context.
///
/// All state lives here: the adaptive rate, the call tree and the sampler's
/// scratch space. Sessions are independent of each other, so a host with
/// several interpreter threads runs one session per thread.
pub struct ProfilerSession<H, C = MonotonicClock> {
    host: H,
    clock: C,
    config: ProfilerConfig,
    rate: RateController,
    sampler: StackSampler,
    tree: CallTree,
    stats: SessionStats,
    running: bool,
}

impl<H: HostRuntime> ProfilerSession<H, MonotonicClock> {
    pub fn new(host: H, config: ProfilerConfig) -> Self {
        Self::with_clock(host, MonotonicClock::new(), config)
    }
}

impl<H: HostRuntime, C: Clock> ProfilerSession<H, C> {
    pub fn with_clock(host: H, clock: C, config: ProfilerConfig) -> Self {
        debug!(?config, "creating profiler session");
        Self {
            host,
            clock,
            rate: RateController::new(config.initial_interval),
            sampler: StackSampler::new(&config),
            tree: CallTree::new(),
            stats: SessionStats::default(),
            running: false,
            config,
        }
    }

    fn hook_mask(&self) -> HookMask {
        if self.config.call_check {
            HookMask::COUNT | HookMask::CALL
        } else {
            HookMask::COUNT
        }
    }

    /// Arm the host interrupt with the last known interval and restart the
    /// elapsed-time baseline. Samples keep accumulating into the existing
    /// tree unless `reset_on_start` is set.
    pub fn start(&mut self) {
        if self.config.reset_on_start {
            self.reset();
        }

        let interval = self.rate.last_interval();
        self.host.register_interrupt(self.hook_mask(), interval);
        self.rate.resume_at(self.clock.now_micros());
        self.running = true;
        info!(interval, "profiling started");
    }

    /// Remove the host interrupt. Collected samples are kept.
    pub fn stop(&mut self) {
        self.host.deregister_interrupt();
        self.running = false;
        info!(
            samples = self.stats.samples,
            nodes = self.tree.len(),
            "profiling stopped"
        );
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Entry point for the host's hook callback.
    pub fn on_hook(&mut self, event: HookEvent) -> Result<()> {
        if !self.running {
            trace!(?event, "hook delivered while stopped");
            return Ok(());
        }

        match event {
            HookEvent::Count => {
                let executed = self.rate.last_interval();
                self.record_interrupt(executed).map(|_| ())
            }
            HookEvent::Call => {
                if !self.config.call_check {
                    return Ok(());
                }
                self.stats.call_checks += 1;

                // Too long since the last sample: behave as if the count ran out.
                let now = self.clock.now_micros();
                if self.rate.elapsed_since_last(now) > self.config.call_check_threshold_us {
                    let executed = self.rate.last_interval();
                    self.record_interrupt(executed).map(|_| ())
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Handle a count interrupt after `instructions_executed` instructions:
    /// update the rate estimate, re-arm the host and sample the stack.
    /// Returns the newly armed interval.
    ///
    /// The interval is re-armed before sampling, so a failed sample never
    /// leaves the host without a hook.
    pub fn record_interrupt(&mut self, instructions_executed: u64) -> Result<u64> {
        let now = self.clock.now_micros();
        let interval = self.rate.on_interrupt(now, instructions_executed);
        self.stats.interrupts += 1;

        // Execute approximately 1ms worth of instructions before the next one.
        self.host.register_interrupt(self.hook_mask(), interval);
        trace!(interval, "interrupt re-armed");

        let sampled = self.sample();

        // Time spent in the profiler is not billed to the profiled code.
        self.rate.resume_at(self.clock.now_micros());
        sampled.map(|()| interval)
    }

    fn sample(&mut self) -> Result<()> {
        let path = match self.sampler.capture(
            &self.host,
            self.tree.sources_mut(),
            self.config.start_depth,
        ) {
            Ok(path) => path,
            Err(err) => {
                self.stats.dropped_samples += 1;
                warn!(error = %err, "sample dropped");
                return Err(err);
            }
        };

        if path.is_empty() {
            self.stats.empty_samples += 1;
            return Ok(());
        }

        if let Err(err) = self.tree.record_sample(path) {
            self.stats.dropped_samples += 1;
            warn!(error = %err, "sample dropped");
            return Err(err);
        }
        self.stats.samples += 1;
        Ok(())
    }

    /// Folded lines for the current tree.
    pub fn report_lines(&self) -> FoldedLines<'_> {
        FoldedLines::new(&self.tree, self.config.emit_zero_counts)
    }

    pub fn write_report<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_folded(&self.tree, self.config.emit_zero_counts, out)
    }

    /// Artifact name used by [`dump`](Self::dump): `<pid>.<ext>` in the
    /// working directory.
    pub fn default_dump_path(&self) -> PathBuf {
        PathBuf::from(format!(
            "{}.{}",
            std::process::id(),
            self.config.output_extension
        ))
    }

    /// Write the report to the default artifact and return its path. The
    /// tree is not cleared.
    pub fn dump(&self) -> Result<PathBuf> {
        let path = self.default_dump_path();
        self.dump_to(&path)?;
        Ok(path)
    }

    /// Write the report to `path`, replacing any existing file.
    pub fn dump_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|err| ProfilerError::io(path, err))?;
        let mut out = BufWriter::new(file);
        self.write_report(&mut out)
            .map_err(|err| ProfilerError::io(path, err))?;
        info!(
            path = %path.display(),
            samples = self.tree.total_hits(),
            "profile dumped"
        );
        Ok(())
    }

    /// Drop all collected samples. The rate estimate is kept.
    pub fn reset(&mut self) {
        self.tree.clear();
        self.stats = SessionStats::default();
        info!("profile reset");
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn tree(&self) -> &CallTree {
        &self.tree
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn rate(&self) -> &RateController {
        &self.rate
    }

    /// Instruction interval currently armed on the host.
    pub fn current_interval(&self) -> u64 {
        self.rate.last_interval()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::host::FrameInfo;
    use countprof_config::{DepthPolicy, LineMode};
    use countprof_utils::ManualClock;

    /// Host double with a scripted stack, innermost frame first.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedHost {
        pub frames: Vec<(String, u32, u32)>,
        pub armed: Option<(HookMask, u64)>,
        pub registrations: usize,
    }

    impl ScriptedHost {
        pub fn set_stack(&mut self, outermost_first: &[&str]) {
            self.frames = outermost_first
                .iter()
                .rev()
                .map(|frame| {
                    let (source, line) = frame.rsplit_once(':').unwrap();
                    let line = line.parse().unwrap();
                    (source.to_string(), line, line)
                })
                .collect();
        }
    }

    impl HostRuntime for ScriptedHost {
        fn register_interrupt(&mut self, mask: HookMask, instruction_threshold: u64) {
            self.armed = Some((mask, instruction_threshold));
            self.registrations += 1;
        }

        fn deregister_interrupt(&mut self) {
            self.armed = None;
        }

        fn frame_info(&self, depth: usize) -> Option<FrameInfo<'_>> {
            self.frames
                .get(depth)
                .map(|(source, current, defined)| {
                    FrameInfo::new(source, *defined).with_current_line(*current)
                })
        }
    }

    fn session(config: ProfilerConfig) -> (ProfilerSession<ScriptedHost, ManualClock>, ManualClock) {
        let clock = ManualClock::new(0);
        let session = ProfilerSession::with_clock(ScriptedHost::default(), clock.clone(), config);
        (session, clock)
    }

    fn sorted_report<H: HostRuntime, C: Clock>(session: &ProfilerSession<H, C>) -> Vec<String> {
        let mut lines: Vec<String> = session.report_lines().collect();
        lines.sort();
        lines
    }

    #[test]
    fn test_start_and_stop_arm_host() {
        let (mut session, _clock) = session(ProfilerConfig::default());
        session.start();
        assert!(session.is_running());
        assert_eq!(session.host().armed, Some((HookMask::COUNT, 1)));

        session.stop();
        assert!(!session.is_running());
        assert_eq!(session.host().armed, None);
    }

    #[test]
    fn test_call_check_adds_call_mask() {
        let (mut session, _clock) = session(ProfilerConfig::default().with_call_check(true));
        session.start();
        assert_eq!(
            session.host().armed,
            Some((HookMask::COUNT | HookMask::CALL, 1))
        );
    }

    #[test]
    fn test_fixed_stack_scenario() {
        let (mut session, clock) = session(ProfilerConfig::default());
        session
            .host_mut()
            .set_stack(&["mod.lua:10", "mod.lua:20"]);
        session.start();

        for _ in 0..5 {
            clock.advance(100);
            session.record_interrupt(100).unwrap();
        }

        assert_eq!(sorted_report(&session), ["mod.lua:10;mod.lua:20 5"]);
        assert_eq!(session.stats().samples, 5);
        assert_eq!(session.stats().interrupts, 5);
    }

    #[test]
    fn test_branching_scenario() {
        let (mut session, clock) = session(ProfilerConfig::default());
        session.start();

        session.host_mut().set_stack(&["a:1", "a:5"]);
        for _ in 0..2 {
            clock.advance(100);
            session.on_hook(HookEvent::Count).unwrap();
        }
        session.host_mut().set_stack(&["a:1", "a:9"]);
        for _ in 0..3 {
            clock.advance(100);
            session.on_hook(HookEvent::Count).unwrap();
        }

        assert_eq!(sorted_report(&session), ["a:1;a:5 2", "a:1;a:9 3"]);
    }

    #[test]
    fn test_interval_rearmed_and_never_zero() {
        let (mut session, clock) = session(ProfilerConfig::default());
        session.host_mut().set_stack(&["a:1"]);
        session.start();

        for _ in 0..40 {
            clock.advance(100);
            let interval = session.record_interrupt(100).unwrap();
            assert!(interval >= 1);
            assert_eq!(session.host().armed, Some((HookMask::COUNT, interval)));
        }
        assert_eq!(session.current_interval(), 1000);
    }

    #[test]
    fn test_hooks_ignored_while_stopped() {
        let (mut session, clock) = session(ProfilerConfig::default());
        session.host_mut().set_stack(&["a:1"]);
        clock.advance(100);
        session.on_hook(HookEvent::Count).unwrap();
        assert!(session.tree().is_empty());
        assert_eq!(session.stats().interrupts, 0);
    }

    #[test]
    fn test_call_hook_samples_only_after_gap() {
        let (mut session, clock) = session(ProfilerConfig::default().with_call_check(true));
        session.host_mut().set_stack(&["loop.lua:3"]);
        session.start();

        clock.advance(5_000);
        session.on_hook(HookEvent::Call).unwrap();
        assert_eq!(session.stats().samples, 0);

        clock.advance(6_000);
        session.on_hook(HookEvent::Call).unwrap();
        assert_eq!(session.stats().samples, 1);
        assert_eq!(session.stats().call_checks, 2);

        // Baseline moved, so the next call entry is within the gap again.
        clock.advance(10);
        session.on_hook(HookEvent::Call).unwrap();
        assert_eq!(session.stats().samples, 1);
    }

    #[test]
    fn test_call_hook_ignored_without_call_check() {
        let (mut session, clock) = session(ProfilerConfig::default());
        session.host_mut().set_stack(&["loop.lua:3"]);
        session.start();
        clock.advance(50_000);
        session.on_hook(HookEvent::Call).unwrap();
        assert_eq!(session.stats().samples, 0);
        assert_eq!(session.stats().call_checks, 0);
    }

    #[test]
    fn test_empty_stack_counts_as_empty_sample() {
        let (mut session, clock) = session(ProfilerConfig::default());
        session.start();
        clock.advance(100);
        session.on_hook(HookEvent::Count).unwrap();
        assert_eq!(session.stats().empty_samples, 1);
        assert!(session.tree().is_empty());
    }

    #[test]
    fn test_rejected_sample_still_rearms() {
        let config = ProfilerConfig::default().with_max_stack_depth(1, DepthPolicy::Reject);
        let (mut session, clock) = session(config);
        session.host_mut().set_stack(&["a:1", "a:2"]);
        session.start();
        let before = session.host().registrations;

        clock.advance(100);
        let err = session.on_hook(HookEvent::Count).unwrap_err();
        assert!(matches!(err, ProfilerError::StackTooDeep { .. }));
        assert_eq!(session.host().registrations, before + 1);
        assert_eq!(session.stats().dropped_samples, 1);
    }

    #[test]
    fn test_restart_accumulates() {
        let (mut session, clock) = session(ProfilerConfig::default());
        session.host_mut().set_stack(&["a:1"]);

        for _ in 0..2 {
            session.start();
            clock.advance(100);
            session.on_hook(HookEvent::Count).unwrap();
            session.stop();
        }
        assert_eq!(sorted_report(&session), ["a:1 2"]);
    }

    #[test]
    fn test_reset_on_start() {
        let config = ProfilerConfig {
            reset_on_start: true,
            ..ProfilerConfig::default()
        };
        let (mut session, clock) = session(config);
        session.host_mut().set_stack(&["a:1"]);

        for _ in 0..2 {
            session.start();
            clock.advance(100);
            session.on_hook(HookEvent::Count).unwrap();
            session.stop();
        }
        assert_eq!(sorted_report(&session), ["a:1 1"]);
    }

    #[test]
    fn test_line_mode_current() {
        let config = ProfilerConfig::default().with_line_mode(LineMode::CurrentLine);
        let (mut session, clock) = session(config);
        session.host_mut().frames = vec![("f.lua".to_string(), 33, 30)];
        session.start();
        clock.advance(100);
        session.on_hook(HookEvent::Count).unwrap();
        assert_eq!(sorted_report(&session), ["f.lua:33 1"]);
    }

    #[test]
    fn test_dump_to_file_keeps_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.cp");

        let (mut session, clock) = session(ProfilerConfig::default());
        session.host_mut().set_stack(&["mod.lua:10", "mod.lua:20"]);
        session.start();
        for _ in 0..3 {
            clock.advance(100);
            session.on_hook(HookEvent::Count).unwrap();
        }

        session.dump_to(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "mod.lua:10;mod.lua:20 3\n");
        assert_eq!(session.tree().total_hits(), 3);
    }

    #[test]
    fn test_dump_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("profile.cp");
        let (session, _clock) = session(ProfilerConfig::default());

        let err = session.dump_to(&path).unwrap_err();
        assert!(matches!(err, ProfilerError::Io { .. }));
    }

    #[test]
    fn test_default_dump_path_uses_pid() {
        let (session, _clock) = session(ProfilerConfig::default());
        assert_eq!(
            session.default_dump_path(),
            PathBuf::from(format!("{}.cp", std::process::id()))
        );
    }

    #[test]
    fn test_dump_writes_pid_artifact_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, clock) = session(ProfilerConfig::default());
        session.host_mut().set_stack(&["mod.lua:10", "mod.lua:20"]);
        session.start();
        for _ in 0..2 {
            clock.advance(100);
            session.on_hook(HookEvent::Count).unwrap();
        }

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let dumped = session.dump();
        std::env::set_current_dir(previous).unwrap();

        let path = dumped.unwrap();
        assert_eq!(path, PathBuf::from(format!("{}.cp", std::process::id())));
        let contents = std::fs::read_to_string(dir.path().join(&path)).unwrap();
        assert_eq!(contents, "mod.lua:10;mod.lua:20 2\n");
    }
}
