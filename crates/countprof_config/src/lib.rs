//! Profiler configuration
//!
//! Every knob the sampling engine exposes, with defaults that reproduce the
//! classic count-hook profiler: definition lines, full stacks, no call-entry
//! checks.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which line of a frame is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LineMode {
    /// The line the enclosing function was defined on
    #[default]
    DefinitionLine,
    /// The line currently executing in the frame
    CurrentLine,
}

impl std::str::FromStr for LineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "definition" | "definition-line" | "def" => Ok(LineMode::DefinitionLine),
            "current" | "current-line" | "cur" => Ok(LineMode::CurrentLine),
            _ => Err(format!("Unknown line mode: {s}")),
        }
    }
}

/// How much of the stack one sample captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StackMode {
    /// Walk from the sampled frame out to the root
    #[default]
    Full,
    /// Record only the sampled frame
    TopFrame,
}

impl std::str::FromStr for StackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "full" | "stack" => Ok(StackMode::Full),
            "top" | "top-frame" | "frame" => Ok(StackMode::TopFrame),
            _ => Err(format!("Unknown stack mode: {s}")),
        }
    }
}

/// What to do with a stack deeper than `max_stack_depth`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DepthPolicy {
    /// Keep the innermost frames and drop the outer ones
    #[default]
    Truncate,
    /// Drop the whole sample and report an error
    Reject,
}

impl std::str::FromStr for DepthPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "truncate" | "trunc" => Ok(DepthPolicy::Truncate),
            "reject" | "error" => Ok(DepthPolicy::Reject),
            _ => Err(format!("Unknown depth policy: {s}")),
        }
    }
}

/// Complete profiler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Line recorded for each frame
    pub line_mode: LineMode,

    /// Whole stack or just the sampled frame
    pub stack_mode: StackMode,

    /// Depth the sampler starts at (0 = currently executing frame)
    pub start_depth: usize,

    /// Maximum number of frames captured per sample
    pub max_stack_depth: usize,

    /// Behaviour when a stack exceeds `max_stack_depth`
    pub depth_policy: DepthPolicy,

    /// Also check elapsed time on call entry
    pub call_check: bool,

    /// Gap in microseconds after which a call entry forces a sample
    pub call_check_threshold_us: u64,

    /// Instruction threshold armed before any throughput is known
    pub initial_interval: u64,

    /// Emit report lines for nodes that were never sampled themselves
    pub emit_zero_counts: bool,

    /// Clear the call tree every time sampling starts
    pub reset_on_start: bool,

    /// Extension of dump artifacts
    pub output_extension: String,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            line_mode: LineMode::DefinitionLine,
            stack_mode: StackMode::Full,
            start_depth: 0,
            max_stack_depth: 1024,
            depth_policy: DepthPolicy::Truncate,
            call_check: false,
            call_check_threshold_us: 10_000, // 10ms
            initial_interval: 1,
            emit_zero_counts: false,
            reset_on_start: false,
            output_extension: "cp".to_string(),
        }
    }
}

impl ProfilerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COUNTPROF_LINE_MODE")
            && let Ok(mode) = val.parse()
        {
            config.line_mode = mode;
        }

        if let Ok(val) = std::env::var("COUNTPROF_STACK_MODE")
            && let Ok(mode) = val.parse()
        {
            config.stack_mode = mode;
        }

        if let Ok(val) = std::env::var("COUNTPROF_START_DEPTH") {
            config.start_depth = val.parse().unwrap_or(0);
        }

        if let Ok(val) = std::env::var("COUNTPROF_MAX_DEPTH") {
            config.max_stack_depth = val.parse().unwrap_or(1024);
        }

        if let Ok(val) = std::env::var("COUNTPROF_DEPTH_POLICY")
            && let Ok(policy) = val.parse()
        {
            config.depth_policy = policy;
        }

        if let Ok(val) = std::env::var("COUNTPROF_CALL_CHECK") {
            config.call_check = val.parse().unwrap_or(true);
        }

        if let Ok(val) = std::env::var("COUNTPROF_CALL_CHECK_US") {
            config.call_check_threshold_us = val.parse().unwrap_or(10_000);
        }

        if let Ok(val) = std::env::var("COUNTPROF_INITIAL_INTERVAL") {
            config.initial_interval = val.parse::<u64>().unwrap_or(1).max(1);
        }

        if let Ok(val) = std::env::var("COUNTPROF_ZERO_COUNTS") {
            config.emit_zero_counts = val.parse().unwrap_or(true);
        }

        if let Ok(val) = std::env::var("COUNTPROF_RESET_ON_START") {
            config.reset_on_start = val.parse().unwrap_or(true);
        }

        config
    }

    /// Load configuration from TOML file
    #[cfg(feature = "toml-config")]
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ProfilerConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn from_file(_path: &Path) -> anyhow::Result<Self> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Save configuration to TOML file
    #[cfg(feature = "toml-config")]
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Save configuration to TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn save_to_file(&self, _path: &Path) -> anyhow::Result<()> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Merge with environment variables (env vars take precedence)
    pub fn merge_with_env(mut self) -> Self {
        let env_config = Self::from_env();

        if std::env::var("COUNTPROF_LINE_MODE").is_ok() {
            self.line_mode = env_config.line_mode;
        }
        if std::env::var("COUNTPROF_STACK_MODE").is_ok() {
            self.stack_mode = env_config.stack_mode;
        }
        if std::env::var("COUNTPROF_START_DEPTH").is_ok() {
            self.start_depth = env_config.start_depth;
        }
        if std::env::var("COUNTPROF_MAX_DEPTH").is_ok() {
            self.max_stack_depth = env_config.max_stack_depth;
        }
        if std::env::var("COUNTPROF_DEPTH_POLICY").is_ok() {
            self.depth_policy = env_config.depth_policy;
        }
        if std::env::var("COUNTPROF_CALL_CHECK").is_ok() {
            self.call_check = env_config.call_check;
        }
        if std::env::var("COUNTPROF_CALL_CHECK_US").is_ok() {
            self.call_check_threshold_us = env_config.call_check_threshold_us;
        }
        if std::env::var("COUNTPROF_INITIAL_INTERVAL").is_ok() {
            self.initial_interval = env_config.initial_interval;
        }
        if std::env::var("COUNTPROF_ZERO_COUNTS").is_ok() {
            self.emit_zero_counts = env_config.emit_zero_counts;
        }
        if std::env::var("COUNTPROF_RESET_ON_START").is_ok() {
            self.reset_on_start = env_config.reset_on_start;
        }

        self
    }

    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.merge_with_env())
    }

    pub fn with_line_mode(mut self, line_mode: LineMode) -> Self {
        self.line_mode = line_mode;
        self
    }

    pub fn with_stack_mode(mut self, stack_mode: StackMode) -> Self {
        self.stack_mode = stack_mode;
        self
    }

    pub fn with_call_check(mut self, enabled: bool) -> Self {
        self.call_check = enabled;
        self
    }

    pub fn with_max_stack_depth(mut self, max_stack_depth: usize, policy: DepthPolicy) -> Self {
        self.max_stack_depth = max_stack_depth;
        self.depth_policy = policy;
        self
    }
}
