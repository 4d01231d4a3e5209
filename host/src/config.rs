//! Fixed run parameters of the benchmark.
//!
//! The harness has no configuration surface: these constants are the whole
//! of it. [`Config`] only exists so tests can build variants.

use std::{path::PathBuf, time::Duration};

use crate::loader::HookMode;

/// Interface the filter is attached to.
pub const INTERFACE: &str = "lo";

/// Precompiled artifact, relative to the working directory.
pub const ARTIFACT_PATH: &str = "prog.bpf.o";

/// Entry point inside the artifact.
pub const ENTRY_POINT: &str = "dropXDP";

/// Generic (skb) mode works on interfaces whose drivers lack native XDP.
pub const HOOK_MODE: HookMode = HookMode::Generic;

/// Interval between liveness dots.
pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub interface: String,
    pub artifact: PathBuf,
    pub entry_point: String,
    pub mode: HookMode,
    pub tick: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: INTERFACE.to_string(),
            artifact: PathBuf::from(ARTIFACT_PATH),
            entry_point: ENTRY_POINT.to_string(),
            mode: HOOK_MODE,
            tick: TICK,
        }
    }
}
