use std::{io, path::PathBuf};

use thiserror::Error;

use crate::loader::HookMode;

/// Boxed failure reported by a [`Loader`](crate::loader::Loader).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while bringing the filter up or tearing it down.
#[derive(Debug, Error)]
pub enum Error {
    /// Interface name contains an interior NUL byte.
    #[error("invalid network interface name {name:?}")]
    InvalidInterfaceName { name: String },

    /// Interface name does not map to a live interface.
    #[error("network interface `{name}` not found")]
    InterfaceNotFound {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Artifact file missing or unreadable.
    #[error("failed to open artifact {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Artifact rejected by the loader (malformed or incompatible object).
    #[error("failed to load artifact {}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Named entry point absent from the artifact.
    #[error("entry point `{entry_point}` not found in artifact")]
    EntryPointMissing { entry_point: String },

    /// Entry point present but no execution handle could be obtained for it
    /// (wrong program type, verifier rejection).
    #[error("entry point `{entry_point}` could not be loaded")]
    Program {
        entry_point: String,
        #[source]
        source: BoxError,
    },

    /// Termination handlers could not be installed.
    #[error("failed to install termination signal handlers")]
    Signals(#[source] io::Error),

    /// Hook already occupied, mode unsupported or permission denied.
    #[error("failed to attach `{entry_point}` to interface index {if_index} in {mode} mode")]
    Attach {
        entry_point: String,
        if_index: u32,
        mode: HookMode,
        #[source]
        source: BoxError,
    },

    /// The artifact was already released; nothing can be attached.
    #[error("eBPF artifact already released")]
    Released,

    #[error("failed to detach from interface index {if_index} in {mode} mode")]
    Detach {
        if_index: u32,
        mode: HookMode,
        #[source]
        source: BoxError,
    },
}
