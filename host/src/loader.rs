//! The loader contract the lifecycle is written against.
//!
//! [`kernel::KernelLoader`] drives the real kernel through `aya`; tests use a
//! recording fake.

#[cfg(test)]
pub(crate) mod fake;
pub mod kernel;

use std::{fmt, os::fd::RawFd, path::Path};

use crate::{
    error::Result,
    iface::{self, InterfaceHandle},
};

/// How the kernel runs the program on the XDP hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookMode {
    /// Native, in-driver execution.
    Driver,
    /// Software-emulated (skb) execution, available on every interface.
    Generic,
}

impl fmt::Display for HookMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookMode::Driver => f.write_str("driver"),
            HookMode::Generic => f.write_str("generic"),
        }
    }
}

/// Where, and how, a program is installed. Recorded at attach time and
/// handed back unchanged on detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hook {
    pub iface: InterfaceHandle,
    pub mode: HookMode,
}

/// A located entry point of a loaded artifact.
///
/// Only meaningful while the artifact it came from is still loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramHandle {
    name: String,
    fd: RawFd,
}

impl ProgramHandle {
    pub fn new(name: impl Into<String>, fd: RawFd) -> Self {
        Self {
            name: name.into(),
            fd,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw descriptor of the loaded program, for diagnostics.
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

pub trait Loader {
    /// Raw artifact contents, read but not yet handed to the kernel.
    type Blob;
    /// A loaded artifact. Owning it keeps its programs alive.
    type Artifact;
    /// Token for an installed hook.
    type Link;
    type Error: std::error::Error + Send + Sync + 'static;

    fn resolve(&self, name: &str) -> Result<InterfaceHandle> {
        iface::resolve(name)
    }

    fn open(&mut self, path: &Path) -> Result<Self::Blob, Self::Error>;

    fn load(&mut self, blob: Self::Blob) -> Result<Self::Artifact, Self::Error>;

    /// Finds `entry_point` and obtains its execution handle. `Ok(None)` means
    /// the artifact has no program by that name.
    fn locate(
        &mut self,
        artifact: &mut Self::Artifact,
        entry_point: &str,
    ) -> Result<Option<ProgramHandle>, Self::Error>;

    fn attach(
        &mut self,
        artifact: &mut Self::Artifact,
        program: &ProgramHandle,
        hook: Hook,
    ) -> Result<Self::Link, Self::Error>;

    fn detach(
        &mut self,
        artifact: &mut Self::Artifact,
        program: &ProgramHandle,
        link: Self::Link,
        hook: Hook,
    ) -> Result<(), Self::Error>;

    /// Unloads the artifact. Must only be called with no hook installed.
    fn release(&mut self, artifact: Self::Artifact);
}
