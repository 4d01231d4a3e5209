//! Attach/detach lifecycle of the filter program.
//!
//! The sequence is strictly linear: resolve the interface, open and load the
//! artifact, locate the entry point, install the termination handlers,
//! attach, tick until a signal arrives, detach and release. Every failure
//! before `Running` is fatal and releases whatever was already acquired.
//!
//! Invariant: [`AttachmentState::Attached`] holds exactly while the hook is
//! installed in the kernel. [`Lifecycle::shutdown`] is the only transition
//! out of it and is safe to call any number of times.

use std::{future::Future, io::Write, mem, time::Duration};

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    error::{Error, Result},
    iface::InterfaceHandle,
    loader::{Hook, HookMode, Loader, ProgramHandle},
    signals::{Termination, TerminationSignals},
};

/// An installed hook, with the parameters it was installed with.
#[derive(Debug)]
pub struct Attachment<K> {
    pub hook: Hook,
    pub program: ProgramHandle,
    link: K,
}

#[derive(Debug)]
pub enum AttachmentState<K> {
    Detached,
    Attached(Attachment<K>),
}

impl<K> AttachmentState<K> {
    pub fn is_attached(&self) -> bool {
        matches!(self, AttachmentState::Attached(_))
    }
}

/// Outcome of [`Lifecycle::shutdown`].
#[derive(Debug)]
pub enum Shutdown {
    /// The hook was removed.
    Detached,
    /// The detach call failed. The artifact was released regardless.
    DetachFailed(Error),
    /// Nothing was attached; no detach was issued.
    AlreadyDetached,
}

pub struct Lifecycle<L: Loader> {
    loader: L,
    artifact: Option<L::Artifact>,
    program: ProgramHandle,
    iface: InterfaceHandle,
    mode: HookMode,
    tick: Duration,
    state: AttachmentState<L::Link>,
}

impl<L: Loader> Lifecycle<L> {
    /// Brings the filter up: prepares the artifact, installs the termination
    /// handlers and attaches.
    ///
    /// Must run inside a Tokio runtime.
    pub fn start(loader: L, config: &Config) -> Result<(Self, TerminationSignals)> {
        let mut lifecycle = Self::prepare(loader, config)?;

        let signals = match TerminationSignals::install() {
            Ok(signals) => signals,
            Err(e) => {
                lifecycle.release();
                return Err(Error::Signals(e));
            }
        };

        Ok((lifecycle.attach()?, signals))
    }

    /// Resolves the interface, opens and loads the artifact and locates the
    /// entry point. Nothing is attached yet.
    pub fn prepare(mut loader: L, config: &Config) -> Result<Self> {
        let iface = loader.resolve(&config.interface)?;
        debug!(
            event.name = "lifecycle.interface_resolved",
            network.interface.name = %config.interface,
            network.interface.index = iface.index(),
            "resolved network interface"
        );

        let blob = match loader.open(&config.artifact) {
            Ok(blob) => blob,
            Err(e) => {
                error!(
                    event.name = "lifecycle.open_failed",
                    ebpf.artifact.path = %config.artifact.display(),
                    error = %e,
                    "error opening the eBPF artifact"
                );
                return Err(Error::Open {
                    path: config.artifact.clone(),
                    source: Box::new(e),
                });
            }
        };

        let mut artifact = match loader.load(blob) {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(
                    event.name = "lifecycle.load_failed",
                    ebpf.artifact.path = %config.artifact.display(),
                    error = %e,
                    "error loading the eBPF program"
                );
                return Err(Error::Load {
                    path: config.artifact.clone(),
                    source: Box::new(e),
                });
            }
        };
        info!(
            event.name = "lifecycle.artifact_loaded",
            ebpf.artifact.path = %config.artifact.display(),
            "eBPF artifact loaded"
        );

        let program = match loader.locate(&mut artifact, &config.entry_point) {
            Ok(Some(program)) => program,
            Ok(None) => {
                error!(
                    event.name = "lifecycle.entry_point_missing",
                    ebpf.program.name = %config.entry_point,
                    "entry point not found in the eBPF artifact"
                );
                loader.release(artifact);
                return Err(Error::EntryPointMissing {
                    entry_point: config.entry_point.clone(),
                });
            }
            Err(e) => {
                error!(
                    event.name = "lifecycle.program_load_failed",
                    ebpf.program.name = %config.entry_point,
                    error = %e,
                    "entry point could not be loaded"
                );
                loader.release(artifact);
                return Err(Error::Program {
                    entry_point: config.entry_point.clone(),
                    source: Box::new(e),
                });
            }
        };
        debug!(
            event.name = "lifecycle.program_located",
            ebpf.program.name = program.name(),
            ebpf.program.fd = program.fd(),
            "located entry point"
        );

        Ok(Self {
            loader,
            artifact: Some(artifact),
            program,
            iface,
            mode: config.mode,
            tick: config.tick,
            state: AttachmentState::Detached,
        })
    }

    /// Installs the hook. On failure the artifact is released before the
    /// error is returned.
    pub fn attach(mut self) -> Result<Self> {
        if self.state.is_attached() {
            return Ok(self);
        }

        let hook = Hook {
            iface: self.iface,
            mode: self.mode,
        };
        let Some(artifact) = self.artifact.as_mut() else {
            return Err(Error::Released);
        };

        match self.loader.attach(artifact, &self.program, hook) {
            Ok(link) => {
                self.state = AttachmentState::Attached(Attachment {
                    hook,
                    program: self.program.clone(),
                    link,
                });
                info!(
                    event.name = "lifecycle.program_attached",
                    ebpf.program.name = self.program.name(),
                    network.interface.index = hook.iface.index(),
                    xdp.mode = %hook.mode,
                    "eBPF program attached"
                );
                Ok(self)
            }
            Err(e) => {
                error!(
                    event.name = "lifecycle.attach_failed",
                    network.interface.index = hook.iface.index(),
                    xdp.mode = %hook.mode,
                    error = %e,
                    "failed to attach eBPF program"
                );
                let err = Error::Attach {
                    entry_point: self.program.name().to_string(),
                    if_index: hook.iface.index(),
                    mode: hook.mode,
                    source: Box::new(e),
                };
                self.release();
                Err(err)
            }
        }
    }

    pub fn state(&self) -> &AttachmentState<L::Link> {
        &self.state
    }

    /// Writes a `.` to `out` every tick until `shutdown` completes, then
    /// returns what it completed with.
    ///
    /// `shutdown` is polled ahead of the ticker, so a pending signal is never
    /// delayed by a tick.
    pub async fn run_until<F, W>(&self, shutdown: F, out: &mut W) -> Termination
    where
        F: Future<Output = Termination>,
        W: Write,
    {
        let mut ticker = time::interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        emit(out, "\nRunning");
        loop {
            tokio::select! {
                biased;
                signal = &mut shutdown => {
                    emit(out, "\n");
                    return signal;
                }
                _ = ticker.tick() => emit(out, "."),
            }
        }
    }

    /// Detaches the hook, if any, with the parameters recorded at attach and
    /// releases the artifact. Later calls are no-ops.
    pub fn shutdown(&mut self) -> Shutdown {
        let outcome = match mem::replace(&mut self.state, AttachmentState::Detached) {
            AttachmentState::Detached => Shutdown::AlreadyDetached,
            AttachmentState::Attached(attachment) => self.detach(attachment),
        };
        self.release();
        outcome
    }

    fn detach(&mut self, attachment: Attachment<L::Link>) -> Shutdown {
        let Attachment {
            hook,
            program,
            link,
        } = attachment;
        let if_index = hook.iface.index();

        let result = match self.artifact.as_mut() {
            Some(artifact) => self
                .loader
                .detach(artifact, &program, link, hook)
                .map_err(|e| Error::Detach {
                    if_index,
                    mode: hook.mode,
                    source: Box::new(e),
                }),
            None => Err(Error::Released),
        };

        match result {
            Ok(()) => {
                info!(
                    event.name = "lifecycle.program_detached",
                    network.interface.index = if_index,
                    xdp.mode = %hook.mode,
                    "eBPF program detached"
                );
                Shutdown::Detached
            }
            Err(e) => {
                warn!(
                    event.name = "lifecycle.detach_failed",
                    network.interface.index = if_index,
                    xdp.mode = %hook.mode,
                    error = %e,
                    "failed to detach eBPF program, the hook may still be installed"
                );
                Shutdown::DetachFailed(e)
            }
        }
    }

    fn release(&mut self) {
        if let Some(artifact) = self.artifact.take() {
            self.loader.release(artifact);
            info!(event.name = "lifecycle.artifact_released", "eBPF artifact unloaded");
        }
    }
}

impl<L: Loader> Drop for Lifecycle<L> {
    fn drop(&mut self) {
        if self.state.is_attached() {
            warn!(
                event.name = "lifecycle.dropped_attached",
                "lifecycle dropped while attached, detaching"
            );
        }
        self.shutdown();
    }
}

fn emit<W: Write>(out: &mut W, s: &str) {
    if let Err(e) = out.write_all(s.as_bytes()).and_then(|()| out.flush()) {
        debug!(error = %e, "failed to write liveness indicator");
    }
}
