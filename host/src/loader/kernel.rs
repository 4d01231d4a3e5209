use std::{
    fs, io,
    os::fd::{AsFd, AsRawFd},
    path::Path,
};

use aya::{
    programs::{xdp::XdpLinkId, ProgramError, Xdp, XdpFlags},
    Ebpf, EbpfError,
};
use aya_log::EbpfLogger;
use thiserror::Error;
use tracing::debug;

use super::{Hook, HookMode, Loader, ProgramHandle};

#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Ebpf(#[from] EbpfError),

    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error("program `{0}` is not present in the artifact")]
    MissingProgram(String),

    #[error("detach requested for {requested:?} but the link was attached to {attached:?}")]
    HookMismatch { attached: Hook, requested: Hook },
}

impl From<HookMode> for XdpFlags {
    fn from(mode: HookMode) -> Self {
        match mode {
            HookMode::Driver => XdpFlags::DRV_MODE,
            HookMode::Generic => XdpFlags::SKB_MODE,
        }
    }
}

pub struct KernelArtifact {
    ebpf: Ebpf,
}

impl KernelArtifact {
    fn xdp_mut(&mut self, name: &str) -> Result<&mut Xdp, KernelError> {
        let program = self
            .ebpf
            .program_mut(name)
            .ok_or_else(|| KernelError::MissingProgram(name.to_string()))?;
        Ok(program.try_into()?)
    }
}

#[derive(Debug)]
pub struct KernelLink {
    id: XdpLinkId,
    hook: Hook,
}

/// [`Loader`] backed by `aya`.
#[derive(Debug, Default)]
pub struct KernelLoader;

impl Loader for KernelLoader {
    type Blob = Vec<u8>;
    type Artifact = KernelArtifact;
    type Link = KernelLink;
    type Error = KernelError;

    fn open(&mut self, path: &Path) -> Result<Vec<u8>, KernelError> {
        Ok(fs::read(path)?)
    }

    fn load(&mut self, blob: Vec<u8>) -> Result<KernelArtifact, KernelError> {
        let mut ebpf = Ebpf::load(&blob)?;
        if let Err(e) = EbpfLogger::init(&mut ebpf) {
            // Artifacts without log statements carry no log maps.
            debug!(error = %e, "eBPF logger not initialized");
        }
        Ok(KernelArtifact { ebpf })
    }

    fn locate(
        &mut self,
        artifact: &mut KernelArtifact,
        entry_point: &str,
    ) -> Result<Option<ProgramHandle>, KernelError> {
        let Some(program) = artifact.ebpf.program_mut(entry_point) else {
            return Ok(None);
        };
        let program: &mut Xdp = program.try_into()?;
        program.load()?;
        let fd = program.fd()?.as_fd().as_raw_fd();
        Ok(Some(ProgramHandle::new(entry_point, fd)))
    }

    fn attach(
        &mut self,
        artifact: &mut KernelArtifact,
        program: &ProgramHandle,
        hook: Hook,
    ) -> Result<KernelLink, KernelError> {
        let id = artifact
            .xdp_mut(program.name())?
            .attach_to_if_index(hook.iface.index(), hook.mode.into())?;
        Ok(KernelLink { id, hook })
    }

    fn detach(
        &mut self,
        artifact: &mut KernelArtifact,
        program: &ProgramHandle,
        link: KernelLink,
        hook: Hook,
    ) -> Result<(), KernelError> {
        if link.hook != hook {
            return Err(KernelError::HookMismatch {
                attached: link.hook,
                requested: hook,
            });
        }
        artifact.xdp_mut(program.name())?.detach(link.id)?;
        Ok(())
    }

    fn release(&mut self, artifact: KernelArtifact) {
        let programs = artifact.ebpf.programs().count();
        drop(artifact);
        debug!(programs, "artifact released");
    }
}
