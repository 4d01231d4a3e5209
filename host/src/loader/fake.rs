use std::{cell::RefCell, io, path::Path, path::PathBuf, rc::Rc};

use super::{Hook, Loader, ProgramHandle};
use crate::{
    error::{Error, Result},
    iface::InterfaceHandle,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Open(PathBuf),
    Load,
    Locate(String),
    Attach(Hook),
    Detach(Hook),
    Release,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct FakeError(&'static str);

/// Loader that records every call and fails on request.
pub(crate) struct FakeLoader {
    calls: Rc<RefCell<Vec<Call>>>,
    interfaces: Vec<(&'static str, u32)>,
    entry_points: Vec<&'static str>,
    pub fail_open: bool,
    pub fail_load: bool,
    pub fail_attach: bool,
    pub fail_detach: bool,
}

impl FakeLoader {
    /// Knows `lo` as index 1 and an artifact exporting `dropXDP`.
    pub fn new() -> Self {
        Self {
            calls: Rc::default(),
            interfaces: vec![("lo", 1)],
            entry_points: vec!["dropXDP"],
            fail_open: false,
            fail_load: false,
            fail_attach: false,
            fail_detach: false,
        }
    }

    pub fn without_entry_points(mut self) -> Self {
        self.entry_points.clear();
        self
    }

    /// Shared view of the call log, still readable after the loader moves.
    pub fn calls(&self) -> Rc<RefCell<Vec<Call>>> {
        Rc::clone(&self.calls)
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

pub(crate) struct FakeArtifact;

pub(crate) struct FakeLink(Hook);

impl Loader for FakeLoader {
    type Blob = ();
    type Artifact = FakeArtifact;
    type Link = FakeLink;
    type Error = FakeError;

    fn resolve(&self, name: &str) -> Result<InterfaceHandle> {
        self.interfaces
            .iter()
            .find(|(known, _)| *known == name)
            .map(|&(_, index)| InterfaceHandle::from_index(index))
            .ok_or_else(|| Error::InterfaceNotFound {
                name: name.to_string(),
                source: io::Error::from_raw_os_error(libc::ENODEV),
            })
    }

    fn open(&mut self, path: &Path) -> Result<(), FakeError> {
        self.record(Call::Open(path.to_path_buf()));
        if self.fail_open {
            return Err(FakeError("no such file"));
        }
        Ok(())
    }

    fn load(&mut self, _blob: ()) -> Result<FakeArtifact, FakeError> {
        self.record(Call::Load);
        if self.fail_load {
            return Err(FakeError("malformed object"));
        }
        Ok(FakeArtifact)
    }

    fn locate(
        &mut self,
        _artifact: &mut FakeArtifact,
        entry_point: &str,
    ) -> Result<Option<ProgramHandle>, FakeError> {
        self.record(Call::Locate(entry_point.to_string()));
        Ok(self
            .entry_points
            .contains(&entry_point)
            .then(|| ProgramHandle::new(entry_point, 7)))
    }

    fn attach(
        &mut self,
        _artifact: &mut FakeArtifact,
        _program: &ProgramHandle,
        hook: Hook,
    ) -> Result<FakeLink, FakeError> {
        self.record(Call::Attach(hook));
        if self.fail_attach {
            return Err(FakeError("device or resource busy"));
        }
        Ok(FakeLink(hook))
    }

    fn detach(
        &mut self,
        _artifact: &mut FakeArtifact,
        _program: &ProgramHandle,
        link: FakeLink,
        hook: Hook,
    ) -> Result<(), FakeError> {
        self.record(Call::Detach(hook));
        if link.0 != hook {
            return Err(FakeError("hook mismatch"));
        }
        if self.fail_detach {
            return Err(FakeError("no such device"));
        }
        Ok(())
    }

    fn release(&mut self, _artifact: FakeArtifact) {
        self.record(Call::Release);
    }
}
