//! Interface name resolution.

use std::{ffi::CString, fmt, io};

use crate::error::{Error, Result};

/// Kernel index of a network interface, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceHandle(u32);

impl InterfaceHandle {
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InterfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ifindex {}", self.0)
    }
}

/// Looks `name` up with `if_nametoindex(3)`.
pub fn resolve(name: &str) -> Result<InterfaceHandle> {
    let c_name = CString::new(name).map_err(|_| Error::InvalidInterfaceName {
        name: name.to_string(),
    })?;

    // SAFETY: `c_name` is a valid NUL-terminated string for the duration of the call.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(Error::InterfaceNotFound {
            name: name.to_string(),
            source: io::Error::last_os_error(),
        });
    }

    Ok(InterfaceHandle(index))
}
