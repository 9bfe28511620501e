//! Exclusive lock on the runtime home directory.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use nucleus_shared::{NucleusError, NucleusResult};

/// Held for the runtime's lifetime. The kernel releases the `flock` when the
/// file is closed.
#[derive(Debug)]
pub(crate) struct RuntimeLock {
    _file: File,
}

impl RuntimeLock {
    pub(crate) fn acquire(lock_path: &Path) -> NucleusResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)?;

        // SAFETY: the descriptor is valid for the lifetime of `file`.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            return Err(NucleusError::InvalidState(format!(
                "another runtime holds {}: {}",
                lock_path.display(),
                err
            )));
        }

        Ok(Self { _file: file })
    }
}
