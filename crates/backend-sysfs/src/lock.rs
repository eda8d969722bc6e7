use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

/// Advisory exclusive lock keyed by the resolved attribute path, held for
/// the duration of write+verify. A multi-channel write is not atomic at the
/// driver level, so two concurrent callers could otherwise leave the device
/// with an interleaving of both values.
///
/// Backed by `flock(2)` on a file under the system temp dir, which
/// serializes callers across processes as well as within one.
#[derive(Debug)]
pub struct PathLock {
    file: File,
}

impl PathLock {
    /// Blocks until the lock is free. Call from a blocking-capable context.
    pub fn acquire(target: &Path) -> io::Result<Self> {
        let digest = Sha256::digest(target.as_os_str().as_bytes());
        let name = format!(
            "{}-{}.lock",
            kbglow_common::APP_ID,
            &hex::encode(digest)[..16]
        );
        let lock_path = std::env::temp_dir().join(name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        loop {
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc == 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINTR) {
                return Err(err);
            }
        }
        debug!(target_path = %target.display(), lock = %lock_path.display(), "acquired path lock");
        Ok(Self { file })
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn lock_is_reacquirable_after_drop() {
        let target = PathBuf::from("/tmp/kbglow-lock-test-attr");
        let first = PathLock::acquire(&target).expect("first");
        drop(first);
        let _second = PathLock::acquire(&target).expect("second");
    }
}
