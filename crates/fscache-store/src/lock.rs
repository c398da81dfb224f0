//! Scoped advisory locking of individual cache files
//!
//! Readers take a shared lock, writers an exclusive one. The lock lives as
//! long as the [`LockedFile`] and is released on drop, including when a
//! caller unwinds out of a transform.
//!
//! Writers open-or-create the file *without* truncating and only truncate
//! once the exclusive lock is held, so a concurrent reader never observes a
//! file emptied by a writer that has not yet been granted the lock.
//!
//! On Unix this is `flock(2)` on the cache file itself, which coordinates
//! independent processes. Elsewhere a sidecar `<file>.lock` created with
//! `create_new` stands in, and shared locks behave as exclusive ones.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::LockWait;
use crate::error::{CacheResult, LockError, LockResult};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const CONTENTION_WARNING: Duration = Duration::from_millis(500);

/// Lock mode for a cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many readers at once
    Shared,
    /// One writer, no readers
    Exclusive,
}

/// An open cache file holding an advisory lock.
#[derive(Debug)]
pub struct LockedFile {
    path: PathBuf,
    mode: LockMode,
    file: File,
    #[cfg(not(unix))]
    sidecar: PathBuf,
}

impl LockedFile {
    /// Open or create `path` for writing and take an exclusive lock.
    ///
    /// The file is not truncated; call [`replace_contents`](Self::replace_contents)
    /// once the lock is held.
    pub fn open_for_write(path: &Path, wait: LockWait) -> CacheResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self::lock(path, file, LockMode::Exclusive, wait)?)
    }

    /// Open an existing file and lock it in `mode`.
    ///
    /// Returns `Ok(None)` if the file does not exist; nothing is created.
    pub fn open_existing(path: &Path, mode: LockMode, wait: LockWait) -> CacheResult<Option<Self>> {
        let mut options = OpenOptions::new();
        options.read(true);
        if mode == LockMode::Exclusive {
            options.write(true);
        }

        let file = match options.open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Self::lock(path, file, mode, wait)?))
    }

    fn lock(path: &Path, file: File, mode: LockMode, wait: LockWait) -> LockResult<Self> {
        let start = Instant::now();
        let mut warned = false;

        #[cfg(not(unix))]
        let sidecar = sidecar_path(path);

        loop {
            #[cfg(unix)]
            let attempt = try_lock(&file, mode);
            #[cfg(not(unix))]
            let attempt = try_lock(&sidecar);

            match attempt {
                Ok(()) => {
                    if warned {
                        warn!(
                            path = %path.display(),
                            waited_ms = start.elapsed().as_millis() as u64,
                            "lock acquired after contention"
                        );
                    }
                    return Ok(Self {
                        path: path.to_path_buf(),
                        mode,
                        file,
                        #[cfg(not(unix))]
                        sidecar,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(LockError::Io(e)),
            }

            if let LockWait::Timeout(timeout) = wait {
                if start.elapsed() >= timeout {
                    return Err(LockError::Timeout(timeout));
                }
            }

            // With no timeout, hand the wait over to the kernel.
            #[cfg(unix)]
            if wait == LockWait::Block {
                debug!(path = %path.display(), ?mode, "waiting for lock");
                block_lock(&file, mode)?;
                warned = start.elapsed() > CONTENTION_WARNING;
                continue;
            }

            if !warned && start.elapsed() > CONTENTION_WARNING {
                warn!(path = %path.display(), ?mode, "lock contention, waiting");
                warned = true;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Path of the locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the lock was taken in.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Read the whole file from the start.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        self.file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Truncate and write `bytes`, then flush.
    ///
    /// If this fails part way the file contents are undefined; the next
    /// reader will fail to decode them and purge the entry.
    pub fn replace_contents(&mut self, bytes: &[u8], sync: bool) -> io::Result<()> {
        if self.mode != LockMode::Exclusive {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "write requires an exclusive lock",
            ));
        }
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(bytes)?;
        self.file.flush()?;
        if sync {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well; unlock explicitly
        // so release does not depend on other duplicated descriptors.
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = self.file.as_raw_fd();
            unsafe {
                libc::flock(fd, libc::LOCK_UN);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = std::fs::remove_file(&self.sidecar);
        }
    }
}

#[cfg(unix)]
fn flock_op(mode: LockMode) -> libc::c_int {
    match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    }
}

/// Try a non-blocking lock.
#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let result = unsafe { libc::flock(fd, flock_op(mode) | libc::LOCK_NB) };

    if result == 0 {
        Ok(())
    } else {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
        } else {
            Err(err)
        }
    }
}

/// Block until the lock is granted, retrying on signal interruption.
#[cfg(unix)]
fn block_lock(file: &File, mode: LockMode) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    loop {
        let result = unsafe { libc::flock(fd, flock_op(mode)) };
        if result == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Try to create the sidecar lock file exclusively.
#[cfg(not(unix))]
fn try_lock(sidecar: &Path) -> io::Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(sidecar) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
        }
        Err(e) => Err(e),
    }
}
