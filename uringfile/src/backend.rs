use std::fs;
use std::io::{self, Read, Write};
use std::sync::OnceLock;

use log::debug;
#[cfg(target_os = "linux")]
use log::warn;

#[cfg(target_os = "linux")]
use crate::{Config, Ring};
use crate::Offset;

const LOG: &str = "uringfile::backend";

/// Services the reads and writes of a [`File`].
///
/// [`Backend::Blocking`] issues the equivalent synchronous system call on
/// the calling thread. Both backends produce the same results for the same
/// inputs.
///
/// [`File`]: crate::File
#[derive(Debug, Clone)]
pub enum Backend {
    /// Requests are multiplexed onto a shared io_uring instance.
    #[cfg(target_os = "linux")]
    Ring(Ring),
    /// Requests are plain blocking system calls.
    Blocking,
}

impl Backend {
    /// Returns the process-wide backend.
    ///
    /// The first call tries to start a ring with the default [`Config`]. If
    /// the platform has no io_uring, or the kernel refuses to set one up, every
    /// file falls back to blocking I/O.
    ///
    /// [`Config`]: crate::Config
    pub fn global() -> &'static Backend {
        static GLOBAL: OnceLock<Backend> = OnceLock::new();
        GLOBAL.get_or_init(Backend::detect)
    }

    #[cfg(target_os = "linux")]
    fn detect() -> Backend {
        match Ring::new(&Config::default()) {
            Ok(ring) => {
                debug!(target: LOG, "global.ring");
                Backend::Ring(ring)
            }
            Err(err) => {
                warn!(target: LOG, "global.ring.unavailable falling back to blocking I/O: {}", err);
                Backend::Blocking
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn detect() -> Backend {
        debug!(target: LOG, "global.blocking");
        Backend::Blocking
    }

    /// Returns true if this backend submits I/O to a ring.
    pub fn is_ring(&self) -> bool {
        match self {
            #[cfg(target_os = "linux")]
            Backend::Ring(_) => true,
            Backend::Blocking => false,
        }
    }

    /// Read from `file` into `buf`.
    ///
    /// With [`Offset::Current`] the read starts at, and advances, the file
    /// position. Returns `Ok(0)` at end of file.
    pub fn read(&self, file: &fs::File, buf: &mut [u8], offset: Offset) -> io::Result<usize> {
        match self {
            #[cfg(target_os = "linux")]
            Backend::Ring(ring) => {
                use std::os::fd::AsRawFd;
                ring.read(file.as_raw_fd(), buf, offset)
            }
            Backend::Blocking => match offset {
                Offset::Current => (&*file).read(buf),
                Offset::At(offset) => blocking::read_at(file, buf, offset),
            },
        }
    }

    /// Write `buf` to `file`.
    ///
    /// With [`Offset::Current`] the write starts at, and advances, the file
    /// position. Writing past the end of the file extends it, leaving a
    /// zero-filled hole.
    pub fn write(&self, file: &fs::File, buf: &[u8], offset: Offset) -> io::Result<usize> {
        match self {
            #[cfg(target_os = "linux")]
            Backend::Ring(ring) => {
                use std::os::fd::AsRawFd;
                ring.write(file.as_raw_fd(), buf, offset)
            }
            Backend::Blocking => match offset {
                Offset::Current => (&*file).write(buf),
                Offset::At(offset) => blocking::write_at(file, buf, offset),
            },
        }
    }
}

#[cfg(target_os = "linux")]
impl From<Ring> for Backend {
    fn from(ring: Ring) -> Self {
        Backend::Ring(ring)
    }
}

#[cfg(unix)]
mod blocking {
    use std::fs::File;
    use std::io;
    use std::os::unix::fs::FileExt;

    pub(super) fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        file.read_at(buf, offset)
    }

    pub(super) fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        file.write_at(buf, offset)
    }
}

// Windows only offers positioned I/O which also moves the file cursor.
#[cfg(windows)]
mod blocking {
    use std::fs::File;
    use std::io;
    use std::os::windows::fs::FileExt;

    pub(super) fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        file.seek_read(buf, offset)
    }

    pub(super) fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        file.seek_write(buf, offset)
    }
}
