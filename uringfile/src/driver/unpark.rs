//! Unparker allows callers to wake the ring worker while it waits on the ring.
//!
//! When no I/O is in flight the worker sleeps on the request queue, and an
//! enqueue wakes it directly. Once requests are in flight the worker sleeps
//! inside `io_uring_enter` instead, waiting for completions. To notice new
//! requests in that state it keeps a read armed against an eventfd; callers
//! write to the eventfd after enqueueing.
//!
//! The flag below keeps those writes rare: a caller only writes when the
//! worker has announced that it is about to sleep on the ring and nobody has
//! written since.
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::sync::atomic::{AtomicU8, Ordering};

/// Bitfield used for coordinating parking/unparking.
///
/// - `1 << 0`: The worker is entering or has entered a wait on the ring and
///             will notice an eventfd write. Only set by the worker.
/// - `1 << 1`: A caller has requested a wake-up. The caller which sets this
///             bit while the worker is parked writes to the eventfd.
#[derive(Copy, Clone)]
pub(crate) struct UnparkerState(u8);

impl UnparkerState {
    /// Returns true if a caller has requested a wake-up.
    pub(crate) fn woken(self) -> bool {
        self.0 & Unparker::REMOTE_THREAD_BIT == Unparker::REMOTE_THREAD_BIT
    }

    /// Returns true if the worker is parked on the ring.
    pub(crate) fn is_parked(self) -> bool {
        self.0 & Unparker::WORKER_PARK_BIT == Unparker::WORKER_PARK_BIT
    }
}

impl fmt::Debug for UnparkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnparkerState")
            .field("woken", &self.woken())
            .field("is_parked", &self.is_parked())
            .field("bits", &format!("0b{:08b}", self.0))
            .finish()
    }
}

/// Eventfd based wake-up for the ring worker.
#[derive(Debug)]
pub(crate) struct Unparker {
    flag: AtomicU8,
    fd: File,
}

impl Unparker {
    /// Set when the worker is about to wait on the ring, cleared by [`Unparker::reset`].
    const WORKER_PARK_BIT: u8 = 1 << 0;
    /// Set when a caller requests that the worker wake up.
    const REMOTE_THREAD_BIT: u8 = 1 << 1;

    pub(crate) fn new() -> io::Result<Unparker> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC) };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(Unparker {
            flag: AtomicU8::new(0x00),
            // Safety: `fd` is a freshly created eventfd owned by nobody else.
            fd: unsafe { File::from_raw_fd(fd) },
        })
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> UnparkerState {
        UnparkerState(self.flag.load(Ordering::Acquire))
    }

    /// Mark the worker as parked on the ring.
    ///
    /// The returned state tells the worker whether a wake-up was requested
    /// before it parked, in which case it must not block.
    pub(crate) fn park(&self) -> UnparkerState {
        let state = self.flag.fetch_or(Self::WORKER_PARK_BIT, Ordering::AcqRel);
        UnparkerState(state)
    }

    /// Clear both the parked and woken bits once the worker is running again.
    pub(crate) fn reset(&self) {
        self.flag.fetch_and(
            !Self::WORKER_PARK_BIT & !Self::REMOTE_THREAD_BIT,
            Ordering::Release,
        );
    }

    /// Wake the worker from a caller thread.
    pub(crate) fn wake(&self) {
        let state = self.flag.fetch_or(Self::REMOTE_THREAD_BIT, Ordering::AcqRel);
        let state = UnparkerState(state);
        // Only the caller which set the remote bit while the worker was
        // parked writes to the eventfd.
        if !state.woken() && state.is_parked() {
            self.notify();
        }
    }

    /// Unconditionally write to the eventfd, completing any armed read.
    pub(crate) fn notify(&self) {
        let _ = (&self.fd).write(&0x1u64.to_ne_bytes());
    }

    pub(crate) fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
