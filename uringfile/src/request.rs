use std::os::fd::RawFd;

use io_uring::{opcode, squeue, types};

use crate::completion::Completer;
use crate::Offset;

/// The kind of request handled by the ring worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Read,
    Write,
}

/// A caller buffer lent to the ring for the duration of one request.
///
/// The caller blocks until the request completes, which keeps the memory
/// alive and unaliased while the kernel uses it.
#[derive(Debug)]
struct RawBuf {
    ptr: *mut u8,
    len: u32,
}

// Safety: the buffer is borrowed by a caller which is blocked until the
// worker delivers the result for this request.
unsafe impl Send for RawBuf {}

/// A read or write travelling from a caller to the ring worker.
#[derive(Debug)]
pub(crate) struct Request {
    kind: Kind,
    fd: RawFd,
    buf: RawBuf,
    offset: Offset,
    completer: Completer,
}

impl Request {
    /// Build a read into `buf`.
    ///
    /// ### Safety
    /// `buf` must stay valid, and must not be accessed, until `completer`
    /// has delivered its result.
    pub(crate) unsafe fn read(
        fd: RawFd,
        buf: &mut [u8],
        offset: Offset,
        completer: Completer,
    ) -> Self {
        Self {
            kind: Kind::Read,
            fd,
            buf: RawBuf {
                ptr: buf.as_mut_ptr(),
                len: clamp_len(buf.len()),
            },
            offset,
            completer,
        }
    }

    /// Build a write from `buf`.
    ///
    /// ### Safety
    /// `buf` must stay valid, and must not be mutated, until `completer`
    /// has delivered its result.
    pub(crate) unsafe fn write(
        fd: RawFd,
        buf: &[u8],
        offset: Offset,
        completer: Completer,
    ) -> Self {
        Self {
            kind: Kind::Write,
            fd,
            buf: RawBuf {
                ptr: buf.as_ptr() as *mut u8,
                len: clamp_len(buf.len()),
            },
            offset,
            completer,
        }
    }

    pub(crate) fn kind(&self) -> Kind {
        self.kind
    }

    pub(crate) fn offset(&self) -> Offset {
        self.offset
    }

    /// Build the submission queue entry for this request.
    pub(crate) fn configure(&self) -> squeue::Entry {
        let fd = types::Fd(self.fd);
        match self.kind {
            Kind::Read => opcode::Read::new(fd, self.buf.ptr, self.buf.len)
                .offset(self.offset.to_sqe())
                .build(),
            Kind::Write => opcode::Write::new(fd, self.buf.ptr as *const u8, self.buf.len)
                .offset(self.offset.to_sqe())
                .build(),
        }
    }

    /// Consume the request, keeping only the destination for its result.
    pub(crate) fn into_completer(self) -> Completer {
        self.completer
    }
}

/// A single ring operation transfers at most `u32::MAX` bytes. Larger
/// buffers see a short transfer, as they would from `read(2)`.
fn clamp_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
