#[cfg(target_os = "linux")]
use std::io;

/// Where a read or write takes place in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offset {
    /// Use, and advance, the file's current position.
    Current,
    /// Positioned I/O at the given byte offset. The file position is left
    /// untouched.
    At(u64),
}

impl Offset {
    /// Rejects positions the kernel would see as negative, the way
    /// `pread(2)` and `pwrite(2)` do. `-1` in particular would turn a
    /// positioned request into one at the current position.
    #[cfg(target_os = "linux")]
    pub(crate) fn check(self) -> io::Result<Self> {
        match self {
            Offset::At(offset) if offset > i64::MAX as u64 => {
                Err(io::Error::from_raw_os_error(libc::EINVAL))
            }
            offset => Ok(offset),
        }
    }

    /// Offset value understood by `IORING_OP_READ`/`IORING_OP_WRITE`.
    ///
    /// `-1` asks the kernel to use the current file position.
    #[cfg(target_os = "linux")]
    pub(crate) fn to_sqe(self) -> u64 {
        match self {
            Offset::Current => u64::MAX,
            Offset::At(offset) => {
                debug_assert!(offset <= i64::MAX as u64, "unchecked offset {offset}");
                offset
            }
        }
    }
}
