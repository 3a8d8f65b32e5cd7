use std::fs::{self, Metadata, Permissions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::RingError;
use crate::fs::opts::OpenOptions;
use crate::{Backend, Offset};

/// A reference to an open file on the filesystem.
///
/// Reads and writes are serviced by the file's [`Backend`]; everything else
/// is delegated to [`std::fs::File`]. Methods take `&self`, so a file can be
/// shared between threads and used concurrently with positioned I/O.
pub struct File {
    inner: fs::File,
    path: PathBuf,
    backend: Backend,
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("ring", &self.backend.is_ring())
            .finish()
    }
}

impl File {
    /// Open a file in read-only mode at the provided path.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        OpenOptions::new().read(true).open(path)
    }

    /// Open a file in write-only mode, creating it if needed and truncating
    /// it if it exists.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }

    /// Returns a new [`OpenOptions`] object which can be used to open a file.
    pub fn options() -> OpenOptions {
        OpenOptions::new()
    }

    /// Wrap an already open [`std::fs::File`].
    pub fn from_std(file: fs::File, path: impl Into<PathBuf>, backend: Backend) -> Self {
        Self {
            inner: file,
            path: path.into(),
            backend,
        }
    }

    /// Returns the path this file was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the backend servicing reads and writes on this file.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Returns the underlying [`std::fs::File`].
    pub fn as_std(&self) -> &fs::File {
        &self.inner
    }

    /// Consume this file, returning the underlying [`std::fs::File`].
    pub fn into_std(self) -> fs::File {
        self.inner
    }

    /// Read bytes from the current file position into `buf`.
    ///
    /// Returns the number of bytes read. `Ok(0)` means end of file.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.backend.read(&self.inner, buf, Offset::Current)
    }

    /// Read bytes into `buf` starting at `offset`.
    ///
    /// The file position is not changed. A short count means the read hit end
    /// of file; use [`File::read_exact_at`] to treat that as an error.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.backend.read(&self.inner, buf, Offset::At(offset))
    }

    /// Fill `buf` from `offset`, failing with [`io::ErrorKind::UnexpectedEof`]
    /// if the file ends first.
    pub fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, offset) {
                Ok(0) => break,
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        if buf.is_empty() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "failed to fill whole buffer",
            ))
        }
    }

    /// Write `buf` at the current file position.
    ///
    /// Returns the number of bytes written, which may be less than `buf.len()`.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.backend.write(&self.inner, buf, Offset::Current)
    }

    /// Write `buf` starting at `offset`.
    ///
    /// The file position is not changed. Writing past the end of the file
    /// extends it.
    pub fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        self.backend.write(&self.inner, buf, Offset::At(offset))
    }

    /// Write all of `buf` starting at `offset`.
    pub fn write_all_at(&self, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write_at(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ))
                }
                Ok(n) => {
                    buf = &buf[n..];
                    offset += n as u64;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Write the contents of `s` at the current file position.
    pub fn write_str(&self, s: &str) -> io::Result<usize> {
        self.write(s.as_bytes())
    }

    /// Copy everything from `reader` to the current file position.
    ///
    /// This is a plain blocking copy and does not use the ring.
    pub fn read_from<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<u64> {
        io::copy(reader, &mut &self.inner)
    }

    /// Queries metadata about the underlying file.
    pub fn metadata(&self) -> io::Result<Metadata> {
        self.inner.metadata()
    }

    /// Changes the permissions on the underlying file.
    pub fn set_permissions(&self, perm: Permissions) -> io::Result<()> {
        self.inner.set_permissions(perm)
    }

    /// Changes the owner and group of the underlying file. `None` leaves
    /// the corresponding id unchanged.
    #[cfg(unix)]
    pub fn chown(&self, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        std::os::unix::fs::fchown(&self.inner, uid, gid)
    }

    /// Sync the file and metadata to disk.
    pub fn sync_all(&self) -> io::Result<()> {
        self.inner.sync_all()
    }

    /// Sync only the data in the file to disk.
    pub fn sync_data(&self) -> io::Result<()> {
        self.inner.sync_data()
    }

    /// Truncate or extend the underlying file, updating the file length.
    pub fn set_len(&self, len: u64) -> io::Result<()> {
        self.inner.set_len(len)
    }

    /// Deadlines are not supported, this always fails with
    /// [`io::ErrorKind::Unsupported`].
    pub fn set_deadline(&self, _deadline: Instant) -> io::Result<()> {
        Err(RingError::unsupported("deadlines").into())
    }

    /// Deadlines are not supported, this always fails with
    /// [`io::ErrorKind::Unsupported`].
    pub fn set_read_deadline(&self, _deadline: Instant) -> io::Result<()> {
        Err(RingError::unsupported("read deadlines").into())
    }

    /// Deadlines are not supported, this always fails with
    /// [`io::ErrorKind::Unsupported`].
    pub fn set_write_deadline(&self, _deadline: Instant) -> io::Result<()> {
        Err(RingError::unsupported("write deadlines").into())
    }

    /// Close the file, reporting any error from `close(2)`.
    ///
    /// Dropping the file also closes it, but ignores errors.
    pub fn close(self) -> io::Result<()> {
        close(self.inner)
    }
}

#[cfg(unix)]
fn close(file: fs::File) -> io::Result<()> {
    use std::os::fd::IntoRawFd;
    let fd = file.into_raw_fd();
    // Safety: `fd` was just released by the std file and is closed once.
    if unsafe { libc::close(fd) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn close(file: fs::File) -> io::Result<()> {
    drop(file);
    Ok(())
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.backend.read(&self.inner, buf, Offset::Current)
    }
}

impl Read for &File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.backend.read(&self.inner, buf, Offset::Current)
    }
}

impl Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.backend.write(&self.inner, buf, Offset::Current)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Write for &File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.backend.write(&self.inner, buf, Offset::Current)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        (&self.inner).seek(pos)
    }
}

impl Seek for &File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        (&self.inner).seek(pos)
    }
}

#[cfg(unix)]
impl std::os::fd::AsRawFd for File {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.inner.as_raw_fd()
    }
}

#[cfg(unix)]
impl std::os::fd::AsFd for File {
    fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.inner.as_fd()
    }
}
