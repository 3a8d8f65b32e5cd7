//! Filesystem operations.

use std::io::{self, Write};
use std::path::Path;

use crate::{Backend, Offset};

mod file;
mod opts;

pub use file::File;
pub use opts::OpenOptions;

/// Read the entire contents of a file into a byte vector.
///
/// The file is sized with `stat` and read with a single full-buffer request.
/// A successful call returns every byte, end of file is not an error.
pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<Vec<u8>> {
    read_file_with(Backend::global(), path)
}

/// Like [`read_file`], using the given backend.
pub fn read_file_with<P: AsRef<Path>>(backend: &Backend, path: P) -> io::Result<Vec<u8>> {
    let path = path.as_ref();
    let size = std::fs::metadata(path)?.len();
    let size = usize::try_from(size).map_err(|_| {
        io::Error::new(io::ErrorKind::OutOfMemory, "file does not fit in memory")
    })?;
    let file = std::fs::File::open(path)?;

    let mut buf = vec![0; size];
    let mut filled = 0;
    // A single request covers the whole file unless the kernel caps the
    // transfer, in which case we keep reading where it stopped.
    while filled < buf.len() {
        match backend.read(&file, &mut buf[filled..], Offset::Current) {
            // The file shrank since it was sized.
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Write `data` to a file, creating it if it does not exist and truncating it
/// if it does.
///
/// New files are created with mode `0o666`, before the process umask.
pub fn write_file<P: AsRef<Path>>(path: P, data: &[u8]) -> io::Result<()> {
    write_file_with(Backend::global(), path, data)
}

/// Like [`write_file`], creating the file with the given permission bits.
#[cfg(unix)]
pub fn write_file_with_mode<P: AsRef<Path>>(path: P, data: &[u8], mode: u32) -> io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.mode(mode);
    write_with_options(opts, Backend::global(), path.as_ref(), data)
}

/// Like [`write_file`], using the given backend.
pub fn write_file_with<P: AsRef<Path>>(backend: &Backend, path: P, data: &[u8]) -> io::Result<()> {
    write_with_options(OpenOptions::new(), backend, path.as_ref(), data)
}

fn write_with_options(
    mut opts: OpenOptions,
    backend: &Backend,
    path: &Path,
    data: &[u8],
) -> io::Result<()> {
    let file = opts
        .write(true)
        .create(true)
        .truncate(true)
        .backend(backend.clone())
        .open(path)?;
    (&file).write_all(data)
}
