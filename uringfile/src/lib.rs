//! A drop-in blocking [`File`] whose reads and writes are serviced by a shared
//! [io_uring] instance.
//!
//! Every read and write is handed to a single worker thread which owns the
//! ring. Callers block until their own result comes back, so the API looks
//! like [`std::fs::File`] while the system calls are batched through the
//! ring. Results may complete in a different order than they were submitted.
//!
//! On platforms without io_uring, or when the kernel refuses to create a
//! ring, files fall back to plain blocking I/O with identical results.
//!
//! # Modules
//! - `fs`: the [`File`] facade and whole-file helpers.
//!
//! ```no_run
//! # fn main() -> std::io::Result<()> {
//! uringfile::write_file("/tmp/hello", b"hello world")?;
//! let file = uringfile::File::open("/tmp/hello")?;
//! let mut buf = [0; 5];
//! file.read_exact_at(&mut buf, 6)?;
//! assert_eq!(&buf, b"world");
//! # Ok(())
//! # }
//! ```
//!
//! [io_uring]: https://kernel.dk/io_uring.pdf
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]

mod backend;
#[cfg(target_os = "linux")]
mod completion;
mod config;
#[cfg(target_os = "linux")]
pub(crate) mod driver;
pub(crate) mod error;
mod offset;
#[cfg(target_os = "linux")]
mod request;

/// Filesystem operations.
pub mod fs;

pub use backend::Backend;
pub use config::Config;
#[cfg(target_os = "linux")]
pub use driver::Ring;
#[cfg(unix)]
pub use fs::write_file_with_mode;
pub use fs::{read_file, read_file_with, write_file, write_file_with, File, OpenOptions};
pub use offset::Offset;
