use std::ops;
use std::path::{Path, PathBuf};

use uringfile::{Backend, Config};

pub fn with_test_env<U>(
    f: impl FnOnce() -> Result<U, Box<dyn std::error::Error>>,
) -> Result<U, Box<dyn std::error::Error>> {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
    f()
}

/// Build a dedicated ring backend, or `None` if this kernel (or sandbox)
/// refuses to create an io_uring instance.
#[allow(dead_code)]
pub fn ring_or_skip(config: &Config) -> Option<Backend> {
    #[cfg(target_os = "linux")]
    {
        match uringfile::Ring::new(config) {
            Ok(ring) => return Some(Backend::Ring(ring)),
            Err(err) => eprintln!("io_uring unavailable, skipping: {err}"),
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = config;
        eprintln!("io_uring unavailable on this platform, skipping");
    }
    None
}

/// Every backend available on this machine, labelled for assertion messages.
#[allow(dead_code)]
pub fn backends() -> Vec<(&'static str, Backend)> {
    let mut backends = vec![("blocking", Backend::Blocking)];
    if let Some(ring) = ring_or_skip(&Config::default()) {
        backends.push(("ring", ring));
    }
    backends
}

/// [`ThreadNameTestDir`] creates a test directory under the temp dir
/// using the current thread name. This is nice for tests
/// because cargo test will name the thread with the name of
/// the test.
///
/// The directory is automatically cleaned up on drop.
#[derive(Debug, Clone)]
pub struct ThreadNameTestDir {
    path: PathBuf,
}

impl ThreadNameTestDir {
    pub fn new() -> Self {
        let thread = std::thread::current();
        let thread_name = thread.name().expect("no thread name");
        let sanitized = thread_name.replace("::", "-");
        let path = std::env::temp_dir()
            .join("uringfile-test-dir")
            .join(format!("{}-{}", sanitized, std::process::id()));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).expect("could not create directory");
        Self { path }
    }
}

impl Default for ThreadNameTestDir {
    fn default() -> Self {
        Self::new()
    }
}

impl ops::Deref for ThreadNameTestDir {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.path
    }
}

impl AsRef<Path> for ThreadNameTestDir {
    fn as_ref(&self) -> &Path {
        self.path.as_path()
    }
}

impl Drop for ThreadNameTestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Deterministic, non-repeating-looking test data.
#[allow(dead_code)]
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(31).wrapping_add(seed as u32) as u8 ^ (i >> 8) as u8)
        .collect()
}
