//! Ring configuration.
#![cfg_attr(not(target_os = "linux"), allow(dead_code))]

use crate::error::RingError;

/// Configuration used to build a [`Ring`].
///
/// Generally you'll call [`Config::new`], chain calls to adjust the
/// defaults and pass the result to [`Ring::new`].
///
/// [`Ring`]: crate::Ring
/// [`Ring::new`]: crate::Ring::new
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) entries: u32,
    pub(crate) queue_capacity: usize,
    pub(crate) pool_capacity: usize,
    pub(crate) sqpoll_idle: Option<u32>,
    pub(crate) thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entries: 128,
            queue_capacity: 100,
            pool_capacity: 100,
            sqpoll_idle: None,
            thread_name: String::from("uringfile-ring"),
        }
    }
}

impl Config {
    /// Creates a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of submission queue entries for the ring.
    ///
    /// The completion queue is sized at twice this value by the kernel.
    pub fn entries(&mut self, entries: u32) -> &mut Self {
        self.entries = entries;
        self
    }

    /// Sets the capacity of the request queue feeding the ring worker.
    ///
    /// Callers block when the queue is full.
    pub fn queue_capacity(&mut self, capacity: usize) -> &mut Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the number of pooled completion handles.
    ///
    /// This is the maximum number of reads and writes in flight against the
    /// ring at any time. Callers block while the pool is exhausted.
    pub fn pool_capacity(&mut self, capacity: usize) -> &mut Self {
        self.pool_capacity = capacity;
        self
    }

    /// Enables `IORING_SETUP_SQPOLL` with the given idle time in milliseconds.
    ///
    /// Kernels older than 5.11 require elevated privileges for this.
    pub fn sqpoll(&mut self, idle_ms: u32) -> &mut Self {
        self.sqpoll_idle = Some(idle_ms);
        self
    }

    /// Sets the name of the ring worker thread.
    pub fn thread_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.thread_name = name.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), RingError> {
        if self.entries == 0 {
            return Err(RingError::invalid_config("entries must be non-zero"));
        }
        if self.queue_capacity == 0 {
            return Err(RingError::invalid_config("queue_capacity must be non-zero"));
        }
        if self.pool_capacity == 0 {
            return Err(RingError::invalid_config("pool_capacity must be non-zero"));
        }
        // One completion slot stays reserved for the wake-up read.
        if self.pool_capacity >= 2 * self.entries as usize {
            return Err(RingError::invalid_config(
                "pool_capacity must be smaller than the completion queue",
            ));
        }
        Ok(())
    }
}
