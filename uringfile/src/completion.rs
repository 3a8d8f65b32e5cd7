//! Pooled completion handles.
//!
//! Every read or write submitted to the ring needs somewhere for its result
//! to land. A [`Completion`] is a single-slot rendezvous: the ring worker
//! writes exactly one result into it and the blocked caller reads it back.
//!
//! Completions are never allocated on the I/O path. A fixed number of them
//! are created up front and kept in a [`CompletionPool`]. Checking one out
//! blocks while the pool is empty, which caps the number of requests in
//! flight against the ring.
use std::io;

use crossbeam_channel::{Receiver, Sender};

/// The result of a single read or write.
pub(crate) type IoResult = io::Result<usize>;

/// A reusable single-slot rendezvous for one I/O result.
#[derive(Debug)]
pub(crate) struct Completion {
    tx: Sender<IoResult>,
    rx: Receiver<IoResult>,
}

/// The write half of a [`Completion`], carried by a request to the ring
/// worker.
#[derive(Debug)]
pub(crate) struct Completer {
    tx: Sender<IoResult>,
}

impl Completion {
    fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self { tx, rx }
    }

    /// Returns the write half for this completion.
    pub(crate) fn completer(&self) -> Completer {
        Completer {
            tx: self.tx.clone(),
        }
    }

    /// Block until the result for the current request is delivered.
    pub(crate) fn wait(&self) -> IoResult {
        match self.rx.recv() {
            Ok(result) => result,
            // The completion owns a sender, so the channel never disconnects.
            Err(_) => unreachable!("completion channel disconnected"),
        }
    }

    /// Returns the delivered result without blocking, if there is one.
    #[cfg(test)]
    pub(crate) fn try_wait(&self) -> Option<IoResult> {
        self.rx.try_recv().ok()
    }

    fn is_idle(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Completer {
    /// Deliver the result of a request.
    pub(crate) fn complete(self, result: IoResult) {
        // The slot holds one value and each completer is used exactly once,
        // so this never blocks.
        let _ = self.tx.send(result);
    }

    /// Deliver a raw completion queue result.
    ///
    /// Negative values are errno values reported by the kernel.
    pub(crate) fn complete_raw(self, res: i32) {
        let result = if res >= 0 {
            Ok(res as usize)
        } else {
            Err(io::Error::from_raw_os_error(-res))
        };
        self.complete(result)
    }
}

/// A fixed-capacity pool of idle [`Completion`]s.
#[derive(Debug)]
pub(crate) struct CompletionPool {
    idle_tx: Sender<Completion>,
    idle_rx: Receiver<Completion>,
    capacity: usize,
}

impl CompletionPool {
    /// Create a pool holding `capacity` idle completions.
    pub(crate) fn new(capacity: usize) -> Self {
        let (idle_tx, idle_rx) = crossbeam_channel::bounded(capacity);
        for _ in 0..capacity {
            // Room for exactly `capacity` completions was just allocated.
            let _ = idle_tx.try_send(Completion::new());
        }
        Self {
            idle_tx,
            idle_rx,
            capacity,
        }
    }

    /// Check out an idle completion, blocking until one is released if the
    /// pool is exhausted.
    pub(crate) fn acquire(&self) -> PooledCompletion<'_> {
        let completion = match self.idle_rx.recv() {
            Ok(completion) => completion,
            Err(_) => unreachable!("completion pool disconnected"),
        };
        PooledCompletion {
            pool: self,
            completion: Some(completion),
        }
    }

    /// Return a completion to the idle set.
    fn release(&self, completion: Completion) {
        debug_assert!(
            completion.is_idle(),
            "completion released with a pending result"
        );
        // Only completions taken from this pool are released into it.
        let _ = self.idle_tx.try_send(completion);
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of idle completions.
    pub(crate) fn idle(&self) -> usize {
        self.idle_rx.len()
    }
}

/// A [`Completion`] checked out of a [`CompletionPool`].
///
/// The completion returns to the pool on drop.
#[derive(Debug)]
pub(crate) struct PooledCompletion<'a> {
    pool: &'a CompletionPool,
    completion: Option<Completion>,
}

impl std::ops::Deref for PooledCompletion<'_> {
    type Target = Completion;

    fn deref(&self) -> &Self::Target {
        match &self.completion {
            Some(completion) => completion,
            None => unreachable!("completion already released"),
        }
    }
}

impl Drop for PooledCompletion<'_> {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            self.pool.release(completion);
        }
    }
}
