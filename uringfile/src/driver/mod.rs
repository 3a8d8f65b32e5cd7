use std::os::fd::RawFd;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::{fmt, io, process};

use io_uring::{opcode, squeue, types, IoUring};
use log::{debug, error, trace, warn};
use slab::Slab;
use smallvec::SmallVec;

use crate::completion::{Completer, CompletionPool};
use crate::config::Config;
use crate::error::RingError;
use crate::request::Request;
use crate::Offset;

mod queue;
mod unpark;

use queue::{Dequeued, RequestQueue, RequestReceiver};
use unpark::Unparker;

const LOG: &str = "uringfile::driver";

/// How many times a full submission queue is flushed before giving up.
const PUSH_ATTEMPTS: usize = 4;

/// [`Ring`] is a handle to an io_uring instance owned by a dedicated
/// worker thread.
///
/// Reads and writes are sent to the worker over a bounded queue and the
/// calling thread blocks until the worker delivers the result. The worker is
/// the only thread which ever touches the ring.
///
/// Handles are cheap to clone. The worker drains any in-flight I/O and the
/// ring is closed once the last handle is dropped.
#[derive(Clone)]
pub struct Ring {
    queue: RequestQueue,
    pool: Arc<CompletionPool>,
    worker: Arc<WorkerThread>,
}

impl fmt::Debug for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("pool_capacity", &self.pool.capacity())
            .finish()
    }
}

impl Ring {
    /// Build a new ring and start its worker thread.
    ///
    /// Fails if the kernel refuses to set up an io_uring instance, for example
    /// on kernels without io_uring or under a seccomp policy which blocks it.
    pub fn new(config: &Config) -> io::Result<Self> {
        config.validate()?;

        let mut builder = IoUring::builder();
        builder.dontfork();
        if let Some(idle) = config.sqpoll_idle {
            builder.setup_sqpoll(idle);
        }
        let ring = builder.build(config.entries).map_err(RingError::setup)?;
        let unparker = Arc::new(Unparker::new().map_err(RingError::setup)?);
        let (queue, requests) = queue::channel(config.queue_capacity, Arc::clone(&unparker));

        let worker = Worker {
            ring,
            requests,
            unparker,
            in_flight: Slab::with_capacity(config.pool_capacity),
            wake_buf: Box::new([0; 8]),
            wake_armed: false,
            sqpoll: config.sqpoll_idle.is_some(),
            closed: false,
        };
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker.run())
            .map_err(RingError::setup)?;

        debug!(
            target: LOG,
            "ring.start entries={} queue_capacity={} pool_capacity={} sqpoll={:?}",
            config.entries,
            config.queue_capacity,
            config.pool_capacity,
            config.sqpoll_idle
        );
        Ok(Self {
            queue,
            pool: Arc::new(CompletionPool::new(config.pool_capacity)),
            worker: Arc::new(WorkerThread {
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    /// Returns the maximum number of requests this ring keeps in flight.
    pub fn pool_capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Read into `buf` from `fd`, blocking until the ring completes the read.
    pub(crate) fn read(&self, fd: RawFd, buf: &mut [u8], offset: Offset) -> io::Result<usize> {
        let offset = offset.check()?;
        let completion = self.pool.acquire();
        // Safety: we block on `completion` until the worker delivers the
        // result, so `buf` outlives the request and is not touched meanwhile.
        let request = unsafe { Request::read(fd, buf, offset, completion.completer()) };
        self.queue.enqueue(request)?;
        completion.wait()
    }

    /// Write `buf` to `fd`, blocking until the ring completes the write.
    pub(crate) fn write(&self, fd: RawFd, buf: &[u8], offset: Offset) -> io::Result<usize> {
        let offset = offset.check()?;
        let completion = self.pool.acquire();
        // Safety: as for `read`.
        let request = unsafe { Request::write(fd, buf, offset, completion.completer()) };
        self.queue.enqueue(request)?;
        completion.wait()
    }
}

/// Joins the worker once the last [`Ring`] handle is gone.
///
/// Field order in [`Ring`] matters: the queue sender is dropped before this,
/// which is what lets the worker exit.
#[derive(Debug)]
struct WorkerThread {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        let handle = match self.handle.get_mut() {
            Ok(handle) => handle.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(target: LOG, "worker.join.panicked");
            }
        }
    }
}

/// The completion queue token used by the eventfd read.
const WAKE_TOKEN: u64 = u64::MAX;

/// State owned by the ring worker thread.
struct Worker {
    ring: IoUring,
    requests: RequestReceiver,
    unparker: Arc<Unparker>,
    /// Completions for submitted requests, keyed by `user_data`.
    in_flight: Slab<Completer>,
    /// Target of the armed eventfd read. Only one read is outstanding at a time.
    wake_buf: Box<[u8; 8]>,
    wake_armed: bool,
    sqpoll: bool,
    closed: bool,
}

impl Worker {
    fn run(mut self) {
        let _guard = AbortOnPanic;
        trace!(target: LOG, "worker.start");
        loop {
            if self.in_flight.is_empty() {
                if self.closed {
                    break;
                }
                // Nothing in flight, sleep on the queue.
                match self.requests.dequeue() {
                    Some(request) => self.push(request),
                    None => {
                        self.closed = true;
                        continue;
                    }
                }
            }
            self.drain_queue();
            self.park();
            self.reap();
        }
        self.shutdown();
        trace!(target: LOG, "worker.stop");
    }

    /// Move every queued request into the submission queue.
    fn drain_queue(&mut self) {
        if self.closed {
            return;
        }
        loop {
            match self.requests.try_dequeue() {
                Dequeued::Request(request) => self.push(request),
                Dequeued::Empty => return,
                Dequeued::Closed => {
                    trace!(target: LOG, "queue.closed");
                    self.closed = true;
                    return;
                }
            }
        }
    }

    fn push(&mut self, request: Request) {
        let sqe = request.configure();
        let (kind, offset) = (request.kind(), request.offset());
        // Claim the slot before pushing. Flushing a full submission queue may
        // reap and free other slots, but never this one: the kernel has not
        // seen it yet.
        let key = self.in_flight.insert(request.into_completer());
        trace!(target: LOG, "request.push {:?} {:?} slot={}", kind, offset, key);
        self.push_sqe(&sqe.user_data(key as u64));
    }

    /// Push an entry into the submission queue, flushing it to the kernel
    /// first if it is full.
    fn push_sqe(&mut self, sqe: &squeue::Entry) {
        for attempt in 0..PUSH_ATTEMPTS {
            // Safety: buffers referenced by queued entries stay valid until
            // their completion is reaped, see `Request`.
            if unsafe { self.ring.submission().push(sqe) }.is_ok() {
                return;
            }
            trace!(target: LOG, "push.sq_full attempt={}", attempt);
            if self.sqpoll && attempt > 0 {
                if let Err(err) = self.ring.submitter().squeue_wait() {
                    fatal("push.squeue_wait", err);
                }
            } else {
                self.submit(0);
            }
        }
        fatal(
            "push",
            io::Error::new(io::ErrorKind::Other, "submission queue stayed full"),
        );
    }

    /// Arm the eventfd read and wait for at least one completion, unless a
    /// caller asked for a wake-up in the meantime.
    fn park(&mut self) {
        if !self.closed {
            self.arm_wake();
        }
        let state = self.unparker.park();
        let want = if state.woken() { 0 } else { 1 };
        trace!(target: LOG, "park.want {} in_flight={}", want, self.in_flight.len());
        self.submit(want);
        self.unparker.reset();
    }

    fn arm_wake(&mut self) {
        if self.wake_armed {
            return;
        }
        let fd = types::Fd(self.unparker.raw_fd());
        let sqe = opcode::Read::new(fd, self.wake_buf.as_mut_ptr(), 8)
            .build()
            .user_data(WAKE_TOKEN);
        self.push_sqe(&sqe);
        self.wake_armed = true;
    }

    /// Submit pending entries and wait for `want` completions.
    ///
    /// A submission failure means the ring itself is broken, and the process
    /// aborts. Callers blocked on this ring could never be completed.
    fn submit(&mut self, mut want: usize) {
        loop {
            match self.ring.submit_and_wait(want) {
                Ok(submitted) => {
                    trace!(target: LOG, "submit.submitted {}", submitted);
                    return;
                }
                Err(err) if err.raw_os_error() == Some(libc::EINTR) => {
                    trace!(target: LOG, "submit.eintr");
                }
                Err(err) if err.raw_os_error() == Some(libc::EBUSY) => {
                    // The completion queue is backed up, make room first.
                    trace!(target: LOG, "submit.ebusy");
                    self.reap();
                    want = 0;
                }
                Err(err) => fatal("submit", err),
            }
        }
    }

    /// Deliver every available completion to its caller.
    fn reap(&mut self) {
        let cqes: SmallVec<[(u64, i32); 32]> = self
            .ring
            .completion()
            .map(|cqe| (cqe.user_data(), cqe.result()))
            .collect();
        for (user_data, result) in cqes {
            if user_data == WAKE_TOKEN {
                trace!(target: LOG, "reap.wake {}", result);
                if result < 0 {
                    warn!(
                        target: LOG,
                        "reap.wake.failed {}",
                        io::Error::from_raw_os_error(-result)
                    );
                }
                self.wake_armed = false;
                continue;
            }
            match self.in_flight.try_remove(user_data as usize) {
                Some(completer) => completer.complete_raw(result),
                None => warn!(target: LOG, "reap.unknown_user_data {}", user_data),
            }
        }
    }

    /// Wait for the armed eventfd read to finish so its buffer can be freed.
    fn shutdown(&mut self) {
        debug_assert!(self.in_flight.is_empty());
        while self.wake_armed {
            self.unparker.notify();
            self.submit(1);
            self.reap();
        }
    }
}

/// Aborts the process if the worker unwinds.
///
/// Callers blocked on the ring would otherwise wait forever, while the
/// kernel may still write into their buffers.
struct AbortOnPanic;

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(target: LOG, "worker.panicked");
            process::abort();
        }
    }
}

fn fatal(event: &str, err: io::Error) -> ! {
    error!(target: LOG, "{}.fatal {}", event, err);
    process::abort()
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom};
    use std::os::fd::AsRawFd;

    use super::*;

    fn test_ring(config: &Config) -> Option<Ring> {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Trace)
            .is_test(true)
            .try_init();
        match Ring::new(config) {
            Ok(ring) => Some(ring),
            Err(err) => {
                eprintln!("io_uring unavailable, skipping: {err}");
                None
            }
        }
    }

    fn temp_file(name: &str) -> std::fs::File {
        let path = std::env::temp_dir().join(format!(
            "uringfile-driver-{}-{}",
            name,
            process::id()
        ));
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        let _ = std::fs::remove_file(&path);
        file
    }

    #[test]
    fn positioned_round_trip() {
        let Some(ring) = test_ring(&Config::default()) else {
            return;
        };
        let file = temp_file("positioned");
        let fd = file.as_raw_fd();

        assert_eq!(ring.write(fd, b"hello world", Offset::At(4)).unwrap(), 11);
        let mut buf = [0u8; 15];
        assert_eq!(ring.read(fd, &mut buf, Offset::At(0)).unwrap(), 15);
        assert_eq!(&buf, b"\0\0\0\0hello world");
    }

    #[test]
    fn current_offset_uses_file_position() {
        let Some(ring) = test_ring(&Config::default()) else {
            return;
        };
        let mut file = temp_file("current");
        let fd = file.as_raw_fd();

        assert_eq!(ring.write(fd, b"abc", Offset::Current).unwrap(), 3);
        assert_eq!(ring.write(fd, b"def", Offset::Current).unwrap(), 3);
        assert_eq!(file.stream_position().unwrap(), 6);

        file.seek(SeekFrom::Start(2)).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(ring.read(fd, &mut buf, Offset::Current).unwrap(), 2);
        assert_eq!(&buf, b"cd");

        let mut rest = String::new();
        file.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "ef");
    }

    #[test]
    fn errors_come_back_through_the_completion() {
        let Some(ring) = test_ring(&Config::default()) else {
            return;
        };
        let mut buf = [0u8; 4];
        let err = ring.read(-1, &mut buf, Offset::At(0)).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn out_of_range_offsets_are_rejected_before_submission() {
        let Some(ring) = test_ring(&Config::default()) else {
            return;
        };
        let mut file = temp_file("out-of-range");
        let fd = file.as_raw_fd();
        ring.write(fd, b"0123456789", Offset::At(0)).unwrap();
        file.seek(SeekFrom::Start(4)).unwrap();

        let mut buf = [0u8; 3];
        let err = ring.read(fd, &mut buf, Offset::At(u64::MAX)).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
        let err = ring.write(fd, b"ZZ", Offset::At(u64::MAX)).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));

        assert_eq!(file.stream_position().unwrap(), 4);
        let mut contents = [0u8; 10];
        assert_eq!(ring.read(fd, &mut contents, Offset::At(0)).unwrap(), 10);
        assert_eq!(&contents, b"0123456789");
    }

    #[test]
    fn full_submission_queue_routes_results_to_callers() {
        // Two SQ entries for the wake-up read plus three requests forces the
        // worker to flush a full submission queue while reaping.
        let mut config = Config::new();
        config.entries(2).pool_capacity(3);
        let Some(ring) = test_ring(&config) else {
            return;
        };
        let file = temp_file("full-sq");
        let fd = file.as_raw_fd();

        thread::scope(|s| {
            for t in 0..3u8 {
                let ring = ring.clone();
                s.spawn(move || {
                    for round in 0..64u64 {
                        let offset = (round * 3 + t as u64) * 16;
                        let data = [t.wrapping_mul(31).wrapping_add(round as u8); 16];
                        assert_eq!(ring.write(fd, &data, Offset::At(offset)).unwrap(), 16);
                        let mut back = [0u8; 16];
                        assert_eq!(ring.read(fd, &mut back, Offset::At(offset)).unwrap(), 16);
                        assert_eq!(back, data, "thread {t} round {round}");
                    }
                });
            }
        });
    }

    #[test]
    fn dropping_last_handle_stops_worker() {
        let Some(ring) = test_ring(Config::new().thread_name("uringfile-drop-test")) else {
            return;
        };
        let file = temp_file("drop");
        let clone = ring.clone();
        clone.write(file.as_raw_fd(), b"x", Offset::At(0)).unwrap();
        drop(clone);
        // Joins the worker. A hang here means the worker never saw the queue close.
        drop(ring);
    }
}
