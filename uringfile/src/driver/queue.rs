//! The bounded request queue between callers and the ring worker.
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::driver::unpark::Unparker;
use crate::error::RingError;
use crate::request::Request;

/// Create a request queue holding at most `capacity` requests.
pub(crate) fn channel(capacity: usize, unparker: Arc<Unparker>) -> (RequestQueue, RequestReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (RequestQueue { tx, unparker }, RequestReceiver { rx })
}

/// Producer side of the request queue. Cloned into every [`Ring`] handle.
///
/// [`Ring`]: crate::Ring
#[derive(Debug, Clone)]
pub(crate) struct RequestQueue {
    tx: Sender<Request>,
    unparker: Arc<Unparker>,
}

impl RequestQueue {
    /// Enqueue a request for the ring worker.
    ///
    /// Blocks while the queue is full. Fails only if the worker has exited.
    pub(crate) fn enqueue(&self, request: Request) -> Result<(), RingError> {
        self.tx.send(request).map_err(|_| RingError::shutdown())?;
        self.unparker.wake();
        Ok(())
    }
}

/// What the worker found when it looked at the queue.
#[derive(Debug)]
pub(crate) enum Dequeued {
    Request(Request),
    Empty,
    Closed,
}

/// Consumer side of the request queue, owned by the ring worker.
#[derive(Debug)]
pub(crate) struct RequestReceiver {
    rx: Receiver<Request>,
}

impl RequestReceiver {
    /// Block until a request arrives or every producer is gone.
    pub(crate) fn dequeue(&self) -> Option<Request> {
        self.rx.recv().ok()
    }

    /// Take the next request without blocking.
    pub(crate) fn try_dequeue(&self) -> Dequeued {
        match self.rx.try_recv() {
            Ok(request) => Dequeued::Request(request),
            Err(TryRecvError::Empty) => Dequeued::Empty,
            Err(TryRecvError::Disconnected) => Dequeued::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::completion::CompletionPool;
    use crate::request::Kind;
    use crate::Offset;

    fn write_request(pool: &CompletionPool, offset: u64) -> Request {
        let completion = pool.acquire();
        let completer = completion.completer();
        // These requests are never completed, so the completion can go
        // straight back to the pool.
        unsafe { Request::write(-1, b"x", Offset::At(offset), completer) }
    }

    #[test]
    fn requests_are_dequeued_in_order() {
        let unparker = Arc::new(Unparker::new().unwrap());
        let (queue, rx) = channel(4, unparker);
        let pool = CompletionPool::new(4);

        for offset in 0..3 {
            queue.enqueue(write_request(&pool, offset)).unwrap();
        }

        let mut seen = Vec::new();
        while let Dequeued::Request(req) = rx.try_dequeue() {
            seen.push(req);
        }
        assert!(seen.iter().all(|req| req.kind() == Kind::Write));
        let offsets: Vec<_> = seen.iter().map(Request::offset).collect();
        assert_eq!(offsets, [Offset::At(0), Offset::At(1), Offset::At(2)]);
    }

    #[test]
    fn closed_queue_is_reported() {
        let unparker = Arc::new(Unparker::new().unwrap());
        let (queue, rx) = channel(1, unparker);
        assert!(matches!(rx.try_dequeue(), Dequeued::Empty));
        drop(queue);
        assert!(matches!(rx.try_dequeue(), Dequeued::Closed));
        assert!(rx.dequeue().is_none());
    }

    #[test]
    fn full_queue_blocks_enqueue_until_dequeue() {
        let unparker = Arc::new(Unparker::new().unwrap());
        let (queue, rx) = channel(1, unparker);
        let pool = Arc::new(CompletionPool::new(2));
        queue.enqueue(write_request(&pool, 0)).unwrap();

        let (tx, done) = crossbeam_channel::bounded(1);
        let producer = {
            let queue = queue.clone();
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let res = queue.enqueue(write_request(&pool, 1));
                tx.send(res.is_ok()).unwrap();
            })
        };

        assert!(done.recv_timeout(Duration::from_millis(100)).is_err());
        match rx.try_dequeue() {
            Dequeued::Request(req) => assert_eq!(req.offset(), Offset::At(0)),
            other => panic!("expected a request, got {other:?}"),
        }
        assert!(done.recv_timeout(Duration::from_secs(5)).unwrap());
        producer.join().unwrap();
        match rx.try_dequeue() {
            Dequeued::Request(req) => assert_eq!(req.offset(), Offset::At(1)),
            other => panic!("expected a request, got {other:?}"),
        }
    }

    #[test]
    fn enqueue_after_worker_exit_fails() {
        let unparker = Arc::new(Unparker::new().unwrap());
        let (queue, rx) = channel(1, unparker);
        drop(rx);
        let pool = CompletionPool::new(1);
        let err: io::Error = queue.enqueue(write_request(&pool, 0)).unwrap_err().into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
