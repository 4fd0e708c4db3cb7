//! Cooperative event delivery.
//!
//! Backends may complete work on any thread, but they never touch cursor
//! state directly. Instead they post events through an [`EventSender`]; the
//! consumer drains them on its own thread via [`EventLoop`]. Draining is
//! re-entrant, so a nested wait on an independent operation keeps making
//! progress. A wait that depends on itself never finishes.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

type Event = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Queue {
    events: Mutex<VecDeque<Event>>,
    ready: Condvar,
}

/// Consumer side of the event queue.
#[derive(Clone, Default)]
pub struct EventLoop {
    queue: Arc<Queue>,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Producer side of the event queue; cheap to clone and `Send`.
///
/// Events posted after every [`EventLoop`] handle is gone are dropped.
#[derive(Clone)]
pub struct EventSender {
    queue: Weak<Queue>,
}

impl EventSender {
    /// Schedule `event` to run on the consumer's thread.
    ///
    /// Returns `false` if the loop no longer exists.
    pub fn post(&self, event: impl FnOnce() + Send + 'static) -> bool {
        let Some(queue) = self.queue.upgrade() else {
            return false;
        };
        queue.events.lock().push_back(Box::new(event));
        queue.ready.notify_all();
        true
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            queue: Arc::downgrade(&self.queue),
        }
    }

    /// Number of events waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.events.lock().len()
    }

    /// Run every event queued at the time of the call without blocking.
    ///
    /// Returns the number of events run.
    pub fn process_events(&self) -> usize {
        let budget = self.pending();
        let mut ran = 0;
        while ran < budget && self.try_run_next() {
            ran += 1;
        }
        ran
    }

    fn try_run_next(&self) -> bool {
        let event = self.queue.events.lock().pop_front();
        match event {
            Some(event) => {
                event();
                true
            }
            None => false,
        }
    }

    /// Run one event, blocking until one arrives or `deadline` passes.
    fn run_next(&self, deadline: Option<Instant>) -> bool {
        let event = {
            let mut events = self.queue.events.lock();
            loop {
                if let Some(event) = events.pop_front() {
                    break event;
                }
                match deadline {
                    None => self.queue.ready.wait(&mut events),
                    Some(deadline) => {
                        if self.queue.ready.wait_until(&mut events, deadline).timed_out() {
                            match events.pop_front() {
                                Some(event) => break event,
                                None => return false,
                            }
                        }
                    }
                }
            }
        };
        event();
        true
    }

    /// Drain events until `done` returns true.
    ///
    /// Blocks while the queue is empty.
    pub fn run_until(&self, mut done: impl FnMut() -> bool) {
        while !done() {
            self.run_next(None);
        }
    }

    /// Drain events until `done` returns true or `timeout` elapses.
    ///
    /// Returns the final value of `done`.
    pub fn run_until_timeout(&self, mut done: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            if !self.run_next(Some(deadline)) {
                return done();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_events_run_in_post_order() {
        let event_loop = EventLoop::new();
        let sender = event_loop.sender();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            assert!(sender.post(move || log.lock().push(i)));
        }
        assert_eq!(event_loop.pending(), 3);
        assert_eq!(event_loop.process_events(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_post_after_loop_dropped() {
        let event_loop = EventLoop::new();
        let sender = event_loop.sender();
        drop(event_loop);
        assert!(!sender.post(|| {}));
    }

    #[test]
    fn test_run_until_receives_cross_thread_event() {
        let event_loop = EventLoop::new();
        let sender = event_loop.sender();
        let hits = Arc::new(AtomicUsize::new(0));
        let remote = Arc::clone(&hits);
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender.post(move || {
                remote.fetch_add(1, Ordering::SeqCst);
            });
        });
        event_loop.run_until(|| hits.load(Ordering::SeqCst) == 1);
        worker.join().unwrap();
    }

    #[test]
    fn test_nested_drain_from_inside_event() {
        let event_loop = EventLoop::new();
        let sender = event_loop.sender();
        let inner_done = Arc::new(AtomicUsize::new(0));

        let nested_loop = event_loop.clone();
        let nested_sender = sender.clone();
        let flag = Arc::clone(&inner_done);
        sender.post(move || {
            let flag_inner = Arc::clone(&flag);
            nested_sender.post(move || {
                flag_inner.store(1, Ordering::SeqCst);
            });
            nested_loop.run_until(|| flag.load(Ordering::SeqCst) == 1);
        });

        event_loop.process_events();
        assert_eq!(inner_done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_until_timeout_expires() {
        let event_loop = EventLoop::new();
        let done = event_loop.run_until_timeout(|| false, Duration::from_millis(10));
        assert!(!done);
    }
}
