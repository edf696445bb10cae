//! Blocking FIFO shared by producer threads and the sender thread.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

type ReleaseHook<T> = Box<dyn Fn(T) + Send + Sync>;

struct State<T> {
    items: VecDeque<T>,
    running: bool,
}

/// Unbounded multi-producer FIFO with an explicit running/stopped lifecycle.
///
/// Items that never reach a consumer (pushed while stopped, or left over at
/// teardown) are handed to the release hook, so every pushed item ends up
/// either popped or released. The hook runs without the queue lock held.
pub struct ThreadSafeQueue<T> {
    state: Mutex<State<T>>,
    available: Condvar,
    release: ReleaseHook<T>,
}

impl<T: 'static> ThreadSafeQueue<T> {
    /// Create a stopped queue that simply drops released items.
    pub fn new() -> Self {
        Self::with_release(drop)
    }

    /// Create a stopped queue with a release hook.
    pub fn with_release<F>(release: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                running: false,
            }),
            available: Condvar::new(),
            release: Box::new(release),
        }
    }
}

impl<T> ThreadSafeQueue<T> {
    /// Accept items.
    pub fn start(&self) {
        self.state.lock().running = true;
    }

    /// Append an item, or release it immediately if the queue is stopped.
    pub fn push(&self, item: T) {
        let rejected = {
            let mut state = self.state.lock();
            if state.running {
                state.items.push_back(item);
                None
            } else {
                Some(item)
            }
        };

        match rejected {
            None => {
                self.available.notify_one();
            }
            Some(item) => (self.release)(item),
        }
    }

    /// Take the front item, blocking while the queue is running and empty.
    ///
    /// Returns `None` once the queue is stopped and empty.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        while state.running && state.items.is_empty() {
            self.available.wait(&mut state);
        }
        state.items.pop_front()
    }

    /// Stop accepting items and wake every blocked `pop`.
    pub fn stop(&self) {
        self.state.lock().running = false;
        self.available.notify_all();
    }

    /// Release every queued item. Returns how many were released.
    pub fn drain(&self) -> usize {
        let items = std::mem::take(&mut self.state.lock().items);
        let count = items.len();
        for item in items {
            (self.release)(item);
        }
        count
    }

    /// Hand an item that was popped but not consumed to the release hook.
    pub fn release(&self, item: T) {
        (self.release)(item);
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }
}

impl<T: 'static> Default for ThreadSafeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ThreadSafeQueue<T> {
    fn drop(&mut self) {
        self.drain();
    }
}
