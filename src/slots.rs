use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Acquired,
    TimedOut,
    Closed,
}

struct SemState {
    count: usize,
    closed: bool,
}

/// Counting semaphore built on a mutex and condvar. `close` wakes every
/// waiter and makes all further acquires fail, which is how the player
/// unblocks its workers at shutdown.
pub struct Semaphore {
    state: Mutex<SemState>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(count: usize) -> Semaphore {
        Semaphore {
            state: Mutex::new(SemState { count, closed: false }),
            cond: Condvar::new(),
        }
    }

    /// Waits for a permit until the timeout expires. `Closed` is returned
    /// as soon as the semaphore is closed, even mid-wait.
    pub fn acquire_timeout(&self, timeout: Duration) -> Acquire {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        loop {
            if state.closed {
                return Acquire::Closed;
            }
            if state.count > 0 {
                state.count -= 1;
                return Acquire::Acquired;
            }
            let now = Instant::now();
            if now >= deadline {
                return Acquire::TimedOut;
            }
            let (next, _) = self.cond.wait_timeout(state, deadline - now).unwrap();
            state = next;
        }
    }

    pub fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.count += 1;
        self.cond.notify_one();
    }

    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.cond.notify_all();
    }
}

/// Semaphore pair coordinating the two-slot frame hand-off: the producer
/// claims an empty slot through `load` before uploading, the render worker
/// claims a finished frame through `ready`. Producer and consumer keep their
/// own running index; index modulo 2 names the slot to touch.
pub struct FrameSlots {
    pub load: Semaphore,
    pub ready: Semaphore,
}

impl FrameSlots {
    pub fn new() -> FrameSlots {
        FrameSlots {
            load: Semaphore::new(2),
            ready: Semaphore::new(0),
        }
    }

    pub fn close(&self) {
        self.load.close();
        self.ready.close();
    }
}
