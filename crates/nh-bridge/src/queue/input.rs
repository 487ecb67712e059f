//! Bounded input queue from host threads to the engine thread.
//!
//! Any host thread may push; only the engine thread pops. Every push is
//! followed by `notify_all` and the engine waits in short timed slices so it
//! can re-check the exit flag between them.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Wake-up byte. Breaks the engine out of its wait and reads as a no-op
/// command, which makes it re-inspect its command queue.
pub const WAKE_BYTE: u8 = 0;

/// Slice length of every engine-side wait.
pub const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Command injected ahead of the engine's next key poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// Run the save orchestrator and continue playing.
    Save,
    /// Repeat the last travel destination.
    Retravel,
}

struct Inner {
    bytes: VecDeque<u8>,
    commands: VecDeque<EngineCommand>,
}

pub struct InputQueue {
    capacity: usize,
    inner: Mutex<Inner>,
    ready: Condvar,
}

impl InputQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                bytes: VecDeque::with_capacity(capacity),
                commands: VecDeque::new(),
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue one byte. A full queue drops the new byte.
    pub fn push(&self, byte: u8) -> bool {
        let accepted = {
            let mut inner = self.lock();
            if inner.bytes.len() >= self.capacity {
                false
            } else {
                inner.bytes.push_back(byte);
                true
            }
        };
        if accepted {
            self.ready.notify_all();
        } else {
            log::warn!("input queue full ({} bytes); dropped {:#04x}", self.capacity, byte);
        }
        accepted
    }

    /// Queue every byte of `s`; returns how many were accepted.
    pub fn push_str(&self, s: &str) -> usize {
        s.bytes().filter(|&b| self.push(b)).count()
    }

    /// Queue a canned command and kick the engine with a wake-up byte.
    pub fn push_command(&self, command: EngineCommand) {
        self.lock().commands.push_back(command);
        if !self.push(WAKE_BYTE) {
            self.ready.notify_all();
        }
    }

    pub fn take_command(&self) -> Option<EngineCommand> {
        self.lock().commands.pop_front()
    }

    /// Broadcast without queueing anything, so waiters re-check their flags.
    pub fn wake_all(&self) {
        self.ready.notify_all();
    }

    pub fn try_pop(&self) -> Option<u8> {
        self.lock().bytes.pop_front()
    }

    /// Wait up to `timeout` for a byte.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<u8> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if let Some(b) = inner.bytes.pop_front() {
                return Some(b);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            inner = self
                .ready
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Best-effort poll. The answer may be stale by the time it is used.
    pub fn has_pending(&self) -> bool {
        match self.inner.try_lock() {
            Ok(inner) => !inner.bytes.is_empty(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop queued bytes and commands.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.bytes.clear();
        inner.commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_full_queue_drops_newest() {
        let q = InputQueue::new(3);
        assert_eq!(q.push_str("abcd"), 3);
        assert_eq!(q.try_pop(), Some(b'a'));
        assert_eq!(q.try_pop(), Some(b'b'));
        assert_eq!(q.try_pop(), Some(b'c'));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn test_pop_timeout_expires() {
        let q = InputQueue::new(4);
        let start = Instant::now();
        assert_eq!(q.pop_timeout(WAIT_SLICE), None);
        assert!(start.elapsed() >= WAIT_SLICE);
    }

    #[test]
    fn test_cross_thread_wakeup() {
        let q = Arc::new(InputQueue::new(4));
        let waiter = {
            let q = q.clone();
            thread::spawn(move || {
                let start = Instant::now();
                loop {
                    if let Some(b) = q.pop_timeout(WAIT_SLICE) {
                        return b;
                    }
                    assert!(start.elapsed() < Duration::from_secs(5));
                }
            })
        };
        thread::sleep(Duration::from_millis(30));
        q.push(b'k');
        assert_eq!(waiter.join().unwrap(), b'k');
    }

    #[test]
    fn test_command_kicks_with_wake_byte() {
        let q = InputQueue::new(4);
        q.push_command(EngineCommand::Retravel);
        assert_eq!(q.try_pop(), Some(WAKE_BYTE));
        assert_eq!(q.take_command(), Some(EngineCommand::Retravel));
        assert_eq!(q.take_command(), None);
    }

    #[test]
    fn test_clear() {
        let q = InputQueue::new(4);
        q.push_str("ab");
        q.push_command(EngineCommand::Save);
        assert!(q.has_pending());
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.take_command(), None);
    }
}
