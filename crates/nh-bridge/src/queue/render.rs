//! Single-producer / single-consumer render ring.
//!
//! The engine thread owns the [`RenderProducer`], the UI thread the
//! [`RenderConsumer`]. Indices grow without bound and are masked on access;
//! `head - tail` is the fill level. The producer writes the slot and then
//! publishes it with a release store of `head`; the consumer acquires
//! `head`, moves the element out, and releases `tail` so the producer may
//! reuse the slot.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::winprocs::GlyphFlags;

/// Log a warning every this many dropped elements.
pub const DROP_WARN_INTERVAL: u64 = 100;

/// Width of the alignment text carried by a status element.
pub const STATUS_ALIGN_LEN: usize = 16;

/// One painted map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapTile {
    pub x: i32,
    pub y: i32,
    pub glyph: i32,
    pub ch: char,
    pub color: u8,
    pub flags: GlyphFlags,
}

/// Bottom-line status values.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusLine {
    pub hp: i32,
    pub hp_max: i32,
    pub pw: i32,
    pub pw_max: i32,
    pub level: i32,
    pub ac: i32,
    pub gold: i64,
    pub dungeon_level: i32,
    pub turns: i64,
    /// NUL-padded alignment name.
    pub alignment: [u8; STATUS_ALIGN_LEN],
}

impl StatusLine {
    pub fn set_alignment(&mut self, name: &str) {
        self.alignment = [0; STATUS_ALIGN_LEN];
        let bytes = name.as_bytes();
        let n = bytes.len().min(STATUS_ALIGN_LEN - 1);
        self.alignment[..n].copy_from_slice(&bytes[..n]);
    }

    pub fn alignment_str(&self) -> &str {
        let end = self.alignment.iter().position(|&b| b == 0).unwrap_or(STATUS_ALIGN_LEN);
        std::str::from_utf8(&self.alignment[..end]).unwrap_or("")
    }
}

/// Element carried from the engine thread to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderElement {
    MapTile(MapTile),
    Message { category: String, text: String, attr: i32 },
    Status(StatusLine),
    Clear,
    FlushMap,
    TurnComplete { moves: i64 },
}

struct Ring {
    slots: Box<[UnsafeCell<MaybeUninit<RenderElement>>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
    dropped: AtomicU64,
}

// Slot access is partitioned by the head/tail protocol: the producer only
// touches slots in [head, tail + capacity), the consumer only [tail, head).
unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}

impl Ring {
    fn capacity(&self) -> usize {
        self.mask + 1
    }

    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }
}

impl Drop for Ring {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let mut tail = *self.tail.get_mut();
        let mut drained = 0usize;
        while tail != head {
            // Every slot in [tail, head) holds an initialized element.
            unsafe { self.slots[tail & self.mask].get_mut().assume_init_drop() };
            tail = tail.wrapping_add(1);
            drained += 1;
        }
        if drained > 0 {
            log::debug!("render ring dropped with {} undelivered elements", drained);
        }
    }
}

/// Create a ring with at least `capacity` slots (rounded up to a power of
/// two, minimum 2).
pub fn render_channel(capacity: usize) -> (RenderProducer, RenderConsumer) {
    let capacity = capacity.max(2).next_power_of_two();
    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let ring = Arc::new(Ring {
        slots,
        mask: capacity - 1,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
        dropped: AtomicU64::new(0),
    });
    (RenderProducer { ring: ring.clone() }, RenderConsumer { ring })
}

/// Engine-side half.
pub struct RenderProducer {
    ring: Arc<Ring>,
}

impl RenderProducer {
    /// Enqueue `element`. On a full ring the element is dropped and counted.
    pub fn push(&mut self, element: RenderElement) -> bool {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        let tail = ring.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= ring.capacity() {
            let dropped = ring.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped % DROP_WARN_INTERVAL == 0 {
                log::warn!(
                    "render queue full ({} slots): {} updates dropped so far",
                    ring.capacity(),
                    dropped
                );
            }
            return false;
        }
        unsafe { (*ring.slots[head & ring.mask].get()).write(element) };
        ring.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn dropped(&self) -> u64 {
        self.ring.dropped.load(Ordering::Relaxed)
    }
}

/// UI-side half.
pub struct RenderConsumer {
    ring: Arc<Ring>,
}

impl RenderConsumer {
    pub fn pop(&mut self) -> Option<RenderElement> {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let element = unsafe { (*ring.slots[tail & ring.mask].get()).assume_init_read() };
        ring.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(element)
    }

    /// Pop everything currently queued.
    pub fn drain(&mut self) -> Vec<RenderElement> {
        std::iter::from_fn(|| self.pop()).collect()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn dropped(&self) -> u64 {
        self.ring.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::thread;

    fn msg(n: usize) -> RenderElement {
        RenderElement::Message {
            category: "info".into(),
            text: format!("message {n}"),
            attr: 0,
        }
    }

    #[test]
    fn test_capacity_rounds_up() {
        let (p, c) = render_channel(100);
        assert_eq!(p.capacity(), 128);
        assert_eq!(c.capacity(), 128);
        assert_eq!(render_channel(0).0.capacity(), 2);
    }

    #[test]
    fn test_full_ring_drops_new_element() {
        let (mut p, mut c) = render_channel(4);
        for n in 0..6 {
            p.push(msg(n));
        }
        assert_eq!(p.len(), 4);
        assert_eq!(p.dropped(), 2);
        let got: Vec<_> = c.drain();
        assert_eq!(got, (0..4).map(msg).collect::<Vec<_>>());
        assert!(p.push(msg(9)));
        assert_eq!(c.pop(), Some(msg(9)));
    }

    #[test]
    fn test_dropping_ring_frees_pending_messages() {
        let (mut p, c) = render_channel(8);
        for n in 0..5 {
            p.push(msg(n));
        }
        drop(p);
        drop(c);
    }

    #[test]
    fn test_status_alignment_truncated() {
        let mut line = StatusLine::default();
        line.set_alignment("Chaotic and then some");
        assert_eq!(line.alignment_str().len(), STATUS_ALIGN_LEN - 1);
        line.set_alignment("Lawful");
        assert_eq!(line.alignment_str(), "Lawful");
    }

    #[test]
    fn test_threaded_fifo_without_loss() {
        let (mut p, mut c) = render_channel(64);
        const N: i64 = 20_000;
        let producer = thread::spawn(move || {
            let mut sent = 0;
            while sent < N {
                if p.push(RenderElement::TurnComplete { moves: sent }) {
                    sent += 1;
                } else {
                    thread::yield_now();
                }
            }
            p.dropped()
        });
        let mut expected = 0;
        while expected < N {
            match c.pop() {
                Some(RenderElement::TurnComplete { moves }) => {
                    assert_eq!(moves, expected);
                    expected += 1;
                }
                Some(other) => panic!("unexpected element {other:?}"),
                None => thread::yield_now(),
            }
        }
        let dropped = producer.join().unwrap();
        assert_eq!(c.pop(), None);
        assert_eq!(c.dropped(), dropped);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push,
        Pop,
    }

    proptest! {
        #[test]
        fn prop_fifo_matches_model(ops in prop::collection::vec(prop_oneof![Just(Op::Push), Just(Op::Pop)], 0..200)) {
            let (mut p, mut c) = render_channel(8);
            let mut model = VecDeque::new();
            let mut next = 0i64;
            let mut model_drops = 0u64;
            for op in ops {
                match op {
                    Op::Push => {
                        let accepted = p.push(RenderElement::TurnComplete { moves: next });
                        if model.len() < 8 {
                            prop_assert!(accepted);
                            model.push_back(next);
                        } else {
                            prop_assert!(!accepted);
                            model_drops += 1;
                        }
                        next += 1;
                    }
                    Op::Pop => {
                        let got = c.pop().map(|e| match e {
                            RenderElement::TurnComplete { moves } => moves,
                            _ => -1,
                        });
                        prop_assert_eq!(got, model.pop_front());
                    }
                }
                prop_assert!(c.len() <= c.capacity());
            }
            prop_assert_eq!(p.dropped(), model_drops);
        }
    }
}
