//! Bounded single-producer/single-consumer handoff queue.
//!
//! Moves whole state snapshots between a pump's two threads without locking.
//! The single-producer/single-consumer constraint is enforced by the split
//! handle types rather than documentation: neither handle is `Clone`, so at
//! most one thread can push and one can pop.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Shared<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    // Monotonic wrapping counters; slot index is counter % capacity.
    // head == next unread, tail == next write; full when tail - head == capacity.
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Each slot is owned by exactly one side at a time (the producer owns
// [tail, head + capacity), the consumer owns [head, tail)), so sharing the
// cells across the two threads is sound for any T that can move between
// threads.
unsafe impl<T: Send> Sync for Shared<T> {}

/// Creates a bounded SPSC queue of the given capacity, split into its two
/// endpoint handles.
pub fn channel<T: Copy + Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0);

    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let shared = Arc::new(Shared {
        slots,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });

    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy + Send> Producer<T> {
    /// Non-blocking push. Returns `false` when the queue is at capacity and
    /// the value was dropped; the caller decides how to surface sustained
    /// saturation.
    pub fn try_push(&mut self, value: T) -> bool {
        let tail = self.shared.tail.load(Ordering::Relaxed);
        let head = self.shared.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) == self.shared.slots.len() {
            return false;
        }

        let slot = &self.shared.slots[tail % self.shared.slots.len()];
        unsafe { (*slot.get()).write(value) };
        self.shared.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }
}

impl<T: Copy + Send> Consumer<T> {
    /// Non-blocking pop in FIFO order; `None` when the queue is empty.
    pub fn try_pop(&mut self) -> Option<T> {
        let head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        let slot = &self.shared.slots[head % self.shared.slots.len()];
        let value = unsafe { (*slot.get()).assume_init_read() };
        self.shared.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Latest-wins drain: pops everything currently queued and returns the
    /// newest value along with how many entries were collapsed into it.
    /// `None` when nothing was queued.
    pub fn drain_latest(&mut self) -> Option<(T, usize)> {
        let mut newest = None;
        let mut count = 0;
        while let Some(value) = self.try_pop() {
            newest = Some(value);
            count += 1;
        }
        newest.map(|value| (value, count))
    }
}
