//! Lock-free single-producer single-consumer ring buffer.
//!
//! [`channel`] returns a [`Producer`] and a [`Consumer`]. Neither half is
//! `Clone` and both take `&mut self`, so the one-producer/one-consumer
//! contract is enforced by the type system. Threads that all want to produce
//! must funnel through a single `Producer` (the profiler puts it behind a
//! mutex).
//!
//! When the buffer is full nothing is overwritten: [`Producer::try_push`]
//! hands the value back, and [`Producer::push_timeout`] backs off until the
//! consumer frees a slot or the timeout passes.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::utils::{Backoff, CachePadded};

/// Sleep between push attempts once spinning has stopped paying off.
const RETRY_SLEEP: Duration = Duration::from_micros(100);

struct RingBuffer<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Total pushes. Written only by the producer.
    head: CachePadded<AtomicUsize>,
    /// Total pops. Written only by the consumer.
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: A slot is only written by the producer while it is outside
// tail..head, and only read by the consumer while it is inside. The
// Release/Acquire pairs on head and tail order slot contents with the
// cursor that publishes them.
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let mut tail = *self.tail.get_mut();
        while tail != head {
            // SAFETY: slots in tail..head hold initialized values that were
            // never popped.
            unsafe { self.slots[tail & self.mask].get_mut().assume_init_drop() };
            tail = tail.wrapping_add(1);
        }
    }
}

/// Create a ring buffer holding up to `capacity` values.
///
/// The capacity is rounded up to the next power of two (minimum 1).
#[must_use]
pub fn channel<T: Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let capacity = capacity.max(1).next_power_of_two();
    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();
    let buffer = Arc::new(RingBuffer {
        slots,
        mask: capacity - 1,
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
    });

    (
        Producer {
            buffer: Arc::clone(&buffer),
        },
        Consumer { buffer },
    )
}

/// Writing half of a ring buffer.
pub struct Producer<T> {
    buffer: Arc<RingBuffer<T>>,
}

impl<T> Producer<T> {
    /// Push a value, or hand it back if the buffer is full.
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        let buffer = &*self.buffer;
        let head = buffer.head.load(Ordering::Relaxed);
        let tail = buffer.tail.load(Ordering::Acquire);

        if head.wrapping_sub(tail) == buffer.capacity() {
            return Err(value);
        }

        // SAFETY: The slot at head is outside tail..head, so the consumer is
        // not reading it, and we are the only producer.
        unsafe { (*buffer.slots[head & buffer.mask].get()).write(value) };

        buffer.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Push a value, backing off while the buffer is full.
    ///
    /// Spins briefly, then yields, then sleeps in short steps. Returns the
    /// value if no slot freed up within `timeout`.
    pub fn push_timeout(&mut self, mut value: T, timeout: Duration) -> Result<(), T> {
        let backoff = Backoff::new();
        let mut deadline = None;

        loop {
            match self.try_push(value) {
                Ok(()) => return Ok(()),
                Err(returned) => value = returned,
            }

            if backoff.is_completed() {
                let deadline = *deadline.get_or_insert_with(|| Instant::now() + timeout);
                if Instant::now() >= deadline {
                    return Err(value);
                }
                thread::sleep(RETRY_SLEEP);
            } else {
                backoff.snooze();
            }
        }
    }

    /// Number of values waiting to be popped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Maximum number of values the buffer holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

/// Reading half of a ring buffer.
pub struct Consumer<T> {
    buffer: Arc<RingBuffer<T>>,
}

impl<T> Consumer<T> {
    /// Pop the oldest value. Returns `None` if the buffer is empty.
    pub fn pop(&mut self) -> Option<T> {
        let buffer = &*self.buffer;
        let tail = buffer.tail.load(Ordering::Relaxed);
        let head = buffer.head.load(Ordering::Acquire);

        if tail == head {
            return None;
        }

        // SAFETY: The slot at tail is inside tail..head, so the producer
        // finished writing it, and we are the only consumer.
        let value = unsafe { (*buffer.slots[tail & buffer.mask].get()).assume_init_read() };

        buffer.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Pop every value currently in the buffer.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len());
        while let Some(value) = self.pop() {
            values.push(value);
        }
        values
    }

    /// Number of values waiting to be popped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ProfileEntry;

    #[test]
    fn push_pop_single() {
        let (mut producer, mut consumer) = channel(256);
        let entry = ProfileEntry::on_thread("frame", 100, 250, 7);

        assert!(producer.try_push(entry.clone()).is_ok());
        assert_eq!(consumer.len(), 1);

        let popped = consumer.pop().unwrap();
        assert_eq!(popped.name, "frame");
        assert_eq!(popped.begin_tick, 100);
        assert_eq!(popped.end_tick, 250);
        assert_eq!(popped, entry);
        assert!(consumer.is_empty());
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let (_producer, mut consumer) = channel::<u32>(4);
        assert!(consumer.pop().is_none());
    }

    #[test]
    fn push_pop_multiple_in_order() {
        let (mut producer, mut consumer) = channel(128);

        for i in 0..100u64 {
            producer.try_push(i).unwrap();
        }
        assert_eq!(producer.len(), 100);

        for i in 0..100 {
            assert_eq!(consumer.pop(), Some(i));
        }
        assert!(consumer.is_empty());
    }

    #[test]
    fn full_buffer_rejects_without_overwriting() {
        let (mut producer, mut consumer) = channel(256);

        for i in 0..256u64 {
            producer.try_push(ProfileEntry::on_thread(format!("e{i}"), i, i + 1, 0)).unwrap();
        }
        assert!(producer.is_full());

        let overflow = ProfileEntry::on_thread("overflow", 999, 1000, 0);
        let rejected = producer.try_push(overflow.clone()).unwrap_err();
        assert_eq!(rejected, overflow);

        // The oldest entry is still there.
        assert_eq!(consumer.pop().unwrap().name, "e0");
        // And the freed slot takes the retried entry.
        producer.try_push(rejected).unwrap();

        let rest = consumer.drain();
        assert_eq!(rest.len(), 256);
        assert_eq!(rest[0].name, "e1");
        assert_eq!(rest[254].name, "e255");
        assert_eq!(rest[255].name, "overflow");
    }

    #[test]
    fn push_timeout_waits_for_consumer() {
        let (mut producer, mut consumer) = channel(4);
        for i in 0..4u32 {
            producer.try_push(i).unwrap();
        }

        let popper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let first = consumer.pop();
            (first, consumer)
        });

        let started = Instant::now();
        producer.push_timeout(4, Duration::from_secs(10)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));

        let (first, mut consumer) = popper.join().unwrap();
        assert_eq!(first, Some(0));
        assert_eq!(consumer.drain(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn push_timeout_gives_value_back() {
        let (mut producer, _consumer) = channel(2);
        producer.try_push(String::from("a")).unwrap();
        producer.try_push(String::from("b")).unwrap();

        let started = Instant::now();
        let returned = producer
            .push_timeout(String::from("c"), Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(returned, "c");
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let (producer, _) = channel::<u8>(100);
        assert_eq!(producer.capacity(), 128);
        let (producer, _) = channel::<u8>(0);
        assert_eq!(producer.capacity(), 1);
    }

    #[test]
    fn wraps_around_many_times() {
        let (mut producer, mut consumer) = channel(8);
        for round in 0..1000u64 {
            for i in 0..5 {
                producer.try_push(round * 10 + i).unwrap();
            }
            for i in 0..5 {
                assert_eq!(consumer.pop(), Some(round * 10 + i));
            }
        }
    }

    #[test]
    fn unpopped_values_are_dropped_with_buffer() {
        let marker = Arc::new(());
        let (mut producer, consumer) = channel(8);
        for _ in 0..3 {
            producer.try_push(Arc::clone(&marker)).unwrap();
        }
        assert_eq!(Arc::strong_count(&marker), 4);

        drop(producer);
        drop(consumer);
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    fn concurrent_producer_and_consumer_preserve_order() {
        const COUNT: u64 = 20_000;
        let (mut producer, mut consumer) = channel(16);

        let writer = thread::spawn(move || {
            for i in 0..COUNT {
                producer.push_timeout(i, Duration::from_secs(10)).unwrap();
            }
        });

        let mut expected = 0;
        while expected < COUNT {
            if let Some(value) = consumer.pop() {
                assert_eq!(value, expected);
                expected += 1;
            } else {
                thread::yield_now();
            }
        }
        writer.join().unwrap();
        assert!(consumer.is_empty());
    }
}
