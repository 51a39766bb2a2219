use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Slots plus the index of the oldest value.
///
/// While `slots.len() < capacity` the values sit in insertion order and
/// `head` stays 0. Once full, `head` is the next slot to overwrite and
/// `head - 1` (wrapping) holds the newest value.
#[derive(Debug)]
struct Ring<T> {
    slots: Vec<T>,
    head: usize,
}

/// A fixed-capacity FIFO that overwrites its oldest value when full.
///
/// Every operation goes through a single mutex, so a `drain` racing a
/// `push` sees the buffer either before or after the push, never between.
#[derive(Debug)]
pub struct CircularBuffer<T> {
    ring: Mutex<Ring<T>>,
    capacity: usize,
    evicted_count: AtomicU64,
}

impl<T> CircularBuffer<T> {
    /// Create a new circular buffer holding at most `capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "circular buffer capacity must be non-zero");
        Self {
            ring: Mutex::new(Ring {
                slots: Vec::with_capacity(capacity),
                head: 0,
            }),
            capacity,
            evicted_count: AtomicU64::new(0),
        }
    }

    /// Append a value, evicting the oldest one if the buffer is full.
    /// Returns true if a value was evicted.
    pub fn push(&self, value: T) -> bool {
        let mut ring = self.ring.lock();
        if ring.slots.len() < self.capacity {
            ring.slots.push(value);
            return false;
        }

        let head = ring.head;
        ring.slots[head] = value;
        ring.head = (head + 1) % self.capacity;
        self.evicted_count.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Take every held value, oldest first, leaving the buffer empty
    pub fn drain(&self) -> Vec<T> {
        let mut ring = self.ring.lock();
        if ring.slots.is_empty() {
            return Vec::new();
        }

        let head = std::mem::replace(&mut ring.head, 0);
        let mut values = std::mem::replace(&mut ring.slots, Vec::with_capacity(self.capacity));
        values.rotate_left(head);
        values
    }

    /// Get the number of values currently held
    pub fn len(&self) -> usize {
        self.ring.lock().slots.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of values overwritten since creation
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count.load(Ordering::Relaxed)
    }
}
