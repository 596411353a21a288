//! Single producer, single consumer hand-off of whole values.
//!
//! Three slots rotate between the [`Editor`], the [`Reader`] and a shared
//! middle position. Publishing swaps the editor's slot into the middle and
//! acquiring swaps the middle out to the reader, each with one atomic swap,
//! so neither side ever waits and a reader never sees a half written value.
//! The reader sees whatever was published last; intermediate values may be
//! skipped.

use std::{
    cell::UnsafeCell,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use cb::utils::CachePadded;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

const INDEX_MASK: usize = 0b11;
const DIRTY: usize = 0b100;

struct Shared<T> {
    slots: [CachePadded<UnsafeCell<T>>; 3],
    /// Index of the middle slot, tagged with `DIRTY` until the reader has
    /// taken it.
    middle: CachePadded<AtomicUsize>,
}

// Each slot is only ever reachable from the side that currently owns its
// index; ownership moves through `middle`.
unsafe impl<T: Send + Sync> Sync for Shared<T> {}
unsafe impl<T: Send> Send for Shared<T> {}

impl<T> Shared<T> {
    #[inline]
    fn slot(&self, i: usize) -> *mut T {
        self.slots[i].get()
    }
}

impl<T> std::fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("middle", &self.middle.load(Ordering::Relaxed))
            .finish()
    }
}

/// Writing half. Owns the back slot.
#[derive(Debug)]
pub struct Editor<T> {
    shared: Arc<Shared<T>>,
    back: usize,
}
impl<T> Editor<T> {
    /// The back slot. Holds whatever the slot last contained, so callers
    /// overwrite rather than patch it.
    #[inline]
    pub fn back_mut(&mut self) -> &mut T {
        unsafe { &mut *self.shared.slot(self.back) }
    }
    #[inline]
    pub fn back(&self) -> &T {
        unsafe { &*self.shared.slot(self.back) }
    }
    /// Makes the back slot visible to the reader and takes over the old
    /// middle slot.
    pub fn publish(&mut self) {
        let prev = self.shared.middle.swap(self.back | DIRTY, Ordering::AcqRel);
        trace!("Publishing slot {} and taking slot {}.", self.back, prev & INDEX_MASK);
        self.back = prev & INDEX_MASK;
    }
    /// Whether the reader has let go of everything published so far.
    pub fn is_consumed(&self) -> bool {
        self.shared.middle.load(Ordering::Acquire) & DIRTY == 0
    }
}

/// Reading half. Owns the front slot.
#[derive(Debug)]
pub struct Reader<T> {
    shared: Arc<Shared<T>>,
    front: usize,
}
impl<T> Reader<T> {
    /// Takes the newest published slot, if anything was published since the
    /// last call. Returns whether the front changed.
    pub fn acquire(&mut self) -> bool {
        if self.shared.middle.load(Ordering::Relaxed) & DIRTY == 0 {
            return false;
        }
        let prev = self.shared.middle.swap(self.front, Ordering::AcqRel);
        trace!("Returning slot {} and taking slot {}.", self.front, prev & INDEX_MASK);
        self.front = prev & INDEX_MASK;
        true
    }
    /// The value acquired last, without checking for newer ones.
    #[inline]
    pub fn front(&self) -> &T {
        unsafe { &*self.shared.slot(self.front) }
    }
    /// Acquires and returns the newest value.
    pub fn latest(&mut self) -> &T {
        self.acquire();
        self.front()
    }
}

/// Creates both halves, with every slot starting as a copy of `src`.
pub fn buffer<T: Clone>(src: T) -> (Reader<T>, Editor<T>) {
    let shared = Arc::new(Shared {
        slots: [
            CachePadded::new(UnsafeCell::new(src.clone())),
            CachePadded::new(UnsafeCell::new(src.clone())),
            CachePadded::new(UnsafeCell::new(src)),
        ],
        middle: CachePadded::new(AtomicUsize::new(1)),
    });
    (
        Reader {
            shared: Arc::clone(&shared),
            front: 2,
        },
        Editor { shared, back: 0 },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_starts_with_the_source() {
        let (mut r, _w) = buffer(7u32);
        assert!(!r.acquire());
        assert_eq!(*r.latest(), 7);
    }

    #[test]
    fn newest_publish_wins() {
        let (mut r, mut w) = buffer(0u32);
        for i in 1..=3 {
            *w.back_mut() = i;
            w.publish();
        }
        assert!(!w.is_consumed());
        assert_eq!(*r.latest(), 3);
        assert!(w.is_consumed());
        assert!(!r.acquire());
        assert_eq!(*r.front(), 3);
    }

    #[test]
    fn slots_never_alias() {
        let (mut r, mut w) = buffer(0u32);
        for i in 0..50 {
            *w.back_mut() = i;
            w.publish();
            if i % 3 == 0 {
                r.acquire();
            }
            assert_ne!(w.back, r.front);
        }
    }

    #[test]
    fn concurrent_reads_see_whole_values() {
        const ROUNDS: u64 = 20_000;
        let (mut r, mut w) = buffer(vec![0u64; 1]);

        let writer = std::thread::spawn(move || {
            for tick in 1..=ROUNDS {
                let back = w.back_mut();
                back.clear();
                back.extend(std::iter::repeat(tick).take(tick as usize % 7 + 1));
                w.publish();
            }
        });

        let mut last = 0;
        while last < ROUNDS {
            let v = r.latest();
            let tick = v[0];
            assert_eq!(v.len(), tick as usize % 7 + 1);
            assert!(v.iter().all(|x| *x == tick));
            assert!(tick >= last);
            last = tick;
        }
        writer.join().unwrap();
    }
}
