//! Cache-line isolation for globally shared words.
//!
//! The commit protocols coordinate through a handful of single-word counters
//! that are written by one thread and spun on by every other. Placing two of
//! them on the same cache line turns every publication into a broadcast
//! invalidation of unrelated spins, so each one gets its own line.
//!
//! 64-byte lines are assumed (x86-64 and AArch64). Over-aligning on platforms
//! with larger lines wastes a little memory and nothing else.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache line size in bytes.
pub const CACHE_LINE_BYTES: usize = 64;

/// Forces the wrapped value onto its own cache line.
///
/// `#[repr(C, align(64))]` both aligns the start of the value and rounds its
/// size up to a whole number of lines, so adjacent array elements never
/// share a line.
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

impl<T> CacheAligned<T> {
    /// Wrap `value` with cache-line alignment.
    #[inline]
    pub const fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

/// A cache-line-isolated atomic word.
///
/// This is the building block for the global clock, the last-complete
/// marker, and the cohort gate counters: one word, one line, accessed with
/// explicit orderings by the protocol code.
#[derive(Debug, Default)]
pub struct PadWord {
    val: CacheAligned<AtomicU64>,
}

impl PadWord {
    /// A new word holding `value`.
    pub const fn new(value: u64) -> Self {
        Self {
            val: CacheAligned::new(AtomicU64::new(value)),
        }
    }

    /// Acquire load; pairs with [`PadWord::store_release`] publications.
    #[inline]
    pub fn load_acquire(&self) -> u64 {
        self.val.load(Ordering::Acquire)
    }

    /// Relaxed load for owner-only or quiesced access.
    #[inline]
    pub fn load_relaxed(&self) -> u64 {
        self.val.load(Ordering::Relaxed)
    }

    /// Release store publishing all writes program-ordered before it.
    #[inline]
    pub fn store_release(&self, value: u64) {
        self.val.store(value, Ordering::Release);
    }

    /// Relaxed store for owner-only or quiesced access.
    #[inline]
    pub fn store_relaxed(&self, value: u64) {
        self.val.store(value, Ordering::Relaxed);
    }

    /// Fully-ordered increment; returns the previous value.
    #[inline]
    pub fn fetch_add(&self, n: u64) -> u64 {
        self.val.fetch_add(n, Ordering::SeqCst)
    }

    /// Fully-ordered decrement; returns the previous value.
    #[inline]
    pub fn fetch_sub(&self, n: u64) -> u64 {
        self.val.fetch_sub(n, Ordering::SeqCst)
    }

    /// Monotonically raise the word to at least `floor`.
    #[inline]
    pub fn fetch_max(&self, floor: u64) -> u64 {
        self.val.fetch_max(floor, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn padded_words_occupy_whole_lines() {
        assert_eq!(size_of::<PadWord>(), CACHE_LINE_BYTES);
        assert_eq!(align_of::<PadWord>(), CACHE_LINE_BYTES);
        assert_eq!(size_of::<CacheAligned<u8>>(), CACHE_LINE_BYTES);
        assert_eq!(size_of::<CacheAligned<[u8; 65]>>(), 2 * CACHE_LINE_BYTES);
    }

    #[test]
    fn adjacent_pad_words_never_share_a_line() {
        let words: [PadWord; 4] = std::array::from_fn(|_| PadWord::new(0));
        for i in 0..3 {
            let a = &words[i] as *const _ as usize;
            let b = &words[i + 1] as *const _ as usize;
            assert_eq!(b - a, CACHE_LINE_BYTES);
        }
    }

    #[test]
    fn fetch_max_is_monotone() {
        let w = PadWord::new(10);
        w.fetch_max(5);
        assert_eq!(w.load_relaxed(), 10);
        w.fetch_max(17);
        assert_eq!(w.load_relaxed(), 17);
    }
}
