//! Shared helpers for the protocol tests.

use std::sync::atomic::{AtomicUsize, Ordering};

/// A block of transactional words with stable addresses.
///
/// Backed by atomics so non-transactional inspection from the test harness
/// is race-free; the runtime sees plain word addresses.
pub struct WordArena {
    words: Box<[AtomicUsize]>,
}

impl WordArena {
    pub fn new(len: usize) -> Self {
        Self {
            words: (0..len).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    /// Raw address of word `i`, for the transactional API.
    pub fn addr(&self, i: usize) -> usize {
        &self.words[i] as *const AtomicUsize as usize
    }

    pub fn ptr(&self, i: usize) -> *mut usize {
        self.words[i].as_ptr()
    }

    /// Direct (non-transactional) read, for assertions between
    /// transactions.
    pub fn peek(&self, i: usize) -> usize {
        self.words[i].load(Ordering::SeqCst)
    }

    pub fn poke(&self, i: usize, value: usize) {
        self.words[i].store(value, Ordering::SeqCst);
    }
}

/// Transactionally increment word `i` of the arena.
pub fn increment(tx: &mut weft::Txn<'_>, arena: &WordArena, i: usize) -> weft::Result<()> {
    unsafe {
        let ptr = arena.ptr(i);
        let n = tx.read_word(ptr)?;
        tx.write_word(ptr, n + 1)
    }
}
