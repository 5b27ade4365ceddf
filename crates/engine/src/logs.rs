//! Per-transaction logs.
//!
//! Four bounded-growth collections back the protocols: the read set (orec
//! indices observed by reads), the write set (a redo log with address-keyed
//! lookup for read-after-write service), the undo log (prior values of
//! in-place writes), and the lock set (orecs a committer has acquired).
//!
//! All of them keep their allocations across transactions; `reset` is a
//! truncation, not a free. Exceeding a configured bound is a capacity
//! abort, which the retry driver treats like any other conflict.

use rustc_hash::FxHashMap;
use weft_core::word;
use weft_core::{Error, Result};

/// Orec indices this transaction has read. Duplicates are permitted;
/// validation is idempotent per entry.
#[derive(Debug)]
pub struct ReadSet {
    orecs: Vec<u32>,
    cap: usize,
}

impl ReadSet {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self {
            orecs: Vec::new(),
            cap,
        }
    }

    #[inline]
    pub(crate) fn insert(&mut self, orec: u32) -> Result<()> {
        if self.orecs.len() == self.cap {
            return Err(Error::Capacity("read set"));
        }
        self.orecs.push(orec);
        Ok(())
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u32] {
        &self.orecs
    }

    /// Number of logged reads.
    pub fn len(&self) -> usize {
        self.orecs.len()
    }

    /// Whether no reads are logged.
    pub fn is_empty(&self) -> bool {
        self.orecs.is_empty()
    }

    pub(crate) fn reset(&mut self) {
        self.orecs.clear();
    }
}

/// One redo-log entry: a word address, the buffered value, and the byte
/// mask (expanded to a word mask) under which it applies.
#[derive(Debug, Clone, Copy)]
pub struct WriteEntry {
    pub addr: usize,
    pub val: usize,
    pub mask: usize,
}

/// The redo log: insertion-ordered entries with O(1) address lookup.
///
/// Re-writing an address merges the new bytes over the buffered entry, so
/// writeback applies each address exactly once.
#[derive(Debug)]
pub struct WriteSet {
    entries: Vec<WriteEntry>,
    index: FxHashMap<usize, u32>,
    cap: usize,
}

impl WriteSet {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
            cap,
        }
    }

    pub(crate) fn insert(&mut self, addr: usize, val: usize, mask: usize) -> Result<()> {
        if let Some(&at) = self.index.get(&addr) {
            let entry = &mut self.entries[at as usize];
            entry.val = word::merge(entry.val, val, mask);
            entry.mask |= mask;
            return Ok(());
        }
        if self.entries.len() == self.cap {
            return Err(Error::Capacity("write set"));
        }
        self.index.insert(addr, self.entries.len() as u32);
        self.entries.push(WriteEntry { addr, val, mask });
        Ok(())
    }

    /// Read-after-write lookup: the buffered value and mask for `addr`.
    #[inline]
    pub(crate) fn lookup(&self, addr: usize) -> Option<(usize, usize)> {
        self.index
            .get(&addr)
            .map(|&at| {
                let e = &self.entries[at as usize];
                (e.val, e.mask)
            })
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[WriteEntry] {
        &self.entries
    }

    /// Number of buffered words.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no writes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every buffered write to memory, in insertion order.
    ///
    /// # Safety
    ///
    /// The caller must own publication rights to every logged address (hold
    /// the orec locks, or be serialized by its commit order).
    pub(crate) unsafe fn writeback(&self) {
        for e in &self.entries {
            word::store_word(e.addr, e.val, e.mask);
        }
    }

    pub(crate) fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

/// Prior values of in-place writes, replayed newest-first on rollback.
#[derive(Debug)]
pub struct UndoLog {
    entries: Vec<(usize, usize)>,
    cap: usize,
}

impl UndoLog {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
        }
    }

    #[inline]
    pub(crate) fn record(&mut self, addr: usize, prior: usize) -> Result<()> {
        if self.entries.len() == self.cap {
            return Err(Error::Capacity("undo log"));
        }
        self.entries.push((addr, prior));
        Ok(())
    }

    /// Restore every logged word, newest entry first.
    ///
    /// # Safety
    ///
    /// The caller must be the thread that performed the in-place writes,
    /// with the cohort still closed to entrants.
    pub(crate) unsafe fn replay(&self) {
        for &(addr, prior) in self.entries.iter().rev() {
            word::store_word(addr, prior, word::FULL_MASK);
        }
    }

    /// Whether no in-place writes are logged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn reset(&mut self) {
        self.entries.clear();
    }
}

/// Orec indices a committer has CAS-acquired, for release or revert.
#[derive(Debug, Default)]
pub struct LockSet {
    orecs: Vec<u32>,
}

impl LockSet {
    #[inline]
    pub(crate) fn insert(&mut self, orec: u32) {
        self.orecs.push(orec);
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u32] {
        &self.orecs
    }

    /// Whether no locks are held.
    pub fn is_empty(&self) -> bool {
        self.orecs.is_empty()
    }

    pub(crate) fn reset(&mut self) {
        self.orecs.clear();
    }
}
