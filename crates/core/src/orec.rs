//! Ownership records.
//!
//! Every word of protected user memory maps by a stable hash of its address
//! to exactly one orec. The orec's `v` word is either a version number (a
//! timestamp stamped by the last committed writer) or a lock token naming
//! the thread currently publishing writes under it. The two encodings are
//! disjoint: lock tokens carry the high bit, versions never do.
//!
//! `p` holds the pre-lock version while `v` carries a token, so an aborting
//! owner can revert the record without consulting its logs.

use std::sync::atomic::{AtomicU64, Ordering};

/// High bit distinguishing lock tokens from version numbers.
pub const LOCK_BIT: u64 = 1 << 63;

/// Build the stable lock token for a thread.
#[inline]
pub const fn lock_token(thread_id: u64) -> u64 {
    LOCK_BIT | thread_id
}

/// Whether an orec word is a lock token rather than a version.
#[inline]
pub const fn is_locked(word: u64) -> bool {
    word & LOCK_BIT != 0
}

/// A single versioned ownership record.
///
/// Orecs are deliberately two bare words, not cache-padded: the table is
/// large and sparsely contended, and padding a million records would cost
/// more in footprint than false sharing costs in practice.
#[derive(Debug, Default)]
pub struct Orec {
    v: AtomicU64,
    p: AtomicU64,
}

impl Orec {
    /// Current version or lock token, with acquire ordering.
    #[inline]
    pub fn load(&self) -> u64 {
        self.v.load(Ordering::Acquire)
    }

    /// Relaxed read of the current version or lock token.
    #[inline]
    pub fn load_relaxed(&self) -> u64 {
        self.v.load(Ordering::Relaxed)
    }

    /// Stamp a new version with a plain store.
    ///
    /// Callers sequence the stamp against the data write themselves; the
    /// in-place write contract is stamp, write-before-write barrier, data.
    #[inline]
    pub fn stamp(&self, version: u64) {
        self.v.store(version, Ordering::Relaxed);
    }

    /// Try to swing `v` from the observed `expected` version to `token`.
    ///
    /// On success the old version is parked in `p` for release or revert.
    #[inline]
    pub fn try_lock(&self, expected: u64, token: u64) -> bool {
        if self
            .v
            .compare_exchange(expected, token, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.p.store(expected, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Publish `version` and release ownership.
    #[inline]
    pub fn release(&self, version: u64) {
        self.v.store(version, Ordering::Release);
    }

    /// Revert a locked record to the version saved by [`Orec::try_lock`].
    #[inline]
    pub fn revert(&self) {
        self.v.store(self.p.load(Ordering::Relaxed), Ordering::Release);
    }
}

/// Fixed-size table of ownership records.
///
/// Addresses hash to slots by word index; the table length is forced to a
/// power of two so the hash is a shift and a mask. Aliasing (two addresses
/// sharing a slot) is benign: it can cause false conflicts, never missed
/// ones.
pub struct OrecTable {
    orecs: Box<[Orec]>,
    mask: usize,
}

/// Default number of records: 2^20 slots, 16 MiB.
pub const DEFAULT_ORECS: usize = 1 << 20;

impl OrecTable {
    /// Allocate a table with `entries` records (rounded up to a power of two).
    pub fn new(entries: usize) -> Self {
        let len = entries.next_power_of_two().max(2);
        let orecs: Box<[Orec]> = (0..len).map(|_| Orec::default()).collect();
        Self {
            orecs,
            mask: len - 1,
        }
    }

    /// Number of records in the table.
    pub fn len(&self) -> usize {
        self.orecs.len()
    }

    /// Whether the table is empty (never true for a constructed table).
    pub fn is_empty(&self) -> bool {
        self.orecs.is_empty()
    }

    /// Slot index protecting `addr`.
    #[inline]
    pub fn index_of(&self, addr: usize) -> u32 {
        ((addr >> word_shift()) & self.mask) as u32
    }

    /// The record at a previously computed slot index.
    #[inline]
    pub fn get(&self, index: u32) -> &Orec {
        &self.orecs[index as usize]
    }

    /// The record protecting `addr`.
    #[inline]
    pub fn for_addr(&self, addr: usize) -> &Orec {
        self.get(self.index_of(addr))
    }
}

#[inline]
const fn word_shift() -> usize {
    std::mem::size_of::<usize>().trailing_zeros() as usize
}

impl std::fmt::Debug for OrecTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrecTable")
            .field("len", &self.orecs.len())
            .finish_non_exhaustive()
    }
}
