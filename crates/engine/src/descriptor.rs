//! Per-thread transaction descriptors.
//!
//! A descriptor is mutated only by its owning thread. The one exception is
//! the thread's registry slot: `order` may be reset by the switch layer
//! while the runtime is quiesced, and `active` is read by the quiescing
//! thread, so both live in atomics shared through an [`ThreadSlot`].

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use weft_core::orec::lock_token;
use weft_core::Result;

use crate::dispatch::{AlgOps, CommitFn, ReadFn, WriteFn};
use crate::hooks::TxLifecycle;
use crate::logs::{LockSet, ReadSet, UndoLog, WriteSet};
use crate::runtime::{Config, Runtime};

/// Execution mode of a live transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No writes yet; commit needs no publication.
    ReadOnly,
    /// Redo or undo logging is active.
    ReadWrite,
    /// Promoted to in-place writes; cannot abort; terminal until commit.
    Turbo,
}

/// Per-thread commit/abort tallies.
#[derive(Debug, Default, Clone, Copy)]
pub struct TxStats {
    /// Conflict and capacity aborts.
    pub aborts: u64,
    /// Read-only commits.
    pub commits_ro: u64,
    /// Writing commits (including turbo).
    pub commits_rw: u64,
}

/// The cross-thread-visible part of a descriptor.
#[derive(Debug)]
pub struct ThreadSlot {
    /// Registry identity; also the basis of the thread's lock token.
    pub id: u64,
    pub(crate) order: AtomicI64,
    pub(crate) active: AtomicBool,
    pub(crate) attached: AtomicBool,
}

impl ThreadSlot {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            order: AtomicI64::new(-1),
            active: AtomicBool::new(false),
            attached: AtomicBool::new(true),
        }
    }
}

/// A thread's transaction descriptor.
///
/// Holds the mode-specialized dispatch slots, the per-transaction logs, and
/// the cached timestamps the protocols coordinate through. Reset per
/// transaction; allocated once per attached thread.
pub struct TxDesc {
    pub(crate) slot: Arc<ThreadSlot>,
    pub(crate) alg: &'static AlgOps,
    pub(crate) mode: Mode,
    /// Flat-nesting depth; only the outermost level runs the protocol.
    pub nesting_depth: u32,
    pub(crate) start_time: u64,
    pub(crate) ts_cache: u64,
    pub(crate) my_lock: u64,
    pub(crate) reads: ReadSet,
    pub(crate) writes: WriteSet,
    pub(crate) undo: UndoLog,
    pub(crate) locks: LockSet,
    read_slot: ReadFn,
    write_slot: WriteFn,
    commit_slot: CommitFn,
    pub(crate) hooks: Arc<dyn TxLifecycle>,
    /// Commit/abort tallies for this thread.
    pub stats: TxStats,
}

impl TxDesc {
    pub(crate) fn new(
        slot: Arc<ThreadSlot>,
        alg: &'static AlgOps,
        hooks: Arc<dyn TxLifecycle>,
        config: &Config,
    ) -> Self {
        let my_lock = lock_token(slot.id);
        Self {
            slot,
            alg,
            mode: Mode::ReadOnly,
            nesting_depth: 0,
            start_time: 0,
            ts_cache: 0,
            my_lock,
            reads: ReadSet::with_capacity(config.read_set_capacity),
            writes: WriteSet::with_capacity(config.write_set_capacity),
            undo: UndoLog::with_capacity(config.write_set_capacity),
            locks: LockSet::default(),
            read_slot: unstarted_read,
            write_slot: unstarted_write,
            commit_slot: unstarted_commit,
            hooks,
            stats: TxStats::default(),
        }
    }

    /// Transactional read of the word at `addr` through the current mode's
    /// slot. May abort.
    #[inline]
    pub fn read(&mut self, rt: &Runtime, addr: usize) -> Result<usize> {
        let f = self.read_slot;
        f(rt, self, addr)
    }

    /// Transactional write of `val` under `mask` through the current mode's
    /// slot. May abort (never in turbo).
    #[inline]
    pub fn write(&mut self, rt: &Runtime, addr: usize, val: usize, mask: usize) -> Result<()> {
        let f = self.write_slot;
        f(rt, self, addr, val, mask)
    }

    /// Commit through the current mode's slot. May abort.
    #[inline]
    pub(crate) fn commit(&mut self, rt: &Runtime) -> Result<()> {
        let f = self.commit_slot;
        f(rt, self)
    }

    /// Current execution mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the transaction has been promoted to in-place writes.
    pub fn is_turbo(&self) -> bool {
        self.mode == Mode::Turbo
    }

    /// The commit ticket, or −1 when none is held.
    pub fn order(&self) -> i64 {
        self.slot.order.load(Ordering::Relaxed)
    }

    /// Stable name of the protocol this descriptor last began under.
    pub fn algorithm(&self) -> &'static str {
        self.alg.name
    }

    pub(crate) fn set_order(&self, order: i64) {
        self.slot.order.store(order, Ordering::Relaxed);
    }

    pub(crate) fn install(&mut self, read: ReadFn, write: WriteFn, commit: CommitFn) {
        self.read_slot = read;
        self.write_slot = write;
        self.commit_slot = commit;
    }

    pub(crate) fn reset_logs(&mut self) {
        self.reads.reset();
        self.writes.reset();
        self.undo.reset();
        self.locks.reset();
    }
}

impl std::fmt::Debug for TxDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxDesc")
            .field("thread", &self.slot.id)
            .field("mode", &self.mode)
            .field("order", &self.order())
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .finish_non_exhaustive()
    }
}

// The slots installed before any begin. Reaching them is an instrumentation
// bug (a transactional access outside begin/commit), not a recoverable
// condition.

fn unstarted_read(_rt: &Runtime, _tx: &mut TxDesc, _addr: usize) -> Result<usize> {
    panic!("transactional read outside an active transaction");
}

fn unstarted_write(
    _rt: &Runtime,
    _tx: &mut TxDesc,
    _addr: usize,
    _val: usize,
    _mask: usize,
) -> Result<()> {
    panic!("transactional write outside an active transaction");
}

fn unstarted_commit(_rt: &Runtime, _tx: &mut TxDesc) -> Result<()> {
    panic!("commit outside an active transaction");
}
