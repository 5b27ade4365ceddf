//! The runtime object owning all shared protocol state.
//!
//! Everything the protocols coordinate through (the orec table, the global
//! clock, the last-complete marker, the cohort gates, the dispatch table,
//! and the thread registry) hangs off one [`Runtime`], so embedders can
//! host several independent transactional regions in one process. Hot-path
//! accessors hand out direct references; every access is still a single
//! load, store, or CAS on a stable address.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use weft_core::orec::DEFAULT_ORECS;
use weft_core::{CohortGates, Error, GlobalClock, OrecTable, PadWord, Result};

use crate::algs;
use crate::descriptor::{ThreadSlot, TxDesc};
use crate::dispatch::{AlgOps, DispatchTable, BLOCKER};
use crate::hooks::{self, TxLifecycle};

/// Construction-time tunables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ownership records in the table (rounded up to a power of two).
    pub orec_entries: usize,
    /// Read-set bound; exceeding it is a capacity abort.
    pub read_set_capacity: usize,
    /// Write-set (and undo-log) bound; exceeding it is a capacity abort.
    pub write_set_capacity: usize,
    /// Enable the cohort committer's write-time in-place promotion.
    ///
    /// Off by default: the promotion branch is part of the protocol but is
    /// left dormant unless the embedder deliberately opts in.
    pub cohort_inplace_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orec_entries: DEFAULT_ORECS,
            read_set_capacity: 1 << 20,
            write_set_capacity: 1 << 16,
            cohort_inplace_writes: false,
        }
    }
}

/// Registry of attached threads' shared slots.
pub(crate) struct ThreadRegistry {
    slots: Mutex<Vec<Arc<ThreadSlot>>>,
    next_id: PadWord,
}

impl ThreadRegistry {
    fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            next_id: PadWord::new(0),
        }
    }

    fn attach(&self) -> Arc<ThreadSlot> {
        let id = self.next_id.fetch_add(1) + 1;
        let slot = Arc::new(ThreadSlot::new(id));
        self.slots.lock().push(Arc::clone(&slot));
        slot
    }

    fn detach(&self, slot: &ThreadSlot) {
        slot.attached.store(false, Ordering::SeqCst);
        self.slots
            .lock()
            .retain(|s| s.attached.load(Ordering::SeqCst));
    }

    fn any_active(&self) -> bool {
        self.slots
            .lock()
            .iter()
            .any(|s| s.active.load(Ordering::SeqCst))
    }

    /// Reset every thread's ticket. Quiesced callers only.
    pub(crate) fn reset_orders(&self) {
        for slot in self.slots.lock().iter() {
            slot.order.store(-1, Ordering::Relaxed);
        }
    }
}

/// The transactional memory runtime.
pub struct Runtime {
    orecs: OrecTable,
    clock: GlobalClock,
    last_complete: PadWord,
    gates: CohortGates,
    dispatch: DispatchTable,
    threads: ThreadRegistry,
    hooks: Arc<dyn TxLifecycle>,
    config: Config,
    switch_lock: Mutex<()>,
}

impl Runtime {
    /// Build a runtime with the given tunables and initial protocol.
    pub fn new(
        config: Config,
        initial: &'static AlgOps,
        hooks: Option<Arc<dyn TxLifecycle>>,
    ) -> Self {
        let rt = Self {
            orecs: OrecTable::new(config.orec_entries),
            clock: GlobalClock::new(),
            last_complete: PadWord::new(0),
            gates: CohortGates::new(),
            dispatch: DispatchTable::new(initial),
            threads: ThreadRegistry::new(),
            hooks: hooks.unwrap_or_else(hooks::noop),
            config,
            switch_lock: Mutex::new(()),
        };
        (initial.on_switch_to)(&rt);
        debug!(
            algorithm = initial.name,
            orecs = rt.orecs.len(),
            "transactional runtime initialized"
        );
        rt
    }

    // -- hot-path state, shared by the protocol implementations --

    #[inline]
    pub(crate) fn orecs(&self) -> &OrecTable {
        &self.orecs
    }

    #[inline]
    pub(crate) fn clock(&self) -> &GlobalClock {
        &self.clock
    }

    #[inline]
    pub(crate) fn last_complete(&self) -> &PadWord {
        &self.last_complete
    }

    #[inline]
    pub(crate) fn gates(&self) -> &CohortGates {
        &self.gates
    }

    #[inline]
    pub(crate) fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub(crate) fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    // -- thread lifecycle --

    /// Allocate a descriptor for the calling thread and register its slot.
    pub fn attach_thread(&self) -> TxDesc {
        let slot = self.threads.attach();
        tracing::trace!(thread = slot.id, "thread attached");
        TxDesc::new(
            slot,
            self.dispatch.current(),
            Arc::clone(&self.hooks),
            &self.config,
        )
    }

    /// Unregister a descriptor's slot.
    pub fn detach_thread(&self, tx: &TxDesc) {
        tracing::trace!(thread = tx.slot.id, "thread detached");
        self.threads.detach(&tx.slot);
    }

    // -- transaction lifecycle --

    /// Run the active protocol's begin for an outermost transaction.
    ///
    /// Loops over admission conflicts and in-progress switches, so callers
    /// always come back with a live transaction under the then-current
    /// protocol.
    pub fn begin_txn(&self, tx: &mut TxDesc) {
        loop {
            tx.slot.active.store(true, Ordering::SeqCst);
            let alg = self.dispatch.current();
            if std::ptr::eq(alg, &BLOCKER) {
                tx.slot.active.store(false, Ordering::SeqCst);
                while self.dispatch.is_blocked() {
                    std::hint::spin_loop();
                }
                continue;
            }
            tx.alg = alg;
            match (alg.begin)(self, tx) {
                Ok(()) => return,
                Err(_) => {
                    // Admission self-abort: the protocol moved while we
                    // waited at its gate. Re-dispatch and try again.
                    tx.slot.active.store(false, Ordering::SeqCst);
                    std::hint::spin_loop();
                }
            }
        }
    }

    /// Commit through the descriptor's mode slot.
    pub fn commit_txn(&self, tx: &mut TxDesc) -> Result<()> {
        let result = tx.commit(self);
        if result.is_ok() {
            tx.slot.active.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Abort: undo effects, reset the descriptor, count the abort.
    ///
    /// Control returns to the caller as if the transaction had never begun;
    /// the retry driver re-executes from just after begin.
    pub fn rollback_txn(&self, tx: &mut TxDesc) {
        (tx.alg.rollback)(self, tx);
        tx.stats.aborts += 1;
        tx.hooks.on_abort();
        tx.slot.active.store(false, Ordering::SeqCst);
    }

    // -- algorithm switch --

    /// Quiesce the runtime and install the named protocol.
    ///
    /// In-flight transactions either complete under the outgoing protocol
    /// or self-abort from their identity-checking waits; new transactions
    /// hold at the blocker until the incoming protocol's regime hook has
    /// run.
    pub fn switch_to(&self, name: &str) -> Result<()> {
        let next = algs::lookup(name).ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))?;
        let _serialize = self.switch_lock.lock();
        if self.dispatch.is_current(next) {
            return Ok(());
        }
        let from = self.dispatch.current().name;
        self.dispatch.install(&BLOCKER);
        while self.threads.any_active() {
            std::hint::spin_loop();
        }
        (next.on_switch_to)(self);
        self.dispatch.install(next);
        info!(from, to = next.name, "algorithm switched");
        Ok(())
    }

    // -- introspection --

    /// Stable name of the active protocol.
    pub fn algorithm_name(&self) -> &'static str {
        self.dispatch.current().name
    }

    /// The highest completed commit ticket.
    pub fn last_complete_ticket(&self) -> u64 {
        self.last_complete.load_acquire()
    }

    /// `(started, cpending, committed)` cohort gate snapshot.
    pub fn gate_snapshot(&self) -> (u64, u64, u64) {
        self.gates.snapshot()
    }

    /// Current global clock value.
    pub fn clock_now(&self) -> u64 {
        self.clock.sample()
    }

    /// Version (or lock token) of the orec protecting `addr`.
    pub fn orec_version_of(&self, addr: usize) -> u64 {
        self.orecs.for_addr(addr).load()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("algorithm", &self.algorithm_name())
            .field("orecs", &self.orecs.len())
            .finish_non_exhaustive()
    }
}
