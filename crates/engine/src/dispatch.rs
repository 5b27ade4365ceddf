//! Protocol dispatch and the switch blocker.
//!
//! The active protocol is published as a static [`AlgOps`] record behind an
//! atomic pointer. Hot-path `read`/`write`/`commit` are not dispatched here:
//! they live in mode-specialized slots inside each descriptor, installed by
//! the protocol's `begin` and mode transitions. This table answers the two
//! cold questions: which protocol begins the next transaction, and has the
//! protocol changed underneath a spinning waiter.

use std::sync::atomic::{AtomicPtr, Ordering};

use weft_core::{Error, Result};

use crate::descriptor::TxDesc;
use crate::runtime::Runtime;

/// Begin operation: admission, timestamps, and slot installation.
pub type BeginFn = fn(&Runtime, &mut TxDesc) -> Result<()>;
/// Rollback operation: undo effects and reset the descriptor.
pub type RollbackFn = fn(&Runtime, &mut TxDesc);
/// Regime hook run, quiesced, when the protocol is installed.
pub type SwitchFn = fn(&Runtime);
/// Mode-specialized transactional read of one word.
pub type ReadFn = fn(&Runtime, &mut TxDesc, usize) -> Result<usize>;
/// Mode-specialized transactional write of one word under a mask.
pub type WriteFn = fn(&Runtime, &mut TxDesc, usize, usize, usize) -> Result<()>;
/// Mode-specialized commit.
pub type CommitFn = fn(&Runtime, &mut TxDesc) -> Result<()>;

/// A commit protocol, addressable by its stable name.
pub struct AlgOps {
    /// Stable registry name.
    pub name: &'static str,
    /// See [`BeginFn`].
    pub begin: BeginFn,
    /// See [`RollbackFn`].
    pub rollback: RollbackFn,
    /// See [`SwitchFn`].
    pub on_switch_to: SwitchFn,
}

impl std::fmt::Debug for AlgOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgOps").field("name", &self.name).finish()
    }
}

/// The published active protocol.
pub(crate) struct DispatchTable {
    current: AtomicPtr<AlgOps>,
}

impl DispatchTable {
    pub(crate) fn new(initial: &'static AlgOps) -> Self {
        Self {
            current: AtomicPtr::new(initial as *const AlgOps as *mut AlgOps),
        }
    }

    pub(crate) fn install(&self, alg: &'static AlgOps) {
        self.current
            .store(alg as *const AlgOps as *mut AlgOps, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn current(&self) -> &'static AlgOps {
        // Only 'static records are ever installed.
        unsafe { &*self.current.load(Ordering::SeqCst) }
    }

    /// Identity check used by spin loops: has the protocol moved away?
    #[inline]
    pub(crate) fn is_current(&self, alg: &'static AlgOps) -> bool {
        std::ptr::eq(self.current.load(Ordering::SeqCst), alg)
    }

    #[inline]
    pub(crate) fn is_blocked(&self) -> bool {
        self.is_current(&BLOCKER)
    }
}

/// Sentinel installed for the duration of a switch. No transaction begins
/// under it, and every identity-checking spin converts it to a conflict.
pub(crate) static BLOCKER: AlgOps = AlgOps {
    name: "<switch pending>",
    begin: blocker_begin,
    rollback: blocker_rollback,
    on_switch_to: blocker_on_switch_to,
};

fn blocker_begin(_rt: &Runtime, _tx: &mut TxDesc) -> Result<()> {
    Err(Error::Conflict)
}

fn blocker_rollback(_rt: &Runtime, _tx: &mut TxDesc) {}

fn blocker_on_switch_to(_rt: &Runtime) {}

/// Spin until `cond` holds, converting a protocol switch into a conflict.
///
/// The body compiles to plain loads plus a pause hint; waiters re-check the
/// dispatch identity so a switch never strands them.
#[inline]
pub(crate) fn spin_until(
    rt: &Runtime,
    alg: &'static AlgOps,
    mut cond: impl FnMut() -> bool,
) -> Result<()> {
    while !cond() {
        if !rt.dispatch().is_current(alg) {
            return Err(Error::Conflict);
        }
        std::hint::spin_loop();
    }
    Ok(())
}
