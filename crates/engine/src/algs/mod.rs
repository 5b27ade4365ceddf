//! Commit protocol implementations and their registry.
//!
//! Each protocol is a set of free functions bundled into a static
//! [`AlgOps`] record plus the mode-specialized read/write/commit slots its
//! begin installs. The registry maps stable names to records; it is a
//! static table, populated at link time and consulted at construction and
//! switch time.

pub mod cohorts_eager;
pub mod llt;
pub mod pipeline_turbo;

use crate::descriptor::{Mode, TxDesc};
use crate::dispatch::{AlgOps, CommitFn, ReadFn, WriteFn};

static REGISTRY: [&AlgOps; 3] = [
    &cohorts_eager::OPS,
    &pipeline_turbo::OPS,
    &llt::OPS,
];

/// Find a protocol by its stable name.
pub fn lookup(name: &str) -> Option<&'static AlgOps> {
    REGISTRY.iter().copied().find(|alg| alg.name == name)
}

/// Stable names of every registered protocol.
pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|alg| alg.name)
}

/// The protocol used when the embedder does not pick one.
pub fn default_ops() -> &'static AlgOps {
    &llt::OPS
}

// Mode transitions shared by the protocols. The slots are swapped as a
// unit so a descriptor is never observed mid-transition.

/// First write of a read-only transaction: activate write logging.
#[inline]
pub(crate) fn on_first_write(tx: &mut TxDesc, read: ReadFn, write: WriteFn, commit: CommitFn) {
    tx.mode = Mode::ReadWrite;
    tx.install(read, write, commit);
}

/// Promote to in-place execution. Terminal until commit.
#[inline]
pub(crate) fn go_turbo(tx: &mut TxDesc, read: ReadFn, write: WriteFn, commit: CommitFn) {
    tx.mode = Mode::Turbo;
    tx.install(read, write, commit);
}

/// Return a descriptor to the read-only slots after commit or rollback.
#[inline]
pub(crate) fn reset_to_ro(tx: &mut TxDesc, read: ReadFn, write: WriteFn, commit: CommitFn) {
    tx.mode = Mode::ReadOnly;
    tx.install(read, write, commit);
}
