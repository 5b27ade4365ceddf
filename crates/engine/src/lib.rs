//! # weft-engine
//!
//! The concurrency-control engine: per-thread transaction descriptors, the
//! redo/undo/read logs they carry, the commit protocols, and the layer that
//! dispatches between protocols and switches them at runtime.
//!
//! The [`Runtime`] object owns every piece of shared state (the orec table,
//! the clock, the cohort gates, the last-complete marker, the thread
//! registry) so nothing in this crate is a process-level global. Each
//! application thread attaches once, receives a [`TxDesc`], and drives it
//! through `begin_txn` / the descriptor's read-write-commit slots /
//! `rollback_txn`.
//!
//! Three protocols are registered: a cohort-serialized eager committer with
//! an in-place fast path, a pipelined total-order committer whose oldest
//! transaction writes in place, and a lazy-acquire committer versioned by
//! the global clock.

pub mod algs;
pub mod descriptor;
pub mod dispatch;
pub mod hooks;
pub mod logs;
pub mod runtime;

pub use descriptor::{Mode, ThreadSlot, TxDesc, TxStats};
pub use dispatch::AlgOps;
pub use hooks::TxLifecycle;
pub use runtime::{Config, Runtime};
