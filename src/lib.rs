//! # Weft
//!
//! A word-granular software transactional memory runtime.
//!
//! Application threads execute blocks of ordinary loads and stores as
//! atomic, isolated transactions; conflicts are detected per machine word
//! through a table of versioned ownership records. Each transaction either
//! commits as if it ran at a single instant in the global serial order, or
//! aborts leaving memory untouched and is re-executed.
//!
//! Three commit protocols ship in the registry, selectable at build time
//! and switchable at runtime:
//!
//! - `"CohortsEager"` - group-serialized commit; the last writer of a
//!   cohort may elide its redo log and write in place.
//! - `"PipelineTurbo"` - tickets assigned at begin, commits in ticket
//!   order; the oldest live transaction writes in place.
//! - `"LLTAMD64"` - lazy lock acquisition at commit with check-twice
//!   reads against a global clock.
//!
//! ## Quick start
//!
//! ```ignore
//! use weft::prelude::*;
//!
//! let stm = Weft::builder().algorithm("LLTAMD64").build()?;
//! let mut thread = stm.attach();
//!
//! let counter = std::sync::atomic::AtomicUsize::new(0);
//! let addr = &counter as *const _ as *mut usize;
//!
//! thread.run(|tx| unsafe {
//!     let n = tx.read_word(addr)?;
//!     tx.write_word(addr, n + 1)?;
//!     Ok(())
//! })?;
//! ```
//!
//! The closure passed to [`TxThread::run`] may be executed several times:
//! conflict and capacity aborts roll the transaction back and re-enter it.
//! Body code must therefore be free of side effects other than
//! transactional accesses.

#![warn(missing_docs)]

mod access;
mod runtime;
mod thread;

pub mod prelude;

pub use runtime::{Weft, WeftBuilder};
pub use thread::{flags, TxThread, Txn};

pub use weft_core::{Error, Result};
pub use weft_engine::{Mode, TxLifecycle, TxStats};
