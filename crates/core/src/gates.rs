//! Cohort admission and drain counters.
//!
//! The cohort committer serializes groups of transactions through six
//! padded words. `started`, `cpending`, and `committed` are monotone
//! tallies whose differences encode the cohort state: admission is open
//! while `cpending == committed`, and a cohort is drained when
//! `cpending == started`. `last_order` remembers the order of the final
//! writer of the previous cohort so exactly one committer per cohort can
//! skip validation. `inplace` flags an in-place (turbo) writer; while it is
//! raised nothing may enter. `gatekeeper` is reserved by the protocol
//! family's gate layout for variants that close admission explicitly; the
//! eager variant gates on the tallies alone.
//!
//! Invariant: `committed <= cpending <= started` at every instant, and no
//! transaction begins while `cpending > committed`.

use crate::pad::PadWord;

/// The cohort gate block.
#[derive(Debug, Default)]
pub struct CohortGates {
    /// Transactions that have begun (read-only commits subtract themselves).
    pub started: PadWord,
    /// Transactions that have reached commit; the post-increment value is a
    /// committer's order.
    pub cpending: PadWord,
    /// Commit slots that have completed, successfully or by abort.
    pub committed: PadWord,
    /// One past the order of the last writer in the previous cohort.
    pub last_order: PadWord,
    /// Reserved admission flag for explicit-gate cohort variants.
    pub gatekeeper: PadWord,
    /// Raised while an in-place writer owns the cohort.
    pub inplace: PadWord,
}

impl CohortGates {
    /// Fresh gates with every counter at zero.
    pub const fn new() -> Self {
        Self {
            started: PadWord::new(0),
            cpending: PadWord::new(0),
            committed: PadWord::new(0),
            last_order: PadWord::new(0),
            gatekeeper: PadWord::new(0),
            inplace: PadWord::new(0),
        }
    }

    /// Seed every tally with `epoch` and clear the flags.
    ///
    /// Run only while the runtime is quiesced, when a switch installs the
    /// cohort committer: orders issued afterwards continue above every
    /// version an earlier regime stamped, keeping validation monotone.
    pub fn seed(&self, epoch: u64) {
        self.started.store_relaxed(epoch);
        self.cpending.store_relaxed(epoch);
        self.committed.store_relaxed(epoch);
        self.last_order.store_relaxed(0);
        self.gatekeeper.store_relaxed(0);
        self.inplace.store_relaxed(0);
    }

    /// `(started, cpending, committed)` snapshot for diagnostics and tests.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.started.load_acquire(),
            self.cpending.load_acquire(),
            self.committed.load_acquire(),
        )
    }
}
