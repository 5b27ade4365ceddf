//! The global clock and its high-water companion.
//!
//! One padded counter serves every protocol: the clock-based committer
//! advances it to date its writes, the pipelined committer draws begin-time
//! tickets from it, and algorithm-switch hooks seed their regime from it.
//! Sampling is a plain load; advancing is an atomic fetch-add; the value
//! never decreases for the life of the process.
//!
//! `high_water` tracks the largest value any regime has stamped into an
//! ownership record, including stamps that did not come from the clock
//! itself (cohort orders). A switch hook raises the clock to the high-water
//! mark before seeding, so no record ever holds a version above the clock
//! its readers sample.

use crate::pad::PadWord;

/// The process-wide timestamp / ticket source.
#[derive(Debug, Default)]
pub struct GlobalClock {
    now: PadWord,
    high_water: PadWord,
}

impl GlobalClock {
    /// A clock starting at zero.
    pub const fn new() -> Self {
        Self {
            now: PadWord::new(0),
            high_water: PadWord::new(0),
        }
    }

    /// Sample the counter without advancing it.
    #[inline]
    pub fn sample(&self) -> u64 {
        self.now.load_acquire()
    }

    /// Advance the counter and return the new value.
    #[inline]
    pub fn advance(&self) -> u64 {
        self.now.fetch_add(1) + 1
    }

    /// Begin-time sample for the clock-based committer.
    ///
    /// On x86-64 this reads the hardware tick counter, which is globally
    /// monotone and far coarser-grained than the shared word, so read-only
    /// transactions never touch shared state at begin. Elsewhere it samples
    /// the counter.
    #[inline]
    pub fn begin_tick(&self) -> u64 {
        #[cfg(target_arch = "x86_64")]
        {
            unsafe { std::arch::x86_64::_rdtsc() & !crate::orec::LOCK_BIT }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            self.sample()
        }
    }

    /// Commit-time tick for the clock-based committer.
    ///
    /// Must exceed every `begin_tick` taken before the committer acquired
    /// its locks. The hardware counter satisfies this by construction; the
    /// fallback advances the shared counter.
    #[inline]
    pub fn commit_tick(&self) -> u64 {
        #[cfg(target_arch = "x86_64")]
        {
            unsafe { std::arch::x86_64::_rdtsc() & !crate::orec::LOCK_BIT }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            self.advance()
        }
    }

    /// Record that a commit stamped `version` into an ownership record.
    #[inline]
    pub fn record_high_water(&self, version: u64) {
        self.high_water.fetch_max(version);
    }

    /// Raise the counter to the high-water mark and return the result.
    ///
    /// Called from switch hooks while the runtime is quiesced.
    pub fn raise_to_high_water(&self) -> u64 {
        let hw = self.high_water.load_acquire();
        self.now.fetch_max(hw);
        self.now.load_acquire()
    }
}
