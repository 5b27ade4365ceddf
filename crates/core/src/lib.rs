//! # weft-core
//!
//! The shared metadata substrate of the weft transactional memory runtime.
//!
//! Everything in this crate is consulted by every commit protocol:
//! - [`orec`] - the table of versioned ownership records protecting user memory
//! - [`clock`] - the global timestamp / ticket counter and last-complete marker
//! - [`gates`] - the cohort admission and drain counters
//! - [`pad`] - cache-line isolation for the words above
//! - [`word`] - word/byte-mask arithmetic shared by the logs and the access layer
//!
//! The hot-path contract is that every structure here is reachable through a
//! stable address and manipulated with a single load, store, fetch-add, or
//! compare-and-swap. Higher layers own all policy.

#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod gates;
pub mod orec;
pub mod pad;
pub mod word;

pub use clock::GlobalClock;
pub use error::{Error, Result};
pub use gates::CohortGates;
pub use orec::{Orec, OrecTable};
pub use pad::{CacheAligned, PadWord, CACHE_LINE_BYTES};
