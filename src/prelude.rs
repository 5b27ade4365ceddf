//! Convenience re-exports for embedders.

pub use crate::{flags, Error, Mode, Result, TxThread, Txn, Weft, WeftBuilder};
