//! The runtime handle and its builder.

use std::sync::Arc;

use weft_core::Result;
use weft_engine::{algs, Config, Runtime, TxLifecycle};

use crate::thread::TxThread;

/// Handle to a transactional memory runtime.
///
/// Cheap to clone; all clones share the same orec table, clock, and
/// registry. Threads participate by calling [`Weft::attach`] once and
/// keeping the returned [`TxThread`] for their lifetime.
#[derive(Clone, Debug)]
pub struct Weft {
    rt: Arc<Runtime>,
}

impl Weft {
    /// A runtime with default tunables and the default protocol.
    pub fn new() -> Self {
        Self {
            rt: Arc::new(Runtime::new(Config::default(), algs::default_ops(), None)),
        }
    }

    /// Start configuring a runtime.
    pub fn builder() -> WeftBuilder {
        WeftBuilder::default()
    }

    /// Attach the calling thread, allocating its descriptor and lock token.
    pub fn attach(&self) -> TxThread {
        TxThread::attach(Arc::clone(&self.rt))
    }

    /// Quiesce in-flight transactions and install the named protocol.
    pub fn switch_algorithm(&self, name: &str) -> Result<()> {
        self.rt.switch_to(name)
    }

    /// Stable name of the active protocol.
    pub fn algorithm(&self) -> &'static str {
        self.rt.algorithm_name()
    }

    /// Stable names of every registered protocol.
    pub fn algorithms() -> Vec<&'static str> {
        algs::names().collect()
    }

    // -- diagnostics --

    /// The highest completed commit ticket.
    pub fn last_complete(&self) -> u64 {
        self.rt.last_complete_ticket()
    }

    /// `(started, cpending, committed)` snapshot of the cohort gates.
    pub fn gate_snapshot(&self) -> (u64, u64, u64) {
        self.rt.gate_snapshot()
    }

    /// Current global clock value.
    pub fn clock(&self) -> u64 {
        self.rt.clock_now()
    }

    /// Version (or lock token) of the ownership record covering `addr`.
    pub fn orec_version_of(&self, addr: usize) -> u64 {
        self.rt.orec_version_of(addr)
    }
}

impl Default for Weft {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a [`Weft`] runtime.
#[derive(Default)]
pub struct WeftBuilder {
    config: Config,
    algorithm: Option<String>,
    hooks: Option<Arc<dyn TxLifecycle>>,
}

impl WeftBuilder {
    /// Number of ownership records (rounded up to a power of two).
    pub fn orec_entries(mut self, entries: usize) -> Self {
        self.config.orec_entries = entries;
        self
    }

    /// Bound on logged reads per transaction.
    pub fn read_set_capacity(mut self, cap: usize) -> Self {
        self.config.read_set_capacity = cap;
        self
    }

    /// Bound on buffered writes per transaction.
    pub fn write_set_capacity(mut self, cap: usize) -> Self {
        self.config.write_set_capacity = cap;
        self
    }

    /// Opt in to the cohort committer's write-time in-place promotion.
    pub fn cohort_inplace_writes(mut self, enabled: bool) -> Self {
        self.config.cohort_inplace_writes = enabled;
        self
    }

    /// Initial protocol, by stable name.
    pub fn algorithm(mut self, name: impl Into<String>) -> Self {
        self.algorithm = Some(name.into());
        self
    }

    /// Install lifecycle callbacks (epoch allocator, user hooks).
    pub fn lifecycle(mut self, hooks: Arc<dyn TxLifecycle>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Build the runtime. Fails only on an unknown algorithm name.
    pub fn build(self) -> Result<Weft> {
        let alg = match &self.algorithm {
            Some(name) => algs::lookup(name)
                .ok_or_else(|| weft_core::Error::UnknownAlgorithm(name.clone()))?,
            None => algs::default_ops(),
        };
        Ok(Weft {
            rt: Arc::new(Runtime::new(self.config, alg, self.hooks)),
        })
    }
}

impl std::fmt::Debug for WeftBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeftBuilder")
            .field("config", &self.config)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
