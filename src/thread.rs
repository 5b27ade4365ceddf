//! Per-thread transaction handles and the retry driver.

use std::sync::Arc;

use weft_core::{word, Error, Result};
use weft_engine::{Runtime, TxDesc, TxStats};

/// Bits returned by [`TxThread::begin`].
pub mod flags {
    /// The caller should execute the instrumented code path.
    pub const RUN_INSTRUMENTED: u32 = 0x01;
}

/// A thread's handle into the runtime.
///
/// Obtained from [`crate::Weft::attach`]; owns the thread's descriptor and
/// detaches it on drop. Not `Sync`: a handle belongs to exactly one thread.
pub struct TxThread {
    rt: Arc<Runtime>,
    desc: TxDesc,
}

impl TxThread {
    pub(crate) fn attach(rt: Arc<Runtime>) -> Self {
        let desc = rt.attach_thread();
        Self { rt, desc }
    }

    /// Begin a transaction, or deepen a flat-nested one.
    ///
    /// Only the outermost begin runs the active protocol; nested begins
    /// just bump the depth. Returns `extra` with
    /// [`flags::RUN_INSTRUMENTED`] set.
    pub fn begin(&mut self, extra: u32) -> u32 {
        if self.desc.nesting_depth == 0 {
            self.rt.begin_txn(&mut self.desc);
        }
        self.desc.nesting_depth += 1;
        extra | flags::RUN_INSTRUMENTED
    }

    /// Commit the current nesting level; the outermost level runs the
    /// protocol and may conflict-abort, in which case the caller must
    /// [`TxThread::rollback`] and re-execute.
    pub fn commit(&mut self) -> Result<()> {
        debug_assert!(self.desc.nesting_depth > 0, "commit without begin");
        if self.desc.nesting_depth > 1 {
            self.desc.nesting_depth -= 1;
            return Ok(());
        }
        self.rt.commit_txn(&mut self.desc)?;
        self.desc.nesting_depth = 0;
        Ok(())
    }

    /// Abort the transaction, undoing its effects and resetting the
    /// descriptor. Control is expected to return to just after the
    /// outermost begin (the retry driver does this for you).
    pub fn rollback(&mut self) {
        self.rt.rollback_txn(&mut self.desc);
        self.desc.nesting_depth = 0;
    }

    /// Whether a transaction is live on this thread.
    pub fn in_transaction(&self) -> bool {
        self.desc.nesting_depth > 0
    }

    /// Whether the current transaction is irrevocable. None of the
    /// registered protocols support irrevocability, so this is `false`.
    pub fn is_irrevocable(&self) -> bool {
        false
    }

    /// Request irrevocable execution. Refused by every registered protocol.
    pub fn become_irrevocable(&mut self, _requested_serial: bool) -> Result<()> {
        Err(Error::IrrevocableUnsupported(self.desc.algorithm()))
    }

    /// This thread's commit and abort tallies.
    pub fn stats(&self) -> TxStats {
        self.desc.stats
    }

    /// Whether the live transaction has been promoted to in-place writes.
    pub fn is_turbo(&self) -> bool {
        self.desc.is_turbo()
    }

    /// Execution mode of the live transaction.
    pub fn mode(&self) -> crate::Mode {
        self.desc.mode()
    }

    /// Detach from the runtime, releasing the descriptor. Equivalent to
    /// dropping the handle; any live transaction is resolved first.
    pub fn detach(self) {}

    /// Execute `body` as a transaction, retrying on conflict.
    ///
    /// The closure runs between begin and commit and may be executed many
    /// times; it must perform no side effects other than transactional
    /// accesses. A non-retryable error from the body aborts once and
    /// surfaces to the caller.
    pub fn run<T>(&mut self, mut body: impl FnMut(&mut Txn<'_>) -> Result<T>) -> Result<T> {
        loop {
            self.begin(0);
            let outcome = body(&mut Txn { th: self });
            match outcome {
                Ok(value) => match self.commit() {
                    Ok(()) => return Ok(value),
                    Err(err) if err.is_retryable() => self.rollback(),
                    Err(err) => {
                        self.rollback();
                        self.discharge_ticket();
                        return Err(err);
                    }
                },
                Err(err) if err.is_retryable() => self.rollback(),
                Err(err) => {
                    self.rollback();
                    self.discharge_ticket();
                    return Err(err);
                }
            }
        }
    }

    // -- word-granular accesses, dispatched through the descriptor slots --

    /// Transactional load of an aligned word. May conflict-abort.
    ///
    /// # Safety
    ///
    /// `addr` must be aligned and point to memory that stays valid for the
    /// transaction; concurrent access must go through the runtime.
    pub unsafe fn read_word(&mut self, addr: *const usize) -> Result<usize> {
        self.raw_read(addr as usize)
    }

    /// Transactional store of an aligned word under a byte mask expanded
    /// to a word mask. May conflict-abort (never in turbo mode).
    ///
    /// # Safety
    ///
    /// As [`TxThread::read_word`].
    pub unsafe fn write_word_masked(
        &mut self,
        addr: *mut usize,
        val: usize,
        mask: usize,
    ) -> Result<()> {
        self.raw_write(addr as usize, val, mask)
    }

    pub(crate) fn raw_read(&mut self, addr: usize) -> Result<usize> {
        debug_assert_eq!(word::word_offset(addr), 0, "unaligned transactional read");
        self.desc.read(&self.rt, addr)
    }

    pub(crate) fn raw_write(&mut self, addr: usize, val: usize, mask: usize) -> Result<()> {
        debug_assert_eq!(word::word_offset(addr), 0, "unaligned transactional write");
        self.desc.write(&self.rt, addr, val, mask)
    }

    /// Publish a ticket this thread still holds by running an empty
    /// transaction under it. Younger tickets would otherwise wait forever
    /// behind an abandoned one.
    fn discharge_ticket(&mut self) {
        while self.desc.order() != -1 {
            self.begin(0);
            if self.commit().is_err() {
                self.rollback();
            }
        }
    }
}

impl Drop for TxThread {
    fn drop(&mut self) {
        if self.desc.nesting_depth > 0 {
            if self.desc.is_turbo() {
                // A turbo transaction has already written memory in place
                // and cannot be undone; completing it is the only sound
                // exit.
                let _ = self.rt.commit_txn(&mut self.desc);
            } else {
                self.rt.rollback_txn(&mut self.desc);
            }
            self.desc.nesting_depth = 0;
        }
        self.discharge_ticket();
        self.rt.detach_thread(&self.desc);
    }
}

impl std::fmt::Debug for TxThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxThread").field("desc", &self.desc).finish()
    }
}

/// The transactional view handed to [`TxThread::run`] closures.
///
/// Carries the width family of reads and writes plus the bulk helpers;
/// every access funnels into the word-granular protocol operations.
pub struct Txn<'a> {
    pub(crate) th: &'a mut TxThread,
}

impl Txn<'_> {
    /// Transactional load of an aligned word.
    ///
    /// # Safety
    ///
    /// See [`TxThread::read_word`].
    pub unsafe fn read_word(&mut self, addr: *const usize) -> Result<usize> {
        self.th.raw_read(addr as usize)
    }

    /// Transactional store of an aligned word.
    ///
    /// # Safety
    ///
    /// See [`TxThread::write_word_masked`].
    pub unsafe fn write_word(&mut self, addr: *mut usize, val: usize) -> Result<()> {
        self.th.raw_write(addr as usize, val, word::FULL_MASK)
    }
}
