//! Clock-based lazy-acquire committer.
//!
//! Writers buffer everything in the redo log and acquire orec locks only at
//! commit; readers validate with a check-twice scheme against a clock value
//! sampled at begin. On x86-64 the clock is the hardware tick counter, so
//! read-only transactions touch no shared word at all; elsewhere the shared
//! counter stands in, and commits advance it.
//!
//! There is no in-place mode and no commit ordering beyond the locks
//! themselves: acquisition failure and validation failure both abort, and
//! rollback reverts any partially acquired orecs from their parked prior
//! versions.

use std::sync::atomic::{fence, Ordering};

use weft_core::word;
use weft_core::{Error, Result};

use crate::algs;
use crate::descriptor::TxDesc;
use crate::dispatch::AlgOps;
use crate::runtime::Runtime;

pub(crate) static OPS: AlgOps = AlgOps {
    name: "LLTAMD64",
    begin,
    rollback,
    on_switch_to,
};

fn begin(rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    tx.hooks.on_begin();
    tx.start_time = rt.clock().begin_tick();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
    Ok(())
}

// -- reads --

/// Check twice: orec, value, orec again. The read is consistent iff the
/// orec never changed and is no newer than our begin time; a lock token
/// always fails the comparison.
fn read_ro(rt: &Runtime, tx: &mut TxDesc, addr: usize) -> Result<usize> {
    let idx = rt.orecs().index_of(addr);
    let o = rt.orecs().get(idx);

    let ivt = o.load();
    let tmp = unsafe { word::load_word(addr) };
    fence(Ordering::Acquire); // value before the confirming orec read
    let ivt2 = o.load_relaxed();

    if ivt == ivt2 && ivt <= tx.start_time {
        tx.reads.insert(idx)?;
        return Ok(tmp);
    }
    Err(Error::Conflict)
}

fn read_rw(rt: &Runtime, tx: &mut TxDesc, addr: usize) -> Result<usize> {
    // Read-after-write: expect to miss, serve fully covered hits directly.
    let pending = match tx.writes.lookup(addr) {
        Some((val, mask)) if mask == word::FULL_MASK => return Ok(val),
        other => other,
    };

    let tmp = read_ro(rt, tx, addr)?;
    Ok(match pending {
        Some((val, mask)) => word::merge(tmp, val, mask),
        None => tmp,
    })
}

// -- writes --

fn write_ro(_rt: &Runtime, tx: &mut TxDesc, addr: usize, val: usize, mask: usize) -> Result<()> {
    tx.writes.insert(addr, val, mask)?;
    algs::on_first_write(tx, read_rw, write_rw, commit_rw);
    Ok(())
}

fn write_rw(_rt: &Runtime, tx: &mut TxDesc, addr: usize, val: usize, mask: usize) -> Result<()> {
    tx.writes.insert(addr, val, mask)
}

// -- commits --

fn commit_ro(_rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    tx.reads.reset();
    tx.stats.commits_ro += 1;
    tx.hooks.on_commit();
    Ok(())
}

fn commit_rw(rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    let token = tx.my_lock;

    // Acquire every write-set orec, unless we already hold it.
    for e in tx.writes.as_slice() {
        let idx = rt.orecs().index_of(e.addr);
        let o = rt.orecs().get(idx);
        let ivt = o.load();
        if ivt <= tx.start_time {
            if !o.try_lock(ivt, token) {
                return Err(Error::Conflict);
            }
            tx.locks.insert(idx);
        } else if ivt != token {
            return Err(Error::Conflict);
        }
    }

    // Date the writes after acquisition so no reader between our locks and
    // this tick can have missed them.
    let end_time = rt.clock().commit_tick();

    // Validate: every read is still at its old version, or is ours.
    for &idx in tx.reads.as_slice() {
        let ivt = rt.orecs().get(idx).load();
        if ivt > tx.start_time && ivt != token {
            return Err(Error::Conflict);
        }
    }

    unsafe { tx.writes.writeback() };

    // Publish: writes before any release.
    fence(Ordering::Release);
    for &idx in tx.locks.as_slice() {
        rt.orecs().get(idx).release(end_time);
    }
    rt.clock().record_high_water(end_time);

    tx.reset_logs();
    tx.stats.commits_rw += 1;
    tx.hooks.on_commit();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
    Ok(())
}

fn rollback(rt: &Runtime, tx: &mut TxDesc) {
    // Restore any partially acquired orecs to their pre-lock versions.
    for &idx in tx.locks.as_slice() {
        rt.orecs().get(idx).revert();
    }
    tx.reset_logs();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
}

/// Keep the begin-time samples ahead of every stamped version when this
/// regime takes over from one that stamped orecs outside the clock.
fn on_switch_to(rt: &Runtime) {
    rt.clock().raise_to_high_water();
}
