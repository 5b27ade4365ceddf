//! Pipelined total-order committer with an in-place fast path.
//!
//! Every transaction draws a ticket from the global clock at begin and must
//! commit in ticket order; the counter doubles as the commit token, so
//! writeback needs no atomics. An aborted transaction keeps its ticket
//! (that is the fairness guarantee), and the oldest live transaction may
//! flip to in-place writes (turbo), after which it cannot abort.
//!
//! `ts_cache` is the key piece of state: the transaction knows its commit
//! time the moment it begins, and the gap between `ts_cache` and
//! `order - 1` counts the predecessors still outstanding. Every time
//! `last_complete` advances, reads revalidate and close the gap; when it
//! reaches zero with writes buffered, the write set is applied and the
//! transaction goes turbo.

use std::sync::atomic::{fence, Ordering};

use weft_core::word;
use weft_core::{Error, Result};

use crate::algs;
use crate::descriptor::{Mode, TxDesc};
use crate::dispatch::{self, AlgOps};
use crate::runtime::Runtime;

pub(crate) static OPS: AlgOps = AlgOps {
    name: "PipelineTurbo",
    begin,
    rollback,
    on_switch_to,
};

fn begin(rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    tx.hooks.on_begin();

    // Only a fresh transaction draws a ticket; a restart keeps its old one.
    if tx.order() == -1 {
        tx.set_order(rt.clock().advance() as i64);
    }

    tx.ts_cache = rt.last_complete().load_acquire();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
    if tx.ts_cache == tx.order() as u64 - 1 {
        algs::go_turbo(tx, read_turbo, write_turbo, commit_turbo);
    }
    Ok(())
}

/// Revalidate the read set against an advanced `last_complete`, then check
/// for promotion: the oldest transaction with buffered writes applies them
/// and goes turbo.
fn revalidate(rt: &Runtime, tx: &mut TxDesc, finish_cache: u64) -> Result<()> {
    for &idx in tx.reads.as_slice() {
        if rt.orecs().get(idx).load() > tx.ts_cache {
            return Err(Error::Conflict);
        }
    }
    // Still valid at this point in the total order.
    tx.ts_cache = finish_cache;

    if tx.ts_cache == tx.order() as u64 - 1 && !tx.writes.is_empty() {
        let order = tx.order() as u64;
        for e in tx.writes.as_slice() {
            let o = rt.orecs().for_addr(e.addr);
            o.stamp(order);
            fence(Ordering::Release);
            unsafe { word::store_word(e.addr, e.val, e.mask) };
        }
        algs::go_turbo(tx, read_turbo, write_turbo, commit_turbo);
    }
    Ok(())
}

// -- reads --

fn read_ro(rt: &Runtime, tx: &mut TxDesc, addr: usize) -> Result<usize> {
    let tmp = unsafe { word::load_word(addr) };
    fence(Ordering::Acquire); // value before the orec inspection

    let idx = rt.orecs().index_of(addr);
    if rt.orecs().get(idx).load() > tx.ts_cache {
        return Err(Error::Conflict);
    }
    tx.reads.insert(idx)?;

    let finish = rt.last_complete().load_acquire();
    if finish > tx.ts_cache {
        revalidate(rt, tx, finish)?;
    }
    Ok(tmp)
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

fn read_turbo(_rt: &Runtime, _tx: &mut TxDesc, addr: usize) -> Result<usize> {
    Ok(unsafe { word::load_word(addr) })
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

fn write_turbo(rt: &Runtime, tx: &mut TxDesc, addr: usize, val: usize, mask: usize) -> Result<()> {
    let o = rt.orecs().for_addr(addr);
    o.stamp(tx.order() as u64);
    fence(Ordering::Release);
    unsafe { word::store_word(addr, val, mask) };
    Ok(())
}

// -- commits --

fn commit_ro(rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    let order = tx.order() as u64;
    // Even read-only transactions wait their turn: publishing in ticket
    // order is what buys the strong ordering semantics.
    dispatch::spin_until(rt, &OPS, || {
        rt.last_complete().load_acquire() == order - 1
    })?;
    for &idx in tx.reads.as_slice() {
        if rt.orecs().get(idx).load() > tx.ts_cache {
            return Err(Error::Conflict);
        }
    }
    rt.last_complete().store_release(order);

    tx.set_order(-1);
    tx.reads.reset();
    tx.stats.commits_ro += 1;
    tx.hooks.on_commit();
    Ok(())
}

fn commit_rw(rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    let order = tx.order() as u64;
    dispatch::spin_until(rt, &OPS, || {
        rt.last_complete().load_acquire() == order - 1
    })?;
    for &idx in tx.reads.as_slice() {
        if rt.orecs().get(idx).load() > tx.ts_cache {
            return Err(Error::Conflict);
        }
    }
    // Past this point the commit cannot fail: acquisition is by naked
    // stores on a path that always completes.
    for e in tx.writes.as_slice() {
        let o = rt.orecs().for_addr(e.addr);
        o.stamp(order);
        fence(Ordering::Release);
        unsafe { word::store_word(e.addr, e.val, e.mask) };
    }
    rt.last_complete().store_release(order);

    tx.set_order(-1);
    tx.reset_logs();
    tx.stats.commits_rw += 1;
    tx.hooks.on_commit();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
    Ok(())
}

fn commit_turbo(rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    let order = tx.order() as u64;
    fence(Ordering::Release);
    rt.last_complete().store_release(order);

    tx.set_order(-1);
    tx.reset_logs();
    tx.stats.commits_rw += 1;
    tx.hooks.on_commit();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
    Ok(())
}

fn rollback(_rt: &Runtime, tx: &mut TxDesc) {
    if tx.mode == Mode::Turbo {
        tracing::error!(
            thread = tx.slot.id,
            order = tx.order(),
            "turbo-mode transaction asked to roll back"
        );
        panic!("attempted to roll back a turbo-mode transaction");
    }
    // The ticket survives the abort; the restart reuses it.
    tx.reset_logs();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
}

/// Re-seed the ticket regime, while quiesced: clock past every stamped
/// version, `last_complete` caught up to it, and no thread holding a
/// ticket.
fn on_switch_to(rt: &Runtime) {
    let now = rt.clock().raise_to_high_water();
    rt.last_complete().store_relaxed(now);
    rt.threads().reset_orders();
}
