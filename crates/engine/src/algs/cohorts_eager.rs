//! Cohort-serialized eager committer with an in-place fast path.
//!
//! Transactions run in cohorts: a group begins together, stops admitting
//! entrants once any member reaches commit, then commits in arrival order
//! at the commit gate. Reads log their orec and nothing else: the commit
//! barrier supplies all ordering, so adding per-read validation here would
//! change the protocol, not speed it up. Writers buffer in the redo log
//! unless promoted: the sole outstanding writer of a drained cohort may
//! raise `inplace`, stamp orecs, and write memory directly (turbo), after
//! which it cannot abort.
//!
//! Commit waits deliberately do not re-check the dispatch identity: cohort
//! members never abort before reaching commit and every commit slot
//! publishes completion even on a failed validation, so the waits are
//! finite and a switch simply drains the cohort. Only the admission gate
//! self-aborts on a switch.

use std::sync::atomic::{fence, Ordering};

use weft_core::word;
use weft_core::{Error, Result};

use crate::algs;
use crate::descriptor::{Mode, TxDesc};
use crate::dispatch::AlgOps;
use crate::runtime::Runtime;

pub(crate) static OPS: AlgOps = AlgOps {
    name: "CohortsEager",
    begin,
    rollback,
    on_switch_to,
};

fn begin(rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    let gates = rt.gates();
    loop {
        // Wait until the previous cohort has fully committed.
        while gates.cpending.load_acquire() != gates.committed.load_acquire() {
            if !rt.dispatch().is_current(&OPS) {
                return Err(Error::Conflict);
            }
            std::hint::spin_loop();
        }

        gates.started.fetch_add(1);

        // Double check: a member may have reached commit, or an in-place
        // writer may own the cohort, between the gate check and our entry.
        if gates.cpending.load_acquire() > gates.committed.load_acquire()
            || gates.inplace.load_acquire() == 1
        {
            gates.started.fetch_sub(1);
            continue;
        }
        break;
    }

    if !rt.dispatch().is_current(&OPS) {
        // A switch landed while we entered; withdraw so the quiesce sees a
        // balanced cohort.
        gates.started.fetch_sub(1);
        return Err(Error::Conflict);
    }

    tx.hooks.on_begin();
    tx.ts_cache = rt.last_complete().load_acquire();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
    Ok(())
}

// -- reads --

fn read_ro(rt: &Runtime, tx: &mut TxDesc, addr: usize) -> Result<usize> {
    let idx = rt.orecs().index_of(addr);
    tx.reads.insert(idx)?;
    Ok(unsafe { word::load_word(addr) })
}

fn read_rw(rt: &Runtime, tx: &mut TxDesc, addr: usize) -> Result<usize> {
    // Serve read-after-write from the redo log first.
    let pending = match tx.writes.lookup(addr) {
        Some((val, mask)) if mask == word::FULL_MASK => return Ok(val),
        other => other,
    };
    let idx = rt.orecs().index_of(addr);
    tx.reads.insert(idx)?;
    let tmp = unsafe { word::load_word(addr) };
    Ok(match pending {
        Some((val, mask)) => word::merge(tmp, val, mask),
        None => tmp,
    })
}

fn read_turbo(_rt: &Runtime, _tx: &mut TxDesc, addr: usize) -> Result<usize> {
    // In-place execution: memory is already this transaction's view.
    Ok(unsafe { word::load_word(addr) })
}

// -- writes --

fn write_ro(rt: &Runtime, tx: &mut TxDesc, addr: usize, val: usize, mask: usize) -> Result<()> {
    algs::on_first_write(tx, read_rw, write_rw, commit_rw);
    write_rw(rt, tx, addr, val, mask)
}

fn write_rw(rt: &Runtime, tx: &mut TxDesc, addr: usize, val: usize, mask: usize) -> Result<()> {
    if tx.writes.is_empty() && rt.config().cohort_inplace_writes {
        let gates = rt.gates();
        // If everyone else in the cohort is already parked at commit, this
        // writer can publish in place and skip writeback entirely.
        if gates.cpending.load_acquire() + 1 == gates.started.load_acquire() {
            gates.inplace.store_release(1);
            // The flag is visible before the recheck; a racing entrant has
            // either bumped started (recheck fails) or will see inplace and
            // withdraw at its own double check.
            if gates.cpending.load_acquire() + 1 == gates.started.load_acquire() {
                tx.undo.record(addr, unsafe { word::load_word(addr) })?;
                let o = rt.orecs().for_addr(addr);
                o.stamp(gates.started.load_acquire());
                fence(Ordering::Release);
                unsafe { word::store_word(addr, val, mask) };
                algs::go_turbo(tx, read_turbo, write_turbo, commit_turbo);
                return Ok(());
            }
            gates.inplace.store_release(0);
        }
    }

    tx.writes.insert(addr, val, mask)
}

fn write_turbo(rt: &Runtime, tx: &mut TxDesc, addr: usize, val: usize, mask: usize) -> Result<()> {
    tx.undo.record(addr, unsafe { word::load_word(addr) })?;
    let o = rt.orecs().for_addr(addr);
    o.stamp(rt.gates().started.load_acquire());
    fence(Ordering::Release);
    unsafe { word::store_word(addr, val, mask) };
    Ok(())
}

// -- commits --

fn commit_ro(rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    rt.gates().started.fetch_sub(1);
    tx.reads.reset();
    tx.stats.commits_ro += 1;
    tx.hooks.on_commit();
    Ok(())
}

fn commit_rw(rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    let gates = rt.gates();
    let last_complete = rt.last_complete();

    // Take a commit slot; its post-increment value is our order.
    let order = gates.cpending.fetch_add(1) + 1;
    tx.set_order(order as i64);

    // Wait for our turn at the commit gate.
    while last_complete.load_acquire() != order - 1 {
        std::hint::spin_loop();
    }

    // Wait until the cohort closes and every member reaches commit.
    while gates.cpending.load_acquire() < gates.started.load_acquire() {
        std::hint::spin_loop();
    }

    // The first committer of a cohort inherits a consistent snapshot and
    // skips validation, unless an in-place writer ran.
    if gates.inplace.load_acquire() == 1 || order != gates.last_order.load_relaxed() {
        for &idx in tx.reads.as_slice() {
            if rt.orecs().get(idx).load() > tx.ts_cache {
                // Our slot must still complete or the cohort behind us
                // waits forever.
                gates.committed.fetch_add(1);
                last_complete.store_release(order);
                return Err(Error::Conflict);
            }
        }
    }

    for e in tx.writes.as_slice() {
        let o = rt.orecs().for_addr(e.addr);
        o.stamp(order);
        fence(Ordering::Release);
        unsafe { word::store_word(e.addr, e.val, e.mask) };
    }

    gates.committed.fetch_add(1);
    gates.last_order.store_relaxed(gates.started.load_acquire() + 1);
    rt.clock().record_high_water(order);
    last_complete.store_release(order);

    tx.set_order(-1);
    tx.reset_logs();
    tx.stats.commits_rw += 1;
    tx.hooks.on_commit();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
    Ok(())
}

fn commit_turbo(rt: &Runtime, tx: &mut TxDesc) -> Result<()> {
    let gates = rt.gates();

    // Our writes are already in memory; take a slot and wait our turn.
    let order = gates.cpending.fetch_add(1) + 1;
    tx.set_order(order as i64);

    while rt.last_complete().load_acquire() != order - 1 {
        std::hint::spin_loop();
    }

    rt.clock().record_high_water(gates.started.load_acquire());
    gates.inplace.store_release(0);
    rt.last_complete().store_release(order);
    gates.committed.fetch_add(1);

    tx.set_order(-1);
    tx.reset_logs();
    tx.stats.commits_rw += 1;
    tx.hooks.on_commit();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
    Ok(())
}

fn rollback(rt: &Runtime, tx: &mut TxDesc) {
    // In-place writes are reverted from the undo log; buffered writes were
    // never published.
    unsafe { tx.undo.replay() };
    if tx.mode == Mode::Turbo {
        rt.gates().inplace.store_release(0);
    }

    if tx.order() == -1 {
        // Aborted before taking a commit slot: withdraw from the cohort so
        // the drain arithmetic stays balanced.
        rt.gates().started.fetch_sub(1);
    } else {
        // A failed validation already completed our slot.
        tx.set_order(-1);
    }

    tx.reset_logs();
    algs::reset_to_ro(tx, read_ro, write_ro, commit_ro);
}

/// Seed the cohort regime from the (raised) clock, while quiesced.
///
/// Orders issued afterwards continue above every version any earlier
/// regime stamped into an orec, so commit-time validation stays monotone.
fn on_switch_to(rt: &Runtime) {
    let epoch = rt.clock().raise_to_high_water();
    rt.gates().seed(epoch);
    rt.last_complete().store_relaxed(epoch);
}
