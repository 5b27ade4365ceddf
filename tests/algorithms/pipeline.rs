//! Pipelined committer scenarios.

use std::sync::{Arc, Barrier};
use std::thread;

use weft::Weft;

use crate::common::{increment, WordArena};

fn pipeline_stm() -> Weft {
    Weft::builder().algorithm("PipelineTurbo").build().unwrap()
}

/// Read-only transactions never abort, and every ticket publishes: the
/// last-complete marker advances once per transaction.
#[test]
fn read_only_quiescence_publishes_every_ticket() {
    const THREADS: usize = 2;
    const TXNS: usize = 10_000;

    let stm = pipeline_stm();
    let arena = Arc::new(WordArena::new(1));
    arena.poke(0, 3);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let stm = stm.clone();
            let arena = Arc::clone(&arena);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut th = stm.attach();
                barrier.wait();
                for _ in 0..TXNS {
                    let value = th
                        .run(|tx| unsafe { tx.read_word(arena.ptr(0)) })
                        .unwrap();
                    assert_eq!(value, 3);
                }
                th.stats()
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap().aborts, 0);
    }
    assert_eq!(stm.last_complete(), (THREADS * TXNS) as u64);
    assert_eq!(stm.last_complete(), stm.clock());
}

/// Tickets drawn by concurrent writers publish in strict order and no
/// increment is lost.
#[test]
fn ticket_order_and_no_lost_writes() {
    const THREADS: usize = 3;

    let stm = pipeline_stm();
    let arena = Arc::new(WordArena::new(1));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let stm = stm.clone();
            let arena = Arc::clone(&arena);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut th = stm.attach();
                barrier.wait();
                th.run(|tx| increment(tx, &arena, 0)).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(arena.peek(0), THREADS);
    assert_eq!(stm.last_complete(), THREADS as u64);
}

/// A transaction running alone is the oldest by construction and begins
/// in turbo mode; its writes land in place immediately.
#[test]
fn lone_transaction_runs_turbo() {
    let stm = pipeline_stm();
    let arena = WordArena::new(1);
    let mut th = stm.attach();

    th.begin(0);
    assert!(th.is_turbo());
    unsafe {
        th.write_word_masked(arena.ptr(0), 41, usize::MAX).unwrap();
    }
    assert_eq!(arena.peek(0), 41);
    th.commit().unwrap();

    assert_eq!(th.stats().commits_rw, 1);
    assert_eq!(stm.last_complete(), 1);
}

/// Sustained contended increments: the total order loses nothing.
#[test]
fn concurrent_increments_serialize() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 1_000;

    let stm = pipeline_stm();
    let arena = Arc::new(WordArena::new(1));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let stm = stm.clone();
            let arena = Arc::clone(&arena);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut th = stm.attach();
                barrier.wait();
                for _ in 0..PER_THREAD {
                    th.run(|tx| increment(tx, &arena, 0)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(arena.peek(0), THREADS * PER_THREAD);
    // Every transaction drew one ticket and published it.
    assert_eq!(stm.last_complete(), stm.clock());
}

/// An aborted transaction keeps its ticket across the restart, and a
/// detaching thread discharges a held ticket so younger transactions are
/// never stranded behind it.
#[test]
fn rollback_keeps_ticket_and_detach_discharges_it() {
    let stm = pipeline_stm();
    let arena = WordArena::new(1);

    let mut oldest = stm.attach();
    oldest.begin(0); // ticket 1, turbo

    let mut middle = stm.attach();
    middle.begin(0); // ticket 2, behind the turbo transaction
    assert!(!middle.is_turbo());
    unsafe {
        middle
            .write_word_masked(arena.ptr(0), 9, usize::MAX)
            .unwrap();
    }
    middle.rollback();
    assert_eq!(arena.peek(0), 0, "buffered write must not publish");

    oldest.commit().unwrap();
    assert_eq!(stm.last_complete(), 1);

    // Detach with ticket 2 still held: the drop publishes it through an
    // empty transaction instead of abandoning it.
    drop(middle);
    assert_eq!(stm.last_complete(), 2);

    let mut young = stm.attach();
    young.run(|tx| increment(tx, &arena, 0)).unwrap();
    assert_eq!(arena.peek(0), 1);
    assert_eq!(stm.last_complete(), 3);
}
