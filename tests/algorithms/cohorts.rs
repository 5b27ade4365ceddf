//! Cohort committer scenarios.

use std::sync::{Arc, Barrier};
use std::thread;

use weft::Weft;

use crate::common::{increment, WordArena};

fn cohort_stm() -> Weft {
    Weft::builder().algorithm("CohortsEager").build().unwrap()
}

/// Read-only transactions never abort and leave the gates balanced.
#[test]
fn read_only_quiescence() {
    const THREADS: usize = 2;
    const TXNS: usize = 10_000;

    let stm = cohort_stm();
    let arena = Arc::new(WordArena::new(1));
    arena.poke(0, 7);
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
                    assert_eq!(value, 7);
                }
                th.stats()
            })
        })
        .collect();

    for h in handles {
        let stats = h.join().unwrap();
        assert_eq!(stats.aborts, 0);
        assert_eq!(stats.commits_ro, TXNS as u64);
    }

    let (started, cpending, committed) = stm.gate_snapshot();
    assert_eq!(cpending, committed);
    assert_eq!(started, cpending);
}

/// A reader racing a two-step write observes the before or after state,
/// never the intermediate one.
#[test]
fn intermediate_write_is_invisible() {
    const ROUNDS: usize = 2_000;

    let stm = cohort_stm();
    let arena = Arc::new(WordArena::new(1));
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let stm = stm.clone();
        let arena = Arc::clone(&arena);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut th = stm.attach();
            barrier.wait();
            for _ in 0..ROUNDS {
                th.run(|tx| unsafe {
                    tx.write_word(arena.ptr(0), 1)?;
                    tx.write_word(arena.ptr(0), 2)
                })
                .unwrap();
                th.run(|tx| unsafe { tx.write_word(arena.ptr(0), 0) })
                    .unwrap();
            }
        })
    };

    let reader = {
        let stm = stm.clone();
        let arena = Arc::clone(&arena);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut th = stm.attach();
            barrier.wait();
            for _ in 0..ROUNDS {
                let seen = th
                    .run(|tx| unsafe { tx.read_word(arena.ptr(0)) })
                    .unwrap();
                assert!(seen == 0 || seen == 2, "observed intermediate value {seen}");
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}

/// Contended increments serialize: no update is lost.
#[test]
fn concurrent_increments_serialize() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 1_000;

    let stm = cohort_stm();
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
    let (_, cpending, committed) = stm.gate_snapshot();
    assert_eq!(cpending, committed);
}

/// With the in-place opt-in, a sole writer promotes on its first write and
/// commits through the turbo path, round after round.
#[test]
fn sole_writer_promotes_in_place() {
    const ROUNDS: usize = 500;

    let stm = Weft::builder()
        .algorithm("CohortsEager")
        .cohort_inplace_writes(true)
        .build()
        .unwrap();
    let arena = WordArena::new(2);
    let mut th = stm.attach();

    for _ in 0..ROUNDS {
        th.run(|tx| {
            increment(tx, &arena, 0)?;
            increment(tx, &arena, 1)
        })
        .unwrap();
        assert!(!th.in_transaction());
    }

    assert_eq!(arena.peek(0), ROUNDS);
    assert_eq!(arena.peek(1), ROUNDS);
    // Every commit went through the writing path and the gate closed again.
    assert_eq!(th.stats().commits_rw, ROUNDS as u64);
    assert_eq!(stm.gate_snapshot().1, stm.gate_snapshot().2);
}

/// Disjoint writers share cohorts without conflicting.
#[test]
fn disjoint_writers_do_not_abort_each_other() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 1_000;

    let stm = cohort_stm();
    let arena = Arc::new(WordArena::new(THREADS));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let stm = stm.clone();
            let arena = Arc::clone(&arena);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut th = stm.attach();
                barrier.wait();
                for _ in 0..PER_THREAD {
                    th.run(|tx| increment(tx, &arena, t)).unwrap();
                }
                th.stats()
            })
        })
        .collect();

    for (t, h) in handles.into_iter().enumerate() {
        let stats = h.join().unwrap();
        assert_eq!(stats.commits_rw, PER_THREAD as u64);
        assert_eq!(arena.peek(t), PER_THREAD);
    }
}
