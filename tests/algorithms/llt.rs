//! Clock-based lazy-acquire scenarios.

use std::sync::{Arc, Barrier};
use std::thread;

use weft::Weft;

use crate::common::{increment, WordArena};

fn llt_stm() -> Weft {
    Weft::builder().algorithm("LLTAMD64").build().unwrap()
}

/// Read-only transactions neither abort nor touch the shared counter.
#[test]
fn read_only_quiescence_leaves_clock_alone() {
    const THREADS: usize = 2;
    const TXNS: usize = 10_000;

    let stm = llt_stm();
    let arena = Arc::new(WordArena::new(1));
    arena.poke(0, 12);
    let clock_before = stm.clock();
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
                    assert_eq!(value, 12);
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
    assert_eq!(stm.clock(), clock_before);
}

/// Two writers race for the same orec: the CAS admits one, the other
/// aborts, reverts, retries, and commits. No increment is lost.
#[test]
fn lock_contention_resolves_by_retry() {
    const THREADS: usize = 2;
    const PER_THREAD: usize = 2_000;

    let stm = llt_stm();
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
                th.stats()
            })
        })
        .collect();

    let mut commits = 0;
    for h in handles {
        commits += h.join().unwrap().commits_rw;
    }
    assert_eq!(commits, (THREADS * PER_THREAD) as u64);
    assert_eq!(arena.peek(0), THREADS * PER_THREAD);
    // No orec is left locked behind the last commit.
    assert!(!weft_orec_is_locked(&stm, arena.addr(0)));
}

/// Reads inside a writing transaction see the transaction's own buffered
/// writes, not stale memory.
#[test]
fn read_after_write_serves_from_the_log() {
    let stm = llt_stm();
    let arena = WordArena::new(2);
    let mut th = stm.attach();

    th.run(|tx| unsafe {
        tx.write_word(arena.ptr(0), 5)?;
        assert_eq!(tx.read_word(arena.ptr(0))?, 5);
        let copied = tx.read_word(arena.ptr(0))?;
        tx.write_word(arena.ptr(1), copied + 1)
    })
    .unwrap();

    assert_eq!(arena.peek(0), 5);
    assert_eq!(arena.peek(1), 6);
}

/// A non-retryable error from the body aborts exactly once and publishes
/// nothing.
#[test]
fn user_error_aborts_once() {
    let stm = llt_stm();
    let arena = WordArena::new(1);
    let mut th = stm.attach();

    let mut attempts = 0;
    let result: weft::Result<()> = th.run(|tx| {
        attempts += 1;
        increment(tx, &arena, 0)?;
        Err(weft::Error::IrrevocableUnsupported("body bail-out"))
    });

    assert!(matches!(result, Err(weft::Error::IrrevocableUnsupported(_))));
    assert_eq!(attempts, 1);
    assert_eq!(arena.peek(0), 0);
    assert_eq!(th.stats().aborts, 1);
    assert!(!th.in_transaction());

    // The thread is immediately reusable.
    th.run(|tx| increment(tx, &arena, 0)).unwrap();
    assert_eq!(arena.peek(0), 1);
}

/// Disjoint working sets commit without interference.
#[test]
fn disjoint_writers_do_not_conflict() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 2_000;

    let stm = llt_stm();
    // Spread the words so they cannot share an orec.
    let arena = Arc::new(WordArena::new(64));
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
                    th.run(|tx| increment(tx, &arena, t * 16)).unwrap();
                }
                th.stats()
            })
        })
        .collect();

    for (t, h) in handles.into_iter().enumerate() {
        let stats = h.join().unwrap();
        assert_eq!(stats.aborts, 0, "disjoint writers must not conflict");
        assert_eq!(arena.peek(t * 16), PER_THREAD);
    }
}

fn weft_orec_is_locked(stm: &Weft, addr: usize) -> bool {
    stm.orec_version_of(addr) & (1 << 63) != 0
}
