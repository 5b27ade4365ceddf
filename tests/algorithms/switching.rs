//! Algorithm switch scenarios.

use std::sync::{Arc, Barrier};
use std::thread;

use weft::Weft;

use crate::common::{increment, WordArena};

/// The registry resolves every stable name and rejects unknown ones.
#[test]
fn registry_names() {
    let names = Weft::algorithms();
    for expected in ["CohortsEager", "PipelineTurbo", "LLTAMD64"] {
        assert!(names.contains(&expected), "missing {expected}");
    }

    let stm = Weft::new();
    assert!(matches!(
        stm.switch_algorithm("NOrec"),
        Err(weft::Error::UnknownAlgorithm(_))
    ));
}

/// Idle switches re-seed each regime; transactions before and after every
/// hop observe a consistent heap.
#[test]
fn idle_switches_preserve_state() {
    let stm = Weft::builder().algorithm("CohortsEager").build().unwrap();
    let arena = WordArena::new(4);
    let mut th = stm.attach();

    let mut expected = 0usize;
    for name in [
        "LLTAMD64",
        "PipelineTurbo",
        "CohortsEager",
        "PipelineTurbo",
        "LLTAMD64",
        "CohortsEager",
    ] {
        for _ in 0..50 {
            th.run(|tx| increment(tx, &arena, 0)).unwrap();
            expected += 1;
        }
        stm.switch_algorithm(name).unwrap();
        assert_eq!(stm.algorithm(), name);
        assert_eq!(
            th.run(|tx| unsafe { tx.read_word(arena.ptr(0)) }).unwrap(),
            expected
        );
    }
    assert_eq!(arena.peek(0), expected);
}

/// Switching to the installed protocol is a no-op.
#[test]
fn switch_to_self_is_noop() {
    let stm = Weft::builder().algorithm("LLTAMD64").build().unwrap();
    stm.switch_algorithm("LLTAMD64").unwrap();
    assert_eq!(stm.algorithm(), "LLTAMD64");
}

/// A switch lands while worker threads are mid-stream: in-flight
/// transactions finish under the old protocol or self-abort and retry
/// under the new one, and no update is lost either way.
#[test]
fn switch_under_load_loses_nothing() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 2_000;

    let stm = Weft::builder().algorithm("CohortsEager").build().unwrap();
    let arena = Arc::new(WordArena::new(1));
    let barrier = Arc::new(Barrier::new(THREADS + 1));

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

    barrier.wait();
    stm.switch_algorithm("PipelineTurbo").unwrap();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(stm.algorithm(), "PipelineTurbo");
    assert_eq!(arena.peek(0), THREADS * PER_THREAD);
    // Under the pipelined regime every completed ticket is published, so
    // the marker has caught back up to the clock.
    assert_eq!(stm.last_complete(), stm.clock());
}

/// Back-to-back switches under load, cycling all three regimes.
#[test]
fn repeated_switches_under_load() {
    const THREADS: usize = 2;
    const PER_THREAD: usize = 3_000;

    let stm = Weft::builder().algorithm("LLTAMD64").build().unwrap();
    let arena = Arc::new(WordArena::new(1));
    let barrier = Arc::new(Barrier::new(THREADS + 1));

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

    barrier.wait();
    for name in ["CohortsEager", "PipelineTurbo", "LLTAMD64", "CohortsEager"] {
        stm.switch_algorithm(name).unwrap();
    }

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(arena.peek(0), THREADS * PER_THREAD);
}
