//! Overlapping readers, concurrent writers, and expedited-vs-normal timing
//! (spec §8, scenarios 2, 3, 5).

use srcu::Domain;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn synchronize_blocks_until_overlapping_reader_leaves() {
    let domain = Arc::new(Domain::with_cpus(4).unwrap());
    let ready = Arc::new(Barrier::new(2));

    let reader_domain = Arc::clone(&domain);
    let reader_ready = Arc::clone(&ready);
    let reader = thread::spawn(move || {
        let idx = reader_domain.enter();
        reader_ready.wait();
        thread::sleep(Duration::from_millis(60));
        reader_domain.leave(idx);
    });

    ready.wait();
    // Give the reader a head start so its enter clearly precedes the flip.
    thread::sleep(Duration::from_millis(10));

    let start = Instant::now();
    domain.synchronize();
    let elapsed = start.elapsed();

    reader.join().unwrap();

    assert!(
        elapsed >= Duration::from_millis(40),
        "synchronize returned after only {elapsed:?}, before the reader could have left"
    );
}

#[test]
fn three_concurrent_synchronize_calls_advance_completed_by_at_most_four() {
    let domain = Arc::new(Domain::with_cpus(4).unwrap());
    let before = domain.batches_completed();
    let ready = Arc::new(Barrier::new(3));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let domain = Arc::clone(&domain);
            let ready = Arc::clone(&ready);
            thread::spawn(move || {
                ready.wait();
                domain.synchronize();
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let advanced = domain.batches_completed() - before;
    assert!(
        (2..=4).contains(&advanced),
        "expected completed to advance by 2..=4, got {advanced}"
    );
}

#[test]
fn independent_domains_do_not_delay_each_other() {
    let a = Arc::new(Domain::with_cpus(2).unwrap());
    let b = Domain::with_cpus(2).unwrap();

    let blocker = Arc::clone(&a);
    let idx = blocker.enter();
    let reader = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        blocker.leave(idx);
    });

    let start = Instant::now();
    b.synchronize();
    let elapsed = start.elapsed();

    assert!(
        elapsed < Duration::from_millis(100),
        "synchronize on domain b waited on domain a's reader: {elapsed:?}"
    );

    reader.join().unwrap();
    a.synchronize();
}

/// Loose, order-of-magnitude check only — the spec explicitly frames timing
/// here as "not a contract".
#[test]
fn expedited_keeps_up_with_normal_under_reader_churn() {
    let domain = Arc::new(Domain::with_cpus(8).unwrap());
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let domain = Arc::clone(&domain);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let idx = domain.enter();
                    thread::yield_now();
                    domain.leave(idx);
                }
            })
        })
        .collect();

    let mut normal_total = Duration::ZERO;
    let mut expedited_total = Duration::ZERO;
    for _ in 0..5 {
        let t0 = Instant::now();
        domain.synchronize();
        normal_total += t0.elapsed();

        let t1 = Instant::now();
        domain.synchronize_expedited();
        expedited_total += t1.elapsed();
    }

    stop.store(true, Ordering::Relaxed);
    for r in readers {
        r.join().unwrap();
    }

    assert!(
        expedited_total <= normal_total * 10 + Duration::from_millis(100),
        "expedited ({expedited_total:?}) unexpectedly much slower than normal ({normal_total:?})"
    );
}
