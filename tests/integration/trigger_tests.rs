//! Periodic trigger integration tests

use hidhub::PeriodicTrigger;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn counting(start: u32) -> (Arc<PeriodicTrigger>, Arc<AtomicUsize>) {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let trigger = PeriodicTrigger::new(NonZeroU32::new(start).unwrap(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (Arc::new(trigger), fired)
}

#[test]
fn test_k_periods_fire_exactly_k_times() {
    for start in [1u32, 2, 3, 7] {
        for k in 0..5usize {
            let (trigger, fired) = counting(start);
            for _ in 0..k * start as usize {
                trigger.tick().unwrap();
            }
            assert_eq!(fired.load(Ordering::SeqCst), k, "start={} k={}", start, k);
            assert_eq!(trigger.remaining(), start);
        }
    }
}

#[test]
fn test_new_three_fires_on_third_tick() {
    let (trigger, fired) = counting(3);
    for _ in 0..3 {
        trigger.tick().unwrap();
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(trigger.remaining(), 3);
}

#[test]
fn test_stop_mid_period_never_fires_again() {
    let (trigger, fired) = counting(3);
    trigger.tick().unwrap();
    trigger.tick().unwrap();
    trigger.stop();

    for _ in 0..5 {
        trigger.tick().unwrap();
        assert!(!trigger.proceed());
    }
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn test_reset_then_start_minus_one_ticks_is_silent() {
    let (trigger, fired) = counting(4);
    trigger.tick().unwrap();
    trigger.reset();

    for _ in 0..3 {
        trigger.tick().unwrap();
    }
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    trigger.tick().unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_ticks_never_double_fire_or_lose_a_firing() {
    const THREADS: usize = 8;
    const TICKS_PER_THREAD: usize = 1_001;

    for start in [1u32, 3, 5, 64] {
        let (trigger, fired) = counting(start);
        let barrier = Arc::new(Barrier::new(THREADS));

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let trigger = Arc::clone(&trigger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..TICKS_PER_THREAD {
                        trigger.tick().unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let total = THREADS * TICKS_PER_THREAD;
        assert_eq!(fired.load(Ordering::SeqCst), total / start as usize, "start={}", start);
        assert_eq!(
            trigger.remaining() as usize,
            start as usize - total % start as usize
        );
    }
}

#[test]
fn test_concurrent_stop_is_observed_by_all_tickers() {
    let (trigger, _) = counting(2);
    let tickers: Vec<_> = (0..4)
        .map(|_| {
            let trigger = Arc::clone(&trigger);
            thread::spawn(move || {
                while trigger.proceed() {
                    trigger.tick().unwrap();
                    thread::yield_now();
                }
            })
        })
        .collect();

    thread::sleep(std::time::Duration::from_millis(10));
    trigger.stop();
    for ticker in tickers {
        ticker.join().unwrap();
    }
    assert!(!trigger.proceed());
}
