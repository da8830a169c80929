use anyhow::Result;
use dumpshard::{ConvertError, WorkerPool};
use mark_flaky_tests::flaky;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[flaky]
#[test]
fn results_follow_submission_order_when_completion_is_reversed() -> Result<()> {
    let pool = WorkerPool::new(Some(4), Some(8))?;
    let finished = Arc::new(std::sync::Mutex::new(Vec::new()));
    let log = Arc::clone(&finished);

    let out: Vec<usize> = pool
        .map_ordered((0..8).collect(), move |i: usize| {
            // Earlier inputs take longer, so workers finish in reverse.
            std::thread::sleep(Duration::from_millis(10 * (8 - i as u64)));
            log.lock().unwrap().push(i);
            Ok(i * i)
        })
        .collect::<dumpshard::Result<_>>()?;

    assert_eq!(out, vec![0, 1, 4, 9, 16, 25, 36, 49]);
    let completion = finished.lock().unwrap().clone();
    assert_eq!(completion.len(), 8);
    assert_ne!(completion, (0..8).collect::<Vec<_>>(), "workers should finish out of order");
    Ok(())
}

#[test]
fn many_tasks_with_small_window_stay_ordered() -> Result<()> {
    let pool = WorkerPool::new(Some(3), Some(2))?;
    let out: Vec<u64> = pool
        .map_ordered((0..500u64).collect(), |i| {
            if i % 7 == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(i)
        })
        .collect::<dumpshard::Result<_>>()?;
    assert_eq!(out, (0..500).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn outstanding_tasks_never_exceed_window() -> Result<()> {
    let pool = WorkerPool::new(Some(4), Some(3))?;
    let started = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&started);

    let mut results = pool.map_ordered((0..50usize).collect(), move |i| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(i)
    });

    for expected in 0..50usize {
        assert_eq!(results.next().transpose()?, Some(expected));
        // After consuming `expected`, at most `window` more can have been submitted.
        assert!(started.load(Ordering::SeqCst) <= expected + 1 + 3);
    }
    assert!(results.next().is_none());
    Ok(())
}

#[test]
fn failure_stops_dispatch_and_ends_stream() -> Result<()> {
    let pool = WorkerPool::new(Some(2), Some(2))?;
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);

    let mut results = pool.map_ordered((0..100usize).collect(), move |i| {
        counter.fetch_add(1, Ordering::SeqCst);
        if i == 3 {
            return Err(ConvertError::TruncatedRecord {
                offset: i as u64,
                trailing: 1,
            });
        }
        Ok(i)
    });

    for expected in 0..3 {
        assert_eq!(results.next().transpose()?, Some(expected));
    }
    assert!(matches!(
        results.next(),
        Some(Err(ConvertError::TruncatedRecord { offset: 3, .. }))
    ));
    assert!(results.next().is_none());
    drop(results);

    assert!(ran.load(Ordering::SeqCst) < 10, "ran {} tasks", ran.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn empty_input_yields_nothing() -> Result<()> {
    let pool = WorkerPool::new(Some(1), None)?;
    let mut results = pool.map_ordered(Vec::<u8>::new(), |b| Ok(b));
    assert!(results.next().is_none());
    Ok(())
}
