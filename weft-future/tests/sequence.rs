//! Integration tests for the sequence operations.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use weft::executor::InlineExecutor;
use weft::fallible::fault;
use weft_future::{async_flat_map, async_reduce, joined, succeeded, FalliblePromise, Promise};

#[derive(Debug)]
struct TestError(&'static str);

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test error: {}", self.0)
    }
}

impl Error for TestError {}

// ============================================================================
// joined
// ============================================================================

#[test]
fn joined_preserves_input_order_regardless_of_completion_order() {
    let promises: Vec<FalliblePromise<u32>> = (0..4).map(|_| Promise::new()).collect();
    let result = joined(promises.iter().map(|p| p.future()).collect());

    // Complete out of order.
    promises[2].succeed(2);
    promises[0].succeed(0);
    promises[3].succeed(3);
    assert!(result.peek().is_none(), "must wait for every input");
    promises[1].succeed(1);

    assert_eq!(result.wait().success(), Some(&vec![0, 1, 2, 3]));
}

#[test]
fn joined_fails_fast_on_first_failure() {
    let promises: Vec<FalliblePromise<u32>> = (0..3).map(|_| Promise::new()).collect();
    let result = joined(promises.iter().map(|p| p.future()).collect());

    promises[0].succeed(0);
    promises[1].fail(fault(TestError("middle")));

    // Already failed; the straggler's success changes nothing.
    assert!(result.peek().unwrap().is_failure());
    promises[2].succeed(2);
    assert!(result.wait().is_failure());
}

#[test]
fn joined_empty_input_succeeds_immediately() {
    let result = joined(Vec::<weft_future::FallibleFuture<u32>>::new());
    assert_eq!(result.peek().unwrap().success(), Some(&Vec::new()));
}

#[test]
fn joined_tolerates_cross_thread_completion() {
    let promises: Vec<Arc<FalliblePromise<u32>>> =
        (0..8).map(|_| Arc::new(Promise::new())).collect();
    let result = joined(promises.iter().map(|p| p.future()).collect());

    let mut handles = Vec::new();
    for (i, promise) in promises.iter().enumerate() {
        let promise = promise.clone();
        handles.push(thread::spawn(move || {
            thread::sleep(Duration::from_millis((8 - i as u64) * 3));
            promise.succeed(i as u32);
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        result.wait().success(),
        Some(&(0..8).collect::<Vec<u32>>())
    );
}

// ============================================================================
// async_reduce
// ============================================================================

#[test]
fn async_reduce_folds_in_sequence() {
    let visited = Arc::new(AtomicUsize::new(0));
    let probe = visited.clone();

    let result = async_reduce(
        vec![1u32, 2, 3, 4],
        0u32,
        InlineExecutor::shared(),
        move |acc, item| {
            probe.fetch_add(1, Ordering::SeqCst);
            succeeded(acc + item)
        },
    );

    assert_eq!(result.wait().success(), Some(&10));
    assert_eq!(visited.load(Ordering::SeqCst), 4);
}

#[test]
fn async_reduce_stops_at_the_first_failing_step() {
    let visited = Arc::new(AtomicUsize::new(0));
    let probe = visited.clone();

    let result = async_reduce(
        vec![1u32, 2, 3, 4],
        0u32,
        InlineExecutor::shared(),
        move |acc, item| {
            probe.fetch_add(1, Ordering::SeqCst);
            if *item == 3 {
                weft_future::failed(fault(TestError("step")))
            } else {
                succeeded(acc + item)
            }
        },
    );

    assert!(result.wait().is_failure());
    assert_eq!(visited.load(Ordering::SeqCst), 3, "items after the failure are never visited");
}

// ============================================================================
// async_flat_map
// ============================================================================

#[test]
fn async_flat_map_maps_and_joins_positionally() {
    let result = async_flat_map(vec![1u32, 2, 3], |item| succeeded(item * 10));
    assert_eq!(result.wait().success(), Some(&vec![10, 20, 30]));
}

#[test]
fn async_flat_map_fails_fast() {
    let result = async_flat_map(vec![1u32, 2, 3], |item| {
        if *item == 2 {
            weft_future::failed(fault(TestError("mapped")))
        } else {
            succeeded(*item)
        }
    });
    assert!(result.wait().is_failure());
}
