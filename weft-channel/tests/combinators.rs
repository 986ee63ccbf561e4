//! Integration tests for the two-source combinators.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};

use weft::either::Either;
use weft::executor::InlineExecutor;
use weft::fallible::fault;
use weft_channel::{combine_latest, merge, merge_either, sample, zip, zip_with_capacity, Producer};

#[derive(Debug)]
struct TestError(&'static str);

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test error: {}", self.0)
    }
}

impl Error for TestError {}

// ============================================================================
// merge
// ============================================================================

#[test]
fn merge_forwards_updates_from_both_sides() {
    let left: Producer<u32, u32> = Producer::with_buffer(0);
    let right: Producer<u32, u32> = Producer::with_buffer(0);
    let merged = merge(&left.channel(), &right.channel(), InlineExecutor::shared());

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let log = seen.clone();
        merged.on_update(InlineExecutor::shared(), move |value: &u32| {
            log.lock().unwrap().push(*value);
        });
    }

    left.update(1);
    right.update(2);
    left.update(3);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn merge_succeeds_only_after_both_sides_succeed() {
    let left: Producer<u32, u32> = Producer::new();
    let right: Producer<u32, u32> = Producer::new();
    let merged = merge(&left.channel(), &right.channel(), InlineExecutor::shared());

    left.succeed(10);
    assert!(merged.terminal().is_none(), "partial success must be held");

    right.succeed(20);
    let terminal = merged.terminal().unwrap();
    assert_eq!(terminal.success(), Some(&(10, 20)));
}

#[test]
fn merge_fails_fast_and_drops_the_other_sides_updates() {
    let left: Producer<u32, u32> = Producer::with_buffer(0);
    let right: Producer<u32, u32> = Producer::with_buffer(0);
    let merged = merge(&left.channel(), &right.channel(), InlineExecutor::shared());

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let log = seen.clone();
        merged.on_update(InlineExecutor::shared(), move |value: &u32| {
            log.lock().unwrap().push(*value);
        });
    }

    left.fail(fault(TestError("left broke")));

    let terminal = merged.terminal().unwrap();
    assert!(terminal.is_failure());
    assert_eq!(
        terminal.failure().unwrap().to_string(),
        "test error: left broke"
    );

    // The surviving side keeps producing; the merged stream is closed
    // and none of it is delivered.
    right.update(1);
    right.update(2);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn merge_either_tags_origins() {
    let left: Producer<u32, u32> = Producer::with_buffer(0);
    let right: Producer<&'static str, u32> = Producer::with_buffer(0);
    let merged = merge_either(&left.channel(), &right.channel(), InlineExecutor::shared());

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let log = seen.clone();
        merged.on_update(
            InlineExecutor::shared(),
            move |value: &Either<Arc<u32>, Arc<&'static str>>| {
                let tag = match value {
                    Either::Left(v) => format!("L{}", v),
                    Either::Right(s) => format!("R{}", s),
                };
                log.lock().unwrap().push(tag);
            },
        );
    }

    left.update(1);
    right.update("a");
    left.update(2);
    assert_eq!(*seen.lock().unwrap(), vec!["L1", "Ra", "L2"]);
}

// ============================================================================
// zip
// ============================================================================

#[test]
fn zip_pairs_positionally_and_completes_on_both_successes() {
    let left: Producer<i32, u32> = Producer::with_buffer(0);
    let right: Producer<&'static str, u32> = Producer::with_buffer(0);
    let zipped = zip(&left.channel(), &right.channel(), InlineExecutor::shared());

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let log = seen.clone();
        zipped.on_update(
            InlineExecutor::shared(),
            move |pair: &(Arc<i32>, Arc<&'static str>)| {
                log.lock().unwrap().push((*pair.0, *pair.1));
            },
        );
    }

    left.update(1);
    left.update(2);
    left.update(3);
    right.update("x");
    right.update("y");

    assert_eq!(*seen.lock().unwrap(), vec![(1, "x"), (2, "y")]);

    // Success is success-level, not update-level: the unmatched `3`
    // does not block completion.
    left.succeed(1);
    assert!(zipped.terminal().is_none());
    right.succeed(2);
    assert_eq!(zipped.terminal().unwrap().success(), Some(&(1, 2)));
}

#[test]
fn zip_queues_are_unbounded_by_default() {
    let left: Producer<u32, u32> = Producer::with_buffer(0);
    let right: Producer<u32, u32> = Producer::with_buffer(0);
    let zipped = zip(&left.channel(), &right.channel(), InlineExecutor::shared());

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let log = seen.clone();
        zipped.on_update(
            InlineExecutor::shared(),
            move |pair: &(Arc<u32>, Arc<u32>)| {
                log.lock().unwrap().push((*pair.0, *pair.1));
            },
        );
    }

    // One side races far ahead; nothing is dropped.
    for i in 0..1000 {
        left.update(i);
    }
    for i in 0..1000 {
        right.update(i);
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1000);
    assert!(seen.iter().enumerate().all(|(i, pair)| pair == &(i as u32, i as u32)));
}

#[test]
fn zip_with_capacity_drops_oldest_unmatched() {
    let left: Producer<u32, u32> = Producer::with_buffer(0);
    let right: Producer<u32, u32> = Producer::with_buffer(0);
    let zipped = zip_with_capacity(
        &left.channel(),
        &right.channel(),
        InlineExecutor::shared(),
        2,
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let log = seen.clone();
        zipped.on_update(
            InlineExecutor::shared(),
            move |pair: &(Arc<u32>, Arc<u32>)| {
                log.lock().unwrap().push((*pair.0, *pair.1));
            },
        );
    }

    // 0..5 overflow the bound of 2: only 3 and 4 survive.
    for i in 0..5 {
        left.update(i);
    }
    right.update(100);
    right.update(200);

    assert_eq!(*seen.lock().unwrap(), vec![(3, 100), (4, 200)]);
}

#[test]
fn zip_fails_fast() {
    let left: Producer<u32, u32> = Producer::with_buffer(0);
    let right: Producer<u32, u32> = Producer::with_buffer(0);
    let zipped = zip(&left.channel(), &right.channel(), InlineExecutor::shared());

    right.fail(fault(TestError("right broke")));
    assert!(zipped.terminal().unwrap().is_failure());
}

// ============================================================================
// sample
// ============================================================================

#[test]
fn sample_pairs_cached_value_with_each_sampler_update() {
    let sampled: Producer<u32, u32> = Producer::with_buffer(0);
    let sampler: Producer<&'static str, u32> = Producer::with_buffer(0);
    let sampled_stream = sample(
        &sampled.channel(),
        &sampler.channel(),
        InlineExecutor::shared(),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let log = seen.clone();
        sampled_stream.on_update(
            InlineExecutor::shared(),
            move |pair: &(Arc<u32>, Arc<&'static str>)| {
                log.lock().unwrap().push((*pair.0, *pair.1));
            },
        );
    }

    // Sampler fires before anything was sampled: dropped.
    sampler.update("early");
    assert!(seen.lock().unwrap().is_empty());

    sampled.update(1);
    sampler.update("a");
    // The cache is reused, not cleared.
    sampler.update("b");
    sampled.update(2);
    sampler.update("c");

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(1, "a"), (1, "b"), (2, "c")]
    );
}

#[test]
fn sample_completion_requires_both_successes() {
    let sampled: Producer<u32, u32> = Producer::new();
    let sampler: Producer<u32, u32> = Producer::new();
    let stream = sample(
        &sampled.channel(),
        &sampler.channel(),
        InlineExecutor::shared(),
    );

    sampler.succeed(2);
    assert!(stream.terminal().is_none());
    sampled.succeed(1);
    assert_eq!(stream.terminal().unwrap().success(), Some(&(1, 2)));
}

// ============================================================================
// combine_latest
// ============================================================================

#[test]
fn combine_latest_waits_for_both_then_fires_on_every_update() {
    let left: Producer<u32, u32> = Producer::with_buffer(0);
    let right: Producer<&'static str, u32> = Producer::with_buffer(0);
    let combined = combine_latest(&left.channel(), &right.channel(), InlineExecutor::shared());

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let log = seen.clone();
        combined.on_update(
            InlineExecutor::shared(),
            move |pair: &(Arc<u32>, Arc<&'static str>)| {
                log.lock().unwrap().push((*pair.0, *pair.1));
            },
        );
    }

    left.update(1);
    left.update(2);
    assert!(seen.lock().unwrap().is_empty(), "unprimed side holds emission");

    right.update("a");
    left.update(3);
    right.update("b");

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(2, "a"), (3, "a"), (3, "b")]
    );
}

#[test]
fn combine_latest_fails_fast() {
    let left: Producer<u32, u32> = Producer::new();
    let right: Producer<u32, u32> = Producer::new();
    let combined = combine_latest(&left.channel(), &right.channel(), InlineExecutor::shared());

    left.fail(fault(TestError("left broke")));
    assert!(combined.terminal().unwrap().is_failure());
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn dropping_the_combined_channel_releases_upstream_registrations() {
    let left: Producer<u32, u32> = Producer::with_buffer(0);
    let right: Producer<u32, u32> = Producer::with_buffer(0);
    let merged = merge(&left.channel(), &right.channel(), InlineExecutor::shared());
    drop(merged);

    // Updates now fan out to a dead registration; nothing is retained
    // and nothing crashes.
    assert!(left.update(1));
    assert!(right.update(2));
    assert!(left.succeed(1));
    assert!(right.succeed(2));
}
