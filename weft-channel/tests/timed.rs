//! Integration tests for the timer-driven combinators.
//!
//! Intervals are generous relative to the sleeps around them so these
//! stay stable on loaded CI machines.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use weft::executor::InlineExecutor;
use weft_channel::{debounce, throttle, Producer};

const INTERVAL: Duration = Duration::from_millis(60);
const SETTLE: Duration = Duration::from_millis(200);

fn collect(channel: &weft_channel::Channel<u32, &'static str>) -> Arc<Mutex<Vec<u32>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    channel.on_update(InlineExecutor::shared(), move |value: &u32| {
        log.lock().unwrap().push(*value);
    });
    seen
}

// ============================================================================
// debounce
// ============================================================================

#[test]
fn debounce_sends_leading_edge_then_coalesces_to_newest() {
    let producer: Producer<u32, &'static str> = Producer::with_buffer(0);
    let debounced = debounce(&producer.channel(), INTERVAL, InlineExecutor::shared());
    let seen = collect(&debounced);

    producer.update(1); // leading edge: immediate
    producer.update(2); // coalesced away by 3
    producer.update(3);

    assert_eq!(*seen.lock().unwrap(), vec![1], "only the leading edge so far");

    thread::sleep(SETTLE);
    assert_eq!(*seen.lock().unwrap(), vec![1, 3], "tick flushes the newest pending");
}

#[test]
fn debounce_completion_flushes_pending_before_the_terminal() {
    let producer: Producer<u32, &'static str> = Producer::with_buffer(0);
    let debounced = debounce(&producer.channel(), INTERVAL, InlineExecutor::shared());
    let seen = collect(&debounced);

    producer.update(1);
    producer.update(2);
    producer.succeed("done");

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(debounced.terminal().unwrap().success(), Some(&"done"));
}

#[test]
fn debounce_quiet_stream_stays_quiet() {
    let producer: Producer<u32, &'static str> = Producer::with_buffer(0);
    let debounced = debounce(&producer.channel(), INTERVAL, InlineExecutor::shared());
    let seen = collect(&debounced);

    producer.update(1);
    thread::sleep(SETTLE);
    assert_eq!(*seen.lock().unwrap(), vec![1], "no phantom deliveries from idle ticks");
}

// ============================================================================
// throttle
// ============================================================================

#[test]
fn throttle_first_update_is_immediate_and_tail_is_coalesced() {
    let producer: Producer<u32, &'static str> = Producer::with_buffer(0);
    let throttled = throttle(&producer.channel(), INTERVAL, InlineExecutor::shared());
    let seen = collect(&throttled);

    producer.update(1); // opens the window: immediate
    producer.update(2); // overwritten by 3
    producer.update(3);
    assert_eq!(*seen.lock().unwrap(), vec![1]);

    thread::sleep(SETTLE);
    assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
}

#[test]
fn throttle_window_closes_when_idle() {
    let producer: Producer<u32, &'static str> = Producer::with_buffer(0);
    let throttled = throttle(&producer.channel(), INTERVAL, InlineExecutor::shared());
    let seen = collect(&throttled);

    producer.update(1);
    thread::sleep(SETTLE);
    // The empty tick closed the window: the next update is immediate
    // again.
    producer.update(2);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
}

#[test]
fn throttle_completion_flushes_pending_before_the_terminal() {
    let producer: Producer<u32, &'static str> = Producer::with_buffer(0);
    let throttled = throttle(&producer.channel(), INTERVAL, InlineExecutor::shared());
    let seen = collect(&throttled);

    producer.update(1);
    producer.update(2);
    producer.succeed("done");

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(throttled.terminal().unwrap().success(), Some(&"done"));
}

#[test]
fn timers_die_with_the_downstream() {
    let producer: Producer<u32, &'static str> = Producer::with_buffer(0);
    let debounced = debounce(&producer.channel(), INTERVAL, InlineExecutor::shared());
    producer.update(1);
    drop(debounced);

    // The pending tick finds the downstream gone and stops; further
    // updates fan out to a dead registration without effect.
    thread::sleep(SETTLE);
    assert!(producer.update(2));
}
