//! Rate-limiting a stream to at most one update per interval.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use weft::executor::Executor;

use crate::event::StreamEvent;
use crate::stream::{Channel, Producer, StreamCore, StreamHandler};

struct DebounceState<U> {
    pending: Option<Arc<U>>,
    ticking: bool,
}

/// Delivers updates no more often than once per `interval`.
///
/// The very first update is sent on the leading edge; from then on a
/// repeating timer (driven through `executor.execute_after`, weft owns
/// no threads) flushes the most recent pending update each tick, so
/// intermediate values inside a tick window are coalesced to the newest
/// one. Completion flushes any pending update first, then propagates
/// the terminal value. The timer stops rescheduling once the stream is
/// closed or every handle to the debounced channel is gone.
pub fn debounce<U, S>(
    channel: &Channel<U, S>,
    interval: Duration,
    executor: Arc<dyn Executor>,
) -> Channel<U, S>
where
    U: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    let producer: Producer<U, S> = Producer::new();
    let down = Arc::downgrade(producer.core());
    let state = Arc::new(Mutex::new(DebounceState {
        pending: None,
        ticking: false,
    }));

    let handler = StreamHandler::new(executor.clone(), {
        let down = down.clone();
        let state = state.clone();
        let executor = executor.clone();
        move |event: StreamEvent<U, S>| match event {
            StreamEvent::Update(value) => {
                let leading = {
                    let mut state = state.lock().unwrap();
                    if state.ticking {
                        state.pending = Some(value);
                        None
                    } else {
                        state.ticking = true;
                        Some(value)
                    }
                };
                if let Some(value) = leading {
                    if let Some(core) = down.upgrade() {
                        core.apply_from(value, Some(executor.as_ref()));
                    }
                    schedule_tick(&executor, interval, &state, &down);
                }
            }
            StreamEvent::Completion(terminal) => {
                let flush = state.lock().unwrap().pending.take();
                if let Some(core) = down.upgrade() {
                    if let Some(value) = flush {
                        core.apply_from(value, Some(executor.as_ref()));
                    }
                    core.close_shared(terminal);
                }
            }
        }
    });
    producer.core().retain(handler.clone());
    channel.subscribe_handler(&handler);

    producer.channel()
}

fn schedule_tick<U, S>(
    executor: &Arc<dyn Executor>,
    interval: Duration,
    state: &Arc<Mutex<DebounceState<U>>>,
    down: &Weak<StreamCore<U, S>>,
) where
    U: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    let next_executor = executor.clone();
    let state = state.clone();
    let down = down.clone();
    executor.execute_after(
        interval,
        Box::new(move || {
            // Downstream gone or closed: the timer dies here.
            let core = match down.upgrade() {
                Some(core) => core,
                None => return,
            };
            if core.is_closed() {
                return;
            }
            let flush = state.lock().unwrap().pending.take();
            if let Some(value) = flush {
                core.apply_from(value, Some(next_executor.as_ref()));
            }
            let down = Arc::downgrade(&core);
            drop(core);
            schedule_tick(&next_executor, interval, &state, &down);
        }),
    );
}
