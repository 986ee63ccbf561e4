//! Windowed throttling: immediate first delivery, coalesced tail.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use weft::executor::Executor;

use crate::event::StreamEvent;
use crate::stream::{Channel, Producer, StreamCore, StreamHandler};

struct ThrottleState<U> {
    pending: Option<Arc<U>>,
    window_open: bool,
}

/// Passes the first update of each window through immediately; later
/// updates inside the window overwrite a single pending slot that is
/// delivered when the window timer fires, restarting the window.
///
/// A window whose timer fires with nothing pending simply closes — the
/// next update is again delivered immediately. Completion flushes any
/// pending update first, then propagates the terminal value. Timers run
/// through `executor.execute_after` and stop once the downstream is
/// gone or closed.
pub fn throttle<U, S>(
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
    let state = Arc::new(Mutex::new(ThrottleState {
        pending: None,
        window_open: false,
    }));

    let handler = StreamHandler::new(executor.clone(), {
        let down = down.clone();
        let state = state.clone();
        let executor = executor.clone();
        move |event: StreamEvent<U, S>| match event {
            StreamEvent::Update(value) => {
                let immediate = {
                    let mut state = state.lock().unwrap();
                    if state.window_open {
                        state.pending = Some(value);
                        None
                    } else {
                        state.window_open = true;
                        Some(value)
                    }
                };
                if let Some(value) = immediate {
                    if let Some(core) = down.upgrade() {
                        core.apply_from(value, Some(executor.as_ref()));
                    }
                    arm_window(&executor, interval, &state, &down);
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

fn arm_window<U, S>(
    executor: &Arc<dyn Executor>,
    interval: Duration,
    state: &Arc<Mutex<ThrottleState<U>>>,
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
            let core = match down.upgrade() {
                Some(core) => core,
                None => return,
            };
            if core.is_closed() {
                return;
            }
            let flush = state.lock().unwrap().pending.take();
            match flush {
                Some(value) => {
                    // Deliver the coalesced tail and restart the window.
                    core.apply_from(value, Some(next_executor.as_ref()));
                    let down = Arc::downgrade(&core);
                    drop(core);
                    arm_window(&next_executor, interval, &state, &down);
                }
                None => {
                    state.lock().unwrap().window_open = false;
                }
            }
        }),
    );
}
