//! Pairing the latest values of two streams.

use std::sync::{Arc, Mutex};

use weft::executor::Executor;

use crate::combine::CompletionJoin;
use crate::event::StreamEvent;
use crate::stream::{Channel, Producer, StreamHandler};

struct LatestState<A, B> {
    left: Option<Arc<A>>,
    right: Option<Arc<B>>,
}

/// Emits the latest pair once both sides have produced at least one
/// update, and again on every subsequent update from either side.
///
/// Until both sides are primed nothing is emitted. Completion: both
/// sides must succeed; the first failure fails the combined stream
/// immediately.
pub fn combine_latest<A, B, SA, SB>(
    left: &Channel<A, SA>,
    right: &Channel<B, SB>,
    executor: Arc<dyn Executor>,
) -> Channel<(Arc<A>, Arc<B>), (SA, SB)>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    SA: Clone + Send + Sync + 'static,
    SB: Clone + Send + Sync + 'static,
{
    let producer: Producer<(Arc<A>, Arc<B>), (SA, SB)> = Producer::new();
    let down = Arc::downgrade(producer.core());
    let state = Arc::new(Mutex::new(LatestState::<A, B> {
        left: None,
        right: None,
    }));
    let join = Arc::new(Mutex::new(CompletionJoin::new()));

    let left_handler = StreamHandler::new(executor.clone(), {
        let down = down.clone();
        let state = state.clone();
        let join = join.clone();
        let executor = executor.clone();
        move |event: StreamEvent<A, SA>| match event {
            StreamEvent::Update(value) => {
                // Lock held across the push so per-side order survives.
                let mut state = state.lock().unwrap();
                state.left = Some(value);
                if let (Some(a), Some(b)) = (&state.left, &state.right) {
                    if let Some(core) = down.upgrade() {
                        core.apply_from(
                            Arc::new((a.clone(), b.clone())),
                            Some(executor.as_ref()),
                        );
                    }
                }
            }
            StreamEvent::Completion(terminal) => {
                let decision = join.lock().unwrap().left(&terminal);
                if let Some(decision) = decision {
                    if let Some(core) = down.upgrade() {
                        core.close_shared(Arc::new(decision));
                    }
                }
            }
        }
    });
    producer.core().retain(left_handler.clone());
    left.subscribe_handler(&left_handler);

    let right_handler = StreamHandler::new(executor.clone(), {
        let down = down.clone();
        let state = state.clone();
        let join = join.clone();
        let executor = executor.clone();
        move |event: StreamEvent<B, SB>| match event {
            StreamEvent::Update(value) => {
                let mut state = state.lock().unwrap();
                state.right = Some(value);
                if let (Some(a), Some(b)) = (&state.left, &state.right) {
                    if let Some(core) = down.upgrade() {
                        core.apply_from(
                            Arc::new((a.clone(), b.clone())),
                            Some(executor.as_ref()),
                        );
                    }
                }
            }
            StreamEvent::Completion(terminal) => {
                let decision = join.lock().unwrap().right(&terminal);
                if let Some(decision) = decision {
                    if let Some(core) = down.upgrade() {
                        core.close_shared(Arc::new(decision));
                    }
                }
            }
        }
    });
    producer.core().retain(right_handler.clone());
    right.subscribe_handler(&right_handler);

    producer.channel()
}
