//! Merging two streams into one.

use std::sync::{Arc, Mutex};

use weft::either::Either;
use weft::executor::Executor;

use crate::combine::CompletionJoin;
use crate::event::StreamEvent;
use crate::stream::{Channel, Producer, StreamHandler};

/// Merges two streams of the same update type.
///
/// Every update from either side is forwarded immediately, in that
/// side's own order (no cross-source ordering). The merged stream
/// succeeds with both success values once both sides have succeeded and
/// fails immediately on the first failure from either side — later
/// updates from the surviving side land on a closed stream and are
/// dropped.
pub fn merge<U, SA, SB>(
    left: &Channel<U, SA>,
    right: &Channel<U, SB>,
    executor: Arc<dyn Executor>,
) -> Channel<U, (SA, SB)>
where
    U: Send + Sync + 'static,
    SA: Clone + Send + Sync + 'static,
    SB: Clone + Send + Sync + 'static,
{
    let producer: Producer<U, (SA, SB)> = Producer::new();
    let down = Arc::downgrade(producer.core());
    let join = Arc::new(Mutex::new(CompletionJoin::new()));

    let left_handler = StreamHandler::new(executor.clone(), {
        let down = down.clone();
        let join = join.clone();
        let executor = executor.clone();
        move |event: StreamEvent<U, SA>| match event {
            StreamEvent::Update(value) => {
                if let Some(core) = down.upgrade() {
                    core.apply_from(value, Some(executor.as_ref()));
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
        let join = join.clone();
        let executor = executor.clone();
        move |event: StreamEvent<U, SB>| match event {
            StreamEvent::Update(value) => {
                if let Some(core) = down.upgrade() {
                    core.apply_from(value, Some(executor.as_ref()));
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

/// Merges two streams of different update types, tagging each update
/// with its origin.
///
/// Same completion policy as [`merge`].
pub fn merge_either<A, B, SA, SB>(
    left: &Channel<A, SA>,
    right: &Channel<B, SB>,
    executor: Arc<dyn Executor>,
) -> Channel<Either<Arc<A>, Arc<B>>, (SA, SB)>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    SA: Clone + Send + Sync + 'static,
    SB: Clone + Send + Sync + 'static,
{
    let producer: Producer<Either<Arc<A>, Arc<B>>, (SA, SB)> = Producer::new();
    let down = Arc::downgrade(producer.core());
    let join = Arc::new(Mutex::new(CompletionJoin::new()));

    let left_handler = StreamHandler::new(executor.clone(), {
        let down = down.clone();
        let join = join.clone();
        let executor = executor.clone();
        move |event: StreamEvent<A, SA>| match event {
            StreamEvent::Update(value) => {
                if let Some(core) = down.upgrade() {
                    core.apply_from(Arc::new(Either::Left(value)), Some(executor.as_ref()));
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
        let join = join.clone();
        let executor = executor.clone();
        move |event: StreamEvent<B, SB>| match event {
            StreamEvent::Update(value) => {
                if let Some(core) = down.upgrade() {
                    core.apply_from(Arc::new(Either::Right(value)), Some(executor.as_ref()));
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
