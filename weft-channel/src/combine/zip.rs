//! Positional pairing of two streams.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use weft::executor::Executor;

use crate::combine::CompletionJoin;
use crate::event::StreamEvent;
use crate::stream::{Channel, Producer, StreamCore, StreamHandler};

struct ZipState<A, B> {
    left: VecDeque<Arc<A>>,
    right: VecDeque<Arc<B>>,
    capacity: Option<usize>,
}

impl<A, B> ZipState<A, B> {
    fn new(capacity: Option<usize>) -> Self {
        Self {
            left: VecDeque::new(),
            right: VecDeque::new(),
            capacity,
        }
    }
}

/// Pairs the n-th update of `left` with the n-th update of `right`.
///
/// Each side's unmatched updates wait in a per-side FIFO queue;
/// whenever both queues are non-empty one element is popped from each
/// and the pair is emitted. The queues are **intentionally unbounded**:
/// if one side produces far faster than the other, its queue grows
/// without limit. Use [`zip_with_capacity`] to bound them.
///
/// The zipped stream succeeds once both sides have succeeded and fails
/// immediately on the first failure from either side. Success does not
/// require the queues to have drained — pairing is update-level, the
/// terminal is success-level.
pub fn zip<A, B, SA, SB>(
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
    zip_inner(left, right, executor, None)
}

/// [`zip`] with each pending queue bounded to `capacity` elements,
/// dropping the oldest unmatched update when a side overflows.
pub fn zip_with_capacity<A, B, SA, SB>(
    left: &Channel<A, SA>,
    right: &Channel<B, SB>,
    executor: Arc<dyn Executor>,
    capacity: usize,
) -> Channel<(Arc<A>, Arc<B>), (SA, SB)>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    SA: Clone + Send + Sync + 'static,
    SB: Clone + Send + Sync + 'static,
{
    zip_inner(left, right, executor, Some(capacity))
}

fn zip_inner<A, B, SA, SB>(
    left: &Channel<A, SA>,
    right: &Channel<B, SB>,
    executor: Arc<dyn Executor>,
    capacity: Option<usize>,
) -> Channel<(Arc<A>, Arc<B>), (SA, SB)>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    SA: Clone + Send + Sync + 'static,
    SB: Clone + Send + Sync + 'static,
{
    let producer: Producer<(Arc<A>, Arc<B>), (SA, SB)> = Producer::new();
    let down = Arc::downgrade(producer.core());
    let state = Arc::new(Mutex::new(ZipState::new(capacity)));
    let join = Arc::new(Mutex::new(CompletionJoin::new()));

    let left_handler = StreamHandler::new(executor.clone(), {
        let down = down.clone();
        let state = state.clone();
        let join = join.clone();
        let executor = executor.clone();
        move |event: StreamEvent<A, SA>| match event {
            StreamEvent::Update(value) => {
                // The state lock is held across the downstream push so
                // pairs leave in pairing order.
                let mut state = state.lock().unwrap();
                if let Some(cap) = state.capacity {
                    if state.left.len() == cap {
                        state.left.pop_front();
                    }
                }
                state.left.push_back(value);
                emit_ready(&mut state, &down, executor.as_ref());
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
                if let Some(cap) = state.capacity {
                    if state.right.len() == cap {
                        state.right.pop_front();
                    }
                }
                state.right.push_back(value);
                emit_ready(&mut state, &down, executor.as_ref());
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

fn emit_ready<A, B, SA, SB>(
    state: &mut ZipState<A, B>,
    down: &std::sync::Weak<StreamCore<(Arc<A>, Arc<B>), (SA, SB)>>,
    from: &dyn Executor,
) where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    SA: Send + Sync + 'static,
    SB: Send + Sync + 'static,
{
    while !state.left.is_empty() && !state.right.is_empty() {
        let pair = match (state.left.pop_front(), state.right.pop_front()) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        match down.upgrade() {
            Some(core) => {
                core.apply_from(Arc::new(pair), Some(from));
            }
            None => return,
        }
    }
}
