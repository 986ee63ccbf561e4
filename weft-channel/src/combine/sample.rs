//! Sampling one stream with another.

use std::sync::{Arc, Mutex};

use weft::executor::Executor;

use crate::combine::CompletionJoin;
use crate::event::StreamEvent;
use crate::stream::{Channel, Producer, StreamHandler};

/// Emits `(latest sampled value, sampler update)` on every sampler
/// update.
///
/// The sampled side's most recent update is cached; each update from
/// the sampler side pairs with that cache and emits. The cache is not
/// cleared by emission — the same sampled value is reused until the
/// sampled side replaces it. Sampler updates arriving before the
/// sampled side has produced anything are dropped.
///
/// Completion: success requires both sides' success values; the first
/// failure from either side fails the sampled stream immediately.
pub fn sample<A, B, SA, SB>(
    sampled: &Channel<A, SA>,
    sampler: &Channel<B, SB>,
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
    let cache: Arc<Mutex<Option<Arc<A>>>> = Arc::new(Mutex::new(None));
    let join = Arc::new(Mutex::new(CompletionJoin::new()));

    let sampled_handler = StreamHandler::new(executor.clone(), {
        let down = down.clone();
        let cache = cache.clone();
        let join = join.clone();
        move |event: StreamEvent<A, SA>| match event {
            StreamEvent::Update(value) => {
                *cache.lock().unwrap() = Some(value);
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
    producer.core().retain(sampled_handler.clone());
    sampled.subscribe_handler(&sampled_handler);

    let sampler_handler = StreamHandler::new(executor.clone(), {
        let down = down.clone();
        let cache = cache.clone();
        let join = join.clone();
        let executor = executor.clone();
        move |event: StreamEvent<B, SB>| match event {
            StreamEvent::Update(value) => {
                let cached = cache.lock().unwrap().clone();
                if let Some(sampled_value) = cached {
                    if let Some(core) = down.upgrade() {
                        core.apply_from(
                            Arc::new((sampled_value, value)),
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
    producer.core().retain(sampler_handler.clone());
    sampler.subscribe_handler(&sampler_handler);

    producer.channel()
}
