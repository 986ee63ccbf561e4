//! The scheduling contract consumed by every primitive in weft.
//!
//! Weft never creates threads of its own and never blocks inside a
//! primitive: all mutation happens on the calling thread, and *delivery*
//! of values to subscribers is handed to the subscriber's [`Executor`].
//! An executor may run the task immediately on the calling thread, later
//! on some other thread, or after a delay — weft is agnostic as long as
//! the contract below holds.
//!
//! Two implementations ship with the crate: [`InlineExecutor`] for
//! synchronous delivery (tests, simple pipelines) and [`ThreadExecutor`],
//! a serial worker queue. Host applications integrate their own runtimes
//! by implementing [`Executor`].

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

/// A unit of work handed to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// External scheduling collaborator.
///
/// Implementations must be safe to call from any thread.
pub trait Executor: Send + Sync + 'static {
    /// Runs `task` now or later, per the executor's own policy.
    fn execute(&self, task: Task);

    /// Runs `task` no earlier than `delay` from now.
    fn execute_after(&self, delay: Duration, task: Task);

    /// Reports whether a task submitted from `caller`'s context may be
    /// run synchronously on the calling thread without violating this
    /// executor's ordering or affinity guarantees.
    ///
    /// Used by combinators as a fast path; the conservative default is
    /// `false`.
    fn can_run_synchronously_from(&self, _caller: &dyn Executor) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// InlineExecutor
// ---------------------------------------------------------------------------

/// Runs every task immediately on the calling thread.
///
/// Delayed tasks are handed to a sleeper thread and run there on expiry.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use weft::executor::{Executor, InlineExecutor};
///
/// let exec = InlineExecutor::shared();
/// let ran = Arc::new(AtomicBool::new(false));
/// let flag = ran.clone();
/// exec.execute(Box::new(move || flag.store(true, Ordering::SeqCst)));
/// // Inline delivery: the task already ran.
/// assert!(ran.load(Ordering::SeqCst));
/// ```
#[derive(Debug, Default)]
pub struct InlineExecutor;

impl InlineExecutor {
    /// A shared handle to the inline executor.
    pub fn shared() -> Arc<dyn Executor> {
        Arc::new(InlineExecutor)
    }
}

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        task();
    }

    fn execute_after(&self, delay: Duration, task: Task) {
        thread::spawn(move || {
            thread::sleep(delay);
            task();
        });
    }

    fn can_run_synchronously_from(&self, _caller: &dyn Executor) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// ThreadExecutor
// ---------------------------------------------------------------------------

struct WorkQueue {
    tasks: Mutex<TaskSlot>,
    available: Condvar,
}

struct TaskSlot {
    queue: VecDeque<Task>,
    shutdown: bool,
}

impl WorkQueue {
    fn push(&self, task: Task) {
        let mut slot = self.tasks.lock().unwrap();
        if slot.shutdown {
            return;
        }
        slot.queue.push_back(task);
        drop(slot);
        self.available.notify_one();
    }
}

/// A serial executor backed by one worker thread.
///
/// Tasks run in submission order, one at a time. [`execute_after`]
/// hands the task to a sleeper thread that enqueues it on expiry, so
/// delayed tasks join the same serial queue when their time comes.
///
/// Dropping the last handle shuts the worker down after it drains the
/// tasks already queued.
///
/// [`execute_after`]: Executor::execute_after
pub struct ThreadExecutor {
    queue: Arc<WorkQueue>,
}

impl ThreadExecutor {
    /// Spawns the worker thread and returns a handle.
    pub fn new(name: &str) -> Arc<Self> {
        let queue = Arc::new(WorkQueue {
            tasks: Mutex::new(TaskSlot {
                queue: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        });

        let worker_queue = queue.clone();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                let task = {
                    let mut slot = worker_queue.tasks.lock().unwrap();
                    loop {
                        if let Some(task) = slot.queue.pop_front() {
                            break task;
                        }
                        if slot.shutdown {
                            return;
                        }
                        slot = worker_queue.available.wait(slot).unwrap();
                    }
                };
                task();
            })
            .expect("failed to spawn executor worker thread");

        Arc::new(Self { queue })
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) {
        self.queue.push(task);
    }

    fn execute_after(&self, delay: Duration, task: Task) {
        let queue = self.queue.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            queue.push(task);
        });
    }

    // can_run_synchronously_from stays at the conservative default:
    // running a task on the calling thread would let it overtake work
    // already sitting in the serial queue.
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        let mut slot = self.queue.tasks.lock().unwrap();
        slot.shutdown = true;
        drop(slot);
        self.queue.available.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn thread_executor_preserves_submission_order() {
        let exec = ThreadExecutor::new("order-test");
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..16 {
            let log = log.clone();
            exec.execute(Box::new(move || log.lock().unwrap().push(i)));
        }
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        exec.execute(Box::new(move || done_tx.send(()).unwrap()));
        done_rx.recv().unwrap();
        assert_eq!(*log.lock().unwrap(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn execute_after_runs_eventually() {
        let exec = ThreadExecutor::new("delay-test");
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        exec.execute_after(
            Duration::from_millis(10),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while counter.load(Ordering::SeqCst) == 0 {
            assert!(std::time::Instant::now() < deadline, "delayed task never ran");
            thread::sleep(Duration::from_millis(5));
        }
    }
}
