//! Coalescing task queue
//!
//! A single worker thread executes deferred tasks. `push_unique` replaces
//! any still-pending task with the same key, so rapid repeats of an
//! idempotent request (bulk stop, for one) collapse into a single
//! execution. No ordering is guaranteed beyond "runs once, eventually,
//! after enqueue".

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use tracing::trace;

type Task = Box<dyn FnOnce() + Send>;

struct Shared {
    pending: Mutex<Pending>,
    cvar: Condvar,
}

struct Pending {
    tasks: VecDeque<(String, Task)>,
    shutdown: bool,
}

pub struct TaskQueue {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending {
                tasks: VecDeque::new(),
                shutdown: false,
            }),
            cvar: Condvar::new(),
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("blare-task-queue".into())
            .spawn(move || worker_loop(&worker_shared))
            .ok();

        Self { shared, worker }
    }

    /// Enqueue `task`, replacing any pending task with the same key
    pub fn push_unique(&self, key: &str, task: impl FnOnce() + Send + 'static) {
        let mut pending = self.shared.pending.lock().unwrap();
        if let Some(slot) = pending.tasks.iter_mut().find(|(k, _)| k == key) {
            trace!(key, "coalescing pending task");
            slot.1 = Box::new(task);
        } else {
            pending.tasks.push_back((key.to_string(), Box::new(task)));
        }
        drop(pending);
        self.shared.cvar.notify_one();
    }

    /// Number of tasks not yet started
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().unwrap().tasks.len()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shared.pending.lock().unwrap().shutdown = true;
        self.shared.cvar.notify_one();
        if let Some(worker) = self.worker.take() {
            // A task may own the last handle to its own queue; the worker
            // cannot join itself, so detach and let the loop see `shutdown`.
            if thread::current().id() == worker.thread().id() {
                return;
            }
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut pending = shared.pending.lock().unwrap();
            loop {
                if let Some((_, task)) = pending.tasks.pop_front() {
                    break task;
                }
                if pending.shutdown {
                    return;
                }
                pending = shared.cvar.wait(pending).unwrap();
            }
        };
        task();
    }
}
