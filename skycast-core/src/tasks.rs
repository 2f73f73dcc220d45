//! Keyed async tasks whose results come back as messages.
//!
//! Spawning under a key that is already running aborts the previous task, so
//! at most one fetch and one search are ever in flight. Aborting is
//! best-effort: a task that already produced its message may still deliver
//! it, which is why fetch results also carry a generation.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

/// Identifies a task for cancellation and replacement.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskKey(&'static str);

impl TaskKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }
}

impl From<&'static str> for TaskKey {
    fn from(s: &'static str) -> Self {
        Self(s)
    }
}

/// Registry of running tasks by key. Dropping it aborts everything.
pub struct TaskManager<M> {
    tasks: HashMap<TaskKey, AbortHandle>,
    tx: mpsc::UnboundedSender<M>,
}

impl<M> TaskManager<M>
where
    M: Send + 'static,
{
    /// `tx` carries each finished task's message back to the owner's loop.
    pub fn new(tx: mpsc::UnboundedSender<M>) -> Self {
        Self {
            tasks: HashMap::new(),
            tx,
        }
    }

    /// Spawn a task, cancelling any existing task with the same key.
    pub fn spawn<F>(&mut self, key: impl Into<TaskKey>, future: F) -> &mut Self
    where
        F: Future<Output = M> + Send + 'static,
    {
        let key = key.into();
        self.cancel(&key);

        let tx = self.tx.clone();
        let handle: JoinHandle<()> = tokio::spawn(async move {
            let msg = future.await;
            let _ = tx.send(msg);
        });

        self.tasks.insert(key, handle.abort_handle());
        self
    }

    /// Spawn a task that first waits `duration`. Calling again with the same key
    /// before it fires restarts the wait.
    pub fn debounce<F>(
        &mut self,
        key: impl Into<TaskKey>,
        duration: Duration,
        future: F,
    ) -> &mut Self
    where
        F: Future<Output = M> + Send + 'static,
    {
        self.spawn(key, async move {
            tokio::time::sleep(duration).await;
            future.await
        })
    }

    /// No-op if nothing runs under `key`.
    pub fn cancel(&mut self, key: &TaskKey) {
        if let Some(handle) = self.tasks.remove(key) {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }

    /// True while a task under `key` has not finished or been cancelled.
    pub fn is_running(&self, key: &TaskKey) -> bool {
        self.tasks.get(key).is_some_and(|h| !h.is_finished())
    }

    pub fn len(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<M> Drop for TaskManager<M> {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}
