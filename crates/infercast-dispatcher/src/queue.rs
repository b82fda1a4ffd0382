use infercast_common::{CompletionRequest, InfercastError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex, Notify};

enum Message {
    Job(CompletionRequest),
    /// End-of-work marker; each worker consumes exactly one and exits
    Shutdown,
}

/// FIFO work queue shared by the worker pool.
///
/// Tracks unfinished items separately from queued ones: an item counts as
/// finished only when a worker calls [`task_done`](Self::task_done) after
/// storing its outcome, and [`join`](Self::join) waits for that, not for the
/// channel to empty.
pub struct WorkQueue {
    sender: mpsc::Sender<Message>,
    receiver: Mutex<mpsc::Receiver<Message>>,
    unfinished: AtomicUsize,
    drained: Notify,
}

impl WorkQueue {
    /// Creates a queue able to hold `batch_size` jobs plus `workers` markers
    /// without ever blocking the producer.
    pub fn new(batch_size: usize, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel((batch_size + workers).max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            unfinished: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    pub async fn put(&self, request: CompletionRequest) -> Result<()> {
        self.unfinished.fetch_add(1, Ordering::AcqRel);
        if self.sender.send(Message::Job(request)).await.is_err() {
            self.task_done();
            return Err(InfercastError::Transport("work queue closed".to_string()));
        }
        Ok(())
    }

    /// Dequeues the next job and runs `assign` before releasing the queue.
    ///
    /// Dequeue and assignment happen under one lock, so the i-th job taken
    /// off the queue is paired with the i-th value `assign` produces.
    /// Blocks while the queue is empty; returns `None` on the end-of-work marker.
    pub async fn next_with<F, R>(&self, assign: F) -> Option<(CompletionRequest, R)>
    where
        F: FnOnce() -> R,
    {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await? {
            Message::Job(request) => Some((request, assign())),
            Message::Shutdown => None,
        }
    }

    /// Returns a guard that marks one dequeued job done when dropped.
    ///
    /// The job counts as done on unwinding too, so a panicking worker
    /// cannot stall [`join`](Self::join).
    pub fn task_guard(&self) -> TaskGuard<'_> {
        TaskGuard { queue: self }
    }

    /// Marks one dequeued job as fully processed.
    pub fn task_done(&self) {
        if self.unfinished.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_one();
        }
    }

    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::Acquire)
    }

    /// Waits until every job put on the queue has been marked done.
    pub async fn join(&self) {
        while self.unfinished() > 0 {
            self.drained.notified().await;
        }
    }

    /// Sends one end-of-work marker per worker.
    pub async fn close(&self, workers: usize) -> Result<()> {
        for _ in 0..workers {
            self.sender
                .send(Message::Shutdown)
                .await
                .map_err(|_| InfercastError::Transport("work queue closed".to_string()))?;
        }
        Ok(())
    }
}

/// Calls [`WorkQueue::task_done`] on drop.
#[must_use = "the job is marked done as soon as the guard is dropped"]
pub struct TaskGuard<'a> {
    queue: &'a WorkQueue,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}
