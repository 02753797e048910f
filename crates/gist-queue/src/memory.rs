//! In-process queue with the same visibility-timeout semantics.
//!
//! Used by the worker's tests and for running the pipeline without Redis.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{QueueError, QueueResult};
use crate::queue::{QueueClient, ReceivedMessage};

#[derive(Default)]
struct QueueState {
    visible: VecDeque<ReceivedMessage>,
    in_flight: HashMap<String, (ReceivedMessage, Instant)>,
    deletes: HashMap<String, u32>,
    receives: u64,
}

impl QueueState {
    /// Return expired in-flight messages to the head of the queue.
    fn restore_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some((message, _)) = self.in_flight.remove(&id) {
                self.visible.push_front(message);
            }
        }
    }
}

/// Thread-safe in-memory queue set keyed by queue name.
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
    visibility_timeout: Duration,
    next_id: AtomicU64,
}

impl InMemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            visibility_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    fn with_queue<T>(&self, queue: &str, f: impl FnOnce(&mut QueueState) -> T) -> QueueResult<T> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| QueueError::connection_failed("in-memory queue lock poisoned"))?;
        Ok(f(queues.entry(queue.to_string()).or_default()))
    }

    /// Number of times `message_id` has been deleted.
    pub fn delete_count(&self, queue: &str, message_id: &str) -> u32 {
        self.with_queue(queue, |q| q.deletes.get(message_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Messages not yet deleted (visible or in flight).
    pub fn outstanding(&self, queue: &str) -> usize {
        self.with_queue(queue, |q| q.visible.len() + q.in_flight.len())
            .unwrap_or(0)
    }

    /// Total number of successful receives on `queue`.
    pub fn receive_count(&self, queue: &str) -> u64 {
        self.with_queue(queue, |q| q.receives).unwrap_or(0)
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(900))
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn receive(&self, queue: &str) -> QueueResult<Option<ReceivedMessage>> {
        let visibility_timeout = self.visibility_timeout;
        self.with_queue(queue, |q| {
            let now = Instant::now();
            q.restore_expired(now);

            let message = q.visible.pop_front()?;
            q.in_flight
                .insert(message.id.clone(), (message.clone(), now + visibility_timeout));
            q.receives += 1;
            Some(message)
        })
    }

    async fn delete(&self, queue: &str, message_id: &str) -> QueueResult<()> {
        self.with_queue(queue, |q| {
            q.in_flight.remove(message_id);
            q.visible.retain(|m| m.id != message_id);
            *q.deletes.entry(message_id.to_string()).or_insert(0) += 1;
        })
    }

    async fn send(&self, queue: &str, body: &str) -> QueueResult<String> {
        let id = format!("{}-0", self.next_id.fetch_add(1, Ordering::SeqCst));
        let message = ReceivedMessage {
            id: id.clone(),
            body: body.to_string(),
        };
        self.with_queue(queue, |q| q.visible.push_back(message))?;
        Ok(id)
    }
}
