// Message queue interface - at-least-once delivery with attribute routing
// The in-process implementation mirrors the managed-queue contract the
// services are written against: visibility timeout, redelivery, and a
// dead-letter buffer for messages that keep failing.

use crate::error::AppResult;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

/// A delivered message. The receipt identifies this delivery (not the
/// message) and is what `acknowledge` consumes; redelivery invalidates any
/// prior receipt.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub receipt: String,
    pub body: String,
    pub attributes: HashMap<String, String>,
    pub receive_count: u32,
}

#[async_trait]
pub trait MessageQueue: Send + Sync + fmt::Debug {
    async fn publish(&self, body: String, attributes: HashMap<String, String>) -> AppResult<()>;

    /// Long-poll for up to `wait`, returning at most `max_messages`. Returns
    /// early as soon as anything is deliverable. Delivered messages stay
    /// invisible for the queue's visibility timeout, then reappear unless
    /// acknowledged.
    async fn receive(&self, max_messages: usize, wait: Duration) -> AppResult<Vec<QueueMessage>>;

    /// Remove a delivered message. Returns false when the receipt is stale
    /// (the message was already acknowledged or redelivered).
    async fn acknowledge(&self, receipt: &str) -> AppResult<bool>;
}

#[derive(Debug, Clone)]
struct PendingMessage {
    id: String,
    body: String,
    attributes: HashMap<String, String>,
    visible_at: Instant,
    receive_count: u32,
    receipt: Option<String>,
}

/// A message that exhausted its deliveries without being acknowledged.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub id: String,
    pub body: String,
    pub attributes: HashMap<String, String>,
    pub receive_count: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<PendingMessage>,
    dead_letters: Vec<DeadLetter>,
}

/// In-process queue with the same observable behavior as a managed
/// at-least-once queue: unordered across kinds, redelivery on missing ack,
/// dead-letter after a bounded receive count.
#[derive(Debug, Clone)]
pub struct InProcessQueue {
    state: Arc<Mutex<QueueState>>,
    visibility_timeout: Duration,
    max_receives: u32,
}

const POLL_INTERVAL: Duration = Duration::from_millis(25);

impl InProcessQueue {
    pub fn new(visibility_timeout: Duration, max_receives: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            visibility_timeout,
            max_receives: max_receives.max(1),
        }
    }

    /// Messages that exceeded the receive limit. Order is arrival order.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead_letters.clone()
    }

    /// Number of messages still queued or in flight.
    pub async fn depth(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    async fn try_receive(&self, max_messages: usize) -> Vec<QueueMessage> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let mut delivered = Vec::new();
        let mut index = 0;

        while index < state.messages.len() && delivered.len() < max_messages {
            if state.messages[index].visible_at > now {
                index += 1;
                continue;
            }

            if state.messages[index].receive_count >= self.max_receives {
                if let Some(message) = state.messages.remove(index) {
                    warn!(
                        message_id = %message.id,
                        receive_count = message.receive_count,
                        "message exceeded receive limit, moving to dead-letter buffer"
                    );
                    state.dead_letters.push(DeadLetter {
                        id: message.id,
                        body: message.body,
                        attributes: message.attributes,
                        receive_count: message.receive_count,
                    });
                }
                continue;
            }

            let receipt = Uuid::new_v4().to_string();
            let message = &mut state.messages[index];
            message.receive_count += 1;
            message.visible_at = now + self.visibility_timeout;
            message.receipt = Some(receipt.clone());
            delivered.push(QueueMessage {
                receipt,
                body: message.body.clone(),
                attributes: message.attributes.clone(),
                receive_count: message.receive_count,
            });
            index += 1;
        }

        delivered
    }
}

#[async_trait]
impl MessageQueue for InProcessQueue {
    async fn publish(&self, body: String, attributes: HashMap<String, String>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.messages.push_back(PendingMessage {
            id: Uuid::new_v4().to_string(),
            body,
            attributes,
            visible_at: Instant::now(),
            receive_count: 0,
            receipt: None,
        });
        Ok(())
    }

    async fn receive(&self, max_messages: usize, wait: Duration) -> AppResult<Vec<QueueMessage>> {
        let deadline = Instant::now() + wait;
        loop {
            let delivered = self.try_receive(max_messages).await;
            if !delivered.is_empty() {
                return Ok(delivered);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn acknowledge(&self, receipt: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let position = state
            .messages
            .iter()
            .position(|message| message.receipt.as_deref() == Some(receipt));
        match position {
            Some(index) => {
                state.messages.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(kind: &str) -> HashMap<String, String> {
        HashMap::from([("eventType".to_string(), kind.to_string())])
    }

    #[tokio::test]
    async fn test_publish_receive_acknowledge() {
        let queue = InProcessQueue::new(Duration::from_secs(30), 5);
        queue.publish("{}".into(), attrs("USER_CREATED")).await.unwrap();

        let messages = queue.receive(10, Duration::from_millis(10)).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].attributes["eventType"], "USER_CREATED");
        assert_eq!(messages[0].receive_count, 1);

        assert!(queue.acknowledge(&messages[0].receipt).await.unwrap());
        assert_eq!(queue.depth().await, 0);
        // Stale receipt after acknowledgement.
        assert!(!queue.acknowledge(&messages[0].receipt).await.unwrap());
    }

    #[tokio::test]
    async fn test_unacknowledged_message_is_redelivered() {
        let queue = InProcessQueue::new(Duration::from_millis(20), 5);
        queue.publish("{}".into(), attrs("USER_CREATED")).await.unwrap();

        let first = queue.receive(10, Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.len(), 1);
        // Invisible while the timeout runs.
        assert!(queue.receive(10, Duration::from_millis(5)).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = queue.receive(10, Duration::from_millis(10)).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].receive_count, 2);
        // The first delivery's receipt no longer acknowledges anything.
        assert!(!queue.acknowledge(&first[0].receipt).await.unwrap());
        assert!(queue.acknowledge(&second[0].receipt).await.unwrap());
    }

    #[tokio::test]
    async fn test_dead_letter_after_receive_limit() {
        let queue = InProcessQueue::new(Duration::from_millis(1), 2);
        queue.publish("broken".into(), attrs("USER_CREATED")).await.unwrap();

        for _ in 0..2 {
            let messages = queue.receive(10, Duration::from_millis(10)).await.unwrap();
            assert_eq!(messages.len(), 1);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Third attempt moves it to the dead-letter buffer instead.
        assert!(queue.receive(10, Duration::from_millis(10)).await.unwrap().is_empty());
        let dead = queue.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].body, "broken");
        assert_eq!(dead[0].receive_count, 2);
        assert_eq!(queue.depth().await, 0);
    }

    #[tokio::test]
    async fn test_receive_respects_batch_size() {
        let queue = InProcessQueue::new(Duration::from_secs(30), 5);
        for i in 0..5 {
            queue.publish(format!("m{}", i), attrs("USER_CREATED")).await.unwrap();
        }
        let batch = queue.receive(3, Duration::from_millis(10)).await.unwrap();
        assert_eq!(batch.len(), 3);
    }
}
