// Event consumer - converges the content service's replica of identity state
// Runs on a dedicated background task so request handlers never block on the
// queue. A message is acknowledged only after its handler succeeds; a failed
// handler leaves it for redelivery and the queue dead-letters it after the
// bounded receive limit. Unknown kinds are dropped, not retried forever.

use crate::content::board::PostBoard;
use crate::content::projection::UserProjection;
use crate::error::AppResult;
use crate::events::{DecodedMessage, IdentityEvent};
use crate::infrastructure::queue::{MessageQueue, QueueMessage};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct EventConsumer {
    queue: Arc<dyn MessageQueue>,
    projection: UserProjection,
    board: PostBoard,
    batch_size: usize,
    wait: Duration,
}

impl EventConsumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        projection: UserProjection,
        board: PostBoard,
        batch_size: usize,
        wait: Duration,
    ) -> Self {
        Self {
            queue,
            projection,
            board,
            batch_size,
            wait,
        }
    }

    /// Start the poll loop on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("event consumer started");
            loop {
                match self.queue.receive(self.batch_size, self.wait).await {
                    Ok(messages) => {
                        for message in messages {
                            self.process(message).await;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "queue receive failed, backing off");
                        let jitter = rand::rng().random_range(0..500);
                        tokio::time::sleep(ERROR_BACKOFF + Duration::from_millis(jitter)).await;
                    }
                }
            }
        })
    }

    /// Drain everything currently deliverable. Used by tests and shutdown
    /// paths that need deterministic convergence instead of a live loop.
    pub async fn drain(&self) -> AppResult<usize> {
        let mut processed = 0;
        loop {
            let messages = self
                .queue
                .receive(self.batch_size, Duration::from_millis(1))
                .await?;
            if messages.is_empty() {
                return Ok(processed);
            }
            for message in messages {
                self.process(message).await;
                processed += 1;
            }
        }
    }

    async fn process(&self, message: QueueMessage) {
        match IdentityEvent::decode(&message) {
            Ok(DecodedMessage::Event(event)) => {
                let kind = event.kind();
                match self.apply(event).await {
                    Ok(()) => {
                        debug!(kind, "event applied");
                        self.acknowledge(&message).await;
                    }
                    Err(e) => {
                        // No local retry loop: redelivery after the
                        // visibility timeout is the retry mechanism.
                        error!(kind, error = %e, "handler failed, leaving message for redelivery");
                    }
                }
            }
            Ok(DecodedMessage::UnknownKind(kind)) => {
                warn!(kind = %kind, "unknown event kind, dropping message");
                self.acknowledge(&message).await;
            }
            Err(e) => {
                error!(
                    error = %e,
                    receive_count = message.receive_count,
                    "malformed event payload, leaving message for the dead-letter path"
                );
            }
        }
    }

    /// Idempotent application of one event; redelivery must converge to the
    /// same state.
    pub async fn apply(&self, event: IdentityEvent) -> AppResult<()> {
        match event {
            IdentityEvent::UserCreated(payload) | IdentityEvent::UserUpdated(payload) => {
                self.projection.apply_user_upserted(&payload).await
            }
            IdentityEvent::UserDeleted(payload) => {
                self.board.purge_user_content(&payload.user_id).await?;
                self.projection.apply_user_removed(&payload.user_id).await
            }
            IdentityEvent::FriendshipCreated(payload) => {
                self.projection
                    .apply_friendship_created(&payload.user_a_id, &payload.user_b_id)
                    .await
            }
            IdentityEvent::FriendshipDeleted(payload) => {
                self.projection
                    .apply_friendship_deleted(&payload.user_a_id, &payload.user_b_id)
                    .await
            }
        }
    }

    async fn acknowledge(&self, message: &QueueMessage) {
        match self.queue.acknowledge(&message.receipt).await {
            Ok(true) => {}
            Ok(false) => warn!("acknowledgement receipt was stale"),
            Err(e) => error!(error = %e, "failed to acknowledge message"),
        }
    }
}
