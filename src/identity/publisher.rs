use crate::error::AppResult;
use crate::events::IdentityEvent;
use crate::infrastructure::queue::MessageQueue;
use std::sync::Arc;
use tracing::{error, info};

/// Outbound side of replication. Callers publish only after the local
/// mutation the event describes has committed, so the queue never advertises
/// state the identity store does not hold.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    queue: Arc<dyn MessageQueue>,
}

impl EventPublisher {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self { queue }
    }

    pub async fn publish(&self, event: IdentityEvent) -> AppResult<()> {
        let kind = event.kind();
        let (body, attributes) = event.to_wire()?;
        match self.queue.publish(body, attributes).await {
            Ok(()) => {
                info!(kind, "published identity event");
                Ok(())
            }
            Err(e) => {
                error!(kind, error = %e, "failed to publish identity event");
                Err(e)
            }
        }
    }
}
