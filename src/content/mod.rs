// Content service - owns posts, comments, likes and pins, and keeps a
// projection of identity state converged through the event queue.

pub mod api;
pub mod board;
pub mod consumer;
pub mod projection;

pub use api::create_content_router;
pub use board::{CommentDraft, PostBoard, PostDraft};
pub use consumer::EventConsumer;
pub use projection::UserProjection;

use crate::infrastructure::queue::MessageQueue;
use crate::infrastructure::store::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct ContentState {
    pub board: PostBoard,
    pub projection: UserProjection,
}

impl ContentState {
    pub fn new(store: Arc<dyn KeyValueStore>, daily_ttl_minutes: bool) -> Self {
        Self {
            board: PostBoard::new(store.clone(), daily_ttl_minutes),
            projection: UserProjection::new(store),
        }
    }

    /// Build the consumer for this state's replica; the caller decides
    /// whether to `spawn` it or drive it with `drain`.
    pub fn consumer(
        &self,
        queue: Arc<dyn MessageQueue>,
        batch_size: usize,
        wait: Duration,
    ) -> EventConsumer {
        EventConsumer::new(
            queue,
            self.projection.clone(),
            self.board.clone(),
            batch_size,
            wait,
        )
    }
}
