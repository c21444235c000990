// Identity service - owns user profiles and the social graph, publishes
// replication events for the content service to consume.

pub mod api;
pub mod directory;
pub mod graph;
pub mod publisher;

pub use api::create_identity_router;
pub use directory::{EducationDraft, JobDraft, UserDirectory, UserProfileDraft};
pub use graph::SocialGraph;
pub use publisher::EventPublisher;

use crate::infrastructure::queue::MessageQueue;
use crate::infrastructure::store::KeyValueStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct IdentityState {
    pub directory: UserDirectory,
    pub graph: SocialGraph,
}

impl IdentityState {
    pub fn new(store: Arc<dyn KeyValueStore>, queue: Arc<dyn MessageQueue>) -> Self {
        let publisher = EventPublisher::new(queue);
        Self {
            directory: UserDirectory::new(store.clone(), publisher.clone()),
            graph: SocialGraph::new(store, publisher),
        }
    }
}
