// User projection - the content service's denormalized copy of identity
// facts, converged by replication events. Every mutation here is an upsert
// or a delete-if-exists, which is what makes redelivery harmless.

use crate::error::{AppError, AppResult};
use crate::events::UserEventPayload;
use crate::infrastructure::store::KeyValueStore;
use crate::keyspace::{partitions, EntityKey};
use crate::records::{FriendshipRecord, Record, UserProjectionRecord};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct UserProjection {
    store: Arc<dyn KeyValueStore>,
}

impl UserProjection {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Upsert: applying the same creation twice projects exactly one user.
    pub async fn apply_user_upserted(&self, payload: &UserEventPayload) -> AppResult<()> {
        let record = UserProjectionRecord {
            user_id: payload.user_id.clone(),
            email: payload.email.clone(),
            first_name: payload.first_name.clone(),
            last_name: payload.last_name.clone(),
            profile_picture_url: payload.profile_picture_url.clone(),
        };
        self.store.put(record.to_item()?).await?;
        debug!(user_id = %payload.user_id, "user projection upserted");
        Ok(())
    }

    /// Remove the projection row and the user's friendship edges, both
    /// sides. The post-side share of the cascade lives in the board.
    pub async fn apply_user_removed(&self, user_id: &str) -> AppResult<()> {
        for other_id in self.friends_of(user_id).await? {
            self.delete_edge_pair(user_id, &other_id).await?;
        }
        let (pk, sk) = EntityKey::UserInfo {
            user_id: user_id.to_string(),
        }
        .encode();
        self.store.delete(&pk, &sk).await?;
        info!(user_id, "user projection removed");
        Ok(())
    }

    /// Mirror of the identity-side friendship: an accepted edge pair.
    pub async fn apply_friendship_created(&self, user_a: &str, user_b: &str) -> AppResult<()> {
        for (user_id, other_id) in [(user_a, user_b), (user_b, user_a)] {
            let edge = FriendshipRecord {
                user_id: user_id.to_string(),
                other_id: other_id.to_string(),
                incoming: false,
                accepted: true,
            };
            self.store.put(edge.to_item()?).await?;
        }
        debug!(user_a, user_b, "friendship edge projected");
        Ok(())
    }

    pub async fn apply_friendship_deleted(&self, user_a: &str, user_b: &str) -> AppResult<()> {
        self.delete_edge_pair(user_a, user_b).await?;
        debug!(user_a, user_b, "friendship edge removed from projection");
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> AppResult<UserProjectionRecord> {
        self.find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))
    }

    pub async fn find_user(&self, user_id: &str) -> AppResult<Option<UserProjectionRecord>> {
        let (pk, sk) = EntityKey::UserInfo {
            user_id: user_id.to_string(),
        }
        .encode();
        self.store
            .get(&pk, &sk)
            .await?
            .as_ref()
            .map(UserProjectionRecord::from_item)
            .transpose()
    }

    pub async fn friends_of(&self, user_id: &str) -> AppResult<Vec<String>> {
        let items = self
            .store
            .query_partition(&partitions::friendships(user_id))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| match item.key() {
                Some(EntityKey::Friendship { other_id, .. }) => Some(other_id),
                _ => None,
            })
            .collect())
    }

    async fn delete_edge_pair(&self, user_a: &str, user_b: &str) -> AppResult<()> {
        for (user_id, other_id) in [(user_a, user_b), (user_b, user_a)] {
            let (pk, sk) = EntityKey::Friendship {
                user_id: user_id.to_string(),
                other_id: other_id.to_string(),
            }
            .encode();
            self.store.delete(&pk, &sk).await?;
        }
        Ok(())
    }
}
