// Social graph - follow edges and the friendship state machine
// Edges are always written as symmetric pairs; there is no multi-key
// transaction, so a crash between the two writes leaves a half-pair that the
// delete paths tolerate (every removal is delete-if-exists on both sides).

use crate::error::{AppError, AppResult};
use crate::events::{FriendshipEventPayload, IdentityEvent};
use crate::identity::publisher::EventPublisher;
use crate::infrastructure::store::{KeyValueStore, StoreItem};
use crate::keyspace::{partitions, EntityKey};
use crate::records::{FriendshipRecord, Record, UserRecord};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct SocialGraph {
    store: Arc<dyn KeyValueStore>,
    publisher: EventPublisher,
}

impl SocialGraph {
    pub fn new(store: Arc<dyn KeyValueStore>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    // =========================================================================
    // FOLLOW EDGES
    // =========================================================================

    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        if follower_id == followee_id {
            return Err(AppError::SelfReference("cannot follow yourself".into()));
        }
        if !self.user_exists(followee_id).await? {
            return Err(AppError::NotFound(format!("user {} not found", followee_id)));
        }
        if self.is_following(follower_id, followee_id).await? {
            debug!(follower_id, followee_id, "follow edge already present");
            return Ok(());
        }

        let following = EntityKey::Following {
            user_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
        };
        let follower = EntityKey::Follower {
            user_id: followee_id.to_string(),
            follower_id: follower_id.to_string(),
        };
        self.store.put(StoreItem::existence(&following)).await?;
        self.store.put(StoreItem::existence(&follower)).await?;

        adjust_following_count(self.store.as_ref(), follower_id, 1).await?;
        adjust_follower_count(self.store.as_ref(), followee_id, 1).await?;
        info!(follower_id, followee_id, "follow edge created");
        Ok(())
    }

    /// Idempotent: unfollowing an absent edge is a no-op and leaves the
    /// counters untouched.
    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        let (following_pk, following_sk) = EntityKey::Following {
            user_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
        }
        .encode();
        let (follower_pk, follower_sk) = EntityKey::Follower {
            user_id: followee_id.to_string(),
            follower_id: follower_id.to_string(),
        }
        .encode();

        let existed = self.store.delete(&following_pk, &following_sk).await?;
        self.store.delete(&follower_pk, &follower_sk).await?;
        if existed {
            adjust_following_count(self.store.as_ref(), follower_id, -1).await?;
            adjust_follower_count(self.store.as_ref(), followee_id, -1).await?;
            info!(follower_id, followee_id, "follow edge removed");
        }
        Ok(())
    }

    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        let (pk, sk) = EntityKey::Following {
            user_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
        }
        .encode();
        Ok(self.store.get(&pk, &sk).await?.is_some())
    }

    pub async fn followers_of(&self, user_id: &str) -> AppResult<Vec<String>> {
        let items = self
            .store
            .query_partition(&partitions::followers(user_id))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| match item.key() {
                Some(EntityKey::Follower { follower_id, .. }) => Some(follower_id),
                _ => None,
            })
            .collect())
    }

    pub async fn following_of(&self, user_id: &str) -> AppResult<Vec<String>> {
        let items = self
            .store
            .query_partition(&partitions::following(user_id))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| match item.key() {
                Some(EntityKey::Following { followee_id, .. }) => Some(followee_id),
                _ => None,
            })
            .collect())
    }

    // =========================================================================
    // FRIENDSHIP STATE MACHINE
    // =========================================================================
    // Transitions: send -> (accept | decline | cancel), accepted -> remove.
    // Decline belongs to the receiver, cancel to the sender, remove to either
    // friend. Each transition is idempotent: re-running it after success is a
    // no-op, never an error.

    pub async fn send_friend_request(&self, sender_id: &str, receiver_id: &str) -> AppResult<()> {
        if sender_id == receiver_id {
            return Err(AppError::SelfReference("cannot friend yourself".into()));
        }
        if !self.user_exists(receiver_id).await? {
            return Err(AppError::NotFound(format!("user {} not found", receiver_id)));
        }

        // A pair in either direction blocks a new request.
        let (sender_side, receiver_side) = self.friendship_rows(sender_id, receiver_id).await?;
        if let Some(row) = sender_side.as_ref().or(receiver_side.as_ref()) {
            return if row.accepted {
                Err(AppError::AlreadyFriends(format!(
                    "{} and {} are already friends",
                    sender_id, receiver_id
                )))
            } else {
                Err(AppError::RequestAlreadyPending(format!(
                    "a friend request between {} and {} is already pending",
                    sender_id, receiver_id
                )))
            };
        }

        let outgoing = FriendshipRecord {
            user_id: sender_id.to_string(),
            other_id: receiver_id.to_string(),
            incoming: false,
            accepted: false,
        };
        let incoming = FriendshipRecord {
            user_id: receiver_id.to_string(),
            other_id: sender_id.to_string(),
            incoming: true,
            accepted: false,
        };
        self.store.put(outgoing.to_item()?).await?;
        self.store.put(incoming.to_item()?).await?;
        info!(sender_id, receiver_id, "friend request created");
        Ok(())
    }

    pub async fn accept_friend_request(
        &self,
        accepter_id: &str,
        requester_id: &str,
    ) -> AppResult<()> {
        let (accepter_side, requester_side) =
            self.friendship_rows(accepter_id, requester_id).await?;
        let (mut accepter_row, mut requester_row) = match (accepter_side, requester_side) {
            (Some(a), Some(r)) if !a.accepted && a.incoming => (a, r),
            _ => {
                return Err(AppError::NoSuchRequest(format!(
                    "no pending friend request from {} to {}",
                    requester_id, accepter_id
                )))
            }
        };

        accepter_row.accepted = true;
        requester_row.accepted = true;
        self.store.put(accepter_row.to_item()?).await?;
        self.store.put(requester_row.to_item()?).await?;
        info!(accepter_id, requester_id, "friend request accepted");

        self.publisher
            .publish(IdentityEvent::FriendshipCreated(FriendshipEventPayload {
                user_a_id: requester_id.to_string(),
                user_b_id: accepter_id.to_string(),
            }))
            .await
    }

    /// Receiver-side rejection of a pending request. A request that is
    /// already gone is a no-op; a request in the other direction is not the
    /// decliner's to reject.
    pub async fn decline_friend_request(
        &self,
        decliner_id: &str,
        requester_id: &str,
    ) -> AppResult<()> {
        let (decliner_side, requester_side) =
            self.friendship_rows(decliner_id, requester_id).await?;
        if decliner_side.is_none() && requester_side.is_none() {
            return Ok(());
        }
        let accepted = decliner_side.as_ref().map(|row| row.accepted).unwrap_or(false)
            || requester_side.as_ref().map(|row| row.accepted).unwrap_or(false);
        let owns_incoming = decliner_side.as_ref().map(|row| row.incoming).unwrap_or(false);
        if accepted || !owns_incoming {
            return Err(AppError::NoSuchRequest(format!(
                "no pending friend request from {} to {}",
                requester_id, decliner_id
            )));
        }
        self.delete_friendship_rows(decliner_id, requester_id).await?;
        info!(decliner_id, requester_id, "friend request declined");
        Ok(())
    }

    /// Sender-side withdrawal of a pending request; the mirror of decline.
    pub async fn cancel_friend_request(&self, sender_id: &str, receiver_id: &str) -> AppResult<()> {
        let (sender_side, receiver_side) = self.friendship_rows(sender_id, receiver_id).await?;
        if sender_side.is_none() && receiver_side.is_none() {
            return Ok(());
        }
        let accepted = sender_side.as_ref().map(|row| row.accepted).unwrap_or(false)
            || receiver_side.as_ref().map(|row| row.accepted).unwrap_or(false);
        let owns_outgoing = sender_side.as_ref().map(|row| !row.incoming).unwrap_or(false);
        if accepted || !owns_outgoing {
            return Err(AppError::NoSuchRequest(format!(
                "no pending friend request from {} to {}",
                sender_id, receiver_id
            )));
        }
        self.delete_friendship_rows(sender_id, receiver_id).await?;
        info!(sender_id, receiver_id, "friend request cancelled");
        Ok(())
    }

    /// Removes an accepted friendship. This is the only deletion that
    /// publishes, because only accepted pairs were ever advertised.
    pub async fn remove_friend(&self, user_id: &str, friend_id: &str) -> AppResult<()> {
        if !self.is_friend(user_id, friend_id).await? {
            return Ok(());
        }
        self.delete_friendship_rows(user_id, friend_id).await?;
        info!(user_id, friend_id, "friendship removed");
        self.publisher
            .publish(IdentityEvent::FriendshipDeleted(FriendshipEventPayload {
                user_a_id: user_id.to_string(),
                user_b_id: friend_id.to_string(),
            }))
            .await
    }

    /// Accepted means both sides agree; a half-written pair does not count.
    pub async fn is_friend(&self, user_id: &str, other_id: &str) -> AppResult<bool> {
        let (mine, theirs) = self.friendship_rows(user_id, other_id).await?;
        Ok(mine.map(|row| row.accepted).unwrap_or(false)
            && theirs.map(|row| row.accepted).unwrap_or(false))
    }

    pub async fn friends_of(&self, user_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .friendship_partition(user_id)
            .await?
            .into_iter()
            .filter(|row| row.accepted)
            .map(|row| row.other_id)
            .collect())
    }

    pub async fn incoming_requests(&self, user_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .friendship_partition(user_id)
            .await?
            .into_iter()
            .filter(|row| !row.accepted && row.incoming)
            .map(|row| row.other_id)
            .collect())
    }

    pub async fn outgoing_requests(&self, user_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .friendship_partition(user_id)
            .await?
            .into_iter()
            .filter(|row| !row.accepted && !row.incoming)
            .map(|row| row.other_id)
            .collect())
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    async fn user_exists(&self, user_id: &str) -> AppResult<bool> {
        let (pk, sk) = EntityKey::UserInfo {
            user_id: user_id.to_string(),
        }
        .encode();
        Ok(self.store.get(&pk, &sk).await?.is_some())
    }

    async fn friendship_partition(&self, user_id: &str) -> AppResult<Vec<FriendshipRecord>> {
        let items = self
            .store
            .query_partition(&partitions::friendships(user_id))
            .await?;
        items.iter().map(FriendshipRecord::from_item).collect()
    }

    /// Both rows of the pair: (user's row about other, other's row about user).
    async fn friendship_rows(
        &self,
        user_id: &str,
        other_id: &str,
    ) -> AppResult<(Option<FriendshipRecord>, Option<FriendshipRecord>)> {
        let (pk_a, sk_a) = EntityKey::Friendship {
            user_id: user_id.to_string(),
            other_id: other_id.to_string(),
        }
        .encode();
        let (pk_b, sk_b) = EntityKey::Friendship {
            user_id: other_id.to_string(),
            other_id: user_id.to_string(),
        }
        .encode();
        let mine = self
            .store
            .get(&pk_a, &sk_a)
            .await?
            .as_ref()
            .map(FriendshipRecord::from_item)
            .transpose()?;
        let theirs = self
            .store
            .get(&pk_b, &sk_b)
            .await?
            .as_ref()
            .map(FriendshipRecord::from_item)
            .transpose()?;
        Ok((mine, theirs))
    }

    async fn delete_friendship_rows(&self, user_id: &str, other_id: &str) -> AppResult<()> {
        let (pk_a, sk_a) = EntityKey::Friendship {
            user_id: user_id.to_string(),
            other_id: other_id.to_string(),
        }
        .encode();
        let (pk_b, sk_b) = EntityKey::Friendship {
            user_id: other_id.to_string(),
            other_id: user_id.to_string(),
        }
        .encode();
        self.store.delete(&pk_a, &sk_a).await?;
        self.store.delete(&pk_b, &sk_b).await?;
        Ok(())
    }
}

/// Read-modify-write on the denormalized follower counter. Not atomic under
/// concurrent writers; a vanished user row is skipped, since the cascade that
/// removed it also removes the edges feeding this counter.
pub(crate) async fn adjust_follower_count(
    store: &dyn KeyValueStore,
    user_id: &str,
    delta: i64,
) -> AppResult<()> {
    adjust_counts(store, user_id, delta, 0).await
}

pub(crate) async fn adjust_following_count(
    store: &dyn KeyValueStore,
    user_id: &str,
    delta: i64,
) -> AppResult<()> {
    adjust_counts(store, user_id, 0, delta).await
}

async fn adjust_counts(
    store: &dyn KeyValueStore,
    user_id: &str,
    follower_delta: i64,
    following_delta: i64,
) -> AppResult<()> {
    let (pk, sk) = EntityKey::UserInfo {
        user_id: user_id.to_string(),
    }
    .encode();
    let item = match store.get(&pk, &sk).await? {
        Some(item) => item,
        None => {
            debug!(user_id, "counter target missing, skipping adjustment");
            return Ok(());
        }
    };
    let mut user = UserRecord::from_item(&item)?;
    user.num_followers = apply_delta(user.num_followers, follower_delta);
    user.num_following = apply_delta(user.num_following, following_delta);
    store.put(user.to_item()?).await
}

fn apply_delta(count: u64, delta: i64) -> u64 {
    if delta >= 0 {
        count.saturating_add(delta as u64)
    } else {
        count.saturating_sub(delta.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_delta_saturates_at_zero() {
        assert_eq!(apply_delta(0, -1), 0);
        assert_eq!(apply_delta(2, -1), 1);
        assert_eq!(apply_delta(2, 3), 5);
    }
}
