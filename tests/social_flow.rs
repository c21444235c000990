// End-to-end behavior of both services over the in-process queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use daybook::content::{ContentState, EventConsumer};
use daybook::error::AppError;
use daybook::events::{IdentityEvent, UserEventPayload};
use daybook::identity::{IdentityState, UserProfileDraft};
use daybook::infrastructure::queue::MessageQueue;
use daybook::infrastructure::{InProcessQueue, MemoryStore};
use daybook::content::board::{CommentDraft, PostDraft};

fn profile(email: &str, first_name: &str) -> UserProfileDraft {
    UserProfileDraft {
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        profile_picture_url: None,
        birthday: None,
        location: None,
    }
}

fn post(title: &str) -> PostDraft {
    PostDraft {
        post_id: None,
        title: title.to_string(),
        content: format!("{} content", title),
    }
}

/// Identity and content service, each over its own store, joined only by the
/// queue.
fn two_services() -> (IdentityState, ContentState, EventConsumer, Arc<InProcessQueue>) {
    let queue = Arc::new(InProcessQueue::new(Duration::from_secs(30), 5));
    let identity = IdentityState::new(Arc::new(MemoryStore::new()), queue.clone());
    let content = ContentState::new(Arc::new(MemoryStore::new()), true);
    let consumer = content.consumer(queue.clone(), 10, Duration::from_millis(5));
    (identity, content, consumer, queue)
}

#[tokio::test]
async fn test_second_daily_post_conflicts() {
    let (_, content, _, _) = two_services();

    content.board.create_daily_post("ada", post("first")).await.unwrap();
    let second = content.board.create_daily_post("ada", post("second")).await;
    assert!(matches!(second, Err(AppError::DuplicateDailyPost(_))));

    // Other users are unaffected.
    content.board.create_daily_post("grace", post("hers")).await.unwrap();
}

#[tokio::test]
async fn test_like_unlike_round_trip() {
    let (_, content, _, _) = two_services();
    let created = content.board.create_daily_post("ada", post("p")).await.unwrap();

    content.board.like_post(&created.post_id, "grace").await.unwrap();
    assert_eq!(content.board.get_post(&created.post_id).await.unwrap().like_count, 1);

    // A repeated like is a no-op, not a double count.
    content.board.like_post(&created.post_id, "grace").await.unwrap();
    assert_eq!(content.board.get_post(&created.post_id).await.unwrap().like_count, 1);

    content.board.unlike_post(&created.post_id, "grace").await.unwrap();
    let after = content.board.get_post(&created.post_id).await.unwrap();
    assert_eq!(after.like_count, 0);

    // Unliking again stays at zero.
    content.board.unlike_post(&created.post_id, "grace").await.unwrap();
    assert_eq!(content.board.get_post(&created.post_id).await.unwrap().like_count, 0);
}

#[tokio::test]
async fn test_comment_count_follows_rows() {
    let (_, content, _, _) = two_services();
    let created = content.board.create_daily_post("ada", post("p")).await.unwrap();

    let comment = content
        .board
        .comment_post(
            &created.post_id,
            "grace",
            CommentDraft {
                comment_id: None,
                content: "nice".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        content.board.get_post(&created.post_id).await.unwrap().comment_count,
        1
    );

    content
        .board
        .delete_comment(&created.post_id, &comment.comment_id, "grace")
        .await
        .unwrap();
    assert_eq!(
        content.board.get_post(&created.post_id).await.unwrap().comment_count,
        0
    );

    // Deleting an absent comment does not decrement.
    content
        .board
        .delete_comment(&created.post_id, &comment.comment_id, "grace")
        .await
        .unwrap();
    assert_eq!(
        content.board.get_post(&created.post_id).await.unwrap().comment_count,
        0
    );
}

#[tokio::test]
async fn test_follow_maintains_both_counters() {
    let (identity, _, _, _) = two_services();
    identity.directory.create_user("ada", profile("ada@x.io", "Ada")).await.unwrap();
    identity.directory.create_user("grace", profile("grace@x.io", "Grace")).await.unwrap();

    identity.graph.follow("ada", "grace").await.unwrap();
    assert_eq!(identity.directory.get_user("ada").await.unwrap().num_following, 1);
    assert_eq!(identity.directory.get_user("grace").await.unwrap().num_followers, 1);
    assert_eq!(identity.graph.followers_of("grace").await.unwrap(), vec!["ada"]);

    // Following twice does not double count.
    identity.graph.follow("ada", "grace").await.unwrap();
    assert_eq!(identity.directory.get_user("grace").await.unwrap().num_followers, 1);

    identity.graph.unfollow("ada", "grace").await.unwrap();
    assert_eq!(identity.directory.get_user("ada").await.unwrap().num_following, 0);
    assert_eq!(identity.directory.get_user("grace").await.unwrap().num_followers, 0);

    // Counters never go negative.
    identity.graph.unfollow("ada", "grace").await.unwrap();
    assert_eq!(identity.directory.get_user("grace").await.unwrap().num_followers, 0);
}

#[tokio::test]
async fn test_friendship_lifecycle() {
    let (identity, _, _, _) = two_services();
    identity.directory.create_user("ada", profile("ada@x.io", "Ada")).await.unwrap();
    identity.directory.create_user("grace", profile("grace@x.io", "Grace")).await.unwrap();

    assert!(matches!(
        identity.graph.send_friend_request("ada", "ada").await,
        Err(AppError::SelfReference(_))
    ));
    assert!(matches!(
        identity.graph.send_friend_request("ada", "nobody").await,
        Err(AppError::NotFound(_))
    ));

    identity.graph.send_friend_request("ada", "grace").await.unwrap();
    assert!(!identity.graph.is_friend("ada", "grace").await.unwrap());
    assert_eq!(identity.graph.incoming_requests("grace").await.unwrap(), vec!["ada"]);
    assert_eq!(identity.graph.outgoing_requests("ada").await.unwrap(), vec!["grace"]);

    // A pending pair blocks a new request in either direction.
    assert!(matches!(
        identity.graph.send_friend_request("ada", "grace").await,
        Err(AppError::RequestAlreadyPending(_))
    ));
    assert!(matches!(
        identity.graph.send_friend_request("grace", "ada").await,
        Err(AppError::RequestAlreadyPending(_))
    ));

    // Only the receiver can accept.
    assert!(matches!(
        identity.graph.accept_friend_request("ada", "grace").await,
        Err(AppError::NoSuchRequest(_))
    ));

    identity.graph.accept_friend_request("grace", "ada").await.unwrap();
    assert!(identity.graph.is_friend("ada", "grace").await.unwrap());
    assert!(identity.graph.is_friend("grace", "ada").await.unwrap());
    assert!(matches!(
        identity.graph.send_friend_request("ada", "grace").await,
        Err(AppError::AlreadyFriends(_))
    ));

    identity.graph.remove_friend("ada", "grace").await.unwrap();
    assert!(!identity.graph.is_friend("ada", "grace").await.unwrap());
    assert!(!identity.graph.is_friend("grace", "ada").await.unwrap());
    // Removing again is a no-op.
    identity.graph.remove_friend("ada", "grace").await.unwrap();
}

#[tokio::test]
async fn test_cancel_and_decline_leave_no_rows() {
    let (identity, _, _, _) = two_services();
    identity.directory.create_user("ada", profile("ada@x.io", "Ada")).await.unwrap();
    identity.directory.create_user("grace", profile("grace@x.io", "Grace")).await.unwrap();

    identity.graph.send_friend_request("ada", "grace").await.unwrap();
    // Only the sender can cancel.
    assert!(matches!(
        identity.graph.cancel_friend_request("grace", "ada").await,
        Err(AppError::NoSuchRequest(_))
    ));
    identity.graph.cancel_friend_request("ada", "grace").await.unwrap();
    assert!(identity.graph.incoming_requests("grace").await.unwrap().is_empty());
    assert!(identity.graph.outgoing_requests("ada").await.unwrap().is_empty());
    // Re-running the cancel is a no-op.
    identity.graph.cancel_friend_request("ada", "grace").await.unwrap();

    identity.graph.send_friend_request("ada", "grace").await.unwrap();
    // Only the receiver can decline.
    assert!(matches!(
        identity.graph.decline_friend_request("ada", "grace").await,
        Err(AppError::NoSuchRequest(_))
    ));
    identity.graph.decline_friend_request("grace", "ada").await.unwrap();
    assert!(identity.graph.incoming_requests("grace").await.unwrap().is_empty());
    assert!(identity.graph.outgoing_requests("ada").await.unwrap().is_empty());
    identity.graph.decline_friend_request("grace", "ada").await.unwrap();
}

#[tokio::test]
async fn test_user_created_event_is_idempotent() {
    let (_, content, consumer, _) = two_services();
    let payload = UserEventPayload {
        user_id: "ada".into(),
        email: "ada@x.io".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        profile_picture_url: None,
    };

    // At-least-once delivery: the same event applied twice projects exactly
    // one user.
    consumer.apply(IdentityEvent::UserCreated(payload.clone())).await.unwrap();
    consumer.apply(IdentityEvent::UserCreated(payload.clone())).await.unwrap();

    let projected = content.projection.get_user("ada").await.unwrap();
    assert_eq!(projected.email, "ada@x.io");
}

#[tokio::test]
async fn test_user_deleted_cascades_and_redelivery_is_noop() {
    let (_, content, consumer, _) = two_services();

    for (user, name) in [("ada", "Ada"), ("grace", "Grace")] {
        consumer
            .apply(IdentityEvent::UserCreated(UserEventPayload {
                user_id: user.into(),
                email: format!("{}@x.io", user),
                first_name: name.into(),
                last_name: "T".into(),
                profile_picture_url: None,
            }))
            .await
            .unwrap();
    }
    content.projection.apply_friendship_created("ada", "grace").await.unwrap();

    let ada_post = content.board.create_daily_post("ada", post("adas")).await.unwrap();
    let grace_post = content.board.create_daily_post("grace", post("graces")).await.unwrap();
    content.board.like_post(&grace_post.post_id, "ada").await.unwrap();
    content
        .board
        .comment_post(
            &grace_post.post_id,
            "ada",
            CommentDraft {
                comment_id: None,
                content: "hello".into(),
            },
        )
        .await
        .unwrap();
    content.board.pin_post(&ada_post.post_id, "grace").await.unwrap();

    let deletion = IdentityEvent::UserDeleted(UserEventPayload {
        user_id: "ada".into(),
        email: "ada@x.io".into(),
        first_name: "Ada".into(),
        last_name: "T".into(),
        profile_picture_url: None,
    });
    consumer.apply(deletion.clone()).await.unwrap();

    // Ada's projection, posts, likes and comments are gone; Grace's own data
    // survives with repaired counters.
    assert!(content.projection.find_user("ada").await.unwrap().is_none());
    assert!(content.board.find_post(&ada_post.post_id).await.unwrap().is_none());
    assert!(content.projection.friends_of("grace").await.unwrap().is_empty());
    let grace_after = content.board.get_post(&grace_post.post_id).await.unwrap();
    assert_eq!(grace_after.like_count, 0);
    assert_eq!(grace_after.comment_count, 0);
    assert!(content.board.pinned_posts("grace").await.unwrap().is_empty());

    // Redelivery of the deletion converges to the same state.
    consumer.apply(deletion).await.unwrap();
    assert!(content.projection.find_user("ada").await.unwrap().is_none());
}

#[tokio::test]
async fn test_replication_end_to_end() {
    let (identity, content, consumer, _) = two_services();

    identity.directory.create_user("ada", profile("ada@x.io", "Ada")).await.unwrap();
    identity.directory.create_user("grace", profile("grace@x.io", "Grace")).await.unwrap();
    identity.graph.send_friend_request("ada", "grace").await.unwrap();
    identity.graph.accept_friend_request("grace", "ada").await.unwrap();

    consumer.drain().await.unwrap();

    // The projection converged: users and the friendship edge exist locally.
    assert_eq!(content.projection.get_user("ada").await.unwrap().first_name, "Ada");
    assert_eq!(content.projection.friends_of("grace").await.unwrap(), vec!["ada"]);

    // Timeline assembly is purely local: Grace sees Ada's post.
    let ada_post = content.board.create_daily_post("ada", post("daily")).await.unwrap();
    let friends = content.projection.friends_of("grace").await.unwrap();
    let timeline = content.board.timeline_for(&friends).await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].post_id, ada_post.post_id);

    // Deleting Ada upstream converges the replica: projection, posts and
    // edges disappear.
    identity.directory.delete_user("ada").await.unwrap();
    consumer.drain().await.unwrap();

    assert!(content.projection.find_user("ada").await.unwrap().is_none());
    assert!(content.projection.friends_of("grace").await.unwrap().is_empty());
    let timeline = content
        .board
        .timeline_for(&content.projection.friends_of("grace").await.unwrap())
        .await
        .unwrap();
    assert!(timeline.is_empty());
}

#[tokio::test]
async fn test_unknown_event_kind_is_dropped() {
    let (_, _, consumer, queue) = two_services();
    queue
        .publish(
            "{}".into(),
            HashMap::from([("eventType".to_string(), "USER_PROMOTED".to_string())]),
        )
        .await
        .unwrap();

    let processed = consumer.drain().await.unwrap();
    assert_eq!(processed, 1);
    // Dropped means acknowledged: not redelivered, not dead-lettered.
    assert_eq!(queue.depth().await, 0);
    assert!(queue.dead_letters().await.is_empty());
}

#[tokio::test]
async fn test_malformed_payload_reaches_dead_letter() {
    let queue = Arc::new(InProcessQueue::new(Duration::from_millis(1), 2));
    let content = ContentState::new(Arc::new(MemoryStore::new()), true);
    let consumer = content.consumer(queue.clone(), 10, Duration::from_millis(5));

    queue
        .publish(
            "not json".into(),
            HashMap::from([("eventType".to_string(), "USER_CREATED".to_string())]),
        )
        .await
        .unwrap();

    // Each drain is one failed delivery; after the receive limit the queue
    // moves the message to the dead-letter buffer instead of redelivering.
    for _ in 0..3 {
        consumer.drain().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(queue.depth().await, 0);
    let dead = queue.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].body, "not json");
}
