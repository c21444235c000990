// Replication events published by the identity service
// A closed set of tagged variants; dispatch is an exhaustive match, so a new
// event kind cannot be added without every consumer handling it.

use crate::error::{AppError, AppResult};
use crate::infrastructure::queue::QueueMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message attribute carrying the event kind tag.
pub const EVENT_KIND_ATTRIBUTE: &str = "eventType";

/// Profile payload for user lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEventPayload {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

/// Payload for friendship lifecycle events. The pair is unordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendshipEventPayload {
    pub user_a_id: String,
    pub user_b_id: String,
}

/// Everything the identity service advertises to its replicas.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityEvent {
    UserCreated(UserEventPayload),
    UserUpdated(UserEventPayload),
    UserDeleted(UserEventPayload),
    FriendshipCreated(FriendshipEventPayload),
    FriendshipDeleted(FriendshipEventPayload),
}

/// Outcome of decoding a received message. Unknown kinds are separated from
/// malformed payloads because they take different paths: unknown kinds are
/// dropped (acknowledged), malformed payloads are left for redelivery until
/// the queue dead-letters them.
#[derive(Debug)]
pub enum DecodedMessage {
    Event(IdentityEvent),
    UnknownKind(String),
}

impl IdentityEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            IdentityEvent::UserCreated(_) => "USER_CREATED",
            IdentityEvent::UserUpdated(_) => "USER_UPDATED",
            IdentityEvent::UserDeleted(_) => "USER_DELETED",
            IdentityEvent::FriendshipCreated(_) => "FRIENDSHIP_CREATED",
            IdentityEvent::FriendshipDeleted(_) => "FRIENDSHIP_DELETED",
        }
    }

    /// Serialize into a queue body plus routing attributes.
    pub fn to_wire(&self) -> AppResult<(String, HashMap<String, String>)> {
        let body = match self {
            IdentityEvent::UserCreated(payload)
            | IdentityEvent::UserUpdated(payload)
            | IdentityEvent::UserDeleted(payload) => serde_json::to_string(payload)?,
            IdentityEvent::FriendshipCreated(payload)
            | IdentityEvent::FriendshipDeleted(payload) => serde_json::to_string(payload)?,
        };
        let attributes = HashMap::from([(
            EVENT_KIND_ATTRIBUTE.to_string(),
            self.kind().to_string(),
        )]);
        Ok((body, attributes))
    }

    /// Decode a received message by its kind attribute.
    pub fn decode(message: &QueueMessage) -> AppResult<DecodedMessage> {
        let kind = match message.attributes.get(EVENT_KIND_ATTRIBUTE) {
            Some(kind) => kind.as_str(),
            None => return Ok(DecodedMessage::UnknownKind("<missing>".to_string())),
        };

        let parse_user = |body: &str| -> AppResult<UserEventPayload> {
            serde_json::from_str(body)
                .map_err(|e| AppError::InvalidEvent(format!("bad {} payload: {}", kind, e)))
        };
        let parse_friendship = |body: &str| -> AppResult<FriendshipEventPayload> {
            serde_json::from_str(body)
                .map_err(|e| AppError::InvalidEvent(format!("bad {} payload: {}", kind, e)))
        };

        let event = match kind {
            "USER_CREATED" => IdentityEvent::UserCreated(parse_user(&message.body)?),
            "USER_UPDATED" => IdentityEvent::UserUpdated(parse_user(&message.body)?),
            "USER_DELETED" => IdentityEvent::UserDeleted(parse_user(&message.body)?),
            "FRIENDSHIP_CREATED" => {
                IdentityEvent::FriendshipCreated(parse_friendship(&message.body)?)
            }
            "FRIENDSHIP_DELETED" => {
                IdentityEvent::FriendshipDeleted(parse_friendship(&message.body)?)
            }
            other => return Ok(DecodedMessage::UnknownKind(other.to_string())),
        };
        Ok(DecodedMessage::Event(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(body: &str, attributes: HashMap<String, String>) -> QueueMessage {
        QueueMessage {
            receipt: "r".into(),
            body: body.into(),
            attributes,
            receive_count: 1,
        }
    }

    #[test]
    fn test_wire_round_trip() {
        let event = IdentityEvent::UserCreated(UserEventPayload {
            user_id: "u1".into(),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            profile_picture_url: None,
        });
        let (body, attributes) = event.to_wire().unwrap();
        assert_eq!(attributes[EVENT_KIND_ATTRIBUTE], "USER_CREATED");
        assert!(body.contains("\"userId\":\"u1\""));

        match IdentityEvent::decode(&message(&body, attributes)).unwrap() {
            DecodedMessage::Event(decoded) => assert_eq!(decoded, event),
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_friendship_round_trip() {
        let event = IdentityEvent::FriendshipDeleted(FriendshipEventPayload {
            user_a_id: "a".into(),
            user_b_id: "b".into(),
        });
        let (body, attributes) = event.to_wire().unwrap();
        match IdentityEvent::decode(&message(&body, attributes)).unwrap() {
            DecodedMessage::Event(decoded) => assert_eq!(decoded, event),
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_is_not_an_error() {
        let attributes =
            HashMap::from([(EVENT_KIND_ATTRIBUTE.to_string(), "USER_PROMOTED".to_string())]);
        match IdentityEvent::decode(&message("{}", attributes)).unwrap() {
            DecodedMessage::UnknownKind(kind) => assert_eq!(kind, "USER_PROMOTED"),
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_attribute_is_unknown_kind() {
        match IdentityEvent::decode(&message("{}", HashMap::new())).unwrap() {
            DecodedMessage::UnknownKind(_) => {}
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payload_is_invalid_event() {
        let attributes =
            HashMap::from([(EVENT_KIND_ATTRIBUTE.to_string(), "USER_CREATED".to_string())]);
        let result = IdentityEvent::decode(&message("not json", attributes));
        assert!(matches!(result, Err(AppError::InvalidEvent(_))));
    }
}
