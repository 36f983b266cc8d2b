use uuid::Uuid;

use crate::{Time, UserData, UserId};

const TEMP_ID_PREFIX: &str = "temp-";

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct CommentId(pub String);

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct ReplyId(pub String);

impl ReplyId {
    /// Id for a reply the server has not acknowledged yet. The `temp-`
    /// namespace never collides with server-issued ids.
    pub fn temp() -> ReplyId {
        ReplyId(format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4()))
    }

    pub fn is_temp(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }
}

/// A comment the way the backend serializes one, including the legacy
/// Mongo-flavored field names some endpoints still answer with.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentData {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub mongo_id: Option<CommentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<CommentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<UserData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Time>,
    #[serde(default)]
    pub upvotes: Vec<UserId>,
    #[serde(default)]
    pub downvotes: Vec<UserId>,
    /// `None` means the endpoint did not include the replies at all, which is
    /// not the same thing as an empty list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<ReplyData>>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyData {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub mongo_id: Option<ReplyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ReplyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<UserData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Time>,
    #[serde(default)]
    pub upvotes: Vec<UserId>,
    #[serde(default)]
    pub downvotes: Vec<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_ids_live_in_their_own_namespace() {
        let a = ReplyId::temp();
        let b = ReplyId::temp();
        assert!(a.is_temp());
        assert!(b.is_temp());
        assert_ne!(a, b);
        assert!(!ReplyId(String::from("64a1f0c2")).is_temp());
    }

    #[test]
    fn comment_data_accepts_both_field_spellings() {
        let mongo: CommentData = serde_json::from_value(serde_json::json!({
            "_id": "c1",
            "user": { "_id": "u1", "firstName": "Ada", "lastName": "Lovelace" },
            "text": "hello",
            "createdAt": "2023-01-01T00:00:00Z",
            "upvotes": ["u2"],
            "downvotes": [],
            "replies": [],
        }))
        .unwrap();
        assert_eq!(mongo.mongo_id, Some(CommentId(String::from("c1"))));
        assert_eq!(mongo.text.as_deref(), Some("hello"));
        assert!(mongo.created_at.is_some());
        assert_eq!(mongo.replies, Some(vec![]));

        let flat: CommentData = serde_json::from_value(serde_json::json!({
            "id": "c2",
            "author": { "id": "u1", "name": "Ada" },
            "content": "hello again",
            "timestamp": "2023-01-02T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(flat.id, Some(CommentId(String::from("c2"))));
        assert_eq!(flat.mongo_id, None);
        assert_eq!(flat.content.as_deref(), Some("hello again"));
        assert!(flat.upvotes.is_empty() && flat.downvotes.is_empty());
        assert_eq!(flat.replies, None);
    }
}
