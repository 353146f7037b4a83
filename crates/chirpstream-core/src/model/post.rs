use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_created_at, User};
use crate::error::DecodeError;
use crate::tree::TreeExt;

/// A post (status) as delivered on the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub user: User,
    pub source: Option<String>,
    pub truncated: bool,
    pub favorited: bool,
    pub in_reply_to_status_id: Option<i64>,
    pub in_reply_to_user_id: Option<i64>,
    pub in_reply_to_screen_name: Option<String>,
    /// The original post when this one is a retweet.
    pub retweeted_status: Option<Box<Post>>,
}

impl Post {
    /// Project a post tree.
    ///
    /// `id`, `text` and a valid `user` are required. An unparsable
    /// `created_at` leaves the timestamp empty, and an undecodable
    /// `retweeted_status` is dropped.
    pub fn from_tree(tree: &Value) -> Result<Self, DecodeError> {
        if !tree.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        let id = tree.i64_at("id").ok_or(DecodeError::MissingField { field: "id" })?;
        let text = tree
            .str_at("text")
            .ok_or(DecodeError::MissingField { field: "text" })?;
        let user = tree
            .child("user")
            .ok_or(DecodeError::MissingField { field: "user" })
            .and_then(User::from_tree)?;

        // A broken original does not invalidate the retweet itself.
        let retweeted_status = tree
            .child("retweeted_status")
            .and_then(|original| Post::from_tree(original).ok())
            .map(Box::new);

        Ok(Self {
            id,
            text: text.to_owned(),
            created_at: tree.str_at("created_at").and_then(parse_created_at),
            user,
            source: tree.str_at("source").map(str::to_owned),
            truncated: tree.bool_at("truncated").unwrap_or(false),
            favorited: tree.bool_at("favorited").unwrap_or(false),
            in_reply_to_status_id: tree.i64_at("in_reply_to_status_id"),
            in_reply_to_user_id: tree.i64_at("in_reply_to_user_id"),
            in_reply_to_screen_name: tree.str_at("in_reply_to_screen_name").map(str::to_owned),
            retweeted_status,
        })
    }

    /// Returns `true` if this post wraps a retweeted original.
    pub fn is_retweet(&self) -> bool {
        self.retweeted_status.is_some()
    }
}

impl std::fmt::Display for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.user, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_post() {
        let post = Post::from_tree(&json!({
            "text": "hi",
            "user": {"screen_name": "a"},
            "id": 1,
            "created_at": "Mon Jan 1 00:00:00 +0000 2024"
        }))
        .unwrap();
        assert_eq!(post.id, 1);
        assert_eq!(post.text, "hi");
        assert_eq!(post.user.screen_name, "a");
        assert!(post.created_at.is_some());
        assert!(!post.is_retweet());
        assert_eq!(post.to_string(), "@a: hi");
    }

    #[test]
    fn invalid_user_abandons_post() {
        let err = Post::from_tree(&json!({"id": 1, "text": "hi", "user": {"id": 3}})).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { field: "screen_name" }));
    }

    #[test]
    fn retweet_is_decoded_recursively() {
        let post = Post::from_tree(&json!({
            "id": 2,
            "text": "RT @b: original",
            "user": {"screen_name": "a"},
            "retweeted_status": {
                "id": "1",
                "text": "original",
                "user": {"screen_name": "b"}
            }
        }))
        .unwrap();
        let original = post.retweeted_status.as_deref().unwrap();
        assert_eq!(original.id, 1);
        assert_eq!(original.user.screen_name, "b");
        assert!(post.is_retweet());
    }

    #[test]
    fn bad_timestamp_is_tolerated() {
        let post = Post::from_tree(&json!({
            "id": 1, "text": "x", "user": {"screen_name": "a"}, "created_at": "yesterday"
        }))
        .unwrap();
        assert_eq!(post.created_at, None);
    }

    #[test]
    fn reply_fields() {
        let post = Post::from_tree(&json!({
            "id": 9,
            "text": "@b yes",
            "user": {"screen_name": "a"},
            "in_reply_to_status_id": 8,
            "in_reply_to_user_id": null,
            "in_reply_to_screen_name": "b",
            "favorited": true
        }))
        .unwrap();
        assert_eq!(post.in_reply_to_status_id, Some(8));
        assert_eq!(post.in_reply_to_user_id, None);
        assert_eq!(post.in_reply_to_screen_name.as_deref(), Some("b"));
        assert!(post.favorited);
    }
}
