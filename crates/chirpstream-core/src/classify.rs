//! Streaming event classifier.
//!
//! Decision rule (first match wins):
//! ```text
//! no "event" ─┬─ "delete"          → PostDeleted
//!             ├─ "text" + "user"   → Post
//!             ├─ "friends"         → UserIdBacklog
//!             └─ otherwise         → Unclassified
//! "event" ────┬─ follow            → Follow
//!             ├─ favorite          → Favorite
//!             ├─ unfavorite        → Unfavorite
//!             ├─ retweet           → Retweet
//!             ├─ list_member_added → ListMemberAdded
//!             └─ otherwise         → Unclassified
//! ```
//!
//! Classification is total: anything that does not fit a known shape, or
//! fits one but lacks a required part, becomes [`ClassifiedEvent::Unclassified`]
//! carrying the raw tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Post, User, UserList};
use crate::tree::{decode_line, value_as_i64, AttributeTree, TreeExt};

/// One classified stream element. Exactly one variant is active and only
/// its own payload is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ClassifiedEvent {
    /// A new post.
    Post(Post),
    /// A post was deleted.
    PostDeleted { id: i64 },
    /// `source` followed `target`.
    Follow { source: User, target: User },
    /// `source` favorited `target`'s post.
    Favorite {
        source: User,
        target: User,
        post: Option<Post>,
    },
    /// `source` removed a favorite from `target`'s post.
    Unfavorite {
        source: User,
        target: User,
        post: Option<Post>,
    },
    /// `source` retweeted `target`'s post.
    Retweet {
        source: User,
        target: User,
        post: Option<Post>,
    },
    /// `source` added `target` to a list.
    ListMemberAdded {
        source: User,
        target: User,
        list: Option<UserList>,
    },
    /// The friend id backlog sent at the start of a user stream.
    UserIdBacklog { ids: Vec<i64> },
    /// Anything else, kept raw for inspection.
    Unclassified(AttributeTree),
}

impl ClassifiedEvent {
    /// Stable snake_case name of the active variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Post(_) => "post",
            Self::PostDeleted { .. } => "post_deleted",
            Self::Follow { .. } => "follow",
            Self::Favorite { .. } => "favorite",
            Self::Unfavorite { .. } => "unfavorite",
            Self::Retweet { .. } => "retweet",
            Self::ListMemberAdded { .. } => "list_member_added",
            Self::UserIdBacklog { .. } => "user_id_backlog",
            Self::Unclassified(_) => "unclassified",
        }
    }

    pub fn is_unclassified(&self) -> bool {
        matches!(self, Self::Unclassified(_))
    }
}

/// Classify one attribute tree. Never fails.
pub fn classify(tree: &AttributeTree) -> ClassifiedEvent {
    let classified = if tree.is_object() {
        match tree.text_at("event") {
            Some(name) => classify_notice(name.trim(), tree),
            None => classify_element(tree),
        }
    } else {
        None
    };
    classified.unwrap_or_else(|| {
        tracing::debug!(event = ?tree.str_at("event"), "unclassified stream element");
        ClassifiedEvent::Unclassified(tree.clone())
    })
}

/// Decode and classify one stream line. Malformed JSON is returned as
/// `Unclassified` holding the line as a string.
pub fn classify_line(line: &str) -> ClassifiedEvent {
    match decode_line(line) {
        Ok(tree) => classify(&tree),
        Err(e) => {
            tracing::debug!(error = %e, "undecodable stream line");
            ClassifiedEvent::Unclassified(Value::String(line.to_string()))
        }
    }
}

fn classify_element(tree: &Value) -> Option<ClassifiedEvent> {
    if let Some(delete) = tree.child("delete") {
        return deleted_post_id(delete).map(|id| ClassifiedEvent::PostDeleted { id });
    }
    if tree.has("text") && tree.has("user") {
        return match Post::from_tree(tree) {
            Ok(post) => Some(ClassifiedEvent::Post(post)),
            Err(e) => {
                tracing::debug!(error = %e, "post shape without a decodable post");
                None
            }
        };
    }
    if let Some(friends) = tree.child("friends") {
        let ids = friends.as_array()?.iter().filter_map(value_as_i64).collect();
        return Some(ClassifiedEvent::UserIdBacklog { ids });
    }
    None
}

fn classify_notice(name: &str, tree: &Value) -> Option<ClassifiedEvent> {
    let target_post = || {
        tree.child("target_object")
            .and_then(|obj| Post::from_tree(obj).ok())
    };
    let event = match name {
        "follow" => {
            let (source, target) = parties(tree)?;
            ClassifiedEvent::Follow { source, target }
        }
        "favorite" => {
            let (source, target) = parties(tree)?;
            ClassifiedEvent::Favorite { source, target, post: target_post() }
        }
        "unfavorite" => {
            let (source, target) = parties(tree)?;
            ClassifiedEvent::Unfavorite { source, target, post: target_post() }
        }
        "retweet" => {
            let (source, target) = parties(tree)?;
            ClassifiedEvent::Retweet { source, target, post: target_post() }
        }
        "list_member_added" => {
            let (source, target) = parties(tree)?;
            let list = tree
                .child("target_object")
                .and_then(|obj| UserList::from_tree(obj).ok());
            ClassifiedEvent::ListMemberAdded { source, target, list }
        }
        _ => return None,
    };
    Some(event)
}

fn parties(tree: &Value) -> Option<(User, User)> {
    let source = User::from_tree(tree.child("source")?).ok()?;
    let target = User::from_tree(tree.child("target")?).ok()?;
    Some((source, target))
}

/// `{"delete":{"status":{"id":42,"id_str":"42"}}}` → 42.
fn deleted_post_id(delete: &Value) -> Option<i64> {
    let status = delete.child("status")?;
    status.i64_at("id").or_else(|| status.i64_at("id_str"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(name: &str) -> Value {
        json!({"id": 1, "screen_name": name})
    }

    fn post_tree(id: i64, author: &str) -> Value {
        json!({"id": id, "text": "t", "user": user(author)})
    }

    #[test]
    fn post_example_line() {
        let event = classify_line(
            r#"{"text":"hi","user":{"screen_name":"a"},"id":1,"created_at":"Mon Jan 1 00:00:00 +0000 2024"}"#,
        );
        let ClassifiedEvent::Post(post) = event else {
            panic!("expected a post, got {event:?}");
        };
        assert_eq!(post.id, 1);
        assert_eq!(post.text, "hi");
        assert_eq!(post.user.screen_name, "a");
    }

    #[test]
    fn delete_example_line() {
        assert_eq!(
            classify_line(r#"{"delete":{"status":{"id":42}}}"#),
            ClassifiedEvent::PostDeleted { id: 42 }
        );
        assert_eq!(
            classify_line(r#"{"delete":{"status":{"id_str":"43","user_id":1}}}"#),
            ClassifiedEvent::PostDeleted { id: 43 }
        );
    }

    #[test]
    fn delete_without_id_is_unclassified() {
        assert!(classify(&json!({"delete": {"status": {}}})).is_unclassified());
    }

    #[test]
    fn delete_wins_over_post_shape() {
        let tree = json!({"delete": {"status": {"id": 5}}, "text": "x", "user": user("a")});
        assert_eq!(classify(&tree), ClassifiedEvent::PostDeleted { id: 5 });
    }

    #[test]
    fn post_with_invalid_user_is_unclassified() {
        let tree = json!({"id": 1, "text": "hi", "user": {"id": 9}});
        assert!(classify(&tree).is_unclassified());
    }

    #[test]
    fn friends_backlog() {
        let tree = json!({"friends": [1, 2, "3", "x", 4]});
        assert_eq!(classify(&tree), ClassifiedEvent::UserIdBacklog { ids: vec![1, 2, 3, 4] });
        assert!(classify(&json!({"friends": "nope"})).is_unclassified());
    }

    #[test]
    fn follow_notice() {
        let tree = json!({"event": "follow", "source": user("a"), "target": user("b")});
        let ClassifiedEvent::Follow { source, target } = classify(&tree) else {
            panic!("expected follow");
        };
        assert_eq!(source.screen_name, "a");
        assert_eq!(target.screen_name, "b");
    }

    #[test]
    fn favorite_unfavorite_retweet_notices() {
        for (name, kind) in [
            ("favorite", "favorite"),
            ("unfavorite", "unfavorite"),
            ("retweet", "retweet"),
        ] {
            let tree = json!({
                "event": name,
                "source": user("a"),
                "target": user("b"),
                "target_object": post_tree(10, "b")
            });
            let event = classify(&tree);
            assert_eq!(event.kind(), kind);
            let post = match event {
                ClassifiedEvent::Favorite { post, .. }
                | ClassifiedEvent::Unfavorite { post, .. }
                | ClassifiedEvent::Retweet { post, .. } => post,
                other => panic!("unexpected {other:?}"),
            };
            assert_eq!(post.unwrap().id, 10);
        }
    }

    #[test]
    fn favorite_without_target_object_keeps_notice() {
        let tree = json!({"event": "favorite", "source": user("a"), "target": user("b")});
        assert!(matches!(
            classify(&tree),
            ClassifiedEvent::Favorite { post: None, .. }
        ));
    }

    #[test]
    fn list_member_added_notice() {
        let tree = json!({
            "event": "list_member_added",
            "source": user("a"),
            "target": user("b"),
            "target_object": {"id": 5, "name": "friends", "user": user("a")}
        });
        let ClassifiedEvent::ListMemberAdded { list, .. } = classify(&tree) else {
            panic!("expected list_member_added");
        };
        assert_eq!(list.unwrap().name, "friends");
    }

    #[test]
    fn missing_parties_are_unclassified() {
        assert!(classify(&json!({"event": "follow", "source": user("a")})).is_unclassified());
        assert!(classify(&json!({"event": "follow", "target": user("b")})).is_unclassified());
        assert!(
            classify(&json!({"event": "follow", "source": {"id": 1}, "target": user("b")}))
                .is_unclassified()
        );
    }

    #[test]
    fn unknown_event_is_unclassified() {
        let tree = json!({"event": "block", "source": user("a"), "target": user("b")});
        let event = classify(&tree);
        assert_eq!(event, ClassifiedEvent::Unclassified(tree));
    }

    #[test]
    fn blank_event_falls_back_to_element_rules() {
        let tree = json!({"event": "  ", "delete": {"status": {"id": 1}}});
        assert_eq!(classify(&tree), ClassifiedEvent::PostDeleted { id: 1 });
    }

    #[test]
    fn classification_is_total() {
        for tree in [
            json!({}),
            json!([]),
            json!(null),
            json!(3),
            json!("text"),
            json!({"event": 5}),
            json!({"text": "no user"}),
            json!({"limit": {"track": 12}}),
        ] {
            assert!(classify(&tree).is_unclassified(), "{tree}");
        }
    }

    #[test]
    fn malformed_line_keeps_raw_text() {
        assert_eq!(
            classify_line("{oops"),
            ClassifiedEvent::Unclassified(Value::String("{oops".into()))
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(ClassifiedEvent::PostDeleted { id: 7 }).unwrap();
        assert_eq!(json, json!({"kind": "post_deleted", "data": {"id": 7}}));
    }
}
