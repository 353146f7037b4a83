use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::User;
use crate::error::DecodeError;
use crate::tree::TreeExt;

/// A curated list of users.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserList {
    pub id: i64,
    pub name: String,
    pub full_name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub subscriber_count: u64,
    pub member_count: u64,
    pub uri: Option<String>,
    /// `"public"` or `"private"`.
    pub mode: Option<String>,
    pub owner: Option<User>,
}

impl UserList {
    pub fn from_tree(tree: &Value) -> Result<Self, DecodeError> {
        if !tree.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        let id = tree.i64_at("id").ok_or(DecodeError::MissingField { field: "id" })?;
        let owned = |key: &str| tree.str_at(key).map(str::to_owned);
        Ok(Self {
            id,
            name: owned("name").unwrap_or_default(),
            full_name: owned("full_name"),
            slug: owned("slug"),
            description: owned("description"),
            subscriber_count: tree.u64_at("subscriber_count").unwrap_or_default(),
            member_count: tree.u64_at("member_count").unwrap_or_default(),
            uri: owned("uri"),
            mode: owned("mode"),
            owner: tree.child("user").and_then(|u| User::from_tree(u).ok()),
        })
    }

    pub fn is_private(&self) -> bool {
        self.mode.as_deref() == Some("private")
    }
}
