use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parse_created_at;
use crate::error::DecodeError;
use crate::tree::TreeExt;

/// A platform account.
///
/// The platform occasionally sends a user object carrying only an id; such
/// objects have no usable identity and are rejected. A user is valid only
/// with a non-empty `screen_name`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub screen_name: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub profile_image_url: Option<String>,
    pub url: Option<String>,
    pub protected: bool,
    pub verified: bool,
    pub followers_count: u64,
    pub friends_count: u64,
    pub statuses_count: u64,
    pub favourites_count: u64,
    pub listed_count: u64,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub lang: Option<String>,
}

impl User {
    pub fn from_tree(tree: &Value) -> Result<Self, DecodeError> {
        if !tree.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        let screen_name = tree
            .text_at("screen_name")
            .ok_or(DecodeError::MissingField { field: "screen_name" })?;

        let owned = |key: &str| tree.str_at(key).map(str::to_owned);
        Ok(Self {
            id: tree.i64_at("id").unwrap_or_default(),
            screen_name: screen_name.to_owned(),
            name: owned("name"),
            location: owned("location"),
            description: owned("description"),
            profile_image_url: owned("profile_image_url"),
            url: owned("url"),
            protected: tree.bool_at("protected").unwrap_or(false),
            verified: tree.bool_at("verified").unwrap_or(false),
            followers_count: tree.u64_at("followers_count").unwrap_or_default(),
            friends_count: tree.u64_at("friends_count").unwrap_or_default(),
            statuses_count: tree.u64_at("statuses_count").unwrap_or_default(),
            favourites_count: tree.u64_at("favourites_count").unwrap_or_default(),
            listed_count: tree.u64_at("listed_count").unwrap_or_default(),
            created_at: tree.str_at("created_at").and_then(parse_created_at),
            lang: owned("lang"),
        })
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.screen_name)
    }
}
