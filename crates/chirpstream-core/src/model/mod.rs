//! Typed projections of attribute trees: users, posts and lists.

pub mod list;
pub mod post;
pub mod user;

pub use list::UserList;
pub use post::Post;
pub use user::User;

use chrono::{DateTime, FixedOffset};

/// Wire format of `created_at`, e.g. `Mon Jan 1 00:00:00 +0000 2024`.
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse a `created_at` value. Runs of whitespace are collapsed first so
/// space-padded days (`Jan  1`) parse the same as `Jan 1`.
pub fn parse_created_at(raw: &str) -> Option<DateTime<FixedOffset>> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    DateTime::parse_from_str(&collapsed, CREATED_AT_FORMAT).ok()
}
