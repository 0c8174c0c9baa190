//! Records carried by the v1.1 streaming feeds.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Format of `created_at` on v1.1 records, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Key marking a record as a deletion notice rather than content.
pub const DELETION_MARKER: &str = "delete";

// ─────────────────────────────────────────────────────────────────────────────
// Tweet Types
// ─────────────────────────────────────────────────────────────────────────────

/// A status delivered by a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    /// Tweet ID
    pub id: u64,

    /// Tweet ID as a string
    #[serde(default)]
    pub id_str: String,

    /// Tweet text content
    #[serde(alias = "full_text")]
    pub text: String,

    /// Creation timestamp in the feed's own format
    #[serde(default)]
    pub created_at: Option<String>,

    /// Author
    #[serde(default)]
    pub user: Option<User>,

    /// Language of the tweet (BCP47)
    #[serde(default)]
    pub lang: Option<String>,

    /// ID of the status this replies to
    #[serde(default)]
    pub in_reply_to_status_id_str: Option<String>,

    /// Screen name of the user this replies to
    #[serde(default)]
    pub in_reply_to_screen_name: Option<String>,

    /// Retweet count at delivery time
    #[serde(default)]
    pub retweet_count: u64,

    /// Like count at delivery time
    #[serde(default)]
    pub favorite_count: u64,

    /// Source application (HTML anchor)
    #[serde(default)]
    pub source: Option<String>,

    /// Whether the text was cut short
    #[serde(default)]
    pub truncated: bool,
}

impl Tweet {
    /// Build a tweet from a decoded record.
    ///
    /// Returns `None` when the record is not a tweet.
    #[must_use]
    pub fn from_record(record: Map<String, Value>) -> Option<Self> {
        serde_json::from_value(Value::Object(record)).ok()
    }

    /// Parsed creation time.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_str(s, CREATED_AT_FORMAT).ok())
    }

    /// Whether this tweet is a reply.
    #[must_use]
    pub const fn is_reply(&self) -> bool {
        self.in_reply_to_status_id_str.is_some()
    }

    /// Author screen name, if the record carried a user.
    #[must_use]
    pub fn screen_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.screen_name.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User Types
// ─────────────────────────────────────────────────────────────────────────────

/// The author embedded in a tweet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: u64,

    /// User ID as a string
    #[serde(default)]
    pub id_str: String,

    /// Handle without the leading `@`
    pub screen_name: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Profile description
    #[serde(default)]
    pub description: Option<String>,

    /// Follower count
    #[serde(default)]
    pub followers_count: u64,

    /// Following count
    #[serde(default)]
    pub friends_count: u64,

    /// Whether the account is verified
    #[serde(default)]
    pub verified: bool,

    /// Whether the account's tweets are protected
    #[serde(default)]
    pub protected: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Deletion Notices
// ─────────────────────────────────────────────────────────────────────────────

/// A notice that an earlier status was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionNotice {
    /// The removed status
    pub status: DeletedStatus,
}

/// Identity of a removed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedStatus {
    /// Status ID
    pub id: u64,

    /// Status ID as a string
    #[serde(default)]
    pub id_str: String,

    /// Author ID
    #[serde(default)]
    pub user_id: u64,

    /// Author ID as a string
    #[serde(default)]
    pub user_id_str: String,
}

impl DeletionNotice {
    /// Whether a record is a deletion notice.
    #[must_use]
    pub fn is_notice(record: &Map<String, Value>) -> bool {
        record.contains_key(DELETION_MARKER)
    }

    /// Decode the notice carried by a record, if any.
    #[must_use]
    pub fn from_record(record: &Map<String, Value>) -> Option<Self> {
        record
            .get(DELETION_MARKER)
            .and_then(|notice| Self::deserialize(notice).ok())
    }
}
