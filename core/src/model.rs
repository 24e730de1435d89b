// Domain types shared across the client.
//
// Everything the backend sends passes through here once, and casing or
// representation quirks are canonicalized at this boundary. Code past this
// module never compares raw status strings.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

/// Workflow status of a submission.
///
/// The backend emits these in whatever casing the producing service
/// prefers (`"ASSIGNED"`, `"assigned"`, `"Pending_Review"`), so parsing is
/// case-insensitive and serialization always emits the lowercase form.
/// Tokens this build does not know are preserved in [`ItemStatus::Other`]
/// so the item still renders instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    PendingReview,
    Processing,
    Accepted,
    Assigned,
    InProgress,
    Completed,
    RevisionNeeded,
    Declined,
    Used,
    Other(String),
}

impl ItemStatus {
    /// Parse a wire token. Case and `-`/`_` separators are ignored.
    pub fn parse(token: &str) -> Self {
        let canon = token.trim().to_ascii_lowercase().replace('-', "_");
        match canon.as_str() {
            "pending_review" => Self::PendingReview,
            "processing" => Self::Processing,
            "accepted" => Self::Accepted,
            "assigned" => Self::Assigned,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "revision_needed" => Self::RevisionNeeded,
            "declined" => Self::Declined,
            "used" => Self::Used,
            _ => Self::Other(canon),
        }
    }

    /// Canonical lowercase wire form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PendingReview => "pending_review",
            Self::Processing => "processing",
            Self::Accepted => "accepted",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::RevisionNeeded => "revision_needed",
            Self::Declined => "declined",
            Self::Used => "used",
            Self::Other(s) => s,
        }
    }

    /// Waiting for a manager decision. Accept and decline apply only here.
    pub fn awaits_triage(&self) -> bool {
        matches!(self, Self::PendingReview)
    }

    /// Accepted but not yet handed to an editor.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Currently on an editor's desk.
    pub fn is_active_assignment(&self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for ItemStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Self::parse(&token))
    }
}

/// Account role. Parsed case-insensitively, serialized lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Volunteer,
    Editor,
    Manager,
    Admin,
}

impl Role {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "volunteer" => Some(Self::Volunteer),
            "editor" => Some(Self::Editor),
            "manager" => Some(Self::Manager),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volunteer => "volunteer",
            Self::Editor => "editor",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }

    /// Path segment of this role's API namespace, e.g. `/manager/...`.
    pub fn api_prefix(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Role::parse(&token)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown role: {token}")))
    }
}

/// A volunteer submission moving through the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub volunteer_name: String,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_video_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_opt_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "de_opt_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "de_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_editor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_editor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Partial update for an existing item. Only populated fields overwrite;
/// absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_video_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_opt_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "de_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_editor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_editor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ItemPatch {
    pub fn status(status: ItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Team roster entry as seen by managers and admins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(alias = "username")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
}

/// The signed-in account, as reported by the server. Display only, no
/// authorization decision is ever derived from these fields client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(alias = "username")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub is_verified: bool,
}

/// Initial dashboard payload, fetched once before the live channel opens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardSnapshot {
    #[serde(default, alias = "assignments")]
    pub submissions: Vec<WorkItem>,
    #[serde(default)]
    pub editors: Vec<TeamMember>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

fn default_true() -> bool {
    true
}

/// Ids arrive as JSON numbers from some endpoints and strings from others.
/// Everything downstream sees a string.
pub(crate) fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Num(i64),
        Str(String),
    }
    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Num(n) => n.to_string(),
        IdRepr::Str(s) => s,
    })
}

pub(crate) fn de_opt_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Num(i64),
        Str(String),
    }
    Ok(Option::<IdRepr>::deserialize(deserializer)?.map(|id| match id {
        IdRepr::Num(n) => n.to_string(),
        IdRepr::Str(s) => s,
    }))
}

/// Timestamps come back RFC 3339 from newer endpoints and as naive ISO
/// datetimes from older ones. An unparseable value reads as absent rather
/// than failing the whole payload.
pub(crate) fn de_opt_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_datetime))
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
