//! Meeting service models.
//!
//! Contains the stored meeting document, typed request bodies, and response
//! envelopes. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A participant embedded in a meeting's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Display name, unique within the meeting (exact match).
    pub name: String,

    /// When the participant was appended to the roster.
    pub joined_at: DateTime<Utc>,

    /// True only for the participant supplied at creation.
    pub is_host: bool,
}

impl Participant {
    /// The creating participant.
    pub fn host(name: impl Into<String>, joined_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            joined_at,
            is_host: true,
        }
    }

    /// A participant joining an existing meeting.
    pub fn guest(name: impl Into<String>, joined_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            joined_at,
            is_host: false,
        }
    }
}

/// A meeting document.
///
/// The host is always `participants[0]`; later entries are in join order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    /// Display name (non-unique).
    pub name: String,

    /// Short opaque lookup key.
    pub meeting_id: String,

    /// Roster in join order.
    pub participants: Vec<Participant>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Meeting {
    /// Build a new meeting whose roster holds only the host.
    pub fn new(
        meeting_id: impl Into<String>,
        name: impl Into<String>,
        host_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            meeting_id: meeting_id.into(),
            participants: vec![Participant::host(host_name, now)],
            created_at: now,
        }
    }

    /// Whether a participant with exactly this name is on the roster.
    pub fn has_participant(&self, name: &str) -> bool {
        self.participants.iter().any(|p| p.name == name)
    }
}

/// Returns the value when present and non-empty. Whitespace counts as content.
fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

/// Body for `POST /meetings`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    /// Meeting display name.
    pub name: Option<String>,

    /// Name of the creating participant.
    pub host_name: Option<String>,
}

impl CreateMeetingRequest {
    /// Validate the request, returning `(name, host_name)`.
    ///
    /// # Errors
    ///
    /// Returns an error message if either field is missing or empty.
    pub fn validate(&self) -> Result<(&str, &str), &'static str> {
        match (required(&self.name), required(&self.host_name)) {
            (Some(name), Some(host_name)) => Ok((name, host_name)),
            _ => Err("Name and host required"),
        }
    }
}

/// Body for `POST /meetings/join`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMeetingRequest {
    /// Meeting to join.
    pub meeting_id: Option<String>,

    /// Name of the joining participant.
    pub name: Option<String>,
}

impl JoinMeetingRequest {
    /// Validate the request, returning `(meeting_id, name)`.
    ///
    /// # Errors
    ///
    /// Returns an error message if either field is missing or empty.
    pub fn validate(&self) -> Result<(&str, &str), &'static str> {
        match (required(&self.meeting_id), required(&self.name)) {
            (Some(meeting_id), Some(name)) => Ok((meeting_id, name)),
            _ => Err("Meeting ID and participant name required"),
        }
    }
}

/// Body for `POST /meetings/token`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomTokenRequest {
    /// Meeting the token is for.
    pub meeting_id: Option<String>,

    /// Participant name the token is issued to.
    pub name: Option<String>,
}

impl RoomTokenRequest {
    /// Validate the request, returning `(meeting_id, name)`.
    ///
    /// # Errors
    ///
    /// Returns an error message if either field is missing or empty.
    pub fn validate(&self) -> Result<(&str, &str), &'static str> {
        match (required(&self.meeting_id), required(&self.name)) {
            (Some(meeting_id), Some(name)) => Ok((meeting_id, name)),
            _ => Err("Meeting ID and participant name required"),
        }
    }
}

/// Success envelope for meeting endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingResponse {
    pub success: bool,
    pub meeting: Meeting,
}

impl From<Meeting> for MeetingResponse {
    fn from(meeting: Meeting) -> Self {
        Self {
            success: true,
            meeting,
        }
    }
}

/// Room credentials minted by the token service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomToken {
    /// Access token for the media server.
    pub token: String,

    /// Media server URL.
    pub url: String,

    /// Identity the token was issued to.
    pub identity: String,
}

/// Success envelope for `POST /meetings/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomTokenResponse {
    pub success: bool,
    pub token: RoomToken,
}

/// Readiness check response.
///
/// Returned by the `/ready` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Store health ("healthy" or "unhealthy").
    pub store: &'static str,

    /// Generic error message when not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
