//! Meeting handlers.
//!
//! - `POST /meetings` - create a meeting with its host
//! - `POST /meetings/join` - join an existing meeting
//! - `GET /meetings/:meeting_id` - fetch a meeting
//! - `GET /meetings/join`, `GET /meetings/token` - fetch by the literal segment
//! - `POST /meetings/token` - mint room credentials for a participant
//!
//! Request bodies are deserialized by hand so malformed JSON is a 400 rather
//! than axum's default 422.

use crate::errors::MeetingError;
use crate::models::{
    CreateMeetingRequest, JoinMeetingRequest, MeetingResponse, RoomTokenRequest,
    RoomTokenResponse,
};
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::Uri,
    Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::instrument;

/// Deserialize a JSON request body.
///
/// An empty body is treated as `{}` so field validation produces the
/// user-facing message.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, MeetingError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "meeting.handlers.meetings", error = %e, "Invalid request body");
        MeetingError::Validation("Invalid request body".to_string())
    })
}

/// Handler for POST /meetings
///
/// # Response
///
/// - 200 OK: `{success: true, meeting}` with the host as sole participant
/// - 400 Bad Request: missing `name` or `hostName`
/// - 500 Internal Server Error: store failure or exhausted ID retries
#[instrument(
    skip_all,
    name = "meeting.create",
    fields(method = "POST", endpoint = "/meetings")
)]
pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MeetingResponse>, MeetingError> {
    let request: CreateMeetingRequest = parse_body(&body)?;
    let meeting = state.meetings.create(&request).await?;
    Ok(Json(meeting.into()))
}

/// Handler for POST /meetings/join
///
/// # Response
///
/// - 200 OK: `{success: true, meeting}` including the new participant
/// - 400 Bad Request: missing fields, or the name already joined
/// - 404 Not Found: no meeting with this ID
#[instrument(
    skip_all,
    name = "meeting.join",
    fields(method = "POST", endpoint = "/meetings/join")
)]
pub async fn join_meeting(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MeetingResponse>, MeetingError> {
    let request: JoinMeetingRequest = parse_body(&body)?;
    let meeting = state.meetings.join(&request).await?;
    Ok(Json(meeting.into()))
}

/// Handler for GET /meetings/:meeting_id
#[instrument(
    skip_all,
    name = "meeting.get",
    fields(method = "GET", endpoint = "/meetings/{meetingId}", meeting_id = %meeting_id)
)]
pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingResponse>, MeetingError> {
    let meeting = state.meetings.get(&meeting_id).await?;
    Ok(Json(meeting.into()))
}

/// Handler for GET /meetings/join and GET /meetings/token
///
/// The static POST routes shadow `/meetings/:meeting_id`, so a GET on them
/// looks up the last path segment as a meeting ID. Generated IDs are nine
/// characters, so this is always a 404 `{error: "Meeting not found"}`.
#[instrument(
    skip_all,
    name = "meeting.get",
    fields(method = "GET", endpoint = %uri.path())
)]
pub async fn get_meeting_by_route_segment(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> Result<Json<MeetingResponse>, MeetingError> {
    let meeting_id = uri.path().rsplit('/').next().unwrap_or_default();
    let meeting = state.meetings.get(meeting_id).await?;
    Ok(Json(meeting.into()))
}

/// Handler for POST /meetings/token
///
/// # Response
///
/// - 200 OK: `{success: true, token: {token, url, identity}}`
/// - 400 Bad Request: missing fields
/// - 403 Forbidden: `name` has not joined the meeting
/// - 404 Not Found: no meeting with this ID
/// - 502 Bad Gateway: token service reply unusable
/// - 503 Service Unavailable: token service unset or unreachable
#[instrument(
    skip_all,
    name = "meeting.issue_room_token",
    fields(method = "POST", endpoint = "/meetings/token")
)]
pub async fn issue_room_token(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<RoomTokenResponse>, MeetingError> {
    let request: RoomTokenRequest = parse_body(&body)?;
    let token = state
        .meetings
        .issue_room_token(&request, state.token_client.as_ref())
        .await?;

    Ok(Json(RoomTokenResponse {
        success: true,
        token,
    }))
}
