//! Repository layer for the meeting service.
//!
//! The `MeetingStore` trait is the seam between the service layer and
//! persistence. Two implementations exist:
//!
//! - `postgres` - durable store, one row per meeting with a JSONB roster
//! - `memory` - process-local store for development and tests
//!
//! Both implement participant append as a single atomic append-if-absent
//! operation, so concurrent joins with the same name cannot both succeed.

pub mod memory;
pub mod postgres;

pub use memory::MemoryMeetingStore;
pub use postgres::PgMeetingStore;

use crate::models::{Meeting, Participant};
use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a `MeetingStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another meeting already uses this `meetingId`.
    #[error("Meeting ID already exists: {0}")]
    DuplicateMeetingId(String),

    /// The backend failed. The message is the backend's own.
    #[error("{0}")]
    Backend(String),

    /// A stored document could not be decoded.
    #[error("Corrupt meeting document: {0}")]
    Corrupt(String),
}

/// Result of an append-if-absent on a meeting's roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The participant was appended; carries the updated meeting.
    Appended(Meeting),
    /// No meeting has this ID.
    MeetingNotFound,
    /// A participant with the same name is already on the roster.
    DuplicateName,
}

/// Persistence for meeting documents.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Insert a new meeting.
    ///
    /// Fails with `StoreError::DuplicateMeetingId` if the ID is taken.
    async fn insert(&self, meeting: &Meeting) -> Result<(), StoreError>;

    /// Fetch a meeting by its exact `meetingId`.
    async fn find_by_meeting_id(&self, meeting_id: &str) -> Result<Option<Meeting>, StoreError>;

    /// Append `participant` unless a participant with the same name exists.
    ///
    /// The duplicate check and the append are one atomic operation.
    async fn append_participant(
        &self,
        meeting_id: &str,
        participant: &Participant,
    ) -> Result<AppendOutcome, StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
