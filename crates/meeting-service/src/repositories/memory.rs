//! In-memory meeting store.
//!
//! Meetings live in a `HashMap` keyed by `meetingId` behind a
//! `tokio::sync::RwLock`. Reads share the lock; inserts and appends take the
//! write lock, which makes append-if-absent atomic within this process.
//!
//! Not durable: all state is lost on restart.

use super::{AppendOutcome, MeetingStore, StoreError};
use crate::models::{Meeting, Participant};
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local `MeetingStore`.
#[derive(Debug, Default)]
pub struct MemoryMeetingStore {
    meetings: RwLock<HashMap<String, Meeting>>,
}

impl MemoryMeetingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored meetings.
    pub async fn len(&self) -> usize {
        self.meetings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.meetings.read().await.is_empty()
    }
}

#[async_trait]
impl MeetingStore for MemoryMeetingStore {
    async fn insert(&self, meeting: &Meeting) -> Result<(), StoreError> {
        let mut meetings = self.meetings.write().await;
        match meetings.entry(meeting.meeting_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateMeetingId(meeting.meeting_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(meeting.clone());
                Ok(())
            }
        }
    }

    async fn find_by_meeting_id(&self, meeting_id: &str) -> Result<Option<Meeting>, StoreError> {
        Ok(self.meetings.read().await.get(meeting_id).cloned())
    }

    async fn append_participant(
        &self,
        meeting_id: &str,
        participant: &Participant,
    ) -> Result<AppendOutcome, StoreError> {
        let mut meetings = self.meetings.write().await;
        let Some(meeting) = meetings.get_mut(meeting_id) else {
            return Ok(AppendOutcome::MeetingNotFound);
        };

        if meeting.has_participant(&participant.name) {
            return Ok(AppendOutcome::DuplicateName);
        }

        meeting.participants.push(participant.clone());
        Ok(AppendOutcome::Appended(meeting.clone()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
