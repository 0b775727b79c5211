//! Meeting lifecycle operations: create, join, fetch, and room-token issuance.
//!
//! Validates typed requests, drives the `MeetingStore`, and translates store
//! outcomes into `MeetingError`s. Holds no mutable state of its own.

use crate::errors::MeetingError;
use crate::models::{
    CreateMeetingRequest, JoinMeetingRequest, Meeting, Participant, RoomToken, RoomTokenRequest,
};
use crate::observability::metrics;
use crate::repositories::{AppendOutcome, MeetingStore, StoreError};
use crate::services::meeting_id::{MeetingIdGenerator, RandomMeetingIds};
use crate::services::token_client::{TokenClient, TOKEN_SERVICE_UNAVAILABLE};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Maximum insert attempts when a generated ID collides.
pub const MAX_ID_COLLISION_RETRIES: usize = 3;

/// Current time at the precision Postgres `TIMESTAMPTZ` keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Meeting operations over a shared store.
#[derive(Clone)]
pub struct MeetingService {
    store: Arc<dyn MeetingStore>,
    ids: Arc<dyn MeetingIdGenerator>,
}

impl MeetingService {
    /// Service with CSPRNG meeting IDs.
    pub fn new(store: Arc<dyn MeetingStore>) -> Self {
        Self::with_id_generator(store, Arc::new(RandomMeetingIds::new()))
    }

    /// Service with a caller-supplied ID generator.
    pub fn with_id_generator(
        store: Arc<dyn MeetingStore>,
        ids: Arc<dyn MeetingIdGenerator>,
    ) -> Self {
        Self { store, ids }
    }

    /// Create a meeting whose only participant is the host.
    ///
    /// # Errors
    ///
    /// - `Validation` if `name` or `hostName` is missing or empty
    /// - `Storage` if the store fails
    /// - `Internal` if every generated ID collided
    #[instrument(skip_all, name = "meeting.service.create")]
    pub async fn create(&self, request: &CreateMeetingRequest) -> Result<Meeting, MeetingError> {
        let start = Instant::now();
        let result = self.create_inner(request).await;
        record("create", &result, start);
        result
    }

    async fn create_inner(&self, request: &CreateMeetingRequest) -> Result<Meeting, MeetingError> {
        let (name, host_name) = request
            .validate()
            .map_err(|e| MeetingError::Validation(e.to_string()))?;

        for attempt in 0..MAX_ID_COLLISION_RETRIES {
            let meeting = Meeting::new(self.ids.generate()?, name, host_name, now());

            match self.store.insert(&meeting).await {
                Ok(()) => {
                    info!(
                        target: "meeting.services.meetings",
                        meeting_id = %meeting.meeting_id,
                        "Meeting created"
                    );
                    return Ok(meeting);
                }
                Err(StoreError::DuplicateMeetingId(id)) => {
                    debug!(
                        target: "meeting.services.meetings",
                        attempt = attempt + 1,
                        meeting_id = %id,
                        "Meeting ID collision, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            target: "meeting.services.meetings",
            attempts = MAX_ID_COLLISION_RETRIES,
            "Exhausted meeting ID collision retries"
        );
        Err(MeetingError::Internal(
            "Failed to generate unique meeting ID".to_string(),
        ))
    }

    /// Append a non-host participant to an existing meeting.
    ///
    /// # Errors
    ///
    /// - `Validation` if `meetingId` or `name` is missing or empty
    /// - `NotFound` if no meeting has this ID
    /// - `DuplicateParticipant` if the name is already on the roster
    /// - `Storage` if the store fails
    #[instrument(skip_all, name = "meeting.service.join")]
    pub async fn join(&self, request: &JoinMeetingRequest) -> Result<Meeting, MeetingError> {
        let start = Instant::now();
        let result = self.join_inner(request).await;
        record("join", &result, start);
        result
    }

    async fn join_inner(&self, request: &JoinMeetingRequest) -> Result<Meeting, MeetingError> {
        let (meeting_id, name) = request
            .validate()
            .map_err(|e| MeetingError::Validation(e.to_string()))?;

        let participant = Participant::guest(name, now());
        match self.store.append_participant(meeting_id, &participant).await? {
            AppendOutcome::Appended(meeting) => {
                info!(
                    target: "meeting.services.meetings",
                    meeting_id = %meeting.meeting_id,
                    participants = meeting.participants.len(),
                    "Participant joined meeting"
                );
                Ok(meeting)
            }
            AppendOutcome::MeetingNotFound => {
                Err(MeetingError::NotFound("Meeting not found".to_string()))
            }
            AppendOutcome::DuplicateName => Err(MeetingError::DuplicateParticipant(
                "Participant already joined".to_string(),
            )),
        }
    }

    /// Fetch a meeting by ID.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no meeting has this ID
    /// - `Storage` if the store fails
    #[instrument(skip_all, name = "meeting.service.get", fields(meeting_id = %meeting_id))]
    pub async fn get(&self, meeting_id: &str) -> Result<Meeting, MeetingError> {
        let start = Instant::now();
        let result = match self.store.find_by_meeting_id(meeting_id).await {
            Ok(Some(meeting)) => Ok(meeting),
            Ok(None) => Err(MeetingError::NotFound("Meeting not found".to_string())),
            Err(e) => Err(e.into()),
        };
        record("get", &result, start);
        result
    }

    /// Mint room credentials for a participant already on the roster.
    ///
    /// The room name passed to the token service is the meeting ID.
    ///
    /// # Errors
    ///
    /// - `Validation` if `meetingId` or `name` is missing or empty
    /// - `NotFound` if no meeting has this ID
    /// - `NotParticipant` if `name` is not on the roster
    /// - `ServiceUnavailable` if no token service is configured or it is down
    /// - `BadGateway` if the token service reply is unusable
    #[instrument(skip_all, name = "meeting.service.issue_room_token")]
    pub async fn issue_room_token(
        &self,
        request: &RoomTokenRequest,
        tokens: Option<&TokenClient>,
    ) -> Result<RoomToken, MeetingError> {
        let start = Instant::now();
        let result = self.issue_room_token_inner(request, tokens).await;
        record("issue_token", &result, start);
        result
    }

    async fn issue_room_token_inner(
        &self,
        request: &RoomTokenRequest,
        tokens: Option<&TokenClient>,
    ) -> Result<RoomToken, MeetingError> {
        let (meeting_id, name) = request
            .validate()
            .map_err(|e| MeetingError::Validation(e.to_string()))?;

        let meeting = self
            .store
            .find_by_meeting_id(meeting_id)
            .await?
            .ok_or_else(|| MeetingError::NotFound("Meeting not found".to_string()))?;

        if !meeting.has_participant(name) {
            return Err(MeetingError::NotParticipant(
                "Participant has not joined this meeting".to_string(),
            ));
        }

        let Some(tokens) = tokens else {
            warn!(
                target: "meeting.services.meetings",
                "Room token requested but no token service is configured"
            );
            return Err(MeetingError::ServiceUnavailable(
                TOKEN_SERVICE_UNAVAILABLE.to_string(),
            ));
        };

        tokens.request_room_token(&meeting.meeting_id, name).await
    }
}

fn record<T>(operation: &str, result: &Result<T, MeetingError>, start: Instant) {
    let duration = start.elapsed();
    match result {
        Ok(_) => metrics::record_meeting_operation(operation, "success", None, duration),
        Err(e) => {
            metrics::record_meeting_operation(operation, "error", Some(e.error_type()), duration)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::repositories::MemoryMeetingStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn create_request(name: &str, host_name: &str) -> CreateMeetingRequest {
        CreateMeetingRequest {
            name: Some(name.to_string()),
            host_name: Some(host_name.to_string()),
        }
    }

    fn join_request(meeting_id: &str, name: &str) -> JoinMeetingRequest {
        JoinMeetingRequest {
            meeting_id: Some(meeting_id.to_string()),
            name: Some(name.to_string()),
        }
    }

    fn memory_service() -> (MeetingService, Arc<MemoryMeetingStore>) {
        let store = Arc::new(MemoryMeetingStore::new());
        (MeetingService::new(store.clone()), store)
    }

    /// Returns IDs from a fixed script, then repeats the last one.
    struct ScriptedIds {
        ids: Mutex<Vec<&'static str>>,
    }

    impl ScriptedIds {
        fn new(mut ids: Vec<&'static str>) -> Self {
            ids.reverse();
            Self {
                ids: Mutex::new(ids),
            }
        }
    }

    impl MeetingIdGenerator for ScriptedIds {
        fn generate(&self) -> Result<String, MeetingError> {
            let mut ids = self.ids.lock().unwrap();
            let id = if ids.len() > 1 {
                ids.pop().unwrap()
            } else {
                *ids.last().unwrap()
            };
            Ok(id.to_string())
        }
    }

    /// Store whose every operation fails.
    struct FailingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MeetingStore for FailingStore {
        async fn insert(&self, _meeting: &Meeting) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn find_by_meeting_id(&self, _id: &str) -> Result<Option<Meeting>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn append_participant(
            &self,
            _id: &str,
            _participant: &Participant,
        ) -> Result<AppendOutcome, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_create_yields_single_host() {
        let (service, store) = memory_service();

        let meeting = service
            .create(&create_request("Standup", "Alice"))
            .await
            .unwrap();

        assert!(!meeting.meeting_id.is_empty());
        assert_eq!(meeting.name, "Standup");
        assert_eq!(meeting.participants.len(), 1);
        let host = meeting.participants.first().unwrap();
        assert_eq!(host.name, "Alice");
        assert!(host.is_host);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_timestamps_truncated_to_microseconds() {
        let (service, _store) = memory_service();

        let meeting = service
            .create(&create_request("Standup", "Alice"))
            .await
            .unwrap();
        let joined = service
            .join(&join_request(&meeting.meeting_id, "Bob"))
            .await
            .unwrap();

        assert_eq!(meeting.created_at.timestamp_subsec_nanos() % 1_000, 0);
        for participant in &joined.participants {
            assert_eq!(participant.joined_at.timestamp_subsec_nanos() % 1_000, 0);
        }
        assert_eq!(
            joined.participants.first().unwrap().joined_at,
            meeting.created_at
        );
    }

    #[tokio::test]
    async fn test_create_empty_host_persists_nothing() {
        let (service, store) = memory_service();

        let result = service.create(&create_request("Standup", "")).await;

        assert!(
            matches!(result, Err(MeetingError::Validation(msg)) if msg == "Name and host required")
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_missing_name() {
        let (service, _store) = memory_service();

        let request = CreateMeetingRequest {
            name: None,
            host_name: Some("Alice".to_string()),
        };

        assert!(matches!(
            service.create(&request).await,
            Err(MeetingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_retries_on_id_collision() {
        let store = Arc::new(MemoryMeetingStore::new());
        let ids = Arc::new(ScriptedIds::new(vec!["taken0001", "taken0001", "fresh0002"]));
        let service = MeetingService::with_id_generator(store.clone(), ids);

        let first = service.create(&create_request("One", "Alice")).await.unwrap();
        assert_eq!(first.meeting_id, "taken0001");

        let second = service.create(&create_request("Two", "Bob")).await.unwrap();
        assert_eq!(second.meeting_id, "fresh0002");
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_create_gives_up_after_max_collisions() {
        let store = Arc::new(MemoryMeetingStore::new());
        let ids = Arc::new(ScriptedIds::new(vec!["samesame1"]));
        let service = MeetingService::with_id_generator(store.clone(), ids);

        service.create(&create_request("One", "Alice")).await.unwrap();
        let result = service.create(&create_request("Two", "Bob")).await;

        assert!(
            matches!(result, Err(MeetingError::Internal(msg)) if msg == "Failed to generate unique meeting ID")
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_storage_failure_passes_message() {
        let store = Arc::new(FailingStore {
            calls: AtomicUsize::new(0),
        });
        let service = MeetingService::new(store.clone());

        let result = service.create(&create_request("Standup", "Alice")).await;

        assert!(
            matches!(result, Err(MeetingError::Storage(msg)) if msg == "connection refused")
        );
        // Backend failures are not retried
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_join_appends_non_host() {
        let (service, _store) = memory_service();
        let meeting = service
            .create(&create_request("Standup", "Alice"))
            .await
            .unwrap();

        let joined = service
            .join(&join_request(&meeting.meeting_id, "Bob"))
            .await
            .unwrap();

        assert_eq!(joined.participants.len(), 2);
        let bob = joined.participants.get(1).unwrap();
        assert_eq!(bob.name, "Bob");
        assert!(!bob.is_host);
        assert!(joined.participants.first().unwrap().is_host);
    }

    #[tokio::test]
    async fn test_join_twice_same_name_rejected() {
        let (service, _store) = memory_service();
        let meeting = service
            .create(&create_request("Standup", "Alice"))
            .await
            .unwrap();

        service
            .join(&join_request(&meeting.meeting_id, "Bob"))
            .await
            .unwrap();
        let second = service.join(&join_request(&meeting.meeting_id, "Bob")).await;

        assert!(
            matches!(second, Err(MeetingError::DuplicateParticipant(msg)) if msg == "Participant already joined")
        );
        let stored = service.get(&meeting.meeting_id).await.unwrap();
        assert_eq!(stored.participants.len(), 2);
    }

    #[tokio::test]
    async fn test_host_rejoin_rejected() {
        let (service, _store) = memory_service();
        let meeting = service
            .create(&create_request("Standup", "Alice"))
            .await
            .unwrap();

        let result = service
            .join(&join_request(&meeting.meeting_id, "Alice"))
            .await;

        assert!(matches!(result, Err(MeetingError::DuplicateParticipant(_))));
    }

    #[tokio::test]
    async fn test_join_names_differing_in_case_are_distinct() {
        let (service, _store) = memory_service();
        let meeting = service
            .create(&create_request("Standup", "Alice"))
            .await
            .unwrap();

        let joined = service
            .join(&join_request(&meeting.meeting_id, "alice"))
            .await
            .unwrap();

        assert_eq!(joined.participants.len(), 2);
    }

    #[tokio::test]
    async fn test_join_unknown_meeting() {
        let (service, _store) = memory_service();

        let result = service.join(&join_request("nosuchid0", "Bob")).await;

        assert!(matches!(result, Err(MeetingError::NotFound(msg)) if msg == "Meeting not found"));
    }

    #[tokio::test]
    async fn test_join_missing_name() {
        let (service, _store) = memory_service();

        let request = JoinMeetingRequest {
            meeting_id: Some("abc".to_string()),
            name: None,
        };

        assert!(
            matches!(service.join(&request).await, Err(MeetingError::Validation(msg)) if msg == "Meeting ID and participant name required")
        );
    }

    #[tokio::test]
    async fn test_concurrent_joins_same_name_admit_one() {
        let (service, _store) = memory_service();
        let meeting = service
            .create(&create_request("Standup", "Alice"))
            .await
            .unwrap();

        let attempts = (0..10).map(|_| {
            let service = service.clone();
            let request = join_request(&meeting.meeting_id, "Bob");
            tokio::spawn(async move { service.join(&request).await })
        });

        let mut successes = 0;
        let mut duplicates = 0;
        for handle in attempts {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(MeetingError::DuplicateParticipant(_)) => duplicates += 1,
                Err(e) => unreachable!("unexpected error: {e}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(duplicates, 9);
    }

    #[tokio::test]
    async fn test_get_returns_created_meeting() {
        let (service, _store) = memory_service();
        let created = service
            .create(&create_request("Standup", "Alice"))
            .await
            .unwrap();

        let fetched = service.get(&created.meeting_id).await.unwrap();

        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_unknown_meeting() {
        let (service, _store) = memory_service();
        assert!(matches!(
            service.get("nosuchid0").await,
            Err(MeetingError::NotFound(_))
        ));
    }

    fn token_request(meeting_id: &str, name: &str) -> RoomTokenRequest {
        RoomTokenRequest {
            meeting_id: Some(meeting_id.to_string()),
            name: Some(name.to_string()),
        }
    }

    #[tokio::test]
    async fn test_issue_token_unknown_meeting() {
        let (service, _store) = memory_service();

        let result = service
            .issue_room_token(&token_request("nosuchid0", "Bob"), None)
            .await;

        assert!(matches!(result, Err(MeetingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_issue_token_rejects_non_participant() {
        let (service, _store) = memory_service();
        let meeting = service
            .create(&create_request("Standup", "Alice"))
            .await
            .unwrap();

        let result = service
            .issue_room_token(&token_request(&meeting.meeting_id, "Mallory"), None)
            .await;

        assert!(matches!(result, Err(MeetingError::NotParticipant(_))));
    }

    #[tokio::test]
    async fn test_issue_token_without_token_service() {
        let (service, _store) = memory_service();
        let meeting = service
            .create(&create_request("Standup", "Alice"))
            .await
            .unwrap();

        let result = service
            .issue_room_token(&token_request(&meeting.meeting_id, "Alice"), None)
            .await;

        assert!(
            matches!(result, Err(MeetingError::ServiceUnavailable(msg)) if msg == TOKEN_SERVICE_UNAVAILABLE)
        );
    }

    #[tokio::test]
    async fn test_issue_token_missing_fields() {
        let (service, _store) = memory_service();

        let result = service
            .issue_room_token(&RoomTokenRequest::default(), None)
            .await;

        assert!(matches!(result, Err(MeetingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_storage_failure() {
        let service = MeetingService::new(Arc::new(FailingStore {
            calls: AtomicUsize::new(0),
        }));
        assert!(matches!(
            service.get("abc").await,
            Err(MeetingError::Storage(_))
        ));
    }
}
