//! Meeting ID generation.
//!
//! IDs are 9 lowercase base-36 characters drawn from the system CSPRNG:
//! short enough to read aloud or paste into a URL, ~46 bits of entropy.

use crate::errors::MeetingError;
use ring::rand::{SecureRandom, SystemRandom};

/// Base36 alphabet for meeting IDs.
const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of generated meeting IDs.
pub const MEETING_ID_LENGTH: usize = 9;

/// Random bytes consumed per ID (64 bits, more than 36^9 needs).
const MEETING_ID_RANDOM_BYTES: usize = 8;

/// Produces candidate meeting IDs.
///
/// A trait so collision handling can be exercised deterministically.
pub trait MeetingIdGenerator: Send + Sync {
    /// Generate one candidate ID.
    fn generate(&self) -> Result<String, MeetingError>;
}

/// CSPRNG-backed generator used in production.
#[derive(Debug)]
pub struct RandomMeetingIds {
    rng: SystemRandom,
}

impl RandomMeetingIds {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for RandomMeetingIds {
    fn default() -> Self {
        Self::new()
    }
}

impl MeetingIdGenerator for RandomMeetingIds {
    fn generate(&self) -> Result<String, MeetingError> {
        let mut bytes = [0u8; MEETING_ID_RANDOM_BYTES];
        self.rng.fill(&mut bytes).map_err(|e| {
            tracing::error!(target: "meeting.services.meeting_id", error = %e, "Failed to generate random bytes for meeting ID");
            MeetingError::Internal("RNG failure".to_string())
        })?;

        let mut value = u64::from_be_bytes(bytes);

        let mut id = Vec::with_capacity(MEETING_ID_LENGTH);
        for _ in 0..MEETING_ID_LENGTH {
            let idx = (value % 36) as usize;
            let ch = BASE36_CHARS
                .get(idx)
                .ok_or_else(|| MeetingError::Internal("Base36 index out of range".to_string()))?;
            id.push(*ch);
            value /= 36;
        }

        String::from_utf8(id)
            .map_err(|_| MeetingError::Internal("Meeting ID contained invalid UTF-8".to_string()))
    }
}
