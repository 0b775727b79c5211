//! Service layer for the meeting service.
//!
//! # Components
//!
//! - `meetings` - create, join, fetch and room-token issuance
//! - `meeting_id` - random meeting ID generation
//! - `token_client` - HTTP client for the external room-token service

pub mod meeting_id;
pub mod meetings;
pub mod token_client;

pub use meeting_id::{MeetingIdGenerator, RandomMeetingIds};
pub use meetings::MeetingService;
pub use token_client::TokenClient;
