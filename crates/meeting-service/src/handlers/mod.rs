//! HTTP request handlers for the meeting service.

pub mod health;
pub mod meetings;
pub mod metrics;

pub use health::{health_check, readiness_check};
pub use meetings::{
    create_meeting, get_meeting, get_meeting_by_route_segment, issue_room_token, join_meeting,
};
pub use metrics::metrics_handler;
