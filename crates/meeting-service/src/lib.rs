//! Meeting Service Library
//!
//! Backend for a small video-meeting app. Meetings are documents holding a
//! display name, a short random `meetingId`, and an ordered roster of
//! participants. The service:
//!
//! - creates a meeting with its host as the first participant
//! - appends participants atomically, rejecting duplicate names
//! - fetches meetings by ID
//! - brokers room credentials from an external token service
//!
//! # Architecture
//!
//! Handler -> Service -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Meeting documents and request/response bodies
//! - `observability` - Prometheus metrics
//! - `repositories` - `MeetingStore` trait with Postgres and in-memory stores
//! - `routes` - Axum router setup
//! - `services` - Meeting operations, ID generation, token client

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
