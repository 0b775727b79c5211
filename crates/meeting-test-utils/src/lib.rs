//! # Meeting Test Utilities
//!
//! Shared test utilities for the meeting service.
//!
//! This crate provides:
//! - Server test harness (`TestMeetingServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meeting_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestMeetingServer::spawn().await?;
//!     let client = reqwest::Client::new();
//!
//!     let response = client
//!         .get(format!("{}/health", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

pub use server_harness::*;
