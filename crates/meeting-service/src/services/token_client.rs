//! HTTP client for the external room-token service.
//!
//! The token service mints media-room credentials. It is an opaque
//! collaborator: we POST `{roomName, userName}` and expect
//! `{success, token: {token, url, identity}}` back.
//!
//! Failures never leak upstream detail to callers:
//! - unreachable or 5xx maps to `ServiceUnavailable` (503)
//! - a reply we cannot use maps to `BadGateway` (502)

use crate::errors::MeetingError;
use crate::models::RoomToken;
use crate::observability::metrics;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Connect timeout for token-service requests in seconds.
const TOKEN_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Message returned when the token service cannot be reached.
pub const TOKEN_SERVICE_UNAVAILABLE: &str = "Token service unavailable";

/// Request body sent to the token service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomTokenServiceRequest<'a> {
    /// Media room name; always the meeting ID.
    pub room_name: &'a str,

    /// Participant name the token is issued to.
    pub user_name: &'a str,
}

/// Reply from the token service.
#[derive(Debug, Clone, Deserialize)]
struct RoomTokenServiceReply {
    success: bool,
    token: Option<RoomToken>,
    error: Option<String>,
}

/// HTTP client for the room-token service.
#[derive(Clone)]
pub struct TokenClient {
    /// HTTP client with configured timeouts.
    client: Client,

    /// Full URL of the token endpoint.
    url: String,
}

impl TokenClient {
    /// Create a new token client.
    ///
    /// # Arguments
    ///
    /// * `url` - Token endpoint (e.g., "http://localhost:3001/api/token")
    /// * `timeout` - Overall request timeout
    ///
    /// # Errors
    ///
    /// Returns `MeetingError::Internal` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MeetingError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(TOKEN_CONNECT_TIMEOUT_SECS).min(timeout))
            .build()
            .map_err(|e| {
                error!(target: "meeting.services.token_client", error = %e, "Failed to build HTTP client");
                MeetingError::Internal("Failed to build token service client".to_string())
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Request room credentials for `user_name` in room `room_name`.
    ///
    /// # Errors
    ///
    /// - `MeetingError::ServiceUnavailable` if the service is unreachable or returns 5xx
    /// - `MeetingError::BadGateway` if the reply is malformed or reports failure
    #[instrument(skip_all, name = "meeting.token.request", fields(room_name = %room_name))]
    pub async fn request_room_token(
        &self,
        room_name: &str,
        user_name: &str,
    ) -> Result<RoomToken, MeetingError> {
        let start = Instant::now();

        let result = match self
            .client
            .post(&self.url)
            .json(&RoomTokenServiceRequest {
                room_name,
                user_name,
            })
            .send()
            .await
        {
            Ok(response) => self.handle_response(response).await,
            Err(e) => {
                warn!(target: "meeting.services.token_client", error = %e, "Token service request failed");
                Err(MeetingError::ServiceUnavailable(
                    TOKEN_SERVICE_UNAVAILABLE.to_string(),
                ))
            }
        };

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.error_type(),
        };
        metrics::record_token_request(status, start.elapsed());

        result
    }

    /// Map the token service response to a token or an error.
    async fn handle_response(&self, response: reqwest::Response) -> Result<RoomToken, MeetingError> {
        let status = response.status();

        if status.is_server_error() {
            warn!(target: "meeting.services.token_client", status = %status, "Token service returned server error");
            return Err(MeetingError::ServiceUnavailable(
                TOKEN_SERVICE_UNAVAILABLE.to_string(),
            ));
        }

        let body = response.bytes().await.map_err(|e| {
            warn!(target: "meeting.services.token_client", error = %e, "Failed to read token service response");
            MeetingError::ServiceUnavailable(TOKEN_SERVICE_UNAVAILABLE.to_string())
        })?;

        let reply: RoomTokenServiceReply = serde_json::from_slice(&body).map_err(|e| {
            error!(target: "meeting.services.token_client", status = %status, error = %e, "Failed to parse token service response");
            MeetingError::BadGateway("Invalid response from token service".to_string())
        })?;

        match reply {
            RoomTokenServiceReply {
                success: true,
                token: Some(token),
                ..
            } if status.is_success() => Ok(token),
            RoomTokenServiceReply { error, .. } => {
                let reason = error.unwrap_or_else(|| "Token service rejected the request".to_string());
                warn!(target: "meeting.services.token_client", status = %status, reason = %reason, "Token service declined");
                Err(MeetingError::BadGateway(reason))
            }
        }
    }
}

impl std::fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> TokenClient {
        TokenClient::new(format!("{}/api/token", server.uri()), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_value(RoomTokenServiceRequest {
            room_name: "abc123xyz",
            user_name: "Bob",
        })
        .unwrap();
        assert_eq!(json, json!({"roomName": "abc123xyz", "userName": "Bob"}));
    }

    #[tokio::test]
    async fn test_success_returns_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_json(json!({"roomName": "abc123xyz", "userName": "Bob"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "token": {"token": "jwt", "url": "wss://media.example", "identity": "Bob"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server)
            .await
            .request_room_token("abc123xyz", "Bob")
            .await
            .unwrap();

        assert_eq!(token.token, "jwt");
        assert_eq!(token.url, "wss://media.example");
        assert_eq!(token.identity, "Bob");
    }

    #[tokio::test]
    async fn test_server_error_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .request_room_token("abc123xyz", "Bob")
            .await;

        assert!(
            matches!(result, Err(MeetingError::ServiceUnavailable(msg)) if msg == TOKEN_SERVICE_UNAVAILABLE)
        );
    }

    #[tokio::test]
    async fn test_unreachable_maps_to_unavailable() {
        // Nothing listens on the discard port
        let client = TokenClient::new("http://127.0.0.1:9/api/token", Duration::from_secs(2)).unwrap();

        let result = client.request_room_token("abc123xyz", "Bob").await;

        assert!(matches!(result, Err(MeetingError::ServiceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_declined_maps_to_bad_gateway_with_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "error": "Room name and user name required"
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .request_room_token("abc123xyz", "Bob")
            .await;

        assert!(
            matches!(result, Err(MeetingError::BadGateway(msg)) if msg == "Room name and user name required")
        );
    }

    #[tokio::test]
    async fn test_malformed_reply_maps_to_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .request_room_token("abc123xyz", "Bob")
            .await;

        assert!(matches!(result, Err(MeetingError::BadGateway(_))));
    }

    #[tokio::test]
    async fn test_success_without_token_maps_to_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .request_room_token("abc123xyz", "Bob")
            .await;

        assert!(matches!(result, Err(MeetingError::BadGateway(_))));
    }

    #[test]
    fn test_debug_shows_url() {
        let client = TokenClient::new("http://tokens.local/api/token", Duration::from_secs(1)).unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("http://tokens.local/api/token"));
    }
}
