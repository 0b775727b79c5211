//! Room token integration tests.
//!
//! Tests `POST /meetings/token` against a wiremock stand-in for the external
//! token service.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use meeting_test_utils::TestMeetingServer;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/api/token";

async fn spawn_with_mock() -> Result<(TestMeetingServer, MockServer)> {
    let mock = MockServer::start().await;
    let server =
        TestMeetingServer::spawn_with_token_service(format!("{}{}", mock.uri(), TOKEN_PATH))
            .await?;
    Ok((server, mock))
}

/// Create a meeting hosted by Alice with Bob joined; returns the meeting ID.
async fn meeting_with_bob(client: &Client, server: &TestMeetingServer) -> Result<String> {
    let created: Value = client
        .post(format!("{}/meetings", server.url()))
        .json(&json!({"name": "Standup", "hostName": "Alice"}))
        .send()
        .await?
        .json()
        .await?;
    let meeting_id = created["meeting"]["meetingId"].as_str().unwrap().to_string();

    let joined = client
        .post(format!("{}/meetings/join", server.url()))
        .json(&json!({"meetingId": meeting_id, "name": "Bob"}))
        .send()
        .await?;
    assert_eq!(joined.status(), StatusCode::OK);

    Ok(meeting_id)
}

async fn request_token(
    client: &Client,
    server: &TestMeetingServer,
    body: Value,
) -> Result<(StatusCode, Value)> {
    let response = client
        .post(format!("{}/meetings/token", server.url()))
        .json(&body)
        .send()
        .await?;
    let status = response.status();
    Ok((status, response.json().await?))
}

#[tokio::test]
async fn test_token_issued_for_participant() -> Result<()> {
    let (server, mock) = spawn_with_mock().await?;
    let client = Client::new();
    let meeting_id = meeting_with_bob(&client, &server).await?;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_json(json!({"roomName": meeting_id, "userName": "Bob"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": {"token": "room-jwt", "url": "wss://media.example", "identity": "Bob"}
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let (status, body) = request_token(
        &client,
        &server,
        json!({"meetingId": meeting_id, "name": "Bob"}),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "token": {"token": "room-jwt", "url": "wss://media.example", "identity": "Bob"}
        })
    );

    Ok(())
}

#[tokio::test]
async fn test_token_rejected_for_non_participant() -> Result<()> {
    let (server, mock) = spawn_with_mock().await?;
    let client = Client::new();
    let meeting_id = meeting_with_bob(&client, &server).await?;

    // The token service must never be called
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;

    let (status, body) = request_token(
        &client,
        &server,
        json!({"meetingId": meeting_id, "name": "Mallory"}),
    )
    .await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body,
        json!({"error": "Participant has not joined this meeting"})
    );

    Ok(())
}

#[tokio::test]
async fn test_token_for_unknown_meeting_is_404() -> Result<()> {
    let (server, _mock) = spawn_with_mock().await?;

    let (status, body) = request_token(
        &Client::new(),
        &server,
        json!({"meetingId": "nosuchid0", "name": "Bob"}),
    )
    .await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Meeting not found");

    Ok(())
}

#[tokio::test]
async fn test_token_service_error_is_503() -> Result<()> {
    let (server, mock) = spawn_with_mock().await?;
    let client = Client::new();
    let meeting_id = meeting_with_bob(&client, &server).await?;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock)
        .await;

    let (status, body) = request_token(
        &client,
        &server,
        json!({"meetingId": meeting_id, "name": "Alice"}),
    )
    .await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        json!({"success": false, "error": "Token service unavailable"})
    );

    Ok(())
}

#[tokio::test]
async fn test_token_service_declined_is_502() -> Result<()> {
    let (server, mock) = spawn_with_mock().await?;
    let client = Client::new();
    let meeting_id = meeting_with_bob(&client, &server).await?;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "error": "Room is full"})),
        )
        .mount(&mock)
        .await;

    let (status, body) = request_token(
        &client,
        &server,
        json!({"meetingId": meeting_id, "name": "Bob"}),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({"success": false, "error": "Room is full"}));

    Ok(())
}

#[tokio::test]
async fn test_token_without_configured_service_is_503() -> Result<()> {
    let server = TestMeetingServer::spawn().await?;
    let client = Client::new();
    let meeting_id = meeting_with_bob(&client, &server).await?;

    let (status, body) = request_token(
        &client,
        &server,
        json!({"meetingId": meeting_id, "name": "Bob"}),
    )
    .await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Token service unavailable");

    Ok(())
}

#[tokio::test]
async fn test_token_missing_fields_is_400() -> Result<()> {
    let (server, _mock) = spawn_with_mock().await?;

    let (status, body) = request_token(&Client::new(), &server, json!({"meetingId": "abc"})).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Meeting ID and participant name required");

    Ok(())
}
