use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use survey_api_client::{ApiClient, ClientOptions, PhotoPayload, RetryPolicy, Session};
use survey_core::models::EntityId;
use survey_core::{
    AuthError, BoundingBox, Camera, FinalizeError, PhotoBatch, ProjectDescriptor,
    RegistrationError, Survey, TransferError,
};
use tokio::net::TcpListener;

fn options() -> ClientOptions {
    ClientOptions {
        auth_timeout: Duration::from_millis(300),
        request_timeout: Duration::from_secs(5),
        upload_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        },
        ..Default::default()
    }
}

async fn login(server: &mut ServerGuard, client: &ApiClient) -> Session {
    let _token = server
        .mock("POST", "/dxauth/oauth2/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"tok-123","expires_in":3600,"token_type":"bearer"}"#)
        .create_async()
        .await;
    client.authenticate("alice", "pw").await.unwrap()
}

fn survey() -> Survey {
    let bbox = BoundingBox {
        min_lat: 61.0,
        max_lat: 61.1,
        min_lon: 23.0,
        max_lon: 23.1,
    };
    Survey::new("field-7", &bbox, Camera::default(), 2, chrono::Utc::now())
}

fn project() -> ProjectDescriptor {
    ProjectDescriptor {
        project: EntityId::new("p1"),
        mission: EntityId::new("m1"),
        flight: EntityId::new("f1"),
        cameras: vec![],
    }
}

#[tokio::test]
async fn authenticate_sends_password_grant() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/dxauth/oauth2/token")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "grant_type": "password",
            "username": "alice",
            "password": "pw",
            "client_id": "insight-cli"
        })))
        .with_status(200)
        .with_body(r#"{"access_token":"tok-123","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;

    let client = ApiClient::new(server.url(), options()).unwrap();
    let session = client.authenticate("alice", "pw").await.unwrap();

    mock.assert_async().await;
    assert_eq!(session.bearer_token(), "tok-123");
    assert_eq!(session.expires_in(), Some(Duration::from_secs(3600)));
    assert!(!session.is_expired());
}

#[tokio::test]
async fn authenticate_rejection_carries_status_and_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/dxauth/oauth2/token")
        .with_status(401)
        .with_body("bad credentials")
        .create_async()
        .await;

    let client = ApiClient::new(server.url(), options()).unwrap();
    let err = client.authenticate("alice", "wrong").await.unwrap_err();

    match err {
        AuthError::Rejected { status, body, .. } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad credentials");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn authenticate_without_token_is_an_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/dxauth/oauth2/token")
        .with_status(200)
        .with_body(r#"{"token_type":"bearer"}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url(), options()).unwrap();
    let err = client.authenticate("alice", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::MissingToken));
}

#[tokio::test]
async fn authenticate_times_out_on_silent_server() {
    // Accepts the connection and never writes a response.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let _silent = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });

    let client = ApiClient::new(url, options()).unwrap();
    let started = std::time::Instant::now();
    let err = client.authenticate("alice", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::Timeout(_)), "got {:?}", err);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn create_project_retries_unavailable_service() {
    let mut server = Server::new_async().await;
    let client = ApiClient::new(server.url(), options()).unwrap();
    let session = login(&mut server, &client).await;

    let unavailable = server
        .mock("POST", "/uisrv/projects/survey")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let created = server
        .mock("POST", "/uisrv/projects/survey")
        .match_header("authorization", "Bearer tok-123")
        .match_body(Matcher::PartialJson(json!({"name": "field-7", "numberOfPhotos": 2})))
        .with_status(200)
        .with_body(
            r#"{"project":{"_id":"p1"},"mission":{"_id":"m1"},"flight":{"_id":"f1"},"cameras":[{"_id":"c1"}]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let project = client.create_project(&session, &survey()).await.unwrap();

    unavailable.assert_async().await;
    created.assert_async().await;
    assert_eq!(project.flight_id(), "f1");
    assert_eq!(project.primary_camera_id(), Some("c1"));
}

#[tokio::test]
async fn create_project_does_not_retry_server_error() {
    let mut server = Server::new_async().await;
    let client = ApiClient::new(server.url(), options()).unwrap();
    let session = login(&mut server, &client).await;

    let failing = server
        .mock("POST", "/uisrv/projects/survey")
        .with_status(500)
        .with_body("boom")
        .expect(1)
        .create_async()
        .await;

    let err = client.create_project(&session, &survey()).await.unwrap_err();

    failing.assert_async().await;
    match err {
        RegistrationError::ProjectCreationFailed { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn register_photos_returns_server_ids() {
    let mut server = Server::new_async().await;
    let client = ApiClient::new(server.url(), options()).unwrap();
    let session = login(&mut server, &client).await;

    let mock = server
        .mock("POST", "/dxpm/photos")
        .match_body(Matcher::PartialJson(json!({"flight": "f1"})))
        .with_status(200)
        .with_body(
            r#"{"photos":[{"_id":"a","seq":"/x/1.jpg"},{"_id":"b","seq":"/x/2.jpg"}]}"#,
        )
        .create_async()
        .await;

    let batch = PhotoBatch::for_project(&project(), vec![]);
    let registered = client.register_photos(&session, &batch).await.unwrap();

    mock.assert_async().await;
    assert_eq!(registered.photos.len(), 2);
    assert_eq!(registered.photos[1].id.as_deref(), Some("b"));
}

#[tokio::test]
async fn register_photos_rejection_is_batch_failure() {
    let mut server = Server::new_async().await;
    let client = ApiClient::new(server.url(), options()).unwrap();
    let session = login(&mut server, &client).await;

    let _mock = server
        .mock("POST", "/dxpm/photos")
        .with_status(400)
        .with_body("invalid camera")
        .create_async()
        .await;

    let batch = PhotoBatch::for_project(&project(), vec![]);
    let err = client.register_photos(&session, &batch).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::BatchCreationFailed { status: 400, .. }
    ));
}

#[tokio::test]
async fn upload_photo_sends_bytes_with_checksum() {
    let mut server = Server::new_async().await;
    let client = ApiClient::new(server.url(), options()).unwrap();
    let session = login(&mut server, &client).await;

    let payload = PhotoPayload::new(b"jpeg-bytes".to_vec());
    let mock = server
        .mock("PUT", "/dxds/photos/jpg/abc")
        .match_header("authorization", "Bearer tok-123")
        .match_header("content-type", "application/octet-stream")
        .match_header("content-md5", payload.md5())
        .match_body("jpeg-bytes")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    client.upload_photo(&session, "abc", payload).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn requests_go_to_the_sending_client() {
    let mut auth_server = Server::new_async().await;
    let auth_client = ApiClient::new(auth_server.url(), options()).unwrap();
    let session = login(&mut auth_server, &auth_client).await;

    let mut data_server = Server::new_async().await;
    let data_client = ApiClient::new(data_server.url(), options()).unwrap();
    let mock = data_server
        .mock("PUT", "/dxds/photos/jpg/abc")
        .match_header("authorization", "Bearer tok-123")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let stray = auth_server
        .mock("PUT", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    data_client
        .upload_photo(&session, "abc", PhotoPayload::new(b"jpeg".to_vec()))
        .await
        .unwrap();

    mock.assert_async().await;
    stray.assert_async().await;
}

#[tokio::test]
async fn upload_photo_maps_status_codes() {
    let mut server = Server::new_async().await;
    let client = ApiClient::new(server.url(), options()).unwrap();
    let session = login(&mut server, &client).await;

    let _expired = server
        .mock("PUT", "/dxds/photos/jpg/expired")
        .with_status(401)
        .with_body("token expired")
        .create_async()
        .await;
    let _broken = server
        .mock("PUT", "/dxds/photos/jpg/broken")
        .with_status(500)
        .with_body("disk full")
        .expect(1)
        .create_async()
        .await;

    let err = client
        .upload_photo(&session, "expired", PhotoPayload::new(vec![1]))
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Unauthorized { .. }));
    assert!(err.is_fatal());

    let err = client
        .upload_photo(&session, "broken", PhotoPayload::new(vec![1]))
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Rejected { status: 500, .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn mark_upload_complete_posts_status() {
    let mut server = Server::new_async().await;
    let client = ApiClient::new(server.url(), options()).unwrap();
    let session = login(&mut server, &client).await;

    let mock = server
        .mock("POST", "/dxpm/flights/f1/uploads/status")
        .match_body(Matcher::Json(json!({"_id": "f1", "status": "complete"})))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    client.mark_upload_complete(&session, "f1").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn mark_upload_complete_gives_up_after_retries() {
    let mut server = Server::new_async().await;
    let client = ApiClient::new(server.url(), options()).unwrap();
    let session = login(&mut server, &client).await;

    let mock = server
        .mock("POST", "/dxpm/flights/f1/uploads/status")
        .with_status(502)
        .expect(3)
        .create_async()
        .await;

    let err = client.mark_upload_complete(&session, "f1").await.unwrap_err();
    mock.assert_async().await;
    assert!(matches!(err, FinalizeError::Rejected { status: 502, .. }));
}
