mod common;

use avatar_stylizer::{
    CandidateFile, FileSource, NoticeLevel, Orchestrator, Phase, Style, StylizerClient,
    StylizerError,
};
use common::{
    manual_orchestrator, mount_generate_success, mount_status, png, RecordingPlatform,
};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_request_without_file_fails_fast() {
    let server = MockServer::start().await;
    let mut orchestrator = manual_orchestrator(&server);

    let err = orchestrator.request_generation().await.unwrap_err();

    assert!(matches!(err, StylizerError::NoFileSelected));
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(orchestrator.phase(), Phase::Idle);

    let notices = orchestrator.platform().notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "No image selected");
}

#[tokio::test]
async fn test_end_to_end_success() {
    let server = MockServer::start().await;
    mount_status(&server, true, 0).await;
    Mock::given(method("POST"))
        .and(path("/generate-avatar"))
        .and(query_param("style", "fantasy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_url": "http://x/y.png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut orchestrator = manual_orchestrator(&server);
    orchestrator.select_file(png(2 * 1024 * 1024)).unwrap();
    orchestrator.set_style(Style::Fantasy);
    assert!(orchestrator.can_submit());

    let avatar = orchestrator.request_generation().await.unwrap();

    assert_eq!(avatar.image_url, "http://x/y.png");
    assert_eq!(avatar.style, Style::Fantasy);
    assert_eq!(orchestrator.result().unwrap().image_url, "http://x/y.png");
    assert_eq!(orchestrator.wait_seconds(), 0);
    assert_eq!(orchestrator.phase(), Phase::Idle);
    assert!(orchestrator.can_submit());
    assert!(orchestrator.platform().notices().is_empty());
}

async fn assert_blocked_then_released(wait_time: u64) {
    let server = MockServer::start().await;
    mount_status(&server, false, wait_time).await;
    Mock::given(method("POST"))
        .and(path("/generate-avatar"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut orchestrator = manual_orchestrator(&server);
    orchestrator.select_file(png(1024)).unwrap();

    let err = orchestrator.request_generation().await.unwrap_err();
    assert!(matches!(err, StylizerError::RateLimited { wait_seconds } if wait_seconds == wait_time));
    assert_eq!(orchestrator.wait_seconds(), wait_time);
    assert_eq!(orchestrator.phase(), Phase::Cooldown);
    assert!(!orchestrator.can_submit());

    for _ in 0..wait_time - 1 {
        orchestrator.tick_countdown();
    }
    assert_eq!(orchestrator.wait_seconds(), 1);
    assert!(!orchestrator.can_submit());

    assert_eq!(orchestrator.tick_countdown(), 0);
    assert!(orchestrator.can_submit());
    assert_eq!(orchestrator.phase(), Phase::Idle);

    assert_eq!(orchestrator.tick_countdown(), 0);
    assert_eq!(orchestrator.wait_seconds(), 0);
}

#[tokio::test]
async fn test_ineligible_request_blocks_for_reported_wait() {
    assert_blocked_then_released(185).await;
}

#[tokio::test]
async fn test_ineligible_end_to_end_releases_after_42_ticks() {
    assert_blocked_then_released(42).await;
}

#[tokio::test]
async fn test_ineligible_request_warns_with_formatted_wait() {
    let server = MockServer::start().await;
    mount_status(&server, false, 185).await;

    let mut orchestrator = manual_orchestrator(&server);
    orchestrator.select_file(png(1024)).unwrap();
    let _ = orchestrator.request_generation().await;

    let notices = orchestrator.platform().notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert_eq!(notices[0].title, "Rate Limit");
    assert!(notices[0].message.contains("3:05"));
}

#[tokio::test]
async fn test_eligibility_check_fails_open() {
    let status_failures = [
        ResponseTemplate::new(500),
        ResponseTemplate::new(503).set_body_json(json!({ "detail": "down" })),
        ResponseTemplate::new(200).set_body_json(json!({
            "status": "no rate limit logic on backend"
        })),
        ResponseTemplate::new(200).set_body_string("not json"),
    ];

    for failure in status_failures {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate-limit-status"))
            .respond_with(failure)
            .mount(&server)
            .await;
        mount_generate_success(&server, "http://x/open.png").await;

        let mut orchestrator = manual_orchestrator(&server);
        orchestrator.select_file(png(1024)).unwrap();

        let avatar = orchestrator.request_generation().await.unwrap();
        assert_eq!(avatar.image_url, "http://x/open.png");
        assert!(orchestrator.platform().notices().is_empty());
    }
}

#[tokio::test]
async fn test_missing_status_endpoint_fails_open() {
    let server = MockServer::start().await;
    mount_generate_success(&server, "http://x/no-status.png").await;

    let mut orchestrator = manual_orchestrator(&server);
    orchestrator.select_file(png(1024)).unwrap();

    let avatar = orchestrator.request_generation().await.unwrap();
    assert_eq!(avatar.image_url, "http://x/no-status.png");
}

#[tokio::test]
async fn test_server_429_overwrites_running_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rate-limit-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "can_request": false,
            "wait_time": 300
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_status(&server, true, 0).await;
    Mock::given(method("POST"))
        .and(path("/generate-avatar"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "detail": "Too many requests, please wait 2 minutes and 5 seconds."
        })))
        .mount(&server)
        .await;

    let mut orchestrator = manual_orchestrator(&server);
    orchestrator.select_file(png(1024)).unwrap();

    let _ = orchestrator.request_generation().await;
    orchestrator.tick_countdown();
    assert_eq!(orchestrator.wait_seconds(), 299);

    let err = orchestrator.request_generation().await.unwrap_err();
    assert!(matches!(err, StylizerError::RateLimited { wait_seconds: 125 }));
    assert_eq!(orchestrator.wait_seconds(), 125);
    assert_eq!(orchestrator.phase(), Phase::Cooldown);
}

#[tokio::test]
async fn test_failures_never_clear_previous_result() {
    let server = MockServer::start().await;
    mount_status(&server, true, 0).await;
    Mock::given(method("POST"))
        .and(path("/generate-avatar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "image_url": "X" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/generate-avatar"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "detail": "Segmind API returned no image."
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/generate-avatar"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let mut orchestrator = manual_orchestrator(&server);
    orchestrator.select_file(png(1024)).unwrap();
    orchestrator.request_generation().await.unwrap();

    let structured = orchestrator.request_generation().await.unwrap_err();
    match structured {
        StylizerError::GenerationFailed { detail } => {
            assert_eq!(detail, "Segmind API returned no image.")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(orchestrator.result().unwrap().image_url, "X");

    let generic = orchestrator.request_generation().await.unwrap_err();
    assert!(matches!(generic, StylizerError::GenerationFailedGeneric));
    assert_eq!(orchestrator.result().unwrap().image_url, "X");

    assert_eq!(orchestrator.wait_seconds(), 0);
    assert_eq!(orchestrator.phase(), Phase::Idle);

    let notices = orchestrator.platform().notices();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].message, "Segmind API returned no image.");
    assert_eq!(notices[1].message, "Failed to generate avatar. Please try again.");
}

#[tokio::test]
async fn test_later_success_replaces_result() {
    let server = MockServer::start().await;
    mount_status(&server, true, 0).await;
    Mock::given(method("POST"))
        .and(path("/generate-avatar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "image_url": "first" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_generate_success(&server, "second").await;

    let mut orchestrator = manual_orchestrator(&server);
    orchestrator.select_file(png(1024)).unwrap();

    orchestrator.request_generation().await.unwrap();
    assert_eq!(orchestrator.result().unwrap().image_url, "first");

    orchestrator.set_style(Style::Business);
    orchestrator.request_generation().await.unwrap();
    let result = orchestrator.result().unwrap();
    assert_eq!(result.image_url, "second");
    assert_eq!(result.style, Style::Business);
}

#[tokio::test]
async fn test_rejected_selection_is_notified() {
    let server = MockServer::start().await;
    let mut orchestrator = manual_orchestrator(&server);

    assert!(orchestrator.select_file(png(6 * 1024 * 1024)).is_err());
    assert!(orchestrator.candidate().is_none());
    assert!(!orchestrator.can_submit());

    let notices = orchestrator.platform().notices();
    assert_eq!(notices[0].title, "File too large");
    assert_eq!(orchestrator.live_previews(), 0);
}

#[tokio::test]
async fn test_view_tracks_phase_and_teardown() {
    let server = MockServer::start().await;
    mount_status(&server, false, 3).await;

    let client = StylizerClient::new_with_url(&server.uri()).unwrap();
    let mut orchestrator = Orchestrator::new(client, RecordingPlatform::new());
    orchestrator
        .select_files(vec![png(10), png(20)])
        .unwrap()
        .unwrap();
    assert_eq!(orchestrator.candidate().unwrap().candidate.size, 10);

    let mut view = orchestrator.view();
    assert_eq!(view.phase(), Phase::Idle);

    let _ = orchestrator.request_generation().await;
    assert_eq!(view.phase(), Phase::Cooldown);
    assert_eq!(view.remaining(), 3);
    assert!(!view.is_busy());

    let preview = orchestrator.candidate().unwrap().preview.path().to_path_buf();
    orchestrator.teardown();

    assert!(!preview.exists());
    while view.wait_changed().await {}
    assert!(view.remaining() <= 3);
}

#[tokio::test]
async fn test_source_replaced_after_selection_submits_validated_bytes() {
    let server = MockServer::start().await;
    mount_status(&server, true, 0).await;
    mount_generate_success(&server, "http://x/snapshot.png").await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("me.png");
    std::fs::write(&file_path, "validated-10").unwrap();

    let mut orchestrator = manual_orchestrator(&server);
    orchestrator
        .select_file(CandidateFile::from_path(&file_path).unwrap())
        .unwrap();
    std::fs::write(&file_path, vec![b'x'; 6 * 1024 * 1024]).unwrap();

    orchestrator.request_generation().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let upload = requests
        .iter()
        .find(|request| request.url.path() == "/generate-avatar")
        .unwrap();
    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains("validated-10"));
    assert!(!body.contains("xxxx"));
    assert!(upload.body.len() < 4096);
}

#[tokio::test]
async fn test_unreadable_selection_gets_file_notice() {
    let server = MockServer::start().await;
    let mut orchestrator = manual_orchestrator(&server);
    orchestrator.select_file(png(10)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let missing = CandidateFile {
        file_name: "missing.png".to_string(),
        mime_type: "image/png".to_string(),
        size: 10,
        source: FileSource::Disk(dir.path().join("missing.png")),
    };

    let err = orchestrator.select_file(missing).unwrap_err();

    assert!(matches!(err, StylizerError::IoError(_)));
    let notices = orchestrator.platform().notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "Could not read file");
    assert_eq!(orchestrator.candidate().unwrap().candidate.file_name, "avatar.png");
    assert_eq!(orchestrator.live_previews(), 1);
}

#[tokio::test]
async fn test_dropped_request_leaves_orchestrator_idle() {
    let server = MockServer::start().await;
    mount_status(&server, true, 0).await;
    Mock::given(method("POST"))
        .and(path("/generate-avatar"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "image_url": "http://x/late.png" }))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let mut orchestrator = manual_orchestrator(&server);
    orchestrator.select_file(png(1024)).unwrap();
    let view = orchestrator.view();

    let attempt = timeout(Duration::from_millis(300), orchestrator.request_generation()).await;

    assert!(attempt.is_err());
    assert!(!view.is_busy());
    assert_eq!(orchestrator.phase(), Phase::Idle);
    assert!(orchestrator.can_submit());
    assert!(orchestrator.result().is_none());
    assert!(orchestrator.platform().notices().is_empty());
}
