#![allow(dead_code)]

use async_trait::async_trait;
use avatar_stylizer::{
    CandidateFile, CountdownMode, Notice, Orchestrator, Platform, SharePayload, StylizerClient,
    StylizerError,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A platform that records every capability invocation.
#[derive(Default)]
pub struct RecordingPlatform {
    pub share_supported: bool,
    saves: Mutex<Vec<(String, String)>>,
    shares: Mutex<Vec<SharePayload>>,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            share_supported: true,
            ..Default::default()
        }
    }

    pub fn without_share() -> Self {
        Self::default()
    }

    pub fn saves(&self) -> Vec<(String, String)> {
        self.saves.lock().unwrap().clone()
    }

    pub fn shares(&self) -> Vec<SharePayload> {
        self.shares.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn save_as(&self, image_url: &str, file_name: &str) -> Result<PathBuf, StylizerError> {
        self.saves
            .lock()
            .unwrap()
            .push((image_url.to_string(), file_name.to_string()));
        Ok(PathBuf::from(file_name))
    }

    async fn share(&self, payload: &SharePayload) -> Result<(), StylizerError> {
        if !self.share_supported {
            return Err(StylizerError::ShareUnsupported);
        }
        self.shares.lock().unwrap().push(payload.clone());
        Ok(())
    }

    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

pub fn png(size: usize) -> CandidateFile {
    CandidateFile::from_bytes("avatar.png", "image/png", vec![0u8; size])
}

/// An orchestrator against `server` whose countdown only moves on explicit ticks.
pub fn manual_orchestrator(server: &MockServer) -> Orchestrator<RecordingPlatform> {
    manual_orchestrator_with(server, RecordingPlatform::new())
}

pub fn manual_orchestrator_with(
    server: &MockServer,
    platform: RecordingPlatform,
) -> Orchestrator<RecordingPlatform> {
    let client = StylizerClient::new_with_url(&server.uri()).unwrap();
    Orchestrator::new(client, platform).with_countdown_mode(CountdownMode::Manual)
}

pub async fn mount_status(server: &MockServer, can_request: bool, wait_time: u64) {
    Mock::given(method("GET"))
        .and(path("/rate-limit-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "can_request": can_request,
            "wait_time": wait_time
        })))
        .mount(server)
        .await;
}

pub async fn mount_generate_success(server: &MockServer, image_url: &str) {
    Mock::given(method("POST"))
        .and(path("/generate-avatar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_url": image_url
        })))
        .mount(server)
        .await;
}
