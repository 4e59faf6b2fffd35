mod harness;

use std::sync::Arc;

use harness::{
    config::ConfigBuilder,
    mock_engine::MockEngine,
    server::TestServer,
    storage::{TestStorage, wav_bytes},
};
use reqwest::multipart::{Form, Part};

fn upload_form() -> Form {
    Form::new()
        .text("text", "hello")
        .text("emoControlMode", "1")
        .part("speakerAudio", Part::bytes(wav_bytes(800)).file_name("speaker.wav"))
        .part("emotionAudio", Part::bytes(wav_bytes(800)).file_name("emotion.wav"))
}

#[tokio::test]
async fn uploads_are_removed_after_success() {
    let storage = TestStorage::new().with_default_speaker();
    let engine = Arc::new(MockEngine::new());
    let config = ConfigBuilder::new(&storage).build();
    let server = TestServer::start(config, Some(Arc::clone(&engine))).await.unwrap();

    let resp = server.synthesize("/tts", upload_form()).await;
    assert_eq!(resp.status(), 200);

    assert!(storage.wait_for_cleanup().await.is_empty());
    assert!(storage.default_speaker().exists());
    assert_eq!(engine.missing_inputs(), 0);
}

#[tokio::test]
async fn uploads_are_removed_after_failure() {
    let storage = TestStorage::new().with_default_speaker();
    let engine = Arc::new(MockEngine::new().failing("vocoder crashed"));
    let config = ConfigBuilder::new(&storage).build();
    let server = TestServer::start(config, Some(engine)).await.unwrap();

    let resp = server.synthesize("/tts", upload_form()).await;
    assert_eq!(resp.status(), 500);

    assert!(storage.wait_for_cleanup().await.is_empty());
    assert!(storage.default_speaker().exists());
}

#[tokio::test]
async fn default_speaker_survives_many_requests() {
    let storage = TestStorage::new().with_default_speaker();
    let config = ConfigBuilder::new(&storage).build();
    let server = TestServer::start(config, Some(Arc::new(MockEngine::new()))).await.unwrap();

    for _ in 0..5 {
        let resp = server.synthesize("/tts", Form::new().text("text", "hello")).await;
        assert_eq!(resp.status(), 200);
    }

    assert!(storage.wait_for_cleanup().await.is_empty());
    assert_eq!(std::fs::read(storage.default_speaker()).unwrap(), wav_bytes(1_600));
}

#[tokio::test]
async fn rejected_requests_stage_nothing() {
    let storage = TestStorage::new().with_default_speaker();
    let config = ConfigBuilder::new(&storage).build();
    let server = TestServer::start(config, Some(Arc::new(MockEngine::new()))).await.unwrap();

    let form = upload_form().text("emoAlpha", "2");
    let resp = server.synthesize("/tts", form).await;
    assert_eq!(resp.status(), 400);

    assert!(storage.staged_uploads().is_empty());
}
