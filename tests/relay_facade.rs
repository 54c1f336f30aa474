//! End-to-end requests through the relay facade with a scripted synthesizer.

mod integration;

use bytes::Bytes;
use integration::fakes::{audio_for, ScriptedSynthesizer};
use speech_relay::planner::clean::CleaningOptions;
use speech_relay::{Error, MemoryStore, OpenAiSpeechRequest, SpeechRelay, SpeechRequest};
use std::sync::Arc;

fn relay(synth: Arc<ScriptedSynthesizer>) -> SpeechRelay {
    SpeechRelay::builder()
        .synthesizer(synth)
        .store(Arc::new(MemoryStore::new()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_full_buffer_request() {
    let synth = Arc::new(ScriptedSynthesizer::new());
    let relay = relay(synth.clone());

    let output = relay
        .synthesize_request(SpeechRequest::new("a".repeat(4500), "zh-CN-YunxiNeural"))
        .await
        .unwrap();
    assert!(!output.is_stream());
    let audio = output.collect().await.unwrap();
    let want: String = (0..3).map(audio_for).collect();
    assert_eq!(audio, Bytes::from(want));
    assert_eq!(synth.calls(), 3);
}

#[tokio::test]
async fn test_streaming_openai_request() {
    let synth = Arc::new(ScriptedSynthesizer::new().uniform_delay(1));
    let relay = relay(synth.clone());
    let request: OpenAiSpeechRequest = serde_json::from_str(
        r#"{"model":"tts-1","voice":"nova","input":"第一句。第二句！**第三句**？","stream":true}"#,
    )
    .unwrap();

    let segments = relay
        .plan(&request.clone().into_speech_request().unwrap())
        .unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].text, "第一句。第二句！第三句？");
    assert_eq!(segments[0].voice.voice_id, "zh-CN-YunxiNeural");

    let output = relay.synthesize_openai(request).await.unwrap();
    assert!(output.is_stream());
    assert_eq!(output.collect().await.unwrap(), Bytes::from(audio_for(0)));
}

#[tokio::test]
async fn test_text_that_cleans_to_nothing_is_rejected() {
    let relay = relay(Arc::new(ScriptedSynthesizer::new()));
    let request = SpeechRequest::new("🎉 https://example.com [1]", "v").cleaning(CleaningOptions::default());
    let err = relay.synthesize_request(request).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn test_library_uses_configured_budget() {
    let relay = relay(Arc::new(ScriptedSynthesizer::new()));
    let library = relay.library().expect("store configured");
    assert_eq!(library.quota().budget_bytes(), 1024 * 1024 * 1024);
}

#[test]
fn test_invalid_configuration_fails_build() {
    let mut config = speech_relay::RelayConfig::default();
    config.planner.first_max_len = 0;
    let result = SpeechRelay::builder().config(config).build();
    assert!(matches!(result, Err(Error::Configuration { .. })));
}
