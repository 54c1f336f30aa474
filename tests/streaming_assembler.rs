//! Ordered streaming and full-buffer assembly over scripted synthesizers.

mod integration;

use futures::StreamExt;
use integration::fakes::{audio_for, segments, with_id3, RecordingSink, ScriptedSynthesizer};
use speech_relay::config::StreamConfig;
use speech_relay::planner::{split_fixed, ChunkPlanner, SplitPolicy, VoiceParams};
use speech_relay::stream::StreamAssembler;
use speech_relay::synth::OutputFormat;
use speech_relay::Error;
use std::sync::Arc;
use std::time::Duration;

fn assembler(synth: Arc<ScriptedSynthesizer>, sync_segments: usize, concurrency: usize) -> StreamAssembler {
    StreamAssembler::new(
        synth,
        StreamConfig {
            sync_segments,
            concurrency,
            channel_capacity: 2,
        },
    )
}

fn expected(indices: &[usize]) -> Vec<u8> {
    indices.iter().flat_map(|i| audio_for(*i).into_bytes()).collect()
}

#[tokio::test]
async fn test_output_order_ignores_completion_order() {
    // later segments finish first
    let delays = vec![5, 80, 60, 40, 20, 5, 1, 30];
    let synth = Arc::new(ScriptedSynthesizer::new().delays(delays));
    let (sink, log) = RecordingSink::new();

    let report = assembler(synth.clone(), 1, 3)
        .stream_into(segments(8), &OutputFormat::default(), sink)
        .await
        .unwrap();

    assert_eq!(report.written, (0..8).collect::<Vec<_>>());
    assert!(report.skipped.is_empty());
    let log = log.lock().unwrap();
    assert_eq!(log.joined(), expected(&[0, 1, 2, 3, 4, 5, 6, 7]));
    assert!(log.closed);
    assert!(log.aborted.is_none());
    assert_eq!(log.ready_calls, 8);
    assert!(synth.max_active() <= 3);
}

#[tokio::test]
async fn test_order_holds_across_settings() {
    for (count, sync, concurrency) in [(1, 1, 2), (3, 0, 1), (6, 2, 2), (10, 1, 4), (5, 9, 2)] {
        let delays = (0..count as u64).map(|i| (count as u64 - i) * 7 % 23).collect();
        let synth = Arc::new(ScriptedSynthesizer::new().delays(delays));
        let (sink, log) = RecordingSink::new();
        assembler(synth, sync, concurrency)
            .stream_into(segments(count), &OutputFormat::default(), sink)
            .await
            .unwrap();
        let all: Vec<usize> = (0..count).collect();
        assert_eq!(
            log.lock().unwrap().joined(),
            expected(&all),
            "count={count} sync={sync} concurrency={concurrency}"
        );
    }
}

#[tokio::test]
async fn test_failed_segment_is_skipped() {
    let synth = Arc::new(
        ScriptedSynthesizer::new()
            .delays(vec![1, 30, 5, 10, 1])
            .failing(&[2]),
    );
    let (sink, log) = RecordingSink::new();

    let report = assembler(synth, 1, 2)
        .stream_into(segments(5), &OutputFormat::default(), sink)
        .await
        .unwrap();

    assert_eq!(report.written, vec![0, 1, 3, 4]);
    assert_eq!(report.skipped, vec![2]);
    let log = log.lock().unwrap();
    assert_eq!(log.joined(), expected(&[0, 1, 3, 4]));
    assert!(log.closed);
    assert!(log.aborted.is_none());
}

#[tokio::test]
async fn test_consumer_sees_no_error_for_skipped_segment() {
    let synth = Arc::new(ScriptedSynthesizer::new().uniform_delay(2).failing(&[2]));
    let mut stream = assembler(synth, 1, 2).stream(segments(5), OutputFormat::default());

    let mut received = Vec::new();
    while let Some(item) = stream.next().await {
        received.extend_from_slice(&item.expect("no error item"));
    }
    assert_eq!(received, expected(&[0, 1, 3, 4]));
}

#[tokio::test]
async fn test_container_header_kept_only_on_first_segment() {
    let synth = Arc::new(ScriptedSynthesizer::new().uniform_delay(1).tagged(16));
    let (sink, log) = RecordingSink::new();

    assembler(synth, 1, 2)
        .stream_into(segments(3), &OutputFormat::default(), sink)
        .await
        .unwrap();

    let mut want = with_id3(16, audio_for(0).as_bytes());
    want.extend(expected(&[1, 2]));
    assert_eq!(log.lock().unwrap().joined(), want);
}

#[tokio::test]
async fn test_first_segment_failure_in_sync_phase_aborts() {
    let synth = Arc::new(ScriptedSynthesizer::new().failing(&[0]));
    let (sink, log) = RecordingSink::new();

    let err = assembler(synth.clone(), 1, 2)
        .stream_into(segments(4), &OutputFormat::default(), sink)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Remote { status: 400, .. }));
    let log = log.lock().unwrap();
    assert!(log.chunks.is_empty());
    assert!(log.aborted.is_some());
    assert!(!log.closed);
    assert_eq!(synth.calls(), 1);
}

#[tokio::test]
async fn test_sink_failure_stops_scheduling() {
    let synth = Arc::new(ScriptedSynthesizer::new().uniform_delay(20));
    let (sink, log) = RecordingSink::failing_on_write(2);

    let err = assembler(synth.clone(), 1, 2)
        .stream_into(segments(20), &OutputFormat::default(), sink)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SinkClosed));
    assert!(log.lock().unwrap().aborted.is_some());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(synth.calls() < 20, "calls = {}", synth.calls());
}

#[tokio::test]
async fn test_dropped_consumer_stops_background_stream() {
    let synth = Arc::new(ScriptedSynthesizer::new().uniform_delay(50));
    let mut stream = StreamAssembler::new(
        synth.clone(),
        StreamConfig {
            sync_segments: 1,
            concurrency: 2,
            channel_capacity: 1,
        },
    )
    .stream(segments(20), OutputFormat::default());

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(&first[..], audio_for(0).as_bytes());
    drop(stream);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let calls = synth.calls();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(synth.calls(), calls, "scheduling continued after disconnect");
    assert!(calls < 20);
}

#[tokio::test]
async fn test_full_buffer_matches_unchunked_output() {
    let text = "x".repeat(5000);
    let planner = ChunkPlanner::default();
    let voice = Arc::new(VoiceParams::new("zh-CN-XiaoxiaoNeural"));
    let planned = planner.plan(&text, SplitPolicy::Fixed, voice);
    let lens: Vec<usize> = planned.iter().map(|s| s.text.chars().count()).collect();
    assert_eq!(lens, vec![2000, 2000, 1000]);
    assert_eq!(split_fixed(&text, 2000).concat(), text);

    let synth = Arc::new(ScriptedSynthesizer::new().delays(vec![30, 1, 10]));
    let audio = assembler(synth.clone(), 1, 2)
        .assemble_full(&planned, &OutputFormat::default())
        .await
        .unwrap();
    assert_eq!(&audio[..], &expected(&[0, 1, 2])[..]);
    assert_eq!(synth.max_active(), 1);
}

#[tokio::test]
async fn test_full_buffer_failure_yields_no_output() {
    let synth = Arc::new(ScriptedSynthesizer::new().failing(&[1]));
    let err = assembler(synth.clone(), 1, 2)
        .assemble_full(&segments(3), &OutputFormat::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote { .. }));
    assert_eq!(synth.calls(), 2);
}
