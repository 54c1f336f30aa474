//! Scripted synthesizer and recording sink

use async_trait::async_trait;
use bytes::Bytes;
use speech_relay::planner::{Segment, VoiceParams};
use speech_relay::stream::AudioSink;
use speech_relay::synth::{OutputFormat, SegmentSynthesizer};
use speech_relay::{Error, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn segments(count: usize) -> Vec<Segment> {
    let voice = Arc::new(VoiceParams::new("zh-CN-XiaoxiaoNeural"));
    (0..count)
        .map(|index| Segment {
            index,
            text: format!("segment {index}."),
            voice: voice.clone(),
        })
        .collect()
}

/// Payload a [`ScriptedSynthesizer`] returns for `index`, before tagging.
pub fn audio_for(index: usize) -> String {
    format!("seg{index};")
}

/// ID3v2 tag of `size` bytes followed by `payload`.
pub fn with_id3(size: usize, payload: &[u8]) -> Vec<u8> {
    let mut out = b"ID3\x04\x00\x00".to_vec();
    out.extend_from_slice(&[
        ((size >> 21) & 0x7f) as u8,
        ((size >> 14) & 0x7f) as u8,
        ((size >> 7) & 0x7f) as u8,
        (size & 0x7f) as u8,
    ]);
    out.extend(std::iter::repeat(b'#').take(size));
    out.extend_from_slice(payload);
    out
}

/// Synthesizer with per-index latency and failures.
#[derive(Default)]
pub struct ScriptedSynthesizer {
    delays_ms: Vec<u64>,
    default_delay_ms: u64,
    failing: HashSet<usize>,
    id3_size: Option<usize>,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(mut self, delays_ms: Vec<u64>) -> Self {
        self.delays_ms = delays_ms;
        self
    }

    pub fn uniform_delay(mut self, delay_ms: u64) -> Self {
        self.default_delay_ms = delay_ms;
        self
    }

    pub fn failing(mut self, indices: &[usize]) -> Self {
        self.failing = indices.iter().copied().collect();
        self
    }

    pub fn tagged(mut self, id3_size: usize) -> Self {
        self.id3_size = Some(id3_size);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegmentSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, segment: &Segment, _format: &OutputFormat) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let delay = self
            .delays_ms
            .get(segment.index)
            .copied()
            .unwrap_or(self.default_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&segment.index) {
            return Err(Error::remote(400, format!("voice rejected segment {}", segment.index)));
        }
        let payload = audio_for(segment.index).into_bytes();
        Ok(match self.id3_size {
            Some(size) => Bytes::from(with_id3(size, &payload)),
            None => Bytes::from(payload),
        })
    }
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub chunks: Vec<Bytes>,
    pub ready_calls: usize,
    pub closed: bool,
    pub aborted: Option<String>,
}

impl SinkLog {
    pub fn joined(&self) -> Vec<u8> {
        self.chunks.iter().flat_map(|c| c.iter().copied()).collect()
    }
}

/// Sink that records everything and can fail from the `fail_on_write`-th write (1-based).
pub struct RecordingSink {
    pub log: Arc<Mutex<SinkLog>>,
    fail_on_write: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> (Self, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        (
            Self {
                log: log.clone(),
                fail_on_write: None,
            },
            log,
        )
    }

    pub fn failing_on_write(n: usize) -> (Self, Arc<Mutex<SinkLog>>) {
        let (mut sink, log) = Self::new();
        sink.fail_on_write = Some(n);
        (sink, log)
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn ready(&mut self) -> Result<()> {
        self.log.lock().unwrap().ready_calls += 1;
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if self.fail_on_write == Some(log.chunks.len() + 1) {
            return Err(Error::SinkClosed);
        }
        log.chunks.push(chunk);
        Ok(())
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed = true;
    }

    async fn abort(&mut self, error: &Error) {
        self.log.lock().unwrap().aborted = Some(error.to_string());
    }
}
