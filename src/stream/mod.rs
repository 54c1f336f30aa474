//! 音频流组装模块：按顺序拼接或并发流式输出各片段的合成结果。
//!
//! # Stream Assembly
//!
//! [`StreamAssembler`] drives a [`SegmentSynthesizer`] over planned segments
//! in one of two modes:
//!
//! - **Full buffer** ([`StreamAssembler::assemble_full`]): strictly sequential,
//!   any failure fails the whole request, no partial output.
//! - **Ordered streaming** ([`StreamAssembler::stream`] /
//!   [`StreamAssembler::stream_into`]):
//!   1. the first `sync_segments` segments are synthesized and written in order;
//!   2. the rest run with at most `concurrency` calls outstanding, each settling
//!      its own [`ChunkSlot`];
//!   3. an ordered writer walks the slots by index, writing ready bytes and
//!      skipping failed ones, so output order never depends on completion order.
//!
//! Every write waits for sink readiness. All segments after the first written
//! one have their leading container header removed. A failed sink write stops
//! scheduling and drops in-flight synthesis.

mod header;
pub mod sink;
mod slots;

pub use header::{declared_header_len, strip_container_header};
pub use sink::{channel, AudioSink, ChannelSink};
pub use slots::{ChunkSlot, ResultSlots};

use crate::config::StreamConfig;
use crate::planner::Segment;
use crate::synth::{OutputFormat, SegmentSynthesizer};
use crate::{BoxStream, Error, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What reached the sink during one streaming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamReport {
    /// Segment indices written, in output order.
    pub written: Vec<usize>,
    /// Segment indices skipped because synthesis failed or produced no audio.
    pub skipped: Vec<usize>,
    pub bytes: u64,
}

#[derive(Clone)]
pub struct StreamAssembler {
    synthesizer: Arc<dyn SegmentSynthesizer>,
    config: StreamConfig,
}

impl StreamAssembler {
    pub fn new(synthesizer: Arc<dyn SegmentSynthesizer>, config: StreamConfig) -> Self {
        Self {
            synthesizer,
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Synthesize every segment in order and concatenate the bytes.
    pub async fn assemble_full(&self, segments: &[Segment], format: &OutputFormat) -> Result<Bytes> {
        if let [only] = segments {
            return self.synthesizer.synthesize(only, format).await;
        }
        let mut out = BytesMut::new();
        for segment in segments {
            let bytes = self.synthesizer.synthesize(segment, format).await?;
            debug!(index = segment.index, bytes = bytes.len(), "segment buffered");
            out.extend_from_slice(&bytes);
        }
        Ok(out.freeze())
    }

    /// Start ordered streaming on a background task and return the consumer side.
    pub fn stream(&self, segments: Vec<Segment>, format: OutputFormat) -> BoxStream<'static, Bytes> {
        let (sink, stream) = channel(self.config.channel_capacity);
        let assembler = self.clone();
        tokio::spawn(async move {
            // Outcome is already logged and forwarded through the sink.
            let _ = assembler.stream_into(segments, &format, sink).await;
        });
        stream
    }

    /// Ordered streaming into `sink`. The sink is closed on success and
    /// aborted on failure.
    pub async fn stream_into<K: AudioSink>(
        &self,
        segments: Vec<Segment>,
        format: &OutputFormat,
        mut sink: K,
    ) -> Result<StreamReport> {
        let total = segments.len();
        let result = self.drive(&segments, format, &mut sink).await;
        match &result {
            Ok(report) => {
                info!(
                    segments = total,
                    written = report.written.len(),
                    skipped = report.skipped.len(),
                    bytes = report.bytes,
                    "audio stream complete"
                );
                sink.close().await;
            }
            Err(e) => {
                warn!(segments = total, error = %e, "audio stream aborted");
                sink.abort(e).await;
            }
        }
        result
    }

    async fn drive<K: AudioSink>(
        &self,
        segments: &[Segment],
        format: &OutputFormat,
        sink: &mut K,
    ) -> Result<StreamReport> {
        let mut writer = OrderedWriter::new(sink);
        let sync = self.config.sync_segments.min(segments.len());

        for segment in &segments[..sync] {
            let bytes = self.synthesizer.synthesize(segment, format).await?;
            writer.emit(segment.index, bytes).await?;
        }

        let pending = &segments[sync..];
        if pending.is_empty() {
            return Ok(writer.report);
        }

        let slots = ResultSlots::new(pending.len());
        {
            let scheduler = futures::stream::iter(pending.iter().enumerate()).for_each_concurrent(
                self.config.concurrency.max(1),
                |(slot, segment)| {
                    let slots = &slots;
                    async move {
                        let outcome = match self.synthesizer.synthesize(segment, format).await {
                            Ok(bytes) => ChunkSlot::Ready(bytes),
                            Err(e) => {
                                warn!(index = segment.index, error = %e, "segment synthesis failed");
                                ChunkSlot::Failed(e.to_string())
                            }
                        };
                        slots.fill(slot, outcome);
                    }
                },
            );

            let ordered = async {
                for (cursor, segment) in pending.iter().enumerate() {
                    match slots.wait(cursor).await {
                        ChunkSlot::Ready(bytes) => writer.emit(segment.index, bytes).await?,
                        ChunkSlot::Failed(reason) => {
                            warn!(index = segment.index, %reason, "skipping failed segment");
                            writer.report.skipped.push(segment.index);
                        }
                        ChunkSlot::Pending => {
                            return Err(Error::runtime(format!(
                                "slot {} woke while still pending",
                                segment.index
                            )))
                        }
                    }
                }
                Ok::<(), Error>(())
            };

            tokio::pin!(scheduler);
            tokio::pin!(ordered);
            tokio::select! {
                // A writer failure drops the scheduler and its in-flight calls.
                result = &mut ordered => result?,
                _ = &mut scheduler => ordered.await?,
            }
        }

        Ok(writer.report)
    }
}

struct OrderedWriter<'a, K: AudioSink> {
    sink: &'a mut K,
    header_written: bool,
    report: StreamReport,
}

impl<'a, K: AudioSink> OrderedWriter<'a, K> {
    fn new(sink: &'a mut K) -> Self {
        Self {
            sink,
            header_written: false,
            report: StreamReport::default(),
        }
    }

    async fn emit(&mut self, index: usize, bytes: Bytes) -> Result<()> {
        let bytes = if self.header_written {
            strip_container_header(bytes)
        } else {
            bytes
        };
        if bytes.is_empty() {
            warn!(index, "segment produced no audio, skipping");
            self.report.skipped.push(index);
            return Ok(());
        }

        let len = bytes.len();
        self.sink.ready().await?;
        self.sink.write(bytes).await?;
        self.header_written = true;
        self.report.written.push(index);
        self.report.bytes += len as u64;
        debug!(index, bytes = len, "segment written");
        Ok(())
    }
}
