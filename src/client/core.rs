use super::request::{OpenAiSpeechRequest, SpeechRequest};
use crate::planner::clean::clean_text;
use crate::planner::{ChunkPlanner, Segment, SplitPolicy, VoiceParams};
use crate::session::SessionManager;
use crate::storage::AudioLibrary;
use crate::stream::StreamAssembler;
use crate::{BoxStream, Error, ErrorContext, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::sync::Arc;
use tracing::info;

/// Result of [`SpeechRelay::synthesize_request`].
pub enum SpeechOutput {
    /// Whole payload; produced only when every segment succeeded.
    Complete(Bytes),
    /// Live ordered audio; failed segments are skipped.
    Stream(BoxStream<'static, Bytes>),
}

impl SpeechOutput {
    pub fn is_stream(&self) -> bool {
        matches!(self, SpeechOutput::Stream(_))
    }

    /// Drain into one buffer. A streamed abort surfaces as the stream's error item.
    pub async fn collect(self) -> Result<Bytes> {
        match self {
            SpeechOutput::Complete(bytes) => Ok(bytes),
            SpeechOutput::Stream(mut stream) => {
                let mut out = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    out.extend_from_slice(&chunk?);
                }
                Ok(out.freeze())
            }
        }
    }
}

impl std::fmt::Debug for SpeechOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeechOutput::Complete(bytes) => f.debug_tuple("Complete").field(&bytes.len()).finish(),
            SpeechOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Entry point for the routing layer: text in, audio out.
pub struct SpeechRelay {
    pub(crate) sessions: Arc<SessionManager>,
    pub(crate) planner: ChunkPlanner,
    pub(crate) assembler: StreamAssembler,
    pub(crate) library: Option<Arc<AudioLibrary>>,
}

impl SpeechRelay {
    pub fn builder() -> super::SpeechRelayBuilder {
        super::SpeechRelayBuilder::new()
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn planner(&self) -> &ChunkPlanner {
        &self.planner
    }

    /// Storage for generated audio, when a store was configured.
    pub fn library(&self) -> Option<&Arc<AudioLibrary>> {
        self.library.as_ref()
    }

    /// Cleaned text and its segments, exactly as a request would synthesize them.
    pub fn plan(&self, request: &SpeechRequest) -> Result<Vec<Segment>> {
        let text = match &request.cleaning {
            Some(options) => clean_text(&request.text, options),
            None => request.text.clone(),
        };
        if text.trim().is_empty() {
            return Err(Error::validation_with_context(
                "input has no speakable text",
                ErrorContext::new()
                    .with_field_path("input")
                    .with_source("relay"),
            ));
        }
        let policy = if request.streaming {
            SplitPolicy::SentenceAware
        } else {
            SplitPolicy::Fixed
        };
        let voice: Arc<VoiceParams> = Arc::new(request.voice.clone());
        Ok(self.planner.plan(&text, policy, voice))
    }

    pub async fn synthesize_request(&self, request: SpeechRequest) -> Result<SpeechOutput> {
        let segments = self.plan(&request)?;
        info!(
            voice = %request.voice.voice_id,
            segments = segments.len(),
            streaming = request.streaming,
            format = %request.output_format,
            "speech request accepted"
        );

        if request.streaming {
            let stream = self.assembler.stream(segments, request.output_format);
            return Ok(SpeechOutput::Stream(stream));
        }
        let bytes = self
            .assembler
            .assemble_full(&segments, &request.output_format)
            .await?;
        Ok(SpeechOutput::Complete(bytes))
    }

    pub async fn synthesize_openai(&self, request: OpenAiSpeechRequest) -> Result<SpeechOutput> {
        self.synthesize_request(request.into_speech_request()?).await
    }
}
