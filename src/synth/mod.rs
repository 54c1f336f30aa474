//! 分段合成模块：将单个文本片段转换为一次上游合成请求。
//!
//! # Segment Synthesis
//!
//! [`SegmentSynthesizer`] is the seam between orchestration and the upstream
//! provider. [`ChunkSynthesizer`] is the HTTP implementation: it renders the
//! segment as SSML ([`ssml::build_ssml`]), authenticates with the current
//! [`Session`](crate::session::Session) and retries transient failures.

mod client;
pub mod ssml;

pub use client::ChunkSynthesizer;

use crate::planner::Segment;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub const DEFAULT_OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Upstream output codec code, e.g. `audio-24khz-48kbitrate-mono-mp3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputFormat(String);

impl OutputFormat {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> &'static str {
        let code = self.0.to_ascii_lowercase();
        if code.ends_with("mp3") {
            "audio/mpeg"
        } else if code.contains("opus") {
            "audio/opus"
        } else if code.starts_with("riff") {
            "audio/wav"
        } else if code.starts_with("raw") {
            "audio/pcm"
        } else if code.starts_with("webm") {
            "audio/webm"
        } else {
            "application/octet-stream"
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_FORMAT)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns one segment into audio bytes.
#[async_trait]
pub trait SegmentSynthesizer: Send + Sync {
    async fn synthesize(&self, segment: &Segment, format: &OutputFormat) -> Result<Bytes>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_types() {
        assert_eq!(OutputFormat::default().mime_type(), "audio/mpeg");
        assert_eq!(
            OutputFormat::new("ogg-24khz-16bit-mono-opus").mime_type(),
            "audio/opus"
        );
        assert_eq!(
            OutputFormat::new("riff-24khz-16bit-mono-pcm").mime_type(),
            "audio/wav"
        );
        assert_eq!(
            OutputFormat::new("raw-16khz-16bit-mono-pcm").mime_type(),
            "audio/pcm"
        );
    }
}
