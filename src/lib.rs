//! # speech-relay
//!
//! 文本转语音中继核心：上游会话续期、分块有序流式合成与按字节配额的存储淘汰。
//!
//! Text-to-speech relay core. It fronts a third-party neural TTS provider and
//! adds credential management, chunked and streamed audio delivery, and a
//! byte-budgeted storage layer.
//!
//! ## Overview
//!
//! - **Sessions**: short-lived upstream tokens are discovered with a signed
//!   request, cached, and renewed single-flight shortly before expiry.
//! - **Planning**: input text is cleaned and split either into fixed-width
//!   slices (full-buffer mode) or sentence-aware chunks with a small first
//!   chunk (streaming mode).
//! - **Synthesis**: each segment becomes one SSML request with bounded retry on
//!   transient upstream failures.
//! - **Streaming**: segments after the first are synthesized concurrently and
//!   written strictly in order, with backpressure and duplicate container
//!   header removal.
//! - **Storage**: stored audio is bounded by a byte budget with oldest-first
//!   eviction.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use speech_relay::{SpeechRelay, SpeechRequest};
//!
//! #[tokio::main]
//! async fn main() -> speech_relay::Result<()> {
//!     let relay = SpeechRelay::builder().from_env().build()?;
//!
//!     let request = SpeechRequest::new("你好，世界。", "zh-CN-XiaoxiaoNeural").streaming(true);
//!     let audio = relay.synthesize_request(request).await?.collect().await?;
//!     println!("{} bytes", audio.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | Upstream token discovery, signing and renewal |
//! | [`planner`] | Text cleaning and chunk planning |
//! | [`synth`] | SSML rendering and per-segment synthesis with retry |
//! | [`stream`] | Full-buffer and ordered concurrent streaming assembly |
//! | [`storage`] | Key-value port, quota eviction and audio library |
//! | [`client`] | [`SpeechRelay`] facade and request types |
//! | [`config`] | YAML and environment configuration |
//! | [`resilience`] | Retry backoff policy |

pub mod client;
pub mod config;
pub mod planner;
pub mod resilience;
pub mod session;
pub mod storage;
pub mod stream;
pub mod synth;
pub mod transport;

pub use client::{OpenAiSpeechRequest, SpeechOutput, SpeechRelay, SpeechRelayBuilder, SpeechRequest};
pub use config::RelayConfig;
pub use planner::{ChunkPlanner, Segment, SplitPolicy, VoiceParams};
pub use session::{Session, SessionManager};
pub use storage::{AudioLibrary, KvStore, MemoryStore, QuotaManager};
pub use stream::{AudioSink, StreamAssembler, StreamReport};
pub use synth::{ChunkSynthesizer, OutputFormat, SegmentSynthesizer};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
