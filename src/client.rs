//! Consumer-facing facade.
//!
//! [`SpeechRelay`] wires the session manager, planner, synthesizer and stream
//! assembler together and exposes the single call the routing layer makes.

pub mod builder;
pub mod core;
pub mod request;

pub use builder::SpeechRelayBuilder;
pub use core::{SpeechOutput, SpeechRelay};
pub use request::{available_models, ModelInfo, ModelList, OpenAiSpeechRequest, SpeechRequest};
