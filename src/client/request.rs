//! Request types accepted by [`SpeechRelay`](super::SpeechRelay).

use crate::planner::clean::CleaningOptions;
use crate::planner::VoiceParams;
use crate::synth::OutputFormat;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_VOICE: &str = "zh-CN-XiaoxiaoNeural";
pub const DEFAULT_MODEL: &str = "tts-1";

/// OpenAI voice names and the neural voices they stand for.
pub const OPENAI_VOICE_ALIASES: [(&str, &str); 6] = [
    ("shimmer", "zh-CN-XiaoxiaoNeural"),
    ("alloy", "zh-CN-YunyangNeural"),
    ("fable", "zh-CN-YunjianNeural"),
    ("onyx", "zh-CN-XiaoyiNeural"),
    ("nova", "zh-CN-YunxiNeural"),
    ("echo", "zh-CN-liaoning-XiaobeiNeural"),
];

pub fn resolve_alias(alias: &str) -> Option<&'static str> {
    OPENAI_VOICE_ALIASES
        .iter()
        .find(|(name, _)| *name == alias)
        .map(|(_, voice)| *voice)
}

/// One synthesis call into the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: VoiceParams,
    pub output_format: OutputFormat,
    /// Live ordered stream instead of one complete payload.
    pub streaming: bool,
    /// Cleaning passes run before planning; `None` sends the text as given.
    pub cleaning: Option<CleaningOptions>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: VoiceParams::new(voice_id),
            output_format: OutputFormat::default(),
            streaming: false,
            cleaning: None,
        }
    }

    pub fn streaming(mut self, enable: bool) -> Self {
        self.streaming = enable;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn cleaning(mut self, options: CleaningOptions) -> Self {
        self.cleaning = Some(options);
        self
    }

    pub fn prosody(mut self, rate_percent: i32, pitch_percent: i32) -> Self {
        self.voice.rate_percent = rate_percent;
        self.voice.pitch_percent = pitch_percent;
        self
    }

    pub fn style(mut self, style: impl Into<String>, degree: f32) -> Self {
        self.voice.style = style.into();
        self.voice.style_degree = degree;
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.voice.role = role.into();
        self
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_one() -> f64 {
    1.0
}

fn default_style() -> String {
    "general".to_string()
}

fn default_degree() -> f32 {
    1.0
}

/// Body of an OpenAI-style `audio/speech` call.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSpeechRequest {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "default_one")]
    pub speed: f64,
    #[serde(default = "default_one")]
    pub pitch: f64,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "styleDegree", alias = "style_degree", default = "default_degree")]
    pub style_degree: f32,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub cleaning_options: CleaningOptions,
}

impl OpenAiSpeechRequest {
    /// Neural voice this request asks for.
    ///
    /// `tts-1`/`tts-1-hd` take an alias or a literal voice from `voice`;
    /// `tts-1-<alias>` names the alias in the model; any other model is a voice.
    pub fn resolve_voice(&self) -> String {
        let voice = self.voice.as_deref().filter(|v| !v.is_empty());
        let model = self.model.as_str();

        if model == "tts-1" || model == "tts-1-hd" {
            return voice
                .map(|v| resolve_alias(v).unwrap_or(v))
                .unwrap_or(DEFAULT_VOICE)
                .to_string();
        }
        if let Some(alias) = model.strip_prefix("tts-1-") {
            return resolve_alias(alias).unwrap_or(DEFAULT_VOICE).to_string();
        }
        voice
            .or(Some(model).filter(|m| !m.is_empty()))
            .unwrap_or(DEFAULT_VOICE)
            .to_string()
    }

    pub fn into_speech_request(self) -> Result<SpeechRequest> {
        let input = match self.input.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => {
                return Err(Error::validation_with_context(
                    "'input' is a required parameter and must be a non-empty string.",
                    ErrorContext::new()
                        .with_field_path("input")
                        .with_source("request"),
                ))
            }
        };
        let voice = self.resolve_voice();

        Ok(SpeechRequest::new(input, voice)
            .prosody(to_percent(self.speed), to_percent(self.pitch))
            .style(self.style, self.style_degree)
            .role(self.role)
            .cleaning(self.cleaning_options)
            .streaming(self.stream))
    }
}

/// `1.25` -> `25`, `0.5` -> `-50`.
fn to_percent(factor: f64) -> i32 {
    ((factor - 1.0) * 100.0).round() as i32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelInfo>,
}

/// Model ids accepted by [`OpenAiSpeechRequest`].
pub fn available_models() -> ModelList {
    let created = chrono::Utc::now().timestamp();
    let model = |id: String| ModelInfo {
        id,
        object: "model",
        created,
        owned_by: "openai",
    };
    let mut data = vec![model("tts-1".into()), model("tts-1-hd".into())];
    data.extend(
        OPENAI_VOICE_ALIASES
            .iter()
            .map(|(alias, _)| model(format!("tts-1-{alias}"))),
    );
    ModelList {
        object: "list",
        data,
    }
}
