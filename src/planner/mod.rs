//! 文本分块模块：把输入文本切分为可独立合成的有序片段。
//!
//! # Chunk Planning
//!
//! Two policies are offered:
//!
//! | Policy | Used by | Guarantee |
//! |--------|---------|-----------|
//! | [`split_fixed`] | full-buffer synthesis | concatenation reproduces the input exactly |
//! | [`split_sentence_aware`] | streaming synthesis | order preserving, small first chunk |
//!
//! Lengths are measured in characters, never bytes, so multi-byte scripts are
//! never cut inside a code point.
//!
//! ```rust
//! use speech_relay::planner::split_fixed;
//!
//! let text = "a".repeat(5000);
//! let lens: Vec<usize> = split_fixed(&text, 2000).iter().map(|c| c.chars().count()).collect();
//! assert_eq!(lens, vec![2000, 2000, 1000]);
//! ```

pub mod clean;

use crate::config::PlannerConfig;
use std::sync::Arc;

/// Voice and prosody settings shared by every segment of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceParams {
    pub voice_id: String,
    pub rate_percent: i32,
    pub pitch_percent: i32,
    pub style: String,
    pub role: String,
    pub style_degree: f32,
}

impl VoiceParams {
    pub fn new(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            rate_percent: 0,
            pitch_percent: 0,
            style: "general".to_string(),
            role: String::new(),
            style_degree: 1.0,
        }
    }
}

/// One unit of text scheduled for independent synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// 0-based position; output order follows it.
    pub index: usize,
    pub text: String,
    pub voice: Arc<VoiceParams>,
}

/// Splitting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPolicy {
    Fixed,
    SentenceAware,
}

/// Produces ordered [`Segment`]s with the configured limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkPlanner {
    config: PlannerConfig,
}

impl ChunkPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, text: &str, policy: SplitPolicy, voice: Arc<VoiceParams>) -> Vec<Segment> {
        let chunks = match policy {
            SplitPolicy::Fixed => split_fixed(text, self.config.fixed_max_len),
            SplitPolicy::SentenceAware => split_sentence_aware(
                text,
                self.config.sentence_max_len,
                self.config.first_max_len,
            ),
        };
        tracing::debug!(
            segments = chunks.len(),
            chars = text.chars().count(),
            ?policy,
            "text planned"
        );
        chunks
            .into_iter()
            .enumerate()
            .map(|(index, text)| Segment {
                index,
                text,
                voice: voice.clone(),
            })
            .collect()
    }
}

/// Contiguous slices of at most `max_len` characters.
///
/// Empty input yields no chunks.
pub fn split_fixed(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_len)
        .map(|c| c.iter().collect())
        .collect()
}

const SENTENCE_TERMINATORS: [char; 6] = ['。', '！', '？', '!', '?', '.'];

/// Cut after each terminator unless a digit follows (`3.14` stays whole).
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if !SENTENCE_TERMINATORS.contains(&c) {
            continue;
        }
        match iter.peek() {
            Some((next, n)) if !n.is_ascii_digit() => {
                out.push(&text[start..*next]);
                start = *next;
            }
            None => {
                out.push(&text[start..i + c.len_utf8()]);
                start = text.len();
            }
            _ => {}
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Greedy packing of trimmed sentences into chunks of at most `max_len` chars.
fn pack(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in sentences(text) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let len = sentence.chars().count();

        if current_len + len <= max_len {
            current.push_str(sentence);
            current_len += len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if len > max_len {
            chunks.extend(split_fixed(sentence, max_len));
            current_len = 0;
        } else {
            current.push_str(sentence);
            current_len = len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.is_empty() {
        vec![text.to_string()]
    } else {
        chunks
    }
}

/// Sentence-aware chunks, with the first one capped at `first_max_len` to
/// shorten time-to-first-audio. Never returns an empty list.
pub fn split_sentence_aware(text: &str, max_len: usize, first_max_len: usize) -> Vec<String> {
    let mut chunks = pack(text, max_len);
    let first_max_len = first_max_len.max(1);

    if chunks[0].chars().count() > first_max_len {
        let first = chunks.remove(0);
        let split_at = first
            .char_indices()
            .nth(first_max_len)
            .map(|(i, _)| i)
            .unwrap_or(first.len());
        let (head, tail) = first.split_at(split_at);

        let mut refined = Vec::with_capacity(chunks.len() + 2);
        refined.push(head.to_string());
        refined.extend(pack(tail, max_len));
        refined.append(&mut chunks);
        chunks = refined;
    }
    chunks
}
