//! Input text cleaning applied before planning.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Which cleaning passes to run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CleaningOptions {
    pub remove_markdown: bool,
    pub remove_emoji: bool,
    pub remove_urls: bool,
    pub remove_line_breaks: bool,
    pub remove_citation_numbers: bool,
    /// Comma-separated literal keywords to drop.
    pub custom_keywords: String,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            remove_markdown: true,
            remove_emoji: true,
            remove_urls: true,
            remove_line_breaks: false,
            remove_citation_numbers: true,
            custom_keywords: String::new(),
        }
    }
}

impl CleaningOptions {
    /// Every pass disabled; only whitespace normalization remains.
    pub fn none() -> Self {
        Self {
            remove_markdown: false,
            remove_emoji: false,
            remove_urls: false,
            remove_line_breaks: false,
            remove_citation_numbers: false,
            custom_keywords: String::new(),
        }
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

static URL: Lazy<Regex> = Lazy::new(|| re(r"https?://\S+"));
static MD_IMAGE: Lazy<Regex> = Lazy::new(|| re(r"!\[.*?\]\(.*?\)"));
static MD_LINK: Lazy<Regex> = Lazy::new(|| re(r"\[(.*?)\]\(.*?\)"));
static MD_BOLD_STARS: Lazy<Regex> = Lazy::new(|| re(r"\*\*(.*?)\*\*"));
static MD_BOLD_UNDERSCORES: Lazy<Regex> = Lazy::new(|| re(r"__(.*?)__"));
static MD_EM_STAR: Lazy<Regex> = Lazy::new(|| re(r"\*(.*?)\*"));
static MD_EM_UNDERSCORE: Lazy<Regex> = Lazy::new(|| re(r"_(.*?)_"));
static MD_CODE: Lazy<Regex> = Lazy::new(|| re(r"`{1,3}(.*?)`{1,3}"));
static MD_HEADING: Lazy<Regex> = Lazy::new(|| re(r"#{1,6}\s"));
static EMOJI: Lazy<Regex> = Lazy::new(|| re(r"\p{Emoji_Presentation}"));
static CITATION: Lazy<Regex> = Lazy::new(|| re(r"\[\d+\]|【\d+】"));
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| re(r"\r\n|\n|\r"));
static ANY_WHITESPACE: Lazy<Regex> = Lazy::new(|| re(r"\s+"));
static INLINE_WHITESPACE: Lazy<Regex> = Lazy::new(|| re(r"[ \t]+"));

/// Strip markup and noise that should not be spoken.
pub fn clean_text(text: &str, options: &CleaningOptions) -> String {
    let mut out = text.to_string();

    if options.remove_urls {
        out = URL.replace_all(&out, "").into_owned();
    }
    if options.remove_markdown {
        out = MD_IMAGE.replace_all(&out, "").into_owned();
        out = MD_LINK.replace_all(&out, "$1").into_owned();
        out = MD_BOLD_STARS.replace_all(&out, "$1").into_owned();
        out = MD_BOLD_UNDERSCORES.replace_all(&out, "$1").into_owned();
        out = MD_EM_STAR.replace_all(&out, "$1").into_owned();
        out = MD_EM_UNDERSCORE.replace_all(&out, "$1").into_owned();
        out = MD_CODE.replace_all(&out, "$1").into_owned();
        out = MD_HEADING.replace_all(&out, "").into_owned();
    }
    let keywords: Vec<String> = options
        .custom_keywords
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if !keywords.is_empty() {
        if let Ok(pattern) = Regex::new(&keywords.join("|")) {
            out = pattern.replace_all(&out, "").into_owned();
        }
    }
    if options.remove_emoji {
        out = EMOJI.replace_all(&out, "").into_owned();
    }
    if options.remove_citation_numbers {
        out = CITATION.replace_all(&out, "").into_owned();
    }

    if options.remove_line_breaks {
        let joined = LINE_BREAK.replace_all(&out, "");
        ANY_WHITESPACE
            .replace_all(joined.trim(), " ")
            .into_owned()
    } else {
        INLINE_WHITESPACE.replace_all(out.trim(), " ").into_owned()
    }
}
