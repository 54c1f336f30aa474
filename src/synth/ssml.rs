//! SSML rendering for one segment.

use crate::planner::VoiceParams;

/// Escape the characters that would break the surrounding markup.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Attribute values additionally need quotes escaped.
fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Render `text` with prosody, optional style/role and the voice envelope.
pub fn build_ssml(text: &str, voice: &VoiceParams) -> String {
    let mut content = format!(
        r#"<prosody rate="{}%" pitch="{}%">{}</prosody>"#,
        voice.rate_percent,
        voice.pitch_percent,
        escape_text(text)
    );

    if !voice.style.is_empty() && voice.style != "general" {
        let degree = if (voice.style_degree - 1.0).abs() > f32::EPSILON {
            format!(r#" styledegree="{}""#, voice.style_degree)
        } else {
            String::new()
        };
        content = format!(
            r#"<mstts:express-as style="{}"{}>{}</mstts:express-as>"#,
            escape_attr(&voice.style),
            degree,
            content
        );
    }

    if !voice.role.is_empty() {
        content = format!(
            r#"<mstts:express-as role="{}">{}</mstts:express-as>"#,
            escape_attr(&voice.role),
            content
        );
    }

    format!(
        r#"<speak xmlns="http://www.w3.org/2001/10/synthesis" xmlns:mstts="http://www.w3.org/2001/mstts" version="1.0" xml:lang="zh-CN"><voice name="{}">{}</voice></speak>"#,
        escape_attr(&voice.voice_id),
        content
    )
}
