pub const QUALITY_SUFFIX: &str =
    "((masterpiece, best quality, ultra-detailed, photorealistic, 8k, sharp focus))";

pub const NO_TEXT_SUFFIX: &str = "((no background text, no symbols, no markings, no letters anywhere, no typography, \
no signboard, no watermark, no logo, no text, no subtitles, no labels, no poster elements, neutral background))";

/// Right-trimmed user text, then the quality suffix, then the optional no-text
/// suffix, one per line.
pub fn compose_prompt(user_prompt: &str, no_text: bool) -> String {
    let stripped = user_prompt.trim_end();
    let mut composed = if stripped.is_empty() {
        QUALITY_SUFFIX.to_string()
    } else {
        format!("{stripped}\n{QUALITY_SUFFIX}")
    };
    if no_text {
        composed.push('\n');
        composed.push_str(NO_TEXT_SUFFIX);
    }
    composed
}
