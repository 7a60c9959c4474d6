// Strip Anki field markup down to plain text

use regex::Regex;
use std::sync::LazyLock;

static SOUND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\[sound:[^\]]*\]").expect("valid regex"));
static IMG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<img[^>]*>").expect("valid regex"));
static BLOCK_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(br|div|p|li|ul|ol|h[1-6]|tr|td)\b[^>]*>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Reduce a field value to plain text
///
/// Removes `[sound:...]` references and images, turns block-level tags into
/// spaces, drops every other tag, decodes HTML entities, then collapses
/// whitespace. Entities are decoded after tags are removed, so an escaped
/// `&lt;b&gt;` survives as the literal text `<b>`.
pub fn clean_field(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = SOUND_RE.replace_all(text, "");
    let text = IMG_RE.replace_all(&text, "");
    let text = BLOCK_TAG_RE.replace_all(&text, " ");
    let text = TAG_RE.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);
    WS_RE.replace_all(&text, " ").trim().to_string()
}
