//! Byte-level content validation for downloaded audio
//!
//! Decides whether a response body is real audio, an HTML/error page, or
//! something too small to be useful. Pure functions of the input bytes.

use serde::Serialize;

/// Payloads shorter than this are never accepted
pub const MIN_AUDIO_BYTES: usize = 100;

/// Header-less payloads strictly larger than this are provisionally accepted
///
/// This is a weak heuristic: real codecs without a recognised magic sequence
/// (e.g. raw AAC) pass, but so would any other large binary.
pub const HEURISTIC_AUDIO_BYTES: usize = 10 * 1024;

/// Number of leading bytes scanned for markup
const MARKUP_SCAN_BYTES: usize = 200;

const MARKUP_NEEDLES: [&str; 3] = ["<!doctype", "<html", "error"];

/// Classification of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    /// Recognised MP3/WAV header, or large enough to be plausibly real
    RealAudio,
    /// HTML document or error text
    Markup,
    /// Under [`MIN_AUDIO_BYTES`]
    TooSmall,
    /// No header match, no markup, and not large enough for the size heuristic
    Unknown,
}

impl ContentClass {
    pub fn is_real_audio(&self) -> bool {
        matches!(self, ContentClass::RealAudio)
    }
}

/// Classify a payload
///
/// **Algorithm:**
/// 1. Under 100 bytes → `TooSmall` (regardless of header)
/// 2. MP3 (`ID3` tag or MPEG frame sync) or RIFF/WAVE header → `RealAudio`
/// 3. Markup needle in the first 200 bytes → `Markup`
/// 4. Larger than 10 KB → `RealAudio` (weak heuristic)
/// 5. Otherwise → `Unknown`
///
/// Markup is checked after the header so that binary audio whose first bytes
/// happen to decode as "error" is still accepted, and before the size
/// heuristic so a large HTML page is never accepted.
pub fn classify(bytes: &[u8]) -> ContentClass {
    if bytes.len() < MIN_AUDIO_BYTES {
        return ContentClass::TooSmall;
    }

    if has_audio_header(bytes) {
        return ContentClass::RealAudio;
    }

    if looks_like_markup(bytes) {
        return ContentClass::Markup;
    }

    if bytes.len() > HEURISTIC_AUDIO_BYTES {
        return ContentClass::RealAudio;
    }

    ContentClass::Unknown
}

/// MP3 (ID3 or frame sync) or WAV magic bytes
pub fn has_audio_header(bytes: &[u8]) -> bool {
    is_mp3(bytes) || is_wav(bytes)
}

fn is_mp3(bytes: &[u8]) -> bool {
    match bytes {
        [b'I', b'D', b'3', ..] => true,
        // MPEG frame sync: 11 set bits
        [0xFF, second, ..] => second & 0xE0 == 0xE0,
        _ => false,
    }
}

fn is_wav(bytes: &[u8]) -> bool {
    matches!(
        bytes,
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..]
    )
}

fn looks_like_markup(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(MARKUP_SCAN_BYTES)];
    let text = String::from_utf8_lossy(head).to_lowercase();
    MARKUP_NEEDLES.iter().any(|needle| text.contains(needle))
}

/// Best-effort content type sniffed from the payload itself
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.len() < 4 {
        return "unknown";
    }
    if is_mp3(bytes) {
        return "audio/mpeg";
    }
    if is_wav(bytes) {
        return "audio/wav";
    }

    let head = &bytes[..bytes.len().min(100)];
    let text = String::from_utf8_lossy(head).to_lowercase();
    if text.contains("<!doctype") || text.contains("<html") {
        return "text/html";
    }

    "unknown"
}

/// Space-separated upper-case hex of the first `n` bytes
pub fn hex_preview(bytes: &[u8], n: usize) -> String {
    bytes
        .iter()
        .take(n)
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
