//! SSML construction and audio bookkeeping for session-less synthesis.

use crate::error::SpeechError;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
pub const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Byte rate of `riff-24khz-16bit-mono-pcm`, used when the header is unreadable.
const DEFAULT_BYTE_RATE: u64 = 24_000 * 2;

/// 100-nanosecond ticks per second.
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Audio returned by the REST synthesis endpoint.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// RIFF/WAV bytes as returned by the provider.
    pub audio: Vec<u8>,
    /// Duration in 100-nanosecond ticks.
    pub duration_ticks: u64,
}

/// Validates synthesis input. Blank text is rejected before any network call.
pub fn validate_text(text: &str) -> Result<(), SpeechError> {
    if text.trim().is_empty() {
        return Err(SpeechError::Tts("text is required".to_string()));
    }
    if text.len() > MAX_TTS_INPUT_BYTES {
        return Err(SpeechError::Tts(format!(
            "text exceeds maximum size: {} bytes (limit: {} bytes)",
            text.len(),
            MAX_TTS_INPUT_BYTES
        )));
    }
    Ok(())
}

/// Wraps plain text in an SSML document for the given voice.
pub fn build_ssml(text: &str, voice: &str) -> String {
    let lang = voice_locale(voice);
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{}'>\
         <voice name='{}'>{}</voice></speak>",
        escape_xml(lang),
        escape_xml(voice),
        escape_xml(text)
    )
}

/// `en-US-JennyNeural` -> `en-US`.
fn voice_locale(voice: &str) -> &str {
    let mut dashes = voice.match_indices('-').map(|(i, _)| i);
    match (dashes.next(), dashes.next()) {
        (Some(_), Some(second)) => &voice[..second],
        _ => "en-US",
    }
}

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Computes the playback duration of a RIFF/WAV buffer in 100-ns ticks.
///
/// Reads the byte rate from the `fmt ` chunk and the payload size from the
/// `data` chunk. Headerless input is treated as raw 24 kHz 16-bit mono PCM.
pub fn wav_duration_ticks(wav: &[u8]) -> u64 {
    let (byte_rate, data_len) = parse_wav(wav).unwrap_or((DEFAULT_BYTE_RATE, wav.len() as u64));
    if byte_rate == 0 {
        return 0;
    }
    data_len.saturating_mul(TICKS_PER_SECOND) / byte_rate
}

fn parse_wav(wav: &[u8]) -> Option<(u64, u64)> {
    if wav.len() < 12 || &wav[0..4] != b"RIFF" || &wav[8..12] != b"WAVE" {
        return None;
    }

    let mut offset = 12;
    let mut byte_rate = None;
    while offset + 8 <= wav.len() {
        let id = &wav[offset..offset + 4];
        let size = u32::from_le_bytes(wav[offset + 4..offset + 8].try_into().ok()?) as usize;
        let body = offset + 8;
        match id {
            b"fmt " if body + 12 <= wav.len() => {
                let rate = u32::from_le_bytes(wav[body + 8..body + 12].try_into().ok()?);
                byte_rate = Some(rate as u64);
            }
            b"data" => {
                // Streaming encoders sometimes leave the size unset.
                let available = wav.len() - body;
                let len = if size == 0 || size > available {
                    available
                } else {
                    size
                };
                return Some((byte_rate.unwrap_or(DEFAULT_BYTE_RATE), len as u64));
            }
            _ => {}
        }
        offset = body.checked_add(size)?.checked_add(size % 2)?;
    }
    None
}
