//! Deterministic PCM WAVE synthesis
//!
//! Produces the placeholder audio used when a track's real audio cannot be
//! obtained. Output is a canonical 44-byte RIFF/WAVE header followed by
//! little-endian PCM samples. Identical specs always yield identical bytes.

use sha2::{Digest, Sha256};
use std::f64::consts::PI;
use thiserror::Error;
use tracing::warn;

/// Note frequencies (Hz) of a C-major scale, C4 to C5
pub const MAJOR_SCALE: [f64; 8] = [262.0, 294.0, 330.0, 349.0, 392.0, 440.0, 494.0, 523.0];

/// E-minor triad used when a melody cannot be produced
pub const E_MINOR_CHORD: [f64; 3] = [330.0, 392.0, 494.0];

/// Number of notes in a text-derived melody
pub const MELODY_LENGTH: usize = 8;

pub const WAV_HEADER_LEN: usize = 44;

const TONE_AMPLITUDE: f64 = 0.3;
const MELODY_AMPLITUDE: f64 = 0.2;
const NOTES_PER_SECOND: u32 = 2;
const SECOND_HARMONIC: f64 = 0.3;
const THIRD_HARMONIC: f64 = 0.1;

const DEFAULT_SAMPLE_RATE: u32 = 44_100;
const LAST_RESORT_SAMPLE_RATE: u32 = 22_050;
const LAST_RESORT_FREQUENCY: f64 = 330.0;

/// Longest clip ever synthesized
pub const MAX_DURATION_SECONDS: u32 = 60 * 60;

/// Largest data chunk that still fits the 32-bit RIFF size field
const MAX_DATA_LEN: u64 = u32::MAX as u64 - 36;

/// Synthesis errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("Invalid synthesis spec: {0}")]
    InvalidSpec(String),

    #[error("Audio data of {0} bytes exceeds the WAV size limit")]
    TooLarge(u64),
}

/// Waveform shape
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    Silence,
    /// Single sine at the given frequency (Hz)
    Tone(f64),
    /// Mean of several sines
    MultiTone(Vec<f64>),
    /// Note sequence played at 2 notes per second, cycling
    Melody(Vec<f64>),
}

impl Waveform {
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Silence => "silence",
            Waveform::Tone(_) => "tone",
            Waveform::MultiTone(_) => "multi_tone",
            Waveform::Melody(_) => "melody",
        }
    }
}

/// Parameters of a synthesized clip
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisSpec {
    pub duration_seconds: u32,
    pub sample_rate_hz: u32,
    /// 8 or 16
    pub bits_per_sample: u16,
    /// 1 or 2
    pub channels: u16,
    pub waveform: Waveform,
}

impl SynthesisSpec {
    /// 44.1 kHz, 16-bit stereo clip
    pub fn stereo(duration_seconds: u32, waveform: Waveform) -> Self {
        Self {
            duration_seconds,
            sample_rate_hz: DEFAULT_SAMPLE_RATE,
            bits_per_sample: 16,
            channels: 2,
            waveform,
        }
    }

    /// Per-track fallback: a melody derived from the track's title and artist
    pub fn track_melody(duration_seconds: u32, title: &str, artist: &str) -> Self {
        Self::stereo(duration_seconds, Waveform::Melody(melody_from_text(title, artist)))
    }

    /// Shared fallback served when nothing track-specific is available
    pub fn generic_tone(duration_seconds: u32) -> Self {
        Self::stereo(duration_seconds, Waveform::Tone(440.0))
    }

    fn bytes_per_sample(&self) -> u64 {
        u64::from(self.bits_per_sample / 8)
    }

    /// Size of the PCM data chunk: `d * r * c * b / 8`
    pub fn data_len(&self) -> u64 {
        u64::from(self.duration_seconds)
            * u64::from(self.sample_rate_hz)
            * u64::from(self.channels)
            * self.bytes_per_sample()
    }

    /// Check parameter ranges and the RIFF size limit
    pub fn validate(&self) -> Result<(), SynthesisError> {
        if self.duration_seconds == 0 {
            return Err(SynthesisError::InvalidSpec("duration must be positive".into()));
        }
        if self.duration_seconds > MAX_DURATION_SECONDS {
            return Err(SynthesisError::InvalidSpec(format!(
                "duration {}s exceeds {}s",
                self.duration_seconds, MAX_DURATION_SECONDS
            )));
        }
        if self.sample_rate_hz == 0 {
            return Err(SynthesisError::InvalidSpec("sample rate must be positive".into()));
        }
        if !matches!(self.bits_per_sample, 8 | 16) {
            return Err(SynthesisError::InvalidSpec(format!(
                "unsupported bits per sample: {}",
                self.bits_per_sample
            )));
        }
        if !matches!(self.channels, 1 | 2) {
            return Err(SynthesisError::InvalidSpec(format!(
                "unsupported channel count: {}",
                self.channels
            )));
        }

        let frequencies: &[f64] = match &self.waveform {
            Waveform::Silence => &[][..],
            Waveform::Tone(f) => std::slice::from_ref(f),
            Waveform::MultiTone(fs) | Waveform::Melody(fs) => {
                if fs.is_empty() {
                    return Err(SynthesisError::InvalidSpec(format!(
                        "{} needs at least one frequency",
                        self.waveform.name()
                    )));
                }
                fs.as_slice()
            }
        };
        if let Some(bad) = frequencies.iter().find(|f| !f.is_finite() || **f < 0.0) {
            return Err(SynthesisError::InvalidSpec(format!("invalid frequency: {}", bad)));
        }

        let data_len = self.data_len();
        if data_len > MAX_DATA_LEN {
            return Err(SynthesisError::TooLarge(data_len));
        }

        Ok(())
    }
}

/// Derive an 8-note melody from track text
///
/// **Algorithm:**
/// 1. `h` = first four bytes of SHA-256(`title + artist`) as big-endian u32
/// 2. note `i` = `MAJOR_SCALE[(h + 7i) mod 8]` for `i` in 0..8
pub fn melody_from_text(title: &str, artist: &str) -> Vec<f64> {
    let digest = Sha256::digest(format!("{}{}", title, artist).as_bytes());
    let h = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let scale_len = MAJOR_SCALE.len() as u64;

    (0..MELODY_LENGTH as u64)
        .map(|i| MAJOR_SCALE[((u64::from(h) + 7 * i) % scale_len) as usize])
        .collect()
}

/// Canonical 44-byte PCM WAVE header
pub fn wav_header(data_len: u32, sample_rate_hz: u32, bits_per_sample: u16, channels: u16) -> [u8; WAV_HEADER_LEN] {
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = sample_rate_hz * u32::from(block_align);

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate_hz.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}

/// Synthesize a clip, reporting invalid or oversized specs
pub fn try_synthesize(spec: &SynthesisSpec) -> Result<Vec<u8>, SynthesisError> {
    spec.validate()?;

    let data_len = spec.data_len();
    let data_len_u32 = u32::try_from(data_len).map_err(|_| SynthesisError::TooLarge(data_len))?;
    let capacity = usize::try_from(data_len)
        .map_err(|_| SynthesisError::TooLarge(data_len))?
        .saturating_add(WAV_HEADER_LEN);

    let mut out = Vec::with_capacity(capacity);
    out.extend_from_slice(&wav_header(
        data_len_u32,
        spec.sample_rate_hz,
        spec.bits_per_sample,
        spec.channels,
    ));

    if spec.waveform == Waveform::Silence {
        out.resize(capacity, 0);
        return Ok(out);
    }

    let full_scale = f64::from((1u32 << (spec.bits_per_sample - 1)) - 1);
    let rate = f64::from(spec.sample_rate_hz);
    let frames = u64::from(spec.duration_seconds) * u64::from(spec.sample_rate_hz);
    let samples_per_note = (spec.sample_rate_hz / NOTES_PER_SECOND).max(1) as u64;

    for frame in 0..frames {
        let t = frame as f64 / rate;
        let value = match &spec.waveform {
            Waveform::Silence => 0.0,
            Waveform::Tone(f) => TONE_AMPLITUDE * full_scale * sine(*f, t),
            Waveform::MultiTone(fs) => {
                let sum: f64 = fs.iter().map(|f| sine(*f, t)).sum();
                TONE_AMPLITUDE * full_scale * sum / fs.len() as f64
            }
            Waveform::Melody(notes) => {
                let f = notes[((frame / samples_per_note) % notes.len() as u64) as usize];
                let amplitude = MELODY_AMPLITUDE * full_scale;
                amplitude
                    * (sine(f, t)
                        + SECOND_HARMONIC * sine(2.0 * f, t)
                        + THIRD_HARMONIC * sine(3.0 * f, t))
            }
        };

        for _ in 0..spec.channels {
            push_sample(&mut out, value, spec.bits_per_sample);
        }
    }

    Ok(out)
}

/// Synthesize a clip, degrading to simpler waveforms instead of failing
///
/// **Fallback chain:**
/// 1. The requested spec
/// 2. E-minor chord, 44.1 kHz 16-bit stereo, duration clamped to one hour
/// 3. 330 Hz tone, 22.05 kHz 16-bit mono, same clamped duration
/// 4. ASCII placeholder `PLACEHOLDER_AUDIO_<d>s` (not playable audio)
pub fn synthesize(spec: &SynthesisSpec) -> Vec<u8> {
    let err = match try_synthesize(spec) {
        Ok(bytes) => return bytes,
        Err(e) => e,
    };

    let duration = fallback_duration(spec.duration_seconds);
    warn!(
        waveform = spec.waveform.name(),
        error = %err,
        "Synthesis failed, retrying with chord"
    );

    let chord = SynthesisSpec::stereo(duration, Waveform::MultiTone(E_MINOR_CHORD.to_vec()));
    let err = match try_synthesize(&chord) {
        Ok(bytes) => return bytes,
        Err(e) => e,
    };
    warn!(error = %err, "Chord synthesis failed, retrying with mono tone");

    let tone = SynthesisSpec {
        duration_seconds: duration,
        sample_rate_hz: LAST_RESORT_SAMPLE_RATE,
        bits_per_sample: 16,
        channels: 1,
        waveform: Waveform::Tone(LAST_RESORT_FREQUENCY),
    };
    match try_synthesize(&tone) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "All waveforms failed, emitting text placeholder");
            placeholder(duration)
        }
    }
}

/// Duration used by the fallback waveforms: at least one second, at most the cap
fn fallback_duration(requested: u32) -> u32 {
    requested.clamp(1, MAX_DURATION_SECONDS)
}

/// Non-audio marker returned when no waveform can be produced
pub fn placeholder(duration_seconds: u32) -> Vec<u8> {
    format!("PLACEHOLDER_AUDIO_{}s", duration_seconds).into_bytes()
}

fn sine(frequency: f64, t: f64) -> f64 {
    (2.0 * PI * frequency * t).sin()
}

fn push_sample(out: &mut Vec<u8>, value: f64, bits_per_sample: u16) {
    if bits_per_sample == 8 {
        // 8-bit PCM is unsigned, centred on 128
        let v = (value.round() as i32 + 128).clamp(0, 255) as u8;
        out.push(v);
    } else {
        let v = value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
}
