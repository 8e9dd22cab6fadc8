//! Waveform synthesis integration tests
//!
//! Synthesized clips are parsed back with hound to confirm they are valid
//! PCM WAVE files.

use std::io::Cursor;
use tunefeed_ingest::services::content_validator::{classify, ContentClass};
use tunefeed_ingest::services::waveform_synthesizer::{
    melody_from_text, synthesize, try_synthesize, SynthesisSpec, Waveform, WAV_HEADER_LEN,
};

fn spec(duration: u32, rate: u32, bits: u16, channels: u16, waveform: Waveform) -> SynthesisSpec {
    SynthesisSpec {
        duration_seconds: duration,
        sample_rate_hz: rate,
        bits_per_sample: bits,
        channels,
        waveform,
    }
}

#[test]
fn test_length_formula_across_formats() {
    // Given: every supported depth and channel layout
    for (bits, channels) in [(8u16, 1u16), (8, 2), (16, 1), (16, 2)] {
        let s = spec(3, 11_025, bits, channels, Waveform::Tone(440.0));

        // When: synthesized
        let bytes = try_synthesize(&s).unwrap();

        // Then: total = 44 + d*r*c*b/8 and the RIFF size field = 36 + data
        let data_len = 3 * 11_025 * channels as usize * bits as usize / 8;
        assert_eq!(bytes.len(), WAV_HEADER_LEN + data_len);
        let riff_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(riff_size as usize, 36 + data_len);
    }
}

#[test]
fn test_hound_reads_melody() {
    let notes = melody_from_text("Nơi Này Có Anh", "Sơn Tùng MTP");
    let bytes = try_synthesize(&SynthesisSpec::stereo(2, Waveform::Melody(notes))).unwrap();

    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    let wav_spec = reader.spec();
    assert_eq!(wav_spec.channels, 2);
    assert_eq!(wav_spec.sample_rate, 44_100);
    assert_eq!(wav_spec.bits_per_sample, 16);
    assert_eq!(wav_spec.sample_format, hound::SampleFormat::Int);
    assert_eq!(reader.duration(), 2 * 44_100);

    // Fundamental + harmonics stay within 20% * (1 + 0.3 + 0.1) of full scale
    let limit = (0.2 * 1.4 * 32767.0f64).ceil() as i32;
    let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
    assert!(samples.iter().all(|s| (*s as i32).abs() <= limit));
    assert!(samples.iter().any(|s| *s != 0));
}

#[test]
fn test_tone_is_deterministic() {
    let s = spec(1, 22_050, 16, 2, Waveform::Tone(523.0));
    assert_eq!(try_synthesize(&s).unwrap(), try_synthesize(&s).unwrap());

    let other = spec(1, 22_050, 16, 2, Waveform::Tone(524.0));
    assert_ne!(try_synthesize(&s).unwrap(), try_synthesize(&other).unwrap());
}

#[test]
fn test_silence_data_is_zero() {
    let bytes = try_synthesize(&spec(2, 8000, 16, 2, Waveform::Silence)).unwrap();
    assert_eq!(bytes.len(), WAV_HEADER_LEN + 2 * 8000 * 2 * 2);
    assert!(bytes[WAV_HEADER_LEN..].iter().all(|b| *b == 0));

    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.spec().channels, 2);
}

#[test]
fn test_synthesized_output_passes_validator() {
    let bytes = synthesize(&SynthesisSpec::track_melody(1, "Mưa", "Soobin"));
    assert_eq!(classify(&bytes), ContentClass::RealAudio);
}

#[test]
fn test_invalid_request_degrades_to_playable_audio() {
    // Given: a duration far beyond the one-hour cap
    let s = SynthesisSpec::stereo(u32::MAX, Waveform::Melody(melody_from_text("a", "b")));
    assert!(try_synthesize(&s).is_err());

    // When: an unsupported bit depth goes through the infallible path
    let invalid = spec(1, 8000, 12, 1, Waveform::Tone(440.0));
    let bytes = synthesize(&invalid);

    // Then: the chord fallback is produced at the default format
    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.spec().sample_rate, 44_100);
    assert_eq!(reader.spec().channels, 2);
}

#[test]
fn test_melody_notes_come_from_scale() {
    let notes = melody_from_text("Hello", "Adele");
    assert_eq!(notes.len(), 8);
    for note in &notes {
        assert!(
            tunefeed_ingest::services::waveform_synthesizer::MAJOR_SCALE.contains(note),
            "{note} not in scale"
        );
    }
}
