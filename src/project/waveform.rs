// Waveform levels for event display
//
// Decodes WAV (hound) or FLAC (claxon) and reduces the signal to one peak
// value per display slot.

use claxon::FlacReader;
use hound::{SampleFormat, WavReader};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum WaveformError {
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("FLAC decode error: {0}")]
    Flac(#[from] claxon::Error),

    #[error("Audio file has no channels")]
    NoChannels,
}

/// Peak levels and the length of the decoded audio
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub levels: Vec<f32>,
    /// Seconds
    pub duration: f64,
}

struct Decoded {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

/// Decode `path` and compute `levels_per_second` peak values per second
pub fn generate_levels(path: &Path, levels_per_second: u32) -> Result<Waveform, WaveformError> {
    let decoded = decode(path)?;
    if decoded.channels == 0 || decoded.sample_rate == 0 {
        return Err(WaveformError::NoChannels);
    }

    let channels = decoded.channels as usize;
    let frames = decoded.samples.len() / channels;
    let duration = frames as f64 / decoded.sample_rate as f64;
    let levels = peak_levels(&decoded.samples, channels, decoded.sample_rate, levels_per_second);

    log::debug!(
        "Generated {} levels for {} ({:.2}s)",
        levels.len(),
        path.display(),
        duration
    );
    Ok(Waveform { levels, duration })
}

fn decode(path: &Path) -> Result<Decoded, WaveformError> {
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

    match extension.to_lowercase().as_str() {
        "wav" => decode_wav(path),
        "flac" => decode_flac(path),
        _ => Err(WaveformError::UnsupportedFormat(extension.to_string())),
    }
}

fn decode_wav(path: &Path) -> Result<Decoded, WaveformError> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(Decoded {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn decode_flac(path: &Path) -> Result<Decoded, WaveformError> {
    let mut reader = FlacReader::open(path)?;
    let info = reader.streaminfo();
    let scale = (1i64 << (info.bits_per_sample.saturating_sub(1))) as f32;

    let samples: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|s| s as f32 / scale))
        .collect::<Result<_, _>>()?;

    Ok(Decoded {
        samples,
        sample_rate: info.sample_rate,
        channels: info.channels as u16,
    })
}

/// Largest absolute sample of each slot, across all channels
fn peak_levels(samples: &[f32], channels: usize, sample_rate: u32, levels_per_second: u32) -> Vec<f32> {
    let frames_per_level = (sample_rate / levels_per_second.max(1)).max(1) as usize;
    let samples_per_level = frames_per_level * channels;

    samples
        .chunks(samples_per_level)
        .map(|chunk| chunk.iter().fold(0.0f32, |peak, s| peak.max(s.abs())).min(1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::tempdir;

    fn write_wav(path: &Path, seconds: f32, channels: u16) {
        let spec = WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        let frames = (8000.0 * seconds) as usize;
        for i in 0..frames {
            let amplitude = i as f32 / frames as f32;
            let sample = (amplitude * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_levels_from_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ramp.wav");
        write_wav(&path, 1.0, 2);

        let waveform = generate_levels(&path, 10).unwrap();
        assert_eq!(waveform.levels.len(), 10);
        assert!((waveform.duration - 1.0).abs() < 1e-6);
        // A rising ramp has rising peaks
        assert!(waveform.levels.windows(2).all(|w| w[0] <= w[1]));
        assert!(waveform.levels[9] > 0.9);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.ogg");
        std::fs::write(&path, b"OggS").unwrap();
        assert!(matches!(
            generate_levels(&path, 10),
            Err(WaveformError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(generate_levels(&dir.path().join("gone.wav"), 10).is_err());
    }

    #[test]
    fn test_peak_levels_partial_last_slot() {
        let samples = [0.1, -0.5, 0.2, 0.3, -0.9];
        assert_eq!(peak_levels(&samples, 1, 2, 1), vec![0.5, 0.3, 0.9]);
    }
}
