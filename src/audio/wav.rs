use crate::{DeskpalError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;

/// Encode mono f32 samples as a 16-bit PCM WAV file in memory
pub fn encode_wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| DeskpalError::AudioProcessingError(format!("Failed to create WAV writer: {}", e)))?;
        for &sample in samples {
            let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| DeskpalError::AudioProcessingError(format!("Failed to write sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| DeskpalError::AudioProcessingError(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

/// Playback length of a WAV payload, None for other encodings
pub fn wav_duration_secs(bytes: &[u8]) -> Option<f32> {
    let reader = WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    Some(reader.duration() as f32 / spec.sample_rate as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header() {
        let samples: Vec<f32> = (0..1600).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
        let bytes = encode_wav_bytes(&samples, 16000).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + samples.len() * 2);
    }

    #[test]
    fn test_duration() {
        let bytes = encode_wav_bytes(&vec![0.0; 8000], 16000).unwrap();
        assert_eq!(wav_duration_secs(&bytes), Some(0.5));
        assert_eq!(wav_duration_secs(b"garbage"), None);
    }
}
