use crate::{DeskpalError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Frames fed to the resampler per call
const CHUNK_SIZE: usize = 1024;

/// Convert a mono buffer from `from_rate` to `to_rate`
///
/// Capture devices usually run at 44.1 or 48 kHz while recognizers expect
/// 16 kHz. The output length is the input length scaled by the rate ratio.
pub fn resample_mono(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(DeskpalError::ConfigError(
            "Sample rates must be greater than 0".into(),
        ));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1).map_err(|e| {
        DeskpalError::AudioProcessingError(format!("Failed to create resampler: {}", e))
    })?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + CHUNK_SIZE);
    let process_err = |e: rubato::ResampleError| {
        DeskpalError::AudioProcessingError(format!("Resampling failed: {}", e))
    };

    let mut pos = 0;
    while samples.len() - pos >= resampler.input_frames_next() {
        let frames = resampler.input_frames_next();
        let chunk = resampler
            .process(&[samples[pos..pos + frames].to_vec()], None)
            .map_err(process_err)?;
        output.extend_from_slice(&chunk[0]);
        pos += frames;
    }

    if pos < samples.len() {
        let remainder = vec![samples[pos..].to_vec()];
        let chunk = resampler
            .process_partial(Some(remainder.as_slice()), None)
            .map_err(process_err)?;
        output.extend_from_slice(&chunk[0]);
    }

    // Push out what is still buffered inside the filter
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(process_err)?;
    output.extend_from_slice(&tail[0]);

    let delay = resampler.output_delay();
    debug!(
        "Resampled {} -> {} Hz: {} -> {} samples",
        from_rate, to_rate, samples.len(), expected
    );

    Ok(output.into_iter().skip(delay).take(expected).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(rate: u32, secs: f32) -> Vec<f32> {
        let n = (rate as f32 * secs) as usize;
        (0..n)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_same_rate_passthrough() {
        let input = sine(16000, 0.1);
        assert_eq!(resample_mono(&input, 16000, 16000).unwrap(), input);
    }

    #[test]
    fn test_downsample_length() {
        let input = sine(48000, 1.0);
        let output = resample_mono(&input, 48000, 16000).unwrap();
        assert!((output.len() as i64 - 16000).abs() <= 1, "got {}", output.len());
    }

    #[test]
    fn test_upsample_short_buffer() {
        let input = sine(8000, 0.05);
        let output = resample_mono(&input, 8000, 16000).unwrap();
        assert!((output.len() as i64 - 800).abs() <= 1, "got {}", output.len());
        assert!(output.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            resample_mono(&[0.0; 10], 0, 16000),
            Err(DeskpalError::ConfigError(_))
        ));
    }
}
