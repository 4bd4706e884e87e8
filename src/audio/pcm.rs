//! PCM sample handling: sample-rate conversion and 16-bit wire encoding.
//!
//! All transforms here are pure. Capture always downsamples from the device
//! rate (typically 48kHz) to the 16kHz wire rate, so no interpolation filter
//! is applied.

/// Downsample `input` from `from_rate` to `to_rate` by averaging decimation.
///
/// Output index `i` is the mean of every source sample whose index falls in
/// `[i*ratio, (i+1)*ratio)` where `ratio = from_rate / to_rate`. Output length
/// is `round(input.len() * to_rate / from_rate)`.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (input.len() as f64 / ratio).round() as usize;
    let mut output = Vec::with_capacity(out_len);

    let mut offset = 0usize;
    for i in 0..out_len {
        let next_offset = (((i + 1) as f64) * ratio).round() as usize;
        let end = next_offset.min(input.len());

        let mut accum = 0.0f32;
        let mut count = 0usize;
        for &sample in &input[offset.min(end)..end] {
            accum += sample;
            count += 1;
        }

        // An empty bucket only happens when upsampling, which capture never does.
        output.push(if count > 0 { accum / count as f32 } else { 0.0 });
        offset = next_offset;
    }

    output
}

/// Encode float samples as signed 16-bit PCM.
///
/// Samples are clamped to `[-1.0, 1.0]` before scaling; out-of-range input
/// clips, never wraps.
pub fn encode_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32768.0) as i16)
        .collect()
}

/// Serialize 16-bit PCM samples as little-endian bytes for the wire.
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// Parse little-endian bytes as 16-bit PCM samples.
///
/// A trailing odd byte is ignored.
pub fn bytes_to_pcm16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Convert 16-bit PCM samples to floats in `[-1.0, 1.0]` for playback.
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| (s as f32 / 32768.0).clamp(-1.0, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_output_length() {
        for len in [0usize, 1, 160, 4096, 48000] {
            let input = vec![0.25f32; len];
            let output = resample(&input, 48000, 16000);
            let expected = (len as f64 * 16000.0 / 48000.0).round() as usize;
            assert_eq!(output.len(), expected, "input length {}", len);
        }
    }

    #[test]
    fn test_resample_deterministic() {
        let input: Vec<f32> = (0..4096).map(|i| ((i % 97) as f32 - 48.0) / 48.0).collect();
        let a = resample(&input, 48000, 16000);
        let b = resample(&input, 48000, 16000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_resample_averages_buckets() {
        // 48k -> 16k is exactly 3:1, so each output sample averages 3 inputs.
        let input = vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, -0.5, 0.5, 0.0];
        let output = resample(&input, 48000, 16000);
        assert_eq!(output.len(), 3);
        assert!((output[0] - 1.0).abs() < 1e-6);
        assert!((output[1] - 2.0).abs() < 1e-6);
        assert!(output[2].abs() < 1e-6);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![0.1, -0.2, 0.3];
        assert_eq!(resample(&input, 16000, 16000), input);
    }

    #[test]
    fn test_encode_clamps_before_scaling() {
        let encoded = encode_pcm16(&[-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(encoded, vec![-32768, -32768, 0, 32767, 32767]);
    }

    #[test]
    fn test_encode_midrange() {
        let encoded = encode_pcm16(&[0.5, -0.5]);
        assert_eq!(encoded, vec![16384, -16384]);
    }

    #[test]
    fn test_bytes_round_trip_little_endian() {
        let samples = vec![-32768i16, -1, 0, 1, 32767];
        let bytes = pcm16_to_bytes(&samples);
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[0..2], &[0x00, 0x80]);
        assert_eq!(bytes_to_pcm16(&bytes), samples);
    }

    #[test]
    fn test_bytes_ignores_trailing_odd_byte() {
        let parsed = bytes_to_pcm16(&[0x01, 0x00, 0xff]);
        assert_eq!(parsed, vec![1]);
    }

    #[test]
    fn test_pcm16_to_f32_scale() {
        let floats = pcm16_to_f32(&[-32768, 0, 32767]);
        assert!((floats[0] + 1.0).abs() < 1e-6);
        assert!(floats[1].abs() < 1e-6);
        assert!((floats[2] - 32767.0 / 32768.0).abs() < 1e-6);
    }
}
