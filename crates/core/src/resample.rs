//! Linear-interpolation sample-rate conversion
//!
//! Unused while both peers run the same clock, but load-bearing the moment
//! their rates diverge, so it is implemented and tested up front.

use std::borrow::Cow;

/// Convert `input` from `from_rate` to `to_rate`.
///
/// Equal rates return the input borrowed, no copy. Otherwise each output
/// sample is linearly interpolated between the two nearest source samples at
/// the fractional source index, clamped to the 16-bit signed range. Output
/// length is `round(input.len() * to_rate / from_rate)`.
pub fn resample(input: &[i16], from_rate: u32, to_rate: u32) -> Cow<'_, [i16]> {
    if from_rate == to_rate || input.is_empty() {
        return Cow::Borrowed(input);
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = (input.len() as f64 * ratio).round() as usize;

    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 / ratio;
        let idx_floor = src_idx.floor() as usize;
        let idx_ceil = (idx_floor + 1).min(input.len() - 1);
        let idx_floor = idx_floor.min(input.len() - 1);
        let frac = src_idx - idx_floor as f64;

        let interpolated =
            input[idx_floor] as f64 * (1.0 - frac) + input[idx_ceil] as f64 * frac;
        output.push(interpolated.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }

    Cow::Owned(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_borrows_input() {
        let samples = vec![1i16, 2, 3, 4];
        let out = resample(&samples, 8000, 8000);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, samples.as_slice());
    }

    #[test]
    fn test_output_length_follows_rate_ratio() {
        let samples = vec![0i16; 160]; // 20ms at 8kHz
        let up = resample(&samples, 8000, 16000);
        assert_eq!(up.len(), 320);

        let down = resample(&samples, 8000, 6000);
        assert_eq!(down.len(), 120);
    }

    #[test]
    fn test_constant_signal_is_preserved() {
        let samples = vec![1200i16; 80];
        let out = resample(&samples, 8000, 16000);
        assert!(out.iter().all(|&s| s == 1200));
    }

    #[test]
    fn test_upsampled_ramp_interpolates_between_neighbors() {
        let samples = vec![0i16, 100, 200, 300];
        let out = resample(&samples, 8000, 16000);
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 50);
        assert_eq!(out[2], 100);

        // Every interpolated value stays within its source neighborhood.
        for window in out.windows(2) {
            assert!((window[1] - window[0]).abs() <= 100);
        }
    }

    #[test]
    fn test_extremes_stay_in_range() {
        let samples = vec![i16::MIN, i16::MAX, i16::MIN, i16::MAX];
        let out = resample(&samples, 8000, 22050);
        assert!(out.iter().all(|&s| (i16::MIN..=i16::MAX).contains(&s)));
    }
}
