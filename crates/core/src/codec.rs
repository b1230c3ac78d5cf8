//! G.711 µ-law codec
//!
//! Converts between 8-bit companded telephony audio and 16-bit linear PCM
//! (little-endian). Both directions are total functions: every input byte
//! and every input sample has a defined output, so there are no error paths.

use once_cell::sync::Lazy;

/// µ-law bias added before segment search (ITU-T G.711).
const BIAS: i16 = 0x84;

/// Maximum magnitude accepted by the encoder; larger samples clip here.
const CLIP: i16 = 32635;

/// Decode table for all 256 µ-law bytes, built once from the standard
/// expansion formula. Values match the published ITU-T decode table
/// bit for bit (pinned by tests below).
static MULAW_DECODE_TABLE: Lazy<[i16; 256]> = Lazy::new(|| {
    let mut table = [0i16; 256];
    for (byte, slot) in table.iter_mut().enumerate() {
        *slot = expand(byte as u8);
    }
    table
});

/// Expand a single µ-law byte to a linear 16-bit sample.
fn expand(byte: u8) -> i16 {
    let inverted = !byte;
    let sign = inverted & 0x80;
    let exponent = (inverted >> 4) & 0x07;
    let mantissa = inverted & 0x0F;

    let magnitude = (((mantissa as i16) << 3) + BIAS) << exponent;
    if sign != 0 {
        BIAS - magnitude
    } else {
        magnitude - BIAS
    }
}

/// Decode one µ-law byte to a linear 16-bit sample via the lookup table.
#[inline]
pub fn mulaw_to_linear(byte: u8) -> i16 {
    MULAW_DECODE_TABLE[byte as usize]
}

/// Compand one linear 16-bit sample to a µ-law byte.
///
/// Sign and magnitude are split, the magnitude clipped to [`CLIP`], the bias
/// added, the exponent segment located as the highest set bit in bits 7..=14,
/// and a 4-bit mantissa extracted; the combined byte is complemented per the
/// standard.
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let sign: u8 = if sample < 0 { 0x80 } else { 0x00 };
    // i16::MIN has no positive counterpart; saturate to the clip ceiling.
    let magnitude = (sample as i32).unsigned_abs().min(CLIP as u32) as i16;
    let biased = magnitude + BIAS;

    let mut exponent: u8 = 7;
    let mut mask: i16 = 0x4000;
    while exponent > 0 && biased & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = ((biased >> (exponent + 3)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa)
}

/// Decode µ-law bytes to 16-bit PCM (little-endian byte pairs).
pub fn decode(mulaw: &[u8]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(mulaw.len() * 2);
    for &byte in mulaw {
        pcm.extend_from_slice(&mulaw_to_linear(byte).to_le_bytes());
    }
    pcm
}

/// Encode 16-bit PCM (little-endian byte pairs) to µ-law bytes.
///
/// A trailing odd byte, which cannot form a sample, is ignored.
pub fn encode(pcm: &[u8]) -> Vec<u8> {
    pcm.chunks_exact(2)
        .map(|pair| linear_to_mulaw(i16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// First rows of the published ITU-T µ-law decode table.
    const PUBLISHED_HEAD: [i16; 16] = [
        -32124, -31100, -30076, -29052, -28028, -27004, -25980, -24956, -23932, -22908, -21884,
        -20860, -19836, -18812, -17788, -16764,
    ];

    #[test]
    fn test_decode_table_matches_published_values() {
        for (byte, &expected) in PUBLISHED_HEAD.iter().enumerate() {
            assert_eq!(mulaw_to_linear(byte as u8), expected, "byte {byte:#04x}");
        }
        // Spot values across the rest of the table.
        assert_eq!(mulaw_to_linear(0x10), -15996);
        assert_eq!(mulaw_to_linear(0x7E), -8);
        assert_eq!(mulaw_to_linear(0x7F), 0);
        assert_eq!(mulaw_to_linear(0x80), 32124);
        assert_eq!(mulaw_to_linear(0xFE), 8);
        assert_eq!(mulaw_to_linear(0xFF), 0);
    }

    #[test]
    fn test_zero_round_trips_to_zero() {
        assert_eq!(linear_to_mulaw(0), 0xFF);
        assert_eq!(mulaw_to_linear(linear_to_mulaw(0)), 0);
    }

    #[test]
    fn test_clip_boundary_clips_not_wraps() {
        // Everything at or above the clip ceiling companded to the top segment.
        assert_eq!(linear_to_mulaw(CLIP), linear_to_mulaw(i16::MAX));
        assert_eq!(linear_to_mulaw(-CLIP), linear_to_mulaw(i16::MIN));
        assert!(mulaw_to_linear(linear_to_mulaw(i16::MAX)) > 31000);
        assert!(mulaw_to_linear(linear_to_mulaw(i16::MIN)) < -31000);
    }

    #[test]
    fn test_round_trip_error_bounded_and_sign_preserving() {
        for raw in (-32768i32..=32767).step_by(17) {
            let sample = raw as i16;
            let decoded = mulaw_to_linear(linear_to_mulaw(sample));

            // Quantization step doubles per segment: magnitude-proportional bound.
            let magnitude = (sample as i32).unsigned_abs().min(CLIP as u32) as i32;
            let bound = (magnitude / 16).max(16) + BIAS as i32;
            assert!(
                (decoded as i32 - sample as i32).abs() <= bound,
                "sample {sample} decoded {decoded}"
            );

            if sample > BIAS {
                assert!(decoded > 0, "sample {sample} lost its sign");
            }
            if sample < -BIAS {
                assert!(decoded < 0, "sample {sample} lost its sign");
            }
        }
    }

    #[test]
    fn test_decode_is_monotonic_within_each_sign() {
        // Bytes 0x00..=0x7E are strictly increasing negatives toward zero,
        // 0x80..=0xFE strictly decreasing positives toward zero.
        for byte in 0u8..0x7E {
            assert!(mulaw_to_linear(byte) < mulaw_to_linear(byte + 1));
        }
        for byte in 0x80u8..0xFE {
            assert!(mulaw_to_linear(byte) > mulaw_to_linear(byte + 1));
        }
    }

    #[test]
    fn test_byte_level_encode_decode() {
        let samples: Vec<i16> = vec![0, 1000, -1000, 32000, -32000];
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let companded = encode(&pcm);
        assert_eq!(companded.len(), samples.len());

        let decoded = decode(&companded);
        assert_eq!(decoded.len(), pcm.len());
    }
}
