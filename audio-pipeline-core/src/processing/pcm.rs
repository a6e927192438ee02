//! PCM sample encoding for the container payload.
//!
//! Samples are carried as signed 16-bit values everywhere in the pipeline.
//! 16-bit payloads are little-endian signed; 8-bit payloads are unsigned
//! with a 128 offset, keeping the high byte of each sample.

/// Random-access source of interleaved samples.
pub trait PcmSource {
    fn sample_count(&self) -> usize;

    /// Copy up to `out.len()` samples starting at `offset`; returns the count copied.
    fn copy_samples(&self, offset: usize, out: &mut [i16]) -> usize;
}

impl PcmSource for [i16] {
    fn sample_count(&self) -> usize {
        self.len()
    }

    fn copy_samples(&self, offset: usize, out: &mut [i16]) -> usize {
        let Some(tail) = self.get(offset..) else {
            return 0;
        };
        let count = tail.len().min(out.len());
        out[..count].copy_from_slice(&tail[..count]);
        count
    }
}

impl PcmSource for Vec<i16> {
    fn sample_count(&self) -> usize {
        self.len()
    }

    fn copy_samples(&self, offset: usize, out: &mut [i16]) -> usize {
        self.as_slice().copy_samples(offset, out)
    }
}

/// Append `samples` to `out` at the given bit depth (8 or 16).
pub fn encode_samples(samples: &[i16], bits_per_sample: u16, out: &mut Vec<u8>) {
    match bits_per_sample {
        8 => out.extend(samples.iter().map(|&s| ((s >> 8) + 128) as u8)),
        _ => {
            out.reserve(samples.len() * 2);
            for sample in samples {
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
    }
}

/// Decode whole samples from `bytes` into `out`; returns the count decoded.
pub fn decode_samples(bytes: &[u8], bits_per_sample: u16, out: &mut [i16]) -> usize {
    match bits_per_sample {
        8 => {
            let count = bytes.len().min(out.len());
            for (dst, &b) in out.iter_mut().zip(&bytes[..count]) {
                *dst = ((b as i16) - 128) << 8;
            }
            count
        }
        _ => {
            let mut count = 0;
            for (dst, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
                *dst = i16::from_le_bytes([pair[0], pair[1]]);
                count += 1;
            }
            count
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteen_bit_is_little_endian() {
        let mut bytes = Vec::new();
        encode_samples(&[0x0102, -2], 16, &mut bytes);
        assert_eq!(bytes, vec![0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn eight_bit_is_offset_binary() {
        let mut bytes = Vec::new();
        encode_samples(&[i16::MIN, 0, i16::MAX], 8, &mut bytes);
        assert_eq!(bytes, vec![0, 128, 255]);

        let mut samples = [0i16; 3];
        assert_eq!(decode_samples(&bytes, 8, &mut samples), 3);
        assert_eq!(samples, [i16::MIN, 0, 0x7F00]);
    }

    #[test]
    fn decode_ignores_trailing_odd_byte() {
        let mut samples = [0i16; 4];
        assert_eq!(decode_samples(&[1, 0, 2], 16, &mut samples), 1);
        assert_eq!(samples[0], 1);
    }

    #[test]
    fn slice_source_copies_from_offset() {
        let data: Vec<i16> = (0..10).collect();
        let mut out = [0i16; 4];
        assert_eq!(data.copy_samples(8, &mut out), 2);
        assert_eq!(&out[..2], &[8, 9]);
        assert_eq!(data.copy_samples(11, &mut out), 0);
    }
}
