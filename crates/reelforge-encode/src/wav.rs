//! Minimal RIFF/WAVE handling: enough to write silent PCM and to read back
//! how long a clip plays.

use std::path::Path;

use reelforge_core::ReelResult;

pub const PLACEHOLDER_SAMPLE_RATE: u32 = 44_100;

/// Most 16-bit mono samples a RIFF file can hold (its size field is a u32).
pub const MAX_PCM16_MONO_SAMPLES: u32 = (u32::MAX - 36) / 2;

/// Format fields of a `fmt ` chunk that matter for timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    pub fn byte_rate(&self) -> u64 {
        u64::from(self.sample_rate) * u64::from(self.channels) * u64::from(self.bits_per_sample) / 8
    }
}

/// 16-bit mono PCM of `samples` zero samples, capped at [`MAX_PCM16_MONO_SAMPLES`].
pub fn silent_pcm16_mono(sample_rate: u32, samples: u32) -> Vec<u8> {
    let data_len = samples.min(MAX_PCM16_MONO_SAMPLES) * 2;
    let byte_rate = sample_rate.saturating_mul(2);
    let mut bytes = Vec::with_capacity(44 + data_len as usize);

    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36u32 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);
    bytes
}

/// Playback length of a WAV file held in memory, in seconds.
///
/// Streaming encoders sometimes write a bogus `data` size (`0xFFFFFFFF` or 0);
/// in that case the bytes actually present are used.
pub fn duration_from_bytes(bytes: &[u8]) -> Option<f64> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut format = None;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().ok()?) as usize;
        let body = pos + 8;
        match id {
            b"fmt " if body + 16 <= bytes.len() => {
                format = Some(WavFormat {
                    channels: u16::from_le_bytes(bytes[body + 2..body + 4].try_into().ok()?),
                    sample_rate: u32::from_le_bytes(bytes[body + 4..body + 8].try_into().ok()?),
                    bits_per_sample: u16::from_le_bytes(
                        bytes[body + 14..body + 16].try_into().ok()?,
                    ),
                });
            }
            b"data" => {
                let fmt = format?;
                let available = bytes.len() - body;
                let len = if size == 0 || size > available { available } else { size };
                let rate = fmt.byte_rate();
                if rate == 0 {
                    return None;
                }
                return Some(len as f64 / rate as f64);
            }
            _ => {}
        }
        // Chunks are word aligned.
        pos = body.checked_add(size)?.checked_add(size & 1)?;
    }
    None
}

pub fn duration_from_file(path: &Path) -> ReelResult<Option<f64>> {
    let bytes = std::fs::read(path)?;
    Ok(duration_from_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_wav_duration() {
        let bytes = silent_pcm16_mono(PLACEHOLDER_SAMPLE_RATE, 176_400);
        assert_eq!(bytes.len(), 44 + 352_800);
        let d = duration_from_bytes(&bytes).unwrap();
        assert!((d - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_streaming_size_uses_available_bytes() {
        let mut bytes = silent_pcm16_mono(16_000, 16_000);
        bytes[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
        let d = duration_from_bytes(&bytes).unwrap();
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_skips_unknown_chunks() {
        let base = silent_pcm16_mono(8_000, 8_000);
        let mut bytes = base[..36].to_vec();
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 0]); // odd size plus pad byte
        bytes.extend_from_slice(&base[36..]);
        let d = duration_from_bytes(&bytes).unwrap();
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_byte_rate_does_not_overflow() {
        let format = WavFormat {
            channels: u16::MAX,
            sample_rate: u32::MAX,
            bits_per_sample: 32,
        };
        assert_eq!(
            format.byte_rate(),
            u64::from(u32::MAX) * u64::from(u16::MAX) * 4
        );
    }

    #[test]
    fn test_header_fields_fit_riff_limits() {
        let header = |bytes: &[u8], at: usize| u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
        // Only the header is inspected; building the full payload would need 4 GiB.
        assert_eq!(MAX_PCM16_MONO_SAMPLES as u64 * 2 + 36, u64::from(u32::MAX) - 1);
        let bytes = silent_pcm16_mono(8_000, 10);
        assert_eq!(header(&bytes, 4), 36 + 20);
        assert_eq!(header(&bytes, 28), 16_000);
    }

    #[test]
    fn test_rejects_non_wav() {
        assert!(duration_from_bytes(b"ID3\x03 not a wav file").is_none());
        assert!(duration_from_bytes(&[]).is_none());
    }
}
