//! Last-resort media for segments whose fallback chain is exhausted.

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbImage};

use reelforge_core::{ReelError, ReelResult};

use crate::wav::{silent_pcm16_mono, PLACEHOLDER_SAMPLE_RATE};

/// Silent 16-bit mono 44.1 kHz WAV lasting `seconds`.
pub fn silent_audio(seconds: f64) -> Vec<u8> {
    let samples = (seconds.max(0.0) * f64::from(PLACEHOLDER_SAMPLE_RATE)).round() as u32;
    silent_pcm16_mono(PLACEHOLDER_SAMPLE_RATE, samples)
}

/// Hue in degrees for a segment, spread so neighbours are easy to tell apart.
pub fn hue_for_index(segment_index: usize) -> f64 {
    (segment_index as f64 * 137.5) % 360.0
}

/// Vertical gradient PNG, bright at the top and dark at the bottom.
pub fn gradient_image(width: u32, height: u32, segment_index: usize) -> ReelResult<Vec<u8>> {
    let hue = hue_for_index(segment_index);
    let rows: Vec<[u8; 3]> = (0..height)
        .map(|y| {
            let t = if height > 1 {
                f64::from(y) / f64::from(height - 1)
            } else {
                0.0
            };
            hsv_to_rgb(hue, 0.55, 0.85 - 0.6 * t)
        })
        .collect();
    let img = RgbImage::from_fn(width, height, |_, y| image::Rgb(rows[y as usize]));

    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| ReelError::Io(std::io::Error::other(e.to_string())))?;
    Ok(out)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [u8; 3] {
    let c = v * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    let to_u8 = |f: f64| ((f + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::duration_from_bytes;

    #[test]
    fn test_silent_audio_matches_planned_duration() {
        let bytes = silent_audio(4.0);
        assert!((duration_from_bytes(&bytes).unwrap() - 4.0).abs() < 1e-9);
        // round(2.5 * 44100) = 110250 samples of 2 bytes
        assert_eq!(silent_audio(2.5).len(), 44 + 110_250 * 2);
    }

    #[test]
    fn test_gradient_is_decodable_png() {
        let bytes = gradient_image(54, 96, 3).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!(img.width(), 54);
        assert_eq!(img.height(), 96);
        let rgb = img.to_rgb8();
        let top = rgb.get_pixel(0, 0);
        let bottom = rgb.get_pixel(0, 95);
        assert!(top.0.iter().map(|&c| c as u32).sum::<u32>() > bottom.0.iter().map(|&c| c as u32).sum::<u32>());
    }

    #[test]
    fn test_neighbouring_segments_differ_in_hue() {
        assert_ne!(hue_for_index(0), hue_for_index(1));
        assert!(hue_for_index(7) < 360.0);
    }
}
