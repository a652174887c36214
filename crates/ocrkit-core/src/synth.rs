//! Synthetic CAPTCHA rendering.
//!
//! Draws lowercase text with a built-in 5x7 bitmap font, scaled to fill
//! the canvas, with per-glyph jitter and speckle noise. Deterministic for
//! a given seed. Used by `ocrkit generate` and throughout the test suites.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use ocrkit_plugin::HandlerError;
use ocrkit_types::sample::index_char;
use ocrkit_types::{CHARSET, LABEL_LENGTH};

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

// Rows top to bottom, bit 4 is the leftmost column.
const GLYPHS: [[u8; 7]; 26] = [
    [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F], // a
    [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x1E], // b
    [0x00, 0x00, 0x0E, 0x10, 0x10, 0x11, 0x0E], // c
    [0x01, 0x01, 0x0D, 0x13, 0x11, 0x11, 0x0F], // d
    [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E], // e
    [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08], // f
    [0x00, 0x0F, 0x11, 0x11, 0x0F, 0x01, 0x0E], // g
    [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x11], // h
    [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E], // i
    [0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0C], // j
    [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12], // k
    [0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E], // l
    [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11], // m
    [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11], // n
    [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E], // o
    [0x00, 0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10], // p
    [0x00, 0x0F, 0x11, 0x11, 0x0F, 0x01, 0x01], // q
    [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10], // r
    [0x00, 0x00, 0x0F, 0x10, 0x0E, 0x01, 0x1E], // s
    [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06], // t
    [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D], // u
    [0x00, 0x00, 0x11, 0x11, 0x11, 0x0A, 0x04], // v
    [0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0A], // w
    [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11], // x
    [0x00, 0x11, 0x11, 0x11, 0x0F, 0x01, 0x0E], // y
    [0x00, 0x00, 0x1F, 0x02, 0x04, 0x08, 0x1F], // z
];

/// Rendering parameters.
#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub width: u32,
    pub height: u32,
    /// Maximum per-glyph offset in pixels, each axis.
    pub jitter: u32,
    /// Fraction of pixels replaced by random speckle, `0.0..=1.0`.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            width: 160,
            height: 60,
            jitter: 2,
            noise: 0.02,
            seed: 0,
        }
    }
}

/// Render `text` into a new RGB image.
pub fn render(text: &str, opts: &SynthOptions) -> Result<RgbImage, HandlerError> {
    let glyphs: Vec<&[u8; 7]> = text
        .chars()
        .map(|c| {
            ocrkit_types::sample::char_index(c)
                .map(|i| &GLYPHS[i])
                .ok_or_else(|| {
                    HandlerError::InvalidInput(format!(
                        "cannot render '{c}': only characters in {CHARSET} are supported"
                    ))
                })
        })
        .collect::<Result<_, _>>()?;
    if glyphs.is_empty() {
        return Err(HandlerError::InvalidInput("cannot render empty text".into()));
    }
    if opts.width < GLYPH_W * glyphs.len() as u32 || opts.height < GLYPH_H {
        return Err(HandlerError::InvalidInput(format!(
            "canvas {}x{} too small for {} characters",
            opts.width,
            opts.height,
            glyphs.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut img = RgbImage::from_pixel(opts.width, opts.height, Rgb([245, 245, 240]));

    let cell_w = opts.width / glyphs.len() as u32;
    let scale = ((cell_w.saturating_sub(4)) / GLYPH_W)
        .min(opts.height.saturating_sub(8) / GLYPH_H)
        .max(1);
    let glyph_w = GLYPH_W * scale;
    let glyph_h = GLYPH_H * scale;

    for (i, rows) in glyphs.iter().enumerate() {
        let color = Rgb([
            rng.gen_range(0..90u8),
            rng.gen_range(0..90u8),
            rng.gen_range(0..90u8),
        ]);
        let base_x = i as u32 * cell_w + cell_w.saturating_sub(glyph_w) / 2;
        let base_y = opts.height.saturating_sub(glyph_h) / 2;
        let jitter = opts.jitter as i64;
        let dx = if jitter > 0 { rng.gen_range(-jitter..=jitter) } else { 0 };
        let dy = if jitter > 0 { rng.gen_range(-jitter..=jitter) } else { 0 };

        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        let x = base_x as i64 + (col * scale + sx) as i64 + dx;
                        let y = base_y as i64 + (row as u32 * scale + sy) as i64 + dy;
                        if x >= 0 && y >= 0 && (x as u32) < opts.width && (y as u32) < opts.height
                        {
                            img.put_pixel(x as u32, y as u32, color);
                        }
                    }
                }
            }
        }
    }

    let speckles = (f64::from(opts.width * opts.height) * opts.noise.clamp(0.0, 1.0)) as u32;
    for _ in 0..speckles {
        let x = rng.gen_range(0..opts.width);
        let y = rng.gen_range(0..opts.height);
        let v = rng.gen_range(100..220u8);
        img.put_pixel(x, y, Rgb([v, v, v]));
    }
    Ok(img)
}

/// A random valid label.
pub fn random_label<R: Rng>(rng: &mut R) -> String {
    (0..LABEL_LENGTH)
        .filter_map(|_| index_char(rng.gen_range(0..CHARSET.len())))
        .collect()
}

/// Write `count` random CAPTCHA images into `dir` as
/// `<label>_<index>.png`, creating the directory if needed.
pub fn write_dataset(dir: &Path, count: usize, opts: &SynthOptions) -> Result<Vec<PathBuf>, HandlerError> {
    std::fs::create_dir_all(dir)?;
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut written = Vec::with_capacity(count);
    for i in 0..count {
        let label = random_label(&mut rng);
        let per_image = SynthOptions {
            seed: rng.r#gen(),
            ..opts.clone()
        };
        let img = render(&label, &per_image)?;
        let path = dir.join(format!("{label}_{i:04}.png"));
        img.save(&path)?;
        written.push(path);
    }
    debug!(dir = %dir.display(), count, "wrote synthetic dataset");
    Ok(written)
}
