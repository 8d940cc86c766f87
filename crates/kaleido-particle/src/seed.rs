//! Initial particle placement from a decoded RGB raster.
//!
//! The raster is stretched over the cap's bounding square. Positions are
//! drawn uniformly; draws that land outside the disk or on a white pixel are
//! rejected, so the non-white picture inside the cap becomes the particle
//! cloud. Decoding the image file is left to the caller.

use kaleido_math::{Rgb, Vec2, pack_rgb8, rgb_from_u8};
use rand::Rng;

use crate::{MpmError, Result};

/// Rejected draws allowed per requested sample before giving up.
pub const MAX_DRAWS_PER_SAMPLE: usize = 1000;

const WHITE: u32 = 0xffffff;

/// Row-major 8-bit RGB pixels; row 0 is the bottom of the picture.
#[derive(Debug, Clone)]
pub struct SeedRaster {
    width: usize,
    height: usize,
    pixels: Vec<[u8; 3]>,
}

impl SeedRaster {
    pub fn new(width: usize, height: usize, pixels: Vec<[u8; 3]>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(MpmError::InvalidParameter(format!(
                "seed raster must be non-empty, got {width}x{height}"
            )));
        }
        if pixels.len() != width * height {
            return Err(MpmError::InvalidParameter(format!(
                "seed raster has {} pixels, expected {}",
                pixels.len(),
                width * height
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel at column `x`, row `y` (counted from the bottom), if inside.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y * self.width + x])
    }

    /// Pixel under normalized coordinates `(u, v)` in [0, 1)².
    fn pixel_at(&self, u: f64, v: f64) -> [u8; 3] {
        let x = ((u * self.width as f64) as usize).min(self.width - 1);
        let y = ((v * self.height as f64) as usize).min(self.height - 1);
        self.pixels[y * self.width + x]
    }
}

/// One initial particle: where it starts and what color it carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedSample {
    pub position: Vec2,
    pub color: Rgb,
    /// Index into the seed palette.
    pub palette_index: usize,
}

impl From<(Vec2, Rgb)> for SeedSample {
    fn from((position, color): (Vec2, Rgb)) -> Self {
        Self {
            position,
            color,
            palette_index: 0,
        }
    }
}

/// Sampled particles and the distinct colors they use (0xRRGGBB).
#[derive(Debug, Clone, Default)]
pub struct Seed {
    pub samples: Vec<SeedSample>,
    pub palette: Vec<u32>,
}

/// Draw `count` particles from the non-white pixels of `raster` inside a cap
/// of radius `cap_radius` centered at the origin.
pub fn sample_seed<R: Rng + ?Sized>(
    raster: &SeedRaster,
    count: usize,
    cap_radius: f64,
    rng: &mut R,
) -> Result<Seed> {
    if count == 0 {
        return Err(MpmError::EmptySeed);
    }
    if !(cap_radius.is_finite() && cap_radius > 0.0) {
        return Err(MpmError::InvalidParameter(format!(
            "cap radius must be positive, got {cap_radius}"
        )));
    }

    let max_draws = count.saturating_mul(MAX_DRAWS_PER_SAMPLE);
    let mut seed = Seed {
        samples: Vec::with_capacity(count),
        palette: Vec::new(),
    };
    let mut draws = 0;

    while seed.samples.len() < count {
        if draws >= max_draws {
            return Err(MpmError::SeedExhausted { attempts: draws });
        }
        draws += 1;

        let u: f64 = rng.gen_range(0.0..1.0);
        let v: f64 = rng.gen_range(0.0..1.0);
        let position = Vec2::new(2.0 * u - 1.0, 2.0 * v - 1.0) * cap_radius;
        if position.norm() >= cap_radius {
            continue;
        }

        let rgb = raster.pixel_at(u, v);
        let hex = pack_rgb8(rgb);
        if hex == WHITE {
            continue;
        }

        let palette_index = match seed.palette.iter().position(|&c| c == hex) {
            Some(i) => i,
            None => {
                seed.palette.push(hex);
                seed.palette.len() - 1
            }
        };
        seed.samples.push(SeedSample {
            position,
            color: rgb_from_u8(rgb),
            palette_index,
        });
    }

    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn two_tone_raster() -> SeedRaster {
        // Left half red, right half white.
        let (w, h) = (8, 8);
        let pixels = (0..w * h)
            .map(|i| if i % w < w / 2 { [255, 0, 0] } else { [255, 255, 255] })
            .collect();
        SeedRaster::new(w, h, pixels).unwrap()
    }

    #[test]
    fn test_samples_avoid_white_and_stay_in_cap() {
        let raster = two_tone_raster();
        let mut rng = StdRng::seed_from_u64(7);

        let seed = sample_seed(&raster, 200, 0.5, &mut rng).unwrap();

        assert_eq!(seed.samples.len(), 200);
        assert_eq!(seed.palette, vec![0xff0000]);
        for s in &seed.samples {
            assert!(s.position.norm() < 0.5);
            assert!(s.position.x < 0.0, "sample drawn from the white half");
            assert_eq!(s.color, Rgb::new(1.0, 0.0, 0.0));
            assert_eq!(s.palette_index, 0);
        }
    }

    #[test]
    fn test_sampling_is_reproducible() {
        let raster = two_tone_raster();
        let a = sample_seed(&raster, 50, 1.0, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = sample_seed(&raster, 50, 1.0, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a.samples, b.samples);
    }

    #[test]
    fn test_all_white_raster_exhausts() {
        let raster = SeedRaster::new(2, 2, vec![[255, 255, 255]; 4]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            sample_seed(&raster, 3, 0.5, &mut rng),
            Err(MpmError::SeedExhausted { attempts: 3000 })
        ));
    }

    #[test]
    fn test_pixel_lookup_is_bounded() {
        let raster = two_tone_raster();
        assert_eq!(raster.pixel(0, 7), Some([255, 0, 0]));
        assert_eq!(raster.pixel(7, 0), Some([255, 255, 255]));
        assert_eq!(raster.pixel(8, 0), None);
        assert_eq!(raster.pixel(0, 8), None);
        assert_eq!(raster.pixel(usize::MAX, usize::MAX), None);
    }

    #[test]
    fn test_raster_size_mismatch() {
        assert!(SeedRaster::new(2, 2, vec![[0, 0, 0]; 3]).is_err());
    }
}
