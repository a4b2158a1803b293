//! Data augmentation for training images
//!
//! Three random transforms applied per training item, after resizing:
//!
//! - horizontal flip
//! - rotation by a random fraction of a full turn
//! - zoom in or out around the image center
//!
//! Rotation and zoom resample bilinearly and fill uncovered pixels by
//! reflecting the image at its border. Validation and test items are never
//! augmented.

use image::{Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq)]
pub struct AugmentationConfig {
    /// Probability of a horizontal flip (0.0 - 1.0)
    pub horizontal_flip_prob: f32,
    /// Rotation drawn from `[-rotation_factor, rotation_factor]` of a full turn
    pub rotation_factor: f32,
    /// Zoom drawn from `[-zoom_factor, zoom_factor]`; positive zooms out
    pub zoom_factor: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            horizontal_flip_prob: 0.5,
            rotation_factor: 0.1,
            zoom_factor: 0.2,
        }
    }
}

impl AugmentationConfig {
    /// Disable all augmentations
    pub fn none() -> Self {
        Self {
            horizontal_flip_prob: 0.0,
            rotation_factor: 0.0,
            zoom_factor: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.horizontal_flip_prob <= 0.0 && self.rotation_factor <= 0.0 && self.zoom_factor <= 0.0
    }
}

/// Applies random transformations to RGB images
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    /// Apply the configured transforms. The output keeps the input size.
    pub fn augment(&self, img: &RgbImage, rng: &mut ChaCha8Rng) -> RgbImage {
        let mut result = if rng.gen::<f32>() < self.config.horizontal_flip_prob {
            image::imageops::flip_horizontal(img)
        } else {
            img.clone()
        };

        if self.config.rotation_factor > 0.0 {
            let f = self.config.rotation_factor;
            let turns = rng.gen_range(-f..=f);
            result = rotate(&result, turns * std::f32::consts::TAU);
        }

        if self.config.zoom_factor > 0.0 {
            let f = self.config.zoom_factor;
            let zoom = 1.0 + rng.gen_range(-f..=f);
            result = zoom_about_center(&result, zoom);
        }

        result
    }
}

/// Rotate around the image center by `angle_rad` (counter-clockwise)
pub fn rotate(img: &RgbImage, angle_rad: f32) -> RgbImage {
    if angle_rad.abs() < 1e-6 {
        return img.clone();
    }
    let (cos_a, sin_a) = (angle_rad.cos(), angle_rad.sin());
    resample(img, |dx, dy| (dx * cos_a + dy * sin_a, -dx * sin_a + dy * cos_a))
}

/// Scale around the image center. `zoom > 1` shows more of the image
/// (zoom out), `zoom < 1` crops into it.
pub fn zoom_about_center(img: &RgbImage, zoom: f32) -> RgbImage {
    if (zoom - 1.0).abs() < 1e-6 {
        return img.clone();
    }
    resample(img, |dx, dy| (dx * zoom, dy * zoom))
}

/// Build an output image by mapping each destination offset from the center
/// to a source offset
fn resample<F>(img: &RgbImage, map: F) -> RgbImage
where
    F: Fn(f32, f32) -> (f32, f32),
{
    let (width, height) = img.dimensions();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    RgbImage::from_fn(width, height, |x, y| {
        let (sx, sy) = map(x as f32 - cx, y as f32 - cy);
        bilinear_sample(img, cx + sx, cy + sy)
    })
}

/// Mirror a coordinate into `[0, size - 1]`
fn reflect(v: f32, size: u32) -> f32 {
    let max = size as f32 - 1.0;
    if max <= 0.0 {
        return 0.0;
    }
    let period = 2.0 * max;
    let m = v.rem_euclid(period);
    if m > max {
        period - m
    } else {
        m
    }
}

fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    let x = reflect(x, width);
    let y = reflect(y, height);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
