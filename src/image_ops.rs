use std::fs;
use std::fs::File;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::error::GbifImageError;

/// Pixel dimensions and on-disk byte size of one image file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measured {
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}

impl Measured {
    pub fn megapixels(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height) / 1e6
    }
}

pub fn measure(path: &Path) -> Result<Measured, GbifImageError> {
    let img = open(path)?;
    let (width, height) = img.dimensions();
    let file_size = fs::metadata(path)
        .map_err(|err| GbifImageError::Filesystem(err.to_string()))?
        .len();
    Ok(Measured {
        width,
        height,
        file_size,
    })
}

/// Re-encodes the file in place as JPEG at the given quality (1..=100).
pub fn recompress(path: &Path, quality: u8) -> Result<(), GbifImageError> {
    if !(1..=100).contains(&quality) {
        return Err(GbifImageError::InvalidQuality(quality));
    }
    let img = open(path)?;
    encode_jpeg(&img, path, quality)
}

/// Rescales the file in place to `percent` of its current dimensions and
/// returns fresh measurements of the result.
pub fn rescale(path: &Path, percent: u32) -> Result<Measured, GbifImageError> {
    let img = open(path)?;
    let (width, height) = img.dimensions();
    let new_width = (width * percent / 100).max(1);
    let new_height = (height * percent / 100).max(1);
    let scaled = img.resize_exact(new_width, new_height, FilterType::Lanczos3);
    encode_jpeg(&scaled, path, 90)?;
    measure(path)
}

/// Linear scale percentage taking `current` megapixels down to at most
/// `cap`: `round(sqrt(cap / current) * 100) - 1`, never below 1.
pub fn scale_percent(current: f64, cap: f64) -> u32 {
    let percent = ((cap / current).sqrt() * 100.0).round() as i64 - 1;
    percent.max(1) as u32
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn open(path: &Path) -> Result<DynamicImage, GbifImageError> {
    image::open(path).map_err(|err| GbifImageError::Image(err.to_string()))
}

fn encode_jpeg(img: &DynamicImage, path: &Path, quality: u8) -> Result<(), GbifImageError> {
    let mut file =
        File::create(path).map_err(|err| GbifImageError::Filesystem(err.to_string()))?;
    let encoder = JpegEncoder::new_with_quality(&mut file, quality);
    // JPEG has no alpha channel; flatten to RGB before encoding.
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|err| GbifImageError::Image(err.to_string()))
}
