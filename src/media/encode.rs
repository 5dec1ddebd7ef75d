use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, RgbImage};

pub const JPEG_QUALITY: u8 = 85;

/// Fixed canvas upload frames are drawn into.
pub const UPLOAD_CANVAS: (u32, u32) = (640, 480);

/// JPEG at quality 85, base64 without a data-URL prefix.
pub fn encode_frame(image: &DynamicImage) -> Result<String> {
    let rgb = image.to_rgb8();
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .context("jpeg encode failed")?;
    Ok(general_purpose::STANDARD.encode(jpeg))
}

/// Fit `image` inside `width`×`height`, centred on a black canvas.
pub fn letterbox(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let fitted = image.resize(width, height, FilterType::Triangle).to_rgb8();
    let mut canvas = RgbImage::new(width, height);
    let x = (width.saturating_sub(fitted.width())) / 2;
    let y = (height.saturating_sub(fitted.height())) / 2;
    imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));
    DynamicImage::ImageRgb8(canvas)
}
