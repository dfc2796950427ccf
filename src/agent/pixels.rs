use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgba};

use crate::config::AiConfig;
use crate::error::{AppError, AppResult};

/// Minimal valid 1x1 transparent PNG. Last-resort output if placeholder
/// encoding itself fails; resolver callers rely on always getting a
/// decodable image back.
const FALLBACK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0B, 0x49, 0x44, 0x41, 0x54, 0x78, 0xDA, 0x63, 0x60,
    0x00, 0x02, 0x00, 0x00, 0x05, 0x00, 0x01, 0xE9, 0xFA, 0xDC, 0xD8, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub fn decode(bytes: &[u8]) -> AppResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| AppError::Image(format!("Decode failed: {e}")))
}

pub fn encode_png(img: &DynamicImage) -> AppResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| AppError::Image(format!("PNG encode failed: {e}")))?;
    Ok(out.into_inner())
}

/// Downscale so both dimensions fit within `max_dim`, preserving aspect
/// ratio. Images already inside the bound pass through untouched.
pub fn fit_within(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w <= max_dim && h <= max_dim {
        return img;
    }
    img.resize(max_dim, max_dim, FilterType::Lanczos3)
}

/// Center-crop the long axis until width/height sits inside [min, max].
pub fn clamp_aspect(img: DynamicImage, min: f64, max: f64) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img;
    }
    let ratio = w as f64 / h as f64;
    if ratio > max {
        let new_w = ((h as f64) * max).floor().max(1.0) as u32;
        let x = (w - new_w) / 2;
        img.crop_imm(x, 0, new_w, h)
    } else if ratio < min {
        let new_h = ((w as f64) / min).floor().max(1.0) as u32;
        let y = (h - new_h) / 2;
        img.crop_imm(0, y, w, new_h)
    } else {
        img
    }
}

/// Normalize an uploaded or referenced image for the edit endpoint: decode,
/// clamp the aspect ratio band, fit within the max dimension, re-encode as
/// PNG, and shrink further if the encoded payload still exceeds the ceiling.
pub fn prepare_for_edit(bytes: &[u8], config: &AiConfig) -> AppResult<Vec<u8>> {
    let img = decode(bytes)?;
    let img = clamp_aspect(img, config.min_aspect, config.max_aspect);
    let mut img = fit_within(img, config.max_image_dim);

    let mut encoded = encode_png(&img)?;
    while encoded.len() > config.max_payload_bytes {
        let (w, h) = img.dimensions();
        if w <= 64 || h <= 64 {
            break;
        }
        img = img.resize(w / 2, h / 2, FilterType::Lanczos3);
        encoded = encode_png(&img)?;
    }
    Ok(encoded)
}

/// Synthesized stand-in drawn when a reference image cannot be fetched. A
/// soft two-tone gradient, always decodable.
pub fn placeholder_png(width: u32, height: u32) -> Vec<u8> {
    let buf: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        let fx = x as f32 / width.max(1) as f32;
        let fy = y as f32 / height.max(1) as f32;
        let r = (120.0 + 60.0 * fx) as u8;
        let g = (150.0 + 50.0 * fy) as u8;
        let b = (130.0 + 40.0 * (1.0 - fx)) as u8;
        Rgba([r, g, b, 255])
    });
    match encode_png(&DynamicImage::ImageRgba8(buf)) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Placeholder encode failed, using fallback PNG: {}", e);
            FALLBACK_PNG.to_vec()
        }
    }
}
