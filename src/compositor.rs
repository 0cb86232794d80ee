//! Flattens the user's photo and adjustments into the raster sent to providers.

use std::io::Cursor;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbaImage};
use tracing::info;

use crate::error::InkError;
use crate::models::{Adjustments, Rotation};
use crate::selection::SelectionBox;

pub const JPEG_QUALITY: u8 = 85;

/// Fixed 3x3 sharpen kernel, row-major.
const SHARPEN_KERNEL: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

/// Encoded result of a bake. Empty when there was nothing to bake.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BakedImage {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

impl BakedImage {
    pub fn empty() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.data_uri.is_empty() }
}

#[derive(Debug, Clone, Default)]
pub struct ImageCompositor {
    source: Option<DynamicImage>,
}

impl ImageCompositor {
    pub fn new() -> Self { Self::default() }

    pub fn with_source(source: DynamicImage) -> Self {
        Self { source: Some(source) }
    }

    pub fn load_from_memory(bytes: &[u8]) -> Result<DynamicImage, InkError> {
        image::load_from_memory(bytes).map_err(|e| InkError::Image(format!("Invalid image format: {}", e)))
    }

    pub fn set_source(&mut self, source: DynamicImage) {
        self.source = Some(source);
    }

    pub fn source(&self) -> Option<&DynamicImage> { self.source.as_ref() }

    pub fn has_source(&self) -> bool { self.source.is_some() }

    /// Output canvas size for the given adjustments: rotated bounding box times scale.
    pub fn output_dimensions(width: u32, height: u32, adj: &Adjustments) -> (u32, u32) {
        let (w, h) = if adj.rotation.swaps_axes() { (height, width) } else { (width, height) };
        let scale = Adjustments::clamp_scale(adj.scale);
        (((w as f32 * scale) as u32).max(1), ((h as f32 * scale) as u32).max(1))
    }

    /// Applies every adjustment and returns the flattened pixels.
    pub fn render(&self, adj: &Adjustments) -> Option<RgbaImage> {
        let source = self.source.as_ref()?;
        let adj = adj.clamped();

        let mut pixels = source.to_rgba8();
        if adj.brightness != 100 || adj.contrast != 100 {
            apply_brightness_contrast(&mut pixels, adj.brightness, adj.contrast);
        }

        let rotated = match adj.rotation {
            Rotation::None => pixels,
            Rotation::Quarter => imageops::rotate90(&pixels),
            Rotation::Half => imageops::rotate180(&pixels),
            Rotation::ThreeQuarter => imageops::rotate270(&pixels),
        };

        let (w, h) = Self::output_dimensions(source.width(), source.height(), &adj);
        let mut flat = if (w, h) == rotated.dimensions() {
            rotated
        } else {
            imageops::resize(&rotated, w, h, FilterType::Triangle)
        };

        // Most expensive step, so it runs once on the final buffer.
        if adj.sharpen {
            flat = sharpen(&flat);
        }
        Some(flat)
    }

    /// Renders and encodes as a JPEG data URI. No source yields an empty result.
    pub fn bake(&self, adj: &Adjustments) -> Result<BakedImage, InkError> {
        let Some(flat) = self.render(adj) else {
            return Ok(BakedImage::empty());
        };
        let (width, height) = flat.dimensions();
        let rgb = DynamicImage::ImageRgba8(flat).to_rgb8();

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&rgb)?;

        info!("🖼️ Baked {}x{} image ({} bytes, rotation {}°, scale {:.1})", width, height, buf.len(), adj.rotation.degrees(), adj.scale);
        Ok(BakedImage { data_uri: data_uri("image/jpeg", &buf), width, height })
    }
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Brightness scales each channel, contrast stretches around mid-grey.
/// Both are percentages where 100 leaves the pixel unchanged.
pub fn apply_brightness_contrast(img: &mut RgbaImage, brightness: u16, contrast: u16) {
    let b = brightness as f32 / 100.0;
    let c = contrast as f32 / 100.0;
    for px in img.pixels_mut() {
        for ch in px.0.iter_mut().take(3) {
            let lit = (*ch as f32 * b).clamp(0.0, 255.0);
            let contrasted = ((lit - 127.5) * c + 127.5).clamp(0.0, 255.0);
            *ch = contrasted.round() as u8;
        }
    }
}

/// 3x3 sharpen convolution. Neighbours outside the image contribute zero;
/// alpha is copied through unchanged.
pub fn sharpen(src: &RgbaImage) -> RgbaImage {
    let (w, h) = src.dimensions();
    let mut out = RgbaImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0i32; 3];
            for ky in 0..3u32 {
                for kx in 0..3u32 {
                    let weight = SHARPEN_KERNEL[(ky * 3 + kx) as usize];
                    if weight == 0 {
                        continue;
                    }
                    let (Some(sx), Some(sy)) = ((x + kx).checked_sub(1), (y + ky).checked_sub(1)) else { continue };
                    if sx >= w || sy >= h {
                        continue;
                    }
                    let p = src.get_pixel(sx, sy);
                    for (a, v) in acc.iter_mut().zip(p.0.iter()) {
                        *a += *v as i32 * weight;
                    }
                }
            }
            let alpha = src.get_pixel(x, y).0[3];
            out.put_pixel(x, y, image::Rgba([
                acc[0].clamp(0, 255) as u8,
                acc[1].clamp(0, 255) as u8,
                acc[2].clamp(0, 255) as u8,
                alpha,
            ]));
        }
    }
    out
}

/// Inpainting mask: white where the model may paint, black elsewhere.
/// Without a selection the whole image is paintable.
pub fn selection_mask(width: u32, height: u32, selection: Option<&SelectionBox>) -> Result<String, InkError> {
    let mask = match selection {
        None => GrayImage::from_pixel(width, height, Luma([255])),
        Some(sel) => {
            let sel = sel.normalized();
            let x0 = (sel.start_x / 100.0 * width as f32) as u32;
            let y0 = (sel.start_y / 100.0 * height as f32) as u32;
            let x1 = ((sel.end_x / 100.0 * width as f32).ceil() as u32).min(width);
            let y1 = ((sel.end_y / 100.0 * height as f32).ceil() as u32).min(height);
            GrayImage::from_fn(width, height, |x, y| {
                if (x0..x1).contains(&x) && (y0..y1).contains(&y) { Luma([255]) } else { Luma([0]) }
            })
        }
    };
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(mask).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(data_uri("image/png", &buf))
}
