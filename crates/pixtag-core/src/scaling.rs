//! Clip-and-thumbnail scaling.
//!
//! Given an encoded source and a requested size, compute the rect the image
//! will occupy and decode straight to a thumbnail whose longest edge is
//! `max(rect.width, rect.height) * scale` pixels. JPEG sources are
//! downscaled in the DCT domain while decoding, so the full-resolution
//! bitmap never exists in memory. Other formats are decoded and then resized.

use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat};
use std::io::Cursor;

use crate::decode::{decode_still, guess_format, read_orientation, wrap};
use crate::error::LoadError;
use crate::geometry::{clip_rect, Rect, ResizeMode, Size};
use crate::source::AssetRepresentation;
use crate::types::DecodedImage;

/// The outcome of planning a scaled decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePlan {
    /// Where the image lands relative to the requested size, in points
    pub target_rect: Rect,
    /// Longest edge of the decoded thumbnail, in pixels
    pub max_pixel_size: u32,
}

/// Produces down-sampled decodes from encoded sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalingEngine;

impl ScalingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Plan a decode of a `source_pixels` image at `source_scale` into
    /// `target` points at `target_scale`.
    pub fn plan(
        source_pixels: (u32, u32),
        source_scale: f64,
        target: Size,
        target_scale: f64,
        mode: ResizeMode,
    ) -> ScalePlan {
        let source_scale = if source_scale > 0.0 { source_scale } else { 1.0 };
        let target_scale = if target_scale > 0.0 { target_scale } else { 1.0 };
        let source = Size::new(
            source_pixels.0 as f64 / source_scale,
            source_pixels.1 as f64 / source_scale,
        );
        let target_rect = clip_rect(source, target, target_scale, mode);
        let max_pixel_size = (target_rect.max_dimension() * target_scale).ceil().max(1.0) as u32;
        ScalePlan {
            target_rect,
            max_pixel_size,
        }
    }

    /// Decode a photo-library asset scaled for `target`.
    ///
    /// The raw bytes live only for the duration of this call.
    pub fn scale(
        &self,
        tag: &str,
        asset: &dyn AssetRepresentation,
        target: Size,
        target_scale: f64,
        mode: ResizeMode,
    ) -> Result<DecodedImage, LoadError> {
        let plan = Self::plan(asset.pixel_size(), asset.scale(), target, target_scale, mode);
        tracing::trace!(
            "Scaling {} from {:?} to max {}px ({:?})",
            tag,
            asset.pixel_size(),
            plan.max_pixel_size,
            mode
        );

        let image = {
            let bytes = read_asset(tag, asset)?;
            decode_thumbnail(tag, &bytes, plan.max_pixel_size)?
        };

        Ok(wrap(image, target_scale, asset.orientation()))
    }

    /// Decode a photo-library asset at its native resolution.
    pub fn decode_natural(
        &self,
        tag: &str,
        asset: &dyn AssetRepresentation,
    ) -> Result<DecodedImage, LoadError> {
        let decoded = {
            let bytes = read_asset(tag, asset)?;
            decode_still(tag, &bytes)?
        };
        Ok(decoded
            .with_scale(asset.scale())
            .with_orientation(asset.orientation()))
    }

    /// Decode an in-memory encoded image scaled for `target`.
    ///
    /// A natural `target` decodes at full resolution. Orientation comes from
    /// the image's own EXIF data.
    pub fn scale_bytes(
        &self,
        tag: &str,
        bytes: &[u8],
        target: Size,
        target_scale: f64,
        mode: ResizeMode,
    ) -> Result<DecodedImage, LoadError> {
        let target_scale = if target_scale > 0.0 { target_scale } else { 1.0 };
        if target.is_natural() {
            return Ok(decode_still(tag, bytes)?.with_scale(target_scale));
        }

        let source_pixels = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| LoadError::decode(tag, e.to_string()))?
            .into_dimensions()
            .map_err(|e| LoadError::decode(tag, e.to_string()))?;
        let plan = Self::plan(source_pixels, 1.0, target, target_scale, mode);
        let image = decode_thumbnail(tag, bytes, plan.max_pixel_size)?;
        Ok(wrap(image, target_scale, read_orientation(bytes)))
    }
}

/// Copy an asset's bytes into a freshly allocated buffer.
fn read_asset(tag: &str, asset: &dyn AssetRepresentation) -> Result<Vec<u8>, LoadError> {
    let len = usize::try_from(asset.byte_len())
        .map_err(|_| LoadError::decode(tag, "Asset too large to read"))?;
    let mut bytes = vec![0u8; len];
    let mut offset = 0;
    while offset < len {
        let read = asset
            .read_at(offset as u64, &mut bytes[offset..])
            .map_err(|e| LoadError::decode(tag, format!("Failed to read asset data: {}", e)))?;
        if read == 0 {
            return Err(LoadError::decode(
                tag,
                format!("Asset data truncated at {} of {} bytes", offset, len),
            ));
        }
        offset += read;
    }
    Ok(bytes)
}

/// Decode `bytes` so that the longest edge is at most `max_pixel_size`.
pub fn decode_thumbnail(
    tag: &str,
    bytes: &[u8],
    max_pixel_size: u32,
) -> Result<DynamicImage, LoadError> {
    let max_pixel_size = max_pixel_size.max(1);
    let image = match guess_format(bytes) {
        Some(ImageFormat::Jpeg) => match decode_jpeg_reduced(bytes, max_pixel_size) {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!("Reduced JPEG decode failed for {}: {}", tag, e);
                decode_still(tag, bytes)?.image
            }
        },
        Some(_) => image::load_from_memory(bytes).map_err(|e| LoadError::decode(tag, e.to_string()))?,
        None => return Err(LoadError::decode(tag, "Unrecognized image format")),
    };
    Ok(fit_within(image, max_pixel_size))
}

fn fit_within(image: DynamicImage, max_pixel_size: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width.max(height) <= max_pixel_size {
        image
    } else {
        image.thumbnail(max_pixel_size, max_pixel_size)
    }
}

/// Scale `(width, height)` so the longest edge equals `max_edge`.
fn fit_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width >= height {
        let h = (height as u64 * max_edge as u64).div_ceil(width.max(1) as u64);
        (max_edge, h as u32)
    } else {
        let w = (width as u64 * max_edge as u64).div_ceil(height.max(1) as u64);
        (w as u32, max_edge)
    }
}

fn clamp_u16(value: u32) -> u16 {
    u16::try_from(value.max(1)).unwrap_or(u16::MAX)
}

/// Decode a JPEG with DCT scaling to the smallest factor (1/8 .. 1) that is
/// still at least `max_pixel_size` along one axis.
fn decode_jpeg_reduced(bytes: &[u8], max_pixel_size: u32) -> Result<DynamicImage, String> {
    let mut decoder = jpeg_decoder::Decoder::new(bytes);
    decoder.read_info().map_err(|e| e.to_string())?;
    let info = decoder.info().ok_or("missing JPEG header")?;

    let (req_width, req_height) =
        fit_dimensions(info.width as u32, info.height as u32, max_pixel_size);
    let (width, height) = decoder
        .scale(clamp_u16(req_width), clamp_u16(req_height))
        .map_err(|e| e.to_string())?;
    let pixels = decoder.decode().map_err(|e| e.to_string())?;
    let (width, height) = (width as u32, height as u32);

    match info.pixel_format {
        jpeg_decoder::PixelFormat::L8 => ImageBuffer::from_raw(width, height, pixels)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| "grayscale buffer size mismatch".to_string()),
        jpeg_decoder::PixelFormat::RGB24 => ImageBuffer::from_raw(width, height, pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "RGB buffer size mismatch".to_string()),
        other => Err(format!("unsupported pixel format {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::fixtures;
    use image::metadata::Orientation;
    use std::io;

    struct MemoryAsset {
        bytes: Vec<u8>,
        pixels: (u32, u32),
        fail: bool,
    }

    impl AssetRepresentation for MemoryAsset {
        fn byte_len(&self) -> u64 {
            self.bytes.len() as u64
        }

        fn pixel_size(&self) -> (u32, u32) {
            self.pixels
        }

        fn scale(&self) -> f64 {
            1.0
        }

        fn orientation(&self) -> Orientation {
            Orientation::Rotate90
        }

        fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::Other, "disk unplugged"));
            }
            let start = offset as usize;
            let n = buf.len().min(self.bytes.len() - start).min(4096);
            buf[..n].copy_from_slice(&self.bytes[start..start + n]);
            Ok(n)
        }
    }

    #[test]
    fn test_plan_uses_target_not_source() {
        let plan = ScalingEngine::plan(
            (4000, 3000),
            1.0,
            Size::new(400.0, 300.0),
            2.0,
            ResizeMode::Fill,
        );
        assert_eq!(plan.max_pixel_size, 800);

        let plan = ScalingEngine::plan(
            (4000, 3000),
            1.0,
            Size::new(400.0, 300.0),
            1.0,
            ResizeMode::Fill,
        );
        assert_eq!(plan.max_pixel_size, 400);
    }

    #[test]
    fn test_plan_natural_keeps_source() {
        let plan = ScalingEngine::plan((640, 480), 2.0, Size::NATURAL, 2.0, ResizeMode::Fill);
        assert_eq!(plan.target_rect.size(), Size::new(320.0, 240.0));
        assert_eq!(plan.max_pixel_size, 640);
    }

    #[test]
    fn test_scale_jpeg_asset() {
        let asset = MemoryAsset {
            bytes: fixtures::jpeg(800, 600),
            pixels: (800, 600),
            fail: false,
        };
        let img = ScalingEngine::new()
            .scale(
                "assets-library://a",
                &asset,
                Size::new(80.0, 60.0),
                1.0,
                ResizeMode::Fill,
            )
            .unwrap();
        assert_eq!(img.pixel_size(), (80, 60));
        assert_eq!(img.scale, 1.0);
        assert_eq!(img.orientation, Orientation::Rotate90);
    }

    #[test]
    fn test_scale_png_asset_applies_scale() {
        let asset = MemoryAsset {
            bytes: fixtures::png(400, 100),
            pixels: (400, 100),
            fail: false,
        };
        let img = ScalingEngine::new()
            .scale(
                "assets-library://b",
                &asset,
                Size::new(50.0, 50.0),
                2.0,
                ResizeMode::AspectFit,
            )
            .unwrap();
        assert_eq!(img.pixel_size(), (100, 25));
        assert_eq!(img.size(), Size::new(50.0, 12.5));
    }

    #[test]
    fn test_decode_natural_keeps_resolution() {
        let asset = MemoryAsset {
            bytes: fixtures::png(64, 48),
            pixels: (64, 48),
            fail: false,
        };
        let img = ScalingEngine::new()
            .decode_natural("assets-library://c", &asset)
            .unwrap();
        assert_eq!(img.pixel_size(), (64, 48));
    }

    #[test]
    fn test_read_failure_is_decode_error() {
        let asset = MemoryAsset {
            bytes: fixtures::png(8, 8),
            pixels: (8, 8),
            fail: true,
        };
        let err = ScalingEngine::new()
            .scale("assets-library://d", &asset, Size::new(4.0, 4.0), 1.0, ResizeMode::Fill)
            .unwrap_err();
        assert!(err.to_string().contains("disk unplugged"));
        assert_eq!(err.tag(), "assets-library://d");
    }

    #[test]
    fn test_scale_bytes_aspect_fit() {
        let bytes = fixtures::png(200, 50);
        let img = ScalingEngine::new()
            .scale_bytes("x.png", &bytes, Size::new(100.0, 100.0), 2.0, ResizeMode::AspectFit)
            .unwrap();
        assert_eq!(img.pixel_size(), (200, 50));
        assert_eq!(img.size(), Size::new(100.0, 25.0));
    }

    #[test]
    fn test_fit_dimensions() {
        assert_eq!(fit_dimensions(4000, 3000, 800), (800, 600));
        assert_eq!(fit_dimensions(3000, 4000, 800), (600, 800));
        assert_eq!(fit_dimensions(1000, 3, 10), (10, 1));
    }

    #[test]
    fn test_decode_thumbnail_rejects_unknown_format() {
        assert!(decode_thumbnail("junk", b"\0\0\0\0", 10).is_err());
    }
}
