//! Byte-level decoding: still images, animated GIFs, and EXIF orientation.
//!
//! Everything here is synchronous and CPU-bound; callers run it inside
//! `spawn_blocking` or on the serial decode queue.

use exif::{In, Reader, Tag, Value};
use image::codecs::gif::GifDecoder;
use image::metadata::Orientation;
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use std::io::{BufRead, Cursor, Seek};
use std::time::Duration;

use crate::error::LoadError;
use crate::types::{AnimationFrame, DecodedImage};

/// Read the EXIF orientation from an encoded image.
///
/// Lenient: missing or unreadable EXIF data means no transform.
pub fn read_orientation(bytes: &[u8]) -> Orientation {
    read_orientation_from(&mut Cursor::new(bytes))
}

/// Read the EXIF orientation from a seekable container, e.g. an open file.
pub fn read_orientation_from<R: BufRead + Seek>(reader: &mut R) -> Orientation {
    let Ok(exif) = Reader::new().read_from_container(reader) else {
        return Orientation::NoTransforms;
    };

    exif.get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Short(v) => v.first().map(|&x| x as u32),
            Value::Long(v) => v.first().copied(),
            _ => None,
        })
        .and_then(|value| u8::try_from(value).ok())
        .and_then(Orientation::from_exif)
        .unwrap_or(Orientation::NoTransforms)
}

/// Detect the container format from magic bytes.
pub fn guess_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Decode an encoded still image at full resolution.
pub fn decode_still(tag: &str, bytes: &[u8]) -> Result<DecodedImage, LoadError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| LoadError::decode(tag, format!("Cannot detect image format: {}", e)))?;
    if reader.format().is_none() {
        return Err(LoadError::decode(tag, "Unrecognized image format"));
    }
    let image = reader
        .decode()
        .map_err(|e| LoadError::decode(tag, e.to_string()))?;

    Ok(DecodedImage::new(image).with_orientation(read_orientation(bytes)))
}

/// Decode a GIF into all of its frames.
///
/// Fails when the data is not a GIF or contains no frames.
pub fn decode_animated(tag: &str, bytes: &[u8]) -> Result<DecodedImage, LoadError> {
    let decoder = GifDecoder::new(Cursor::new(bytes))
        .map_err(|e| LoadError::decode(tag, format!("Invalid GIF: {}", e)))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| LoadError::decode(tag, e.to_string()))?;

    let frames: Vec<AnimationFrame> = frames
        .into_iter()
        .map(|frame| AnimationFrame {
            delay: Duration::from(frame.delay()),
            image: frame.into_buffer(),
        })
        .collect();

    tracing::trace!("Decoded {} GIF frames for {}", frames.len(), tag);
    DecodedImage::animated(frames)
        .ok_or_else(|| LoadError::decode(tag, "GIF contains no frames"))
}

/// Convert an already-decoded bitmap into a [`DecodedImage`] at `scale`.
pub(crate) fn wrap(image: DynamicImage, scale: f64, orientation: Orientation) -> DecodedImage {
    DecodedImage::new(image)
        .with_scale(scale)
        .with_orientation(orientation)
}
