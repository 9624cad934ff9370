//! Core data types handed to load callbacks.

use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, RgbaImage};
use std::fmt;
use std::time::Duration;

use crate::geometry::Size;

/// A decoded bitmap plus the scale and orientation it should be displayed with.
#[derive(Clone)]
pub struct DecodedImage {
    /// Pixel data. For animations this is the first frame.
    pub image: DynamicImage,
    /// Pixels per point
    pub scale: f64,
    /// EXIF orientation of the pixel data (not yet applied)
    pub orientation: Orientation,
    /// Frames of an animated image, empty for still images
    pub frames: Vec<AnimationFrame>,
}

/// One frame of an animated image.
#[derive(Debug, Clone)]
pub struct AnimationFrame {
    pub image: RgbaImage,
    pub delay: Duration,
}

impl DecodedImage {
    /// Wrap a still image at scale 1 with no orientation transform.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            scale: 1.0,
            orientation: Orientation::NoTransforms,
            frames: Vec::new(),
        }
    }

    /// Build an animated image from its frames. Returns `None` when there are
    /// no frames.
    pub fn animated(frames: Vec<AnimationFrame>) -> Option<Self> {
        let first = frames.first()?.image.clone();
        Some(Self {
            image: DynamicImage::ImageRgba8(first),
            scale: 1.0,
            orientation: Orientation::NoTransforms,
            frames,
        })
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Dimensions of the pixel buffer.
    pub fn pixel_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Display size in points (pixels divided by scale).
    pub fn size(&self) -> Size {
        let (width, height) = self.pixel_size();
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        Size::new(width as f64 / scale, height as f64 / scale)
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// Total duration of one animation loop.
    pub fn duration(&self) -> Duration {
        self.frames.iter().map(|f| f.delay).sum()
    }

    /// The pixel data with the orientation transform applied.
    pub fn oriented(&self) -> DynamicImage {
        let mut image = self.image.clone();
        image.apply_orientation(self.orientation);
        image
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.pixel_size();
        f.debug_struct("DecodedImage")
            .field("width", &width)
            .field("height", &height)
            .field("scale", &self.scale)
            .field("orientation", &self.orientation)
            .field("frames", &self.frames.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_divides_by_scale() {
        let img = DecodedImage::new(DynamicImage::new_rgb8(200, 50)).with_scale(2.0);
        assert_eq!(img.pixel_size(), (200, 50));
        assert_eq!(img.size(), Size::new(100.0, 25.0));
    }

    #[test]
    fn test_oriented_rotates_pixels() {
        let img = DecodedImage::new(DynamicImage::new_rgb8(40, 10))
            .with_orientation(Orientation::Rotate90);
        let upright = img.oriented();
        assert_eq!((upright.width(), upright.height()), (10, 40));
    }

    #[test]
    fn test_animated_requires_frames() {
        assert!(DecodedImage::animated(Vec::new()).is_none());

        let frame = AnimationFrame {
            image: RgbaImage::new(4, 4),
            delay: Duration::from_millis(40),
        };
        let img = DecodedImage::animated(vec![frame.clone(), frame]).unwrap();
        assert!(img.is_animated());
        assert_eq!(img.duration(), Duration::from_millis(80));
        assert_eq!(img.pixel_size(), (4, 4));
    }
}
