//! Sizes, rectangles, and the resize-mode clipping math.
//!
//! Sizes are in points; multiplying by a scale gives pixels. All rounding snaps
//! to the pixel grid of the destination scale.

use serde::{Deserialize, Serialize};

/// A width/height pair in points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// The natural-size sentinel: use the source's native resolution.
    pub const NATURAL: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when both dimensions are zero.
    pub fn is_natural(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

/// An axis-aligned rectangle in points. Origins may be negative when a
/// resize mode crops.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Longest edge in points.
    pub fn max_dimension(&self) -> f64 {
        self.width.max(self.height)
    }
}

/// Policy for reconciling the source aspect ratio with a requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    /// Stretch to the target, ignoring aspect ratio
    #[default]
    Fill,
    /// Scale to fit entirely inside the target (letterbox)
    AspectFit,
    /// Scale to cover the target, cropping overflow
    AspectFill,
}

impl ResizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::AspectFit => "aspect-fit",
            Self::AspectFill => "aspect-fill",
        }
    }
}

impl std::str::FromStr for ResizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fill" | "stretch" => Ok(Self::Fill),
            "aspect-fit" | "contain" => Ok(Self::AspectFit),
            "aspect-fill" | "cover" => Ok(Self::AspectFill),
            other => Err(format!("unknown resize mode '{other}'")),
        }
    }
}

fn ceil_value(value: f64, scale: f64) -> f64 {
    (value * scale).ceil() / scale
}

fn floor_value(value: f64, scale: f64) -> f64 {
    (value * scale).floor() / scale
}

fn ceil_size(size: Size, scale: f64) -> Size {
    Size::new(ceil_value(size.width, scale), ceil_value(size.height, scale))
}

/// Compute the rectangle a source of `source` points should be drawn into to
/// satisfy `dest` under `mode`, never exceeding the source along a clipped
/// axis.
///
/// A natural (zero) `dest` returns the full source. If only one dimension of
/// `dest` is zero it is derived from the source aspect ratio. The rect is
/// relative to the destination's origin, so letterboxing shows up as a
/// positive offset and cropping as a negative one.
pub fn clip_rect(source: Size, dest: Size, dest_scale: f64, mode: ResizeMode) -> Rect {
    let scale = if dest_scale > 0.0 { dest_scale } else { 1.0 };
    if dest.is_natural() || source.width <= 0.0 || source.height <= 0.0 {
        return Rect {
            x: 0.0,
            y: 0.0,
            width: source.width,
            height: source.height,
        };
    }

    let aspect = source.aspect();
    let mut dest = dest;
    if dest.width == 0.0 {
        dest.width = dest.height * aspect;
    }
    if dest.height == 0.0 {
        dest.height = dest.width / aspect;
    }

    let mut mode = mode;
    let mut target_aspect = 0.0;
    if mode != ResizeMode::Fill {
        target_aspect = dest.aspect();
        if aspect == target_aspect {
            mode = ResizeMode::Fill;
        }
    }

    let mut size = source;
    match mode {
        ResizeMode::Fill => {
            size.width = dest.width.min(source.width);
            size.height = dest.height.min(source.height);
            let size = ceil_size(size, scale);
            Rect {
                x: 0.0,
                y: 0.0,
                width: size.width,
                height: size.height,
            }
        }
        ResizeMode::AspectFit => {
            if target_aspect <= aspect {
                // target is taller than the content
                size.width = dest.width.min(source.width);
                dest.width = size.width;
                size.height = size.width / aspect;
            } else {
                size.height = dest.height.min(source.height);
                dest.height = size.height;
                size.width = size.height * aspect;
            }
            let x = floor_value((dest.width - size.width) / 2.0, scale);
            let y = floor_value((dest.height - size.height) / 2.0, scale);
            let size = ceil_size(size, scale);
            Rect {
                x,
                y,
                width: size.width,
                height: size.height,
            }
        }
        ResizeMode::AspectFill => {
            if target_aspect <= aspect {
                size.height = dest.height.min(source.height);
                dest.height = size.height;
                size.width = size.height * aspect;
                dest.width = dest.height * target_aspect;
                let x = floor_value((dest.width - size.width) / 2.0, scale);
                let size = ceil_size(size, scale);
                Rect {
                    x,
                    y: 0.0,
                    width: size.width,
                    height: size.height,
                }
            } else {
                size.width = dest.width.min(source.width);
                dest.width = size.width;
                size.height = size.width / aspect;
                dest.height = dest.width / target_aspect;
                let y = floor_value((dest.height - size.height) / 2.0, scale);
                let size = ceil_size(size, scale);
                Rect {
                    x: 0.0,
                    y,
                    width: size.width,
                    height: size.height,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_dest_returns_source() {
        let rect = clip_rect(
            Size::new(640.0, 480.0),
            Size::NATURAL,
            2.0,
            ResizeMode::AspectFit,
        );
        assert_eq!(rect.size(), Size::new(640.0, 480.0));
    }

    #[test]
    fn test_fill_clips_to_dest() {
        let rect = clip_rect(
            Size::new(4000.0, 3000.0),
            Size::new(400.0, 300.0),
            1.0,
            ResizeMode::Fill,
        );
        assert_eq!(rect.size(), Size::new(400.0, 300.0));
    }

    #[test]
    fn test_fill_never_exceeds_source() {
        let rect = clip_rect(
            Size::new(50.0, 40.0),
            Size::new(400.0, 300.0),
            1.0,
            ResizeMode::Fill,
        );
        assert_eq!(rect.size(), Size::new(50.0, 40.0));
    }

    #[test]
    fn test_aspect_fit_letterboxes_wide_source() {
        let rect = clip_rect(
            Size::new(200.0, 50.0),
            Size::new(100.0, 100.0),
            2.0,
            ResizeMode::AspectFit,
        );
        assert_eq!(rect.width, 100.0);
        assert_eq!(rect.height, 25.0);
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.y, 37.5);
    }

    #[test]
    fn test_aspect_fit_tall_source() {
        let rect = clip_rect(
            Size::new(50.0, 200.0),
            Size::new(100.0, 100.0),
            1.0,
            ResizeMode::AspectFit,
        );
        assert_eq!(rect.size(), Size::new(25.0, 100.0));
        assert_eq!(rect.x, 37.0);
    }

    #[test]
    fn test_aspect_fill_crops_overflow() {
        let rect = clip_rect(
            Size::new(400.0, 100.0),
            Size::new(100.0, 100.0),
            1.0,
            ResizeMode::AspectFill,
        );
        assert_eq!(rect.size(), Size::new(400.0, 100.0));
        assert_eq!(rect.x, -150.0);
        assert_eq!(rect.y, 0.0);
    }

    #[test]
    fn test_matching_aspect_behaves_like_fill() {
        let rect = clip_rect(
            Size::new(800.0, 600.0),
            Size::new(400.0, 300.0),
            1.0,
            ResizeMode::AspectFill,
        );
        assert_eq!(rect.size(), Size::new(400.0, 300.0));
        assert_eq!((rect.x, rect.y), (0.0, 0.0));
    }

    #[test]
    fn test_zero_width_derived_from_aspect() {
        let rect = clip_rect(
            Size::new(800.0, 400.0),
            Size::new(0.0, 100.0),
            1.0,
            ResizeMode::AspectFit,
        );
        assert_eq!(rect.size(), Size::new(200.0, 100.0));
    }

    #[test]
    fn test_rounding_snaps_to_pixel_grid() {
        let rect = clip_rect(
            Size::new(300.0, 100.0),
            Size::new(100.0, 100.0),
            2.0,
            ResizeMode::AspectFit,
        );
        // 100 / 3 = 33.33 -> ceil(66.67) / 2
        assert_eq!(rect.height, 33.5);
    }

    #[test]
    fn test_resize_mode_from_str() {
        assert_eq!("aspect-fit".parse::<ResizeMode>(), Ok(ResizeMode::AspectFit));
        assert_eq!("cover".parse::<ResizeMode>(), Ok(ResizeMode::AspectFill));
        assert!("tile".parse::<ResizeMode>().is_err());
    }
}
