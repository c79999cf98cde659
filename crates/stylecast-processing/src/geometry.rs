//! Geometry utilities for crop computation.
//!
//! Pure functions over `f64` sizes and rectangles. Nothing here touches
//! pixels; callers convert to integer pixel rectangles at the very end with
//! [`Rect::to_pixels`].

/// Width and height in some pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn from_u32(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }

    pub fn aspect(&self) -> f64 {
        if self.height == 0.0 {
            0.0
        } else {
            self.width / self.height
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Rounds to whole pixels, keeping the rectangle inside `max_w` x `max_h`
    /// and at least one pixel in each direction.
    pub fn to_pixels(&self, max_w: u32, max_h: u32) -> (u32, u32, u32, u32) {
        let max_w = max_w.max(1);
        let max_h = max_h.max(1);
        let x = (self.x.round().max(0.0) as u32).min(max_w - 1);
        let y = (self.y.round().max(0.0) as u32).min(max_h - 1);
        let w = (self.width.round().max(1.0) as u32).min(max_w - x);
        let h = (self.height.round().max(1.0) as u32).min(max_h - y);
        (x, y, w, h)
    }
}

/// Direction in which the crop window can travel over the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// The axis that cannot move when this one is the movable one.
    pub fn other(self) -> Axis {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }
}

/// Largest window of `ratio` (width / height) that fits in `image`, plus the
/// one axis along which it has slack to move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectFit {
    pub window: Size,
    pub movable: Axis,
}

/// Computes the constrained crop window for a target ratio.
///
/// When the image is wider than the target the window spans the full height
/// and may only move horizontally; otherwise it spans the full width and may
/// only move vertically.
pub fn fit_aspect(image: Size, ratio: f64) -> AspectFit {
    if image.aspect() > ratio {
        let height = image.height;
        AspectFit {
            window: Size::new(height * ratio, height),
            movable: Axis::Horizontal,
        }
    } else {
        let width = image.width;
        AspectFit {
            window: Size::new(width, width / ratio),
            movable: Axis::Vertical,
        }
    }
}

/// Scale factor and resulting size of `source` fitted inside `bounds`,
/// preserving aspect ratio. Upscales when the source is smaller.
pub fn fit_within(source: Size, bounds: Size) -> (Size, f64) {
    if source.is_empty() || bounds.is_empty() {
        return (Size::new(0.0, 0.0), 0.0);
    }
    let scale = (bounds.width / source.width).min(bounds.height / source.height);
    (
        Size::new(source.width * scale, source.height * scale),
        scale,
    )
}

/// Allowed image offsets along one axis: `[-(image_len - window_len), 0]`.
pub fn offset_range(image_len: f64, window_len: f64) -> (f64, f64) {
    let slack = (image_len - window_len).max(0.0);
    (-slack, 0.0)
}

/// Clamps an image offset so the window never shows space outside the image.
pub fn clamp_offset(offset: f64, image_len: f64, window_len: f64) -> f64 {
    let (min, max) = offset_range(image_len, window_len);
    offset.clamp(min, max)
}

/// Centered window of `ratio` inside `image`.
pub fn centered_crop(image: Size, ratio: f64) -> Rect {
    let fit = fit_aspect(image, ratio);
    Rect::new(
        (image.width - fit.window.width) / 2.0,
        (image.height - fit.window.height) / 2.0,
        fit.window.width,
        fit.window.height,
    )
}

/// Offset that puts the image point `center` (in image coordinates) at the
/// middle of a window of `window_len`, clamped to the valid range.
pub fn offset_for_center(center: f64, image_len: f64, window_len: f64) -> f64 {
    clamp_offset(window_len / 2.0 - center, image_len, window_len)
}

/// Maps `rect` from an image of size `from` onto an image of size `to`.
///
/// Axes are scaled independently. If the two images have different aspect
/// ratios the result is shrunk around its center back to the ratio of the
/// input rectangle, then kept inside `to`.
pub fn rescale_rect(rect: Rect, from: Size, to: Size) -> Rect {
    if from.is_empty() || to.is_empty() {
        return rect;
    }
    let sx = to.width / from.width;
    let sy = to.height / from.height;
    let scaled = Rect::new(rect.x * sx, rect.y * sy, rect.width * sx, rect.height * sy);

    let ratio = if rect.height > 0.0 {
        rect.width / rect.height
    } else {
        return scaled;
    };
    if (sx - sy).abs() <= f64::EPSILON * sx.max(sy) {
        return scaled;
    }

    let (cx, cy) = scaled.center();
    let (mut width, mut height) = (scaled.width, scaled.height);
    if width / height > ratio {
        width = height * ratio;
    } else {
        height = width / ratio;
    }
    let x = (cx - width / 2.0).clamp(0.0, (to.width - width).max(0.0));
    let y = (cy - height / 2.0).clamp(0.0, (to.height - height).max(0.0));
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_fit_aspect_wide_source_locks_vertical() {
        let fit = fit_aspect(Size::new(1600.0, 1200.0), 0.75);
        assert_eq!(fit.movable, Axis::Horizontal);
        assert!((fit.window.height - 1200.0).abs() < EPS);
        assert!((fit.window.width - 900.0).abs() < EPS);
    }

    #[test]
    fn test_fit_aspect_tall_source_locks_horizontal() {
        let fit = fit_aspect(Size::new(600.0, 1200.0), 5.0 / 7.0);
        assert_eq!(fit.movable, Axis::Vertical);
        assert!((fit.window.width - 600.0).abs() < EPS);
        assert!((fit.window.height - 840.0).abs() < EPS);
    }

    #[test]
    fn test_fit_aspect_exact_ratio_has_no_slack() {
        let fit = fit_aspect(Size::new(300.0, 400.0), 0.75);
        assert!((fit.window.width - 300.0).abs() < EPS);
        assert!((fit.window.height - 400.0).abs() < EPS);
    }

    #[test]
    fn test_fit_within_scales_down_and_up() {
        let (size, scale) = fit_within(Size::new(4000.0, 3000.0), Size::new(800.0, 800.0));
        assert!((scale - 0.2).abs() < EPS);
        assert!((size.width - 800.0).abs() < EPS);
        assert!((size.height - 600.0).abs() < EPS);

        let (_, scale) = fit_within(Size::new(100.0, 50.0), Size::new(400.0, 400.0));
        assert!((scale - 4.0).abs() < EPS);
    }

    #[test]
    fn test_clamp_offset_range() {
        assert_eq!(offset_range(1000.0, 600.0), (-400.0, 0.0));
        assert_eq!(clamp_offset(50.0, 1000.0, 600.0), 0.0);
        assert_eq!(clamp_offset(-500.0, 1000.0, 600.0), -400.0);
        assert_eq!(clamp_offset(-120.0, 1000.0, 600.0), -120.0);
        // No slack: always pinned at zero
        assert_eq!(clamp_offset(-10.0, 600.0, 600.0), 0.0);
    }

    #[test]
    fn test_centered_crop_is_centered() {
        let rect = centered_crop(Size::new(1600.0, 1200.0), 0.75);
        assert!((rect.x - 350.0).abs() < EPS);
        assert_eq!(rect.y, 0.0);
        let (cx, cy) = rect.center();
        assert!((cx - 800.0).abs() < EPS);
        assert!((cy - 600.0).abs() < EPS);
    }

    #[test]
    fn test_offset_for_center_clamps() {
        // Window 600 over image 1000: centering on 500 puts offset at -200
        assert!((offset_for_center(500.0, 1000.0, 600.0) + 200.0).abs() < EPS);
        // Centering near the right edge is clamped to the minimum
        assert!((offset_for_center(990.0, 1000.0, 600.0) + 400.0).abs() < EPS);
    }

    #[test]
    fn test_rescale_rect_uniform() {
        let rect = Rect::new(100.0, 50.0, 300.0, 400.0);
        let out = rescale_rect(rect, Size::new(1000.0, 800.0), Size::new(2000.0, 1600.0));
        assert_eq!(out, Rect::new(200.0, 100.0, 600.0, 800.0));
    }

    #[test]
    fn test_rescale_rect_non_uniform_keeps_ratio() {
        let rect = Rect::new(100.0, 0.0, 300.0, 400.0);
        let out = rescale_rect(rect, Size::new(800.0, 400.0), Size::new(1024.0, 1024.0));
        assert!((out.width / out.height - 0.75).abs() < 1e-9);
        assert!(out.x >= 0.0 && out.y >= 0.0);
        assert!(out.x + out.width <= 1024.0 + EPS);
        assert!(out.y + out.height <= 1024.0 + EPS);
    }

    #[test]
    fn test_to_pixels_stays_in_bounds() {
        let rect = Rect::new(99.6, -0.4, 300.7, 400.2);
        assert_eq!(rect.to_pixels(400, 400), (100, 0, 300, 400));
        let overflow = Rect::new(390.0, 390.0, 50.0, 50.0);
        assert_eq!(overflow.to_pixels(400, 400), (390, 390, 10, 10));
    }
}
