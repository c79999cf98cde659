//! Interactive crop engine
//!
//! The source image is shown fitted inside a viewport. A fixed-ratio crop
//! window spans the image along its constraining dimension, and the user
//! drags the image underneath it along the one axis that has slack. The
//! result is always reported in source-image pixels.

use stylecast_core::{AppError, AspectRatio, CropSpec};

use crate::geometry::{self, Axis, Rect, Size};

/// Valid image offsets for the current window, per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl OffsetBounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }
}

#[derive(Debug, Clone)]
pub struct CropEngine {
    source: Size,
    display: Size,
    /// display pixels per source pixel
    scale: f64,
    ratio: AspectRatio,
    window: Size,
    movable: Axis,
    /// Position of the image's top-left corner relative to the window, in
    /// display pixels. Always within `bounds()`.
    offset: (f64, f64),
}

impl CropEngine {
    /// Opens the engine on a `source_w` x `source_h` image shown inside a
    /// `viewport_w` x `viewport_h` area, with a centered window.
    pub fn open(
        source_w: u32,
        source_h: u32,
        viewport_w: u32,
        viewport_h: u32,
        ratio: AspectRatio,
    ) -> Result<Self, AppError> {
        if source_w == 0 || source_h == 0 {
            return Err(AppError::InvalidInput(format!(
                "Cannot crop an empty image ({}x{})",
                source_w, source_h
            )));
        }
        if viewport_w == 0 || viewport_h == 0 {
            return Err(AppError::InvalidInput(format!(
                "Invalid crop viewport ({}x{})",
                viewport_w, viewport_h
            )));
        }

        let source = Size::from_u32(source_w, source_h);
        let (display, scale) =
            geometry::fit_within(source, Size::from_u32(viewport_w, viewport_h));

        let mut engine = Self {
            source,
            display,
            scale,
            ratio,
            window: display,
            movable: Axis::Vertical,
            offset: (0.0, 0.0),
        };
        engine.refit();
        engine.center_on(display.width / 2.0, display.height / 2.0);
        Ok(engine)
    }

    /// Opens the engine with the image shown at its natural size.
    pub fn open_unscaled(source_w: u32, source_h: u32, ratio: AspectRatio) -> Result<Self, AppError> {
        Self::open(source_w, source_h, source_w, source_h, ratio)
    }

    fn refit(&mut self) {
        let fit = geometry::fit_aspect(self.display, self.ratio.value());
        self.window = fit.window;
        self.movable = fit.movable;
    }

    fn center_on(&mut self, cx: f64, cy: f64) {
        let x = geometry::offset_for_center(cx, self.display.width, self.window.width);
        let y = geometry::offset_for_center(cy, self.display.height, self.window.height);
        self.offset = self.clamped(x, y);
    }

    fn clamped(&self, x: f64, y: f64) -> (f64, f64) {
        (
            geometry::clamp_offset(x, self.display.width, self.window.width),
            geometry::clamp_offset(y, self.display.height, self.window.height),
        )
    }

    pub fn ratio(&self) -> AspectRatio {
        self.ratio
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn display_size(&self) -> Size {
        self.display
    }

    /// Crop window size in display pixels.
    pub fn window(&self) -> Size {
        self.window
    }

    pub fn offset(&self) -> (f64, f64) {
        self.offset
    }

    /// The axis along which dragging has no effect.
    pub fn locked_axis(&self) -> Axis {
        self.movable.other()
    }

    pub fn bounds(&self) -> OffsetBounds {
        let (min_x, max_x) = geometry::offset_range(self.display.width, self.window.width);
        let (min_y, max_y) = geometry::offset_range(self.display.height, self.window.height);
        OffsetBounds {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Moves the image by a display-space delta. Movement along the locked
    /// axis is ignored; the result is clamped so no empty space shows.
    pub fn drag(&mut self, dx: f64, dy: f64) -> (f64, f64) {
        let (x, y) = self.offset;
        let (x, y) = match self.movable {
            Axis::Horizontal => (x + dx, y),
            Axis::Vertical => (x, y + dy),
        };
        self.offset = self.clamped(x, y);
        self.offset
    }

    /// Switches the target ratio, keeping the image point that was at the
    /// center of the old window at the center of the new one where possible.
    pub fn set_ratio(&mut self, ratio: AspectRatio) {
        if ratio == self.ratio {
            return;
        }
        let visible = self.display_rect();
        let (cx, cy) = visible.center();
        self.ratio = ratio;
        self.refit();
        self.center_on(cx, cy);
        tracing::debug!(ratio = %ratio, offset_x = self.offset.0, offset_y = self.offset.1, "Crop ratio changed");
    }

    /// Visible window in display coordinates.
    pub fn display_rect(&self) -> Rect {
        Rect::new(
            -self.offset.0,
            -self.offset.1,
            self.window.width,
            self.window.height,
        )
    }

    /// The current selection in source-image pixels.
    pub fn apply(&self) -> CropSpec {
        let rect = self.display_rect();
        CropSpec {
            x: rect.x / self.scale,
            y: rect.y / self.scale,
            width: rect.width / self.scale,
            height: rect.height / self.scale,
            source_width: self.source.width as u32,
            source_height: self.source.height as u32,
            ratio: self.ratio,
        }
    }

    /// Cancelling still yields a usable crop: the centered default at the
    /// current ratio.
    pub fn cancel(&self) -> CropSpec {
        default_crop(
            self.source.width as u32,
            self.source.height as u32,
            self.ratio,
        )
    }
}

/// Centered crop of `ratio` over a `source_w` x `source_h` image.
pub fn default_crop(source_w: u32, source_h: u32, ratio: AspectRatio) -> CropSpec {
    let rect = geometry::centered_crop(Size::from_u32(source_w, source_h), ratio.value());
    CropSpec {
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
        source_width: source_w,
        source_height: source_h,
        ratio,
    }
}

/// Maps a crop made on one image onto another of `target_w` x `target_h`,
/// e.g. the remote result, which may come back at a different resolution.
pub fn rescale_crop(crop: &CropSpec, target_w: u32, target_h: u32) -> Rect {
    geometry::rescale_rect(
        Rect::new(crop.x, crop.y, crop.width, crop.height),
        Size::from_u32(crop.source_width, crop.source_height),
        Size::from_u32(target_w, target_h),
    )
}
