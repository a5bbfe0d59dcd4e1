use tracing::debug;

use crate::consts::{VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use crate::error::{Result, SimError};
use crate::state::MicroscopeState;

/// The region of a calibration image that is sampled for one frame.
///
/// Coordinates are continuous source-pixel coordinates with pixel `(0, 0)`
/// covering `[0, 1) x [0, 1)`. The rectangle is `width * scale` by
/// `height * scale` source pixels, centred on `(center_x, center_y)` and
/// rotated by `rotation` radians.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub center_x: f64,
    pub center_y: f64,
    /// Output pixels.
    pub width: usize,
    pub height: usize,
    /// Source pixels per output pixel.
    pub scale: f64,
    pub rotation: f64,
    pub source_width: usize,
    pub source_height: usize,
}

/// Axis-aligned bounding box in source coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Viewport {
    /// Top-left corner of the unrotated crop rectangle.
    pub fn origin(&self) -> (f64, f64) {
        (
            self.center_x - self.width as f64 * self.scale / 2.0,
            self.center_y - self.height as f64 * self.scale / 2.0,
        )
    }

    /// Fractional part of the origin: the sub-pixel beam shift.
    pub fn subpixel_offset(&self) -> (f64, f64) {
        let (x, y) = self.origin();
        (x - x.floor(), y - y.floor())
    }

    /// Crop size in source pixels.
    pub fn source_extent(&self) -> (f64, f64) {
        (
            self.width as f64 * self.scale,
            self.height as f64 * self.scale,
        )
    }

    /// Source position `(y, x)` sampled for output pixel `(row, col)`, in
    /// array-index coordinates (pixel centres on integers).
    pub fn source_position(&self, row: usize, col: usize) -> (f64, f64) {
        let (sin, cos) = self.rotation.sin_cos();
        let u = (col as f64 + 0.5 - self.width as f64 / 2.0) * self.scale;
        let v = (row as f64 + 0.5 - self.height as f64 / 2.0) * self.scale;
        let x = self.center_x + u * cos - v * sin - 0.5;
        let y = self.center_y + u * sin + v * cos - 0.5;
        (y, x)
    }

    /// Corners of the rotated rectangle as `(x, y)`, clockwise from top-left.
    pub fn corners(&self) -> [(f64, f64); 4] {
        let (sin, cos) = self.rotation.sin_cos();
        let hw = self.width as f64 * self.scale / 2.0;
        let hh = self.height as f64 * self.scale / 2.0;
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(u, v)| {
            (
                self.center_x + u * cos - v * sin,
                self.center_y + u * sin + v * cos,
            )
        })
    }

    pub fn bounds(&self) -> SourceBounds {
        let corners = self.corners();
        let mut b = SourceBounds {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            b.min_x = b.min_x.min(x);
            b.min_y = b.min_y.min(y);
            b.max_x = b.max_x.max(x);
            b.max_y = b.max_y.max(y);
        }
        b
    }

    /// Whether the rectangle lies inside the source raster, allowing `tolerance`.
    pub fn is_within_source(&self, tolerance: f64) -> bool {
        let b = self.bounds();
        b.min_x >= -tolerance
            && b.min_y >= -tolerance
            && b.max_x <= self.source_width as f64 + tolerance
            && b.max_y <= self.source_height as f64 + tolerance
    }
}

/// Maps magnification, pan and scan rotation onto a source sampling grid.
#[derive(Clone, Debug)]
pub struct ViewportResolver {
    width: usize,
    height: usize,
}

impl Default for ViewportResolver {
    fn default() -> Self {
        Self::new(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
    }
}

impl ViewportResolver {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Resolve the viewport for `state` on a source of `source_size`
    /// (width, height) captured at `effective_magnification`.
    ///
    /// `image_shift` is an additional displacement in source pixels (beam
    /// tilt through a misaligned aperture). The rectangle is clamped into the
    /// source; the clamped position is used for this frame only and never
    /// fed back into the state.
    pub fn resolve(
        &self,
        state: &MicroscopeState,
        effective_magnification: f64,
        source_size: (usize, usize),
        image_shift: (f64, f64),
    ) -> Result<Viewport> {
        let (src_w, src_h) = source_size;
        if src_w == 0 || src_h == 0 {
            return Err(SimError::InvalidParameter(format!(
                "empty source image {src_w}x{src_h}"
            )));
        }
        for (name, value) in [
            ("magnification", state.magnification),
            ("effective magnification", effective_magnification),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidParameter(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let (sin, cos) = state.scan_rotation.sin_cos();
        let (sin, cos) = (sin.abs(), cos.abs());
        let hw = self.width as f64 / 2.0;
        let hh = self.height as f64 / 2.0;
        // Half extents of the rotated rectangle's bounding box per unit scale.
        let unit_x = hw * cos + hh * sin;
        let unit_y = hw * sin + hh * cos;

        let requested = effective_magnification / state.magnification;
        let fit = (src_w as f64 / 2.0 / unit_x).min(src_h as f64 / 2.0 / unit_y);
        let scale = if requested > fit {
            debug!(
                requested_scale = requested,
                fitted_scale = fit,
                "Field of view larger than calibration image, zoom limited"
            );
            fit
        } else {
            requested
        };

        let extent_x = scale * unit_x;
        let extent_y = scale * unit_y;
        let center_x = clamp_center(
            src_w as f64 / 2.0 + state.pan_x + image_shift.0,
            extent_x,
            src_w as f64,
        );
        let center_y = clamp_center(
            src_h as f64 / 2.0 + state.pan_y + image_shift.1,
            extent_y,
            src_h as f64,
        );

        Ok(Viewport {
            center_x,
            center_y,
            width: self.width,
            height: self.height,
            scale,
            rotation: state.scan_rotation,
            source_width: src_w,
            source_height: src_h,
        })
    }
}

fn clamp_center(center: f64, half_extent: f64, size: f64) -> f64 {
    let lo = half_extent.min(size / 2.0);
    let hi = (size - half_extent).max(lo);
    if center.is_nan() {
        return size / 2.0;
    }
    center.clamp(lo, hi)
}
