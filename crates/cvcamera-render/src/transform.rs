// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Presentation transform — maps the (rotated, possibly mirrored) sensor frame
// onto the display canvas so that it fills the screen.
//
// Matrices are imageproc `Projection`s. `a * b` applies `b` first, so a
// canvas-style pre-multiply `m.preConcat(op)` is written `m * op`.

use cvcamera_core::error::{CvCameraError, Result};
use cvcamera_core::{CameraFacing, DisplayMetrics, Size};
use imageproc::geometric_transformations::Projection;
use tracing::debug;

/// The identity projection.
pub fn identity() -> Projection {
    Projection::translate(0.0, 0.0)
}

/// Scale by `(sx, sy)` about the pivot `(px, py)`.
pub fn scale_about(sx: f32, sy: f32, px: f32, py: f32) -> Projection {
    Projection::translate(px, py) * Projection::scale(sx, sy) * Projection::translate(-px, -py)
}

/// The fit-to-canvas matrix for one view geometry and camera facing.
#[derive(Debug, Clone, Copy)]
pub struct PresentationMatrix {
    pub matrix: Projection,
    /// Uniform fill scale, `max(display_w / view_h, display_h / view_w)`.
    pub scale: f32,
    pub rotation_degrees: f32,
    /// Front camera: mirrored left-to-right about the view centre.
    pub mirrored: bool,
    pub view: Size,
}

impl PresentationMatrix {
    /// Build the matrix for a view of `view` pixels on a `display` panel.
    ///
    /// The sensor image is rotated 90° relative to the view, hence the cross
    /// terms in the scale. Operation order is fixed: mirror (front only),
    /// translate to centre, rotate, translate back, scale about centre, each
    /// pre-multiplied onto the accumulated matrix.
    pub fn compute(view: Size, display: DisplayMetrics, facing: CameraFacing) -> Result<Self> {
        if view.is_empty() {
            return Err(CvCameraError::InvalidGeometry(format!(
                "view size {view} has a zero dimension"
            )));
        }
        let (w, h) = (view.width as f32, view.height as f32);
        let (hw, hh) = (w / 2.0, h / 2.0);

        let scale_a = display.width_px as f32 / h;
        let scale_b = display.height_px as f32 / w;
        let scale = scale_a.max(scale_b);
        if !(scale > 0.0) || !scale.is_finite() {
            return Err(CvCameraError::InvalidGeometry(format!(
                "display {}x{} gives no usable scale",
                display.width_px, display.height_px
            )));
        }
        let rotation = facing.sensor_rotation_degrees();

        let mut matrix = identity();
        if facing.is_front() {
            matrix = matrix * scale_about(-1.0, 1.0, hw, hh);
        }
        matrix = matrix * Projection::translate(hw, hh);
        matrix = matrix * Projection::rotate(rotation.to_radians());
        matrix = matrix * Projection::translate(-hw, -hh);
        matrix = matrix * scale_about(scale, scale, hw, hh);

        debug!(%view, %facing, scale, rotation, "Presentation matrix computed");
        Ok(Self {
            matrix,
            scale,
            rotation_degrees: rotation,
            mirrored: facing.is_front(),
            view,
        })
    }
}
