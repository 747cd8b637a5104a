// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detection filters — the per-frame strategies the filter stage can run, and
// the ephemeral geometry they report for overlay annotation.

pub mod corners;
pub mod edges;
pub mod lines;
pub mod stage;

use cvcamera_core::config::FilterVariant;
use cvcamera_core::error::Result;
use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;

use crate::frame::Frame;

pub use corners::RectangleCornerFilter;
pub use edges::TransparentEdgeFilter;
pub use lines::LineBoxFilter;

/// Per-frame inputs a filter may need besides the pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterContext {
    /// Scale the compositor draws the frame at; region-of-interest margins
    /// grow with it.
    pub render_scale: f32,
}

impl Default for FilterContext {
    fn default() -> Self {
        Self { render_scale: 1.0 }
    }
}

/// A processed frame plus whatever geometry the filter found in it.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutput {
    pub frame: Frame,
    pub geometry: Option<DetectedGeometry>,
}

impl FilterOutput {
    pub fn frame_only(frame: Frame) -> Self {
        Self {
            frame,
            geometry: None,
        }
    }
}

/// Strategy interface implemented by every detection filter.
///
/// A filter takes ownership of the input frame and returns a frame of the
/// same dimensions; the input is released on return either way.
pub trait FrameFilter: Send {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    fn apply(&self, frame: Frame, ctx: &FilterContext) -> FilterOutput;
}

/// Construct the filter selected by the configuration.
///
/// The parameters are validated first, so a bad sigma or threshold pair
/// surfaces as a `Config` error instead of a panic inside imageproc.
pub fn build_filter(variant: &FilterVariant) -> Result<Box<dyn FrameFilter>> {
    variant.validate()?;
    Ok(match variant {
        FilterVariant::TransparentEdges(p) => Box::new(TransparentEdgeFilter::new(p.clone())),
        FilterVariant::RectangleCorners(p) => Box::new(RectangleCornerFilter::new(p.clone())),
        FilterVariant::LineBoundingBox(p) => Box::new(LineBoxFilter::new(p.clone())),
    })
}

/// Points found by a filter, discarded after the frame is drawn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedGeometry {
    pub points: Vec<(f32, f32)>,
    pub bounds: Option<BoundingBox>,
    pub labels: Vec<CornerLabel>,
}

impl DetectedGeometry {
    pub fn from_points(points: Vec<(f32, f32)>) -> Self {
        let bounds = BoundingBox::from_points(&points);
        Self {
            points,
            bounds,
            labels: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Axis-aligned bounds in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingBox {
    /// Bounds of a point set, or `None` when it is empty.
    pub fn from_points(points: &[(f32, f32)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let init = Self {
            min_x: x0,
            min_y: y0,
            max_x: x0,
            max_y: y0,
        };
        Some(rest.iter().fold(init, |b, &(x, y)| Self {
            min_x: b.min_x.min(x),
            min_y: b.min_y.min(y),
            max_x: b.max_x.max(x),
            max_y: b.max_y.max(y),
        }))
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

/// A coordinate readout anchored at a point of the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerLabel {
    /// Where the label is drawn, in frame pixels.
    pub anchor: (f32, f32),
    pub x: u32,
    pub y: u32,
}

impl CornerLabel {
    pub fn text(&self) -> String {
        format!("({}, {})", self.x, self.y)
    }
}

/// Grayscale, blur, Canny: the front half shared by every filter.
pub(crate) fn blurred_edges(gray: &GrayImage, sigma: f32, low: f32, high: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, sigma);
    canny(&blurred, low, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_of_points() {
        let b = BoundingBox::from_points(&[(5.0, 9.0), (1.0, 12.0), (7.0, 3.0)]).unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (1.0, 3.0, 7.0, 12.0));
        assert_eq!(b.width(), 6.0);
        assert_eq!(b.height(), 9.0);
    }

    #[test]
    fn bounding_box_of_nothing() {
        assert!(BoundingBox::from_points(&[]).is_none());
        assert!(DetectedGeometry::from_points(Vec::new()).bounds.is_none());
    }

    #[test]
    fn label_text_format() {
        let label = CornerLabel {
            anchor: (0.0, 0.0),
            x: 12,
            y: 715,
        };
        assert_eq!(label.text(), "(12, 715)");
    }

    #[test]
    fn builder_selects_variant() {
        use cvcamera_core::config::{CornerParams, LineBoxParams};
        assert_eq!(build_filter(&FilterVariant::default()).unwrap().name(), "transparent_edges");
        assert_eq!(
            build_filter(&FilterVariant::RectangleCorners(CornerParams::default()))
                .unwrap()
                .name(),
            "rectangle_corners"
        );
        assert_eq!(
            build_filter(&FilterVariant::LineBoundingBox(LineBoxParams::default()))
                .unwrap()
                .name(),
            "line_bounding_box"
        );
    }

    #[test]
    fn builder_rejects_invalid_parameters() {
        use cvcamera_core::CvCameraError;
        use cvcamera_core::config::{CornerParams, EdgeMaskParams};
        let zero_sigma = FilterVariant::TransparentEdges(EdgeMaskParams {
            blur_sigma: 0.0,
            ..EdgeMaskParams::default()
        });
        assert!(matches!(build_filter(&zero_sigma), Err(CvCameraError::Config(_))));

        let inverted_canny = FilterVariant::RectangleCorners(CornerParams {
            canny_low: 200.0,
            canny_high: 100.0,
            ..CornerParams::default()
        });
        assert!(matches!(build_filter(&inverted_canny), Err(CvCameraError::Config(_))));
    }
}
