// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line bounding box — box the straight segments found inside a region of
// interest and label two of its corners with bottom-left-origin coordinates.

use cvcamera_core::config::{LineBoxParams, Margins};
use image::{GrayImage, Rgba};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracing::{debug, instrument};

use super::{
    BoundingBox, CornerLabel, DetectedGeometry, FilterContext, FilterOutput, FrameFilter,
    blurred_edges,
};
use crate::frame::Frame;

const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const MARKER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// A finite line segment in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: (f32, f32),
    pub end: (f32, f32),
}

impl Segment {
    pub fn length(&self) -> f32 {
        (self.end.0 - self.start.0).hypot(self.end.1 - self.start.1)
    }
}

/// Region of interest in frame pixels, edges inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionOfInterest {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RegionOfInterest {
    /// Inset the frame by `margin`, scaled by the current render scale.
    /// Returns `None` when the margins swallow the whole frame.
    pub fn inset(width: u32, height: u32, margin: Margins, scale: f32) -> Option<Self> {
        let roi = Self {
            left: margin.left * scale,
            top: margin.top * scale,
            right: width as f32 - 1.0 - margin.right * scale,
            bottom: height as f32 - 1.0 - margin.bottom * scale,
        };
        (roi.left <= roi.right && roi.top <= roi.bottom).then_some(roi)
    }

    pub fn contains(&self, (x, y): (f32, f32)) -> bool {
        self.left <= x && x <= self.right && self.top <= y && y <= self.bottom
    }
}

/// Boxes the line segments detected inside the region of interest.
///
/// ## Pipeline
///
/// 1. Grayscale, Gaussian blur, Canny
/// 2. Hough line detection, then segment extraction along each line
/// 3. Keep segment endpoints inside the region of interest
/// 4. Bounding box of the kept endpoints
/// 5. Draw the box, mark its bottom-left and top-right corners, and label them
pub struct LineBoxFilter {
    params: LineBoxParams,
}

impl LineBoxFilter {
    pub fn new(params: LineBoxParams) -> Self {
        Self { params }
    }

    /// Segments at least `min_line_length` long in an edge image.
    pub fn detect_segments(&self, edges: &GrayImage) -> Vec<Segment> {
        let options = LineDetectionOptions {
            vote_threshold: self.params.vote_threshold,
            suppression_radius: self.params.suppression_radius,
        };
        // imageproc votes in whole-degree angle steps.
        let lines = detect_lines(edges, options);

        let mut segments = Vec::new();
        for line in &lines {
            trace_segments(
                edges,
                line,
                self.params.min_line_length as f32,
                self.params.max_line_gap as f32,
                &mut segments,
            );
        }
        debug!(
            lines = lines.len(),
            segments = segments.len(),
            "Line segments extracted"
        );
        segments
    }

    /// Labels for the bottom-left and top-right corners of `bounds`.
    ///
    /// Label coordinates have their origin at the bottom-left corner of the
    /// box with Y growing upward, clamped to the configured maxima. The
    /// bottom-left label is therefore always `(0, 0)`.
    pub fn corner_labels(&self, bounds: &BoundingBox) -> [CornerLabel; 2] {
        let max_x = self.params.label_max_x;
        let max_y = self.params.label_max_y;
        let label = |x: f32, y: f32| CornerLabel {
            anchor: (x, y),
            x: clamp_label(x - bounds.min_x, max_x),
            y: clamp_label(bounds.max_y - y, max_y),
        };
        [
            label(bounds.min_x, bounds.max_y),
            label(bounds.max_x, bounds.min_y),
        ]
    }
}

impl FrameFilter for LineBoxFilter {
    fn name(&self) -> &'static str {
        "line_bounding_box"
    }

    #[instrument(skip_all, fields(width = frame.width(), height = frame.height(), scale = ctx.render_scale))]
    fn apply(&self, frame: Frame, ctx: &FilterContext) -> FilterOutput {
        let p = &self.params;
        let Some(roi) =
            RegionOfInterest::inset(frame.width(), frame.height(), p.roi_margin, ctx.render_scale)
        else {
            debug!("Region of interest is empty; frame left unannotated");
            return FilterOutput {
                frame,
                geometry: Some(DetectedGeometry::default()),
            };
        };

        let gray = frame.to_luma8();
        let edges = blurred_edges(&gray, p.blur_sigma, p.canny_low, p.canny_high);
        let endpoints: Vec<(f32, f32)> = self
            .detect_segments(&edges)
            .iter()
            .flat_map(|s| [s.start, s.end])
            .filter(|&pt| roi.contains(pt))
            .collect();

        let mut geometry = DetectedGeometry::from_points(endpoints);
        let Some(bounds) = geometry.bounds else {
            return FilterOutput {
                frame,
                geometry: Some(geometry),
            };
        };

        let mut rgba = frame.into_rgba8();
        let corners = [
            (bounds.min_x, bounds.min_y),
            (bounds.max_x, bounds.min_y),
            (bounds.max_x, bounds.max_y),
            (bounds.min_x, bounds.max_y),
        ];
        for i in 0..corners.len() {
            draw_line_segment_mut(&mut rgba, corners[i], corners[(i + 1) % corners.len()], BOX_COLOR);
        }

        let labels = self.corner_labels(&bounds);
        for label in &labels {
            let (x, y) = label.anchor;
            draw_filled_circle_mut(
                &mut rgba,
                (x.round() as i32, y.round() as i32),
                p.marker_radius,
                MARKER_COLOR,
            );
        }
        debug!(
            min_x = bounds.min_x,
            min_y = bounds.min_y,
            max_x = bounds.max_x,
            max_y = bounds.max_y,
            "Line bounding box drawn"
        );
        geometry.labels = labels.to_vec();

        FilterOutput {
            frame: Frame::from_rgba(rgba),
            geometry: Some(geometry),
        }
    }
}

/// Clamp a label coordinate into `0..=max`.
pub fn clamp_label(value: f32, max: u32) -> u32 {
    if !(value > 0.0) {
        0
    } else if value >= max as f32 {
        max
    } else {
        value.round() as u32
    }
}

/// Walk along a polar line and collect runs of edge pixels as segments.
///
/// Gaps up to `max_gap` pixels are bridged; runs shorter than `min_len` are
/// dropped.
fn trace_segments(
    edges: &GrayImage,
    line: &PolarLine,
    min_len: f32,
    max_gap: f32,
    out: &mut Vec<Segment>,
) {
    let (w, h) = edges.dimensions();
    let theta = (line.angle_in_degrees as f32).to_radians();
    let normal = (theta.cos(), theta.sin());
    let origin = (line.r * normal.0, line.r * normal.1);
    let dir = (-normal.1, normal.0);
    let at = |t: f32| (origin.0 + t * dir.0, origin.1 + t * dir.1);

    let hit = |(x, y): (f32, f32)| {
        [-1.0f32, 0.0, 1.0].iter().any(|d| {
            let px = (x + d * normal.0).round();
            let py = (y + d * normal.1).round();
            px >= 0.0
                && py >= 0.0
                && (px as u32) < w
                && (py as u32) < h
                && edges.get_pixel(px as u32, py as u32).0[0] != 0
        })
    };

    let mut close = |start: f32, last: f32| {
        if last - start >= min_len {
            out.push(Segment {
                start: at(start),
                end: at(last),
            });
        }
    };

    let reach = ((w as f32).powi(2) + (h as f32).powi(2)).sqrt();
    let mut run: Option<(f32, f32)> = None;
    let mut t = -reach;
    while t <= reach {
        if hit(at(t)) {
            run = match run {
                Some((start, last)) if t - last <= max_gap => Some((start, t)),
                Some((start, last)) => {
                    close(start, last);
                    Some((t, t))
                }
                None => Some((t, t)),
            };
        }
        t += 1.0;
    }
    if let Some((start, last)) = run {
        close(start, last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbaImage};

    fn filter() -> LineBoxFilter {
        LineBoxFilter::new(LineBoxParams::default())
    }

    #[test]
    fn label_clamps_to_range() {
        assert_eq!(clamp_label(-12.0, 955), 0);
        assert_eq!(clamp_label(0.0, 955), 0);
        assert_eq!(clamp_label(300.4, 955), 300);
        assert_eq!(clamp_label(1200.0, 955), 955);
        assert_eq!(clamp_label(716.0, 715), 715);
        assert_eq!(clamp_label(f32::NAN, 715), 0);
    }

    #[test]
    fn roi_margins_scale_with_render_scale() {
        let margin = Margins::uniform(10.0);
        let roi = RegionOfInterest::inset(200, 100, margin, 2.0).unwrap();
        assert_eq!((roi.left, roi.top, roi.right, roi.bottom), (20.0, 20.0, 179.0, 79.0));
        assert!(roi.contains((20.0, 79.0)));
        assert!(!roi.contains((19.9, 50.0)));
        assert!(RegionOfInterest::inset(30, 30, margin, 2.0).is_none());
    }

    #[test]
    fn labels_use_box_bottom_left_origin_and_flip_y() {
        let bounds = BoundingBox {
            min_x: 10.0,
            min_y: 20.0,
            max_x: 110.0,
            max_y: 70.0,
        };
        let [bottom_left, top_right] = filter().corner_labels(&bounds);
        assert_eq!((bottom_left.x, bottom_left.y), (0, 0));
        assert_eq!(bottom_left.anchor, (10.0, 70.0));
        assert_eq!((top_right.x, top_right.y), (100, 50));
        assert_eq!(top_right.anchor, (110.0, 20.0));
    }

    #[test]
    fn large_box_labels_clamp_to_maxima() {
        let bounds = BoundingBox {
            min_x: 50.0,
            min_y: 100.0,
            max_x: 1100.0,
            max_y: 880.0,
        };
        let [bottom_left, top_right] = filter().corner_labels(&bounds);
        assert_eq!((bottom_left.x, bottom_left.y), (0, 0));
        // 1050 and 780 exceed the maxima.
        assert_eq!((top_right.x, top_right.y), (955, 715));
    }

    #[test]
    fn horizontal_run_becomes_one_segment() {
        let mut edges = GrayImage::new(100, 50);
        for x in 10..70 {
            edges.put_pixel(x, 25, Luma([255]));
        }
        let line = PolarLine {
            r: 25.0,
            angle_in_degrees: 90,
        };
        let mut out = Vec::new();
        trace_segments(&edges, &line, 20.0, 5.0, &mut out);
        assert_eq!(out.len(), 1);
        let seg = out[0];
        let (xa, xb) = (seg.start.0.min(seg.end.0), seg.start.0.max(seg.end.0));
        assert!((xa - 10.0).abs() <= 1.0 && (xb - 69.0).abs() <= 1.0, "{seg:?}");
        assert!((seg.start.1 - 25.0).abs() < 0.5);
    }

    #[test]
    fn short_runs_and_wide_gaps_are_dropped() {
        let mut edges = GrayImage::new(100, 50);
        for x in (10..20).chain(60..70) {
            edges.put_pixel(x, 10, Luma([255]));
        }
        let line = PolarLine {
            r: 10.0,
            angle_in_degrees: 90,
        };
        let mut out = Vec::new();
        trace_segments(&edges, &line, 20.0, 5.0, &mut out);
        assert!(out.is_empty(), "{out:?}");
    }

    #[test]
    fn featureless_frame_is_unchanged() {
        let input = RgbaImage::from_pixel(120, 90, Rgba([90, 90, 90, 255]));
        let out = filter().apply(Frame::from_rgba(input.clone()), &FilterContext::default());
        assert!(out.geometry.expect("geometry").is_empty());
        assert_eq!(out.frame.into_rgba8(), input);
    }

    #[test]
    fn bright_rectangle_is_boxed() {
        let (w, h) = (200u32, 140u32);
        let input = RgbaImage::from_fn(w, h, |x, y| {
            if (60..140).contains(&x) && (40..100).contains(&y) {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let out = filter().apply(Frame::from_rgba(input.clone()), &FilterContext::default());
        let geometry = out.geometry.expect("geometry");
        let bounds = geometry.bounds.expect("bounds");

        let near = |a: f32, b: f32| (a - b).abs() <= 3.0;
        assert!(near(bounds.min_x, 60.0), "{bounds:?}");
        assert!(near(bounds.min_y, 40.0), "{bounds:?}");
        assert!(near(bounds.max_x, 139.0), "{bounds:?}");
        assert!(near(bounds.max_y, 99.0), "{bounds:?}");
        assert_eq!(geometry.labels.len(), 2);
        assert_eq!((geometry.labels[0].x, geometry.labels[0].y), (0, 0));
        let top_right = &geometry.labels[1];
        assert!(top_right.x.abs_diff(79) <= 6, "{top_right:?}");
        assert!(top_right.y.abs_diff(59) <= 6, "{top_right:?}");
        assert_ne!(out.frame.into_rgba8(), input);
    }
}
