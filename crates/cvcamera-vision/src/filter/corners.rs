// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rectangle corners — find bright quadrilaterals and mark their corners on
// the input frame.

use cvcamera_core::config::CornerParams;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::drawing::draw_filled_circle_mut;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tracing::{debug, instrument};

use super::{DetectedGeometry, FilterContext, FilterOutput, FrameFilter, blurred_edges};
use crate::frame::Frame;

const MARKER_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Vertices closer than this are merged after polygon approximation.
const MIN_VERTEX_GAP: f32 = 2.0;

/// Turns flatter than this (sine of the angle) are treated as straight.
const MIN_TURN_SINE: f32 = 0.2;

/// Marks the corners of near-white quadrilaterals.
///
/// ## Pipeline
///
/// 1. Threshold the frame in HSV space to a near-white mask
/// 2. Blur the mask and run Canny on it
/// 3. Trace external contours
/// 4. Approximate each contour as a polygon (tolerance relative to perimeter)
/// 5. Keep polygons with exactly four vertices
/// 6. Draw a marker at every kept corner on the unmodified input frame
///
/// Canny rounds the corners of small shapes, so cards of roughly 60 px a
/// side or less can approximate to more than four vertices and are skipped.
/// Corners land within a few pixels of the true card corners.
pub struct RectangleCornerFilter {
    params: CornerParams,
}

impl RectangleCornerFilter {
    pub fn new(params: CornerParams) -> Self {
        Self { params }
    }

    /// Corners of every bright quadrilateral in the frame.
    pub fn detect(&self, rgba: &RgbaImage) -> Vec<(f32, f32)> {
        let p = &self.params;
        let mask = hsv_mask(rgba, p.hsv_lower, p.hsv_upper);
        let edges = blurred_edges(&mask, p.blur_sigma, p.canny_low, p.canny_high);

        let contours = find_contours::<i32>(&edges);
        let external = contours
            .iter()
            .filter(|c| c.parent.is_none() && c.border_type == BorderType::Outer);

        let mut corners = Vec::new();
        let mut considered = 0usize;
        for contour in external {
            considered += 1;
            if let Some(quad) = quad_corners(&contour.points, p.polygon_epsilon) {
                corners.extend_from_slice(&quad);
            }
        }
        debug!(
            contours = contours.len(),
            external = considered,
            corners = corners.len(),
            "Quadrilateral search complete"
        );
        corners
    }
}

impl FrameFilter for RectangleCornerFilter {
    fn name(&self) -> &'static str {
        "rectangle_corners"
    }

    #[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    fn apply(&self, frame: Frame, _ctx: &FilterContext) -> FilterOutput {
        let mut rgba = frame.into_rgba8();
        let corners = self.detect(&rgba);

        for &(x, y) in &corners {
            draw_filled_circle_mut(
                &mut rgba,
                (x.round() as i32, y.round() as i32),
                self.params.marker_radius,
                MARKER_COLOR,
            );
        }

        FilterOutput {
            frame: Frame::from_rgba(rgba),
            geometry: Some(DetectedGeometry::from_points(corners)),
        }
    }
}

/// Binary mask of pixels whose HSV value lies inside `[lower, upper]`.
pub fn hsv_mask(rgba: &RgbaImage, lower: [u8; 3], upper: [u8; 3]) -> GrayImage {
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, _]) = *rgba.get_pixel(x, y);
        let hsv = rgb_to_hsv(r, g, b);
        let inside = (0..3).all(|i| lower[i] <= hsv[i] && hsv[i] <= upper[i]);
        Luma([if inside { 255 } else { 0 }])
    })
}

/// 8-bit HSV with hue halved into 0..=180.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };
    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round() as u8,
        max as u8,
    ]
}

/// Approximate a closed contour and return its corners if it is a quadrilateral.
fn quad_corners(points: &[Point<i32>], epsilon_fraction: f64) -> Option<[(f32, f32); 4]> {
    if points.len() < 4 {
        return None;
    }
    let perimeter = arc_length(points, true);
    let epsilon = epsilon_fraction * perimeter;
    if !(epsilon > 0.0) {
        return None;
    }

    let approx = approximate_polygon_dp(points, epsilon, true);
    let vertices = simplify_closed(
        approx
            .iter()
            .map(|p| (p.x as f32, p.y as f32))
            .collect(),
    );
    match vertices.as_slice() {
        [a, b, c, d] => Some([*a, *b, *c, *d]),
        _ => None,
    }
}

/// Merge near-duplicate vertices and drop vertices on straight runs.
fn simplify_closed(mut poly: Vec<(f32, f32)>) -> Vec<(f32, f32)> {
    poly.dedup_by(|a, b| distance(*a, *b) < MIN_VERTEX_GAP);
    while poly.len() > 1 && distance(poly[0], poly[poly.len() - 1]) < MIN_VERTEX_GAP {
        poly.pop();
    }

    let mut i = 0;
    while poly.len() > 3 && i < poly.len() {
        let n = poly.len();
        let prev = poly[(i + n - 1) % n];
        let cur = poly[i];
        let next = poly[(i + 1) % n];
        if turn_sine(prev, cur, next) < MIN_TURN_SINE {
            poly.remove(i);
            i = 0;
        } else {
            i += 1;
        }
    }
    poly
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// |sin| of the direction change at `cur`.
fn turn_sine(prev: (f32, f32), cur: (f32, f32), next: (f32, f32)) -> f32 {
    let u = (cur.0 - prev.0, cur.1 - prev.1);
    let v = (next.0 - cur.0, next.1 - cur.1);
    let norms = (u.0.hypot(u.1)) * (v.0.hypot(v.1));
    if norms == 0.0 {
        return 0.0;
    }
    ((u.0 * v.1 - u.1 * v.0) / norms).abs()
}
