// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transparent edge mask — Canny edges become see-through holes in the frame.

use cvcamera_core::config::EdgeMaskParams;
use image::imageops::invert;
use image::RgbaImage;
use tracing::{debug, instrument};

use super::{FilterContext, FilterOutput, FrameFilter, blurred_edges};
use crate::frame::Frame;

/// Copies the frame through an inverted edge mask onto a transparent canvas.
///
/// ## Pipeline
///
/// 1. Convert to grayscale
/// 2. Gaussian blur (3x3, auto sigma)
/// 3. Canny edge detection
/// 4. Invert the edge mask so non-edge pixels are set
/// 5. Copy the color frame into a fully transparent canvas through the mask
///
/// A frame without internal edges comes out identical to the input.
pub struct TransparentEdgeFilter {
    params: EdgeMaskParams,
}

impl TransparentEdgeFilter {
    pub fn new(params: EdgeMaskParams) -> Self {
        Self { params }
    }
}

impl FrameFilter for TransparentEdgeFilter {
    fn name(&self) -> &'static str {
        "transparent_edges"
    }

    #[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    fn apply(&self, frame: Frame, _ctx: &FilterContext) -> FilterOutput {
        let gray = frame.to_luma8();
        let mut keep = blurred_edges(
            &gray,
            self.params.blur_sigma,
            self.params.canny_low,
            self.params.canny_high,
        );
        invert(&mut keep);

        let source = frame.into_rgba8();
        let mut output = RgbaImage::new(source.width(), source.height());
        let mut holes = 0usize;
        for ((dst, src), mask) in output.pixels_mut().zip(source.pixels()).zip(keep.pixels()) {
            if mask.0[0] != 0 {
                *dst = *src;
            } else {
                holes += 1;
            }
        }
        debug!(holes, "Edge mask applied");

        FilterOutput::frame_only(Frame::from_rgba(output))
    }
}
