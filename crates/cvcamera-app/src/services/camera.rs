// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic camera: a white card sliding across a dark gradient, so every
// detection filter has an outline to find.

use cvcamera_core::Size;
use cvcamera_core::error::{CvCameraError, Result};
use cvcamera_render::FrameSource;
use cvcamera_vision::Frame;
use image::{Rgba, RgbaImage};
use tracing::debug;

const CARD: Rgba<u8> = Rgba([245, 245, 240, 255]);
/// Horizontal card movement per frame, in pixels.
const STEP_PX: u32 = 4;

pub struct SyntheticCamera {
    size: Size,
    limit: Option<u64>,
    delivered: u64,
    open: bool,
}

impl SyntheticCamera {
    /// A camera of `size` frames that stops after `limit` frames, if given.
    pub fn new(size: Size, limit: Option<u64>) -> Self {
        Self {
            size,
            limit,
            delivered: 0,
            open: false,
        }
    }

    /// Render frame number `index`.
    pub fn render(&self, index: u64) -> Frame {
        let Size { width, height } = self.size;
        let card_w = (width / 3).max(1);
        let card_h = (height / 2).max(1);
        let travel = u64::from(width.saturating_sub(card_w).max(1));
        let left = ((index * u64::from(STEP_PX)) % travel) as u32;
        let top = (height - card_h) / 2;

        Frame::from_rgba(RgbaImage::from_fn(width, height, |x, y| {
            if (left..left + card_w).contains(&x) && (top..top + card_h).contains(&y) {
                CARD
            } else {
                let shade = (40 + 60 * y / height.max(1)) as u8;
                Rgba([shade / 2, shade / 2, shade, 255])
            }
        }))
    }
}

impl FrameSource for SyntheticCamera {
    fn open(&mut self) -> Result<Size> {
        if self.size.is_empty() {
            return Err(CvCameraError::Config(format!(
                "synthetic camera size {} has a zero dimension",
                self.size
            )));
        }
        self.open = true;
        self.delivered = 0;
        debug!(size = %self.size, "Synthetic camera opened");
        Ok(self.size)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if !self.open || self.limit.is_some_and(|limit| self.delivered >= limit) {
            return None;
        }
        let frame = self.render(self.delivered);
        self.delivered += 1;
        Some(frame)
    }

    fn close(&mut self) {
        self.open = false;
    }
}
