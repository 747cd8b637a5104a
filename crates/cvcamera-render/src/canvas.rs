// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Software canvas and the display-surface abstraction.
//
// Every surface hands out a `RasterCanvas` on lock and receives it back on
// unlock-and-post; what "presenting" means (keeping it in memory, copying it
// into a native window buffer) is the surface's business. Canvases are
// recycled between frames rather than reallocated.

use cvcamera_core::Rect;
use cvcamera_core::error::Result;
use image::imageops::overlay;
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::debug;

use crate::transform::identity;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Text drawn onto a canvas, already mapped into canvas pixels.
///
/// Glyph rendering belongs to the platform; the raster canvas keeps the runs
/// so a surface can render or inspect them.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// An RGBA drawing target with a current matrix and a save stack.
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    pixels: RgbaImage,
    /// Warp target for `draw_bitmap`, kept to avoid a per-draw allocation.
    layer: RgbaImage,
    matrix: Projection,
    saved: Vec<Projection>,
    text: Vec<TextRun>,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, TRANSPARENT),
            layer: RgbaImage::new(width, height),
            matrix: identity(),
            saved: Vec::new(),
            text: Vec::new(),
        }
    }

    /// Reset the matrix and save stack so a posted canvas can be handed out
    /// again. Pixels are left for the next `clear`.
    pub fn reset_state(&mut self) {
        self.matrix = identity();
        self.saved.clear();
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn text_runs(&self) -> &[TextRun] {
        &self.text
    }

    pub fn matrix(&self) -> Projection {
        self.matrix
    }

    /// Reset every pixel to transparent and drop any text.
    pub fn clear(&mut self) {
        for p in self.pixels.pixels_mut() {
            *p = TRANSPARENT;
        }
        self.text.clear();
    }

    /// Push the current matrix; returns the depth to restore to.
    pub fn save(&mut self) -> usize {
        self.saved.push(self.matrix);
        self.saved.len() - 1
    }

    /// Pop saved states until the stack depth is `count`.
    pub fn restore_to_count(&mut self, count: usize) {
        while self.saved.len() > count {
            if let Some(matrix) = self.saved.pop() {
                self.matrix = matrix;
            }
        }
    }

    pub fn set_matrix(&mut self, matrix: Projection) {
        self.matrix = matrix;
    }

    /// Draw the whole of `bitmap` into `dst` (canvas coordinates before the
    /// current matrix), blending over what is already there.
    pub fn draw_bitmap(&mut self, bitmap: &RgbaImage, dst: Rect) {
        let (bw, bh) = bitmap.dimensions();
        if dst.is_empty() || bw == 0 || bh == 0 {
            debug!(?dst, "Skipping empty bitmap draw");
            return;
        }

        let forward = self.matrix
            * Projection::translate(dst.left as f32, dst.top as f32)
            * Projection::scale(
                dst.width() as f32 / bw as f32,
                dst.height() as f32 / bh as f32,
            );

        // warp_into writes every layer pixel, so the reused layer needs no clear.
        warp_into(bitmap, &forward, Interpolation::Nearest, TRANSPARENT, &mut self.layer);
        overlay(&mut self.pixels, &self.layer, 0, 0);
    }

    /// Record `text` at `(x, y)` mapped through the current matrix.
    pub fn draw_text(&mut self, text: impl Into<String>, x: f32, y: f32) {
        let (x, y) = self.matrix * (x, y);
        self.text.push(TextRun {
            text: text.into(),
            x,
            y,
        });
    }
}

/// Output surface the compositor draws onto.
pub trait DisplaySurface {
    /// Acquire a canvas for the next frame, or `None` if the surface is not
    /// available right now.
    fn lock_canvas(&mut self) -> Option<RasterCanvas>;

    /// Release the lock and present the canvas contents. An error means the
    /// frame never reached the screen.
    fn unlock_and_post(&mut self, canvas: RasterCanvas) -> Result<()>;
}

/// In-memory surface that keeps the last posted canvas.
///
/// Double-buffered: the canvas displaced from the front is handed out on the
/// next lock, so steady-state frames allocate nothing.
#[derive(Debug)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    available: bool,
    front: Option<RasterCanvas>,
    back: Option<RasterCanvas>,
    locked: bool,
    presented: u64,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            available: true,
            front: None,
            back: None,
            locked: false,
            presented: 0,
        }
    }

    /// Make subsequent locks fail (or succeed again).
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Last presented image, if anything has been posted.
    pub fn front(&self) -> Option<&RgbaImage> {
        self.front.as_ref().map(RasterCanvas::pixels)
    }

    pub fn front_text(&self) -> &[TextRun] {
        match &self.front {
            Some(canvas) => canvas.text_runs(),
            None => &[],
        }
    }

    pub fn presented_count(&self) -> u64 {
        self.presented
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl DisplaySurface for RasterSurface {
    fn lock_canvas(&mut self) -> Option<RasterCanvas> {
        if !self.available || self.locked || self.width == 0 || self.height == 0 {
            return None;
        }
        self.locked = true;
        let canvas = match self.back.take() {
            Some(mut canvas) => {
                canvas.reset_state();
                canvas
            }
            None => RasterCanvas::new(self.width, self.height),
        };
        Some(canvas)
    }

    fn unlock_and_post(&mut self, canvas: RasterCanvas) -> Result<()> {
        self.back = self.front.replace(canvas);
        self.locked = false;
        self.presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn identity_draw_copies_into_rect() {
        let mut canvas = RasterCanvas::new(10, 10);
        let bitmap = RgbaImage::from_pixel(4, 4, RED);
        canvas.draw_bitmap(&bitmap, Rect::new(2, 3, 6, 7));
        assert_eq!(canvas.pixels().get_pixel(2, 3), &RED);
        assert_eq!(canvas.pixels().get_pixel(5, 6), &RED);
        assert_eq!(canvas.pixels().get_pixel(1, 3), &TRANSPARENT);
        assert_eq!(canvas.pixels().get_pixel(6, 6), &TRANSPARENT);
    }

    #[test]
    fn draw_bitmap_scales_to_destination() {
        let mut canvas = RasterCanvas::new(20, 20);
        let bitmap = RgbaImage::from_pixel(2, 2, RED);
        canvas.draw_bitmap(&bitmap, Rect::new(0, 0, 10, 10));
        assert_eq!(canvas.pixels().get_pixel(1, 1), &RED);
        assert_eq!(canvas.pixels().get_pixel(5, 5), &RED);
        assert_eq!(canvas.pixels().get_pixel(12, 12), &TRANSPARENT);
    }

    #[test]
    fn matrix_applies_to_bitmap_and_text() {
        let mut canvas = RasterCanvas::new(20, 20);
        let depth = canvas.save();
        canvas.set_matrix(Projection::translate(10.0, 0.0));
        canvas.draw_bitmap(&RgbaImage::from_pixel(2, 2, RED), Rect::new(0, 0, 2, 2));
        canvas.draw_text("hi", 1.0, 2.0);
        canvas.restore_to_count(depth);

        assert_eq!(canvas.pixels().get_pixel(10, 0), &RED);
        assert_eq!(canvas.pixels().get_pixel(0, 0), &TRANSPARENT);
        assert_eq!(canvas.text_runs()[0].x, 11.0);
        assert_eq!(canvas.matrix() * (1.0, 2.0), (1.0, 2.0));
    }

    #[test]
    fn clear_resets_pixels_and_text() {
        let mut canvas = RasterCanvas::new(4, 4);
        canvas.draw_bitmap(&RgbaImage::from_pixel(4, 4, RED), Rect::new(0, 0, 4, 4));
        canvas.draw_text("x", 0.0, 0.0);
        canvas.clear();
        assert!(canvas.pixels().pixels().all(|p| *p == TRANSPARENT));
        assert!(canvas.text_runs().is_empty());
    }

    #[test]
    fn surface_lock_is_exclusive_and_post_presents() {
        let mut surface = RasterSurface::new(8, 8);
        let canvas = surface.lock_canvas().expect("lock");
        assert!(surface.lock_canvas().is_none());
        surface.unlock_and_post(canvas).unwrap();
        assert_eq!(surface.presented_count(), 1);
        assert!(surface.front().is_some());

        surface.set_available(false);
        assert!(surface.lock_canvas().is_none());
    }

    #[test]
    fn surface_recycles_canvases() {
        let mut surface = RasterSurface::new(8, 8);
        let first = surface.lock_canvas().unwrap();
        let first_ptr = first.pixels().as_ptr();
        surface.unlock_and_post(first).unwrap();

        let mut second = surface.lock_canvas().unwrap();
        second.set_matrix(Projection::translate(3.0, 0.0));
        second.save();
        surface.unlock_and_post(second).unwrap();

        // The first canvas comes back with its state reset.
        let third = surface.lock_canvas().unwrap();
        assert_eq!(third.pixels().as_ptr(), first_ptr);
        assert_eq!(third.matrix() * (0.0, 0.0), (0.0, 0.0));
        assert_eq!((third.width(), third.height()), (8, 8));
    }
}
