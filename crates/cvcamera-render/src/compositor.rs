// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compositor — rasterises frames into the cached bitmap and presents them on
// the display surface. This is the only code that locks a surface.

use cvcamera_core::Rect;
use cvcamera_core::error::{CvCameraError, Result};
use cvcamera_vision::{DetectedGeometry, Frame, PixelFormat};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::Projection;
use tracing::{debug, instrument, trace, warn};

use crate::canvas::{DisplaySurface, RasterCanvas};
use crate::fps::FpsMeter;

/// Where the FPS readout is drawn, in canvas pixels.
const FPS_ORIGIN: (f32, f32) = (20.0, 30.0);

/// Result of one deliver-and-draw pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// The composited frame was posted to the surface.
    Presented,
    /// The surface could not be locked or the post failed; the frame was
    /// dropped.
    SurfaceUnavailable,
    /// The frame could not be converted into the bitmap; nothing was drawn.
    ConversionFailed,
    /// No presentation matrix yet (layout has not run); the frame was dropped.
    GeometryPending,
    /// The stream is not running; the frame was dropped.
    Stopped,
}

/// ARGB buffer the compositor blits from, sized to the camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pixels: RgbaImage,
}

impl Bitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
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

    /// Copy a frame into the bitmap. The frame must match the bitmap size.
    pub fn copy_from(&mut self, frame: &Frame) -> Result<()> {
        if (frame.width(), frame.height()) != self.pixels.dimensions() {
            return Err(CvCameraError::FrameConversion(format!(
                "frame is {} but bitmap is {}x{}",
                frame.size(),
                self.pixels.width(),
                self.pixels.height()
            )));
        }
        match (frame.format(), frame.as_rgba8()) {
            (PixelFormat::Rgba8, Some(rgba)) => self.pixels.copy_from_slice(rgba.as_raw()),
            _ => {
                let gray = frame.to_luma8();
                for (dst, src) in self.pixels.pixels_mut().zip(gray.pixels()) {
                    let v = src.0[0];
                    *dst = Rgba([v, v, v, 255]);
                }
            }
        }
        Ok(())
    }
}

/// Holds a locked canvas. `post` hands it back and reports the result; if the
/// guard is dropped without posting (unwinding), drop posts instead, so the
/// surface is released on every exit path.
struct LockedCanvas<'a, S: DisplaySurface + ?Sized> {
    surface: &'a mut S,
    canvas: Option<RasterCanvas>,
}

impl<'a, S: DisplaySurface + ?Sized> LockedCanvas<'a, S> {
    fn acquire(surface: &'a mut S) -> Option<Self> {
        let canvas = surface.lock_canvas()?;
        Some(Self {
            surface,
            canvas: Some(canvas),
        })
    }

    fn canvas(&mut self) -> &mut RasterCanvas {
        self.canvas
            .as_mut()
            .unwrap_or_else(|| unreachable!("canvas is only taken by post or drop"))
    }

    fn post(mut self) -> Result<()> {
        match self.canvas.take() {
            Some(canvas) => self.surface.unlock_and_post(canvas),
            None => Ok(()),
        }
    }
}

impl<S: DisplaySurface + ?Sized> Drop for LockedCanvas<'_, S> {
    fn drop(&mut self) {
        if let Some(canvas) = self.canvas.take() {
            if let Err(e) = self.surface.unlock_and_post(canvas) {
                warn!(error = %e, "Post during unwind failed");
            }
        }
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws the current bitmap through the presentation matrix.
#[derive(Debug)]
pub struct Compositor {
    cache: Option<Bitmap>,
    annotations: Option<DetectedGeometry>,
    display_scale: f32,
    fps_meter: Option<FpsMeter>,
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            cache: None,
            annotations: None,
            display_scale: 1.0,
            fps_meter: None,
        }
    }

    /// Allocate the bitmap for frames of `width`x`height`.
    pub fn allocate_cache(&mut self, width: u32, height: u32) {
        debug!(width, height, "Allocating frame bitmap");
        self.cache = Some(Bitmap::new(width, height));
        self.annotations = None;
        if let Some(meter) = self.fps_meter.as_mut() {
            meter.set_resolution(width, height);
        }
    }

    pub fn release_cache(&mut self) {
        self.cache = None;
        self.annotations = None;
    }

    pub fn cached_bitmap(&self) -> Option<&Bitmap> {
        self.cache.as_ref()
    }

    pub fn display_scale(&self) -> f32 {
        self.display_scale
    }

    /// Scale the bitmap is blitted at before the presentation matrix.
    /// Non-positive or non-finite values fall back to 1.0.
    pub fn set_display_scale(&mut self, scale: f32) {
        self.display_scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
    }

    pub fn enable_fps_meter(&mut self) {
        if self.fps_meter.is_none() {
            let mut meter = FpsMeter::new();
            if let Some(bitmap) = &self.cache {
                meter.set_resolution(bitmap.width(), bitmap.height());
            }
            self.fps_meter = Some(meter);
        }
    }

    pub fn disable_fps_meter(&mut self) {
        self.fps_meter = None;
    }

    pub fn fps_meter(&self) -> Option<&FpsMeter> {
        self.fps_meter.as_ref()
    }

    /// Rasterise `frame` into the cached bitmap and remember its annotations.
    ///
    /// On failure the previous bitmap is kept and the caller should skip
    /// drawing this frame.
    pub fn update(&mut self, frame: &Frame, annotations: Option<DetectedGeometry>) -> Result<()> {
        let Some(bitmap) = self.cache.as_mut() else {
            return Err(CvCameraError::FrameConversion(
                "no bitmap allocated; stream not started".into(),
            ));
        };
        bitmap.copy_from(frame)?;
        self.annotations = annotations;
        Ok(())
    }

    /// Destination rectangle: the bitmap scaled by the display scale and
    /// centred on the canvas.
    pub fn destination(&self, canvas_w: u32, canvas_h: u32, bitmap_w: u32, bitmap_h: u32) -> Rect {
        let s = self.display_scale;
        let (cw, ch) = (canvas_w as f32, canvas_h as f32);
        let (sw, sh) = (s * bitmap_w as f32, s * bitmap_h as f32);
        let left = (cw - sw) / 2.0;
        let top = (ch - sh) / 2.0;
        Rect::new(
            left as i32,
            top as i32,
            (left + sw) as i32,
            (top + sh) as i32,
        )
    }

    /// Clear the surface, draw the bitmap through `matrix`, overlay the
    /// annotations and FPS readout, and post.
    #[instrument(skip_all)]
    pub fn present<S: DisplaySurface + ?Sized>(
        &mut self,
        surface: &mut S,
        matrix: &Projection,
    ) -> DrawOutcome {
        let Some(bitmap) = self.cache.as_ref() else {
            return DrawOutcome::Stopped;
        };
        let Some(mut locked) = LockedCanvas::acquire(surface) else {
            trace!("Surface lock unavailable; frame dropped");
            return DrawOutcome::SurfaceUnavailable;
        };

        let canvas = locked.canvas();
        canvas.clear();
        let depth = canvas.save();
        canvas.set_matrix(*matrix);
        let dst = self.destination(canvas.width(), canvas.height(), bitmap.width(), bitmap.height());
        canvas.draw_bitmap(bitmap.pixels(), dst);

        if let Some(geometry) = &self.annotations {
            // Annotations are in frame pixels; place them through the same
            // bitmap-to-canvas mapping.
            let sx = dst.width() as f32 / bitmap.width().max(1) as f32;
            let sy = dst.height() as f32 / bitmap.height().max(1) as f32;
            for label in &geometry.labels {
                let (x, y) = label.anchor;
                canvas.draw_text(label.text(), dst.left as f32 + x * sx, dst.top as f32 + y * sy);
            }
        }
        canvas.restore_to_count(depth);

        if let Some(meter) = self.fps_meter.as_mut() {
            meter.measure();
            if let Some(text) = meter.text() {
                canvas.draw_text(text, FPS_ORIGIN.0, FPS_ORIGIN.1);
            }
        }

        match locked.post() {
            Ok(()) => DrawOutcome::Presented,
            Err(e) => {
                warn!(error = %e, "Surface post failed; frame dropped");
                DrawOutcome::SurfaceUnavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RasterSurface;
    use crate::transform::identity;
    use image::{GrayImage, Luma};

    /// Locks fine but fails every post, like a native window whose buffer
    /// cannot be acquired.
    struct FailingPost {
        posts: usize,
    }

    impl DisplaySurface for FailingPost {
        fn lock_canvas(&mut self) -> Option<RasterCanvas> {
            Some(RasterCanvas::new(10, 10))
        }

        fn unlock_and_post(&mut self, _canvas: RasterCanvas) -> Result<()> {
            self.posts += 1;
            Err(CvCameraError::Bridge("window lock failed".into()))
        }
    }

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn red_frame(w: u32, h: u32) -> Frame {
        Frame::from_rgba(RgbaImage::from_pixel(w, h, RED))
    }

    #[test]
    fn destination_is_centred_and_scaled() {
        let mut c = Compositor::new();
        c.set_display_scale(2.0);
        assert_eq!(c.destination(100, 80, 20, 10), Rect::new(30, 30, 70, 50));
        c.set_display_scale(0.0);
        assert_eq!(c.display_scale(), 1.0);
    }

    #[test]
    fn size_mismatch_is_conversion_error() {
        let mut c = Compositor::new();
        c.allocate_cache(8, 8);
        let err = c.update(&red_frame(4, 4), None).unwrap_err();
        assert!(matches!(err, CvCameraError::FrameConversion(_)));
    }

    #[test]
    fn update_without_cache_fails() {
        let mut c = Compositor::new();
        assert!(c.update(&red_frame(4, 4), None).is_err());
    }

    #[test]
    fn gray_frames_expand_into_bitmap() {
        let mut c = Compositor::new();
        c.allocate_cache(2, 2);
        c.update(&Frame::from_gray(GrayImage::from_pixel(2, 2, Luma([255]))), None)
            .unwrap();
        assert_eq!(c.cached_bitmap().unwrap().pixels().get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn present_draws_centred_bitmap() {
        let mut c = Compositor::new();
        c.allocate_cache(4, 4);
        c.update(&red_frame(4, 4), None).unwrap();
        let mut surface = RasterSurface::new(10, 10);

        assert_eq!(c.present(&mut surface, &identity()), DrawOutcome::Presented);
        let front = surface.front().unwrap();
        assert_eq!(front.get_pixel(3, 3), &RED);
        assert_eq!(front.get_pixel(6, 6), &RED);
        assert_eq!(front.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert!(!surface.is_locked());
    }

    #[test]
    fn lock_failure_drops_frame() {
        let mut c = Compositor::new();
        c.allocate_cache(4, 4);
        c.update(&red_frame(4, 4), None).unwrap();
        let mut surface = RasterSurface::new(10, 10);
        surface.set_available(false);
        assert_eq!(c.present(&mut surface, &identity()), DrawOutcome::SurfaceUnavailable);
        assert_eq!(surface.presented_count(), 0);
    }

    #[test]
    fn failed_post_is_reported_as_unavailable() {
        let mut c = Compositor::new();
        c.allocate_cache(4, 4);
        c.update(&red_frame(4, 4), None).unwrap();
        let mut surface = FailingPost { posts: 0 };
        assert_eq!(c.present(&mut surface, &identity()), DrawOutcome::SurfaceUnavailable);
        assert_eq!(surface.posts, 1);
    }

    #[test]
    fn labels_are_drawn_as_text() {
        use cvcamera_vision::filter::CornerLabel;
        let mut c = Compositor::new();
        c.allocate_cache(4, 4);
        let geometry = DetectedGeometry {
            labels: vec![CornerLabel {
                anchor: (1.0, 2.0),
                x: 5,
                y: 6,
            }],
            ..DetectedGeometry::default()
        };
        c.update(&red_frame(4, 4), Some(geometry)).unwrap();
        let mut surface = RasterSurface::new(10, 10);
        c.present(&mut surface, &identity());
        let runs = surface.front_text();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "(5, 6)");
        assert_eq!((runs[0].x, runs[0].y), (4.0, 5.0));
    }
}
