// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Camera view — the unit the platform drives. It owns the frame listener, the
// filter stage and the compositor, and reads the presentation matrix from a
// layout handle that layout/measure callbacks may update from another thread.

use std::sync::{Arc, PoisonError, RwLock};

use cvcamera_core::config::{CameraConfig, FilterVariant, RefreshPolicy};
use cvcamera_core::error::Result;
use cvcamera_core::{CameraFacing, DisplayMetrics, Size};
use cvcamera_vision::{FilterContext, FilterOutcome, FilterStage, Frame};
use tracing::{debug, info, instrument, warn};

use crate::canvas::DisplaySurface;
use crate::compositor::{Compositor, DrawOutcome};
use crate::transform::{PresentationMatrix, identity};

// ---------------------------------------------------------------------------
// Frame listener
// ---------------------------------------------------------------------------

/// Per-frame hook run before the filter stage.
pub trait CameraFrameListener: Send {
    fn on_camera_view_started(&mut self, _width: u32, _height: u32) {}

    fn on_camera_view_stopped(&mut self) {}

    /// Take a frame and return the frame to display.
    fn on_camera_frame(&mut self, frame: Frame, facing: CameraFacing) -> Frame;
}

/// Default listener: mirrors front-camera frames so the preview reads like a
/// mirror; back-camera frames pass through.
#[derive(Debug, Default)]
pub struct PreviewListener;

impl CameraFrameListener for PreviewListener {
    fn on_camera_view_started(&mut self, width: u32, height: u32) {
        debug!(width, height, "Preview listener started");
    }

    fn on_camera_frame(&mut self, frame: Frame, facing: CameraFacing) -> Frame {
        if facing.is_front() {
            frame.flip_horizontal()
        } else {
            frame
        }
    }
}

// ---------------------------------------------------------------------------
// Layout state
// ---------------------------------------------------------------------------

/// Everything the presentation matrix is derived from, plus the matrix.
#[derive(Debug, Clone, Copy)]
pub struct LayoutState {
    pub view: Option<Size>,
    pub display: DisplayMetrics,
    pub facing: CameraFacing,
    /// `None` until a geometry pass succeeds.
    pub matrix: Option<PresentationMatrix>,
}

/// Shared, cloneable handle to the layout state.
///
/// Writers recompute the matrix and publish the whole state under one write
/// lock; readers copy a snapshot, so a reader never sees a view size paired
/// with another size's matrix.
#[derive(Debug, Clone)]
pub struct LayoutHandle {
    inner: Arc<RwLock<LayoutState>>,
}

impl LayoutHandle {
    pub fn new(display: DisplayMetrics, facing: CameraFacing) -> Self {
        Self {
            inner: Arc::new(RwLock::new(LayoutState {
                view: None,
                display,
                facing,
                matrix: None,
            })),
        }
    }

    pub fn snapshot(&self) -> LayoutState {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Layout pass with the view's new size.
    pub fn on_layout(&self, view: Size) -> Result<()> {
        self.update(|state| state.view = Some(view))
    }

    /// Measure pass. Same recomputation as a layout pass.
    pub fn on_measure(&self, view: Size) -> Result<()> {
        self.on_layout(view)
    }

    pub fn set_facing(&self, facing: CameraFacing) -> Result<()> {
        self.update(|state| state.facing = facing)
    }

    pub fn set_display(&self, display: DisplayMetrics) -> Result<()> {
        self.update(|state| state.display = display)
    }

    /// Apply `change` and recompute the matrix while holding the write lock.
    /// A failed recompute leaves the matrix absent.
    fn update(&self, change: impl FnOnce(&mut LayoutState)) -> Result<()> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut state);
        let Some(view) = state.view else {
            return Ok(());
        };
        match PresentationMatrix::compute(view, state.display, state.facing) {
            Ok(matrix) => {
                state.matrix = Some(matrix);
                Ok(())
            }
            Err(e) => {
                state.matrix = None;
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Camera view
// ---------------------------------------------------------------------------

pub struct CameraView {
    layout: LayoutHandle,
    listener: Box<dyn CameraFrameListener>,
    stage: FilterStage,
    compositor: Compositor,
    fit_to_canvas: bool,
    /// Frame size of the running stream; `None` while stopped.
    stream: Option<Size>,
}

impl CameraView {
    /// Build a view from `config`. Fails if the configured filter
    /// parameters are invalid.
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let mut stage = FilterStage::new(&config.filter, config.refresh_policy)?;
        if config.filter_enabled {
            stage.set_enabled(true);
        }
        let mut compositor = Compositor::new();
        if config.fps_meter {
            compositor.enable_fps_meter();
        }
        Ok(Self {
            layout: LayoutHandle::new(config.display, config.camera_facing),
            listener: Box::new(PreviewListener),
            stage,
            compositor,
            fit_to_canvas: config.fit_to_canvas,
            stream: None,
        })
    }

    /// Handle for layout and measure callbacks.
    pub fn layout_handle(&self) -> LayoutHandle {
        self.layout.clone()
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn camera_facing(&self) -> CameraFacing {
        self.layout.snapshot().facing
    }

    pub fn is_filter_enabled(&self) -> bool {
        self.stage.is_enabled()
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// The camera started delivering `width`x`height` frames.
    #[instrument(skip(self))]
    pub fn on_stream_start(&mut self, width: u32, height: u32) {
        self.compositor.allocate_cache(width, height);
        let scale = match self.layout.snapshot().view {
            Some(view) if width > 0 && height > 0 => (view.width as f32 / width as f32)
                .min(view.height as f32 / height as f32),
            _ => 1.0,
        };
        self.compositor.set_display_scale(scale);
        self.stream = Some(Size::new(width, height));
        self.listener.on_camera_view_started(width, height);
        info!(width, height, scale = self.compositor.display_scale(), "Camera stream started");
    }

    pub fn on_stream_stop(&mut self) {
        if self.stream.take().is_some() {
            self.compositor.release_cache();
            self.listener.on_camera_view_stopped();
            info!("Camera stream stopped");
        }
    }

    /// Run one frame through listener, filter and compositor.
    ///
    /// Every path consumes `frame`; no outcome is fatal.
    #[instrument(skip_all)]
    pub fn deliver_and_draw_frame<S: DisplaySurface + ?Sized>(
        &mut self,
        frame: Frame,
        surface: &mut S,
    ) -> DrawOutcome {
        if self.stream.is_none() {
            return DrawOutcome::Stopped;
        }
        let layout = self.layout.snapshot();
        let matrix = if self.fit_to_canvas {
            match layout.matrix {
                Some(presentation) => presentation.matrix,
                None => {
                    debug!("No presentation matrix yet; frame dropped");
                    return DrawOutcome::GeometryPending;
                }
            }
        } else {
            identity()
        };

        let frame = self.listener.on_camera_frame(frame, layout.facing);

        let updated = if self.fit_to_canvas {
            let ctx = FilterContext {
                render_scale: self.compositor.display_scale(),
            };
            match self.stage.process(frame, &ctx) {
                FilterOutcome::Passthrough(frame) => self.compositor.update(&frame, None),
                FilterOutcome::Processed(output) => {
                    self.compositor.update(&output.frame, output.geometry)
                }
                FilterOutcome::Reuse => Ok(()),
            }
        } else {
            self.compositor.update(&frame, None)
        };

        if let Err(e) = updated {
            warn!(error = %e, "Frame conversion failed; draw skipped");
            return DrawOutcome::ConversionFailed;
        }
        self.compositor.present(surface, &matrix)
    }

    /// Switch the detection filter. Always clears the first-frame latch.
    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.stage.set_enabled(enabled);
    }

    pub fn set_filter_variant(&mut self, variant: &FilterVariant) -> Result<()> {
        self.stage.set_variant(variant)
    }

    pub fn set_refresh_policy(&mut self, policy: RefreshPolicy) {
        self.stage.set_policy(policy);
    }

    /// Use the given camera and recompute the presentation matrix.
    pub fn set_camera_facing(&mut self, facing: CameraFacing) -> Result<()> {
        info!(%facing, "Camera facing changed");
        self.layout.set_facing(facing)
    }

    pub fn set_fit_to_canvas(&mut self, fit: bool) {
        info!(fit, "Fit-to-canvas toggled");
        self.fit_to_canvas = fit;
    }

    pub fn enable_fps_meter(&mut self) {
        self.compositor.enable_fps_meter();
    }

    pub fn disable_fps_meter(&mut self) {
        self.compositor.disable_fps_meter();
    }

    pub fn set_frame_listener(&mut self, listener: Box<dyn CameraFrameListener>) {
        self.listener = listener;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RasterSurface;
    use cvcamera_core::CvCameraError;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn solid(w: u32, h: u32, colour: Rgba<u8>) -> Frame {
        Frame::from_rgba(RgbaImage::from_pixel(w, h, colour))
    }

    /// 40x40 view on a 40x40 display showing 20x20 frames: unit fill scale,
    /// display scale 2, so the bitmap covers the whole canvas.
    fn running_view(policy: RefreshPolicy) -> CameraView {
        let config = CameraConfig {
            display: DisplayMetrics {
                width_px: 40,
                height_px: 40,
            },
            filter_enabled: true,
            refresh_policy: policy,
            ..CameraConfig::default()
        };
        let mut view = CameraView::new(&config).unwrap();
        view.layout_handle().on_layout(Size::new(40, 40)).unwrap();
        view.on_stream_start(20, 20);
        view
    }

    #[test]
    fn display_scale_fits_frame_into_view() {
        let view = running_view(RefreshPolicy::Continuous);
        assert_eq!(view.compositor().display_scale(), 2.0);

        let mut unlaid = CameraView::new(&CameraConfig::default()).unwrap();
        unlaid.on_stream_start(640, 480);
        assert_eq!(unlaid.compositor().display_scale(), 1.0);
    }

    #[test]
    fn invalid_filter_config_is_rejected() {
        use cvcamera_core::config::EdgeMaskParams;
        let bad = FilterVariant::TransparentEdges(EdgeMaskParams {
            blur_sigma: -1.0,
            ..EdgeMaskParams::default()
        });
        let config = CameraConfig {
            filter: bad.clone(),
            ..CameraConfig::default()
        };
        assert!(matches!(CameraView::new(&config), Err(CvCameraError::Config(_))));

        let mut view = running_view(RefreshPolicy::Continuous);
        assert!(matches!(view.set_filter_variant(&bad), Err(CvCameraError::Config(_))));
    }

    #[test]
    fn continuous_policy_shows_every_frame() {
        let mut view = running_view(RefreshPolicy::Continuous);
        let mut surface = RasterSurface::new(40, 40);

        assert_eq!(view.deliver_and_draw_frame(solid(20, 20, RED), &mut surface), DrawOutcome::Presented);
        assert_eq!(surface.front().unwrap().get_pixel(20, 20), &RED);
        assert_eq!(view.deliver_and_draw_frame(solid(20, 20, BLUE), &mut surface), DrawOutcome::Presented);
        assert_eq!(surface.front().unwrap().get_pixel(20, 20), &BLUE);
    }

    #[test]
    fn freeze_first_keeps_first_filtered_frame_until_toggled() {
        let mut view = running_view(RefreshPolicy::FreezeFirst);
        let mut surface = RasterSurface::new(40, 40);

        view.deliver_and_draw_frame(solid(20, 20, RED), &mut surface);
        view.deliver_and_draw_frame(solid(20, 20, BLUE), &mut surface);
        view.deliver_and_draw_frame(solid(20, 20, BLUE), &mut surface);
        assert_eq!(surface.front().unwrap().get_pixel(20, 20), &RED);
        assert_eq!(surface.front().unwrap().get_pixel(10, 10), &RED);

        view.set_filter_enabled(false);
        view.set_filter_enabled(true);
        view.deliver_and_draw_frame(solid(20, 20, BLUE), &mut surface);
        assert_eq!(surface.front().unwrap().get_pixel(20, 20), &BLUE);
    }

    #[test]
    fn frames_before_layout_are_dropped() {
        let mut view = CameraView::new(&CameraConfig::default()).unwrap();
        view.on_stream_start(20, 20);
        let mut surface = RasterSurface::new(40, 40);
        assert_eq!(
            view.deliver_and_draw_frame(solid(20, 20, RED), &mut surface),
            DrawOutcome::GeometryPending
        );
        assert_eq!(surface.presented_count(), 0);

        view.set_fit_to_canvas(false);
        assert_eq!(view.deliver_and_draw_frame(solid(20, 20, RED), &mut surface), DrawOutcome::Presented);
    }

    #[test]
    fn conversion_failure_skips_draw_and_keeps_filter() {
        let mut view = running_view(RefreshPolicy::Continuous);
        let mut surface = RasterSurface::new(40, 40);
        assert_eq!(
            view.deliver_and_draw_frame(solid(10, 10, RED), &mut surface),
            DrawOutcome::ConversionFailed
        );
        assert!(view.is_filter_enabled());
        assert_eq!(surface.presented_count(), 0);
        assert!(!surface.is_locked());
    }

    #[test]
    fn lock_failure_drops_frame() {
        let mut view = running_view(RefreshPolicy::Continuous);
        let mut surface = RasterSurface::new(40, 40);
        surface.set_available(false);
        assert_eq!(
            view.deliver_and_draw_frame(solid(20, 20, RED), &mut surface),
            DrawOutcome::SurfaceUnavailable
        );
    }

    #[test]
    fn stopped_view_ignores_frames() {
        let mut view = running_view(RefreshPolicy::Continuous);
        view.on_stream_stop();
        assert!(!view.is_running());
        assert!(view.compositor().cached_bitmap().is_none());
        let mut surface = RasterSurface::new(40, 40);
        assert_eq!(view.deliver_and_draw_frame(solid(20, 20, RED), &mut surface), DrawOutcome::Stopped);
    }

    #[test]
    fn preview_listener_mirrors_front_frames() {
        let img = RgbaImage::from_fn(4, 1, |x, _| if x < 2 { RED } else { BLUE });
        let mut listener = PreviewListener;
        let back = listener.on_camera_frame(Frame::from_rgba(img.clone()), CameraFacing::Back);
        assert_eq!(back.as_rgba8().unwrap().get_pixel(0, 0), &RED);
        let front = listener.on_camera_frame(Frame::from_rgba(img), CameraFacing::Front);
        assert_eq!(front.as_rgba8().unwrap().get_pixel(0, 0), &BLUE);
    }

    #[test]
    fn facing_change_recomputes_matrix() {
        let mut view = running_view(RefreshPolicy::Continuous);
        let before = view.layout_handle().snapshot().matrix.unwrap();
        view.set_camera_facing(CameraFacing::Front).unwrap();
        let after = view.layout_handle().snapshot().matrix.unwrap();
        assert!(!before.mirrored);
        assert!(after.mirrored);
        assert_eq!(after.rotation_degrees, 270.0);
        assert_eq!(view.camera_facing(), CameraFacing::Front);
    }

    #[test]
    fn zero_view_invalidates_matrix() {
        let handle = LayoutHandle::new(DisplayMetrics::default(), CameraFacing::Back);
        handle.on_layout(Size::new(100, 200)).unwrap();
        assert!(handle.snapshot().matrix.is_some());
        let err = handle.on_measure(Size::new(0, 200)).unwrap_err();
        assert!(matches!(err, CvCameraError::InvalidGeometry(_)));
        assert!(handle.snapshot().matrix.is_none());
    }

    #[test]
    fn concurrent_layout_publishes_whole_states() {
        let handle = LayoutHandle::new(DisplayMetrics::default(), CameraFacing::Back);
        handle.on_layout(Size::new(100, 200)).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let handle = handle.clone();
            let done = done.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    let size = if i % 2 == 0 {
                        Size::new(300, 400)
                    } else {
                        Size::new(100, 200)
                    };
                    handle.on_layout(size).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        while !done.load(Ordering::SeqCst) {
            let state = handle.snapshot();
            let matrix = state.matrix.unwrap();
            assert_eq!(Some(matrix.view), state.view);
        }
        writer.join().unwrap();
    }
}
