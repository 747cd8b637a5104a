// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Camera session — pulls frames from a source and pushes each one through the
// camera view synchronously.

use cvcamera_core::Size;
use cvcamera_core::error::Result;
use cvcamera_vision::Frame;
use tracing::{info, instrument, warn};

use crate::canvas::DisplaySurface;
use crate::compositor::DrawOutcome;
use crate::view::CameraView;

/// Anything that can deliver camera frames.
pub trait FrameSource {
    /// Start capturing; returns the size of the frames that will follow.
    fn open(&mut self) -> Result<Size>;

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Option<Frame>;

    fn close(&mut self);
}

/// Per-outcome frame counts for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub frames: u64,
    pub presented: u64,
    pub surface_unavailable: u64,
    pub conversion_failed: u64,
    pub geometry_pending: u64,
    pub stopped: u64,
}

impl SessionReport {
    pub fn record(&mut self, outcome: DrawOutcome) {
        self.frames += 1;
        let slot = match outcome {
            DrawOutcome::Presented => &mut self.presented,
            DrawOutcome::SurfaceUnavailable => &mut self.surface_unavailable,
            DrawOutcome::ConversionFailed => &mut self.conversion_failed,
            DrawOutcome::GeometryPending => &mut self.geometry_pending,
            DrawOutcome::Stopped => &mut self.stopped,
        };
        *slot += 1;
    }

    pub fn dropped(&self) -> u64 {
        self.frames - self.presented
    }
}

/// A frame source bound to a camera view.
pub struct CameraSession<S: FrameSource> {
    source: S,
    view: CameraView,
    report: SessionReport,
    open: bool,
}

impl<S: FrameSource> CameraSession<S> {
    pub fn new(source: S, view: CameraView) -> Self {
        Self {
            source,
            view,
            report: SessionReport::default(),
            open: false,
        }
    }

    pub fn view(&self) -> &CameraView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut CameraView {
        &mut self.view
    }

    pub fn report(&self) -> SessionReport {
        self.report
    }

    /// Open the source and start the view's stream.
    pub fn start(&mut self) -> Result<Size> {
        let size = self.source.open()?;
        self.view.on_stream_start(size.width, size.height);
        self.open = true;
        Ok(size)
    }

    /// Deliver one frame. `None` when the session is not started or the
    /// source has run dry.
    pub fn step<D: DisplaySurface + ?Sized>(&mut self, surface: &mut D) -> Option<DrawOutcome> {
        if !self.open {
            return None;
        }
        let frame = self.source.next_frame()?;
        let outcome = self.view.deliver_and_draw_frame(frame, surface);
        if outcome != DrawOutcome::Presented {
            warn!(?outcome, frame = self.report.frames, "Frame not presented");
        }
        self.report.record(outcome);
        Some(outcome)
    }

    /// Stop the view and close the source. Safe to call more than once.
    pub fn stop(&mut self) -> SessionReport {
        if self.open {
            self.view.on_stream_stop();
            self.source.close();
            self.open = false;
            info!(
                frames = self.report.frames,
                presented = self.report.presented,
                "Camera session stopped"
            );
        }
        self.report
    }

    /// Run until the source is exhausted or `max_frames` have been delivered.
    #[instrument(skip(self, surface))]
    pub fn run<D: DisplaySurface + ?Sized>(
        &mut self,
        surface: &mut D,
        max_frames: Option<u64>,
    ) -> Result<SessionReport> {
        self.start()?;
        while max_frames.is_none_or(|max| self.report.frames < max) {
            if self.step(surface).is_none() {
                break;
            }
        }
        Ok(self.stop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RasterSurface;
    use cvcamera_core::config::CameraConfig;
    use image::{Rgba, RgbaImage};
    use std::collections::VecDeque;

    struct VecSource {
        size: Size,
        frames: VecDeque<Frame>,
        closed: bool,
    }

    impl VecSource {
        fn solid(count: usize, size: Size) -> Self {
            let frame = Frame::from_rgba(RgbaImage::from_pixel(
                size.width,
                size.height,
                Rgba([0, 255, 0, 255]),
            ));
            Self {
                size,
                frames: std::iter::repeat_n(frame, count).collect(),
                closed: false,
            }
        }
    }

    impl FrameSource for VecSource {
        fn open(&mut self) -> Result<Size> {
            Ok(self.size)
        }

        fn next_frame(&mut self) -> Option<Frame> {
            self.frames.pop_front()
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn laid_out_view() -> CameraView {
        let view = CameraView::new(&CameraConfig::default()).unwrap();
        view.layout_handle().on_layout(Size::new(64, 48)).unwrap();
        view
    }

    #[test]
    fn runs_until_source_is_exhausted() {
        let mut session = CameraSession::new(VecSource::solid(5, Size::new(32, 24)), laid_out_view());
        let mut surface = RasterSurface::new(64, 48);
        let report = session.run(&mut surface, None).unwrap();
        assert_eq!(report.frames, 5);
        assert_eq!(report.presented, 5);
        assert_eq!(surface.presented_count(), 5);
        assert!(session.source.closed);
        assert!(!session.view().is_running());
    }

    #[test]
    fn max_frames_caps_the_run() {
        let mut session = CameraSession::new(VecSource::solid(10, Size::new(32, 24)), laid_out_view());
        let mut surface = RasterSurface::new(64, 48);
        let report = session.run(&mut surface, Some(3)).unwrap();
        assert_eq!(report.frames, 3);
    }

    #[test]
    fn outcomes_are_counted() {
        let view = CameraView::new(&CameraConfig::default()).unwrap();
        let mut session = CameraSession::new(VecSource::solid(2, Size::new(8, 8)), view);
        let mut surface = RasterSurface::new(16, 16);
        let report = session.run(&mut surface, None).unwrap();
        assert_eq!(report.geometry_pending, 2);
        assert_eq!(report.dropped(), 2);
    }

    #[test]
    fn step_before_start_does_nothing() {
        let mut session = CameraSession::new(VecSource::solid(1, Size::new(8, 8)), laid_out_view());
        let mut surface = RasterSurface::new(16, 16);
        assert!(session.step(&mut surface).is_none());
        assert_eq!(session.stop(), SessionReport::default());
    }
}
