// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame-rate meter shown in the preview corner.

use std::time::Instant;

use tracing::debug;

/// Frames between readout updates.
pub const STEP: u32 = 20;

/// Counts presented frames and reports the rate every [`STEP`] frames.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    frames: u32,
    window_start: Option<Instant>,
    width: u32,
    height: u32,
    fps: Option<f64>,
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsMeter {
    pub fn new() -> Self {
        Self {
            frames: 0,
            window_start: None,
            width: 0,
            height: 0,
            fps: None,
        }
    }

    /// Frame size included in the readout.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn measure(&mut self) {
        self.measure_at(Instant::now());
    }

    /// Record one frame presented at `now`.
    pub fn measure_at(&mut self, now: Instant) {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return;
        };
        self.frames += 1;
        if self.frames % STEP == 0 {
            let elapsed = now.saturating_duration_since(start).as_secs_f64();
            if elapsed > 0.0 {
                let fps = f64::from(STEP) / elapsed;
                debug!(fps, "FPS readout updated");
                self.fps = Some(fps);
            }
            self.window_start = Some(now);
        }
    }

    /// Last measured rate, if a full window has elapsed.
    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    /// Readout text, e.g. `"29.97 FPS@640x480"`.
    pub fn text(&self) -> Option<String> {
        self.fps
            .map(|fps| format!("{fps:.2} FPS@{}x{}", self.width, self.height))
    }
}
