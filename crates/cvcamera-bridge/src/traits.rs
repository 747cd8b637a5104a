// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic bridge trait.

use cvcamera_core::DisplayMetrics;
use cvcamera_core::error::Result;
use cvcamera_render::DisplaySurface;

/// Native capabilities the preview needs from the host platform.
///
/// Targets without a native window return
/// `CvCameraError::PlatformUnavailable`.
pub trait PlatformBridge {
    /// Human-readable platform name.
    fn platform_name(&self) -> &str;

    /// Pixel size of the physical display.
    fn display_metrics(&self) -> Result<DisplayMetrics>;

    /// Surface the compositor should post frames to.
    fn preview_surface(&self) -> Result<Box<dyn DisplaySurface>>;
}
