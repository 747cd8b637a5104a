// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where no native window exists.

use cvcamera_core::DisplayMetrics;
use cvcamera_core::error::{CvCameraError, Result};
use cvcamera_render::DisplaySurface;

use crate::traits::PlatformBridge;

/// No-op bridge returned on non-mobile platforms.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn display_metrics(&self) -> Result<DisplayMetrics> {
        Err(CvCameraError::PlatformUnavailable)
    }

    fn preview_surface(&self) -> Result<Box<dyn DisplaySurface>> {
        tracing::warn!("PlatformBridge::preview_surface called on stub bridge");
        Err(CvCameraError::PlatformUnavailable)
    }
}
