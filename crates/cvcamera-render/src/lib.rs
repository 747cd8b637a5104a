// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cvcamera-render — Everything between a filtered frame and the screen.
//
// Provides the presentation transform (sensor frame to display canvas), a
// software canvas and the display-surface abstraction, the compositor that
// owns surface locking, the FPS meter, and the camera view and session that
// the platform drives once per frame.

pub mod canvas;
pub mod compositor;
pub mod fps;
pub mod session;
pub mod transform;
pub mod view;

pub use canvas::{DisplaySurface, RasterCanvas, RasterSurface, TextRun};
pub use compositor::{Bitmap, Compositor, DrawOutcome};
pub use fps::FpsMeter;
pub use session::{CameraSession, FrameSource, SessionReport};
pub use imageproc::geometric_transformations::Projection;
pub use transform::{PresentationMatrix, identity, scale_about};
pub use view::{CameraFrameListener, CameraView, LayoutHandle, PreviewListener};
