// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cvcamera-vision — Frame buffers and detection filters for the CvCamera preview.
//
// Provides the owned `Frame` buffer handed between pipeline stages and the
// filter stage with its three detection strategies (transparent edge mask,
// bright-rectangle corners, line bounding box) and its refresh policy.

pub mod filter;
pub mod frame;

// Re-export the primary types so callers can use `cvcamera_vision::Frame` etc.
pub use filter::stage::{FilterOutcome, FilterStage};
pub use filter::{DetectedGeometry, FilterContext, FilterOutput, FrameFilter, build_filter};
pub use frame::{Frame, PixelFormat};
