// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use serde::{Deserialize, Serialize};

use crate::error::{CvCameraError, Result};
use crate::types::{CameraFacing, DisplayMetrics, Size};

/// Persistent preview settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera opened when the preview starts.
    pub camera_facing: CameraFacing,
    /// Rotate/scale frames to fill the display. When off, frames are drawn
    /// unfiltered with the identity matrix.
    pub fit_to_canvas: bool,
    /// Overlay a frames-per-second readout.
    pub fps_meter: bool,
    /// Start with the detection filter switched on.
    pub filter_enabled: bool,
    /// Which detection filter runs while the filter is on.
    pub filter: FilterVariant,
    /// Whether a filtered preview keeps refreshing or freezes on the first result.
    pub refresh_policy: RefreshPolicy,
    /// Physical display size used by the fit-to-canvas scale.
    pub display: DisplayMetrics,
    /// Size of the preview view on the display.
    pub view_size: Size,
    /// Size of the frames delivered by the camera.
    pub frame_size: Size,
    /// Frame rate the session driver paces the source at.
    pub target_fps: u32,
    /// Number of frames the demo session runs for.
    pub session_frames: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            camera_facing: CameraFacing::Back,
            fit_to_canvas: true,
            fps_meter: false,
            filter_enabled: false,
            filter: FilterVariant::default(),
            refresh_policy: RefreshPolicy::default(),
            display: DisplayMetrics::default(),
            view_size: Size::new(1080, 1920),
            frame_size: Size::new(640, 480),
            target_fps: 30,
            session_frames: 90,
        }
    }
}

impl CameraConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialise as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.target_fps == 0 {
            return Err(CvCameraError::Config("target_fps must be positive".into()));
        }
        if self.frame_size.is_empty() {
            return Err(CvCameraError::Config(format!(
                "frame_size {} has a zero dimension",
                self.frame_size
            )));
        }
        if self.display.width_px == 0 || self.display.height_px == 0 {
            return Err(CvCameraError::Config("display metrics must be non-zero".into()));
        }
        self.filter.validate()
    }
}

/// What happens to the preview after the filter has produced one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Every frame is filtered and drawn.
    #[default]
    Continuous,
    /// The first filtered frame stays on screen until the filter is toggled.
    FreezeFirst,
}

/// Detection filter selection with its tuning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterVariant {
    /// Canny edges punched out of the frame as transparent holes.
    TransparentEdges(EdgeMaskParams),
    /// Markers on the corners of bright quadrilaterals.
    RectangleCorners(CornerParams),
    /// Bounding box around detected line segments with coordinate labels.
    LineBoundingBox(LineBoxParams),
}

impl Default for FilterVariant {
    fn default() -> Self {
        FilterVariant::TransparentEdges(EdgeMaskParams::default())
    }
}

impl FilterVariant {
    pub fn name(&self) -> &'static str {
        match self {
            FilterVariant::TransparentEdges(_) => "transparent_edges",
            FilterVariant::RectangleCorners(_) => "rectangle_corners",
            FilterVariant::LineBoundingBox(_) => "line_bounding_box",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            FilterVariant::TransparentEdges(p) => {
                check_canny(p.canny_low, p.canny_high)?;
                check_sigma(p.blur_sigma)
            }
            FilterVariant::RectangleCorners(p) => {
                check_canny(p.canny_low, p.canny_high)?;
                check_sigma(p.blur_sigma)?;
                if !(p.polygon_epsilon > 0.0) {
                    return Err(CvCameraError::Config(
                        "polygon_epsilon must be positive".into(),
                    ));
                }
                if p.hsv_lower.iter().zip(p.hsv_upper.iter()).any(|(lo, hi)| lo > hi) {
                    return Err(CvCameraError::Config(format!(
                        "hsv_lower {:?} exceeds hsv_upper {:?}",
                        p.hsv_lower, p.hsv_upper
                    )));
                }
                Ok(())
            }
            FilterVariant::LineBoundingBox(p) => {
                check_canny(p.canny_low, p.canny_high)?;
                check_sigma(p.blur_sigma)?;
                if p.min_line_length == 0 {
                    return Err(CvCameraError::Config(
                        "min_line_length must be positive".into(),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn check_canny(low: f32, high: f32) -> Result<()> {
    if low < 0.0 || high < low {
        return Err(CvCameraError::Config(format!(
            "canny thresholds must satisfy 0 <= low <= high (got {low}, {high})"
        )));
    }
    Ok(())
}

fn check_sigma(sigma: f32) -> Result<()> {
    if !(sigma > 0.0) || !sigma.is_finite() {
        return Err(CvCameraError::Config(format!(
            "blur sigma must be positive and finite (got {sigma})"
        )));
    }
    Ok(())
}

/// Sigma OpenCV derives for a 3x3 Gaussian kernel when sigma is left at zero.
pub const AUTO_SIGMA_3X3: f32 = 0.8;

/// Parameters of the transparent edge mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeMaskParams {
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for EdgeMaskParams {
    fn default() -> Self {
        Self {
            blur_sigma: AUTO_SIGMA_3X3,
            canny_low: 100.0,
            canny_high: 250.0,
        }
    }
}

/// Parameters of the bright-rectangle corner detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerParams {
    /// Inclusive lower HSV bound (H in 0..=180, S and V in 0..=255).
    pub hsv_lower: [u8; 3],
    /// Inclusive upper HSV bound.
    pub hsv_upper: [u8; 3],
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon tolerance as a fraction of the contour perimeter.
    pub polygon_epsilon: f64,
    pub marker_radius: i32,
}

impl Default for CornerParams {
    fn default() -> Self {
        Self {
            hsv_lower: [0, 0, 150],
            hsv_upper: [180, 50, 255],
            blur_sigma: AUTO_SIGMA_3X3,
            canny_low: 50.0,
            canny_high: 150.0,
            polygon_epsilon: 0.02,
            marker_radius: 5,
        }
    }
}

/// Pixel margins at render scale 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Margins {
    pub const fn uniform(value: f32) -> Self {
        Self {
            left: value,
            top: value,
            right: value,
            bottom: value,
        }
    }
}

/// Parameters of the line-segment bounding box detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineBoxParams {
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Minimum accumulator votes for a line.
    pub vote_threshold: u32,
    /// Non-maximum suppression radius in the accumulator.
    pub suppression_radius: u32,
    /// Shortest segment kept, in pixels (typically 20 to 50).
    pub min_line_length: u32,
    /// Largest gap bridged inside one segment, in pixels.
    pub max_line_gap: u32,
    /// Region of interest inset from the frame border.
    pub roi_margin: Margins,
    /// Upper clamp of the X label.
    pub label_max_x: u32,
    /// Upper clamp of the Y label.
    pub label_max_y: u32,
    pub marker_radius: i32,
}

impl Default for LineBoxParams {
    fn default() -> Self {
        Self {
            blur_sigma: AUTO_SIGMA_3X3,
            canny_low: 100.0,
            canny_high: 250.0,
            vote_threshold: 20,
            suppression_radius: 8,
            min_line_length: 30,
            max_line_gap: 10,
            roi_margin: Margins::uniform(20.0),
            label_max_x: 955,
            label_max_y: 715,
            marker_radius: 5,
        }
    }
}
