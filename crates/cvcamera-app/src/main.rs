// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CvCamera — headless preview driver.
//
// Entry point. Initialises logging, loads settings, and runs a synthetic
// camera through the preview pipeline at the configured frame rate. The
// last presented canvas is written to `preview.png` in the data directory.

mod services;

use std::time::Duration;

use cvcamera_core::CameraConfig;
use cvcamera_core::error::{CvCameraError, Result};
use cvcamera_render::{CameraSession, CameraView, DisplaySurface, RasterSurface};
use tracing::{debug, error, info, warn};

use services::camera::SyntheticCamera;
use services::{data_dir, settings};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("CvCamera starting");

    if let Err(e) = run().await {
        error!(error = %e, "CvCamera stopped with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let dir = data_dir::data_dir()?;
    let mut config = settings::load_or_init(&dir)?;

    let bridge = cvcamera_bridge::platform_bridge();
    info!(platform = bridge.platform_name(), "Platform bridge ready");
    match bridge.display_metrics() {
        Ok(display) => config.display = display,
        Err(e) => debug!(error = %e, "Using configured display metrics"),
    }

    let view = CameraView::new(&config)?;
    view.layout_handle().on_layout(config.view_size)?;

    let mut raster = RasterSurface::new(config.view_size.width, config.view_size.height);
    let mut native = match bridge.preview_surface() {
        Ok(surface) => Some(surface),
        Err(CvCameraError::PlatformUnavailable) => None,
        Err(e) => {
            warn!(error = %e, "Native surface unavailable; drawing off-screen");
            None
        }
    };
    let surface: &mut dyn DisplaySurface = match native.as_mut() {
        Some(surface) => surface.as_mut(),
        None => &mut raster,
    };

    let camera = SyntheticCamera::new(config.frame_size, Some(u64::from(config.session_frames)));
    let mut session = CameraSession::new(camera, view);
    let frame_size = session.start()?;
    info!(
        frame = %frame_size,
        view = %config.view_size,
        filter = config.filter.name(),
        filter_enabled = config.filter_enabled,
        "Preview running"
    );

    let mut interval = tokio::time::interval(frame_period(&config));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if session.step(&mut *surface).is_none() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted; stopping preview");
                break;
            }
        }
    }

    let report = session.stop();
    info!(
        frames = report.frames,
        presented = report.presented,
        dropped = report.dropped(),
        "Preview finished"
    );

    if native.is_none() {
        write_preview(&raster, &dir.join("preview.png"))?;
    }
    Ok(())
}

fn frame_period(config: &CameraConfig) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(config.target_fps.max(1)))
}

fn write_preview(surface: &RasterSurface, path: &std::path::Path) -> Result<()> {
    let Some(image) = surface.front() else {
        warn!("Nothing was presented; no preview written");
        return Ok(());
    };
    for run in surface.front_text() {
        info!(text = %run.text, x = run.x, y = run.y, "Overlay text");
    }
    image
        .save(path)
        .map_err(|e| CvCameraError::ImageError(e.to_string()))?;
    info!(path = %path.display(), "Preview written");
    Ok(())
}
