// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android platform bridge via the NDK native window.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. The host view hands its `android.view.Surface`
// to native code through the JNI entry points below; the compositor then
// draws into a software canvas that is copied row by row into the window
// buffer on every post.

#![cfg(target_os = "android")]

use std::sync::{Mutex, PoisonError};

use jni::JNIEnv;
use jni::objects::{JClass, JObject};
use ndk::hardware_buffer_format::HardwareBufferFormat;
use ndk::native_window::NativeWindow;

use cvcamera_core::DisplayMetrics;
use cvcamera_core::error::{CvCameraError, Result};
use cvcamera_render::{DisplaySurface, RasterCanvas};

use crate::traits::PlatformBridge;

const BYTES_PER_PIXEL: usize = 4;

/// Window attached by the host view, if its surface currently exists.
static PREVIEW_WINDOW: Mutex<Option<NativeWindow>> = Mutex::new(None);

fn attached_window() -> Option<NativeWindow> {
    PREVIEW_WINDOW
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

// ---------------------------------------------------------------------------
// JNI entry points
// ---------------------------------------------------------------------------

/// `CvCameraView.nativeSurfaceCreated(Surface)`.
#[unsafe(no_mangle)]
pub extern "system" fn Java_org_cvcamera_CvCameraView_nativeSurfaceCreated(
    env: JNIEnv,
    _class: JClass,
    surface: JObject,
) {
    // SAFETY: `env` is the live JNIEnv of this call and `surface` is a local
    // reference to an `android.view.Surface` valid for its duration.
    let window = unsafe { NativeWindow::from_surface(env.get_raw(), surface.as_raw()) };
    match window {
        Some(window) => {
            tracing::info!(
                width = window.width(),
                height = window.height(),
                "Preview surface attached"
            );
            *PREVIEW_WINDOW.lock().unwrap_or_else(PoisonError::into_inner) = Some(window);
        }
        None => tracing::warn!("Surface has no native window"),
    }
}

/// `CvCameraView.nativeSurfaceDestroyed()`.
#[unsafe(no_mangle)]
pub extern "system" fn Java_org_cvcamera_CvCameraView_nativeSurfaceDestroyed(
    _env: JNIEnv,
    _class: JClass,
) {
    tracing::info!("Preview surface detached");
    *PREVIEW_WINDOW.lock().unwrap_or_else(PoisonError::into_inner) = None;
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

pub struct AndroidBridge;

impl PlatformBridge for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn display_metrics(&self) -> Result<DisplayMetrics> {
        let window = attached_window().ok_or_else(|| {
            CvCameraError::Bridge("no preview surface attached".into())
        })?;
        Ok(DisplayMetrics {
            width_px: u32::try_from(window.width()).unwrap_or(0),
            height_px: u32::try_from(window.height()).unwrap_or(0),
        })
    }

    fn preview_surface(&self) -> Result<Box<dyn DisplaySurface>> {
        let window = attached_window().ok_or_else(|| {
            CvCameraError::Bridge("no preview surface attached".into())
        })?;
        Ok(Box::new(AndroidSurface::new(window)?))
    }
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

/// Presents canvases into an `ANativeWindow`.
pub struct AndroidSurface {
    window: NativeWindow,
    width: u32,
    height: u32,
    /// The last posted canvas, handed out again by the next lock.
    spare: Option<RasterCanvas>,
}

impl AndroidSurface {
    /// Configure `window` for RGBA buffers at its current size.
    pub fn new(window: NativeWindow) -> Result<Self> {
        let (w, h) = (window.width(), window.height());
        if w <= 0 || h <= 0 {
            return Err(CvCameraError::InvalidGeometry(format!(
                "native window is {w}x{h}"
            )));
        }
        window
            .set_buffers_geometry(w, h, Some(HardwareBufferFormat::R8G8B8A8_UNORM))
            .map_err(|e| CvCameraError::Bridge(format!("set_buffers_geometry: {e}")))?;
        Ok(Self {
            window,
            width: w as u32,
            height: h as u32,
            spare: None,
        })
    }
}

impl DisplaySurface for AndroidSurface {
    fn lock_canvas(&mut self) -> Option<RasterCanvas> {
        match self.spare.take() {
            Some(mut canvas) => {
                canvas.reset_state();
                Some(canvas)
            }
            None => Some(RasterCanvas::new(self.width, self.height)),
        }
    }

    fn unlock_and_post(&mut self, canvas: RasterCanvas) -> Result<()> {
        let mut buffer = match self.window.lock(None) {
            Ok(buffer) => buffer,
            Err(e) => {
                self.spare = Some(canvas);
                return Err(CvCameraError::Bridge(format!("ANativeWindow_lock: {e}")));
            }
        };

        let stride = usize::try_from(buffer.stride()).unwrap_or(0) * BYTES_PER_PIXEL;
        let rows = usize::try_from(buffer.height()).unwrap_or(0).min(canvas.height() as usize);
        let cols = usize::try_from(buffer.width()).unwrap_or(0).min(canvas.width() as usize);
        let src_stride = canvas.width() as usize * BYTES_PER_PIXEL;
        let src = canvas.pixels().as_raw();
        let dst = buffer.bits().cast::<u8>();

        for row in 0..rows {
            let from = &src[row * src_stride..row * src_stride + cols * BYTES_PER_PIXEL];
            // SAFETY: the locked buffer holds `height` rows of `stride`
            // pixels, and `row < height`, `cols <= width <= stride`.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    from.as_ptr(),
                    dst.add(row * stride),
                    cols * BYTES_PER_PIXEL,
                );
            }
        }
        // Dropping the guard unlocks and posts the buffer.
        drop(buffer);
        self.spare = Some(canvas);
        Ok(())
    }
}
