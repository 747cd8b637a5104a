// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cvcamera-bridge — Native platform surfaces for the preview.
//
// Defines the bridge trait and picks the implementation for the target OS.
// Android presents through an `ANativeWindow`; every other target gets a stub
// that reports the platform as unavailable so callers fall back to an
// in-memory surface.

pub mod traits;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(target_os = "android"))]
pub mod stub;

pub use traits::PlatformBridge;

/// Bridge implementation for the target operating system.
pub fn platform_bridge() -> Box<dyn PlatformBridge> {
    #[cfg(target_os = "android")]
    {
        Box::new(android::AndroidBridge)
    }
    #[cfg(not(target_os = "android"))]
    {
        Box::new(stub::StubBridge)
    }
}
