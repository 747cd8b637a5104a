// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persisted preview settings (`config.json` in the data directory).

use std::path::{Path, PathBuf};

use cvcamera_core::CameraConfig;
use cvcamera_core::error::Result;
use tracing::info;

const CONFIG_FILE: &str = "config.json";

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Load the saved settings, writing the defaults first if none exist.
///
/// A file that exists but does not parse or validate is an error; it is
/// never silently replaced.
pub fn load_or_init(data_dir: &Path) -> Result<CameraConfig> {
    let path = config_path(data_dir);
    if !path.exists() {
        let config = CameraConfig::default();
        save(data_dir, &config)?;
        info!(path = %path.display(), "Wrote default settings");
        return Ok(config);
    }
    let json = std::fs::read_to_string(&path)?;
    let config = CameraConfig::from_json_str(&json)?;
    info!(path = %path.display(), filter = config.filter.name(), "Settings loaded");
    Ok(config)
}

pub fn save(data_dir: &Path, config: &CameraConfig) -> Result<()> {
    std::fs::write(config_path(data_dir), config.to_json_string()?)?;
    Ok(())
}
