// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — data directory, persisted settings, and the synthetic
// camera the headless driver previews.

pub mod camera;
pub mod data_dir;
pub mod settings;
