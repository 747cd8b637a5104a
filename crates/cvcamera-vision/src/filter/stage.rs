// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filter stage — the on/off switch, the selected strategy, and the refresh
// policy that decides whether a filtered frame is recomputed or reused.

use cvcamera_core::config::{FilterVariant, RefreshPolicy};
use cvcamera_core::error::Result;
use tracing::{debug, info, instrument};

use super::{FilterContext, FilterOutput, FrameFilter, build_filter};
use crate::frame::Frame;

/// What the stage did with a frame.
#[derive(Debug)]
pub enum FilterOutcome {
    /// Filter is off; the frame is handed back untouched.
    Passthrough(Frame),
    /// Filter ran and produced a new frame.
    Processed(FilterOutput),
    /// The frame was released unprocessed; keep showing the previous result.
    Reuse,
}

/// Optional per-frame detection step in front of the compositor.
pub struct FilterStage {
    filter: Box<dyn FrameFilter>,
    policy: RefreshPolicy,
    enabled: bool,
    /// Set once a filtered frame has been produced since the last toggle.
    latched: bool,
}

impl FilterStage {
    pub fn new(variant: &FilterVariant, policy: RefreshPolicy) -> Result<Self> {
        Ok(Self::with_filter(build_filter(variant)?, policy))
    }

    /// Use a custom filter implementation.
    pub fn with_filter(filter: Box<dyn FrameFilter>, policy: RefreshPolicy) -> Self {
        Self {
            filter,
            policy,
            enabled: false,
            latched: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn filter_name(&self) -> &'static str {
        self.filter.name()
    }

    /// Switch the filter on or off. Always clears the first-frame latch.
    pub fn set_enabled(&mut self, enabled: bool) {
        info!(enabled, filter = self.filter.name(), "Filter toggled");
        self.enabled = enabled;
        self.latched = false;
    }

    pub fn set_policy(&mut self, policy: RefreshPolicy) {
        self.policy = policy;
        self.latched = false;
    }

    /// Replace the active filter strategy. The latch is cleared.
    ///
    /// An invalid variant is rejected and the current filter stays active.
    pub fn set_variant(&mut self, variant: &FilterVariant) -> Result<()> {
        self.filter = build_filter(variant)?;
        info!(filter = variant.name(), "Filter variant changed");
        self.latched = false;
        Ok(())
    }

    /// Run the stage on one frame.
    #[instrument(skip_all, fields(enabled = self.enabled, latched = self.latched))]
    pub fn process(&mut self, frame: Frame, ctx: &FilterContext) -> FilterOutcome {
        if !self.enabled {
            return FilterOutcome::Passthrough(frame);
        }
        if self.latched && self.policy == RefreshPolicy::FreezeFirst {
            debug!("Frozen on first filtered frame; releasing input");
            drop(frame);
            return FilterOutcome::Reuse;
        }

        let output = self.filter.apply(frame, ctx);
        self.latched = true;
        FilterOutcome::Processed(output)
    }
}
