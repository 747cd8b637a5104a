// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame — an owned camera image handed from stage to stage.
//
// A frame has exactly one owner. Passing it on is a move and releasing it is
// a drop, so intermediate buffers never outlive the stage that made them.

use cvcamera_core::Size;
use image::{DynamicImage, GrayImage, RgbaImage};

/// Pixel layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA color.
    Rgba8,
    /// 8-bit single-channel mask or grayscale image.
    Gray8,
}

/// One captured (or processed) image.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    /// Wrap a color image.
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            image: DynamicImage::ImageRgba8(image),
        }
    }

    /// Wrap a grayscale mask.
    pub fn from_gray(image: GrayImage) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(image),
        }
    }

    /// Wrap any decoded image, normalising it to `Rgba8` or `Gray8`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::from_gray(gray),
            DynamicImage::ImageRgba8(rgba) => Self::from_rgba(rgba),
            other => Self::from_rgba(other.to_rgba8()),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn format(&self) -> PixelFormat {
        match self.image {
            DynamicImage::ImageLuma8(_) => PixelFormat::Gray8,
            _ => PixelFormat::Rgba8,
        }
    }

    /// Borrow the pixels when the frame is already `Rgba8`.
    pub fn as_rgba8(&self) -> Option<&RgbaImage> {
        self.image.as_rgba8()
    }

    /// Grayscale copy of the frame.
    pub fn to_luma8(&self) -> GrayImage {
        self.image.to_luma8()
    }

    /// Consume the frame as RGBA, converting a mask if necessary.
    pub fn into_rgba8(self) -> RgbaImage {
        match self.image {
            DynamicImage::ImageRgba8(rgba) => rgba,
            other => other.to_rgba8(),
        }
    }

    /// Mirror the frame left-to-right.
    pub fn flip_horizontal(self) -> Self {
        Self {
            image: self.image.fliph(),
        }
    }
}
