use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, Result};

/// Pixel rectangle within the native frame that the detection engine
/// should restrict analysis to.
///
/// A constructed value always has positive width and height; it is
/// replaced wholesale on reconfiguration, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionOfInterest {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl RegionOfInterest {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DomainError::InvalidRoi { width, height });
        }

        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Default ROI covering the whole native frame.
    pub fn full_frame(frame_width: u32, frame_height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: frame_width.max(1),
            height: frame_height.max(1),
        }
    }

    /// Clamp coordinates and dimensions to the native frame bounds.
    pub fn clamped(&self, frame_width: u32, frame_height: u32) -> Self {
        let x = self.x.min(frame_width.saturating_sub(1));
        let y = self.y.min(frame_height.saturating_sub(1));
        let width = self.width.min(frame_width - x).max(1);
        let height = self.height.min(frame_height - y).max(1);

        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Render as the `x,y,w,h` argument the engine binary expects.
    pub fn as_window_arg(&self) -> String {
        format!("{},{},{},{}", self.x, self.y, self.width, self.height)
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Unvalidated ROI parameters as received from clients.
///
/// Kept separate from `RegionOfInterest` so that deserialization cannot
/// bypass the positive-dimension invariant.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RoiSpec {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RoiSpec {
    pub fn validate(self) -> Result<RegionOfInterest> {
        RegionOfInterest::new(self.x, self.y, self.width, self.height)
    }
}
