//! YAML-backed capture configuration for embedders and the demo binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capture::Facing;
use crate::error::SnapshotError;
use crate::size::Size;

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_quality() -> u8 {
    90
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingConfig {
    Back,
    Front,
}

impl From<FacingConfig> for Facing {
    fn from(value: FacingConfig) -> Self {
        match value {
            FacingConfig::Back => Facing::Back,
            FacingConfig::Front => Facing::Front,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Preview stream width before cropping.
    pub width: u32,
    /// Preview stream height before cropping.
    pub height: u32,
    /// JPEG encode quality, 1..=100.
    pub jpeg_quality: u8,
    /// Requested output rotation in degrees, a multiple of 90.
    pub rotation: i32,
    pub facing: FacingConfig,
    pub with_overlay: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            jpeg_quality: default_quality(),
            rotation: 0,
            facing: FacingConfig::Back,
            with_overlay: false,
        }
    }
}

impl CaptureConfig {
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.width == 0 || self.height == 0 {
            return Err(SnapshotError::acquire(format!(
                "preview size {}x{} is empty",
                self.width, self.height
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(SnapshotError::acquire(format!(
                "jpeg quality {} outside 1..=100",
                self.jpeg_quality
            )));
        }
        if self.rotation % 90 != 0 {
            return Err(SnapshotError::acquire(format!(
                "rotation {} is not a multiple of 90",
                self.rotation
            )));
        }
        Ok(())
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
