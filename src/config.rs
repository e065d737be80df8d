//! File configuration for a simulation run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::params::{Controls, SimConstants};
use crate::SimError;

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    /// Side of a cell in world units.
    pub cell_size: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            cell_size: 1.0,
        }
    }
}

impl GridConfig {
    pub fn grid(&self) -> Result<Grid, SimError> {
        Grid::new(self.width, self.height, self.cell_size)
    }
}

/// Everything needed to start a run. Every field is optional in the file.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub grid: GridConfig,
    pub constants: SimConstants,
    /// Initial operator controls.
    pub controls: Controls,
}

impl SimConfig {
    /// Reads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SimError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text).map_err(|source| SimError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
