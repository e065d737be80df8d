use rayon::prelude::*;
use serde::Serialize;

use crate::fields::{SoilCell, WaterCell};
use crate::grid::Grid;
use crate::AF32;

/// Read-only view of the committed state, for shading.
#[derive(Copy, Clone)]
pub struct FieldView<'a> {
    pub(crate) grid: Grid,
    pub(crate) show_paths: bool,
    pub(crate) water: &'a [WaterCell],
    pub(crate) soil: &'a [SoilCell],
    pub(crate) water_trail: &'a [AF32],
    pub(crate) soil_trail: &'a [AF32],
}

impl<'a> FieldView<'a> {
    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn show_paths(&self) -> bool {
        self.show_paths
    }

    pub fn water(&self) -> &'a [WaterCell] {
        self.water
    }

    pub fn soil(&self) -> &'a [SoilCell] {
        self.soil
    }

    #[inline]
    pub fn water_height(&self, x: usize, y: usize) -> f32 {
        self.water[self.grid.index(x, y)].height
    }

    #[inline]
    pub fn soil_height(&self, x: usize, y: usize) -> f32 {
        self.soil[self.grid.index(x, y)].height
    }

    /// Water trail at `(x, y)`, or 0 while paths are hidden.
    #[inline]
    pub fn water_trail(&self, x: usize, y: usize) -> f32 {
        if self.show_paths {
            self.water_trail[self.grid.index(x, y)].load()
        } else {
            0.0
        }
    }

    /// Soil trail at `(x, y)`, or 0 while paths are hidden.
    #[inline]
    pub fn soil_trail(&self, x: usize, y: usize) -> f32 {
        if self.show_paths {
            self.soil_trail[self.grid.index(x, y)].load()
        } else {
            0.0
        }
    }

    /// Copies the trails out regardless of `show_paths`.
    pub fn trails(&self) -> (Vec<f32>, Vec<f32>) {
        (
            self.water_trail.iter().map(AF32::load).collect(),
            self.soil_trail.iter().map(AF32::load).collect(),
        )
    }

    pub fn stats(&self) -> FieldStats {
        let cell_area = self.grid.cell_size() * self.grid.cell_size();
        let (water, soil, max_depth, max_speed, dry) = self
            .water
            .par_iter()
            .zip(self.soil.par_iter())
            .map(|(w, s)| {
                (
                    w.height,
                    s.height,
                    w.height,
                    w.velocity.length(),
                    usize::from(w.height <= crate::water::DRY_DEPTH),
                )
            })
            .reduce(
                || (0.0, 0.0, 0.0, 0.0, 0),
                |a, b| (a.0 + b.0, a.1 + b.1, a.2.max(b.2), a.3.max(b.3), a.4 + b.4),
            );

        FieldStats {
            water_volume: water * cell_area,
            soil_volume: soil * cell_area,
            max_water_depth: max_depth,
            max_water_speed: max_speed,
            dry_cells: dry,
        }
    }
}

/// Aggregate diagnostics of a snapshot.
#[derive(Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct FieldStats {
    pub water_volume: f32,
    pub soil_volume: f32,
    pub max_water_depth: f32,
    pub max_water_speed: f32,
    pub dry_cells: usize,
}
