use glam::Vec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::fields::{DoubleBuffer, SoilCell};
use crate::grid::Grid;

/// Whether a stroke raises or lowers the terrain.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum BrushMode {
    Deposit,
    Erode,
}

impl BrushMode {
    #[inline]
    fn sign(self) -> f32 {
        match self {
            BrushMode::Deposit => 1.0,
            BrushMode::Erode => -1.0,
        }
    }
}

/// An operator edit of the soil heightfield.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub struct Brush {
    /// Centre in grid coordinates (cell `(x, y)` spans `[x, x + 1)`).
    pub center: Vec2,
    /// Radius in cells. Non-positive radii touch nothing.
    pub radius: f32,
    /// Height change at the centre, falling off linearly to 0 at `radius`.
    pub intensity: f32,
    pub mode: BrushMode,
}

impl Brush {
    /// Builds a brush from a pointer position in `[0, 1]^2`. Holding the
    /// modifier erodes instead of depositing.
    pub fn from_pointer(
        grid: &Grid,
        pointer: Vec2,
        radius: f32,
        intensity: f32,
        modifier: bool,
    ) -> Self {
        Self {
            center: grid.denormalize(pointer),
            radius,
            intensity,
            mode: if modifier {
                BrushMode::Erode
            } else {
                BrushMode::Deposit
            },
        }
    }

    /// Height change for a cell centred at `at`, or `None` if outside the brush.
    #[inline]
    pub fn delta_at(&self, at: Vec2) -> Option<f32> {
        let dist = at.distance(self.center);
        (dist < self.radius).then(|| self.intensity * (1.0 - dist / self.radius) * self.mode.sign())
    }

    fn is_noop(&self) -> bool {
        !(self.radius.is_finite() && self.radius > 0.0)
            || !self.intensity.is_finite()
            || !self.center.is_finite()
    }

    /// Applies the stroke to both copies of the soil heightfield, so the edit
    /// survives the next buffer swap. Returns the number of cells touched in
    /// each copy.
    ///
    /// Must not run concurrently with a step; holding `&mut` guarantees it.
    pub fn apply(&self, grid: &Grid, soil: &mut DoubleBuffer<SoilCell>) -> usize {
        if self.is_noop() {
            log::trace!("ignoring degenerate brush {:?}", self);
            return 0;
        }

        // Only rows and columns the disc can reach.
        let min_x = (self.center.x - self.radius).floor().max(0.0) as usize;
        let min_y = (self.center.y - self.radius).floor().max(0.0) as usize;
        let max_x = ((self.center.x + self.radius).ceil().max(0.0) as usize).min(grid.width());
        let max_y = ((self.center.y + self.radius).ceil().max(0.0) as usize).min(grid.height());
        if min_x >= max_x || min_y >= max_y {
            return 0;
        }

        let mut touched = 0;
        for copy in soil.both_mut() {
            touched = copy
                .par_chunks_mut(grid.width())
                .enumerate()
                .skip(min_y)
                .take(max_y - min_y)
                .map(|(y, row)| {
                    let mut count = 0;
                    for (x, cell) in row.iter_mut().enumerate().take(max_x).skip(min_x) {
                        if let Some(delta) = self.delta_at(grid.cell_center(x, y)) {
                            cell.height = (cell.height + delta).max(0.0);
                            count += 1;
                        }
                    }
                    count
                })
                .sum::<usize>();
        }

        log::trace!("brush {:?} touched {} cells", self, touched);
        touched
    }
}
