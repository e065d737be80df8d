use std::f32::consts::TAU;

use glam::Vec2;
use rayon::prelude::*;

use crate::grid::{Direction, Grid};
use crate::{SimError, AF32};

/// Lowest elevation the initial terrain may take.
pub const MIN_INITIAL_SOIL: f32 = 0.02;

/// Per-cell water state.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct WaterCell {
    /// Water depth above the soil.
    pub height: f32,
    /// Outgoing flow towards each neighbour, indexed by [`Direction::index`].
    pub flux: [f32; 4],
    /// Velocity derived from the flux balance. Never fed back into the
    /// water update; the soil kernel of the same step reads it.
    pub velocity: Vec2,
}

impl WaterCell {
    #[inline]
    pub fn flux(&self, dir: Direction) -> f32 {
        self.flux[dir.index()]
    }

    #[inline]
    pub fn total_outflow(&self) -> f32 {
        self.flux.iter().sum()
    }
}

/// Per-cell soil state.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SoilCell {
    /// Terrain elevation, never negative.
    pub height: f32,
    /// Sediment transport velocity, clamped to a fixed box every step.
    pub velocity: Vec2,
}

/// Two full copies of a field. Which one is current is decided by the
/// scheduler, not by the buffer.
#[derive(Clone, Debug)]
pub struct DoubleBuffer<T> {
    copies: [Vec<T>; 2],
}

impl<T> DoubleBuffer<T> {
    #[inline]
    pub fn get(&self, index: usize) -> &[T] {
        &self.copies[index & 1]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut [T] {
        &mut self.copies[index & 1]
    }

    /// Splits into the `src` copy for reading and the other one for writing.
    pub fn split(&mut self, src: usize) -> (&[T], &mut [T]) {
        let [a, b] = &mut self.copies;
        if src & 1 == 0 {
            (a.as_slice(), b.as_mut_slice())
        } else {
            (b.as_slice(), a.as_mut_slice())
        }
    }

    /// Both copies, for writes that must survive the next swap.
    pub fn both_mut(&mut self) -> [&mut [T]; 2] {
        let [a, b] = &mut self.copies;
        [a.as_mut_slice(), b.as_mut_slice()]
    }
}

/// All storage of the simulation.
///
/// Height, flux and velocity are double buffered. The two trails are not:
/// a cell's trail update only reads its own previous value, so kernels may
/// overwrite it in place while other cells are being processed.
pub struct Fields {
    pub grid: Grid,
    pub water: DoubleBuffer<WaterCell>,
    pub soil: DoubleBuffer<SoilCell>,
    pub water_trail: Vec<AF32>,
    pub soil_trail: Vec<AF32>,
}

impl Fields {
    /// Builds the starting terrain with dry, still water.
    pub fn new(grid: Grid) -> Result<Self, SimError> {
        let fields = Self::with_heights(grid, |x, y| (initial_soil_height(&grid, x, y), 0.0))?;
        log::info!(
            "initialized {}x{} fields (cell size {})",
            grid.width(),
            grid.height(),
            grid.cell_size()
        );
        Ok(fields)
    }

    /// Builds fields whose soil and water heights are given per cell by
    /// `heights(x, y) -> (soil, water)`. Everything else starts at zero and
    /// both copies of each buffer are identical.
    pub fn with_heights<F>(grid: Grid, heights: F) -> Result<Self, SimError>
    where
        F: Fn(usize, usize) -> (f32, f32) + Sync,
    {
        let cells = grid.len();
        let mut water = allocate::<WaterCell>(cells)?;
        let mut soil = allocate::<SoilCell>(cells)?;

        water
            .par_iter_mut()
            .zip(soil.par_iter_mut())
            .enumerate()
            .for_each(|(i, (water, soil))| {
                let (x, y) = grid.coords(i);
                let (soil_height, water_height) = heights(x, y);
                soil.height = soil_height.max(0.0);
                water.height = water_height.max(0.0);
            });

        let water_copy = clone_storage(&water)?;
        let soil_copy = clone_storage(&soil)?;

        Ok(Self {
            grid,
            water: DoubleBuffer {
                copies: [water, water_copy],
            },
            soil: DoubleBuffer {
                copies: [soil, soil_copy],
            },
            water_trail: allocate_trail(cells)?,
            soil_trail: allocate_trail(cells)?,
        })
    }
}

/// Procedural starting terrain: a tilted plane with two shallow ridges and a
/// basin, never lower than [`MIN_INITIAL_SOIL`].
pub fn initial_soil_height(grid: &Grid, x: usize, y: usize) -> f32 {
    let u = (x as f32 + 0.5) / grid.width() as f32;
    let v = (y as f32 + 0.5) / grid.height() as f32;

    let base = 0.35;
    let slope = 0.3 * (1.0 - v) + 0.08 * u;
    let ridge_a = 0.04 * (u * TAU * 3.0).sin();
    let ridge_b = 0.025 * (v * TAU * 5.0 + 0.7).sin();

    let du = u - 0.6;
    let dv = v - 0.55;
    let basin = -0.22 * (-(du * du + dv * dv) / (2.0 * 0.09 * 0.09)).exp();

    (base + slope + ridge_a + ridge_b + basin).max(MIN_INITIAL_SOIL)
}

fn allocate<T: Clone + Default>(cells: usize) -> Result<Vec<T>, SimError> {
    let mut storage = Vec::new();
    storage
        .try_reserve_exact(cells)
        .map_err(|source| SimError::Allocation { cells, source })?;
    storage.resize(cells, T::default());
    Ok(storage)
}

fn clone_storage<T: Clone>(from: &[T]) -> Result<Vec<T>, SimError> {
    let mut storage = Vec::new();
    storage
        .try_reserve_exact(from.len())
        .map_err(|source| SimError::Allocation {
            cells: from.len(),
            source,
        })?;
    storage.extend_from_slice(from);
    Ok(storage)
}

fn allocate_trail(cells: usize) -> Result<Vec<AF32>, SimError> {
    let mut storage = Vec::new();
    storage
        .try_reserve_exact(cells)
        .map_err(|source| SimError::Allocation { cells, source })?;
    storage.extend((0..cells).map(|_| AF32::new(0.0)));
    Ok(storage)
}
