//! Real-time coupled water and soil transport on a regular grid.
//!
//! Each step runs two explicit, data-parallel stencils: water first, then
//! soil, which is driven by the water state just written. Heights, fluxes and
//! velocities are double buffered so every cell reads a consistent previous
//! state; the trails used for visualization are single buffers updated in
//! place. Operator edits go through [`Brush`] and land in both soil copies.

use atomic_float::AtomicF32;
use std::sync::atomic::Ordering;

pub mod brush;
pub mod config;
mod error;
pub mod fields;
pub mod grid;
pub mod params;
mod sim;
pub mod soil;
pub mod util;
mod view;
pub mod water;

pub use brush::{Brush, BrushMode};
pub use config::{GridConfig, SimConfig};
pub use error::SimError;
pub use fields::{DoubleBuffer, Fields, SoilCell, WaterCell};
pub use grid::{Direction, Grid};
pub use params::{Controls, ParameterDeriver, PointSource, SimConstants, SimParameters};
pub use sim::{BufferIndices, Simulation, Tick};
pub use view::{FieldStats, FieldView};

/// An `f32` that kernels may update through a shared reference.
///
/// Used for the trails: every cell stores only into its own slot, so
/// relaxed ordering is enough and the rayon join orders them with the rest
/// of the step.
pub struct AF32(pub AtomicF32);

impl Clone for AF32 {
    fn clone(&self) -> Self {
        Self::new(self.load())
    }
}

impl std::fmt::Debug for AF32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.load(), f)
    }
}

impl AF32 {
    #[inline]
    pub const fn new(float: f32) -> Self {
        Self(AtomicF32::new(float))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value, Ordering::Relaxed)
    }
}
