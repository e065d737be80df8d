use crate::brush::Brush;
use crate::fields::Fields;
use crate::grid::Grid;
use crate::params::{Controls, ParameterDeriver, SimConstants, SimParameters};
use crate::soil::step_soil;
use crate::view::FieldView;
use crate::water::step_water;
use crate::SimError;

/// Which copy of each double-buffered field is current.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferIndices {
    pub water: usize,
    pub soil: usize,
}

impl BufferIndices {
    /// The copies the next step writes into.
    #[inline]
    pub fn next(self) -> Self {
        Self {
            water: 1 - self.water,
            soil: 1 - self.soil,
        }
    }
}

/// What a call to [`Simulation::tick`] did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tick {
    /// A step ran and was committed.
    Stepped,
    /// Paused: parameters were refreshed, nothing else changed.
    Paused,
}

/// The simulation core: field storage, buffer indices and parameter
/// derivation. Steps, edits and reads all go through `&mut self`/`&self`,
/// so an edit can never interleave with a step.
pub struct Simulation {
    fields: Fields,
    indices: BufferIndices,
    constants: SimConstants,
    deriver: ParameterDeriver,
    params: SimParameters,
    steps: u64,
}

impl Simulation {
    /// Allocates and initializes all fields for `grid`.
    pub fn new(grid: Grid, constants: SimConstants) -> Result<Self, SimError> {
        Ok(Self::with_fields(Fields::new(grid)?, constants))
    }

    /// Wraps already initialized fields. Copy 0 is current.
    pub fn with_fields(fields: Fields, constants: SimConstants) -> Self {
        let grid = fields.grid;
        let params =
            crate::params::derive(grid, &constants, &Controls::default(), 0.0, 0);
        Self {
            fields,
            indices: BufferIndices::default(),
            constants,
            deriver: ParameterDeriver::new(),
            params,
            steps: 0,
        }
    }

    pub fn grid(&self) -> Grid {
        self.fields.grid
    }

    pub fn indices(&self) -> BufferIndices {
        self.indices
    }

    pub fn constants(&self) -> &SimConstants {
        &self.constants
    }

    /// The block derived on the last tick.
    pub fn params(&self) -> &SimParameters {
        &self.params
    }

    /// Number of committed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// One frame: derive parameters from `controls` and the wall-clock
    /// `timestamp` (seconds), then step unless paused.
    pub fn tick(&mut self, timestamp: f64, controls: &Controls) -> Tick {
        self.params = self
            .deriver
            .next(self.fields.grid, &self.constants, controls, timestamp);

        if !controls.running {
            log::trace!("paused tick (params v{})", self.params.version);
            return Tick::Paused;
        }

        self.step();
        Tick::Stepped
    }

    /// Runs the water kernel then the soil kernel with the block derived on
    /// this tick and commits both.
    fn step(&mut self) {
        let params = &self.params;
        let Fields {
            water,
            soil,
            water_trail,
            soil_trail,
            ..
        } = &mut self.fields;
        let src = self.indices;

        let (water_src, water_dst) = water.split(src.water);
        let (soil_src, soil_dst) = soil.split(src.soil);

        step_water(params, water_src, soil_src, water_dst, water_trail);
        // Returning from the parallel water pass is the barrier the soil
        // kernel relies on.
        step_soil(params, soil_src, water_dst, soil_dst, soil_trail);

        self.indices = src.next();
        self.steps += 1;

        let interval = self.constants.stats_interval;
        if interval != 0 && self.steps % interval == 0 {
            log::debug!("step {}: {:?}", self.steps, self.view().stats());
        }
    }

    /// Applies an operator edit between steps. Returns the number of cells
    /// touched.
    pub fn paint(&mut self, brush: &Brush) -> usize {
        let grid = self.fields.grid;
        brush.apply(&grid, &mut self.fields.soil)
    }

    /// The last committed state.
    pub fn view(&self) -> FieldView<'_> {
        FieldView {
            grid: self.fields.grid,
            show_paths: self.params.show_paths,
            water: self.fields.water.get(self.indices.water),
            soil: self.fields.soil.get(self.indices.soil),
            water_trail: &self.fields.water_trail,
            soil_trail: &self.fields.soil_trail,
        }
    }
}
