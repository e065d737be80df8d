use glam::Vec2;
use serde::{Deserialize, Serialize};
use tinyvec::ArrayVec;

use crate::grid::Grid;

/// Live operator inputs.
///
/// If you're not sure where to begin, `Default::default` for this
/// structure gives a running simulation at nominal speed.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Controls {
    /// Multiplier on both the water and the soil time step.
    ///
    /// Reasonable values lie within `[0, 4]`.
    pub time_scale: f32,
    /// Multiplier on the strength of the water point sources. 0 turns them off.
    pub water_input: f32,
    /// Stiffens the sediment: lowers soil diffusion and raises soil damping
    /// and deposition.
    ///
    /// Reasonable values lie within `[0, 4]`.
    pub soil_viscosity: f32,
    /// Whether trail overlays are visible. Has no effect on the simulation.
    pub show_paths: bool,
    /// When false, ticks only refresh parameters and never step.
    pub running: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            water_input: 1.0,
            soil_viscosity: 1.0,
            show_paths: false,
            running: true,
        }
    }
}

impl Controls {
    /// Replaces non-finite knobs with their defaults and negative ones with 0.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let knob = |value: f32, default: f32, name: &str| {
            if value.is_finite() {
                value.max(0.0)
            } else {
                log::warn!("control {name} is not finite ({value}), using {default}");
                default
            }
        };
        Self {
            time_scale: knob(self.time_scale, defaults.time_scale, "time_scale"),
            water_input: knob(self.water_input, defaults.water_input, "water_input"),
            soil_viscosity: knob(
                self.soil_viscosity,
                defaults.soil_viscosity,
                "soil_viscosity",
            ),
            ..self
        }
    }
}

/// A fixed point source, as configured.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct SourceConfig {
    /// Position in `[0, 1]^2` over the grid.
    pub position: Vec2,
    /// Radius in cells.
    pub radius: f32,
    /// Fraction of the domain's base source strength.
    pub weight: f32,
}

/// Constants every derived parameter block is built from.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SimConstants {
    /// Water time step at a time scale of 1 and a 60 Hz frame.
    pub base_dt_water: f32,
    /// Soil time step at a time scale of 1 and a 60 Hz frame.
    pub base_dt_soil: f32,
    /// Upper bound on the frame delta multiplier. Long stalls never
    /// integrate more than this many nominal frames at once.
    pub max_delta_factor: f32,
    /// Delta used while paused or before the first timestamp, in seconds.
    pub nominal_frame_seconds: f32,

    pub gravity: f32,
    /// Scales how fast a height difference turns into flux.
    pub flow_acceleration: f32,
    /// Fraction of the previous flux lost every step.
    ///
    /// Reasonable values lie within `[0, 0.2]`.
    pub flux_damping: f32,
    /// Water depth below which a cell counts as dry.
    pub water_floor: f32,
    /// Water injected per unit time at the centre of the first source.
    pub water_source_strength: f32,

    pub advection_gain: f32,
    pub slope_gain: f32,
    /// Soil damping per unit of viscosity.
    pub soil_damping: f32,
    /// Soil diffusion at a viscosity of 0.75; scales with `1 / (viscosity + 0.25)`.
    pub soil_diffusion: f32,
    /// Soil injected per unit time at the centre of each soil source.
    pub soil_source_strength: f32,

    pub erosion_rate: f32,
    pub deposition_rate: f32,
    /// Flow magnitude separating erosion from deposition.
    pub erosion_threshold: f32,

    pub water_sources: [SourceConfig; 2],
    pub soil_sources: [SourceConfig; 2],

    /// Log field statistics every this many steps. 0 disables it.
    pub stats_interval: u64,
}

impl Default for SimConstants {
    fn default() -> Self {
        Self {
            base_dt_water: 0.2,
            base_dt_soil: 0.05,
            max_delta_factor: 4.0,
            nominal_frame_seconds: 1.0 / 60.0,
            gravity: 9.81,
            flow_acceleration: 0.2,
            flux_damping: 0.02,
            water_floor: 1e-4,
            water_source_strength: 0.05,
            advection_gain: 0.6,
            slope_gain: 0.4,
            soil_damping: 0.08,
            soil_diffusion: 0.02,
            soil_source_strength: 0.04,
            erosion_rate: 0.002,
            deposition_rate: 0.0004,
            erosion_threshold: 0.05,
            water_sources: [
                SourceConfig {
                    position: Vec2::new(0.25, 0.2),
                    radius: 8.0,
                    weight: 1.0,
                },
                SourceConfig {
                    position: Vec2::new(0.7, 0.35),
                    radius: 5.0,
                    weight: 0.5,
                },
            ],
            soil_sources: [
                SourceConfig {
                    position: Vec2::new(0.5, 0.15),
                    radius: 3.0,
                    weight: 1.0,
                },
                SourceConfig {
                    position: Vec2::new(0.2, 0.6),
                    radius: 3.0,
                    weight: 1.0,
                },
            ],
            stats_interval: 600,
        }
    }
}

/// A point source resolved onto the grid.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PointSource {
    /// Centre in grid coordinates.
    pub center: Vec2,
    pub radius: f32,
    pub strength: f32,
}

impl PointSource {
    /// Linear radial falloff: `strength` at the centre, 0 at `radius` and beyond.
    #[inline]
    pub fn contribution(&self, at: Vec2) -> f32 {
        if self.radius <= 0.0 {
            return 0.0;
        }
        let dist = at.distance(self.center);
        if dist < self.radius {
            self.strength * (1.0 - dist / self.radius)
        } else {
            0.0
        }
    }
}

/// Sum of all sources' contributions at `at`.
#[inline]
pub fn sources_at(sources: &[PointSource], at: Vec2) -> f32 {
    sources.iter().map(|s| s.contribution(at)).sum()
}

/// Coefficients for one frame. The only way kernels see operator intent.
#[derive(Clone, Debug, PartialEq)]
pub struct SimParameters {
    /// Increases by one every time a block is derived.
    pub version: u64,
    pub grid: Grid,
    pub show_paths: bool,

    pub dt_water: f32,
    pub dt_soil: f32,
    pub gravity: f32,

    pub flow_acceleration: f32,
    pub flux_damping: f32,
    pub water_floor: f32,
    pub water_source_strength: f32,

    pub advection_gain: f32,
    pub slope_gain: f32,
    pub soil_damping: f32,
    pub soil_diffusion: f32,

    pub erosion_rate: f32,
    pub deposition_rate: f32,
    pub erosion_threshold: f32,

    pub water_sources: ArrayVec<[PointSource; 2]>,
    pub soil_sources: ArrayVec<[PointSource; 2]>,
}

impl SimParameters {
    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.grid.cell_size()
    }

    /// `flow_acceleration * gravity / cell_size`.
    #[inline]
    pub fn flow_scale(&self) -> f32 {
        self.flow_acceleration * self.gravity / self.grid.cell_size()
    }
}

/// `clamp(elapsed * 60, 0, max)`.
#[inline]
pub fn delta_factor(elapsed_seconds: f32, max: f32) -> f32 {
    if elapsed_seconds.is_finite() {
        (elapsed_seconds * 60.0).clamp(0.0, max)
    } else {
        0.0
    }
}

/// Builds the parameter block for one frame.
pub fn derive(
    grid: Grid,
    constants: &SimConstants,
    controls: &Controls,
    elapsed_seconds: f32,
    version: u64,
) -> SimParameters {
    let controls = controls.sanitized();
    let factor = delta_factor(elapsed_seconds, constants.max_delta_factor);
    let viscosity = controls.soil_viscosity;

    let water_source_strength = constants.water_source_strength * controls.water_input;
    let resolve = |sources: &[SourceConfig; 2], strength: f32| {
        sources
            .iter()
            .map(|source| PointSource {
                center: grid.denormalize(source.position),
                radius: source.radius,
                strength: strength * source.weight,
            })
            .collect::<ArrayVec<[PointSource; 2]>>()
    };

    SimParameters {
        version,
        grid,
        show_paths: controls.show_paths,
        dt_water: constants.base_dt_water * controls.time_scale * factor,
        dt_soil: constants.base_dt_soil * controls.time_scale * factor,
        gravity: constants.gravity,
        flow_acceleration: constants.flow_acceleration,
        flux_damping: constants.flux_damping,
        water_floor: constants.water_floor,
        water_source_strength,
        advection_gain: constants.advection_gain,
        slope_gain: constants.slope_gain,
        soil_damping: constants.soil_damping * viscosity,
        soil_diffusion: constants.soil_diffusion / (viscosity + 0.25),
        erosion_rate: constants.erosion_rate * (0.75 + 0.25 * controls.time_scale),
        deposition_rate: constants.deposition_rate * (0.75 + 0.25 * viscosity),
        erosion_threshold: constants.erosion_threshold,
        water_sources: resolve(&constants.water_sources, water_source_strength),
        soil_sources: resolve(&constants.soil_sources, constants.soil_source_strength),
    }
}

/// Turns timestamps into elapsed time and stamps versions.
#[derive(Clone, Debug, Default)]
pub struct ParameterDeriver {
    last_timestamp: Option<f64>,
    version: u64,
}

impl ParameterDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the block for a frame seen at `timestamp` seconds.
    ///
    /// While paused the nominal frame delta is used so the block stays
    /// well-formed without accounting for real time.
    pub fn next(
        &mut self,
        grid: Grid,
        constants: &SimConstants,
        controls: &Controls,
        timestamp: f64,
    ) -> SimParameters {
        let elapsed = match self.last_timestamp {
            Some(last) if controls.running => (timestamp - last).max(0.0) as f32,
            _ => constants.nominal_frame_seconds,
        };
        self.last_timestamp = Some(timestamp);
        self.version += 1;
        derive(grid, constants, controls, elapsed, self.version)
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
