//! Water transport: flux, depth and the velocity the soil kernel is driven by.
//!
//! Flow is a damped outflow model. Each cell pushes water towards every
//! neighbour whose water surface is lower, proportionally to the height
//! difference, and never more than it holds.

use glam::Vec2;
use rayon::prelude::*;

use crate::fields::{SoilCell, WaterCell};
use crate::grid::Direction;
use crate::params::{sources_at, SimParameters};
use crate::AF32;

/// Depth used in place of smaller depths when dividing by volume.
pub const MIN_VELOCITY_DEPTH: f32 = 0.02;
/// Depth at or below which diagnostics count a cell as dry.
pub const DRY_DEPTH: f32 = 1e-3;
/// Per-step decay of the water trail, an exponential moving average of
/// `|velocity| * max(depth, MIN_VELOCITY_DEPTH)`.
pub const WATER_TRAIL_DECAY: f32 = 0.92;

/// Advances water by one step.
///
/// Reads only `water_src` and `soil_src` and writes every cell of
/// `water_dst`. The trail is updated in place.
pub fn step_water(
    params: &SimParameters,
    water_src: &[WaterCell],
    soil_src: &[SoilCell],
    water_dst: &mut [WaterCell],
    trail: &[AF32],
) {
    let cells = params.grid.len();
    assert_eq!(water_src.len(), cells);
    assert_eq!(soil_src.len(), cells);
    assert_eq!(water_dst.len(), cells);
    assert_eq!(trail.len(), cells);

    water_dst
        .par_iter_mut()
        .enumerate()
        .for_each(|(index, dst)| {
            *dst = water_cell(params, water_src, soil_src, index);

            let sample = dst.velocity.length() * dst.height.max(MIN_VELOCITY_DEPTH);
            let previous = trail[index].load();
            trail[index].store(previous * WATER_TRAIL_DECAY + sample * (1.0 - WATER_TRAIL_DECAY));
        });
}

/// New state of the cell at `index`, computed purely from the source snapshot.
pub fn water_cell(
    params: &SimParameters,
    water_src: &[WaterCell],
    soil_src: &[SoilCell],
    index: usize,
) -> WaterCell {
    let grid = &params.grid;
    let (x, y) = grid.coords(index);
    let here = water_src[index];
    let dt = params.dt_water;

    let surface = |i: usize| water_src[i].height + soil_src[i].height;
    let surface_here = surface(index);

    let flow = dt * params.flow_scale();
    let keep = 1.0 - params.flux_damping;
    let mut flux = [0.0; 4];
    for dir in Direction::ALL {
        let diff = (surface_here - surface(grid.clamped(x, y, dir))).max(0.0);
        flux[dir.index()] = (here.flux(dir) * keep + flow * diff).max(0.0);
    }

    let mut outflow: f32 = flux.iter().sum();
    if dt > 0.0 && outflow * dt > here.height {
        let scale = here.height / (outflow * dt);
        flux.iter_mut().for_each(|f| *f *= scale);
        outflow *= scale;
    }

    // Neighbours' fluxes from the previous step; nothing flows in from
    // outside the grid.
    let inflow: f32 = Direction::ALL
        .iter()
        .filter_map(|&dir| {
            grid.neighbour(x, y, dir)
                .map(|n| water_src[n].flux(dir.opposite()))
        })
        .sum();

    let source = sources_at(&params.water_sources, grid.cell_center(x, y));
    let mut height = here.height + dt * (inflow - outflow) + dt * source;

    if height < params.water_floor {
        height = params.water_floor;
        flux = [0.0; 4];
    }

    let east_west = flux[Direction::East.index()] - flux[Direction::West.index()];
    let south_north = flux[Direction::South.index()] - flux[Direction::North.index()];
    let velocity =
        Vec2::new(east_west, south_north) / grid.cell_size() / height.max(MIN_VELOCITY_DEPTH);

    WaterCell {
        height,
        flux,
        velocity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::params::{derive, Controls, SimConstants};

    fn params(grid: Grid, dt: f32) -> SimParameters {
        let controls = Controls {
            water_input: 0.0,
            ..Default::default()
        };
        let mut params = derive(grid, &SimConstants::default(), &controls, 1.0 / 60.0, 1);
        params.dt_water = dt;
        params
    }

    fn uniform(grid: Grid, water: f32, soil: f32) -> (Vec<WaterCell>, Vec<SoilCell>) {
        let water = vec![
            WaterCell {
                height: water,
                ..Default::default()
            };
            grid.len()
        ];
        let soil = vec![
            SoilCell {
                height: soil,
                ..Default::default()
            };
            grid.len()
        ];
        (water, soil)
    }

    #[test]
    fn limiter_never_drains_below_zero() {
        let grid = Grid::new(3, 3, 1.0).unwrap();
        let (mut water, mut soil) = uniform(grid, 0.0, 0.0);
        let center = grid.index(1, 1);
        water[center].height = 0.01;
        water[center].flux = [50.0; 4];
        soil[center].height = 2.0;

        let params = params(grid, 0.5);
        let cell = water_cell(&params, &water, &soil, center);

        assert!(cell.height >= params.water_floor);
        // The neighbours had no flux so all of the cell's water may leave,
        // but no more.
        assert!(cell.total_outflow() * params.dt_water <= 0.01 + 1e-6);
    }

    #[test]
    fn limiter_boundary_case_empties_exactly() {
        let grid = Grid::new(3, 1, 1.0).unwrap();
        let (mut water, mut soil) = uniform(grid, 0.0, 0.0);
        water[1].height = 0.2;
        water[1].flux = [0.0, 10.0, 0.0, 10.0];
        soil[1].height = 1.0;

        let mut params = params(grid, 1.0);
        params.flux_damping = 0.0;
        params.water_floor = 0.0;
        let cell = water_cell(&params, &water, &soil, 1);

        assert!(cell.height >= 0.0);
        assert!(cell.height.abs() < 1e-6, "height {}", cell.height);
    }

    #[test]
    fn flat_pool_stays_flat() {
        let grid = Grid::new(4, 4, 1.0).unwrap();
        let (water, soil) = uniform(grid, 0.1, 0.5);
        let mut params = params(grid, 1.0);
        // flow_scale * dt * unit difference would be 0.02 on a slope
        params.flow_acceleration = 0.02 / params.gravity;

        let mut dst = vec![WaterCell::default(); grid.len()];
        let trail: Vec<AF32> = (0..grid.len()).map(|_| AF32::new(0.0)).collect();
        step_water(&params, &water, &soil, &mut dst, &trail);

        for cell in &dst {
            assert_eq!(cell.flux, [0.0; 4]);
            assert!((cell.height - 0.1).abs() < 1e-7);
            assert_eq!(cell.velocity, Vec2::ZERO);
        }
        assert!(trail.iter().all(|t| t.load() == 0.0));
    }

    #[test]
    fn corner_cell_without_lower_neighbours_has_no_outflow() {
        let grid = Grid::new(3, 3, 1.0).unwrap();
        let (water, mut soil) = uniform(grid, 0.1, 1.0);
        soil[grid.index(0, 0)].height = 0.5;

        let params = params(grid, 0.5);
        let cell = water_cell(&params, &water, &soil, grid.index(0, 0));
        assert_eq!(cell.flux, [0.0; 4]);
    }

    #[test]
    fn water_flows_downhill() {
        let grid = Grid::new(3, 1, 1.0).unwrap();
        let (water, mut soil) = uniform(grid, 0.1, 0.0);
        soil[0].height = 1.0;

        let params = params(grid, 0.1);
        let cell = water_cell(&params, &water, &soil, 0);
        assert!(cell.flux(Direction::East) > 0.0);
        assert_eq!(cell.flux(Direction::West), 0.0);
        assert!(cell.velocity.x > 0.0);
        assert!(cell.height < 0.1);
    }

    #[test]
    fn inflow_comes_from_neighbours_previous_flux() {
        let grid = Grid::new(2, 1, 1.0).unwrap();
        let (mut water, soil) = uniform(grid, 0.1, 0.0);
        water[0].flux[Direction::East.index()] = 0.05;

        let mut params = params(grid, 1.0);
        params.flow_acceleration = 0.0;
        let receiver = water_cell(&params, &water, &soil, 1);
        assert!((receiver.height - 0.15).abs() < 1e-6);
    }

    #[test]
    fn drying_cell_is_clamped_to_the_floor_without_flux() {
        let grid = Grid::new(2, 1, 1.0).unwrap();
        let (mut water, mut soil) = uniform(grid, 0.0, 0.0);
        water[0].height = 1e-6;
        soil[0].height = 1.0;

        let params = params(grid, 0.5);
        let cell = water_cell(&params, &water, &soil, 0);
        assert_eq!(cell.height, params.water_floor);
        assert_eq!(cell.flux, [0.0; 4]);
    }

    #[test]
    fn sources_add_water() {
        let grid = Grid::new(20, 20, 1.0).unwrap();
        let (water, soil) = uniform(grid, 0.0, 0.0);
        let params = derive(
            grid,
            &SimConstants::default(),
            &Controls::default(),
            1.0 / 60.0,
            1,
        );
        let source = params.water_sources[0];
        let index = grid.index(source.center.x as usize, source.center.y as usize);
        let cell = water_cell(&params, &water, &soil, index);
        assert!(cell.height > params.water_floor);
    }

    #[test]
    fn water_trail_settles_on_the_sample() {
        let grid = Grid::new(2, 1, 1.0).unwrap();
        let (mut water, soil) = uniform(grid, 0.1, 0.0);
        water[0].flux[Direction::East.index()] = 0.05;

        let mut params = params(grid, 1.0);
        params.flow_acceleration = 0.0;

        let mut dst = vec![WaterCell::default(); grid.len()];
        let trail: Vec<AF32> = (0..grid.len()).map(|_| AF32::new(0.0)).collect();
        step_water(&params, &water, &soil, &mut dst, &trail);

        let sample = dst[0].velocity.length() * dst[0].height.max(MIN_VELOCITY_DEPTH);
        assert!(sample > 0.0);
        let first = trail[0].load();
        assert!((first - sample * (1.0 - WATER_TRAIL_DECAY)).abs() < 1e-6);

        for _ in 0..300 {
            step_water(&params, &water, &soil, &mut dst, &trail);
            assert!(trail[0].load() <= sample * (1.0 + 1e-5));
        }
        let steady = trail[0].load();
        assert!(
            (steady - sample).abs() < sample * 1e-3,
            "sample={sample} steady={steady}"
        );
    }
}
