//! Soil transport: sediment velocity, advection, smoothing and
//! erosion/deposition driven by the water state of the same step.

use glam::Vec2;
use rayon::prelude::*;

use crate::fields::{SoilCell, WaterCell};
use crate::grid::Direction;
use crate::params::{sources_at, SimParameters};
use crate::water::MIN_VELOCITY_DEPTH;
use crate::AF32;

/// Each sediment velocity component is clamped to `[-MAX, MAX]`.
pub const MAX_SEDIMENT_VELOCITY: f32 = 0.8;
/// Upper bound on how strongly water velocity drags sediment along.
pub const MAX_ADVECTION_SCALE: f32 = 1.5;
/// Depth beyond which no deposition happens (`1 / 12`).
const DEPOSITION_DEPTH_FALLOFF: f32 = 12.0;
/// Blend of the soil trail towards the current flow magnitude.
pub const SOIL_TRAIL_BLEND: f32 = 0.08;

/// Advances soil by one step.
///
/// `water` must be the snapshot the water kernel just wrote for this step.
pub fn step_soil(
    params: &SimParameters,
    soil_src: &[SoilCell],
    water: &[WaterCell],
    soil_dst: &mut [SoilCell],
    trail: &[AF32],
) {
    let cells = params.grid.len();
    assert_eq!(soil_src.len(), cells);
    assert_eq!(water.len(), cells);
    assert_eq!(soil_dst.len(), cells);
    assert_eq!(trail.len(), cells);

    soil_dst
        .par_iter_mut()
        .enumerate()
        .for_each(|(index, dst)| {
            let (cell, flow) = soil_cell(params, soil_src, water, index);
            *dst = cell;

            let previous = trail[index].load();
            trail[index].store(previous + (flow - previous) * SOIL_TRAIL_BLEND);
        });
}

/// Magnitude of water flow over a cell, the quantity erosion responds to.
#[inline]
pub fn flow_magnitude(water: &WaterCell) -> f32 {
    water.velocity.length() * (water.height + MIN_VELOCITY_DEPTH)
}

/// Sediment velocity of the cell at `index` after this step's update.
///
/// Pure in the source snapshot, so neighbours can evaluate it for each
/// other without reading the destination buffer.
pub fn sediment_velocity(
    params: &SimParameters,
    soil_src: &[SoilCell],
    water: &[WaterCell],
    index: usize,
) -> Vec2 {
    let grid = &params.grid;
    let (x, y) = grid.coords(index);
    let height = |dir: Direction| soil_src[grid.clamped(x, y, dir)].height;

    let gradient = Vec2::new(
        height(Direction::East) - height(Direction::West),
        height(Direction::South) - height(Direction::North),
    ) * 0.5
        / grid.cell_size();

    let water = &water[index];
    let advection_scale = (water.height * 4.0 + 0.25).min(MAX_ADVECTION_SCALE);
    let accel = params.advection_gain * advection_scale * water.velocity - params.slope_gain * gradient;

    let velocity = (soil_src[index].velocity + params.dt_soil * accel)
        * (1.0 - params.soil_damping).max(0.0);
    velocity.clamp(
        Vec2::splat(-MAX_SEDIMENT_VELOCITY),
        Vec2::splat(MAX_SEDIMENT_VELOCITY),
    )
}

/// New state of the cell at `index` and the flow magnitude feeding its trail.
pub fn soil_cell(
    params: &SimParameters,
    soil_src: &[SoilCell],
    water: &[WaterCell],
    index: usize,
) -> (SoilCell, f32) {
    let grid = &params.grid;
    let (x, y) = grid.coords(index);
    let dt = params.dt_soil;
    let here = soil_src[index].height;

    let velocity = sediment_velocity(params, soil_src, water, index);

    // Backward differences against the west and north neighbours; at the
    // edge the neighbour is the cell itself and the term vanishes.
    let west = grid.clamped(x, y, Direction::West);
    let north = grid.clamped(x, y, Direction::North);
    let west_velocity = if west == index {
        velocity
    } else {
        sediment_velocity(params, soil_src, water, west)
    };
    let north_velocity = if north == index {
        velocity
    } else {
        sediment_velocity(params, soil_src, water, north)
    };
    let divergence =
        ((velocity.x - west_velocity.x) + (velocity.y - north_velocity.y)) / grid.cell_size();

    let neighbours: f32 = Direction::ALL
        .iter()
        .map(|&dir| soil_src[grid.clamped(x, y, dir)].height)
        .sum();
    let mut height = here - dt * divergence + params.soil_diffusion * (neighbours - 4.0 * here);

    let water = &water[index];
    let flow = flow_magnitude(water);
    let threshold = params.erosion_threshold;
    let erosion = (flow - threshold).max(0.0) * params.erosion_rate;
    let shallow = (1.0 - water.height * DEPOSITION_DEPTH_FALLOFF).max(0.0);
    let deposition = (threshold - flow).max(0.0) * params.deposition_rate * shallow;
    height += deposition - erosion;

    height += dt * sources_at(&params.soil_sources, grid.cell_center(x, y));

    (
        SoilCell {
            height: height.max(0.0),
            velocity,
        },
        flow,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::params::{derive, Controls, SimConstants};

    fn params(grid: Grid) -> SimParameters {
        let mut params = derive(
            grid,
            &SimConstants::default(),
            &Controls::default(),
            1.0 / 60.0,
            1,
        );
        params.soil_sources.clear();
        params
    }

    fn soil(grid: Grid, height: f32) -> Vec<SoilCell> {
        vec![
            SoilCell {
                height,
                ..Default::default()
            };
            grid.len()
        ]
    }

    fn still_water(grid: Grid, height: f32) -> Vec<WaterCell> {
        vec![
            WaterCell {
                height,
                ..Default::default()
            };
            grid.len()
        ]
    }

    #[test]
    fn sediment_velocity_is_clamped() {
        let grid = Grid::new(3, 3, 1.0).unwrap();
        let soil = soil(grid, 1.0);
        let mut water = still_water(grid, 1.0);
        let center = grid.index(1, 1);
        water[center].velocity = Vec2::new(1e6, -1e6);

        let mut params = params(grid);
        params.soil_damping = 0.0;
        let v = sediment_velocity(&params, &soil, &water, center);
        assert_eq!(v, Vec2::new(MAX_SEDIMENT_VELOCITY, -MAX_SEDIMENT_VELOCITY));
    }

    #[test]
    fn sediment_slides_down_the_slope() {
        let grid = Grid::new(3, 1, 1.0).unwrap();
        let mut soil = soil(grid, 0.0);
        soil[0].height = 2.0;
        soil[1].height = 1.0;
        let water = still_water(grid, 0.0);

        let v = sediment_velocity(&params(grid), &soil, &water, 1);
        assert!(v.x > 0.0);
        assert_eq!(v.y, 0.0);
    }

    #[test]
    fn height_never_goes_negative() {
        let grid = Grid::new(4, 4, 1.0).unwrap();
        let soil = soil(grid, 0.001);
        let mut water = still_water(grid, 0.05);
        for cell in &mut water {
            cell.velocity = Vec2::new(50.0, -30.0);
        }
        let mut params = params(grid);
        params.erosion_rate = 10.0;

        let mut dst = vec![SoilCell::default(); grid.len()];
        let trail: Vec<AF32> = (0..grid.len()).map(|_| AF32::new(0.0)).collect();
        step_soil(&params, &soil, &water, &mut dst, &trail);

        assert!(dst.iter().all(|c| c.height == 0.0));
        assert!(trail.iter().all(|t| t.load() > 0.0));
    }

    #[test]
    fn dry_shallow_cells_collect_deposits() {
        let grid = Grid::new(3, 3, 1.0).unwrap();
        let soil = soil(grid, 0.5);
        let water = still_water(grid, 0.0);
        let params = params(grid);

        let (cell, flow) = soil_cell(&params, &soil, &water, grid.index(1, 1));
        assert_eq!(flow, 0.0);
        let expected = 0.5 + params.erosion_threshold * params.deposition_rate;
        assert!((cell.height - expected).abs() < 1e-6);
    }

    #[test]
    fn deep_water_suppresses_deposition() {
        let grid = Grid::new(3, 3, 1.0).unwrap();
        let soil = soil(grid, 0.5);
        let water = still_water(grid, 0.5);
        let (cell, _) = soil_cell(&params(grid), &soil, &water, grid.index(1, 1));
        assert!((cell.height - 0.5).abs() < 1e-6);
    }

    #[test]
    fn fast_flow_erodes() {
        let grid = Grid::new(3, 3, 1.0).unwrap();
        let soil = soil(grid, 0.5);
        let mut water = still_water(grid, 0.1);
        for cell in &mut water {
            cell.velocity = Vec2::new(2.0, 0.0);
        }
        let params = params(grid);
        let (cell, flow) = soil_cell(&params, &soil, &water, grid.index(1, 1));
        assert!(flow > params.erosion_threshold);
        assert!(cell.height < 0.5);
    }

    #[test]
    fn diffusion_smooths_a_spike() {
        let grid = Grid::new(3, 3, 1.0).unwrap();
        let mut soil = soil(grid, 0.0);
        let center = grid.index(1, 1);
        soil[center].height = 1.0;
        let water = still_water(grid, 1.0);
        let mut params = params(grid);
        params.slope_gain = 0.0;

        let (cell, _) = soil_cell(&params, &soil, &water, center);
        assert!(cell.height < 1.0);
        let (side, _) = soil_cell(&params, &soil, &water, grid.index(1, 0));
        assert!(side.height > 0.0);
    }

    #[test]
    fn soil_trail_blends_towards_flow() {
        let grid = Grid::new(1, 1, 1.0).unwrap();
        let soil = soil(grid, 1.0);
        let mut water = still_water(grid, 0.0);
        water[0].velocity = Vec2::new(1.0, 0.0);
        let params = params(grid);

        let mut dst = vec![SoilCell::default(); 1];
        let trail = vec![AF32::new(0.0)];
        step_soil(&params, &soil, &water, &mut dst, &trail);
        let expected = flow_magnitude(&water[0]) * SOIL_TRAIL_BLEND;
        assert!((trail[0].load() - expected).abs() < 1e-7);
    }

    /// Parameters where only the transport term moves soil.
    fn transport_only(grid: Grid) -> SimParameters {
        let mut params = params(grid);
        params.slope_gain = 0.0;
        params.soil_diffusion = 0.0;
        params.erosion_rate = 0.0;
        params.deposition_rate = 0.0;
        params
    }

    #[test]
    fn moving_column_carries_soil_downstream() {
        let grid = Grid::new(4, 1, 1.0).unwrap();
        let mut soil = soil(grid, 1.0);
        soil[1].velocity = Vec2::new(0.5, 0.0);
        let water = still_water(grid, 0.0);
        let params = transport_only(grid);

        let mut dst = vec![SoilCell::default(); grid.len()];
        let trail: Vec<AF32> = (0..grid.len()).map(|_| AF32::new(0.0)).collect();
        step_soil(&params, &soil, &water, &mut dst, &trail);

        // The downstream cell sees the column's updated, damped velocity.
        let moved = sediment_velocity(&params, &soil, &water, 1).x;
        assert!(moved > 0.0 && moved < 0.5);
        let carried = params.dt_soil * moved;

        assert!((dst[1].height - (1.0 - carried)).abs() < 1e-6, "{:?}", dst[1]);
        assert!((dst[2].height - (1.0 + carried)).abs() < 1e-6, "{:?}", dst[2]);
        assert_eq!(dst[0].height, 1.0);
        assert_eq!(dst[3].height, 1.0);

        let total: f32 = dst.iter().map(|c| c.height).sum();
        assert!((total - 4.0).abs() < 1e-5);
    }

    #[test]
    fn backward_difference_vanishes_on_the_west_and_north_edges() {
        let grid = Grid::new(3, 3, 1.0).unwrap();
        let mut soil = soil(grid, 1.0);
        soil[grid.index(0, 0)].velocity = Vec2::new(0.5, 0.5);
        soil[grid.index(2, 0)].velocity = Vec2::new(0.0, 0.5);
        soil[grid.index(0, 2)].velocity = Vec2::new(0.5, 0.0);
        let water = still_water(grid, 0.0);
        let params = transport_only(grid);

        for (x, y) in [(0, 0), (2, 0), (0, 2)] {
            let (cell, _) = soil_cell(&params, &soil, &water, grid.index(x, y));
            assert_eq!(cell.height, 1.0, "edge cell ({x}, {y})");
            assert!(cell.velocity.length() > 0.0);
        }

        // Their neighbours still receive what the edge cells push out.
        for (x, y) in [(1, 0), (2, 1), (1, 2)] {
            let (cell, _) = soil_cell(&params, &soil, &water, grid.index(x, y));
            assert!(cell.height > 1.0, "cell ({x}, {y}) gained nothing");
        }
    }
}
