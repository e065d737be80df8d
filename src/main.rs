use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use terrain_flow::util::Timed;
use terrain_flow::*;

/// Runs the water/soil simulation headless at a synthetic 60 Hz.
#[derive(Parser)]
#[command(name = "terrain_flow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config; missing fields use defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured grid width.
    #[arg(long)]
    width: Option<usize>,

    /// Overrides the configured grid height.
    #[arg(long)]
    height: Option<usize>,

    /// Number of frames to run.
    #[arg(short, long, default_value = "600")]
    steps: u64,

    /// Seed for the synthetic brush strokes.
    #[arg(long, default_value = "0")]
    seed: u32,

    /// Number of random brush strokes spread over the run.
    #[arg(long, default_value = "0")]
    strokes: usize,

    /// Write the final committed fields here as JSON.
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,
}

#[derive(Serialize)]
struct Export {
    width: usize,
    height: usize,
    steps: u64,
    stats: FieldStats,
    water_height: Vec<f32>,
    soil_height: Vec<f32>,
    water_trail: Vec<f32>,
    soil_trail: Vec<f32>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(width) = cli.width {
        config.grid.width = width;
    }
    if let Some(height) = cli.height {
        config.grid.height = height;
    }

    let grid = config.grid.grid()?;
    let mut sim = Simulation::new(grid, config.constants)?;
    let controls = config.controls;

    let mut seed = [0u8; 32];
    seed[0..4].copy_from_slice(&cli.seed.to_be_bytes());
    let mut rng = rand::rngs::StdRng::from_seed(seed);
    let stroke_every = match cli.strokes {
        0 => u64::MAX,
        n => (cli.steps / n as u64).max(1),
    };

    {
        let mut timed = Timed::info("simulation");
        for frame in 0..cli.steps {
            if frame % stroke_every == 0 {
                let brush = Brush::from_pointer(
                    &grid,
                    Vec2::new(rng.gen(), rng.gen()),
                    rng.gen_range(2.0..8.0),
                    rng.gen_range(0.01..0.1),
                    rng.gen_bool(0.5),
                );
                sim.paint(&brush);
            }
            if sim.tick(frame as f64 / 60.0, &controls) == Tick::Stepped {
                timed.step();
            }
        }
    }

    let view = sim.view();
    let stats = view.stats();
    log::info!("after {} steps: {:?}", sim.steps(), stats);

    if let Some(path) = cli.export {
        let _t = Timed::debug("export");
        let (water_trail, soil_trail) = view.trails();
        let export = Export {
            width: grid.width(),
            height: grid.height(),
            steps: sim.steps(),
            stats,
            water_height: view.water().iter().map(|c| c.height).collect(),
            soil_height: view.soil().iter().map(|c| c.height).collect(),
            water_trail,
            soil_trail,
        };
        let file = std::io::BufWriter::new(std::fs::File::create(&path)?);
        serde_json::to_writer(file, &export)?;
        log::info!("exported fields to {}", path.display());
    }

    Ok(())
}
