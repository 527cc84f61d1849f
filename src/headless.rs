// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

// Headless driver: runs a number of generations and logs mass and surface stats.
// Run with: cargo run --release --bin cellfluid_headless -- --generations 512 --backend gpu

use anyhow::{bail, Context};
use cellfluid::{Backend, CpuBackend, GpuBackend, Simulation, SimulationSettings, ELEMENT_COUNT};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Cpu,
    Gpu,
}

#[derive(Debug, Clone)]
struct Args {
    generations: u64,
    backend: BackendKind,
    dimensions: (i32, i32, i32),
    seed: u64,
    /// Move the fill to a new random spot every this many generations.
    reseed_every: u64,
    report_every: u64,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            generations: 256,
            backend: BackendKind::Cpu,
            dimensions: (4, 4, 4),
            seed: 0x5eed,
            reseed_every: 64,
            report_every: 32,
        }
    }
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        let mut value = || iter.next().with_context(|| format!("{flag} expects a value"));
        match flag.as_str() {
            "--generations" | "-n" => args.generations = value()?.parse()?,
            "--backend" => {
                args.backend = match value()?.as_str() {
                    "cpu" => BackendKind::Cpu,
                    "gpu" => BackendKind::Gpu,
                    other => bail!("unknown backend {other:?} (expected cpu or gpu)"),
                }
            }
            "--size" => {
                let raw = value()?;
                let parts: Vec<i32> = raw
                    .split('x')
                    .map(str::parse)
                    .collect::<Result<_, _>>()
                    .with_context(|| format!("bad --size {raw:?}, expected XxYxZ"))?;
                let [x, y, z] = parts.as_slice() else {
                    bail!("bad --size {raw:?}, expected XxYxZ");
                };
                args.dimensions = (*x, *y, *z);
            }
            "--seed" => args.seed = value()?.parse()?,
            "--reseed-every" => args.reseed_every = value()?.parse::<u64>()?.max(1),
            "--report-every" => args.report_every = value()?.parse::<u64>()?.max(1),
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok(args)
}

fn run<B: Backend>(backend: B, settings: SimulationSettings, args: &Args) -> anyhow::Result<()> {
    let mut sim = Simulation::new(backend, settings);
    sim.initialize(args.dimensions, ELEMENT_COUNT as u32)?;
    let mut rng = StdRng::seed_from_u64(args.seed);

    if let Some(layout) = sim.layout().copied() {
        let [rx, ry, rz] = layout.resolution.map(|r| r as i32);
        sim.set_obstacle([rx / 4, ry / 2, rz / 4], [rx / 2, ry / 2, rz / 2]);
    }

    let mut previous_mass = 0.0f64;
    for generation in 0..args.generations {
        if generation % args.reseed_every == 0 {
            let position = [rng.gen_range(0.0..1.0), rng.gen_range(0.6..1.0), rng.gen_range(0.0..1.0)];
            let element = rng.gen_range(0..ELEMENT_COUNT as u32);
            sim.fill(position, element);
            log::debug!("fill moved to {:?} (element {})", position, element);
        }
        sim.advance_generation()?;

        if (generation + 1) % args.report_every == 0 || generation + 1 == args.generations {
            let frame = sim.render_frame(generation as f32 / 60.0)?;
            let mass = sim.total_mass()?;
            let species = sim.species_mass()?;
            let geometry = sim.geometry_stats()?;
            log::info!(
                "generation {:>6} phase {:?}: mass {:.4} ({:+.4}) species {:?} primitives {}/{}{}",
                generation + 1,
                frame.generation.map(|g| g.phase),
                mass,
                mass - previous_mass,
                species.map(|m| (m * 1000.0).round() / 1000.0),
                geometry.drawn(),
                geometry.capacity,
                if geometry.overflowed() { " overflow" } else { "" }
            );
            previous_mass = mass;
        }
    }

    sim.shutdown();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    use env_logger::Env;
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let settings = SimulationSettings::load_or_default(&SimulationSettings::default_path());
    log::info!("running {} generations on {:?} ({:?})", args.generations, args.backend, args.dimensions);

    match args.backend {
        BackendKind::Cpu => run(CpuBackend::new(), settings, &args),
        BackendKind::Gpu => run(GpuBackend::new_headless()?, settings, &args),
    }
}
