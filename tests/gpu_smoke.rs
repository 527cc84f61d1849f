// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Runs only when an adapter is available; otherwise each test returns early.

use cellfluid::{
    CpuBackend, ExtractionMode, GpuBackend, Side, Simulation, SimulationSettings, ELEMENT_COUNT,
};

fn gpu() -> Option<GpuBackend> {
    match GpuBackend::new_headless() {
        Ok(backend) => Some(backend),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

fn settings(mode: ExtractionMode) -> SimulationSettings {
    SimulationSettings {
        sub_resolution: 2,
        extraction_mode: mode,
        fill_rate: 0.5,
        overflow_check_interval: 1,
        ..Default::default()
    }
}

#[test]
fn gpu_buffers_start_empty() {
    let Some(backend) = gpu() else { return };
    let mut sim = Simulation::new(backend, settings(ExtractionMode::Triangles));
    sim.initialize((2, 2, 2), ELEMENT_COUNT as u32).unwrap();
    for side in [Side::A, Side::B] {
        let cells = sim.read_side(side).unwrap();
        assert_eq!(cells.len(), 64);
        assert!(cells.iter().all(|c| c.volume == 0.0 && !c.is_solid()));
    }
}

#[test]
fn gpu_matches_cpu_reference() {
    let Some(backend) = gpu() else { return };
    let mut gpu_sim = Simulation::new(backend, settings(ExtractionMode::Quads));
    let mut cpu_sim = Simulation::new(CpuBackend::new(), settings(ExtractionMode::Quads));

    gpu_sim.initialize((2, 3, 2), ELEMENT_COUNT as u32).unwrap();
    cpu_sim.initialize((2, 3, 2), ELEMENT_COUNT as u32).unwrap();
    gpu_sim.set_obstacle([0, 2, 0], [1, 2, 3]);
    cpu_sim.set_obstacle([0, 2, 0], [1, 2, 3]);
    gpu_sim.fill([0.6, 0.95, 0.6], 1);
    cpu_sim.fill([0.6, 0.95, 0.6], 1);
    gpu_sim.heat([2, 0, 2], 150);
    cpu_sim.heat([2, 0, 2], 150);

    for generation in 0..24 {
        if generation == 12 {
            gpu_sim.fill([-1.0; 3], 1);
            cpu_sim.fill([-1.0; 3], 1);
        }
        gpu_sim.advance_generation().unwrap();
        cpu_sim.advance_generation().unwrap();
    }

    let gpu_cells = gpu_sim.read_generation().unwrap();
    let cpu_cells = cpu_sim.read_generation().unwrap();
    assert_eq!(gpu_cells, cpu_cells);
    assert_eq!(gpu_sim.total_mass().unwrap(), cpu_sim.total_mass().unwrap());

    let gpu_frame = gpu_sim.render_frame(0.0).unwrap();
    let cpu_frame = cpu_sim.render_frame(0.0).unwrap();
    let gpu_geometry = gpu_frame.geometry.unwrap();
    let cpu_geometry = cpu_frame.geometry.unwrap();
    assert_eq!(gpu_geometry.live_count, cpu_geometry.live_count);
    assert_eq!(gpu_geometry.args, cpu_geometry.args);

    gpu_sim.shutdown();
    gpu_sim.shutdown();
}

#[test]
fn gpu_overflow_is_clamped() {
    let Some(backend) = gpu() else { return };
    let mut sim = Simulation::new(
        backend,
        SimulationSettings {
            sub_resolution: 1,
            fill_rate: 1.0,
            max_primitive_capacity: 4,
            ..settings(ExtractionMode::Quads)
        },
    );
    sim.initialize((4, 4, 4), ELEMENT_COUNT as u32).unwrap();
    sim.fill([0.5, 0.5, 0.5], 0);
    sim.advance_generation().unwrap();
    sim.render_frame(0.0).unwrap();

    let geometry = sim.geometry_stats().unwrap();
    assert_eq!(geometry.live_count, 6);
    assert_eq!(geometry.args, [6, 4, 0, 0]);
}
