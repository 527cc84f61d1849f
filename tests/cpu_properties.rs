// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Grid-level properties checked end to end on the reference backend.

use cellfluid::backend::Backend;
use cellfluid::cell::QUANTA_PER_UNIT;
use cellfluid::editor::Editor;
use cellfluid::grid::{GridStore, Roles};
use cellfluid::phase::{Axis, Phase, PHASE_TABLE};
use cellfluid::scheduler::UpdateScheduler;
use cellfluid::uniforms::RuleConstants;
use cellfluid::{
    Cell, CpuBackend, ExtractionMode, GridDimensions, Side, SimError, Simulation, SimulationSettings, ELEMENT_COUNT,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn settings(sub_resolution: u32) -> SimulationSettings {
    SimulationSettings {
        sub_resolution,
        ..Default::default()
    }
}

fn simulation(dims: (i32, i32, i32), settings: SimulationSettings) -> Simulation<CpuBackend> {
    let mut sim = Simulation::new(CpuBackend::new(), settings);
    sim.initialize(dims, ELEMENT_COUNT as u32).unwrap();
    sim
}

fn species_totals(cells: &[Cell]) -> [f64; ELEMENT_COUNT] {
    let mut totals = [0.0; ELEMENT_COUNT];
    for cell in cells {
        for (total, amount) in totals.iter_mut().zip(cell.content) {
            *total += amount as f64;
        }
    }
    totals
}

fn random_cell(rng: &mut StdRng) -> Cell {
    let mut cell = Cell::empty(1.0);
    if rng.gen_bool(0.1) {
        cell.make_solid();
        return cell;
    }
    let mut remaining = rng.gen_range(0..=QUANTA_PER_UNIT as u32);
    for element in 0..ELEMENT_COUNT {
        let quanta = if element + 1 == ELEMENT_COUNT {
            remaining
        } else {
            rng.gen_range(0..=remaining)
        };
        remaining -= quanta;
        cell.add_content(element, quanta as f32 / QUANTA_PER_UNIT);
    }
    cell
}

#[test]
fn both_buffers_hold_empty_cells_after_initialize() {
    let mut sim = simulation((2, 3, 2), settings(2));
    for side in [Side::A, Side::B] {
        let cells = sim.read_side(side).unwrap();
        assert_eq!(cells.len(), 4 * 6 * 4);
        for cell in &cells {
            assert_eq!(cell.volume, 0.0);
            assert_eq!(cell.content, [0.0; ELEMENT_COUNT]);
            assert!(!cell.is_solid());
            assert_eq!(cell.direction, 0);
            assert_eq!(cell.max_volume, 1.0);
        }
    }
    assert_eq!(sim.total_mass().unwrap(), 0.0);
}

#[test]
fn sweep_visits_axes_in_order_and_returns_to_start() {
    let mut sim = simulation((2, 2, 2), settings(2));
    let axes: Vec<Axis> = PHASE_TABLE.iter().map(|d| d.axis).collect();
    assert_eq!(
        axes,
        [Axis::X, Axis::Y, Axis::Z, Axis::Y, Axis::X, Axis::Y, Axis::Z, Axis::Y]
    );

    let mut seen = Vec::new();
    let mut sides = Vec::new();
    for _ in 0..8 {
        let generation = sim.advance_generation().unwrap();
        seen.push(generation.phase);
        sides.push(generation.side);
    }
    assert_eq!(seen, Phase::ALL);
    assert_eq!(sides, [Side::B, Side::A, Side::B, Side::A, Side::B, Side::A, Side::B, Side::A]);
    assert_eq!(sim.phase(), Some(Phase::X0));
    assert_eq!(sim.generation_index(), 8);

    // Offsets on the second pass of each axis shift the pairing by one cell.
    assert_eq!(Phase::X1.descriptor().offset, [1, 0, 0]);
    assert_eq!(Phase::Z1.descriptor().offset, [0, 0, 1]);
    assert_eq!(Phase::Y1.descriptor().offset, [0, 1, 0]);
    assert_eq!(Phase::Y2.descriptor().offset, [0, 0, 0]);
}

#[test]
fn obstacles_land_in_both_buffers() {
    let mut sim = simulation((2, 2, 2), settings(2));
    sim.set_obstacle([1, 0, 3], [2, 3, -4]);

    let solid_mask = |cells: &[Cell]| cells.iter().map(Cell::is_solid).collect::<Vec<_>>();
    let a = solid_mask(&sim.read_side(Side::A).unwrap());
    let b = solid_mask(&sim.read_side(Side::B).unwrap());
    assert_eq!(a, b);
    assert_eq!(a.iter().filter(|&&s| s).count(), 2 * 4 * 4);

    // Whichever buffer the next pass reads, the obstacle is there.
    for _ in 0..3 {
        sim.advance_generation().unwrap();
        let latest = solid_mask(&sim.read_generation().unwrap());
        assert_eq!(latest, a);
    }

    sim.clear_obstacle([0, 0, 0], [3, 3, 3]);
    for side in [Side::A, Side::B] {
        assert!(sim.read_side(side).unwrap().iter().all(|c| !c.is_solid()));
    }
}

#[test]
fn obstacle_outside_grid_changes_nothing() {
    let mut sim = simulation((2, 2, 2), settings(2));
    let before = sim.backend().dispatch_count();
    sim.set_obstacle([10, 10, 10], [20, 20, 20]);
    assert_eq!(sim.backend().dispatch_count(), before);
}

#[test]
fn out_of_range_fill_does_not_touch_the_grid() {
    let mut sim = simulation((2, 2, 2), settings(2));
    sim.fill([1.5, 0.5, 0.5], 0);
    sim.fill([0.5, 0.5, 0.5], ELEMENT_COUNT as u32);
    for _ in 0..8 {
        sim.advance_generation().unwrap();
    }
    assert_eq!(sim.total_mass().unwrap(), 0.0);

    // Starting and then cancelling a fill stops the inflow.
    sim.fill([0.5, 0.9, 0.5], 1);
    sim.advance_generation().unwrap();
    let after_one = sim.total_mass().unwrap();
    assert!(after_one > 0.0);
    sim.fill([-1.0, -1.0, -1.0], 1);
    for _ in 0..8 {
        sim.advance_generation().unwrap();
    }
    assert_eq!(sim.total_mass().unwrap(), after_one);
    assert_eq!(sim.species_mass().unwrap()[1], after_one);
}

#[test]
fn empty_grid_draws_nothing() {
    for mode in [ExtractionMode::Triangles, ExtractionMode::Quads] {
        let mut sim = simulation(
            (2, 2, 2),
            SimulationSettings {
                extraction_mode: mode,
                ..settings(2)
            },
        );
        let frame = sim.render_frame(0.0).unwrap();
        let geometry = frame.geometry.unwrap();
        assert_eq!(geometry.live_count, 0);
        assert_eq!(geometry.args[1], 0);
        assert_eq!(sim.backend().last_draw().map(|d| d.args[1]), Some(0));
    }
}

#[test]
fn single_exposed_face_draws_one_quad() {
    let mut sim = simulation(
        (1, 1, 2),
        SimulationSettings {
            extraction_mode: ExtractionMode::Quads,
            fill_rate: 1.0,
            ..settings(1)
        },
    );
    sim.fill([0.0, 0.0, 0.0], 0);
    sim.advance_generation().unwrap();
    sim.render_frame(0.0).unwrap();

    let geometry = sim.geometry_stats().unwrap();
    assert_eq!(geometry.live_count, 1);
    assert_eq!(geometry.args, [6, 1, 0, 0]);
    assert!(!geometry.overflowed());
}

#[test]
fn isolated_full_cell_draws_one_triangle_per_touching_cube() {
    let mut sim = simulation(
        (4, 4, 4),
        SimulationSettings {
            fill_rate: 1.0,
            ..settings(1)
        },
    );
    sim.fill([0.5, 0.5, 0.5], 2);
    sim.advance_generation().unwrap();
    let frame = sim.render_frame(0.0).unwrap();

    let geometry = frame.geometry.unwrap();
    assert_eq!(geometry.live_count, 8);
    assert_eq!(geometry.args, [3, 8, 0, 0]);
    assert_eq!(sim.backend().last_draw().map(|d| d.args), Some([3, 8, 0, 0]));
}

#[test]
fn overflow_clamps_draw_count_to_capacity() {
    let mut sim = simulation(
        (4, 4, 4),
        SimulationSettings {
            extraction_mode: ExtractionMode::Quads,
            fill_rate: 1.0,
            max_primitive_capacity: 4,
            ..settings(1)
        },
    );
    sim.fill([0.5, 0.5, 0.5], 0);
    sim.advance_generation().unwrap();
    let frame = sim.render_frame(0.0).unwrap();

    let geometry = frame.geometry.unwrap();
    assert_eq!(geometry.capacity, 4);
    assert_eq!(geometry.live_count, 6);
    assert_eq!(geometry.drawn(), 4);
    assert_eq!(geometry.dropped(), 2);
    assert_eq!(sim.renderer().overflow_frames(), 1);
}

#[test]
fn mass_is_conserved_on_random_grids() {
    for seed in 0..4u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut backend = CpuBackend::new();
        let settings = settings(2);
        let dims = GridDimensions::new(3, 2, 3).unwrap();
        let mut store = GridStore::allocate(&mut backend, dims, ELEMENT_COUNT as u32, &settings).unwrap();
        store.initialize_empty(&mut backend, 1.0);
        let layout = *store.layout();

        // The first pass reads A.
        let (_, a) = store.split(Roles {
            current: Side::B,
            next: Side::A,
        });
        for cell in a.iter_mut().take(layout.cell_count()) {
            *cell = random_cell(&mut rng);
        }
        let initial = species_totals(&backend.read_cells(store.buffer(Side::A), &layout).unwrap());

        let mut editor = Editor::new();
        let [rx, _, rz] = layout.resolution;
        editor.heat(&layout, [(rx / 2) as i32, 0, (rz / 2) as i32], 150);

        let rule = RuleConstants {
            fill_rate: settings.fill_rate,
            spread_threshold: settings.spread_threshold,
            boiling_point_c: settings.boiling_point_c,
        };
        let mut scheduler = UpdateScheduler::new(store, rule);
        for _ in 0..16 {
            let generation = scheduler.advance(&mut backend, &editor);
            let cells = backend
                .read_cells(scheduler.store().buffer(generation.side), &layout)
                .unwrap();
            assert_eq!(species_totals(&cells), initial, "seed {seed} generation {}", generation.index);
            for cell in &cells {
                assert!(cell.is_consistent(), "volume drifted from content: {cell:?}");
                assert!(!cell.is_out_of_range(), "cell overflowed: {cell:?}");
            }
        }
        scheduler.release(&mut backend);
    }
}

#[test]
fn fluid_settles_downward() {
    let mut sim = simulation(
        (1, 4, 1),
        SimulationSettings {
            fill_rate: 0.5,
            ..settings(1)
        },
    );
    sim.fill([0.0, 1.0, 0.0], 0);
    sim.advance_generation().unwrap();
    sim.fill([-1.0, -1.0, -1.0], 0);
    for _ in 0..32 {
        sim.advance_generation().unwrap();
    }
    let cells = sim.read_generation().unwrap();
    assert_eq!(cells[0].volume, 0.5);
    assert!(cells[1..].iter().all(|c| c.volume == 0.0));
}

#[test]
fn calls_before_initialize_report_not_initialized() {
    let mut sim = Simulation::new(CpuBackend::new(), settings(2));
    assert!(matches!(sim.advance_generation(), Err(SimError::NotInitialized)));
    assert!(matches!(sim.render_frame(0.0), Err(SimError::NotInitialized)));
    assert!(matches!(sim.read_generation(), Err(SimError::NotInitialized)));
    assert!(matches!(sim.total_mass(), Err(SimError::NotInitialized)));
    assert!(matches!(sim.geometry_stats(), Err(SimError::NotInitialized)));
}

#[test]
fn initialize_rejects_bad_input() {
    let mut sim = Simulation::new(CpuBackend::new(), settings(2));
    assert!(matches!(
        sim.initialize((2, 2, 2), ELEMENT_COUNT as u32 + 1),
        Err(SimError::ElementCountMismatch { requested, compiled })
            if requested == ELEMENT_COUNT as u32 + 1 && compiled == ELEMENT_COUNT as u32
    ));
    assert!(matches!(
        sim.initialize((0, 2, 2), ELEMENT_COUNT as u32),
        Err(SimError::InvalidDimensions { .. })
    ));
    assert!(!sim.is_initialized());
    assert!(sim.initialize((2, 2, 2), ELEMENT_COUNT as u32).is_ok());
}
