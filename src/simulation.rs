// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! The surface the drivers talk to. One `Simulation` owns the backend, the grid
//! buffers, the extraction resources and the renderer state.

use crate::backend::{Backend, GeometryStats};
use crate::camera::OrbitCamera;
use crate::cell::{Cell, ELEMENT_COUNT};
use crate::editor::Editor;
use crate::error::SimError;
use crate::extraction::SurfaceExtractor;
use crate::grid::{GridDimensions, GridLayout, GridStore, Side};
use crate::phase::Phase;
use crate::render::{FrameStats, Renderer, WaveAnimation};
use crate::scheduler::{Generation, UpdateScheduler};
use crate::settings::SimulationSettings;
use crate::uniforms::RuleConstants;

pub struct Simulation<B: Backend> {
    backend: B,
    settings: SimulationSettings,
    editor: Editor,
    scheduler: Option<UpdateScheduler<B>>,
    extractor: Option<SurfaceExtractor<B>>,
    renderer: Renderer,
    camera: OrbitCamera,
    released: bool,
}

impl<B: Backend> Simulation<B> {
    pub fn new(backend: B, mut settings: SimulationSettings) -> Self {
        settings.sanitize();
        let renderer = Renderer::new(
            WaveAnimation::new(settings.wave_speed),
            settings.overflow_check_interval,
        );
        Self {
            backend,
            settings,
            editor: Editor::new(),
            scheduler: None,
            extractor: None,
            renderer,
            camera: OrbitCamera::default(),
            released: false,
        }
    }

    /// Allocates both grid buffers and the extraction resources, and clears the
    /// grid to empty cells. Calling it again rebuilds everything from scratch.
    pub fn initialize(&mut self, dimensions: (i32, i32, i32), element_count: u32) -> Result<(), SimError> {
        let dims = GridDimensions::new(dimensions.0, dimensions.1, dimensions.2)?;
        // Reject bad input before touching a running grid.
        if element_count as usize != ELEMENT_COUNT {
            return Err(SimError::ElementCountMismatch {
                requested: element_count,
                compiled: ELEMENT_COUNT as u32,
            });
        }
        GridLayout::new(dims, &self.settings)?;

        if self.scheduler.is_some() {
            log::info!("re-initializing simulation; releasing the previous grid");
            self.release_resources();
        }

        let mut store = GridStore::allocate(&mut self.backend, dims, element_count, &self.settings)?;
        store.initialize_empty(&mut self.backend, self.settings.cell_capacity);
        let layout = *store.layout();

        let extractor = match SurfaceExtractor::new(&mut self.backend, &layout, &self.settings) {
            Ok(extractor) => extractor,
            Err(err) => {
                store.release(&mut self.backend);
                return Err(err);
            }
        };

        let rule = RuleConstants {
            fill_rate: self.settings.fill_rate,
            spread_threshold: self.settings.spread_threshold,
            boiling_point_c: self.settings.boiling_point_c,
        };

        let aspect = self.camera.aspect;
        self.camera = OrbitCamera {
            aspect,
            ..OrbitCamera::framing(&layout)
        };
        self.editor = Editor::new();
        self.scheduler = Some(UpdateScheduler::new(store, rule));
        self.extractor = Some(extractor);
        self.released = false;
        Ok(())
    }

    /// Marks every cell in the inclusive box as solid, in both buffers. The box
    /// is clamped to the grid; a box entirely outside is ignored.
    pub fn set_obstacle(&mut self, start: [i32; 3], end: [i32; 3]) {
        self.stamp_obstacle(start, end, true);
    }

    /// Turns solid cells in the box back into empty fluid cells.
    pub fn clear_obstacle(&mut self, start: [i32; 3], end: [i32; 3]) {
        self.stamp_obstacle(start, end, false);
    }

    fn stamp_obstacle(&mut self, start: [i32; 3], end: [i32; 3], solid: bool) {
        let Some(scheduler) = self.scheduler.as_mut() else {
            log::warn!("obstacle edit ignored: simulation not initialized");
            return;
        };
        if let Some(region) = Editor::obstacle_region(scheduler.layout(), start, end) {
            scheduler.apply_obstacle(&mut self.backend, &region, solid);
        }
    }

    /// Position is normalized to `[0, 1]^3`. Anything outside (e.g. `-1`)
    /// cancels the fill. Unknown element ids are ignored.
    pub fn fill(&mut self, position: [f32; 3], element_id: u32) {
        let Some(scheduler) = self.scheduler.as_ref() else {
            log::warn!("fill ignored: simulation not initialized");
            return;
        };
        self.editor.fill(scheduler.layout(), position, element_id);
    }

    /// Position is in sub-resolution cells. Outside the grid switches heat off.
    pub fn heat(&mut self, position: [i32; 3], temperature_celsius: i32) {
        let Some(scheduler) = self.scheduler.as_ref() else {
            log::warn!("heat ignored: simulation not initialized");
            return;
        };
        self.editor.heat(scheduler.layout(), position, temperature_celsius);
    }

    /// Runs exactly one directional pass.
    pub fn advance_generation(&mut self) -> Result<Generation, SimError> {
        let (Some(scheduler), Some(extractor)) = (self.scheduler.as_mut(), self.extractor.as_mut()) else {
            return Err(SimError::NotInitialized);
        };
        let generation = scheduler.advance(&mut self.backend, &self.editor);
        extractor.notify(generation);
        Ok(generation)
    }

    /// Extracts the surface of the latest completed generation and draws it.
    pub fn render_frame(&mut self, elapsed_seconds: f32) -> Result<FrameStats, SimError> {
        let (Some(scheduler), Some(extractor)) = (self.scheduler.as_ref(), self.extractor.as_mut()) else {
            return Err(SimError::NotInitialized);
        };
        let layout = *scheduler.layout();
        let src = scheduler.store().buffer(scheduler.latest_side());
        extractor.extract(&mut self.backend, src, &layout);

        let view = self.renderer.view_uniforms(
            self.camera.view_proj(),
            self.camera.eye(),
            &layout,
            self.settings.extraction_mode,
            elapsed_seconds,
        );
        let frame_index = self.renderer.frame_index();
        let geometry = self.renderer.draw_frame(&mut self.backend, extractor, &view)?;

        Ok(FrameStats {
            frame_index,
            generation: extractor.latest(),
            geometry,
            wave_offset: view.wave,
        })
    }

    /// Waits for the device, then frees every buffer. Safe to call twice.
    pub fn shutdown(&mut self) {
        if self.released {
            log::debug!("shutdown called again; nothing to release");
            return;
        }
        self.backend.wait_idle();
        self.release_resources();
        self.released = true;
        log::info!("simulation shut down ({} backend)", self.backend.name());
    }

    fn release_resources(&mut self) {
        if let Some(extractor) = self.extractor.take() {
            extractor.release(&mut self.backend);
        }
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.release(&mut self.backend);
        }
    }

    fn scheduler(&self) -> Result<&UpdateScheduler<B>, SimError> {
        self.scheduler.as_ref().ok_or(SimError::NotInitialized)
    }

    /// Cells of the buffer holding the newest state.
    pub fn read_generation(&mut self) -> Result<Vec<Cell>, SimError> {
        let side = self.scheduler()?.latest_side();
        self.read_side(side)
    }

    pub fn read_side(&mut self, side: Side) -> Result<Vec<Cell>, SimError> {
        let scheduler = self.scheduler.as_ref().ok_or(SimError::NotInitialized)?;
        self.backend.read_cells(scheduler.store().buffer(side), scheduler.layout())
    }

    pub fn total_mass(&mut self) -> Result<f64, SimError> {
        Ok(self.read_generation()?.iter().map(|cell| cell.volume as f64).sum())
    }

    pub fn species_mass(&mut self) -> Result<[f64; ELEMENT_COUNT], SimError> {
        let mut totals = [0.0f64; ELEMENT_COUNT];
        for cell in self.read_generation()? {
            for (total, amount) in totals.iter_mut().zip(cell.content) {
                *total += amount as f64;
            }
        }
        Ok(totals)
    }

    /// Reads the append counter and indirect args of the last extraction.
    pub fn geometry_stats(&mut self) -> Result<GeometryStats, SimError> {
        let extractor = self.extractor.as_ref().ok_or(SimError::NotInitialized)?;
        self.backend.read_geometry_stats(extractor.geometry())
    }

    pub fn phase(&self) -> Option<Phase> {
        self.scheduler.as_ref().map(|s| s.phase())
    }

    pub fn generation_index(&self) -> u64 {
        self.scheduler.as_ref().map_or(0, |s| s.generation_index())
    }

    pub fn layout(&self) -> Option<&GridLayout> {
        self.scheduler.as_ref().map(|s| s.layout())
    }

    pub fn is_initialized(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }
}

impl<B: Backend> Drop for Simulation<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
