// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Surface extraction: densify the latest generation into an RGBA volume, then
//! emit triangles or quads into an append buffer sized to the worst case.

use bytemuck::{Pod, Zeroable};

use crate::backend::Backend;
use crate::cell::Cell;
use crate::error::SimError;
use crate::grid::GridLayout;
use crate::kernels;
use crate::mc_table::MAX_TRIANGLES_PER_CUBE;
use crate::scheduler::Generation;
use crate::settings::{ExtractionMode, SimulationSettings};
use crate::uniforms::ExtractUniforms;

/// One emitted surface element. Triangles use `a`, `b`, `c` as corners; quads
/// store the cell coordinate and face index in `a` and rebuild corners in the
/// vertex shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Primitive {
    pub a: [f32; 4],
    pub b: [f32; 4],
    pub c: [f32; 4],
    pub normal: [f32; 4],
}

const _: [(); 64] = [(); std::mem::size_of::<Primitive>()];

/// Host-side append buffer. Mirrors the GPU one: the counter counts every
/// attempt, only the first `capacity` primitives are stored.
#[derive(Debug, Clone)]
pub struct AppendBuffer {
    items: Vec<Primitive>,
    capacity: u32,
    counter: u32,
    args: [u32; 4],
}

impl AppendBuffer {
    pub fn new(capacity: u32, vertices_per_primitive: u32) -> Self {
        Self {
            items: Vec::new(),
            capacity,
            counter: 0,
            args: [vertices_per_primitive, 0, 0, 0],
        }
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.counter = 0;
    }

    /// Returns false when the primitive was dropped for lack of space.
    pub fn append(&mut self, primitive: Primitive) -> bool {
        let index = self.counter;
        self.counter = self.counter.saturating_add(1);
        if index < self.capacity {
            self.items.push(primitive);
            true
        } else {
            false
        }
    }

    pub fn sync_args(&mut self) {
        self.args[1] = self.counter.min(self.capacity);
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn items(&self) -> &[Primitive] {
        &self.items
    }

    pub fn args(&self) -> [u32; 4] {
        self.args
    }
}

pub trait ExtractionStrategy {
    fn mode(&self) -> ExtractionMode;

    /// Vertices drawn per primitive instance.
    fn vertices_per_primitive(&self) -> u32;

    fn max_primitives_per_item(&self) -> u32;

    /// Threads launched per extraction, one per cube or cell.
    fn dispatch_extent(&self, layout: &GridLayout) -> [u32; 3];

    /// Compute entry point in extract.wgsl.
    fn kernel_entry_point(&self) -> &'static str;

    /// Host version of the kernel for one dispatch item.
    fn emit(&self, cells: &[Cell], layout: &GridLayout, iso_level: f32, item: [u32; 3], out: &mut dyn FnMut(Primitive));

    fn worst_case_primitives(&self, layout: &GridLayout) -> u64 {
        let items: u64 = self.dispatch_extent(layout).iter().map(|&e| e as u64).product();
        items * self.max_primitives_per_item() as u64
    }
}

pub struct MarchingCubes;

impl ExtractionStrategy for MarchingCubes {
    fn mode(&self) -> ExtractionMode {
        ExtractionMode::Triangles
    }

    fn vertices_per_primitive(&self) -> u32 {
        3
    }

    fn max_primitives_per_item(&self) -> u32 {
        MAX_TRIANGLES_PER_CUBE
    }

    fn dispatch_extent(&self, layout: &GridLayout) -> [u32; 3] {
        layout.resolution.map(|r| r.saturating_sub(1))
    }

    fn kernel_entry_point(&self) -> &'static str {
        "extract_triangles"
    }

    fn emit(&self, cells: &[Cell], layout: &GridLayout, iso_level: f32, item: [u32; 3], out: &mut dyn FnMut(Primitive)) {
        kernels::march_cube(cells, layout, iso_level, item, out);
    }
}

pub struct VoxelQuads;

impl ExtractionStrategy for VoxelQuads {
    fn mode(&self) -> ExtractionMode {
        ExtractionMode::Quads
    }

    fn vertices_per_primitive(&self) -> u32 {
        6
    }

    fn max_primitives_per_item(&self) -> u32 {
        6
    }

    fn dispatch_extent(&self, layout: &GridLayout) -> [u32; 3] {
        layout.resolution
    }

    fn kernel_entry_point(&self) -> &'static str {
        "extract_quads"
    }

    fn emit(&self, cells: &[Cell], layout: &GridLayout, iso_level: f32, item: [u32; 3], out: &mut dyn FnMut(Primitive)) {
        kernels::voxel_faces(cells, layout, iso_level, item, out);
    }
}

pub fn strategy_for(mode: ExtractionMode) -> Box<dyn ExtractionStrategy> {
    match mode {
        ExtractionMode::Triangles => Box::new(MarchingCubes),
        ExtractionMode::Quads => Box::new(VoxelQuads),
    }
}

/// Owns the dense volume and the append buffer, and knows which generation
/// to extract next.
pub struct SurfaceExtractor<B: Backend> {
    strategy: Box<dyn ExtractionStrategy>,
    volume: B::DenseVolume,
    geometry: B::Geometry,
    capacity: u32,
    iso_level: f32,
    latest: Option<Generation>,
}

impl<B: Backend> SurfaceExtractor<B> {
    pub fn new(backend: &mut B, layout: &GridLayout, settings: &SimulationSettings) -> Result<Self, SimError> {
        let strategy = strategy_for(settings.extraction_mode);
        let worst_case = strategy.worst_case_primitives(layout);
        let capacity = worst_case.min(settings.max_primitive_capacity as u64).max(1) as u32;
        if worst_case > capacity as u64 {
            log::info!(
                "primitive capacity capped at {} (worst case {}); overflow will be clamped",
                capacity,
                worst_case
            );
        }

        let volume = backend.create_dense_volume(layout)?;
        let geometry = match backend.create_geometry(capacity, strategy.vertices_per_primitive()) {
            Ok(geometry) => geometry,
            Err(err) => {
                backend.destroy_dense_volume(volume);
                return Err(err);
            }
        };

        Ok(Self {
            strategy,
            volume,
            geometry,
            capacity,
            iso_level: settings.iso_level,
            latest: None,
        })
    }

    /// Records the generation the next extraction should read.
    pub fn notify(&mut self, generation: Generation) {
        self.latest = Some(generation);
    }

    pub fn latest(&self) -> Option<Generation> {
        self.latest
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn strategy(&self) -> &dyn ExtractionStrategy {
        self.strategy.as_ref()
    }

    pub fn geometry(&self) -> &B::Geometry {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut B::Geometry {
        &mut self.geometry
    }

    pub fn volume(&self) -> &B::DenseVolume {
        &self.volume
    }

    /// Densifies `src` and rebuilds the primitive list from it.
    pub fn extract(&mut self, backend: &mut B, src: &B::CellBuffer, layout: &GridLayout) {
        backend.dispatch_densify(src, &mut self.volume, layout);
        let uniforms = ExtractUniforms::new(
            layout,
            self.strategy.mode().code(),
            self.capacity,
            self.strategy.vertices_per_primitive(),
            self.iso_level,
        );
        backend.dispatch_extract(src, &mut self.geometry, layout, self.strategy.as_ref(), &uniforms);
    }

    pub fn release(self, backend: &mut B) {
        backend.destroy_dense_volume(self.volume);
        backend.destroy_geometry(self.geometry);
    }
}
