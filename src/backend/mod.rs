// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Device seam. Each method records and submits its own work, so call order is
//! dispatch order; no component needs explicit synchronization.

pub mod cpu;
pub mod gpu;

pub use cpu::{CpuBackend, DrawRecord};
pub use gpu::{FrameTarget, GpuBackend};

use crate::cell::Cell;
use crate::error::SimError;
use crate::extraction::ExtractionStrategy;
use crate::grid::GridLayout;
use crate::uniforms::{ExtractUniforms, GridEditUniforms, UpdateUniforms, ViewUniforms};

/// Snapshot of the append buffer and the indirect-draw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryStats {
    /// Appends attempted during the last extraction, including dropped ones.
    pub live_count: u32,
    pub capacity: u32,
    /// `[vertices_per_primitive, primitive_count, first_vertex, first_instance]`.
    pub args: [u32; 4],
}

impl GeometryStats {
    pub fn overflowed(&self) -> bool {
        self.live_count > self.capacity
    }

    pub fn dropped(&self) -> u32 {
        self.live_count.saturating_sub(self.capacity)
    }

    pub fn drawn(&self) -> u32 {
        self.args[1]
    }
}

pub trait Backend {
    type CellBuffer;
    type DenseVolume;
    type Geometry;

    fn name(&self) -> &'static str;

    /// Whether reading geometry stats back every frame is free.
    fn cheap_readback(&self) -> bool {
        false
    }

    fn create_cell_buffer(&mut self, layout: &GridLayout, label: &str) -> Result<Self::CellBuffer, SimError>;
    fn destroy_cell_buffer(&mut self, buffer: Self::CellBuffer);
    fn edit_cells(&mut self, buffer: &mut Self::CellBuffer, layout: &GridLayout, uniforms: &GridEditUniforms);
    fn read_cells(&mut self, buffer: &Self::CellBuffer, layout: &GridLayout) -> Result<Vec<Cell>, SimError>;

    fn dispatch_update(
        &mut self,
        src: &Self::CellBuffer,
        dst: &mut Self::CellBuffer,
        layout: &GridLayout,
        uniforms: &UpdateUniforms,
    );

    fn create_dense_volume(&mut self, layout: &GridLayout) -> Result<Self::DenseVolume, SimError>;
    fn create_geometry(&mut self, capacity: u32, vertices_per_primitive: u32) -> Result<Self::Geometry, SimError>;
    fn destroy_dense_volume(&mut self, volume: Self::DenseVolume);
    fn destroy_geometry(&mut self, geometry: Self::Geometry);

    fn dispatch_densify(&mut self, src: &Self::CellBuffer, volume: &mut Self::DenseVolume, layout: &GridLayout);

    /// Resets the append counter, then runs `strategy` over `src`.
    fn dispatch_extract(
        &mut self,
        src: &Self::CellBuffer,
        geometry: &mut Self::Geometry,
        layout: &GridLayout,
        strategy: &dyn ExtractionStrategy,
        uniforms: &ExtractUniforms,
    );

    /// Writes `min(counter, capacity)` into slot 1 of the indirect args.
    fn sync_draw_args(&mut self, geometry: &mut Self::Geometry);

    fn draw_indirect(&mut self, geometry: &Self::Geometry, volume: &Self::DenseVolume, view: &ViewUniforms);

    fn read_geometry_stats(&mut self, geometry: &Self::Geometry) -> Result<GeometryStats, SimError>;

    /// Blocks until submitted work has finished.
    fn wait_idle(&mut self);
}
