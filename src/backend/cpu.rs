// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Reference backend over plain vectors. Runs the same rules as the WGSL
//! kernels and is what the property tests drive.

use super::{Backend, GeometryStats};
use crate::cell::Cell;
use crate::error::SimError;
use crate::extraction::{AppendBuffer, ExtractionStrategy};
use crate::grid::GridLayout;
use crate::kernels;
use crate::uniforms::{ExtractUniforms, GridEditUniforms, UpdateUniforms, ViewUniforms};
use bytemuck::Zeroable;

/// What the last `draw_indirect` would have drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub args: [u32; 4],
    pub view: ViewUniforms,
}

#[derive(Debug, Default)]
pub struct CpuBackend {
    last_draw: Option<DrawRecord>,
    draw_count: u64,
    dispatch_count: u64,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_draw(&self) -> Option<&DrawRecord> {
        self.last_draw.as_ref()
    }

    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    /// Update, edit, densify and extract dispatches issued so far.
    pub fn dispatch_count(&self) -> u64 {
        self.dispatch_count
    }
}

impl Backend for CpuBackend {
    type CellBuffer = Vec<Cell>;
    type DenseVolume = Vec<[f32; 4]>;
    type Geometry = AppendBuffer;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn cheap_readback(&self) -> bool {
        true
    }

    fn create_cell_buffer(&mut self, layout: &GridLayout, label: &str) -> Result<Vec<Cell>, SimError> {
        let len = usize::try_from(layout.capacity).map_err(|_| SimError::Allocation {
            label: label.to_string(),
            reason: format!("{} cells do not fit in host memory", layout.capacity),
        })?;
        let mut cells = Vec::new();
        cells.try_reserve_exact(len).map_err(|err| SimError::Allocation {
            label: label.to_string(),
            reason: err.to_string(),
        })?;
        cells.resize(len, Cell::zeroed());
        Ok(cells)
    }

    fn destroy_cell_buffer(&mut self, buffer: Vec<Cell>) {
        drop(buffer);
    }

    fn edit_cells(&mut self, buffer: &mut Vec<Cell>, layout: &GridLayout, uniforms: &GridEditUniforms) {
        self.dispatch_count += 1;
        kernels::edit_cells(buffer, layout, uniforms);
    }

    fn read_cells(&mut self, buffer: &Vec<Cell>, layout: &GridLayout) -> Result<Vec<Cell>, SimError> {
        Ok(buffer[..layout.cell_count()].to_vec())
    }

    fn dispatch_update(&mut self, src: &Vec<Cell>, dst: &mut Vec<Cell>, layout: &GridLayout, uniforms: &UpdateUniforms) {
        self.dispatch_count += 1;
        kernels::update_pass(src, dst, layout, uniforms);
    }

    fn create_dense_volume(&mut self, layout: &GridLayout) -> Result<Vec<[f32; 4]>, SimError> {
        Ok(vec![[0.0; 4]; layout.cell_count()])
    }

    fn create_geometry(&mut self, capacity: u32, vertices_per_primitive: u32) -> Result<AppendBuffer, SimError> {
        Ok(AppendBuffer::new(capacity, vertices_per_primitive))
    }

    fn destroy_dense_volume(&mut self, volume: Vec<[f32; 4]>) {
        drop(volume);
    }

    fn destroy_geometry(&mut self, geometry: AppendBuffer) {
        drop(geometry);
    }

    fn dispatch_densify(&mut self, src: &Vec<Cell>, volume: &mut Vec<[f32; 4]>, layout: &GridLayout) {
        self.dispatch_count += 1;
        kernels::densify(src, volume, layout);
    }

    fn dispatch_extract(
        &mut self,
        src: &Vec<Cell>,
        geometry: &mut AppendBuffer,
        layout: &GridLayout,
        strategy: &dyn ExtractionStrategy,
        uniforms: &ExtractUniforms,
    ) {
        self.dispatch_count += 1;
        geometry.reset();
        let iso_level = uniforms.params[0];
        let [ex, ey, ez] = strategy.dispatch_extent(layout);
        let mut append = |primitive| {
            geometry.append(primitive);
        };
        for z in 0..ez {
            for y in 0..ey {
                for x in 0..ex {
                    strategy.emit(src, layout, iso_level, [x, y, z], &mut append);
                }
            }
        }
    }

    fn sync_draw_args(&mut self, geometry: &mut AppendBuffer) {
        geometry.sync_args();
    }

    fn draw_indirect(&mut self, geometry: &AppendBuffer, _volume: &Vec<[f32; 4]>, view: &ViewUniforms) {
        self.draw_count += 1;
        self.last_draw = Some(DrawRecord {
            args: geometry.args(),
            view: *view,
        });
    }

    fn read_geometry_stats(&mut self, geometry: &AppendBuffer) -> Result<GeometryStats, SimError> {
        Ok(GeometryStats {
            live_count: geometry.counter(),
            capacity: geometry.capacity(),
            args: geometry.args(),
        })
    }

    fn wait_idle(&mut self) {}
}
