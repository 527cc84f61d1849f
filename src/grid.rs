// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use crate::backend::Backend;
use crate::cell::{Cell, ELEMENT_COUNT};
use crate::error::SimError;
use crate::settings::SimulationSettings;
use crate::uniforms::{GridEditUniforms, EDIT_CLEAR, EDIT_STAMP_SOLID, EDIT_UNSTAMP_SOLID};

/// Compute kernels run 4x4x4 threads per workgroup (see the @workgroup_size attributes).
pub const WORKGROUP_EDGE: u32 = 4;
/// Largest sub-resolution extent per axis; matches the default 3D texture limit.
pub const MAX_AXIS_RESOLUTION: u32 = 2048;

/// Logical automaton size in macro-cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridDimensions {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridDimensions {
    pub fn new(x: i32, y: i32, z: i32) -> Result<Self, SimError> {
        if x <= 0 || y <= 0 || z <= 0 {
            return Err(SimError::InvalidDimensions {
                x: x as i64,
                y: y as i64,
                z: z as i64,
            });
        }
        Ok(Self {
            x: x as u32,
            y: y as u32,
            z: z as u32,
        })
    }

    pub fn macro_cells(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

/// Sizes and addressing of the sub-resolution grid every pass runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub dims: GridDimensions,
    pub sub_resolution: u32,
    pub resolution: [u32; 3],
    /// Allocated cells per buffer (over-provisioned).
    pub capacity: u64,
}

impl GridLayout {
    pub fn new(dims: GridDimensions, settings: &SimulationSettings) -> Result<Self, SimError> {
        let sub = settings.sub_resolution.max(1);
        let resolution = [dims.x, dims.y, dims.z].map(|d| d.saturating_mul(sub));
        if resolution.iter().any(|&r| r > MAX_AXIS_RESOLUTION) {
            return Err(SimError::ResolutionTooLarge {
                resolution,
                limit: MAX_AXIS_RESOLUTION,
            });
        }

        let capacity = dims
            .macro_cells()
            .checked_mul(settings.effective_overprovision())
            .ok_or_else(|| SimError::Allocation {
                label: "Cells".to_string(),
                reason: format!(
                    "{} macro-cells x {} cells each overflows the cell count",
                    dims.macro_cells(),
                    settings.effective_overprovision()
                ),
            })?;
        let required = resolution.iter().map(|&r| r as u64).product::<u64>();
        if capacity < required {
            return Err(SimError::CapacityTooSmall { capacity, required });
        }

        Ok(Self {
            dims,
            sub_resolution: sub,
            resolution,
            capacity,
        })
    }

    /// Cells touched by a full-resolution pass.
    pub fn cell_count(&self) -> usize {
        self.resolution.iter().map(|&r| r as usize).product()
    }

    pub fn buffer_bytes(&self) -> u64 {
        self.capacity.saturating_mul(std::mem::size_of::<Cell>() as u64)
    }

    #[inline]
    pub fn index(&self, coord: [u32; 3]) -> usize {
        let [rx, ry, _] = self.resolution;
        coord[0] as usize + rx as usize * (coord[1] as usize + ry as usize * coord[2] as usize)
    }

    pub fn coord(&self, index: usize) -> [u32; 3] {
        let rx = self.resolution[0] as usize;
        let ry = self.resolution[1] as usize;
        [
            (index % rx) as u32,
            ((index / rx) % ry) as u32,
            (index / (rx * ry)) as u32,
        ]
    }

    pub fn contains(&self, coord: [i32; 3]) -> bool {
        coord
            .iter()
            .zip(self.resolution)
            .all(|(&c, r)| c >= 0 && (c as u32) < r)
    }

    /// Workgroup counts covering `extent` threads.
    pub fn workgroups(extent: [u32; 3]) -> [u32; 3] {
        extent.map(|e| e.div_ceil(WORKGROUP_EDGE))
    }
}

/// Inclusive axis-aligned box in sub-resolution coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub min: [u32; 3],
    pub max: [u32; 3],
}

impl Region {
    /// Orders the corners per axis and clamps to the grid. `None` when the box
    /// misses the grid entirely.
    pub fn from_corners(layout: &GridLayout, start: [i32; 3], end: [i32; 3]) -> Option<Self> {
        let mut min = [0u32; 3];
        let mut max = [0u32; 3];
        for axis in 0..3 {
            let lo = start[axis].min(end[axis]);
            let hi = start[axis].max(end[axis]);
            let limit = layout.resolution[axis] as i32 - 1;
            if hi < 0 || lo > limit {
                return None;
            }
            min[axis] = lo.max(0) as u32;
            max[axis] = hi.min(limit) as u32;
        }
        Some(Self { min, max })
    }

    pub fn whole(layout: &GridLayout) -> Self {
        Self {
            min: [0; 3],
            max: layout.resolution.map(|r| r.saturating_sub(1)),
        }
    }

    pub fn contains(&self, coord: [u32; 3]) -> bool {
        (0..3).all(|axis| coord[axis] >= self.min[axis] && coord[axis] <= self.max[axis])
    }

    pub fn cell_count(&self) -> u64 {
        (0..3)
            .map(|axis| (self.max[axis] - self.min[axis] + 1) as u64)
            .product()
    }
}

/// Name of one ping-pong buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Read source and write target of one update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    pub current: Side,
    pub next: Side,
}

impl Roles {
    /// Even phases read A and write B; odd phases read B and write A.
    pub fn for_phase_index(index: usize) -> Self {
        let current = if index % 2 == 0 { Side::A } else { Side::B };
        Self {
            current,
            next: current.other(),
        }
    }
}

/// The two cell buffers of the automaton.
pub struct GridStore<B: Backend> {
    layout: GridLayout,
    buffers: [B::CellBuffer; 2],
}

impl<B: Backend> GridStore<B> {
    pub fn allocate(
        backend: &mut B,
        dims: GridDimensions,
        element_count: u32,
        settings: &SimulationSettings,
    ) -> Result<Self, SimError> {
        if element_count as usize != ELEMENT_COUNT {
            return Err(SimError::ElementCountMismatch {
                requested: element_count,
                compiled: ELEMENT_COUNT as u32,
            });
        }
        let layout = GridLayout::new(dims, settings)?;

        let buffer_a = backend.create_cell_buffer(&layout, "Cells A")?;
        let buffer_b = match backend.create_cell_buffer(&layout, "Cells B") {
            Ok(buffer) => buffer,
            Err(err) => {
                backend.destroy_cell_buffer(buffer_a);
                return Err(err);
            }
        };

        log::info!(
            "allocated grid {}x{}x{} ({} cells, {} bytes per buffer) on {}",
            layout.resolution[0],
            layout.resolution[1],
            layout.resolution[2],
            layout.cell_count(),
            layout.buffer_bytes(),
            backend.name()
        );

        Ok(Self {
            layout,
            buffers: [buffer_a, buffer_b],
        })
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Writes an empty cell into both buffers; either one may be read first.
    pub fn initialize_empty(&mut self, backend: &mut B, max_volume: f32) {
        let uniforms = GridEditUniforms::new(&self.layout, EDIT_CLEAR, &Region::whole(&self.layout), max_volume);
        for buffer in &mut self.buffers {
            backend.edit_cells(buffer, &self.layout, &uniforms);
        }
    }

    /// Stamps (or clears) an obstacle box into both buffers right away.
    pub fn stamp_both(&mut self, backend: &mut B, region: &Region, solid: bool) {
        let mode = if solid { EDIT_STAMP_SOLID } else { EDIT_UNSTAMP_SOLID };
        let uniforms = GridEditUniforms::new(&self.layout, mode, region, 0.0);
        for buffer in &mut self.buffers {
            backend.edit_cells(buffer, &self.layout, &uniforms);
        }
    }

    pub fn buffer(&self, side: Side) -> &B::CellBuffer {
        match side {
            Side::A => &self.buffers[0],
            Side::B => &self.buffers[1],
        }
    }

    /// Borrows the read source and write target for one pass.
    pub fn split(&mut self, roles: Roles) -> (&B::CellBuffer, &mut B::CellBuffer) {
        let [a, b] = &mut self.buffers;
        match roles.current {
            Side::A => (&*a, b),
            Side::B => (&*b, a),
        }
    }

    pub fn release(self, backend: &mut B) {
        let [a, b] = self.buffers;
        backend.destroy_cell_buffer(a);
        backend.destroy_cell_buffer(b);
        log::info!("released grid buffers on {}", backend.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(sub: u32) -> GridLayout {
        let settings = SimulationSettings {
            sub_resolution: sub,
            ..Default::default()
        };
        GridLayout::new(GridDimensions::new(2, 1, 3).unwrap(), &settings).unwrap()
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        assert!(matches!(
            GridDimensions::new(0, 4, 4),
            Err(SimError::InvalidDimensions { x: 0, .. })
        ));
        assert!(GridDimensions::new(4, -1, 4).is_err());
    }

    #[test]
    fn capacity_must_cover_sub_resolution_grid() {
        let settings = SimulationSettings {
            sub_resolution: 4,
            overprovision_factor: Some(8),
            ..Default::default()
        };
        let err = GridLayout::new(GridDimensions::new(2, 2, 2).unwrap(), &settings).unwrap_err();
        assert!(matches!(err, SimError::CapacityTooSmall { capacity: 64, required: 512 }));
    }

    #[test]
    fn oversized_overprovision_is_an_error() {
        let settings = SimulationSettings {
            sub_resolution: 1,
            overprovision_factor: Some(u32::MAX),
            ..Default::default()
        };
        let err = GridLayout::new(GridDimensions::new(2048, 2048, 2048).unwrap(), &settings).unwrap_err();
        assert!(matches!(err, SimError::Allocation { .. }));
    }

    #[test]
    fn index_and_coord_agree() {
        let layout = layout(2);
        assert_eq!(layout.resolution, [4, 2, 6]);
        for index in 0..layout.cell_count() {
            assert_eq!(layout.index(layout.coord(index)), index);
        }
        assert_eq!(layout.index([1, 1, 1]), 1 + 4 + 8);
    }

    #[test]
    fn region_sorts_and_clamps_corners() {
        let layout = layout(2);
        let region = Region::from_corners(&layout, [5, 1, -3], [2, -7, 1]).unwrap();
        assert_eq!(region.min, [2, 0, 0]);
        assert_eq!(region.max, [3, 1, 1]);
        assert_eq!(region.cell_count(), 2 * 2 * 2);
        assert!(Region::from_corners(&layout, [10, 0, 0], [12, 1, 1]).is_none());
    }

    #[test]
    fn roles_alternate_with_phase_parity() {
        let even = Roles::for_phase_index(0);
        let odd = Roles::for_phase_index(1);
        assert_eq!(even, Roles { current: Side::A, next: Side::B });
        assert_eq!(odd, Roles { current: Side::B, next: Side::A });
        assert_eq!(Roles::for_phase_index(6), even);
    }

    #[test]
    fn workgroups_round_up() {
        assert_eq!(GridLayout::workgroups([4, 5, 9]), [1, 2, 3]);
        assert_eq!(GridLayout::workgroups([0, 1, 1]), [0, 1, 1]);
    }
}
