// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Uniform blocks shared by both backends. Field order matches the WGSL
//! structs of the same name; every row is 16 bytes so uniform layout rules hold.

use bytemuck::{Pod, Zeroable};

use crate::cell::QUANTA_PER_UNIT;
use crate::grid::{GridLayout, Region};
use crate::phase::PhaseDescriptor;

pub const EDIT_CLEAR: u32 = 0;
pub const EDIT_STAMP_SOLID: u32 = 1;
pub const EDIT_UNSTAMP_SOLID: u32 = 2;

/// Sentinel for "no fill / no heat source" in the staged cell coordinates.
pub const SOURCE_OFF: i32 = -1;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UpdateUniforms {
    pub resolution: [u32; 4], // xyz, w = axis
    pub offset: [u32; 4],     // xyz, w = phase index
    pub fill: [i32; 4],       // xyz cell or SOURCE_OFF, w = element id
    pub heat: [i32; 4],       // xyz cell or SOURCE_OFF, w = temperature (C)
    pub rule: [f32; 4],       // fill_rate, spread_threshold, boiling point (C), quanta per unit
}

const _: [(); 80] = [(); std::mem::size_of::<UpdateUniforms>()];

impl UpdateUniforms {
    pub fn new(layout: &GridLayout, phase_index: usize, descriptor: PhaseDescriptor, rule: &RuleConstants) -> Self {
        let [rx, ry, rz] = layout.resolution;
        let [ox, oy, oz] = descriptor.offset;
        Self {
            resolution: [rx, ry, rz, descriptor.axis.index() as u32],
            offset: [ox, oy, oz, phase_index as u32],
            fill: [SOURCE_OFF, SOURCE_OFF, SOURCE_OFF, 0],
            heat: [SOURCE_OFF, SOURCE_OFF, SOURCE_OFF, 0],
            rule: [
                rule.fill_rate,
                rule.spread_threshold,
                rule.boiling_point_c as f32,
                QUANTA_PER_UNIT,
            ],
        }
    }

    pub fn axis(&self) -> usize {
        self.resolution[3] as usize
    }

    pub fn fill_active(&self) -> bool {
        self.fill[0] >= 0
    }

    pub fn heat_active(&self) -> bool {
        self.heat[0] >= 0
    }
}

/// Constants of the transfer rule, taken from the settings once at init.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleConstants {
    pub fill_rate: f32,
    pub spread_threshold: f32,
    pub boiling_point_c: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GridEditUniforms {
    pub resolution: [u32; 4], // xyz, w = edit mode
    pub region_min: [u32; 4],
    pub region_max: [u32; 4], // inclusive
    pub cell_template: [f32; 4], // x = max_volume for cleared cells
}

impl GridEditUniforms {
    pub fn new(layout: &GridLayout, mode: u32, region: &Region, max_volume: f32) -> Self {
        let [rx, ry, rz] = layout.resolution;
        let [nx, ny, nz] = region.min;
        let [mx, my, mz] = region.max;
        Self {
            resolution: [rx, ry, rz, mode],
            region_min: [nx, ny, nz, 0],
            region_max: [mx, my, mz, 0],
            cell_template: [max_volume, 0.0, 0.0, 0.0],
        }
    }

    pub fn mode(&self) -> u32 {
        self.resolution[3]
    }

    pub fn region(&self) -> Region {
        Region {
            min: [self.region_min[0], self.region_min[1], self.region_min[2]],
            max: [self.region_max[0], self.region_max[1], self.region_max[2]],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ExtractUniforms {
    pub resolution: [u32; 4], // xyz, w = extraction mode
    pub counts: [u32; 4],     // x = primitive capacity, y = vertices per primitive
    pub params: [f32; 4],     // x = iso level
}

impl ExtractUniforms {
    pub fn new(layout: &GridLayout, mode: u32, capacity: u32, vertices_per_primitive: u32, iso_level: f32) -> Self {
        let [rx, ry, rz] = layout.resolution;
        Self {
            resolution: [rx, ry, rz, mode],
            counts: [capacity, vertices_per_primitive, 0, 0],
            params: [iso_level, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
    pub wave: [f32; 4],
    pub grid: [f32; 4], // xyz resolution, w = world units per cell
    pub mode: [u32; 4], // x = extraction mode
}

const _: [(); 128] = [(); std::mem::size_of::<ViewUniforms>()];
