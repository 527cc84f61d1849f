// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! A 3D cellular-automaton fluid that lives in GPU buffers.
//!
//! Each generation is one directional pass of an 8-phase sweep over a
//! double-buffered grid. The latest generation is densified into a 3D texture,
//! turned into triangles (or voxel quads) by a compute pass, and drawn with an
//! indirect draw whose count never leaves the GPU.
//!
//! Every kernel has a WGSL version ([`backend::GpuBackend`]) and a plain Rust
//! version ([`backend::CpuBackend`]) that follow the same rules.

pub mod backend;
pub mod camera;
pub mod cell;
pub mod editor;
pub mod error;
pub mod extraction;
pub mod grid;
pub mod kernels;
pub mod mc_table;
pub mod phase;
pub mod render;
pub mod scheduler;
pub mod settings;
pub mod shaders;
pub mod simulation;
pub mod uniforms;

pub use backend::{Backend, CpuBackend, GeometryStats, GpuBackend};
pub use cell::{Cell, Species, ELEMENT_COUNT};
pub use error::SimError;
pub use grid::{GridDimensions, GridLayout, Region, Side};
pub use phase::Phase;
pub use render::FrameStats;
pub use scheduler::Generation;
pub use settings::{ExtractionMode, SimulationSettings};
pub use simulation::Simulation;
