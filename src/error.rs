// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use thiserror::Error;

/// Unrecoverable failures of the simulation subsystem.
///
/// Parameter edits (`fill`, `heat`, `set_obstacle`) never produce one of these:
/// out-of-range input there is clamped or ignored by convention.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid grid dimensions {x}x{y}x{z}: every axis must be positive")]
    InvalidDimensions { x: i64, y: i64, z: i64 },

    #[error("grid resolution {resolution:?} exceeds the per-axis limit of {limit}")]
    ResolutionTooLarge { resolution: [u32; 3], limit: u32 },

    #[error("buffer capacity {capacity} cells is below the {required} cells touched by a full pass")]
    CapacityTooSmall { capacity: u64, required: u64 },

    #[error("element count mismatch: host requested {requested}, kernels are built for {compiled}")]
    ElementCountMismatch { requested: u32, compiled: u32 },

    #[error("simulation used before initialize()")]
    NotInitialized,

    #[error("device allocation failed for {label}: {reason}")]
    Allocation { label: String, reason: String },

    #[error("no compatible GPU adapter: {0}")]
    DeviceUnavailable(String),

    #[error("buffer readback failed: {0}")]
    Readback(String),
}
