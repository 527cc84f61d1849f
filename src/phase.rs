// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! The fixed 8-phase sweep. Every axis gets two passes bracketed by Y passes,
//! and the alternating pair offsets form a Margolus-style partition so no
//! direction is favoured. Reordering this table changes the simulation.

use crate::grid::Roles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDescriptor {
    pub axis: Axis,
    pub offset: [u32; 3],
}

pub const PHASE_COUNT: usize = 8;

pub const PHASE_TABLE: [PhaseDescriptor; PHASE_COUNT] = [
    PhaseDescriptor { axis: Axis::X, offset: [0, 0, 0] },
    PhaseDescriptor { axis: Axis::Y, offset: [0, 0, 0] },
    PhaseDescriptor { axis: Axis::Z, offset: [0, 0, 0] },
    PhaseDescriptor { axis: Axis::Y, offset: [0, 1, 0] },
    PhaseDescriptor { axis: Axis::X, offset: [1, 0, 0] },
    PhaseDescriptor { axis: Axis::Y, offset: [0, 0, 0] },
    PhaseDescriptor { axis: Axis::Z, offset: [0, 0, 1] },
    PhaseDescriptor { axis: Axis::Y, offset: [0, 1, 0] },
];

/// One state of the sweep, named after its axis and occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    X0,
    Y0,
    Z0,
    Y1,
    X1,
    Y2,
    Z1,
    Y3,
}

const TRANSITIONS: [Phase; PHASE_COUNT] = [
    Phase::Y0, // X0 ->
    Phase::Z0, // Y0 ->
    Phase::Y1, // Z0 ->
    Phase::X1, // Y1 ->
    Phase::Y2, // X1 ->
    Phase::Z1, // Y2 ->
    Phase::Y3, // Z1 ->
    Phase::X0, // Y3 ->
];

impl Phase {
    pub const ALL: [Phase; PHASE_COUNT] = [
        Phase::X0,
        Phase::Y0,
        Phase::Z0,
        Phase::Y1,
        Phase::X1,
        Phase::Y2,
        Phase::Z1,
        Phase::Y3,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn descriptor(self) -> PhaseDescriptor {
        PHASE_TABLE[self.index()]
    }

    pub fn next(self) -> Self {
        TRANSITIONS[self.index()]
    }

    pub fn roles(self) -> Roles {
        Roles::for_phase_index(self.index())
    }
}
