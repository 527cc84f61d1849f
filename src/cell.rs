// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use bytemuck::{Pod, Zeroable};

/// Number of fluid species carried per cell. The WGSL prelude is generated from
/// this constant, so the host and device layouts cannot drift apart.
pub const ELEMENT_COUNT: usize = 4;

/// Every fluid amount in the automaton is a multiple of 1 / QUANTA_PER_UNIT.
/// Dyadic amounts keep f32 arithmetic exact, so transfers conserve mass bit-for-bit.
pub const QUANTA_PER_UNIT: f32 = 256.0;
pub const TRANSFER_QUANTUM: f32 = 1.0 / QUANTA_PER_UNIT;

/// Round a non-negative amount down to the transfer quantum.
#[inline]
pub fn quantize(amount: f32) -> f32 {
    if amount.is_nan() || amount <= 0.0 {
        return 0.0;
    }
    (amount * QUANTA_PER_UNIT).floor() / QUANTA_PER_UNIT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Water = 0,
    Oil = 1,
    Lava = 2,
    Acid = 3,
}

impl Species {
    pub const ALL: [Species; ELEMENT_COUNT] = [Species::Water, Species::Oil, Species::Lava, Species::Acid];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Species::Water => "water",
            Species::Oil => "oil",
            Species::Lava => "lava",
            Species::Acid => "acid",
        }
    }
}

// Linear RGBA palette, indexed by species. Mirrored in surface.wgsl.
pub const SPECIES_COLORS: [[f32; 4]; ELEMENT_COUNT] = [
    [0.10, 0.35, 0.85, 1.0], // water
    [0.75, 0.55, 0.10, 1.0], // oil
    [0.95, 0.25, 0.05, 1.0], // lava
    [0.30, 0.90, 0.20, 1.0], // acid
];

const SOLID_COLOR: [f32; 4] = [0.35, 0.35, 0.35, 1.0];
const OUT_OF_RANGE_COLOR: [f32; 4] = [1.0, 0.0, 1.0, 1.0];

/// Direction a cell moved mass toward during the pass that wrote it.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    None = 0,
    PosX = 1,
    NegX = 2,
    PosY = 3,
    NegY = 4,
    PosZ = 5,
    NegZ = 6,
}

impl Direction {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Direction::None,
            1 => Direction::PosX,
            2 => Direction::NegX,
            3 => Direction::PosY,
            4 => Direction::NegY,
            5 => Direction::PosZ,
            6 => Direction::NegZ,
            _ => return None,
        })
    }

    /// Direction along `axis` (0 = X, 1 = Y, 2 = Z).
    pub fn along(axis: usize, positive: bool) -> Self {
        match (axis, positive) {
            (0, true) => Direction::PosX,
            (0, false) => Direction::NegX,
            (1, true) => Direction::PosY,
            (1, false) => Direction::NegY,
            (2, true) => Direction::PosZ,
            (2, false) => Direction::NegZ,
            _ => Direction::None,
        }
    }
}

/// One automaton cell. Layout matches `struct Cell` in common.wgsl (std430, 36 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Cell {
    pub volume: f32,
    pub content: [f32; ELEMENT_COUNT],
    pub direction: u32,
    pub move_element_id: u32,
    pub max_volume: f32,
    pub solid: u32,
}

const _: [(); 36] = [(); std::mem::size_of::<Cell>()];

impl Cell {
    pub fn empty(max_volume: f32) -> Self {
        Self {
            max_volume,
            ..Self::zeroed()
        }
    }

    #[inline]
    pub fn is_solid(&self) -> bool {
        self.solid != 0
    }

    pub fn direction(&self) -> Direction {
        Direction::from_code(self.direction).unwrap_or(Direction::None)
    }

    /// Sum of species content, accumulated in index order (the kernels use the same order).
    #[inline]
    pub fn content_sum(&self) -> f32 {
        let mut sum = 0.0;
        for amount in self.content {
            sum += amount;
        }
        sum
    }

    #[inline]
    pub fn free_space(&self) -> f32 {
        (self.max_volume - self.volume).max(0.0)
    }

    /// Fill level used by the isosurface: solids and zero-capacity cells read as empty.
    #[inline]
    pub fn fill_fraction(&self) -> f32 {
        if self.is_solid() || self.max_volume <= 0.0 {
            0.0
        } else {
            self.volume / self.max_volume
        }
    }

    pub fn add_content(&mut self, element: usize, amount: f32) {
        self.content[element] += amount;
        self.volume = self.content_sum();
    }

    /// Removes up to `amount` of `element`; returns what was actually removed.
    pub fn remove_content(&mut self, element: usize, amount: f32) -> f32 {
        let removed = amount.min(self.content[element]).max(0.0);
        self.content[element] -= removed;
        self.volume = self.content_sum();
        removed
    }

    /// Species with the largest content; ties resolve to the lowest index.
    pub fn dominant_element(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, &amount) in self.content.iter().enumerate() {
            if amount <= 0.0 {
                continue;
            }
            match best {
                Some(b) if self.content[b] >= amount => {}
                _ => best = Some(i),
            }
        }
        best
    }

    pub fn make_solid(&mut self) {
        self.content = [0.0; ELEMENT_COUNT];
        self.volume = 0.0;
        self.direction = Direction::None.code();
        self.move_element_id = 0;
        self.solid = 1;
    }

    pub fn is_consistent(&self) -> bool {
        self.volume == self.content_sum()
    }

    /// Out-of-range volume is a debug signal, not a fault.
    pub fn is_out_of_range(&self) -> bool {
        self.volume < 0.0 || self.volume > self.max_volume
    }
}

/// Debug visualization of a cell: species blend, alpha = fill level.
/// Solids are grey, out-of-range volumes magenta.
pub fn debug_color(cell: &Cell) -> [f32; 4] {
    if cell.is_solid() {
        return SOLID_COLOR;
    }
    if cell.is_out_of_range() {
        return OUT_OF_RANGE_COLOR;
    }
    if cell.volume <= 0.0 {
        return [0.0; 4];
    }

    let mut rgb = [0.0f32; 3];
    for (species, &amount) in cell.content.iter().enumerate() {
        let weight = amount / cell.volume;
        for c in 0..3 {
            rgb[c] += SPECIES_COLORS[species][c] * weight;
        }
    }
    [rgb[0], rgb[1], rgb[2], cell.fill_fraction().clamp(0.0, 1.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_floors_to_quantum() {
        assert_eq!(quantize(1.0), 1.0);
        assert_eq!(quantize(TRANSFER_QUANTUM * 3.7), TRANSFER_QUANTUM * 3.0);
        assert_eq!(quantize(-0.5), 0.0);
        assert_eq!(quantize(f32::NAN), 0.0);
    }

    #[test]
    fn mutators_keep_volume_equal_to_content() {
        let mut cell = Cell::empty(1.0);
        cell.add_content(Species::Water.index(), 0.5);
        cell.add_content(Species::Oil.index(), 0.25);
        assert!(cell.is_consistent());
        assert_eq!(cell.volume, 0.75);

        let removed = cell.remove_content(Species::Oil.index(), 1.0);
        assert_eq!(removed, 0.25);
        assert!(cell.is_consistent());
        assert_eq!(cell.volume, 0.5);
    }

    #[test]
    fn dominant_element_prefers_lowest_index_on_tie() {
        let mut cell = Cell::empty(1.0);
        assert_eq!(cell.dominant_element(), None);
        cell.add_content(2, 0.25);
        cell.add_content(1, 0.25);
        assert_eq!(cell.dominant_element(), Some(1));
        cell.add_content(3, 0.5);
        assert_eq!(cell.dominant_element(), Some(3));
    }

    #[test]
    fn make_solid_clears_fluid() {
        let mut cell = Cell::empty(1.0);
        cell.add_content(0, 0.5);
        cell.make_solid();
        assert!(cell.is_solid());
        assert_eq!(cell.volume, 0.0);
        assert!(cell.is_consistent());
        assert_eq!(cell.fill_fraction(), 0.0);
    }

    #[test]
    fn debug_color_flags_out_of_range_volume() {
        let mut cell = Cell::empty(1.0);
        cell.add_content(0, 2.0);
        assert_eq!(debug_color(&cell), OUT_OF_RANGE_COLOR);

        let mut water = Cell::empty(1.0);
        water.add_content(Species::Water.index(), 0.5);
        let color = debug_color(&water);
        assert_eq!(&color[..3], &SPECIES_COLORS[0][..3]);
        assert_eq!(color[3], 0.5);
    }

    #[test]
    fn direction_codes_round_trip() {
        for code in 0..7 {
            let dir = Direction::from_code(code).unwrap();
            assert_eq!(dir.code(), code);
        }
        assert_eq!(Direction::from_code(7), None);
        assert_eq!(Direction::along(1, false), Direction::NegY);
    }
}
