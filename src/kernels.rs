// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Host-side versions of the compute kernels.
//!
//! `CpuBackend` runs these directly. They are written thread-per-cell like the
//! WGSL in `src/shaders/`, so every function here reads only the source buffer
//! and produces one output cell (or one item's primitives) independently.

use glam::Vec3;

use crate::cell::{quantize, Cell, Direction, ELEMENT_COUNT};
use crate::extraction::Primitive;
use crate::grid::GridLayout;
use crate::mc_table::{CORNER_OFFSETS, EDGE_CORNERS, TRI_TABLE};
use crate::uniforms::{GridEditUniforms, UpdateUniforms, EDIT_CLEAR, EDIT_STAMP_SOLID, EDIT_UNSTAMP_SOLID};

/// Face normals in emission order: +X, -X, +Y, -Y, +Z, -Z.
pub const FACE_NORMALS: [[i32; 3]; 6] = [[1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0], [0, 0, 1], [0, 0, -1]];

// ============================================================================
// GRID EDITS
// ============================================================================

pub fn edit_cells(cells: &mut [Cell], layout: &GridLayout, uniforms: &GridEditUniforms) {
    let region = uniforms.region();
    let mode = uniforms.mode();
    for z in region.min[2]..=region.max[2] {
        for y in region.min[1]..=region.max[1] {
            for x in region.min[0]..=region.max[0] {
                let cell = &mut cells[layout.index([x, y, z])];
                match mode {
                    EDIT_CLEAR => *cell = Cell::empty(uniforms.cell_template[0]),
                    EDIT_STAMP_SOLID => cell.make_solid(),
                    EDIT_UNSTAMP_SOLID => cell.solid = 0,
                    _ => {}
                }
            }
        }
    }
}

// ============================================================================
// DIRECTIONAL UPDATE
// ============================================================================

/// One species moving between the two members of a pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    /// True when the lower-coordinate member is the source.
    pub from_lower: bool,
    pub element: usize,
    pub amount: f32,
}

fn is_source(active: bool, source: &[i32; 4], coord: [u32; 3]) -> bool {
    active && (0..3).all(|i| source[i] == coord[i] as i32)
}

fn heated(uniforms: &UpdateUniforms, coord: [u32; 3]) -> bool {
    is_source(uniforms.heat_active(), &uniforms.heat, coord) && uniforms.heat[3] as f32 >= uniforms.rule[2]
}

/// Decides what moves between `lower` and `upper`, neighbours along the pass
/// axis with `lower` at the smaller coordinate.
pub fn pair_transfer(
    lower: &Cell,
    upper: &Cell,
    lower_coord: [u32; 3],
    upper_coord: [u32; 3],
    uniforms: &UpdateUniforms,
) -> Option<Transfer> {
    if lower.is_solid() || upper.is_solid() {
        return None;
    }

    let (from_lower, desired) = if uniforms.axis() == 1 {
        if heated(uniforms, lower_coord) {
            (true, lower.volume)
        } else if heated(uniforms, upper_coord) {
            return None;
        } else {
            (false, upper.volume)
        }
    } else {
        let diff = lower.volume - upper.volume;
        if diff.abs() <= uniforms.rule[1] {
            return None;
        }
        (diff > 0.0, diff.abs() * 0.5)
    };

    let (src, dst) = if from_lower { (lower, upper) } else { (upper, lower) };
    let element = src.dominant_element()?;
    let amount = quantize(desired.min(src.content[element]).min(dst.free_space()));
    if amount <= 0.0 {
        return None;
    }
    Some(Transfer {
        from_lower,
        element,
        amount,
    })
}

/// Next-generation value of the cell at `coord`.
pub fn update_cell(src: &[Cell], layout: &GridLayout, uniforms: &UpdateUniforms, coord: [u32; 3]) -> Cell {
    let mut cell = src[layout.index(coord)];
    cell.direction = Direction::None.code();
    cell.move_element_id = 0;

    let axis = uniforms.axis();
    let offset = uniforms.offset[axis];
    let c = coord[axis];
    if c >= offset {
        let is_lower = (c - offset) % 2 == 0;
        let partner_c = if is_lower { c + 1 } else { c - 1 };
        if partner_c < layout.resolution[axis] {
            let mut partner_coord = coord;
            partner_coord[axis] = partner_c;
            let partner = src[layout.index(partner_coord)];

            let transfer = if is_lower {
                pair_transfer(&cell, &partner, coord, partner_coord, uniforms)
            } else {
                pair_transfer(&partner, &cell, partner_coord, coord, uniforms)
            };

            if let Some(t) = transfer {
                if t.from_lower == is_lower {
                    cell.remove_content(t.element, t.amount);
                    cell.direction = Direction::along(axis, is_lower).code();
                    cell.move_element_id = t.element as u32;
                } else {
                    cell.add_content(t.element, t.amount);
                }
            }
        }
    }

    if is_source(uniforms.fill_active(), &uniforms.fill, coord) && !cell.is_solid() {
        let element = uniforms.fill[3] as usize;
        if element < ELEMENT_COUNT {
            let amount = quantize(uniforms.rule[0].min(cell.free_space()));
            if amount > 0.0 {
                cell.add_content(element, amount);
            }
        }
    }

    cell
}

pub fn update_pass(src: &[Cell], dst: &mut [Cell], layout: &GridLayout, uniforms: &UpdateUniforms) {
    for index in 0..layout.cell_count() {
        dst[index] = update_cell(src, layout, uniforms, layout.coord(index));
    }
}

// ============================================================================
// DENSIFY
// ============================================================================

pub fn densify_cell(cell: &Cell) -> [f32; 4] {
    let mut texel = [0.0f32; 4];
    if cell.is_solid() || cell.max_volume <= 0.0 {
        return texel;
    }
    for (channel, &amount) in texel.iter_mut().zip(cell.content.iter()) {
        *channel = (amount / cell.max_volume).clamp(0.0, 1.0);
    }
    texel
}

pub fn densify(src: &[Cell], volume: &mut [[f32; 4]], layout: &GridLayout) {
    for index in 0..layout.cell_count() {
        volume[index] = densify_cell(&src[index]);
    }
}

// ============================================================================
// SURFACE EXTRACTION
// ============================================================================

/// Parameter along an edge where the field crosses `iso`.
pub fn edge_t(iso: f32, va: f32, vb: f32) -> f32 {
    let denom = vb - va;
    if denom.abs() < 1e-6 {
        0.5
    } else {
        ((iso - va) / denom).clamp(0.0, 1.0)
    }
}

/// Marching-cubes case for the cube whose origin cell is `cube`.
pub fn cube_case(cells: &[Cell], layout: &GridLayout, iso: f32, cube: [u32; 3]) -> (usize, [f32; 8]) {
    let mut values = [0.0f32; 8];
    let mut case = 0usize;
    for (corner, offset) in CORNER_OFFSETS.iter().enumerate() {
        let coord = [cube[0] + offset[0], cube[1] + offset[1], cube[2] + offset[2]];
        values[corner] = cells[layout.index(coord)].fill_fraction();
        if values[corner] >= iso {
            case |= 1 << corner;
        }
    }
    (case, values)
}

/// Emits the triangles of one cube. Positions are in cell units with cell
/// centres at `i + 0.5`.
pub fn march_cube(cells: &[Cell], layout: &GridLayout, iso: f32, cube: [u32; 3], emit: &mut dyn FnMut(Primitive)) {
    let (case, values) = cube_case(cells, layout, iso, cube);
    let row = &TRI_TABLE[case];

    let vertex = |edge: usize| -> Vec3 {
        let [a, b] = EDGE_CORNERS[edge];
        let t = edge_t(iso, values[a], values[b]);
        let origin = Vec3::new(cube[0] as f32, cube[1] as f32, cube[2] as f32) + Vec3::splat(0.5);
        let pa = origin + Vec3::from(CORNER_OFFSETS[a].map(|o| o as f32));
        let pb = origin + Vec3::from(CORNER_OFFSETS[b].map(|o| o as f32));
        pa + (pb - pa) * t
    };

    for tri in row.chunks_exact(3) {
        if tri[0] < 0 {
            break;
        }
        let a = vertex(tri[0] as usize);
        let b = vertex(tri[1] as usize);
        let c = vertex(tri[2] as usize);
        let n = (b - a).cross(c - a).normalize_or_zero();
        emit(Primitive {
            a: a.extend(1.0).to_array(),
            b: b.extend(1.0).to_array(),
            c: c.extend(1.0).to_array(),
            normal: n.extend(0.0).to_array(),
        });
    }
}

/// Emits one quad per exposed face of the cell at `coord`.
pub fn voxel_faces(cells: &[Cell], layout: &GridLayout, iso: f32, coord: [u32; 3], emit: &mut dyn FnMut(Primitive)) {
    let cell = &cells[layout.index(coord)];
    if cell.is_solid() || cell.fill_fraction() < iso {
        return;
    }
    for (face, normal) in FACE_NORMALS.iter().enumerate() {
        let neighbour = [
            coord[0] as i32 + normal[0],
            coord[1] as i32 + normal[1],
            coord[2] as i32 + normal[2],
        ];
        if !layout.contains(neighbour) {
            continue;
        }
        let other = &cells[layout.index(neighbour.map(|c| c as u32))];
        if other.is_solid() || other.fill_fraction() >= iso {
            continue;
        }
        emit(Primitive {
            a: [coord[0] as f32, coord[1] as f32, coord[2] as f32, face as f32],
            b: [cell.fill_fraction(), 0.0, 0.0, 0.0],
            c: [0.0; 4],
            normal: [normal[0] as f32, normal[1] as f32, normal[2] as f32, 0.0],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Species;
    use crate::grid::{GridDimensions, Region};
    use crate::phase::Phase;
    use crate::settings::SimulationSettings;
    use crate::uniforms::RuleConstants;

    fn layout(x: i32, y: i32, z: i32) -> GridLayout {
        let settings = SimulationSettings {
            sub_resolution: 1,
            ..Default::default()
        };
        GridLayout::new(GridDimensions::new(x, y, z).unwrap(), &settings).unwrap()
    }

    fn rule() -> RuleConstants {
        RuleConstants {
            fill_rate: 0.25,
            spread_threshold: 1.0 / 64.0,
            boiling_point_c: 100,
        }
    }

    fn empty_grid(layout: &GridLayout) -> Vec<Cell> {
        vec![Cell::empty(1.0); layout.cell_count()]
    }

    fn run(phase: Phase, layout: &GridLayout, cells: &[Cell], tweak: impl FnOnce(&mut UpdateUniforms)) -> Vec<Cell> {
        let mut uniforms = UpdateUniforms::new(layout, phase.index(), phase.descriptor(), &rule());
        tweak(&mut uniforms);
        let mut out = vec![Cell::empty(0.0); cells.len()];
        update_pass(cells, &mut out, layout, &uniforms);
        out
    }

    #[test]
    fn gravity_moves_fluid_down() {
        let layout = layout(1, 2, 1);
        let mut cells = empty_grid(&layout);
        cells[layout.index([0, 1, 0])].add_content(Species::Water.index(), 0.5);

        let out = run(Phase::Y0, &layout, &cells, |_| {});
        let top = out[layout.index([0, 1, 0])];
        let bottom = out[layout.index([0, 0, 0])];
        assert_eq!(top.volume, 0.0);
        assert_eq!(bottom.volume, 0.5);
        assert_eq!(top.direction(), Direction::NegY);
        assert_eq!(bottom.direction(), Direction::None);
        assert!(top.is_consistent() && bottom.is_consistent());
    }

    #[test]
    fn odd_offset_leaves_bottom_row_unpaired() {
        let layout = layout(1, 2, 1);
        let mut cells = empty_grid(&layout);
        cells[layout.index([0, 1, 0])].add_content(0, 0.5);
        // Y1 pairs (1, 2); row 2 does not exist so nothing moves.
        let out = run(Phase::Y1, &layout, &cells, |_| {});
        assert_eq!(out, cells);
    }

    #[test]
    fn solid_blocks_transfer() {
        let layout = layout(1, 2, 1);
        let mut cells = empty_grid(&layout);
        cells[layout.index([0, 1, 0])].add_content(0, 0.5);
        cells[layout.index([0, 0, 0])].make_solid();
        let out = run(Phase::Y0, &layout, &cells, |_| {});
        assert_eq!(out[layout.index([0, 1, 0])].volume, 0.5);
    }

    #[test]
    fn transfer_respects_free_space() {
        let layout = layout(1, 2, 1);
        let mut cells = empty_grid(&layout);
        cells[layout.index([0, 1, 0])].add_content(0, 0.75);
        cells[layout.index([0, 0, 0])].add_content(1, 0.5);
        let out = run(Phase::Y0, &layout, &cells, |_| {});
        let bottom = out[layout.index([0, 0, 0])];
        assert_eq!(bottom.volume, 1.0);
        assert_eq!(bottom.content, [0.5, 0.5, 0.0, 0.0]);
        assert_eq!(out[layout.index([0, 1, 0])].volume, 0.25);
    }

    #[test]
    fn boiling_heat_reverses_flow() {
        let layout = layout(1, 2, 1);
        let mut cells = empty_grid(&layout);
        cells[layout.index([0, 0, 0])].add_content(0, 0.5);
        let out = run(Phase::Y0, &layout, &cells, |u| u.heat = [0, 0, 0, 150]);
        assert_eq!(out[layout.index([0, 1, 0])].volume, 0.5);
        assert_eq!(out[layout.index([0, 0, 0])].direction(), Direction::PosY);

        // Below the boiling point gravity still wins.
        let cool = run(Phase::Y0, &layout, &cells, |u| u.heat = [0, 0, 0, 40]);
        assert_eq!(cool[layout.index([0, 0, 0])].volume, 0.5);
    }

    #[test]
    fn sideways_pass_levels_half_the_difference() {
        let layout = layout(2, 1, 1);
        let mut cells = empty_grid(&layout);
        cells[layout.index([0, 0, 0])].add_content(Species::Oil.index(), 1.0);
        let out = run(Phase::X0, &layout, &cells, |_| {});
        assert_eq!(out[0].volume, 0.5);
        assert_eq!(out[1].volume, 0.5);
        assert_eq!(out[0].direction(), Direction::PosX);
        assert_eq!(out[0].move_element_id, Species::Oil.index() as u32);
    }

    #[test]
    fn fill_adds_to_the_staged_cell_only() {
        let layout = layout(2, 2, 2);
        let cells = empty_grid(&layout);
        let out = run(Phase::X0, &layout, &cells, |u| u.fill = [1, 1, 1, Species::Acid.index() as i32]);
        let filled = out[layout.index([1, 1, 1])];
        assert_eq!(filled.content[Species::Acid.index()], 0.25);
        let total: f32 = out.iter().map(|c| c.volume).sum();
        assert_eq!(total, 0.25);
    }

    #[test]
    fn stamp_and_unstamp_region() {
        let layout = layout(3, 3, 3);
        let mut cells = empty_grid(&layout);
        cells[layout.index([1, 1, 1])].add_content(0, 0.5);
        let region = Region::from_corners(&layout, [1, 1, 1], [2, 2, 2]).unwrap();
        edit_cells(&mut cells, &layout, &GridEditUniforms::new(&layout, EDIT_STAMP_SOLID, &region, 0.0));
        assert_eq!(cells.iter().filter(|c| c.is_solid()).count(), 8);
        assert_eq!(cells[layout.index([1, 1, 1])].volume, 0.0);

        edit_cells(&mut cells, &layout, &GridEditUniforms::new(&layout, EDIT_UNSTAMP_SOLID, &region, 0.0));
        assert!(cells.iter().all(|c| !c.is_solid() && c.volume == 0.0));
    }

    #[test]
    fn densify_clamps_and_zeroes_solids() {
        let mut cell = Cell::empty(2.0);
        cell.add_content(2, 1.0);
        assert_eq!(densify_cell(&cell), [0.0, 0.0, 0.5, 0.0]);
        cell.make_solid();
        assert_eq!(densify_cell(&cell), [0.0; 4]);
    }

    #[test]
    fn single_full_corner_emits_one_triangle() {
        let layout = layout(2, 2, 2);
        let mut cells = empty_grid(&layout);
        cells[0].add_content(0, 1.0);
        let mut emitted = Vec::new();
        march_cube(&cells, &layout, 0.5, [0, 0, 0], &mut |p| emitted.push(p));
        assert_eq!(emitted.len(), 1);
        // Every vertex sits halfway along an edge leaving corner 0.
        for v in [emitted[0].a, emitted[0].b, emitted[0].c] {
            let coords = [v[0], v[1], v[2]];
            assert_eq!(coords.iter().filter(|&&c| c == 1.0).count(), 1);
            assert_eq!(coords.iter().filter(|&&c| c == 0.5).count(), 2);
        }
    }

    #[test]
    fn isolated_cell_exposes_only_in_grid_faces() {
        let layout = layout(2, 1, 1);
        let mut cells = empty_grid(&layout);
        cells[0].add_content(0, 1.0);
        let mut faces = Vec::new();
        voxel_faces(&cells, &layout, 0.5, [0, 0, 0], &mut |p| faces.push(p));
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].a[3], 0.0);
        assert_eq!(faces[0].normal, [1.0, 0.0, 0.0, 0.0]);
    }
}
