// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Fills, heat sources and obstacle boxes.
//!
//! Obstacles are stamped into both buffers right away (see `GridStore::stamp_both`).
//! Fills and heat only stage values that every later update pass picks up.

use crate::cell::ELEMENT_COUNT;
use crate::grid::{GridLayout, Region};
use crate::phase::Phase;
use crate::uniforms::{RuleConstants, UpdateUniforms};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillSource {
    pub cell: [u32; 3],
    pub element: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatSource {
    pub cell: [u32; 3],
    pub temperature_c: i32,
}

/// Maps a position in `[0, 1]^3` to a sub-resolution cell. `p == 1.0` lands on
/// the last cell. Anything outside the unit cube, or non-finite, is `None`.
pub fn normalized_to_cell(layout: &GridLayout, position: [f32; 3]) -> Option<[u32; 3]> {
    let mut cell = [0u32; 3];
    for axis in 0..3 {
        let p = position[axis];
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return None;
        }
        let res = layout.resolution[axis];
        cell[axis] = ((p * res as f32).floor() as u32).min(res - 1);
    }
    Some(cell)
}

#[derive(Debug, Clone, Default)]
pub struct Editor {
    fill: Option<FillSource>,
    heat: Option<HeatSource>,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(&mut self, layout: &GridLayout, position: [f32; 3], element_id: u32) {
        let Some(cell) = normalized_to_cell(layout, position) else {
            if self.fill.take().is_some() {
                log::debug!("fill cancelled (position {:?})", position);
            }
            return;
        };
        if element_id as usize >= ELEMENT_COUNT {
            log::warn!(
                "ignoring fill with element id {} (only {} species)",
                element_id,
                ELEMENT_COUNT
            );
            return;
        }
        self.fill = Some(FillSource {
            cell,
            element: element_id,
        });
    }

    /// Positions outside the grid switch the heat source off.
    pub fn heat(&mut self, layout: &GridLayout, position: [i32; 3], temperature_c: i32) {
        if !layout.contains(position) {
            if self.heat.take().is_some() {
                log::debug!("heat source cleared (position {:?})", position);
            }
            return;
        }
        self.heat = Some(HeatSource {
            cell: position.map(|c| c as u32),
            temperature_c,
        });
    }

    /// Clamped obstacle box, or `None` when it misses the grid.
    pub fn obstacle_region(layout: &GridLayout, start: [i32; 3], end: [i32; 3]) -> Option<Region> {
        let region = Region::from_corners(layout, start, end);
        if region.is_none() {
            log::debug!("obstacle box {:?}..{:?} lies outside the grid", start, end);
        }
        region
    }

    pub fn fill_source(&self) -> Option<FillSource> {
        self.fill
    }

    pub fn heat_source(&self) -> Option<HeatSource> {
        self.heat
    }

    /// Uniforms for one pass of `phase` with the staged edits applied.
    pub fn stage(&self, layout: &GridLayout, phase: Phase, rule: &RuleConstants) -> UpdateUniforms {
        let mut uniforms = UpdateUniforms::new(layout, phase.index(), phase.descriptor(), rule);
        if let Some(fill) = self.fill {
            let [x, y, z] = fill.cell;
            uniforms.fill = [x as i32, y as i32, z as i32, fill.element as i32];
        }
        if let Some(heat) = self.heat {
            let [x, y, z] = heat.cell;
            uniforms.heat = [x as i32, y as i32, z as i32, heat.temperature_c];
        }
        uniforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDimensions;
    use crate::settings::SimulationSettings;

    fn layout() -> GridLayout {
        let settings = SimulationSettings {
            sub_resolution: 4,
            ..Default::default()
        };
        GridLayout::new(GridDimensions::new(2, 2, 2).unwrap(), &settings).unwrap()
    }

    fn rule() -> RuleConstants {
        RuleConstants {
            fill_rate: 0.25,
            spread_threshold: 0.0,
            boiling_point_c: 100,
        }
    }

    #[test]
    fn normalized_positions_map_to_cells() {
        let layout = layout();
        assert_eq!(normalized_to_cell(&layout, [0.0, 0.5, 1.0]), Some([0, 4, 7]));
        assert_eq!(normalized_to_cell(&layout, [0.99, 0.124, 0.126]), Some([7, 0, 1]));
        assert_eq!(normalized_to_cell(&layout, [1.01, 0.5, 0.5]), None);
        assert_eq!(normalized_to_cell(&layout, [0.5, f32::NAN, 0.5]), None);
        assert_eq!(normalized_to_cell(&layout, [-0.1, 0.5, 0.5]), None);
    }

    #[test]
    fn off_sentinel_cancels_fill() {
        let layout = layout();
        let mut editor = Editor::new();
        editor.fill(&layout, [0.5, 0.5, 0.5], 1);
        assert_eq!(editor.fill_source().map(|f| f.element), Some(1));
        editor.fill(&layout, [-1.0, -1.0, -1.0], 1);
        assert_eq!(editor.fill_source(), None);
        assert!(!editor.stage(&layout, Phase::X0, &rule()).fill_active());
    }

    #[test]
    fn invalid_element_keeps_previous_fill() {
        let layout = layout();
        let mut editor = Editor::new();
        editor.fill(&layout, [0.0, 0.0, 0.0], 2);
        editor.fill(&layout, [1.0, 1.0, 1.0], ELEMENT_COUNT as u32);
        assert_eq!(
            editor.fill_source(),
            Some(FillSource {
                cell: [0, 0, 0],
                element: 2
            })
        );
    }

    #[test]
    fn heat_outside_grid_clears_source() {
        let layout = layout();
        let mut editor = Editor::new();
        editor.heat(&layout, [1, 2, 3], 250);
        let staged = editor.stage(&layout, Phase::Y0, &rule());
        assert_eq!(staged.heat, [1, 2, 3, 250]);
        editor.heat(&layout, [8, 0, 0], 250);
        assert_eq!(editor.heat_source(), None);
    }

    #[test]
    fn obstacle_outside_grid_is_ignored() {
        let layout = layout();
        assert!(Editor::obstacle_region(&layout, [-5, -5, -5], [-1, 3, 3]).is_none());
        assert!(Editor::obstacle_region(&layout, [-5, -5, -5], [0, 0, 0]).is_some());
    }
}
