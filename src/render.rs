// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use glam::{Mat4, Vec3};

use crate::backend::{Backend, GeometryStats};
use crate::error::SimError;
use crate::extraction::SurfaceExtractor;
use crate::grid::GridLayout;
use crate::scheduler::Generation;
use crate::settings::ExtractionMode;
use crate::uniforms::ViewUniforms;

/// Time-varying offset for the water-surface shimmer. Cosmetic only: it feeds
/// the fragment shader and never touches the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveAnimation {
    pub speed: [f32; 4],
}

impl WaveAnimation {
    pub fn new(speed: [f32; 4]) -> Self {
        Self { speed }
    }

    /// `fract(elapsed / 20 * speed)` per component, always in `[0, 1)`.
    pub fn offset(&self, elapsed_seconds: f32) -> [f32; 4] {
        let t = elapsed_seconds / 20.0;
        self.speed.map(|s| {
            let r = (t * s).rem_euclid(1.0);
            // rem_euclid can round up to exactly 1.0 for tiny negative inputs
            if r >= 1.0 || !r.is_finite() {
                0.0
            } else {
                r
            }
        })
    }
}

/// What `render_frame` did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub frame_index: u64,
    /// Generation the surface was extracted from; `None` before the first pass.
    pub generation: Option<Generation>,
    /// Present when the append counter was read back this frame.
    pub geometry: Option<GeometryStats>,
    pub wave_offset: [f32; 4],
}

pub struct Renderer {
    wave: WaveAnimation,
    overflow_check_interval: u32,
    frame_index: u64,
    overflow_frames: u64,
}

impl Renderer {
    pub fn new(wave: WaveAnimation, overflow_check_interval: u32) -> Self {
        Self {
            wave,
            overflow_check_interval: overflow_check_interval.max(1),
            frame_index: 0,
            overflow_frames: 0,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Frames on which an overflow was observed.
    pub fn overflow_frames(&self) -> u64 {
        self.overflow_frames
    }

    pub fn view_uniforms(
        &self,
        view_proj: Mat4,
        eye: Vec3,
        layout: &GridLayout,
        mode: ExtractionMode,
        elapsed_seconds: f32,
    ) -> ViewUniforms {
        let [rx, ry, rz] = layout.resolution;
        ViewUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            eye: eye.extend(1.0).to_array(),
            wave: self.wave.offset(elapsed_seconds),
            grid: [rx as f32, ry as f32, rz as f32, 1.0 / layout.sub_resolution as f32],
            mode: [mode.code(), 0, 0, 0],
        }
    }

    /// Syncs the indirect args from the append counter and issues the draw.
    /// Returns the geometry stats when they were read back this frame.
    pub fn draw_frame<B: Backend>(
        &mut self,
        backend: &mut B,
        extractor: &mut SurfaceExtractor<B>,
        view: &ViewUniforms,
    ) -> Result<Option<GeometryStats>, SimError> {
        backend.sync_draw_args(extractor.geometry_mut());
        backend.draw_indirect(extractor.geometry(), extractor.volume(), view);

        let check = backend.cheap_readback() || self.frame_index % self.overflow_check_interval as u64 == 0;
        self.frame_index += 1;
        if !check {
            return Ok(None);
        }

        let stats = backend.read_geometry_stats(extractor.geometry())?;
        if stats.overflowed() {
            self.overflow_frames += 1;
            log::warn!(
                "surface extraction overflowed: {} primitives requested, capacity {}, {} dropped",
                stats.live_count,
                stats.capacity,
                stats.dropped()
            );
        }
        Ok(Some(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_offset_wraps_into_unit_interval() {
        let wave = WaveAnimation::new([0.5, -0.5, 2.0, 0.0]);
        let offset = wave.offset(30.0);
        // t = 1.5
        assert_eq!(offset[0], 0.75);
        assert_eq!(offset[1], 0.25);
        assert_eq!(offset[2], 0.0);
        assert_eq!(offset[3], 0.0);
        for elapsed in [0.0, 1e-7, 13.7, 1234.5] {
            for v in WaveAnimation::new([-0.3, 0.7, -1e-6, 3.3]).offset(elapsed) {
                assert!((0.0..1.0).contains(&v), "{v} at {elapsed}");
            }
        }
    }
}
