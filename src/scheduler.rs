// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use crate::backend::Backend;
use crate::editor::Editor;
use crate::grid::{GridLayout, GridStore, Region, Side};
use crate::phase::Phase;
use crate::uniforms::RuleConstants;

/// Handle to a completed update pass: the buffer it wrote, how many passes ran
/// so far, and which phase produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    pub side: Side,
    pub index: u64,
    pub phase: Phase,
}

/// Drives the 8-phase sweep. The only writer of the grid buffers.
pub struct UpdateScheduler<B: Backend> {
    store: GridStore<B>,
    rule: RuleConstants,
    phase: Phase,
    generation: u64,
    latest: Option<Generation>,
}

impl<B: Backend> UpdateScheduler<B> {
    pub fn new(store: GridStore<B>, rule: RuleConstants) -> Self {
        Self {
            store,
            rule,
            phase: Phase::default(),
            generation: 0,
            latest: None,
        }
    }

    /// Runs one directional pass and moves to the next phase.
    pub fn advance(&mut self, backend: &mut B, editor: &Editor) -> Generation {
        let phase = self.phase;
        let roles = phase.roles();
        let uniforms = editor.stage(self.store.layout(), phase, &self.rule);
        let layout = *self.store.layout();

        log::trace!(
            "pass {} phase {:?} axis {} offset {:?}: {:?} -> {:?}",
            self.generation,
            phase,
            uniforms.axis(),
            phase.descriptor().offset,
            roles.current,
            roles.next
        );

        let (src, dst) = self.store.split(roles);
        backend.dispatch_update(src, dst, &layout, &uniforms);

        self.phase = phase.next();
        self.generation += 1;
        let generation = Generation {
            side: roles.next,
            index: self.generation,
            phase,
        };
        self.latest = Some(generation);
        generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation_index(&self) -> u64 {
        self.generation
    }

    pub fn latest(&self) -> Option<Generation> {
        self.latest
    }

    /// Buffer holding the newest state. Before the first pass both sides are
    /// identical and A is read first.
    pub fn latest_side(&self) -> Side {
        self.latest.map(|g| g.side).unwrap_or(Side::A)
    }

    pub fn layout(&self) -> &GridLayout {
        self.store.layout()
    }

    pub fn store(&self) -> &GridStore<B> {
        &self.store
    }

    pub fn apply_obstacle(&mut self, backend: &mut B, region: &Region, solid: bool) {
        self.store.stamp_both(backend, region, solid);
    }

    pub fn release(self, backend: &mut B) {
        self.store.release(backend);
    }
}
