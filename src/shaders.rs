// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! WGSL sources. Every module is built as `prelude + common.wgsl + family`,
//! where the prelude is generated from the host constants.

use crate::cell::{ELEMENT_COUNT, QUANTA_PER_UNIT};

pub const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");
pub const UPDATE_WGSL: &str = include_str!("shaders/update.wgsl");
pub const GRID_EDIT_WGSL: &str = include_str!("shaders/grid_edit.wgsl");
pub const DENSIFY_WGSL: &str = include_str!("shaders/densify.wgsl");
pub const EXTRACT_WGSL: &str = include_str!("shaders/extract.wgsl");
pub const SURFACE_WGSL: &str = include_str!("shaders/surface.wgsl");

pub fn shader_prelude() -> String {
    format!(
        "const ELEMENT_COUNT: u32 = {}u;\nconst QUANTA_PER_UNIT: f32 = {:.1};\n\n",
        ELEMENT_COUNT, QUANTA_PER_UNIT
    )
}

pub fn compose(family: &str) -> String {
    let mut source = shader_prelude();
    source.push_str(COMMON_WGSL);
    source.push('\n');
    source.push_str(family);
    source
}

/// `(label, composed source)` for every shader module the GPU backend builds.
pub fn all_sources() -> Vec<(&'static str, String)> {
    vec![
        ("Update Shader", compose(UPDATE_WGSL)),
        ("Grid Edit Shader", compose(GRID_EDIT_WGSL)),
        ("Densify Shader", compose(DENSIFY_WGSL)),
        ("Extract Shader", compose(EXTRACT_WGSL)),
        ("Surface Shader", compose(SURFACE_WGSL)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_carries_host_constants() {
        let prelude = shader_prelude();
        assert!(prelude.contains(&format!("ELEMENT_COUNT: u32 = {}u", ELEMENT_COUNT)));
        assert!(prelude.contains("QUANTA_PER_UNIT: f32 = 256.0"));
    }

    #[test]
    fn common_is_free_of_bindings() {
        assert!(!COMMON_WGSL.contains("@binding"));
    }
}
