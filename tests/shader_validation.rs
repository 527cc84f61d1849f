// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use cellfluid::extraction::{strategy_for, ExtractionStrategy};
use cellfluid::settings::ExtractionMode;
use cellfluid::shaders;

fn parse(label: &str, source: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| format!("Failed to parse {}:\n{}", label, e.emit_to_string(source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("Failed to validate {}:\n{:?}", label, e))?;
    Ok(module)
}

fn entry_points(module: &naga::Module) -> Vec<String> {
    module.entry_points.iter().map(|ep| ep.name.clone()).collect()
}

#[test]
fn validate_all_shaders() {
    let mut errors = Vec::new();
    for (label, source) in shaders::all_sources() {
        if let Err(err) = parse(label, &source) {
            errors.push(err);
        }
    }
    if !errors.is_empty() {
        panic!("Shader validation failed:\n{}", errors.join("\n"));
    }
}

#[test]
fn extraction_strategies_name_real_entry_points() {
    let module = parse("Extract Shader", &shaders::compose(shaders::EXTRACT_WGSL)).unwrap();
    let names = entry_points(&module);
    for mode in [ExtractionMode::Triangles, ExtractionMode::Quads] {
        let strategy: Box<dyn ExtractionStrategy> = strategy_for(mode);
        assert!(
            names.iter().any(|n| n == strategy.kernel_entry_point()),
            "{} missing from {:?}",
            strategy.kernel_entry_point(),
            names
        );
    }
    assert!(names.iter().any(|n| n == "finalize_args"));
}

#[test]
fn compute_and_render_entry_points_exist() {
    let cases = [
        (shaders::UPDATE_WGSL, vec!["update_cells"]),
        (shaders::GRID_EDIT_WGSL, vec!["edit_cells"]),
        (shaders::DENSIFY_WGSL, vec!["densify"]),
        (shaders::SURFACE_WGSL, vec!["vs_main", "fs_main"]),
    ];
    for (source, expected) in cases {
        let module = parse("shader", &shaders::compose(source)).unwrap();
        let names = entry_points(&module);
        for name in expected {
            assert!(names.iter().any(|n| n == name), "{name} missing from {names:?}");
        }
    }
}

#[test]
fn cell_struct_matches_host_stride() {
    let module = parse("Update Shader", &shaders::compose(shaders::UPDATE_WGSL)).unwrap();
    let cell = module
        .types
        .iter()
        .find(|(_, ty)| ty.name.as_deref() == Some("Cell"))
        .map(|(handle, _)| handle)
        .expect("Cell struct in WGSL");
    let mut layouter = naga::proc::Layouter::default();
    layouter.update(module.to_ctx()).unwrap();
    assert_eq!(layouter[cell].size as usize, std::mem::size_of::<cellfluid::Cell>());
}
