// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::cell::quantize;

pub const SETTINGS_FILE_NAME: &str = "cellfluid_settings.json";
/// sub_resolution^3 at the largest allowed sub-resolution.
pub const MAX_OVERPROVISION_FACTOR: u32 = 64 * 64 * 64;

/// Which primitive the surface extraction emits. Chosen once, when the
/// extraction resources are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExtractionMode {
    /// Marching-cubes triangles between cell centres.
    #[default]
    Triangles,
    /// One axis-aligned quad per exposed voxel face.
    Quads,
}

impl ExtractionMode {
    /// Value the kernels and the surface shader switch on.
    pub fn code(self) -> u32 {
        match self {
            ExtractionMode::Triangles => 0,
            ExtractionMode::Quads => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationSettings {
    /// Sub-resolution cells per macro-cell, per axis.
    pub sub_resolution: u32,
    /// Cells allocated per macro-cell. `None` means sub_resolution^3.
    pub overprovision_factor: Option<u32>,
    pub cell_capacity: f32,
    pub extraction_mode: ExtractionMode,
    pub iso_level: f32,
    pub max_primitive_capacity: u32,
    /// Fluid added to the fill cell on every pass while a fill is active.
    pub fill_rate: f32,
    /// Minimum volume difference before sideways passes move fluid.
    pub spread_threshold: f32,
    pub boiling_point_c: i32,
    pub wave_speed: [f32; 4],
    /// GPU overflow readback cadence in frames.
    pub overflow_check_interval: u32,
    pub steps_per_frame: u32,
    pub clear_color: [f32; 3],
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            sub_resolution: 16,
            overprovision_factor: None,
            cell_capacity: 1.0,
            extraction_mode: ExtractionMode::Triangles,
            iso_level: 0.5,
            max_primitive_capacity: 1024 * 1024,
            fill_rate: 0.25,
            spread_threshold: 1.0 / 64.0,
            boiling_point_c: 100,
            wave_speed: [0.6, 0.3, -0.4, 0.5],
            overflow_check_interval: 60,
            steps_per_frame: 8,
            clear_color: [0.02, 0.02, 0.04],
        }
    }
}

impl SimulationSettings {
    pub fn default_path() -> PathBuf {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(SETTINGS_FILE_NAME)
    }

    pub fn load_from_disk(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&data)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Loads `path` when it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_disk(path) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("ignoring unreadable settings file {}: {err:#}", path.display());
                Self::default()
            }
        }
    }

    pub fn save_to_disk(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn sanitize(&mut self) {
        self.sub_resolution = self.sub_resolution.clamp(1, 64);
        if let Some(factor) = self.overprovision_factor {
            self.overprovision_factor = Some(factor.clamp(1, MAX_OVERPROVISION_FACTOR));
        }
        // Capacities and rates must stay on the transfer quantum or mass stops being exact.
        self.cell_capacity = quantize(self.cell_capacity.clamp(1.0 / 16.0, 64.0));
        self.iso_level = if self.iso_level.is_finite() {
            self.iso_level.clamp(0.01, 0.99)
        } else {
            0.5
        };
        self.max_primitive_capacity = self.max_primitive_capacity.clamp(1, 64 * 1024 * 1024);
        self.fill_rate = quantize(self.fill_rate.clamp(0.0, self.cell_capacity));
        self.spread_threshold = quantize(self.spread_threshold.clamp(0.0, self.cell_capacity));
        self.boiling_point_c = self.boiling_point_c.clamp(-273, 10_000);
        for speed in &mut self.wave_speed {
            if !speed.is_finite() {
                *speed = 0.0;
            }
            *speed = speed.clamp(-100.0, 100.0);
        }
        self.overflow_check_interval = self.overflow_check_interval.clamp(1, 10_000);
        self.steps_per_frame = self.steps_per_frame.clamp(1, 256);
        for c in &mut self.clear_color {
            *c = c.clamp(0.0, 1.0);
        }
    }

    /// Cells allocated per macro-cell.
    pub fn effective_overprovision(&self) -> u64 {
        match self.overprovision_factor {
            Some(factor) => factor as u64,
            None => (self.sub_resolution as u64).pow(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_survive_sanitize() {
        let mut settings = SimulationSettings::default();
        settings.sanitize();
        assert_eq!(settings, SimulationSettings::default());
    }

    #[test]
    fn sanitize_snaps_rates_to_quantum() {
        let mut settings = SimulationSettings {
            fill_rate: 0.3,
            cell_capacity: 1.01,
            iso_level: f32::NAN,
            ..Default::default()
        };
        settings.sanitize();
        assert_eq!(settings.cell_capacity, 1.0078125);
        assert_eq!(settings.fill_rate, quantize(0.3));
        assert_eq!(settings.iso_level, 0.5);
    }

    #[test]
    fn sanitize_caps_overprovision_factor() {
        let mut settings = SimulationSettings {
            overprovision_factor: Some(u32::MAX),
            ..Default::default()
        };
        settings.sanitize();
        assert_eq!(settings.overprovision_factor, Some(MAX_OVERPROVISION_FACTOR));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: SimulationSettings =
            serde_json::from_str(r#"{ "sub_resolution": 4, "extraction_mode": "Quads" }"#).unwrap();
        assert_eq!(parsed.sub_resolution, 4);
        assert_eq!(parsed.extraction_mode, ExtractionMode::Quads);
        assert_eq!(parsed.cell_capacity, 1.0);
        assert_eq!(parsed.effective_overprovision(), 64);
    }

    #[test]
    fn save_and_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("cellfluid-settings-{}", std::process::id()));
        let path = dir.join(SETTINGS_FILE_NAME);
        let settings = SimulationSettings {
            sub_resolution: 8,
            extraction_mode: ExtractionMode::Quads,
            ..Default::default()
        };
        settings.save_to_disk(&path).unwrap();
        let loaded = SimulationSettings::load_from_disk(&path).unwrap();
        assert_eq!(loaded, settings);
        let _ = fs::remove_dir_all(&dir);
    }
}
