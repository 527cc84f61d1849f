// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

// Interactive viewer.
// Run with: cargo run --release --bin cellfluid -- [x y z]
//
// Keys: 1-4 pick the species, Space toggles the fill, H toggles the heat
// source, O toggles an obstacle slab, M saves the settings file, Esc quits.
// Drag with the left button to orbit, scroll to zoom.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use cellfluid::backend::gpu::DEPTH_FORMAT;
use cellfluid::backend::FrameTarget;
use cellfluid::{GpuBackend, Simulation, SimulationSettings, Species, ELEMENT_COUNT};
use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

const DEFAULT_DIMENSIONS: (i32, i32, i32) = (8, 4, 8);
const FILL_POSITION: [f32; 3] = [0.5, 0.95, 0.5];
const FILL_OFF: [f32; 3] = [-1.0, -1.0, -1.0];
const HEAT_TEMPERATURE_C: i32 = 250;
const ORBIT_SPEED: f32 = 0.01;

struct Viewer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_texture: wgpu::Texture,
    sim: Simulation<GpuBackend>,
    started: Instant,
    species: Species,
    filling: bool,
    heating: bool,
    obstacle: bool,
    cursor: Option<(f32, f32)>,
    dragging: bool,
}

impl Viewer {
    fn new(window: Arc<Window>, settings: SimulationSettings, dimensions: (i32, i32, i32)) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no GPU adapter can present to this window")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("cellfluid Device"),
                required_features: wgpu::Features::empty(),
                required_limits: GpuBackend::required_limits(&adapter),
                memory_hints: Default::default(),
            },
            None,
        ))?;
        log::info!("using adapter {} ({:?})", adapter.get_info().name, adapter.get_info().backend);

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let backend = GpuBackend::with_device(device, queue, surface_format);
        let depth_texture = backend.create_depth_texture(surface_config.width, surface_config.height);

        let mut sim = Simulation::new(backend, settings);
        sim.initialize(dimensions, ELEMENT_COUNT as u32)?;
        sim.camera_mut().set_viewport(surface_config.width, surface_config.height);

        Ok(Self {
            window,
            surface,
            surface_config,
            depth_texture,
            sim,
            started: Instant::now(),
            species: Species::Water,
            filling: false,
            heating: false,
            obstacle: false,
            cursor: None,
            dragging: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.reconfigure();
        self.depth_texture = self.sim.backend().create_depth_texture(width, height);
        self.sim.camera_mut().set_viewport(width, height);
    }

    fn reconfigure(&self) {
        self.surface.configure(self.sim.backend().device(), &self.surface_config);
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Digit1 | KeyCode::Digit2 | KeyCode::Digit3 | KeyCode::Digit4 => {
                let index = match key {
                    KeyCode::Digit1 => 0,
                    KeyCode::Digit2 => 1,
                    KeyCode::Digit3 => 2,
                    _ => 3,
                };
                if let Some(species) = Species::from_index(index) {
                    self.species = species;
                    log::info!("fill species: {}", species.name());
                    if self.filling {
                        self.sim.fill(FILL_POSITION, species.index() as u32);
                    }
                }
            }
            KeyCode::Space => {
                self.filling = !self.filling;
                let position = if self.filling { FILL_POSITION } else { FILL_OFF };
                self.sim.fill(position, self.species.index() as u32);
            }
            KeyCode::KeyH => {
                self.heating = !self.heating;
                let Some(layout) = self.sim.layout().copied() else {
                    return;
                };
                let [rx, _, rz] = layout.resolution;
                let position = if self.heating {
                    [rx as i32 / 2, 0, rz as i32 / 2]
                } else {
                    [-1, -1, -1]
                };
                self.sim.heat(position, HEAT_TEMPERATURE_C);
            }
            KeyCode::KeyO => {
                let Some(layout) = self.sim.layout().copied() else {
                    return;
                };
                let [rx, ry, rz] = layout.resolution.map(|r| r as i32);
                let start = [rx / 4, ry / 3, rz / 4];
                let end = [rx * 3 / 4, ry / 3 + 1, rz * 3 / 4];
                self.obstacle = !self.obstacle;
                if self.obstacle {
                    self.sim.set_obstacle(start, end);
                } else {
                    self.sim.clear_obstacle(start, end);
                }
            }
            KeyCode::KeyM => {
                let path = SimulationSettings::default_path();
                match self.sim.settings().save_to_disk(&path) {
                    Ok(()) => log::info!("saved settings to {}", path.display()),
                    Err(err) => log::error!("failed to save settings: {err:#}"),
                }
            }
            _ => {}
        }
    }

    fn handle_cursor(&mut self, x: f32, y: f32) {
        if let (true, Some((px, py))) = (self.dragging, self.cursor) {
            self.sim
                .camera_mut()
                .orbit(-(x - px) * ORBIT_SPEED, (y - py) * ORBIT_SPEED);
        }
        self.cursor = Some((x, y));
    }

    fn update(&mut self) {
        for _ in 0..self.sim.settings().steps_per_frame {
            if let Err(err) = self.sim.advance_generation() {
                log::error!("update failed: {err}");
                return;
            }
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let color = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth = self.depth_texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(DEPTH_FORMAT),
            ..Default::default()
        });
        let [r, g, b] = self.sim.settings().clear_color;

        self.sim.backend_mut().begin_frame(FrameTarget {
            color,
            depth,
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
        });
        let result = self.sim.render_frame(self.started.elapsed().as_secs_f32());
        self.sim.backend_mut().end_frame();
        output.present();

        match result {
            Ok(stats) => {
                if let Some(geometry) = stats.geometry {
                    self.window.set_title(&format!(
                        "cellfluid | generation {} | {} primitives{}",
                        self.sim.generation_index(),
                        geometry.drawn(),
                        if geometry.overflowed() { " (capped)" } else { "" }
                    ));
                }
            }
            Err(err) => log::error!("render failed: {err}"),
        }
        Ok(())
    }
}

/// `cellfluid x y z` in macro-cells; anything unparsable falls back to the default.
fn parse_dimensions() -> (i32, i32, i32) {
    let values: Vec<i32> = std::env::args().skip(1).filter_map(|a| a.parse().ok()).collect();
    match values.as_slice() {
        [x, y, z, ..] => (*x, *y, *z),
        _ => DEFAULT_DIMENSIONS,
    }
}

fn main() -> anyhow::Result<()> {
    use env_logger::Env;
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = SimulationSettings::load_or_default(&SimulationSettings::default_path());
    let dimensions = parse_dimensions();

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        event_loop.create_window(
            winit::window::WindowAttributes::default()
                .with_title("cellfluid")
                .with_inner_size(winit::dpi::LogicalSize::new(1280, 720)),
        )?,
    );

    let mut viewer = Viewer::new(window.clone(), settings, dimensions)?;

    event_loop.run(move |event, control_flow| match event {
        Event::WindowEvent { ref event, window_id } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => {
                viewer.sim.shutdown();
                control_flow.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => {
                viewer.sim.shutdown();
                control_flow.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => viewer.handle_key(*key),
            WindowEvent::CursorMoved { position, .. } => {
                viewer.handle_cursor(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                viewer.dragging = *state == ElementState::Pressed;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 50.0,
                };
                viewer.sim.camera_mut().zoom(steps);
            }
            WindowEvent::Resized(physical_size) => {
                viewer.resize(physical_size.width, physical_size.height);
            }
            WindowEvent::RedrawRequested => {
                if !viewer.sim.is_initialized() {
                    return;
                }
                viewer.update();
                match viewer.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => viewer.reconfigure(),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("surface out of memory");
                        viewer.sim.shutdown();
                        control_flow.exit();
                    }
                    Err(err) => log::warn!("{err:?}"),
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            window.request_redraw();
        }
        _ => {}
    })?;
    Ok(())
}
