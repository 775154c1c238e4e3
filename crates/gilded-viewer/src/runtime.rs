use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::demo::{Demo, DemoConfig};
use crate::gpu::{Gpu, SurfaceErrorAction};
use crate::time::FrameClock;

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub shader_dir: Option<PathBuf>,
    pub stencil: bool,
    pub stats_every: u64,
}

pub fn run(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut viewer = Viewer {
        config,
        window: None,
        failed: None,
    };
    event_loop
        .run_app(&mut viewer)
        .context("winit event loop terminated with error")?;

    match viewer.failed {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Field order is drop order: the device goes before the surface, the
/// surface before the window.
struct ViewerWindow {
    demo: Demo,
    gpu: Gpu,
    clock: FrameClock,
    window: Arc<Window>,
}

struct Viewer {
    config: ViewerConfig,
    window: Option<ViewerWindow>,
    failed: Option<anyhow::Error>,
}

impl Viewer {
    fn open(&self, event_loop: &ActiveEventLoop) -> Result<ViewerWindow> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let gpu = pollster::block_on(Gpu::new(Arc::clone(&window)))?;
        let demo = Demo::new(
            &gpu,
            DemoConfig {
                shader_dir: self.config.shader_dir.clone(),
                stencil: self.config.stencil,
                stats_every: self.config.stats_every,
            },
        )?;

        Ok(ViewerWindow {
            demo,
            gpu,
            clock: FrameClock::new(),
            window,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.failed = Some(err);
        self.window = None;
        event_loop.exit();
    }
}

impl ViewerWindow {
    fn redraw(&mut self) -> Result<()> {
        let size = self.gpu.size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        let frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                let reason = err.to_string();
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => Err(anyhow::anyhow!("surface lost: {reason}")),
                    action => {
                        warn!("skipping frame: {reason} ({action:?})");
                        Ok(())
                    }
                };
            }
        };

        let time = self.clock.tick();
        self.demo.render(frame.view, size.width, size.height, time)?;
        self.window.pre_present_notify();
        frame.surface_texture.present();
        Ok(())
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match self.open(event_loop) {
            Ok(window) => self.window = Some(window),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        // Continuous redraw; the scene animates.
        if let Some(w) = &self.window {
            w.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(w) = self.window.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                self.window = None;
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                self.window = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                w.gpu.resize(size);
                w.window.request_redraw();
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = w.window.inner_size();
                w.gpu.resize(size);
                w.window.request_redraw();
            }
            WindowEvent::Occluded(false) => w.clock.reset(),
            WindowEvent::RedrawRequested => {
                if let Err(err) = w.redraw() {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }
}
