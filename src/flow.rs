//! Flow control and application event loop.
//!
//! A "flow" is the game built on top of the engine: it gets the [`Engine`]
//! once after the window is up and then every frame. The event loop owns the
//! window, the wgpu [`Context`] and the engine.
//!
//! # Lifecycle Flow
//!
//! The event loop follows this pattern each frame:
//! 1. Forward window events to the flow via `on_window_events`
//! 2. Tick the engine (`Engine::update`) and call `on_update`
//! 3. Render every layer through the context
//! 4. Present frame

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window},
};

use crate::{config::EngineConfig, context::Context, engine::Engine, resources::FontdueRasterizer};

/// Trait for the game logic driven by [`run`].
pub trait GameFlow {
    /// Called once after the window and GPU context exist. Load the first
    /// scene and set up the GUI here.
    fn on_init(&mut self, engine: &mut Engine) -> anyhow::Result<()>;

    /// Called every frame after the engine ticked, with the frame time `dt`.
    fn on_update(&mut self, engine: &mut Engine, dt: Duration);

    /// Handle window events (keyboard, mouse, window resizing, etc.).
    fn on_window_events(&mut self, _engine: &mut Engine, _event: &WindowEvent) {}
}

pub struct App {
    engine: Engine,
    flow: Box<dyn GameFlow>,
    ctx: Option<Context>,
    last_time: Instant,
    fps_timer: Duration,
}

impl App {
    fn new(engine: Engine, flow: Box<dyn GameFlow>) -> Self {
        Self {
            engine,
            flow,
            ctx: None,
            last_time: Instant::now(),
            fps_timer: Duration::ZERO,
        }
    }

    fn create_context(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<Context> {
        let config = self.engine.config();
        let mut window_attributes = Window::default_attributes()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(config.virt_sx, config.virt_sy));
        if config.fullscreen {
            window_attributes =
                window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        futures::executor::block_on(Context::new(window, config.clear_colour))
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.ctx.is_some() {
            return;
        }
        match self.create_context(event_loop) {
            Ok(ctx) => {
                ctx.window().request_redraw();
                self.ctx = Some(ctx);
            }
            Err(e) => {
                log::error!("App initialization failed. Cannot create the main context: {:#}", e);
                event_loop.exit();
                return;
            }
        }
        if let Err(e) = self.flow.on_init(&mut self.engine) {
            log::error!("Game initialization failed: {:#}", e);
            event_loop.exit();
        }
        self.last_time = Instant::now();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };

        self.flow.on_window_events(&mut self.engine, &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => ctx.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                self.engine.update();
                self.flow.on_update(&mut self.engine, dt);
                self.engine.render(ctx);

                self.fps_timer += dt;
                if self.fps_timer >= Duration::from_secs(5) {
                    self.engine.log_fps();
                    self.fps_timer = Duration::ZERO;
                }
                ctx.window().request_redraw();
            }
            _ => {}
        }
    }
}

/// Open a window sized to the virtual screen and run `flow` until the window
/// is closed.
pub fn run(config: EngineConfig, flow: Box<dyn GameFlow>) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let rasterizer = Box::new(FontdueRasterizer::new(config.asset_root.clone()));
    let engine = Engine::new(config, rasterizer);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(engine, flow);
    event_loop.run_app(&mut app)?;

    Ok(())
}
