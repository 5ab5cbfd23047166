//! Walks around a small isometric town.
//!
//! Run from this directory so `assets/` resolves. Arrow keys pan the camera,
//! `F` freezes the pond, `S` saves the current town to `scenes/saved.scn` and
//! `R` reloads the town from disk. Text needs a TrueType font at
//! `assets/fonts/DejaVuSans.ttf`; without one the GUI stays empty.

use std::time::Duration;

use iso_ngin::{
    Engine, EngineConfig, Vector3, WindowEvent,
    data_structures::entity::EntityId,
    flow::{GameFlow, run},
};
use winit::{
    event::ElementState,
    keyboard::{Key, NamedKey},
};

const TOWN: &str = "town.scn";

#[derive(Default)]
struct Town {
    scene: Option<EntityId>,
    camera: Option<EntityId>,
    frozen: bool,
}

impl Town {
    fn load(&mut self, engine: &mut Engine) -> anyhow::Result<()> {
        let scene = engine.load_scene(TOWN)?;
        self.scene = Some(scene);
        self.camera = engine.registry().find_by_name("cam");
        if let Some(cam) = self.camera {
            engine.registry_mut().set_active_camera(cam);
        }
        self.frozen = false;
        Ok(())
    }

    fn pan(&self, engine: &mut Engine, by: Vector3<f32>) {
        let Some(cam) = self.camera else {
            return;
        };
        if let Some(camera) = engine.registry_mut().get_mut(cam) {
            camera.local += by;
        }
    }

    fn toggle_frozen(&mut self, engine: &mut Engine) {
        self.frozen = !self.frozen;
        let slot = if self.frozen { "frozen" } else { "default" };
        let water: Vec<EntityId> = engine
            .registry()
            .iter()
            .filter(|e| e.qualified_class() == "tile.water")
            .map(|e| e.id())
            .collect();
        for id in water {
            engine.registry_mut().set_tex_ref(id, slot);
        }
    }
}

impl GameFlow for Town {
    fn on_init(&mut self, engine: &mut Engine) -> anyhow::Result<()> {
        self.load(engine)?;
        log::info!("{}", engine.registry().tree_string(engine.registry().root()));
        Ok(())
    }

    fn on_update(&mut self, engine: &mut Engine, _dt: Duration) {
        let fps = format!("{:.0} fps", engine.fps());
        if let Some(gui) = engine.gui() {
            gui.add_text_at_ndc(&fps, 0.75, 0.95, None, None, false);
        }
    }

    fn on_window_events(&mut self, engine: &mut Engine, event: &WindowEvent) {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return;
        };
        if event.state != ElementState::Pressed {
            return;
        }
        match event.logical_key.as_ref() {
            Key::Named(NamedKey::ArrowLeft) => self.pan(engine, Vector3::new(-0.25, 0.25, 0.0)),
            Key::Named(NamedKey::ArrowRight) => self.pan(engine, Vector3::new(0.25, -0.25, 0.0)),
            Key::Named(NamedKey::ArrowUp) => self.pan(engine, Vector3::new(-0.25, -0.25, 0.0)),
            Key::Named(NamedKey::ArrowDown) => self.pan(engine, Vector3::new(0.25, 0.25, 0.0)),
            Key::Character("f") => self.toggle_frozen(engine),
            Key::Character("s") => {
                if let Some(scene) = self.scene {
                    if let Err(e) = engine.save_scene(scene, "saved.scn") {
                        log::error!("Saving the town failed: {:#}", e);
                    }
                }
            }
            Key::Character("r") => {
                if let Err(e) = self.load(engine) {
                    log::error!("Reloading the town failed: {:#}", e);
                }
            }
            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = EngineConfig::load_or_default("assets/engine.json");
    run(config, Box::new(Town::default()))
}
