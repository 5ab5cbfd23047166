//! The engine ties the runtime pieces together.
//!
//! An [`Engine`] owns the entity registry, the scene manager and the layer
//! stack. A frame is `update` followed by `render`: behaviours tick and
//! placement propagates, then the world layer and the GUI layer draw in that
//! order through whatever [`Gpu`] backend is passed in.

use instant::{Duration, Instant};

use crate::{
    config::EngineConfig,
    data_structures::{
        behaviour::{BehaviourKind, BehaviourTable},
        entity::EntityId,
        scene_graph::Registry,
    },
    layers::{GuiLayer, IsometricLayer},
    render::{Gpu, LayerStack, RenderLayer},
    resources::{BitmapDecoder, GlyphRasterizer, ImageDecoder},
    scene::SceneManager,
};

pub struct Engine {
    config: EngineConfig,
    registry: Registry,
    scenes: SceneManager,
    layers: LayerStack,
    decoder: Box<dyn BitmapDecoder>,
    last_frame: Instant,
    delta: Duration,
    frames: u64,
}

impl Engine {
    /// Build an engine from `config`: prototypes are loaded from the
    /// configured object files and the isometric and GUI layers are stacked.
    pub fn new(config: EngineConfig, rasterizer: Box<dyn GlyphRasterizer>) -> Self {
        let mut behaviours = BehaviourTable::core();
        for class in config.sprite_classes.iter() {
            behaviours.register(class, BehaviourKind::Sprite);
        }
        let registry = Registry::new(config.load_prototypes(), behaviours);

        let mut layers = LayerStack::new();
        layers.push(Box::new(IsometricLayer::new(
            config.atlas_size,
            config.tile_width,
            config.tile_height,
        )));
        layers.push(Box::new(GuiLayer::new(
            config.atlas_size,
            rasterizer,
            &config.font,
            config.font_size,
            config.screen(),
        )));

        log::info!(
            "Engine '{}' ready: {}x{} virtual screen, {} prototypes",
            config.window_title,
            config.virt_sx,
            config.virt_sy,
            registry.prototypes().len()
        );
        Self {
            scenes: SceneManager::new(config.scene_folder.clone()),
            decoder: Box::new(ImageDecoder::new(config.asset_root.clone())),
            config,
            registry,
            layers,
            last_frame: Instant::now(),
            delta: Duration::ZERO,
            frames: 0,
        }
    }

    /// Replace the image decoder, e.g. with an in-memory one.
    pub fn with_decoder(mut self, decoder: Box<dyn BitmapDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn scenes(&self) -> &SceneManager {
        &self.scenes
    }

    /// Add a layer drawn after the built-in ones.
    pub fn push_layer(&mut self, layer: Box<dyn RenderLayer>) {
        self.layers.push(layer);
    }

    pub fn layers_mut(&mut self) -> &mut LayerStack {
        &mut self.layers
    }

    pub fn gui(&mut self) -> Option<&mut GuiLayer> {
        self.layers.layer_mut::<GuiLayer>()
    }

    pub fn world(&mut self) -> Option<&mut IsometricLayer> {
        self.layers.layer_mut::<IsometricLayer>()
    }

    /// Load a scene file from the scene folder at the world origin.
    pub fn load_scene(&mut self, file: &str) -> anyhow::Result<EntityId> {
        self.scenes
            .load(&mut self.registry, file, cgmath::Vector3::new(0.0, 0.0, 0.0))
    }

    pub fn unload_scene(&mut self, file: &str) -> Option<usize> {
        self.scenes.unload(&mut self.registry, file)
    }

    pub fn save_scene(&self, scene: EntityId, file: &str) -> anyhow::Result<()> {
        self.scenes.save(&self.registry, scene, file)
    }

    /// Advance the simulation by one step.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta = now.duration_since(self.last_frame);
        self.last_frame = now;
        self.frames += 1;
        self.registry.update();
    }

    /// Draw one frame through `gpu`.
    pub fn render(&mut self, gpu: &mut dyn Gpu) {
        self.layers.render_frame(
            &self.registry,
            gpu,
            self.decoder.as_ref(),
            self.config.screen(),
        );
    }

    /// Time between the last two calls to [`update`](Self::update).
    pub fn delta_time(&self) -> Duration {
        self.delta
    }

    pub fn fps(&self) -> f32 {
        let secs = self.delta.as_secs_f32();
        if secs > 0.0 { 1.0 / secs } else { 0.0 }
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn log_fps(&self) {
        log::info!("frame {}: {:.1} fps", self.frames, self.fps());
    }
}
