//! The wgpu backend: window surface, device and the [`Gpu`] implementation.
//!
//! Layers record their draws into [`Context`] during a frame. Nothing touches
//! the GPU until [`Gpu::present`], which uploads all recorded vertices into
//! one buffer and replays the draws in a single render pass.

use std::{collections::HashMap, iter, sync::Arc};

use anyhow::Context as _;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    data_structures::texture::Texture,
    pipelines::AtlasPipelines,
    render::{Gpu, TextureId, Vertex},
};

/// A run of vertices drawn with one texture and one depth mode.
#[derive(Clone, Copy, Debug)]
struct Batch {
    start: u32,
    count: u32,
    texture: TextureId,
    depth_test: bool,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub pipelines: AtlasPipelines,
    pub clear_colour: wgpu::Color,
    textures: HashMap<TextureId, Texture>,
    next_texture: TextureId,
    vertices: Vec<Vertex>,
    batches: Vec<Batch>,
    depth_test: bool,
    is_surface_configured: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>, clear_colour: [f64; 4]) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::debug!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");
        let pipelines = AtlasPipelines::new(&device, config.format);
        let [r, g, b, a] = clear_colour;

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            pipelines,
            clear_colour: wgpu::Color { r, g, b, a },
            textures: HashMap::new(),
            next_texture: 1,
            vertices: Vec::new(),
            batches: Vec::new(),
            depth_test: true,
            is_surface_configured: size.width > 0 && size.height > 0,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture =
                Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
            self.is_surface_configured = true;
        } else {
            self.is_surface_configured = false;
        }
    }

    fn submit(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let vertex_buffer = (!self.vertices.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Frame Vertex Buffer"),
                    contents: bytemuck::cast_slice(&self.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                ..Default::default()
            });

            if let Some(buffer) = &vertex_buffer {
                render_pass.set_vertex_buffer(0, buffer.slice(..));
                for batch in self.batches.iter() {
                    let Some(bind_group) = self
                        .textures
                        .get(&batch.texture)
                        .and_then(|t| t.bind_group.as_ref())
                    else {
                        log::warn!("Draw references released texture {}", batch.texture);
                        continue;
                    };
                    render_pass.set_pipeline(self.pipelines.get(batch.depth_test));
                    render_pass.set_bind_group(0, bind_group, &[]);
                    render_pass.draw(batch.start..batch.start + batch.count, 0..1);
                }
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl Gpu for Context {
    fn clear(&mut self) {
        self.vertices.clear();
        self.batches.clear();
        self.depth_test = true;
    }

    fn upload_atlas(&mut self, width: u32, height: u32, rgba: &[u8]) -> anyhow::Result<TextureId> {
        let texture = Texture::from_atlas(
            &self.device,
            &self.queue,
            &self.pipelines.texture_layout,
            width,
            height,
            rgba,
            "atlas",
        )?;
        let id = self.next_texture;
        self.next_texture += 1;
        self.textures.insert(id, texture);
        log::debug!("Uploaded {}x{} atlas as texture {}", width, height, id);
        Ok(id)
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(texture) = self.textures.remove(&texture) {
            texture.texture.destroy();
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn draw(&mut self, vertices: &[Vertex], texture: TextureId) {
        if vertices.is_empty() {
            return;
        }
        self.batches.push(Batch {
            start: self.vertices.len() as u32,
            count: vertices.len() as u32,
            texture,
            depth_test: self.depth_test,
        });
        self.vertices.extend_from_slice(vertices);
    }

    fn present(&mut self) {
        if !self.is_surface_configured {
            return;
        }
        match self.submit() {
            Ok(()) => {}
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                self.resize(size.width, size.height);
            }
            Err(e) => log::error!("Unable to render {}", e),
        }
    }
}
