use anyhow::{anyhow, Context, Result};
use web_sys::HtmlCanvasElement;

use crate::mesh::SphereMesh;
use crate::state::RenderState;

use super::shared::{DepthBuffer, MeshBuffers, ShadePipeline};

/// wgpu renderer that draws the sphere into an HTML canvas element.
///
/// Prefers WebGPU and falls back to the WebGL2 backend where the browser
/// lacks it. If neither context can be obtained, initialization fails and is
/// reported as an environment incompatibility.
pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: (u32, u32),
    depth: DepthBuffer,
    shade: ShadePipeline,
    mesh: MeshBuffers,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided canvas.
    pub async fn new(canvas: HtmlCanvasElement, mesh: &SphereMesh) -> Result<Self> {
        let size = (canvas.width(), canvas.height());
        if size.0 == 0 || size.1 == 0 {
            return Err(anyhow!("canvas has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
            .context("no rendering context could be obtained from the canvas")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("viewer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.0,
            height: size.1,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);
        let shade = ShadePipeline::create(&device, surface_format, DepthBuffer::FORMAT).await?;
        let mesh = MeshBuffers::upload(&device, mesh);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            depth,
            shade,
            mesh,
        })
    }

    /// Rewrites the uniform buffer before rendering.
    pub fn update_state(&self, state: &RenderState) {
        self.shade.write_state(&self.queue, state);
    }

    /// Resizes the surface to the new canvas dimensions.
    pub fn resize(&mut self, new_size: (u32, u32)) {
        if new_size.0 == 0 || new_size.1 == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.0;
        self.config.height = new_size.1;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.0, new_size.1);
    }

    /// Clears the frame and draws the sphere with one indexed draw call.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewer-encoder"),
            });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("sphere-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.03,
                        g: 0.03,
                        b: 0.05,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.shade.pipeline);
        pass.set_bind_group(0, &self.shade.bind_group, &[]);
        pass.set_vertex_buffer(0, self.mesh.position.slice(..));
        pass.set_vertex_buffer(1, self.mesh.normal.slice(..));
        pass.set_index_buffer(self.mesh.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.mesh.index_count, 0, 0..1);

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Current surface aspect ratio.
    pub fn aspect(&self) -> f32 {
        if self.size.1 == 0 {
            1.0
        } else {
            self.size.0 as f32 / self.size.1 as f32
        }
    }

    /// Canvas dimensions in pixels.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}
