use anyhow::{anyhow, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::Mat3;
use wgpu::util::DeviceExt;

use crate::mesh::SphereMesh;
use crate::state::{RenderState, AMBIENT_COLOR, LIGHT_COLOR};

/// WGSL source for the shading program.
///
/// The vertex stage forwards the normal-matrix transformed normal without
/// normalizing it; interpolation denormalizes anyway, so normalization is the
/// fragment stage's job.
pub(crate) const SHADER: &str = r#"
struct SphereUniform {
    model_view: mat4x4<f32>,
    projection: mat4x4<f32>,
    normal: mat3x4<f32>,
    light_direction: vec4<f32>,
    light_color: vec4<f32>,
    ambient_color: vec4<f32>,
    object_color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: SphereUniform;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    output.position = globals.projection * globals.model_view * vec4<f32>(input.position, 1.0);
    output.normal = mat3x3<f32>(
        globals.normal[0].xyz,
        globals.normal[1].xyz,
        globals.normal[2].xyz
    ) * input.normal;
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let intensity = max(dot(normal, -globals.light_direction.xyz), 0.0);
    let color = globals.object_color * (globals.ambient_color + intensity * globals.light_color);
    return vec4<f32>(color.rgb, globals.object_color.a);
}
"#;

/// Uniform block mirrored by the WGSL `SphereUniform` struct. The normal
/// matrix is stored as three padded columns to satisfy mat3x4 alignment.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct SphereUniform {
    model_view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    light_direction: [f32; 4],
    light_color: [f32; 4],
    ambient_color: [f32; 4],
    object_color: [f32; 4],
}

impl SphereUniform {
    pub(crate) fn from_state(state: &RenderState) -> Self {
        Self {
            model_view: state.transform.model_view().to_cols_array_2d(),
            projection: state.transform.projection().to_cols_array_2d(),
            normal: mat3_to_3x4(state.transform.normal()),
            light_direction: state.light_direction().extend(0.0).into(),
            light_color: LIGHT_COLOR.into(),
            ambient_color: AMBIENT_COLOR.into(),
            object_color: state.object_color().into(),
        }
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

/// Static GPU buffers for the sphere: one position buffer, one normal buffer
/// and one index buffer, uploaded once and never rewritten.
pub(crate) struct MeshBuffers {
    pub(crate) position: wgpu::Buffer,
    pub(crate) normal: wgpu::Buffer,
    pub(crate) index: wgpu::Buffer,
    pub(crate) index_count: u32,
}

impl MeshBuffers {
    pub(crate) fn upload(device: &wgpu::Device, mesh: &SphereMesh) -> Self {
        debug_assert!(mesh.is_consistent());
        let position = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere-positions"),
            contents: bytemuck::cast_slice(&mesh.positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let normal = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere-normals"),
            contents: bytemuck::cast_slice(&mesh.normals),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere-indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            position,
            normal,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

/// Shading pipeline plus its uniform buffer and bind group.
pub(crate) struct ShadePipeline {
    pub(crate) pipeline: wgpu::RenderPipeline,
    uniform: wgpu::Buffer,
    pub(crate) bind_group: wgpu::BindGroup,
}

impl ShadePipeline {
    /// Compiles the shader and builds the render pipeline.
    ///
    /// A validation error scope is pushed around shader and pipeline
    /// creation; any compile or link diagnostic is surfaced as a fatal error
    /// instead of being swallowed by the uncaptured-error handler.
    pub(crate) async fn create(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sphere-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sphere-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(
                        std::num::NonZeroU64::new(std::mem::size_of::<SphereUniform>() as u64)
                            .unwrap(),
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sphere-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sphere-uniform"),
            size: std::mem::size_of::<SphereUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sphere-bind-group"),
            layout: &bind_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });

        let vertex_stride = (3 * std::mem::size_of::<f32>()) as u64;
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sphere-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: vertex_stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        }],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: vertex_stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 1,
                        }],
                    },
                ],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        if let Some(error) = device.pop_error_scope().await {
            return Err(anyhow!("shader pipeline creation failed: {error}"));
        }

        Ok(Self {
            pipeline,
            uniform,
            bind_group,
        })
    }

    /// Rewrites the uniform buffer from the current render state.
    pub(crate) fn write_state(&self, queue: &wgpu::Queue, state: &RenderState) {
        let uniform = SphereUniform::from_state(state);
        queue.write_buffer(&self.uniform, 0, bytes_of(&uniform));
    }
}

/// Depth attachment sized to the surface; recreated on resize.
pub(crate) struct DepthBuffer {
    _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
}

impl DepthBuffer {
    pub(crate) const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    pub(crate) fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::lambert_intensity;
    use approx::assert_abs_diff_eq;
    use glam::{Vec3, Vec4};

    #[test]
    fn uniform_block_is_16_byte_aligned() {
        let size = std::mem::size_of::<SphereUniform>();
        assert_eq!(size % 16, 0);
        // Two mat4, one padded mat3, four vec4.
        assert_eq!(size, 64 + 64 + 48 + 4 * 16);
    }

    #[test]
    fn mat3_columns_are_padded_with_zero() {
        let matrix = Mat3::from_cols(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(7.0, 8.0, 9.0),
        );
        let packed = mat3_to_3x4(matrix);
        assert_eq!(packed[0], [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(packed[1], [4.0, 5.0, 6.0, 0.0]);
        assert_eq!(packed[2], [7.0, 8.0, 9.0, 0.0]);
    }

    #[test]
    fn uniform_carries_state_values() {
        let mut state = RenderState::new(1.0);
        state.set_object_color(Vec4::new(0.25, 0.5, 0.75, 1.0));
        state.set_light_direction(Vec3::new(0.0, 0.0, -1.0));
        let uniform = SphereUniform::from_state(&state);
        assert_eq!(uniform.object_color, [0.25, 0.5, 0.75, 1.0]);
        assert_eq!(uniform.light_direction, [0.0, 0.0, -1.0, 0.0]);
        assert_eq!(uniform.ambient_color, [0.1, 0.1, 0.1, 1.0]);
        assert_eq!(uniform.light_color, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn backfacing_light_leaves_ambient_only() {
        // Mirror of the fragment formula with the diffuse term clamped off.
        let normal = Vec3::new(0.0, 0.0, 1.0);
        let light_direction = Vec3::new(0.0, 0.0, 1.0);
        let intensity = lambert_intensity(normal, light_direction);
        assert_eq!(intensity, 0.0);
        let object = Vec4::new(1.0, 0.5, 0.25, 1.0);
        let color = object * (AMBIENT_COLOR + intensity * LIGHT_COLOR);
        assert_abs_diff_eq!(color.x, 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(color.y, 0.05, epsilon = 1e-6);
        assert_abs_diff_eq!(color.z, 0.025, epsilon = 1e-6);
    }
}
