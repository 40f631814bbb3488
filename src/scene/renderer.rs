use anyhow::Result;
use glam::{Mat4, Quat, Vec3};
use wgpu::util::DeviceExt;

use super::gpu::GpuContext;
use super::pipeline::{
    cube_mesh, quad_mesh, Instance, ScenePipelines, SceneUniforms, DEPTH_FORMAT,
};
use super::{ObjectKind, Scene};

struct Mesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

/// Growable per-kind instance buffer, rebuilt from the scene every frame.
struct InstancePool {
    buffer: wgpu::Buffer,
    capacity: usize,
    staging: Vec<Instance>,
}

impl InstancePool {
    fn new(device: &wgpu::Device, label: &str, capacity: usize) -> Self {
        Self {
            buffer: Self::make_buffer(device, label, capacity),
            capacity,
            staging: Vec::with_capacity(capacity),
        }
    }

    fn make_buffer(device: &wgpu::Device, label: &str, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (capacity.max(1) * std::mem::size_of::<Instance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn upload(&mut self, gpu: &GpuContext, label: &str) {
        if self.staging.len() > self.capacity {
            self.capacity = self.staging.len().next_power_of_two();
            self.buffer = Self::make_buffer(&gpu.device, label, self.capacity);
        }
        if !self.staging.is_empty() {
            gpu.queue
                .write_buffer(&self.buffer, 0, bytemuck::cast_slice(&self.staging));
        }
    }
}

/// Draws the scene graph: uploads instances, fills the uniform block from
/// the camera/light/fog state, and records one render pass.
pub struct SceneRenderer {
    pipelines: ScenePipelines,
    cube: Mesh,
    quad: Mesh,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    bars: InstancePool,
    particles: InstancePool,
    depth_view: wgpu::TextureView,
}

impl SceneRenderer {
    pub fn new(gpu: &GpuContext) -> Result<Self> {
        let pipelines = ScenePipelines::new(&gpu.device, gpu.config.format)?;

        let cube = upload_mesh(&gpu.device, "cube", cube_mesh());
        let quad = upload_mesh(&gpu.device, "quad", quad_mesh());

        let uniform_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene_uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &pipelines.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let depth_view = create_depth_view(gpu);

        Ok(Self {
            pipelines,
            cube,
            quad,
            uniform_buffer,
            bind_group,
            bars: InstancePool::new(&gpu.device, "bar_instances", 64),
            particles: InstancePool::new(&gpu.device, "particle_instances", 8192),
            depth_view,
        })
    }

    pub fn resize(&mut self, gpu: &GpuContext) {
        self.depth_view = create_depth_view(gpu);
    }

    pub fn render(
        &mut self,
        gpu: &GpuContext,
        scene: &Scene,
        time: f32,
    ) -> Result<(), wgpu::SurfaceError> {
        self.bars.staging.clear();
        self.particles.staging.clear();

        for object in scene.objects() {
            let rotation = Quat::from_euler(
                glam::EulerRot::YXZ,
                object.rotation.y,
                object.rotation.x,
                object.rotation.z,
            );
            let model =
                Mat4::from_scale_rotation_translation(object.scale, rotation, object.position);
            let instance = Instance {
                model: model.to_cols_array_2d(),
                color: [object.color[0], object.color[1], object.color[2], 1.0],
            };
            match object.kind {
                ObjectKind::Bar => self.bars.staging.push(instance),
                ObjectKind::Particle => self.particles.staging.push(instance),
            }
        }

        self.bars.upload(gpu, "bar_instances");
        self.particles.upload(gpu, "particle_instances");

        gpu.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&build_uniforms(scene, gpu.aspect(), time)),
        );

        let output = gpu.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_encoder"),
            });

        {
            let clear = scene.clear_color();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0] as f64,
                            g: clear[1] as f64,
                            b: clear[2] as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_bind_group(0, &self.bind_group, &[]);

            if !self.bars.staging.is_empty() {
                pass.set_pipeline(&self.pipelines.bars);
                pass.set_vertex_buffer(0, self.cube.vertices.slice(..));
                pass.set_vertex_buffer(1, self.bars.buffer.slice(..));
                pass.set_index_buffer(self.cube.indices.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..self.cube.index_count, 0, 0..self.bars.staging.len() as u32);
            }

            if !self.particles.staging.is_empty() {
                pass.set_pipeline(&self.pipelines.particles);
                pass.set_vertex_buffer(0, self.quad.vertices.slice(..));
                pass.set_vertex_buffer(1, self.particles.buffer.slice(..));
                pass.set_index_buffer(self.quad.indices.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(
                    0..self.quad.index_count,
                    0,
                    0..self.particles.staging.len() as u32,
                );
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

fn upload_mesh(
    device: &wgpu::Device,
    label: &str,
    (vertices, indices): (Vec<super::pipeline::Vertex>, Vec<u16>),
) -> Mesh {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    Mesh {
        vertices: vertex_buffer,
        indices: index_buffer,
        index_count: indices.len() as u32,
    }
}

fn create_depth_view(gpu: &GpuContext) -> wgpu::TextureView {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: gpu.config.width,
            height: gpu.config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn build_uniforms(scene: &Scene, aspect: f32, time: f32) -> SceneUniforms {
    let camera = &scene.camera;
    let forward = (camera.target - camera.eye).normalize_or_zero();
    let right = forward.cross(Vec3::Y).normalize_or_zero();
    let up = right.cross(forward);

    let mut uniforms = SceneUniforms {
        view_proj: camera.view_proj(aspect).to_cols_array_2d(),
        camera_eye: [camera.eye.x, camera.eye.y, camera.eye.z, scene.ambient],
        camera_right: [right.x, right.y, right.z, 0.0],
        camera_up: [up.x, up.y, up.z, 0.0],
        fog_color_near: [
            scene.fog.color[0],
            scene.fog.color[1],
            scene.fog.color[2],
            scene.fog.near,
        ],
        fog_far: [scene.fog.far, time, 0.0, 0.0],
        ..Default::default()
    };

    for (k, light) in scene.lights.iter().enumerate() {
        uniforms.light_positions[k] = [
            light.position.x,
            light.position.y,
            light.position.z,
            light.range,
        ];
        uniforms.light_colors[k] = [
            light.color[0],
            light.color[1],
            light.color[2],
            light.intensity,
        ];
    }

    uniforms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_carry_camera_and_lights() {
        let scene = Scene::new();
        let uniforms = build_uniforms(&scene, 16.0 / 9.0, 1.5);
        assert_eq!(uniforms.camera_eye[3], scene.ambient);
        assert_eq!(uniforms.light_colors[0][3], 2.0);
        assert_eq!(uniforms.fog_far[0], 100.0);
        assert_eq!(uniforms.fog_far[1], 1.5);
        // Camera basis is orthonormal.
        let r = Vec3::from_slice(&uniforms.camera_right[..3]);
        let u = Vec3::from_slice(&uniforms.camera_up[..3]);
        assert!(r.dot(u).abs() < 1e-5);
        assert!((r.length() - 1.0).abs() < 1e-4);
    }
}
