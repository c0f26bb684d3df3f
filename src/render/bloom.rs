//! Bloom post-processing: scene pass → bright extract → blur → composite.

use anyhow::{anyhow, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::camera::PerspectiveCamera;
use crate::config::BloomConfig;
use crate::scene::Scene;

use super::gpu::{sampler_entry, texture_entry, GpuRenderer, DEPTH_FORMAT, SCENE_FORMAT};
use super::shaders::POST_SHADER;
use super::PostComposer;

/// Horizontal + vertical blur rounds per frame.
const BLUR_ROUNDS: usize = 2;
const SMOOTH_WIDTH: f32 = 0.01;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct BloomParams {
    threshold: f32,
    strength: f32,
    radius: f32,
    smooth_width: f32,
    direction: [f32; 2],
    padding: [f32; 2],
}

impl BloomParams {
    fn new(config: &BloomConfig, direction: [f32; 2]) -> Self {
        Self {
            threshold: config.threshold,
            strength: config.strength,
            radius: config.radius,
            smooth_width: SMOOTH_WIDTH,
            direction,
            padding: [0.0; 2],
        }
    }
}

/// Offscreen chain that renders the scene, makes bright areas glow and
/// writes the result to the renderer's surface.
///
/// GPU resources are created on the first frame and rebuilt whenever the
/// renderer's drawing buffer changes size.
pub struct BloomComposer {
    config: BloomConfig,
    size: (u32, u32),
    pipelines: Option<PostPipelines>,
    targets: Option<Targets>,
}

impl BloomComposer {
    pub fn new(config: BloomConfig, size: (u32, u32)) -> Self {
        Self {
            config,
            size,
            pipelines: None,
            targets: None,
        }
    }

    pub fn config(&self) -> &BloomConfig {
        &self.config
    }

    fn prepare(&mut self, renderer: &GpuRenderer) {
        let format = renderer.surface_format();
        if self.pipelines.as_ref().map(|p| p.surface_format) != Some(format) {
            self.pipelines = Some(PostPipelines::new(renderer.device(), format, &self.config));
            self.targets = None;
        }
        let physical = renderer.physical_size();
        if self.targets.as_ref().map(|t| t.physical) != Some(physical) {
            if let Some(pipelines) = self.pipelines.as_ref() {
                self.targets = Some(Targets::new(renderer.device(), pipelines, physical));
                log::debug!("bloom targets rebuilt at {}x{}", physical.0, physical.1);
            }
        }
    }
}

impl PostComposer<GpuRenderer> for BloomComposer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn render(
        &mut self,
        renderer: &mut GpuRenderer,
        scene: &Scene,
        camera: &PerspectiveCamera,
    ) -> Result<()> {
        let frame = match renderer.acquire() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(anyhow!("GPU is out of memory")),
            Err(err) => {
                log::warn!("skipping frame: {err}");
                return Ok(());
            }
        };
        self.prepare(renderer);
        let (Some(pipelines), Some(targets)) = (self.pipelines.as_ref(), self.targets.as_ref())
        else {
            return Err(anyhow!("bloom resources unavailable"));
        };

        let output = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = renderer
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("composer-encoder"),
            });

        renderer.draw(
            &mut encoder,
            &targets.scene.view,
            &targets.depth.view,
            scene,
            camera,
        );

        fullscreen_pass(
            &mut encoder,
            "bloom-extract",
            &pipelines.extract,
            &targets.extract_group,
            &targets.bright.view,
        );
        for _ in 0..BLUR_ROUNDS {
            fullscreen_pass(
                &mut encoder,
                "bloom-blur-horizontal",
                &pipelines.blur,
                &targets.blur_horizontal_group,
                &targets.ping.view,
            );
            fullscreen_pass(
                &mut encoder,
                "bloom-blur-vertical",
                &pipelines.blur,
                &targets.blur_vertical_group,
                &targets.bright.view,
            );
        }
        fullscreen_pass(
            &mut encoder,
            "bloom-composite",
            &pipelines.composite,
            &targets.composite_group,
            &output,
        );

        renderer.queue().submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn fullscreen_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

struct PostPipelines {
    surface_format: wgpu::TextureFormat,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    extract: wgpu::RenderPipeline,
    blur: wgpu::RenderPipeline,
    composite: wgpu::RenderPipeline,
    base_params: wgpu::Buffer,
    horizontal_params: wgpu::Buffer,
    vertical_params: wgpu::Buffer,
}

impl PostPipelines {
    fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        config: &BloomConfig,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("post-shader"),
            source: wgpu::ShaderSource::Wgsl(POST_SHADER.into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1, wgpu::TextureViewDimension::D2),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                sampler_entry(3),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("post-pipeline-layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = |label: &str, entry_point: &str, format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_fullscreen"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry_point),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            })
        };
        let params = |label: &str, direction: [f32; 2]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytes_of(&BloomParams::new(config, direction)),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        };

        Self {
            surface_format,
            sampler: device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("post-sampler"),
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }),
            extract: pipeline("bloom-extract", "fs_extract", SCENE_FORMAT),
            blur: pipeline("bloom-blur", "fs_blur", SCENE_FORMAT),
            composite: pipeline("bloom-composite", "fs_composite", surface_format),
            base_params: params("bloom-params", [0.0, 0.0]),
            horizontal_params: params("bloom-params-horizontal", [1.0, 0.0]),
            vertical_params: params("bloom-params-vertical", [0.0, 1.0]),
            layout,
        }
    }

    fn bind(
        &self,
        device: &wgpu::Device,
        label: &str,
        params: &wgpu::Buffer,
        source: &wgpu::TextureView,
        overlay: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(overlay),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}

struct RenderTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl RenderTarget {
    fn new(
        device: &wgpu::Device,
        label: &str,
        (width, height): (u32, u32),
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

struct Targets {
    physical: (u32, u32),
    scene: RenderTarget,
    depth: RenderTarget,
    bright: RenderTarget,
    ping: RenderTarget,
    extract_group: wgpu::BindGroup,
    blur_horizontal_group: wgpu::BindGroup,
    blur_vertical_group: wgpu::BindGroup,
    composite_group: wgpu::BindGroup,
}

impl Targets {
    fn new(device: &wgpu::Device, pipelines: &PostPipelines, physical: (u32, u32)) -> Self {
        let half = bloom_extent(physical);
        let scene = RenderTarget::new(device, "scene-target", physical, SCENE_FORMAT);
        let depth = RenderTarget::new(device, "scene-depth", physical, DEPTH_FORMAT);
        let bright = RenderTarget::new(device, "bloom-bright", half, SCENE_FORMAT);
        let ping = RenderTarget::new(device, "bloom-ping", half, SCENE_FORMAT);

        let extract_group = pipelines.bind(
            device,
            "bloom-extract-group",
            &pipelines.base_params,
            &scene.view,
            &scene.view,
        );
        let blur_horizontal_group = pipelines.bind(
            device,
            "bloom-blur-h-group",
            &pipelines.horizontal_params,
            &bright.view,
            &bright.view,
        );
        let blur_vertical_group = pipelines.bind(
            device,
            "bloom-blur-v-group",
            &pipelines.vertical_params,
            &ping.view,
            &ping.view,
        );
        let composite_group = pipelines.bind(
            device,
            "bloom-composite-group",
            &pipelines.base_params,
            &scene.view,
            &bright.view,
        );

        Self {
            physical,
            scene,
            depth,
            bright,
            ping,
            extract_group,
            blur_horizontal_group,
            blur_vertical_group,
            composite_group,
        }
    }
}

/// Blur targets run at half resolution.
fn bloom_extent((width, height): (u32, u32)) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_match_uniform_layout() {
        assert_eq!(std::mem::size_of::<BloomParams>(), 32);
        let params = BloomParams::new(&BloomConfig::default(), [1.0, 0.0]);
        assert_eq!(params.strength, 1.5);
        assert_eq!(params.radius, 0.4);
        assert_eq!(params.threshold, 0.85);
        assert_eq!(params.direction, [1.0, 0.0]);
    }

    #[test]
    fn blur_targets_are_half_size_but_never_empty() {
        assert_eq!(bloom_extent((1600, 1200)), (800, 600));
        assert_eq!(bloom_extent((1, 1)), (1, 1));
    }

    #[test]
    fn size_is_recorded_without_a_device() {
        let mut composer = BloomComposer::new(BloomConfig::default(), (1, 1));
        composer.set_size(800, 600);
        assert_eq!(composer.size(), (800, 600));
    }
}
