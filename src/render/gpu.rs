use std::collections::HashMap;

use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat4, Vec3};
use image::{imageops, RgbaImage};
use wgpu::util::DeviceExt;

use crate::assets::{CubeTexture, TextureState};
use crate::camera::PerspectiveCamera;
use crate::error::InitError;
use crate::scene::{Body, Light, Scene, Shading};

use super::shaders::{SCENE_SHADER, SKY_SHADER};
use super::sphere::{SphereMesh, Vertex};
use super::{physical_size, SceneRenderer};

/// Format of the offscreen color target the scene is drawn into.
pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

const SPHERE_SEGMENTS: (u32, u32) = (48, 32);

#[cfg(target_arch = "wasm32")]
const BACKENDS: wgpu::Backends = wgpu::Backends::GL;
#[cfg(not(target_arch = "wasm32"))]
const BACKENDS: wgpu::Backends = wgpu::Backends::PRIMARY;

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: BACKENDS,
        ..Default::default()
    })
}

/// Asks for any hardware adapter; returns its name when one exists.
pub async fn probe_adapter() -> Option<String> {
    let adapter = create_instance()
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        })
        .await?;
    Some(adapter.get_info().name)
}

/// Primary renderer: owns the GPU device and the canvas surface and knows
/// how to draw the scene (background, sun, planets) into a color target.
pub struct GpuRenderer {
    #[cfg(target_arch = "wasm32")]
    canvas: web_sys::HtmlCanvasElement,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    css_size: (u32, u32),
    pixel_ratio: f64,
    texture_format: wgpu::TextureFormat,
    mesh_pipeline: wgpu::RenderPipeline,
    sky_pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    cube_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    sphere: MeshBuffers,
    fallback_material: wgpu::BindGroup,
    fallback_background: wgpu::BindGroup,
    objects: Vec<wgpu::BindGroup>,
    materials: HashMap<usize, UploadedTexture>,
    background: Option<UploadedTexture>,
}

struct UploadedTexture {
    generation: u64,
    bind_group: Option<wgpu::BindGroup>,
}

impl GpuRenderer {
    /// Creates a renderer drawing into the given canvas through WebGL2.
    #[cfg(target_arch = "wasm32")]
    pub async fn for_canvas(
        canvas: web_sys::HtmlCanvasElement,
        css_size: (u32, u32),
        color_management: bool,
    ) -> Result<Self, InitError> {
        let instance = create_instance();
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|err| InitError::Surface(err.to_string()))?;
        Self::with_surface(&instance, surface, canvas, css_size, color_management).await
    }

    /// Builds the renderer around a surface the host already created.
    pub async fn with_surface(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        #[cfg(target_arch = "wasm32")] canvas: web_sys::HtmlCanvasElement,
        css_size: (u32, u32),
        color_management: bool,
    ) -> Result<Self, InitError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .ok_or_else(|| InitError::Device("no compatible GPU adapter".to_string()))?;
        log::info!("using adapter {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("renderer-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|err| InitError::Device(err.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb() == color_management)
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| InitError::Surface("surface reports no formats".to_string()))?;
        let texture_format = if color_management {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };

        let (width, height) = physical_size(css_size.0, css_size.1, 1.0);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global-bind-layout"),
            entries: &[uniform_entry(0)],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bind-layout"),
            entries: &[uniform_entry(0)],
        });
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material-bind-layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                sampler_entry(1),
            ],
        });
        let cube_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("background-bind-layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::Cube),
                sampler_entry(1),
            ],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let mesh_pipeline = create_mesh_pipeline(
            &device,
            &[&global_layout, &object_layout, &material_layout],
        );
        let sky_pipeline = create_sky_pipeline(&device, &[&global_layout, &cube_layout]);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("surface-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let sphere = MeshBuffers::from_mesh(
            &device,
            &SphereMesh::uv(SPHERE_SEGMENTS.0, SPHERE_SEGMENTS.1),
            "sphere",
        );

        let uploader = TextureUploader {
            device: &device,
            queue: &queue,
            format: texture_format,
            sampler: &sampler,
        };
        let fallback_material = uploader.material(
            &material_layout,
            &RgbaImage::from_pixel(1, 1, image::Rgba([255; 4])),
            "fallback-material",
        );
        let fallback_background =
            uploader.cube(&cube_layout, &black_faces(1), "fallback-background");

        let mut renderer = Self {
            #[cfg(target_arch = "wasm32")]
            canvas,
            surface,
            device,
            queue,
            config,
            css_size,
            pixel_ratio: 1.0,
            texture_format,
            mesh_pipeline,
            sky_pipeline,
            global_buffer,
            global_bind_group,
            object_layout,
            material_layout,
            cube_layout,
            sampler,
            sphere,
            fallback_material,
            fallback_background,
            objects: Vec::new(),
            materials: HashMap::new(),
            background: None,
        };
        renderer.apply_size();
        Ok(renderer)
    }

    #[cfg(target_arch = "wasm32")]
    pub fn canvas(&self) -> &web_sys::HtmlCanvasElement {
        &self.canvas
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Size of the drawing buffer in device pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn acquire(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface.get_current_texture()
    }

    /// Re-applies the surface configuration after it was lost or outdated.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn apply_size(&mut self) {
        let (width, height) = physical_size(self.css_size.0, self.css_size.1, self.pixel_ratio);
        self.config.width = width;
        self.config.height = height;
        #[cfg(target_arch = "wasm32")]
        {
            self.canvas.set_width(width);
            self.canvas.set_height(height);
            let style = self.canvas.style();
            let _ = style.set_property("width", &format!("{}px", self.css_size.0));
            let _ = style.set_property("height", &format!("{}px", self.css_size.1));
        }
        self.surface.configure(&self.device, &self.config);
    }

    /// Draws background and bodies into `color`, clearing both targets first.
    pub fn draw(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        scene: &Scene,
        camera: &PerspectiveCamera,
    ) {
        self.sync_textures(scene);
        self.queue.write_buffer(
            &self.global_buffer,
            0,
            bytes_of(&GlobalUniform::new(camera, &scene.lights)),
        );

        if self.objects.len() != scene.bodies.len() {
            self.objects = scene
                .bodies
                .iter()
                .map(|body| self.object_bind_group(body))
                .collect();
        }

        let background = self
            .background
            .as_ref()
            .and_then(|uploaded| uploaded.bind_group.as_ref())
            .unwrap_or(&self.fallback_background);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.sky_pipeline);
        pass.set_bind_group(0, &self.global_bind_group, &[]);
        pass.set_bind_group(1, background, &[]);
        pass.draw(0..3, 0..1);

        pass.set_pipeline(&self.mesh_pipeline);
        pass.set_bind_group(0, &self.global_bind_group, &[]);
        pass.set_vertex_buffer(0, self.sphere.vertex.slice(..));
        pass.set_index_buffer(self.sphere.index.slice(..), wgpu::IndexFormat::Uint32);
        for (body, object_group) in scene.bodies.iter().zip(&self.objects) {
            let material = body
                .texture
                .as_ref()
                .and_then(|handle| self.materials.get(&handle.id()))
                .and_then(|uploaded| uploaded.bind_group.as_ref())
                .unwrap_or(&self.fallback_material);
            pass.set_bind_group(1, object_group, &[]);
            pass.set_bind_group(2, material, &[]);
            pass.draw_indexed(0..self.sphere.index_count, 0, 0..1);
        }
    }

    /// Body transforms never change after assembly, so each body gets one
    /// uniform buffer for the lifetime of the renderer.
    fn object_bind_group(&self, body: &Body) -> wgpu::BindGroup {
        let constants = ObjectConstants::new(body);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-uniform", body.name)),
                contents: bytes_of(&constants),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}-bind-group", body.name)),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    /// Uploads textures whose loads settled since the last frame.
    fn sync_textures(&mut self, scene: &Scene) {
        let max_extent = self.device.limits().max_texture_dimension_2d;
        for handle in scene.bodies.iter().filter_map(|body| body.texture.as_ref()) {
            let cached = self.materials.get(&handle.id()).map(|t| t.generation);
            let generation = handle.generation();
            let state = handle.state();
            let bind_group = match plan_upload(cached, generation, &state) {
                UploadPlan::Skip => continue,
                UploadPlan::Fallback => None,
                UploadPlan::Upload => {
                    let TextureState::Ready(image) = state else {
                        continue;
                    };
                    let image = fit_to_limit(&image, max_extent, handle.path());
                    Some(
                        self.uploader()
                            .material(&self.material_layout, &image, handle.path()),
                    )
                }
            };
            self.materials.insert(
                handle.id(),
                UploadedTexture {
                    generation,
                    bind_group,
                },
            );
        }

        let cube = &scene.background;
        let generation = cube.generation();
        let current = self.background.as_ref().map(|t| t.generation);
        if current != Some(generation) && cube.is_settled() {
            let bind_group = assemble_faces(cube).map(|faces| {
                let faces = faces.map(|face| fit_to_limit(&face, max_extent, "background"));
                self.uploader().cube(&self.cube_layout, &faces, "background")
            });
            self.background = Some(UploadedTexture {
                generation,
                bind_group,
            });
        }
    }

    fn uploader(&self) -> TextureUploader<'_> {
        TextureUploader {
            device: &self.device,
            queue: &self.queue,
            format: self.texture_format,
            sampler: &self.sampler,
        }
    }
}

impl SceneRenderer for GpuRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.css_size = (width, height);
        self.apply_size();
    }

    fn size(&self) -> (u32, u32) {
        self.css_size
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        if ratio > 0.0 && ratio != self.pixel_ratio {
            self.pixel_ratio = ratio;
            self.apply_size();
        }
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }
}

struct TextureUploader<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    format: wgpu::TextureFormat,
    sampler: &'a wgpu::Sampler,
}

impl TextureUploader<'_> {
    fn material(
        &self,
        layout: &wgpu::BindGroupLayout,
        image: &RgbaImage,
        label: &str,
    ) -> wgpu::BindGroup {
        let texture = self.upload(&[image], label);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.bind(layout, &view, label)
    }

    fn cube(
        &self,
        layout: &wgpu::BindGroupLayout,
        faces: &[RgbaImage; 6],
        label: &str,
    ) -> wgpu::BindGroup {
        let layers: Vec<&RgbaImage> = faces.iter().collect();
        let texture = self.upload(&layers, label);
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        self.bind(layout, &view, label)
    }

    fn bind(
        &self,
        layout: &wgpu::BindGroupLayout,
        view: &wgpu::TextureView,
        label: &str,
    ) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(self.sampler),
                },
            ],
        })
    }

    /// Uploads same-sized layers into one texture.
    fn upload(&self, layers: &[&RgbaImage], label: &str) -> wgpu::Texture {
        let (width, height) = layers[0].dimensions();
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers.len() as u32,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (layer, image) in layers.iter().enumerate() {
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                image.as_raw(),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
        log::debug!("uploaded texture {label} ({width}x{height}, {} layers)", layers.len());
        texture
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadPlan {
    /// The cached upload matches the handle's generation.
    Skip,
    Upload,
    /// Nothing to upload yet (or ever); bind the fallback texture.
    Fallback,
}

/// One upload per generation change of a handle.
fn plan_upload(cached: Option<u64>, generation: u64, state: &TextureState) -> UploadPlan {
    if cached == Some(generation) {
        return UploadPlan::Skip;
    }
    match state {
        TextureState::Ready(_) => UploadPlan::Upload,
        TextureState::Pending | TextureState::Failed(_) => UploadPlan::Fallback,
    }
}

/// Extent that fits inside `max` on both axes, keeping the aspect ratio.
/// `None` when the image already fits.
fn scaled_extent((width, height): (u32, u32), max: u32) -> Option<(u32, u32)> {
    if width <= max && height <= max {
        return None;
    }
    let longest = u64::from(width.max(height));
    let limit = u64::from(max.max(1));
    let fit = |value: u32| (u64::from(value) * limit / longest).clamp(1, limit) as u32;
    Some((fit(width), fit(height)))
}

/// Downscales images the adapter cannot hold.
fn fit_to_limit(image: &RgbaImage, max: u32, label: &str) -> RgbaImage {
    match scaled_extent(image.dimensions(), max) {
        None => image.clone(),
        Some((width, height)) => {
            log::warn!(
                "{label}: {}x{} exceeds the {max}px texture limit, downscaling to {width}x{height}",
                image.width(),
                image.height()
            );
            imageops::resize(image, width, height, imageops::FilterType::Triangle)
        }
    }
}

/// Gathers six equally sized faces; unusable faces become black.
///
/// Returns `None` when no face loaded at all.
fn assemble_faces(cube: &CubeTexture) -> Option<[RgbaImage; 6]> {
    let states = cube.faces.clone().map(|face| face.state());
    let size = states.iter().find_map(|state| match state {
        TextureState::Ready(image) if image.width() == image.height() => Some(image.width()),
        _ => None,
    })?;
    Some(states.map(|state| match state {
        TextureState::Ready(image) if image.dimensions() == (size, size) => (*image).clone(),
        _ => RgbaImage::from_pixel(size, size, image::Rgba([0, 0, 0, 255])),
    }))
}

fn black_faces(size: u32) -> [RgbaImage; 6] {
    std::array::from_fn(|_| RgbaImage::from_pixel(size, size, image::Rgba([0, 0, 0, 255])))
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn texture_entry(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn create_mesh_pipeline(
    device: &wgpu::Device,
    layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene-shader"),
        source: wgpu::ShaderSource::Wgsl(SCENE_SHADER.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("scene-pipeline-layout"),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("scene-pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &ATTRIBUTES,
            }],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
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
                format: SCENE_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

fn create_sky_pipeline(
    device: &wgpu::Device,
    layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("sky-shader"),
        source: wgpu::ShaderSource::Wgsl(SKY_SHADER.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("sky-pipeline-layout"),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("sky-pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_sky"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_sky"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: SCENE_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &SphereMesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    sky_inverse: [[f32; 4]; 4],
    camera_position: [f32; 4],
    ambient: [f32; 4],
    light_position: [f32; 4],
    light_color: [f32; 4],
}

impl GlobalUniform {
    /// Folds the scene lights into one ambient term and the first point light.
    fn new(camera: &PerspectiveCamera, lights: &[Light]) -> Self {
        let mut ambient = Vec3::ZERO;
        let mut point = (Vec3::ZERO, Vec3::ZERO);
        for light in lights {
            match *light {
                Light::Ambient { color, intensity } => ambient += color * intensity,
                Light::Point {
                    color,
                    intensity,
                    position,
                } => {
                    if point.1 == Vec3::ZERO {
                        point = (position, color * intensity);
                    }
                }
            }
        }
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            sky_inverse: camera.sky_inverse().to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            ambient: ambient.extend(1.0).into(),
            light_position: point.0.extend(1.0).into(),
            light_color: point.1.extend(1.0).into(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    color: [f32; 4],
    params: [f32; 4],
}

impl ObjectConstants {
    fn new(body: &Body) -> Self {
        let model =
            Mat4::from_translation(body.position) * Mat4::from_scale(Vec3::splat(body.radius));
        let unlit = if body.shading == Shading::Unlit { 1.0 } else { 0.0 };
        Self {
            model: model.to_cols_array_2d(),
            color: body.color.extend(1.0).into(),
            params: [unlit, 0.0, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::TextureHandle;
    use crate::config::{AppConfig, CameraConfig, LightingConfig};
    use crate::scene::{assemble, lights};

    #[test]
    fn lights_fold_into_uniform() {
        let camera = PerspectiveCamera::new(&CameraConfig::default(), 1.0);
        let uniform = GlobalUniform::new(&camera, &lights(&LightingConfig::default()));
        assert_eq!(uniform.ambient, [0.2, 0.2, 0.2, 1.0]);
        assert_eq!(uniform.light_position, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(uniform.light_color, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn failed_faces_are_blacked_out() {
        let faces = std::array::from_fn(|i| {
            let handle = TextureHandle::pending(&format!("face{i}"));
            if i == 2 {
                handle.fail("missing");
            } else {
                handle.fulfill(RgbaImage::from_pixel(4, 4, image::Rgba([200, 10, 10, 255])));
            }
            handle
        });
        let cube = CubeTexture { faces };
        let assembled = assemble_faces(&cube).unwrap();
        assert_eq!(assembled[0].get_pixel(0, 0).0, [200, 10, 10, 255]);
        assert_eq!(assembled[2].dimensions(), (4, 4));
        assert_eq!(assembled[2].get_pixel(1, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn all_faces_missing_means_no_background() {
        let faces = std::array::from_fn(|i| {
            let handle = TextureHandle::pending(&format!("face{i}"));
            handle.fail("missing");
            handle
        });
        assert!(assemble_faces(&CubeTexture { faces }).is_none());
    }

    #[test]
    fn texture_uploads_once_per_generation() {
        let handle = TextureHandle::pending("textures/earth.jpg");
        assert_eq!(
            plan_upload(None, handle.generation(), &handle.state()),
            UploadPlan::Fallback
        );
        let cached = Some(handle.generation());
        assert_eq!(
            plan_upload(cached, handle.generation(), &handle.state()),
            UploadPlan::Skip
        );

        handle.fulfill(RgbaImage::new(2, 2));
        assert_eq!(
            plan_upload(cached, handle.generation(), &handle.state()),
            UploadPlan::Upload
        );
        let cached = Some(handle.generation());
        assert_eq!(
            plan_upload(cached, handle.generation(), &handle.state()),
            UploadPlan::Skip
        );
    }

    #[test]
    fn failed_texture_keeps_the_fallback() {
        let handle = TextureHandle::pending("textures/mars.jpg");
        let pending = Some(handle.generation());
        handle.fail("404");
        assert_eq!(
            plan_upload(pending, handle.generation(), &handle.state()),
            UploadPlan::Fallback
        );
        let cached = Some(handle.generation());
        assert_eq!(
            plan_upload(cached, handle.generation(), &handle.state()),
            UploadPlan::Skip
        );
    }

    #[test]
    fn oversized_textures_shrink_to_the_limit() {
        assert_eq!(scaled_extent((2048, 1024), 4096), None);
        assert_eq!(scaled_extent((4096, 4096), 4096), None);
        assert_eq!(scaled_extent((8192, 4096), 4096), Some((4096, 2048)));
        assert_eq!(scaled_extent((1000, 9000), 2048), Some((227, 2048)));
        assert_eq!(scaled_extent((100_000, 1), 2048), Some((2048, 1)));
    }

    #[test]
    fn fit_to_limit_resizes_only_when_needed() {
        let small = RgbaImage::new(8, 4);
        assert_eq!(fit_to_limit(&small, 8, "small").dimensions(), (8, 4));
        assert_eq!(fit_to_limit(&small, 4, "small").dimensions(), (4, 2));
    }

    #[test]
    fn object_constants_place_and_scale_the_unit_sphere() {
        struct Pending;
        impl crate::assets::TextureLoader for Pending {
            fn load(&self, path: &str) -> TextureHandle {
                TextureHandle::pending(path)
            }
        }
        let scene = assemble(&AppConfig::default(), &Pending);

        let sun = ObjectConstants::new(scene.body("Sun").unwrap());
        assert_eq!(sun.params[0], 1.0);
        assert_eq!(sun.color, [1.0, 1.0, 0.0, 1.0]);

        let earth = ObjectConstants::new(scene.body("Earth").unwrap());
        assert_eq!(earth.params[0], 0.0);
        let model = Mat4::from_cols_array_2d(&earth.model);
        let surface = model.transform_point3(Vec3::Y);
        assert!((surface - Vec3::new(20.0, 1.0, 0.0)).length() < 1e-5);
    }
}
