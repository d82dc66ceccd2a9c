use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{CameraResources, CameraUniform, OrbitCamera, OrbitController, Projection},
    capture::CAPTURE_FORMAT,
    config::StageConfig,
    data_structures::{light::LightUniform, texture},
    pipelines::{
        basic::uniform_entry,
        light::LightResources,
        post::PostChain,
        scene::ScenePipelines,
    },
    resources::texture::{environment_bind_group, environment_layout},
};

/// The environment map as bound for the scene shader.
#[derive(Debug)]
pub struct EnvironmentResources {
    pub texture: texture::Texture,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub environment: EnvironmentResources,
    pub pipelines: ScenePipelines,
    pub post: PostChain,
    pub clear_colour: wgpu::Color,
}

impl Context {
    pub async fn new(window: Arc<Window>, stage: &StageConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The FXAA pass writes linear values and relies on an sRGB surface to encode them.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no supported formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera = OrbitCamera::looking_at_origin(stage.camera.distance);
        let projection = Projection::new(
            width,
            height,
            stage.camera.fov_y,
            stage.camera.near,
            stage.camera.far,
        );
        let controller = OrbitController::new(stage.orbit, height);

        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                )],
                label: Some("camera_bind_group_layout"),
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let camera = CameraResources {
            camera,
            controller,
            uniform: camera_uniform,
            buffer: camera_buffer,
            bind_group: camera_bind_group,
            bind_group_layout: camera_bind_group_layout,
        };

        let depth_texture =
            texture::Texture::create_depth_texture(&device, [width, height], "depth_texture");

        let light = LightResources::new(&device, LightUniform::pack(std::iter::empty()));

        let environment_layout = environment_layout(&device);
        let blank = texture::Texture::create_blank_environment(&device, &queue);
        let environment = EnvironmentResources {
            bind_group: environment_bind_group(&device, &environment_layout, &blank)?,
            texture: blank,
            bind_group_layout: environment_layout,
        };

        let pipelines = ScenePipelines::new(
            &device,
            &camera.bind_group_layout,
            &light.bind_group_layout,
            &environment.bind_group_layout,
        );

        let post = PostChain::new(
            &device,
            width,
            height,
            &[surface_format, CAPTURE_FORMAT],
            stage.bloom,
            stage.exposure,
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            environment,
            pipelines,
            post,
            window,
            depth_texture,
            clear_colour: stage.clear_colour,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Reconfigures the surface and every size-dependent resource.
    ///
    /// Returns `false` without changing anything for a zero-sized viewport,
    /// which a surface cannot be configured with.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        log::debug!("resize to {width}x{height}");
        self.config.width = width;
        self.config.height = height;
        self.projection.resize(width, height);
        self.camera.controller.resize(height);
        self.surface.configure(&self.device, &self.config);
        self.depth_texture = texture::Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            "depth_texture",
        );
        self.post.resize(&self.device, &self.queue, width, height);
        true
    }

    /// Binds `environment` for reflections and transmission.
    pub fn set_environment(&mut self, environment: texture::Texture) -> anyhow::Result<()> {
        self.environment.bind_group = environment_bind_group(
            &self.device,
            &self.environment.bind_group_layout,
            &environment,
        )?;
        self.environment.texture = environment;
        Ok(())
    }

    /// Applies queued camera input and uploads the view projection.
    pub fn update_camera(&mut self, dt: f32) {
        self.camera
            .controller
            .update(&mut self.camera.camera, dt);
        self.camera
            .uniform
            .update_view_proj(&self.camera.camera, &self.projection);
        self.queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );
    }
}
