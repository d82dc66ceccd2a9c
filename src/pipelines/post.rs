//! Post-processing chain.
//!
//! The scene is rendered into an HDR target. From there:
//!
//! 1. a bright pass keeps what is above the bloom threshold (half resolution),
//! 2. a separable Gaussian blur spreads it (horizontal, then vertical),
//! 3. the composite pass adds the glow, applies exposure and ACES filmic tone
//!    mapping and writes an 8-bit sRGB image,
//! 4. FXAA smooths edges while writing to the final target (the surface, or
//!    the capture texture when a frame is saved).
//!
//! Every target is recreated by [`PostChain::resize`].

use wgpu::util::DeviceExt;

use crate::{
    config::BloomSettings,
    data_structures::texture::Texture,
    pipelines::basic::{
        RasterOptions, mk_render_pipeline, sampler_entry, texture_entry, uniform_entry,
    },
};

/// Format of the tone mapped image FXAA reads from.
pub const LDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

macro_rules! post_shader {
    ($label:expr, $file:literal) => {
        wgpu::ShaderModuleDescriptor {
            label: Some($label),
            source: wgpu::ShaderSource::Wgsl(
                concat!(include_str!("post/fullscreen.wgsl"), include_str!($file)).into(),
            ),
        }
    };
}

/// Pixel sizes of the chain's targets for a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainExtent {
    pub full: (u32, u32),
    /// Bloom works at half resolution.
    pub half: (u32, u32),
}

impl ChainExtent {
    pub fn for_viewport(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            full: (width, height),
            half: ((width / 2).max(1), (height / 2).max(1)),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostParams {
    /// threshold, strength, radius, exposure
    pub bloom: [f32; 4],
    /// texel size at full and at half resolution
    pub texel: [f32; 4],
}

impl PostParams {
    pub fn new(bloom: &BloomSettings, exposure: f32, extent: ChainExtent) -> Self {
        Self {
            bloom: [bloom.threshold, bloom.strength, bloom.radius, exposure],
            texel: [
                1.0 / extent.full.0 as f32,
                1.0 / extent.full.1 as f32,
                1.0 / extent.half.0 as f32,
                1.0 / extent.half.1 as f32,
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlurStep {
    pub step: [f32; 4],
}

impl BlurStep {
    /// Tap distance along `direction` on the half resolution targets; a larger
    /// bloom radius spaces the taps further apart.
    pub fn new(direction: [f32; 2], radius: f32, extent: ChainExtent) -> Self {
        let spread = 1.0 + 4.0 * radius.clamp(0.0, 1.0);
        Self {
            step: [
                direction[0] * spread / extent.half.0 as f32,
                direction[1] * spread / extent.half.1 as f32,
                0.0,
                0.0,
            ],
        }
    }
}

#[derive(Debug)]
struct Targets {
    scene: Texture,
    bright: Texture,
    blur_a: Texture,
    blur_b: Texture,
    ldr: Texture,
}

impl Targets {
    fn new(device: &wgpu::Device, extent: ChainExtent) -> Self {
        let full = [extent.full.0, extent.full.1];
        let half = [extent.half.0, extent.half.1];
        Self {
            scene: Texture::create_render_target(device, full, Texture::HDR_FORMAT, "hdr scene"),
            bright: Texture::create_render_target(device, half, Texture::HDR_FORMAT, "bloom bright"),
            blur_a: Texture::create_render_target(device, half, Texture::HDR_FORMAT, "bloom blur a"),
            blur_b: Texture::create_render_target(device, half, Texture::HDR_FORMAT, "bloom blur b"),
            ldr: Texture::create_render_target(device, full, LDR_FORMAT, "tone mapped"),
        }
    }
}

#[derive(Debug)]
struct BindGroups {
    bright: wgpu::BindGroup,
    blur_h: wgpu::BindGroup,
    blur_v: wgpu::BindGroup,
    composite: wgpu::BindGroup,
    fxaa: wgpu::BindGroup,
}

#[derive(Debug)]
pub struct PostChain {
    extent: ChainExtent,
    bloom: BloomSettings,
    exposure: f32,
    targets: Targets,
    sampler: wgpu::Sampler,
    params: wgpu::Buffer,
    blur_h: wgpu::Buffer,
    blur_v: wgpu::Buffer,
    single_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    bright_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    fxaa_pipelines: Vec<(wgpu::TextureFormat, wgpu::RenderPipeline)>,
    bind_groups: BindGroups,
}

impl PostChain {
    /// `output_formats` lists every format FXAA may write to.
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        output_formats: &[wgpu::TextureFormat],
        bloom: BloomSettings,
        exposure: f32,
    ) -> Self {
        let extent = ChainExtent::for_viewport(width, height);
        let targets = Targets::new(device, extent);
        let sampler = crate::data_structures::texture::create_clamped_sampler(device);

        let uniform = |label: &str, contents: &[u8]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };
        let params = uniform(
            "Post Params Buffer",
            bytemuck::cast_slice(&[PostParams::new(&bloom, exposure, extent)]),
        );
        let blur_h = uniform(
            "Blur H Buffer",
            bytemuck::cast_slice(&[BlurStep::new([1.0, 0.0], bloom.radius, extent)]),
        );
        let blur_v = uniform(
            "Blur V Buffer",
            bytemuck::cast_slice(&[BlurStep::new([0.0, 1.0], bloom.radius, extent)]),
        );

        let single_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                uniform_entry(2, wgpu::ShaderStages::FRAGMENT),
            ],
            label: Some("post_single_input_layout"),
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                texture_entry(0),
                texture_entry(1),
                sampler_entry(2),
                uniform_entry(3, wgpu::ShaderStages::FRAGMENT),
            ],
            label: Some("post_composite_layout"),
        });

        let single_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Post Single Input Layout"),
                bind_group_layouts: &[Some(&single_layout)],
                immediate_size: 0,
            });
        let composite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Post Composite Layout"),
                bind_group_layouts: &[Some(&composite_layout)],
                immediate_size: 0,
            });

        let fullscreen = |layout: &wgpu::PipelineLayout,
                          format: wgpu::TextureFormat,
                          shader: wgpu::ShaderModuleDescriptor| {
            mk_render_pipeline(
                device,
                layout,
                format,
                Some(wgpu::BlendState::REPLACE),
                None,
                RasterOptions::fullscreen(),
                &[],
                shader,
            )
        };

        let bright_pipeline = fullscreen(
            &single_pipeline_layout,
            Texture::HDR_FORMAT,
            post_shader!("Bloom Bright Shader", "post/bright.wgsl"),
        );
        let blur_pipeline = fullscreen(
            &single_pipeline_layout,
            Texture::HDR_FORMAT,
            post_shader!("Bloom Blur Shader", "post/blur.wgsl"),
        );
        let composite_pipeline = fullscreen(
            &composite_pipeline_layout,
            LDR_FORMAT,
            post_shader!("Composite Shader", "post/composite.wgsl"),
        );
        let mut fxaa_pipelines: Vec<(wgpu::TextureFormat, wgpu::RenderPipeline)> = Vec::new();
        for format in output_formats {
            if fxaa_pipelines.iter().any(|(f, _)| f == format) {
                continue;
            }
            let pipeline = fullscreen(
                &single_pipeline_layout,
                *format,
                post_shader!("FXAA Shader", "post/fxaa.wgsl"),
            );
            fxaa_pipelines.push((*format, pipeline));
        }

        let bind_groups = Self::mk_bind_groups(
            device,
            &targets,
            &sampler,
            &single_layout,
            &composite_layout,
            &params,
            &blur_h,
            &blur_v,
        );

        Self {
            extent,
            bloom,
            exposure,
            targets,
            sampler,
            params,
            blur_h,
            blur_v,
            single_layout,
            composite_layout,
            bright_pipeline,
            blur_pipeline,
            composite_pipeline,
            fxaa_pipelines,
            bind_groups,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn mk_bind_groups(
        device: &wgpu::Device,
        targets: &Targets,
        sampler: &wgpu::Sampler,
        single_layout: &wgpu::BindGroupLayout,
        composite_layout: &wgpu::BindGroupLayout,
        params: &wgpu::Buffer,
        blur_h: &wgpu::Buffer,
        blur_v: &wgpu::Buffer,
    ) -> BindGroups {
        let single = |label: &str, input: &Texture, uniform: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: single_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&input.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniform.as_entire_binding(),
                    },
                ],
                label: Some(label),
            })
        };

        let composite = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.scene.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.blur_b.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.as_entire_binding(),
                },
            ],
            label: Some("composite_bind_group"),
        });

        BindGroups {
            bright: single("bright_bind_group", &targets.scene, params),
            blur_h: single("blur_h_bind_group", &targets.bright, blur_h),
            blur_v: single("blur_v_bind_group", &targets.blur_a, blur_v),
            composite,
            fxaa: single("fxaa_bind_group", &targets.ldr, params),
        }
    }

    pub fn extent(&self) -> ChainExtent {
        self.extent
    }

    /// Where the scene pass renders to.
    pub fn scene_view(&self) -> &wgpu::TextureView {
        &self.targets.scene.view
    }

    /// Recreates every target for the new viewport; zero sizes are clamped to one pixel.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) {
        self.extent = ChainExtent::for_viewport(width, height);
        self.targets = Targets::new(device, self.extent);
        self.write_uniforms(queue);
        self.bind_groups = Self::mk_bind_groups(
            device,
            &self.targets,
            &self.sampler,
            &self.single_layout,
            &self.composite_layout,
            &self.params,
            &self.blur_h,
            &self.blur_v,
        );
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn set_exposure(&mut self, queue: &wgpu::Queue, exposure: f32) {
        self.exposure = exposure;
        self.write_uniforms(queue);
    }


    fn write_uniforms(&self, queue: &wgpu::Queue) {
        let extent = self.extent;
        queue.write_buffer(
            &self.params,
            0,
            bytemuck::cast_slice(&[PostParams::new(&self.bloom, self.exposure, extent)]),
        );
        queue.write_buffer(
            &self.blur_h,
            0,
            bytemuck::cast_slice(&[BlurStep::new([1.0, 0.0], self.bloom.radius, extent)]),
        );
        queue.write_buffer(
            &self.blur_v,
            0,
            bytemuck::cast_slice(&[BlurStep::new([0.0, 1.0], self.bloom.radius, extent)]),
        );
    }

    /// Bloom and tone mapping; leaves the result in the tone mapped target.
    pub fn encode_composite(&self, encoder: &mut wgpu::CommandEncoder) {
        fullscreen_pass(
            encoder,
            "Bloom Bright Pass",
            &self.targets.bright.view,
            &self.bright_pipeline,
            &self.bind_groups.bright,
        );
        fullscreen_pass(
            encoder,
            "Bloom Blur H Pass",
            &self.targets.blur_a.view,
            &self.blur_pipeline,
            &self.bind_groups.blur_h,
        );
        fullscreen_pass(
            encoder,
            "Bloom Blur V Pass",
            &self.targets.blur_b.view,
            &self.blur_pipeline,
            &self.bind_groups.blur_v,
        );
        fullscreen_pass(
            encoder,
            "Composite Pass",
            &self.targets.ldr.view,
            &self.composite_pipeline,
            &self.bind_groups.composite,
        );
    }

    /// Anti-aliases the tone mapped image into `output`.
    pub fn encode_fxaa(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        format: wgpu::TextureFormat,
    ) -> anyhow::Result<()> {
        let pipeline = self
            .fxaa_pipelines
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, pipeline)| pipeline)
            .ok_or_else(|| anyhow::anyhow!("no FXAA pipeline for {format:?}"))?;
        fullscreen_pass(encoder, "FXAA Pass", output, pipeline, &self.bind_groups.fxaa);
        Ok(())
    }
}

fn fullscreen_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    view: &wgpu::TextureView,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
) {
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
        multiview_mask: None,
    });
    render_pass.set_pipeline(pipeline);
    render_pass.set_bind_group(0, bind_group, &[]);
    render_pass.draw(0..3, 0..1);
}
