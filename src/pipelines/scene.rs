//! Pipelines that draw model meshes into the HDR scene target.

use crate::{
    data_structures::{
        instance::InstanceRaw,
        model::{MeshVertex, Vertex},
        texture::Texture,
    },
    pipelines::basic::{RasterOptions, mk_render_pipeline, uniform_entry},
};

/// One pipeline per combination of blending and face culling.
#[derive(Debug)]
pub struct ScenePipelines {
    pub opaque: wgpu::RenderPipeline,
    pub opaque_double_sided: wgpu::RenderPipeline,
    pub transparent: wgpu::RenderPipeline,
    pub transparent_double_sided: wgpu::RenderPipeline,
    pub material_layout: wgpu::BindGroupLayout,
}

pub fn mk_material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
        label: Some("material_bind_group_layout"),
    })
}

impl ScenePipelines {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        light_layout: &wgpu::BindGroupLayout,
        environment_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let material_layout = mk_material_layout(device);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[
                Some(camera_layout),
                Some(light_layout),
                Some(environment_layout),
                Some(&material_layout),
            ],
            immediate_size: 0,
        });

        let pipeline = |label: &'static str, blend: wgpu::BlendState, raster: RasterOptions| {
            mk_render_pipeline(
                device,
                &layout,
                Texture::HDR_FORMAT,
                Some(blend),
                Some(Texture::DEPTH_FORMAT),
                raster,
                &[MeshVertex::desc(), InstanceRaw::desc()],
                wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(include_str!("scene.wgsl").into()),
                },
            )
        };

        let double_sided = RasterOptions {
            cull_mode: None,
            ..Default::default()
        };
        // Transparent surfaces are depth tested against the opaque ones but
        // do not occlude each other.
        let see_through = RasterOptions {
            depth_write: false,
            ..Default::default()
        };
        let see_through_double_sided = RasterOptions {
            cull_mode: None,
            depth_write: false,
        };

        Self {
            opaque: pipeline("Opaque Scene Shader", wgpu::BlendState::REPLACE, Default::default()),
            opaque_double_sided: pipeline(
                "Opaque Double Sided Scene Shader",
                wgpu::BlendState::REPLACE,
                double_sided,
            ),
            transparent: pipeline(
                "Transparent Scene Shader",
                wgpu::BlendState::ALPHA_BLENDING,
                see_through,
            ),
            transparent_double_sided: pipeline(
                "Transparent Double Sided Scene Shader",
                wgpu::BlendState::ALPHA_BLENDING,
                see_through_double_sided,
            ),
            material_layout,
        }
    }

    pub fn select(&self, transparent: bool, double_sided: bool) -> &wgpu::RenderPipeline {
        match (transparent, double_sided) {
            (false, false) => &self.opaque,
            (false, true) => &self.opaque_double_sided,
            (true, false) => &self.transparent,
            (true, true) => &self.transparent_double_sided,
        }
    }
}
