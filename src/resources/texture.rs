use crate::{
    data_structures::texture::Texture,
    pipelines::basic::{sampler_entry, texture_entry},
    resources::{AssetRoot, load_binary},
};

/// Layout shared by everything that samples the environment map.
pub fn environment_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[texture_entry(0), sampler_entry(1)],
        label: Some("environment_bind_group_layout"),
    })
}

pub fn environment_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    environment: &Texture,
) -> anyhow::Result<wgpu::BindGroup> {
    let sampler = environment
        .sampler
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("environment texture has no sampler"))?;
    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&environment.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("environment_bind_group"),
    }))
}

/// Raw bytes of an equirectangular environment image.
pub async fn load_environment_bytes(root: &AssetRoot, file_name: &str) -> anyhow::Result<Vec<u8>> {
    log::info!("loading environment {file_name}");
    load_binary(root, file_name).await
}

pub async fn load_environment(
    root: &AssetRoot,
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Texture> {
    let data = load_environment_bytes(root, file_name).await?;
    Texture::environment_from_bytes(device, queue, &data, file_name)
}
