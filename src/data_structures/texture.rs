//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around WGPU texture resources,
//! and helpers for depth buffers, post-processing render targets and
//! environment maps decoded from raster or Radiance HDR images.

use anyhow::*;
use image::{DynamicImage, GenericImageView};

/// A GPU texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    /// Format of the lit scene before tone mapping.
    pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// A colour target that later passes sample from.
    pub fn create_render_target(
        device: &wgpu::Device,
        size: [u32; 2],
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size[0].max(1),
                height: size[1].max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            sampler: Some(create_clamped_sampler(device)),
        }
    }

    /// A 1x1 black environment used until (or instead of) a real one.
    pub fn create_blank_environment(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            1,
            1,
            image::Rgba([0, 0, 0, 255]),
        ));
        Self::upload_rgba8(device, queue, &img, Some("blank environment"))
    }

    /// Load an environment map from image file contents.
    ///
    /// Radiance HDR images keep their range in a shared-exponent texture;
    /// everything else is treated as an sRGB raster.
    pub fn environment_from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
    ) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::environment_from_image(device, queue, &img, Some(label)))
    }

    pub fn environment_from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &DynamicImage,
        label: Option<&str>,
    ) -> Self {
        match img {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                let (width, height) = img.dimensions();
                let texels: Vec<u32> = img
                    .to_rgb32f()
                    .pixels()
                    .map(|p| pack_rgb9e5(p.0))
                    .collect();
                Self::upload(
                    device,
                    queue,
                    bytemuck::cast_slice(&texels),
                    (width, height),
                    wgpu::TextureFormat::Rgb9e5Ufloat,
                    label,
                )
            }
            _ => Self::upload_rgba8(device, queue, img, label),
        }
    }

    fn upload_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &DynamicImage,
        label: Option<&str>,
    ) -> Self {
        let rgba = img.to_rgba8();
        Self::upload(
            device,
            queue,
            &rgba,
            img.dimensions(),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            label,
        )
    }

    /// Uploads tightly packed 4-byte texels.
    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[u8],
        dimensions: (u32, u32),
        format: wgpu::TextureFormat,
        label: Option<&str>,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            // equirectangular maps wrap horizontally only
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        }));

        Self {
            texture,
            view,
            sampler,
        }
    }
}

pub fn create_clamped_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    })
}

/// Packs linear RGB into `Rgb9e5Ufloat` (9-bit mantissas, shared 5-bit exponent).
pub fn pack_rgb9e5(rgb: [f32; 3]) -> u32 {
    const MANTISSA_BITS: i32 = 9;
    const BIAS: i32 = 15;
    const MAX_EXP: i32 = 31;
    let max_value = ((1 << MANTISSA_BITS) - 1) as f32 / (1 << MANTISSA_BITS) as f32
        * 2f32.powi(MAX_EXP - BIAS);

    let [r, g, b] = rgb.map(|c| if c.is_nan() { 0.0 } else { c.clamp(0.0, max_value) });
    let max_rgb = r.max(g).max(b);

    let mut exp = (-BIAS - 1).max(max_rgb.log2().floor() as i32) + 1 + BIAS;
    let max_mantissa = (max_rgb / 2f32.powi(exp - BIAS - MANTISSA_BITS) + 0.5).floor() as i32;
    if max_mantissa == 1 << MANTISSA_BITS {
        exp += 1;
    }
    let denom = 2f32.powi(exp - BIAS - MANTISSA_BITS);
    let mantissa = |c: f32| ((c / denom + 0.5).floor() as u32).min((1 << MANTISSA_BITS) - 1);

    mantissa(r) | (mantissa(g) << 9) | (mantissa(b) << 18) | ((exp as u32) << 27)
}
