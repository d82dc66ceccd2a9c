//! Saving the current frame as a PNG.
//!
//! The final image is rendered once more into an offscreen RGBA texture,
//! copied into a mappable buffer and read back. Texture-to-buffer copies need
//! rows padded to 256 bytes, so the padding is stripped before encoding. On
//! native targets the PNG is written to disk; in the browser it is offered as
//! a download.

use std::io::Cursor;

/// File name of saved frames.
pub const CAPTURE_FILE_NAME: &str = "vitrine-capture.png";
/// Format of the capture texture; its bytes are PNG-ready sRGB RGBA.
pub const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

const BYTES_PER_PIXEL: u32 = 4;

/// Row layout of a readback buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    pub width: u32,
    pub height: u32,
    pub unpadded_bytes_per_row: u32,
    pub padded_bytes_per_row: u32,
}

impl RowLayout {
    pub fn new(width: u32, height: u32) -> Self {
        let unpadded_bytes_per_row = width * BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
        Self {
            width,
            height,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        }
    }

    pub fn buffer_size(&self) -> wgpu::BufferAddress {
        self.padded_bytes_per_row as wgpu::BufferAddress * self.height as wgpu::BufferAddress
    }
}

/// Drops the per-row padding of a readback buffer.
pub fn unpad_rows(data: &[u8], layout: &RowLayout) -> Vec<u8> {
    data.chunks(layout.padded_bytes_per_row as usize)
        .take(layout.height as usize)
        .flat_map(|row| &row[..row.len().min(layout.unpadded_bytes_per_row as usize)])
        .copied()
        .collect()
}

pub fn to_image(data: &[u8], layout: &RowLayout) -> anyhow::Result<image::RgbaImage> {
    let pixels = unpad_rows(data, layout);
    image::RgbaImage::from_raw(layout.width, layout.height, pixels).ok_or_else(|| {
        anyhow::anyhow!(
            "readback of {} bytes is too small for a {}x{} image",
            data.len(),
            layout.width,
            layout.height
        )
    })
}

pub fn encode_png(image: &image::RgbaImage) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

/// Offscreen target and readback buffer for one saved frame.
#[derive(Debug)]
pub struct Capture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub buffer: wgpu::Buffer,
    pub layout: RowLayout,
}

impl Capture {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let layout = RowLayout::new(width.max(1), height.max(1));
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture texture"),
            size: wgpu::Extent3d {
                width: layout.width,
                height: layout.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAPTURE_FORMAT,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: Some("Capture buffer"),
            mapped_at_creation: false,
        });
        Self {
            texture,
            view,
            buffer,
            layout,
        }
    }

    /// Records the copy from the capture texture into the readback buffer.
    pub fn encode_copy(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.layout.padded_bytes_per_row),
                    rows_per_image: Some(self.layout.height),
                },
            },
            wgpu::Extent3d {
                width: self.layout.width,
                height: self.layout.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Maps the buffer after the copy was submitted and decodes the image.
    pub async fn read(self, device: &wgpu::Device) -> anyhow::Result<image::RgbaImage> {
        let buffer_slice = self.buffer.slice(..);
        // The mapping has to be requested before polling, or the future never resolves.
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        #[cfg(target_arch = "wasm32")]
        device
            .poll(wgpu::PollType::Poll)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        #[cfg(not(target_arch = "wasm32"))]
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(std::time::Duration::from_secs(3)),
            })
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        rx.receive()
            .await
            .ok_or_else(|| anyhow::anyhow!("capture readback was dropped"))??;

        let image = {
            let data = buffer_slice.get_mapped_range();
            to_image(&data, &self.layout)?
        };
        self.buffer.unmap();
        Ok(image)
    }
}

/// Writes the frame next to the working directory.
#[cfg(not(target_arch = "wasm32"))]
pub fn save(image: &image::RgbaImage) -> anyhow::Result<std::path::PathBuf> {
    save_in(image, std::path::Path::new("."))
}

#[cfg(not(target_arch = "wasm32"))]
pub fn save_in(image: &image::RgbaImage, dir: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join(CAPTURE_FILE_NAME);
    std::fs::write(&path, encode_png(image)?)?;
    log::info!("saved frame to {}", path.display());
    Ok(path)
}

/// Offers the frame as a browser download.
#[cfg(target_arch = "wasm32")]
pub fn save(image: &image::RgbaImage) -> anyhow::Result<()> {
    use wasm_bindgen::JsCast;

    let js_err = |e: wasm_bindgen::JsValue| anyhow::anyhow!("{e:?}");
    let png = encode_png(image)?;

    let bytes = js_sys::Uint8Array::from(png.as_slice());
    let parts = js_sys::Array::new();
    parts.push(&bytes.buffer());
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("image/png");
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options).map_err(js_err)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob).map_err(js_err)?;

    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| anyhow::anyhow!("no document to download into"))?;
    let anchor: web_sys::HtmlAnchorElement = document
        .create_element("a")
        .map_err(js_err)?
        .dyn_into()
        .map_err(|_| anyhow::anyhow!("created element is not an anchor"))?;
    anchor.set_href(&url);
    anchor.set_download(CAPTURE_FILE_NAME);
    anchor.click();
    web_sys::Url::revoke_object_url(&url).map_err(js_err)?;
    log::info!("offered frame as {CAPTURE_FILE_NAME}");
    Ok(())
}
