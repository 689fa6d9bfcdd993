//! Decoded textures and their GPU counterpart.
//!
//! [`TextureRecord`] is the immutable RGBA8 image the [`TextureStore`](crate::resources::texture::TextureStore)
//! hands out by id. [`GpuTexture`] is what a renderer binds once it decides to upload a record.

/// Immutable RGBA8 image, `width * height * 4` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureRecord {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureRecord {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// RGBA value of the texel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels
            .get(offset..offset + 4)
            .and_then(|px| px.try_into().ok())
    }
}

/// A GPU texture with a view and sampler, ready for descriptor binding.
#[derive(Clone, Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl GpuTexture {
    /// Uploads a record as an sRGB color texture.
    pub fn from_record(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        record: &TextureRecord,
        label: Option<&str>,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: record.width,
            height: record.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
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
            &record.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * record.width),
                rows_per_image: Some(record.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = create_default_sampler(device);
        Self {
            texture,
            view,
            sampler,
        }
    }
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    })
}
