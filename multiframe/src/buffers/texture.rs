use glam::UVec2;
use log::{debug, info};

use crate::{Backend, TextureDescriptor, TextureHandle};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Texture owned by the stage that allocated it.
///
/// Other stages only ever get the [`TextureHandle`], which stays valid across
/// resizes.
#[derive(Debug)]
pub struct Texture {
    handle: TextureHandle,
    label: String,
    size: UVec2,
    format: wgpu::TextureFormat,
}

impl Texture {
    pub fn builder(label: impl ToString) -> TextureBuilder {
        TextureBuilder {
            label: label.to_string(),
            size: Default::default(),
            format: FORMAT,
            mip_levels: 1,
            usage: wgpu::TextureUsages::empty(),
        }
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Reallocates the texture if its size differs from `size`; returns
    /// whether anything happened.
    pub fn resize(&mut self, backend: &mut dyn Backend, size: UVec2) -> bool {
        if size == self.size {
            return false;
        }

        debug!(
            "Resizing texture `{}`; size={} -> {}",
            self.label, self.size, size
        );

        backend.resize_texture(self.handle, size);
        self.size = size;

        true
    }
}

#[derive(Debug)]
pub struct TextureBuilder {
    label: String,
    size: UVec2,
    format: wgpu::TextureFormat,
    mip_levels: u32,
    usage: wgpu::TextureUsages,
}

impl TextureBuilder {
    pub fn with_size(mut self, size: UVec2) -> Self {
        self.size = size;
        self
    }

    pub fn with_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    pub fn with_usage(mut self, usage: wgpu::TextureUsages) -> Self {
        self.usage |= usage;
        self
    }

    pub fn build(self, backend: &mut dyn Backend) -> Texture {
        assert!(self.size.x > 0);
        assert!(self.size.y > 0);

        info!(
            "Allocating texture `{}`; size={}, format={:?}",
            self.label, self.size, self.format
        );

        let handle = backend.create_texture(&TextureDescriptor {
            label: self.label.clone(),
            size: self.size,
            format: self.format,
            mip_levels: self.mip_levels,
            usage: self.usage,
        });

        Texture {
            handle,
            label: self.label,
            size: self.size,
            format: self.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;
    use crate::{Event, RecordingBackend};

    #[test]
    fn resize() {
        let mut backend = RecordingBackend::new();

        let mut target = Texture::builder("gi")
            .with_size(uvec2(16, 8))
            .with_format(wgpu::TextureFormat::R32Uint)
            .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
            .with_usage(wgpu::TextureUsages::STORAGE_BINDING)
            .build(&mut backend);

        assert!(!target.resize(&mut backend, uvec2(16, 8)));
        assert!(target.resize(&mut backend, uvec2(32, 32)));
        assert_eq!(uvec2(32, 32), target.size());

        let desc = backend.texture(target.handle());

        assert_eq!(uvec2(32, 32), desc.size);
        assert!(desc.usage.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(desc.usage.contains(wgpu::TextureUsages::STORAGE_BINDING));

        assert_eq!(
            2,
            backend
                .events()
                .iter()
                .filter(|event| matches!(
                    event,
                    Event::TextureCreated { .. } | Event::TextureResized { .. }
                ))
                .count()
        );
    }
}
