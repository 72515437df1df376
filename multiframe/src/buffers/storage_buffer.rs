use log::{debug, info};

use crate::{Backend, BufferDescriptor, BufferHandle};

/// Storage buffer that exists only on the GPU, owned by the stage that
/// allocated it.
#[derive(Debug)]
pub struct StorageBuffer {
    handle: BufferHandle,
    label: String,
    size: u64,
}

impl StorageBuffer {
    pub fn new(
        backend: &mut dyn Backend,
        label: impl ToString,
        size: u64,
    ) -> Self {
        let label = label.to_string();

        info!("Allocating storage buffer `{label}`; size={size}");

        let handle = backend.create_buffer(&BufferDescriptor {
            label: label.clone(),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            handle,
            label,
            size,
        }
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reallocates the buffer if its size differs from `size`; contents are
    /// not preserved.
    pub fn resize(&mut self, backend: &mut dyn Backend, size: u64) -> bool {
        if size == self.size {
            return false;
        }

        debug!(
            "Resizing storage buffer `{}`; size={} -> {}",
            self.label, self.size, size
        );

        backend.resize_buffer(self.handle, size);
        self.size = size;

        true
    }
}
