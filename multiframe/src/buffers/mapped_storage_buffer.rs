use std::ops::{Deref, DerefMut};
use std::{any, mem};

use bytemuck::Pod;

use crate::{Backend, BufferHandle, StorageBuffer};

/// Storage buffer that exists both on the host machine and the GPU.
///
/// Uses [`DerefMut`] to track whether it's been modified since the last
/// [`Self::flush()`]; the GPU-side allocation grows together with the data.
#[derive(Debug)]
pub struct MappedStorageBuffer<T> {
    buffer: StorageBuffer,
    data: Vec<T>,
    dirty: bool,
}

impl<T> MappedStorageBuffer<T>
where
    T: Pod,
{
    pub fn new(
        backend: &mut dyn Backend,
        label: impl ToString,
        data: Vec<T>,
    ) -> Self {
        let label = label.to_string();

        log::debug!(
            "Creating mapped storage buffer `{label}`; ty={}, len={}",
            any::type_name::<T>(),
            data.len(),
        );

        let buffer = StorageBuffer::new(backend, label, Self::size_of(&data));

        Self {
            buffer,
            data,
            dirty: true,
        }
    }

    pub fn handle(&self) -> BufferHandle {
        self.buffer.handle()
    }

    /// Uploads the data, if it's been modified.
    pub fn flush(&mut self, backend: &mut dyn Backend) {
        if !mem::take(&mut self.dirty) {
            return;
        }

        let size = Self::size_of(&self.data);

        if size > self.buffer.size() {
            self.buffer.resize(backend, size);
        }

        if !self.data.is_empty() {
            backend.write_buffer(
                self.buffer.handle(),
                0,
                bytemuck::cast_slice(&self.data),
            );
        }
    }

    fn size_of(data: &[T]) -> u64 {
        // Empty bindings are not allowed, so there's always room for at
        // least one item
        (mem::size_of::<T>() * data.len().max(1)) as u64
    }
}

impl<T> Deref for MappedStorageBuffer<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> DerefMut for MappedStorageBuffer<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dirty = true;

        &mut self.data
    }
}
