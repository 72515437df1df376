use std::ops::Range;

use glam::{uvec2, uvec3, uvec4, vec4, Mat4, UVec2};
use log::info;

use crate::{
    gpu, utils, Backend, BufferHandle, ComputePass, Macros, ProgramHandle,
    Result, ShaderLibrary, StorageBuffer, TextureHandle,
};

/// Camera-side inputs of [`ClusteredShading::process()`].
#[derive(Clone, Debug)]
pub struct ClusteringInputs {
    pub view: Mat4,
    pub projection_inverse: Mat4,
    pub depth: TextureHandle,
    pub z_far: f32,
    pub vpl_range: Range<u32>,
    pub clamping: f32,
}

/// Screen-space light culling: the screen is split into tiles and each tile
/// gets the list of VPLs whose influence sphere touches the tile's depth
/// bounds.
#[derive(Debug)]
pub struct ClusteredShading {
    light_list_ids: StorageBuffer,
    light_lists: StorageBuffer,
    light_list_counter: StorageBuffer,
    program: ProgramHandle,
    viewport_size: UVec2,
}

impl ClusteredShading {
    pub fn new(
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
        viewport_size: UVec2,
    ) -> Result<Self> {
        info!("Initializing stage: clustered_shading");

        let tiles = Self::tile_count(viewport_size);

        let light_list_ids = StorageBuffer::new(
            backend,
            "light_list_ids",
            Self::light_list_ids_size(tiles),
        );

        let light_lists = StorageBuffer::new(
            backend,
            "light_lists",
            Self::light_lists_size(tiles),
        );

        let light_list_counter =
            StorageBuffer::new(backend, "light_list_counter", 4);

        let program = shaders.compute_program(
            backend,
            "light_clustering",
            "clustering/light_clustering.wgsl",
            "main",
            Macros::new(),
        )?;

        Ok(Self {
            light_list_ids,
            light_lists,
            light_list_counter,
            program,
            viewport_size,
        })
    }

    /// Returns the number of tiles along each axis.
    pub fn tiles(viewport_size: UVec2) -> UVec2 {
        uvec2(
            utils::ceil_div(viewport_size.x, gpu::CLUSTER_TILE_SIZE),
            utils::ceil_div(viewport_size.y, gpu::CLUSTER_TILE_SIZE),
        )
    }

    pub fn tile_count(viewport_size: UVec2) -> u32 {
        let tiles = Self::tiles(viewport_size);

        tiles.x * tiles.y
    }

    /// Returns the per-tile `(offset, count)` pairs.
    pub fn light_list_ids(&self) -> BufferHandle {
        self.light_list_ids.handle()
    }

    /// Returns the compacted VPL indices `light_list_ids` point into.
    pub fn light_lists(&self) -> BufferHandle {
        self.light_lists.handle()
    }

    pub fn viewport_size(&self) -> UVec2 {
        self.viewport_size
    }

    pub fn resize(&mut self, backend: &mut dyn Backend, viewport_size: UVec2) {
        let tiles = Self::tile_count(viewport_size);

        self.light_list_ids
            .resize(backend, Self::light_list_ids_size(tiles));

        self.light_lists
            .resize(backend, Self::light_lists_size(tiles));

        self.viewport_size = viewport_size;
    }

    pub fn process(
        &self,
        backend: &mut dyn Backend,
        vpls: BufferHandle,
        inputs: &ClusteringInputs,
    ) {
        let tiles = Self::tiles(self.viewport_size);

        backend.clear_buffer(self.light_list_counter.handle());

        let params = gpu::ClusteringPassParams {
            view: inputs.view,
            projection_inverse: inputs.projection_inverse,
            viewport: uvec4(
                self.viewport_size.x,
                self.viewport_size.y,
                tiles.x,
                tiles.y,
            ),
            vpls: uvec4(
                inputs.vpl_range.start,
                inputs.vpl_range.end,
                gpu::MAX_LIGHTS_PER_TILE,
                0,
            ),
            light: vec4(inputs.z_far, inputs.clamping, 0.0, 0.0),
        };

        backend.compute(
            &ComputePass::new(
                "light_clustering",
                self.program,
                uvec3(tiles.x, tiles.y, 1),
            )
            .bind([
                vpls.bind_readable(),
                inputs.depth.bind_readable(),
                self.light_list_ids.handle().bind_writable(),
                self.light_lists.handle().bind_writable(),
                self.light_list_counter.handle().bind_writable(),
            ])
            .with_params(&params),
        );
    }

    fn light_list_ids_size(tiles: u32) -> u64 {
        tiles as u64 * 8
    }

    fn light_lists_size(tiles: u32) -> u64 {
        tiles as u64 * gpu::MAX_LIGHTS_PER_TILE as u64 * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Event, RecordingBackend, Texture};

    fn inputs(backend: &mut RecordingBackend, size: UVec2) -> ClusteringInputs {
        let depth = Texture::builder("depth")
            .with_size(size)
            .with_format(wgpu::TextureFormat::Depth32Float)
            .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
            .build(backend);

        ClusteringInputs {
            view: Mat4::IDENTITY,
            projection_inverse: Mat4::IDENTITY,
            depth: depth.handle(),
            z_far: 64.0,
            vpl_range: 0..1024,
            clamping: 0.001,
        }
    }

    #[test]
    fn tiles() {
        assert_eq!(uvec2(32, 32), ClusteredShading::tiles(uvec2(1024, 1024)));
        assert_eq!(uvec2(60, 34), ClusteredShading::tiles(uvec2(1920, 1080)));
        assert_eq!(uvec2(1, 1), ClusteredShading::tiles(uvec2(1, 1)));
    }

    #[test]
    fn process() {
        let mut backend = RecordingBackend::new();
        let vpls = StorageBuffer::new(&mut backend, "vpls", 48 * 1024);
        let inputs = inputs(&mut backend, uvec2(1920, 1080));

        let target = ClusteredShading::new(
            &mut backend,
            &ShaderLibrary::new(),
            uvec2(1920, 1080),
        )
        .unwrap();

        assert_eq!(
            60 * 34 * 256 * 4,
            backend.buffer(target.light_lists()).size
        );

        backend.take_events();
        target.process(&mut backend, vpls.handle(), &inputs);

        let events = backend.take_events();

        assert!(matches!(events[0], Event::BufferCleared { .. }));

        assert_eq!(
            Event::Computed {
                label: "light_clustering".into(),
                workgroups: uvec3(60, 34, 1),
            },
            events[1]
        );
    }

    #[test]
    fn resize() {
        let mut backend = RecordingBackend::new();

        let mut target = ClusteredShading::new(
            &mut backend,
            &ShaderLibrary::new(),
            uvec2(64, 64),
        )
        .unwrap();

        target.resize(&mut backend, uvec2(100, 64));

        assert_eq!(uvec2(100, 64), target.viewport_size());
        assert_eq!(4 * 2 * 8, backend.buffer(target.light_list_ids()).size);
    }
}
