use std::mem;

use glam::{uvec3, uvec4, vec4, Mat4, UVec2};
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::{
    gpu, utils, Backend, BufferHandle, ComputePass, GBufferHandles, Macros,
    MappedStorageBuffer, ProgramHandle, Result, ShaderLibrary, StorageBuffer,
};

/// Number of columns of the grid VPLs are sampled on; the grid has
/// `VPL_COUNT / GRID_COLUMNS` rows, matching the RSM's 4:1 aspect ratio.
pub const VPL_GRID_COLUMNS: u32 = 64;

const WORKGROUP_SIZE: u32 = 64;

/// Matrix mapping clip-space xy from `[-1, 1]` into texture coordinates
/// `[0, 1]`, with y pointing down; depth is already `[0, 1]`.
pub const SHADOW_BIAS: Mat4 = Mat4::from_cols(
    vec4(0.5, 0.0, 0.0, 0.0),
    vec4(0.0, -0.5, 0.0, 0.0),
    vec4(0.0, 0.0, 1.0, 0.0),
    vec4(0.5, 0.5, 0.0, 1.0),
);

/// Reflective shadow map the VPLs are extracted from.
#[derive(Clone, Copy, Debug)]
pub struct VplSource {
    pub gbuffer: GBufferHandles,
    pub size: UVec2,
    pub view_projection: Mat4,

    /// World-space area covered by a single VPL's sample
    pub texel_area: f32,
}

/// Turns the reflective shadow map into a fixed-size buffer of virtual point
/// lights.
#[derive(Debug)]
pub struct VplProcessor {
    vpls: StorageBuffer,
    permutation: MappedStorageBuffer<u32>,
    program: ProgramHandle,
    biased_shadow_transform: Mat4,
}

impl VplProcessor {
    pub fn new(
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
        seed: u64,
    ) -> Result<Self> {
        info!("Initializing stage: vpl_processor");

        let vpls = StorageBuffer::new(
            backend,
            "vpl_buffer",
            (gpu::VPL_COUNT * mem::size_of::<gpu::Vpl>()) as u64,
        );

        let mut permutation: Vec<u32> = (0..gpu::VPL_COUNT as u32).collect();

        permutation.shuffle(&mut StdRng::seed_from_u64(seed));

        let permutation =
            MappedStorageBuffer::new(backend, "vpl_permutation", permutation);

        let program = shaders.compute_program(
            backend,
            "vpl_processor",
            "gi/vpl_processor.wgsl",
            "main",
            Macros::new(),
        )?;

        Ok(Self {
            vpls,
            permutation,
            program,
            biased_shadow_transform: Mat4::IDENTITY,
        })
    }

    pub fn vpls(&self) -> BufferHandle {
        self.vpls.handle()
    }

    /// Returns the fixed permutation VPL slots are shuffled with.
    pub fn permutation(&self) -> &[u32] {
        &self.permutation
    }

    /// Returns the transform from world space into the light's shadow map
    /// texture space.
    pub fn biased_shadow_transform(&self) -> Mat4 {
        self.biased_shadow_transform
    }

    pub fn process(
        &mut self,
        backend: &mut dyn Backend,
        rsm: &VplSource,
        light_intensity: f32,
        shuffle: bool,
    ) {
        self.biased_shadow_transform = SHADOW_BIAS * rsm.view_projection;
        self.permutation.flush(backend);

        let params = gpu::VplPassParams {
            rsm: uvec4(
                rsm.size.x,
                rsm.size.y,
                VPL_GRID_COLUMNS,
                shuffle as u32,
            ),
            light: vec4(light_intensity, rsm.texel_area, 0.0, 0.0),
        };

        let workgroups = uvec3(
            utils::ceil_div(gpu::VPL_COUNT as u32, WORKGROUP_SIZE),
            1,
            1,
        );

        backend.compute(
            &ComputePass::new("vpl_processor", self.program, workgroups)
                .bind([
                    rsm.gbuffer.diffuse.bind_readable(),
                    rsm.gbuffer.normal.bind_readable(),
                    rsm.gbuffer.world_pos.bind_readable(),
                    self.permutation.handle().bind_readable(),
                    self.vpls.handle().bind_writable(),
                ])
                .with_params(&params),
        );
    }
}
