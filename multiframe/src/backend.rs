mod recording;
mod wgpu_backend;

use bytemuck::Pod;
use glam::{UVec2, UVec3, UVec4, Vec4};

pub use self::recording::*;
pub use self::wgpu_backend::*;
use crate::{gpu, Result};

macro_rules! handle {
    ($name:ident) => {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
        )]
        pub struct $name(u32);

        impl $name {
            pub fn new(id: u32) -> Self {
                Self(id)
            }

            pub fn get(self) -> u32 {
                self.0
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(TextureHandle);
handle!(BufferHandle);
handle!(MeshHandle);
handle!(ProgramHandle);

impl TextureHandle {
    /// Binds the entire texture for `textureLoad()`.
    pub fn bind_readable(self) -> Binding {
        Binding::Texture {
            texture: self,
            mip_level: None,
        }
    }

    /// Binds a single mip level for `textureLoad()`.
    pub fn bind_readable_level(self, mip_level: u32) -> Binding {
        Binding::Texture {
            texture: self,
            mip_level: Some(mip_level),
        }
    }

    /// Binds the texture together with a filtering sampler; takes two slots.
    pub fn bind_sampled(self) -> Binding {
        Binding::SampledTexture { texture: self }
    }

    pub fn bind_writable(self) -> Binding {
        self.bind_writable_level(0)
    }

    pub fn bind_writable_level(self, mip_level: u32) -> Binding {
        Binding::StorageTexture {
            texture: self,
            mip_level,
        }
    }
}

impl BufferHandle {
    pub fn bind_uniform(self) -> Binding {
        Binding::UniformBuffer { buffer: self }
    }

    pub fn bind_readable(self) -> Binding {
        Binding::StorageBuffer {
            buffer: self,
            read_only: true,
        }
    }

    pub fn bind_writable(self) -> Binding {
        Binding::StorageBuffer {
            buffer: self,
            read_only: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureDescriptor {
    pub label: String,
    pub size: UVec2,
    pub format: wgpu::TextureFormat,
    pub mip_levels: u32,
    pub usage: wgpu::TextureUsages,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BufferDescriptor {
    pub label: String,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgramDescriptor {
    pub label: String,

    /// Final WGSL source, with includes and macros already resolved.
    pub source: String,

    pub stages: ProgramStages,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramStages {
    Compute {
        entry_point: &'static str,
    },
    Render {
        vertex: &'static str,
        fragment: Option<&'static str>,
    },
}

/// Fixed-function state of a single draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub cull: Option<wgpu::Face>,
}

impl RenderState {
    pub const OPAQUE: Self = Self {
        depth_test: true,
        depth_write: true,
        depth_compare: wgpu::CompareFunction::Less,
        cull: None,
    };

    pub const DEPTH_PREPASS: Self = Self::OPAQUE;

    /// Color pass following a depth pre-pass: fragments must match the depth
    /// that is already there, and there's nothing new to write.
    pub const AFTER_DEPTH_PREPASS: Self = Self {
        depth_test: true,
        depth_write: false,
        depth_compare: wgpu::CompareFunction::LessEqual,
        cull: None,
    };

    pub const FULLSCREEN: Self = Self {
        depth_test: false,
        depth_write: false,
        depth_compare: wgpu::CompareFunction::Always,
        cull: None,
    };
}

impl Default for RenderState {
    fn default() -> Self {
        Self::OPAQUE
    }
}

/// Resource attached to a pass.
///
/// Bindings occupy consecutive slots of group 0, in the order given;
/// [`Binding::SampledTexture`] occupies two (texture, then sampler). Pass
/// parameters, if any, live at group 1, binding 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Binding {
    Texture {
        texture: TextureHandle,
        mip_level: Option<u32>,
    },
    SampledTexture {
        texture: TextureHandle,
    },
    StorageTexture {
        texture: TextureHandle,
        mip_level: u32,
    },
    UniformBuffer {
        buffer: BufferHandle,
    },
    StorageBuffer {
        buffer: BufferHandle,
        read_only: bool,
    },
}

impl Binding {
    pub fn slots(&self) -> u32 {
        match self {
            Binding::SampledTexture { .. } => 2,
            _ => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Geometry {
    Mesh(MeshHandle),

    /// Vertices generated by the vertex shader out of `vertex_index`.
    Procedural { vertices: u32 },
}

impl Geometry {
    pub const FULLSCREEN_TRIANGLE: Self = Self::Procedural { vertices: 3 };
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub state: RenderState,
    pub geometry: Geometry,
    pub bindings: Vec<Binding>,
    pub params: Vec<u8>,
}

impl DrawCall {
    pub fn new(program: ProgramHandle, geometry: Geometry) -> Self {
        Self {
            program,
            state: Default::default(),
            geometry,
            bindings: Default::default(),
            params: Default::default(),
        }
    }

    pub fn with_state(mut self, state: RenderState) -> Self {
        self.state = state;
        self
    }

    pub fn bind<const N: usize>(mut self, items: [Binding; N]) -> Self {
        self.bindings.extend(items);
        self
    }

    pub fn with_params<P>(mut self, params: &P) -> Self
    where
        P: Pod,
    {
        self.params = bytemuck::bytes_of(params).to_vec();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorTarget {
    pub texture: TextureHandle,
    pub clear: Option<Vec4>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthTarget {
    pub texture: TextureHandle,
    pub clear: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderPass {
    pub label: String,
    pub color_targets: Vec<ColorTarget>,
    pub depth_target: Option<DepthTarget>,

    /// Viewport as (x, y, width, height); whole target when missing.
    pub viewport: Option<UVec4>,

    pub draws: Vec<DrawCall>,
}

impl RenderPass {
    pub fn new(label: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            color_targets: Default::default(),
            depth_target: Default::default(),
            viewport: Default::default(),
            draws: Default::default(),
        }
    }

    pub fn with_color(
        mut self,
        texture: TextureHandle,
        clear: Option<Vec4>,
    ) -> Self {
        self.color_targets.push(ColorTarget { texture, clear });
        self
    }

    pub fn with_depth(
        mut self,
        texture: TextureHandle,
        clear: Option<f32>,
    ) -> Self {
        self.depth_target = Some(DepthTarget { texture, clear });
        self
    }

    pub fn with_viewport(mut self, viewport: UVec4) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn draw(mut self, draw: DrawCall) -> Self {
        self.draws.push(draw);
        self
    }

    pub fn push(&mut self, draw: DrawCall) {
        self.draws.push(draw);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComputePass {
    pub label: String,
    pub program: ProgramHandle,
    pub bindings: Vec<Binding>,
    pub params: Vec<u8>,
    pub workgroups: UVec3,
}

impl ComputePass {
    pub fn new(
        label: impl ToString,
        program: ProgramHandle,
        workgroups: UVec3,
    ) -> Self {
        Self {
            label: label.to_string(),
            program,
            bindings: Default::default(),
            params: Default::default(),
            workgroups,
        }
    }

    pub fn bind<const N: usize>(mut self, items: [Binding; N]) -> Self {
        self.bindings.extend(items);
        self
    }

    pub fn with_params<P>(mut self, params: &P) -> Self
    where
        P: Pod,
    {
        self.params = bytemuck::bytes_of(params).to_vec();
        self
    }
}

/// Narrow interface over the GPU API.
///
/// Resources are identified by copyable handles; resizing a texture or a
/// buffer keeps its handle valid, so consumers that captured a handle at
/// build time keep seeing the current allocation.
///
/// Work is recorded in submission order and flushed by
/// [`Backend::finish_frame()`].
pub trait Backend {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle;

    fn resize_texture(&mut self, texture: TextureHandle, size: UVec2);

    /// Uploads the whole mip 0 of given texture, tightly packed.
    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]);

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferHandle;

    /// Reallocates the buffer; previous contents are lost.
    fn resize_buffer(&mut self, buffer: BufferHandle, size: u64);

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Zeroes the buffer at this point of the frame.
    fn clear_buffer(&mut self, buffer: BufferHandle);

    fn create_mesh(
        &mut self,
        label: &str,
        vertices: &[gpu::Vertex],
        indices: &[u32],
    ) -> MeshHandle;

    /// Releases the mesh; its handle must not be drawn afterwards.
    fn destroy_mesh(&mut self, mesh: MeshHandle);

    fn create_program(
        &mut self,
        desc: &ProgramDescriptor,
    ) -> Result<ProgramHandle>;

    fn destroy_program(&mut self, program: ProgramHandle);

    fn render(&mut self, pass: &RenderPass);

    fn compute(&mut self, pass: &ComputePass);

    fn finish_frame(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_slots() {
        let texture = TextureHandle::new(3);

        assert_eq!(1, texture.bind_readable().slots());
        assert_eq!(2, texture.bind_sampled().slots());
        assert_eq!(1, BufferHandle::new(0).bind_writable().slots());
    }

    #[test]
    fn draw_call_builder() {
        let params = gpu::AccumulationPassParams {
            frame: UVec4::new(7, 0, 0, 0),
        };

        let draw = DrawCall::new(
            ProgramHandle::new(1),
            Geometry::FULLSCREEN_TRIANGLE,
        )
        .with_state(RenderState::FULLSCREEN)
        .bind([TextureHandle::new(0).bind_readable()])
        .with_params(&params);

        assert_eq!(RenderState::FULLSCREEN, draw.state);
        assert_eq!(1, draw.bindings.len());
        assert_eq!(16, draw.params.len());
        assert_eq!(7, draw.params[0]);
    }
}
