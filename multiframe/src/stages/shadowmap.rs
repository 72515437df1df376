use glam::{uvec2, vec4, Mat4, UVec2, Vec2, Vec3};
use log::info;

use crate::{
    gpu, Backend, DrawCall, Geometry, Macros, ProgramHandle, RenderPass,
    RenderState, Result, Scene, ShaderLibrary, Texture, TextureHandle,
};

pub const SHADOWMAP_SIZE: UVec2 = uvec2(512, 512);

/// Variance shadow map of a directional light.
///
/// Fixed-size and re-rendered on every call; whoever owns it decides when
/// that's necessary.
#[derive(Debug)]
pub struct Shadowmap {
    vsm: Texture,
    depth: Texture,
    program: ProgramHandle,
}

impl Shadowmap {
    pub fn new(
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
    ) -> Result<Self> {
        info!("Initializing stage: shadowmap");

        let vsm = Texture::builder("shadowmap_vsm")
            .with_size(SHADOWMAP_SIZE)
            .with_format(wgpu::TextureFormat::Rgba32Float)
            .with_usage(wgpu::TextureUsages::RENDER_ATTACHMENT)
            .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
            .build(backend);

        let depth = Texture::builder("shadowmap_depth")
            .with_size(SHADOWMAP_SIZE)
            .with_format(wgpu::TextureFormat::Depth32Float)
            .with_usage(wgpu::TextureUsages::RENDER_ATTACHMENT)
            .build(backend);

        let program = shaders.render_program(
            backend,
            "shadowmap",
            "rasterization/shadowmap.wgsl",
            "shadowmap_vs",
            Some("shadowmap_fs"),
            Macros::new(),
        )?;

        Ok(Self {
            vsm,
            depth,
            program,
        })
    }

    /// Returns the moments texture: (depth, depth^2, 1, 0).
    pub fn vsm(&self) -> TextureHandle {
        self.vsm.handle()
    }

    pub fn depth(&self) -> TextureHandle {
        self.depth.handle()
    }

    pub fn render(
        &self,
        backend: &mut dyn Backend,
        eye: Vec3,
        view_projection: Mat4,
        scene: &Scene,
        near_far: Vec2,
    ) {
        let params = gpu::ShadowmapPassParams {
            transform: view_projection,
            light_position: eye.extend(near_far.y),
        };

        let mut pass = RenderPass::new("shadowmap")
            .with_color(
                self.vsm.handle(),
                Some(vec4(f32::MAX, f32::MAX, 1.0, 0.0)),
            )
            .with_depth(self.depth.handle(), Some(1.0));

        for drawable in scene.drawables() {
            pass.push(
                DrawCall::new(self.program, Geometry::Mesh(drawable.mesh()))
                    .with_state(RenderState::OPAQUE)
                    .with_params(&params),
            );
        }

        backend.render(&pass);
    }
}
