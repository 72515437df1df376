use glam::{Mat4, UVec2, Vec3};
use log::info;

use crate::{
    gpu, Backend, Camera, DrawCall, GBufferHandles, Geometry, GiHandles,
    Macros, Observed, ProgramHandle, Projection, RenderPass, RenderState,
    Result, ShaderLibrary, Texture, TextureHandle, Viewport,
};

/// Per-frame inputs of [`DeferredShadingStage::process()`].
#[derive(Clone, Copy, Debug)]
pub struct ShadingInputs<'a> {
    pub camera: &'a Observed<Camera>,
    pub viewport: &'a Observed<Viewport>,
    pub projection: &'a Observed<Projection>,
    pub light_direction: Vec3,
    pub light_intensity: f32,
    pub biased_shadow_transform: Mat4,
}

/// Combines the G-buffer, blurred GI and the light's shadow terms into the
/// shaded sub-frame.
///
/// Direct light is attenuated both by the variance shadow map of the GI
/// light and by the G-buffer's point shadow, the latter being the one that
/// gets softened across sub-frames.
#[derive(Debug)]
pub struct DeferredShadingStage {
    shaded_frame: Texture,
    program: ProgramHandle,
    gbuffer: GBufferHandles,
    gi: TextureHandle,
    shadowmap: TextureHandle,
}

impl DeferredShadingStage {
    pub fn new(
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
        size: UVec2,
        gbuffer: GBufferHandles,
        gi: GiHandles,
        shadowmap: TextureHandle,
    ) -> Result<Self> {
        info!("Initializing stage: deferred_shading");

        let shaded_frame = Texture::builder("shaded_frame")
            .with_size(size)
            .with_format(wgpu::TextureFormat::Rgba16Float)
            .with_usage(wgpu::TextureUsages::RENDER_ATTACHMENT)
            .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
            .build(backend);

        let program = shaders.render_program(
            backend,
            "deferred_shading",
            "shading/deferred_shading.wgsl",
            "fullscreen_vs",
            Some("deferred_shading_fs"),
            Macros::new(),
        )?;

        Ok(Self {
            shaded_frame,
            program,
            gbuffer,
            gi: gi.gi_blur_final,
            shadowmap,
        })
    }

    pub fn shaded_frame(&self) -> TextureHandle {
        self.shaded_frame.handle()
    }

    pub fn process(
        &mut self,
        backend: &mut dyn Backend,
        inputs: &ShadingInputs,
    ) {
        if inputs.viewport.has_changed() {
            self.shaded_frame.resize(backend, inputs.viewport.size());
        }

        let aspect_ratio = inputs.viewport.aspect_ratio();

        let params = gpu::DeferredShadingPassParams {
            view_projection_inverted: inputs.camera.view_inverted()
                * inputs.projection.projection_inverted(aspect_ratio),
            biased_shadow_transform: inputs.biased_shadow_transform,
            camera_eye: inputs.camera.eye().extend(1.0),
            light_direction: inputs
                .light_direction
                .extend(inputs.light_intensity),
        };

        let pass = RenderPass::new("deferred_shading")
            .with_color(self.shaded_frame.handle(), None)
            .draw(
                DrawCall::new(self.program, Geometry::FULLSCREEN_TRIANGLE)
                    .with_state(RenderState::FULLSCREEN)
                    .bind([
                        self.gbuffer.diffuse.bind_readable(),
                        self.gbuffer.specular.bind_readable(),
                        self.gbuffer.normal.bind_readable(),
                        self.gbuffer.depth.bind_readable(),
                        self.gbuffer.shadow.bind_readable(),
                        self.gi.bind_readable(),
                        self.shadowmap.bind_readable(),
                    ])
                    .with_params(&params),
            );

        backend.render(&pass);
    }
}
