mod params;
mod properties;

use glam::{uvec2, uvec3, uvec4, vec2, vec4, Mat4, UVec2, Vec2, Vec3};
use log::{debug, info};

pub use self::params::*;
pub use self::properties::*;
use crate::{
    gpu, utils, Backend, Camera, ClusteredShading, ClusteringInputs,
    ComputePass, DrawCall, GBufferHandles, Geometry, ImperfectShadowmap,
    IsmSettings, Kernels, Macros, Observed, Preset, ProgramHandle, Projection,
    RasterizationInputs, RasterizationStage, RenderPass, RenderState,
    RenderToggles, Result, Scene, ShaderLibrary, ShaderVariants, Shadowmap,
    Texture, TextureHandle, Viewport, VplProcessor, VplSource,
};

/// Size of the reflective shadow map.
pub const LIGHT_VIEWPORT_SIZE: UVec2 = uvec2(1024, 256);

/// Height of the light's orthographic view volume, in world units.
pub const LIGHT_PROJECTION_HEIGHT: f32 = 5.0;

/// Handles of the buffers produced by [`GiStage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GiHandles {
    /// Raw result of final gathering
    pub gi: TextureHandle,

    /// `gi` blurred horizontally
    pub gi_blur_temp: TextureHandle,

    /// `gi` blurred in both directions; this is what shading should use
    pub gi_blur_final: TextureHandle,
}

/// Main-view inputs of [`GiStage::process()`].
#[derive(Clone, Copy, Debug)]
pub struct GiInputs<'a> {
    pub camera: &'a Observed<Camera>,
    pub viewport: &'a Observed<Viewport>,
    pub projection: &'a Observed<Projection>,
    pub scene: &'a Observed<Scene>,
    pub gbuffer: GBufferHandles,
}

/// Indirect lighting: RSM -> VPLs -> ISMs -> light clustering -> final
/// gathering -> blur.
///
/// Owns the light (sun) and its capabilities; the light camera's eye is
/// recomputed out of the sun's position on every frame.
#[derive(Debug)]
pub struct GiStage {
    params: GiParams,
    light_camera: Observed<Camera>,
    light_viewport: Observed<Viewport>,
    light_projection: Observed<Projection>,
    rsm_toggles: Observed<RenderToggles>,
    rsm_kernels: Observed<Kernels>,
    rsm: RasterizationStage,
    shadowmap: Shadowmap,
    vpl_processor: VplProcessor,
    ism: ImperfectShadowmap,
    clustered_shading: ClusteredShading,
    gi: Texture,
    gi_blur_temp: Texture,
    gi_blur_final: Texture,
    fg_variants: ShaderVariants<FinalGatheringVariant>,
    fg_program: Option<ProgramHandle>,
    blur_programs: Option<[ProgramHandle; 2]>,
    blur_dirty: bool,
}

impl GiStage {
    pub fn new(
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
        viewport_size: UVec2,
        projection: &Projection,
        preset: &Preset,
        params: GiParams,
        seed: u64,
    ) -> Result<Self> {
        info!("Initializing stage: gi");

        let light_camera =
            Camera::new(preset.light_position, preset.light_center);

        let light_projection = Projection::orthographic(
            LIGHT_PROJECTION_HEIGHT,
            projection.z_near(),
            projection.z_far(),
        );

        let rsm_toggles = RenderToggles {
            use_reflections: false,
            use_dof: false,
            multi_frame_count: u32::MAX,
        };

        let rsm = RasterizationStage::new(
            backend,
            shaders,
            "rsm",
            LIGHT_VIEWPORT_SIZE,
            false,
        )?;

        let shadowmap = Shadowmap::new(backend, shaders)?;
        let vpl_processor = VplProcessor::new(backend, shaders, seed)?;
        let ism = ImperfectShadowmap::new(backend, shaders)?;

        let clustered_shading =
            ClusteredShading::new(backend, shaders, viewport_size)?;

        let gi = Texture::builder("gi")
            .with_size(viewport_size)
            .with_format(wgpu::TextureFormat::R32Uint)
            .with_usage(wgpu::TextureUsages::STORAGE_BINDING)
            .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
            .build(backend);

        let blur_target = |label: &str| {
            Texture::builder(label)
                .with_size(viewport_size)
                .with_format(wgpu::TextureFormat::R32Uint)
                .with_usage(wgpu::TextureUsages::RENDER_ATTACHMENT)
                .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
        };

        let gi_blur_temp = blur_target("gi_blur_temp").build(backend);
        let gi_blur_final = blur_target("gi_blur_final").build(backend);

        Ok(Self {
            params,
            light_camera: Observed::new(light_camera),
            light_viewport: Observed::new(Viewport::from_size(
                LIGHT_VIEWPORT_SIZE,
            )),
            light_projection: Observed::new(light_projection),
            rsm_toggles: Observed::new(rsm_toggles),
            rsm_kernels: Observed::new(Kernels::default()),
            rsm,
            shadowmap,
            vpl_processor,
            ism,
            clustered_shading,
            gi,
            gi_blur_temp,
            gi_blur_final,
            fg_variants: Default::default(),
            fg_program: None,
            blur_programs: None,
            blur_dirty: true,
        })
    }

    pub fn handles(&self) -> GiHandles {
        GiHandles {
            gi: self.gi.handle(),
            gi_blur_temp: self.gi_blur_temp.handle(),
            gi_blur_final: self.gi_blur_final.handle(),
        }
    }

    pub fn params(&self) -> &GiParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut GiParams {
        &mut self.params
    }

    /// Replaces all parameters at once; the final-gathering shader is
    /// re-selected on the next frame.
    pub fn set_params(&mut self, params: GiParams) {
        self.params = params;
        self.params.mark_fg_dirty();
    }

    pub fn light_camera(&self) -> &Observed<Camera> {
        &self.light_camera
    }

    pub fn light_viewport(&self) -> &Observed<Viewport> {
        &self.light_viewport
    }

    pub fn light_projection(&self) -> &Observed<Projection> {
        &self.light_projection
    }

    /// Returns the light's view-projection matrix.
    pub fn light_view_projection(&self) -> Mat4 {
        self.light_projection
            .projection(self.light_viewport.aspect_ratio())
            * self.light_camera.view()
    }

    /// Returns the (unnormalized) direction light travels in.
    pub fn light_direction(&self) -> Vec3 {
        self.light_camera.center() - self.light_camera.eye()
    }

    pub fn rsm(&self) -> &RasterizationStage {
        &self.rsm
    }

    pub fn shadowmap(&self) -> &Shadowmap {
        &self.shadowmap
    }

    pub fn vpl_processor(&self) -> &VplProcessor {
        &self.vpl_processor
    }

    pub fn ism(&self) -> &ImperfectShadowmap {
        &self.ism
    }

    pub fn clustered_shading(&self) -> &ClusteredShading {
        &self.clustered_shading
    }

    /// Returns the final-gathering program currently in use, if it's been
    /// built already.
    pub fn fg_program(&self) -> Option<ProgramHandle> {
        self.fg_program
    }

    /// Returns the number of final-gathering variants compiled so far.
    pub fn fg_variant_count(&self) -> usize {
        self.fg_variants.len()
    }

    pub fn blur_dirty(&self) -> bool {
        self.blur_dirty
    }

    /// Places the light the way preset describes.
    pub fn apply_preset(&mut self, preset: &Preset) {
        self.light_camera.update(|camera| {
            camera.set_eye(preset.light_position);
            camera.set_center(preset.light_center);
        });
    }

    /// Drops every compiled program, so that the next frame rebuilds them
    /// out of freshly-loaded sources.
    pub fn reload_shaders(&mut self, backend: &mut dyn Backend) {
        debug!("Reloading GI shaders");

        self.fg_variants.clear(backend);
        self.fg_program = None;
        self.params.mark_fg_dirty();

        if let Some(programs) = self.blur_programs.take() {
            for program in programs {
                backend.destroy_program(program);
            }
        }

        self.blur_dirty = true;
    }

    pub fn process(
        &mut self,
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
        inputs: &GiInputs,
    ) -> Result<()> {
        if inputs.viewport.has_changed() {
            self.resize(backend, inputs.viewport.size());
        }

        if inputs.projection.has_changed() {
            let (z_near, z_far) =
                (inputs.projection.z_near(), inputs.projection.z_far());

            self.light_projection.update(|projection| {
                projection.set_z_near(z_near);
                projection.set_z_far(z_far);
            });
        }

        if self.params.fg_dirty() || self.fg_program.is_none() {
            self.rebuild_fg_program(backend, shaders)?;
        }

        if self.blur_dirty {
            self.rebuild_blur_programs(backend, shaders)?;
        }

        self.move_sun();

        let view_projection = self.light_view_projection();

        utils::measure("shadowmap", || {
            self.shadowmap.render(
                backend,
                self.light_camera.eye(),
                view_projection,
                inputs.scene,
                self.light_near_far(),
            );
        });

        utils::measure("rsm", || {
            self.rsm.process(
                backend,
                &RasterizationInputs {
                    camera: &self.light_camera,
                    viewport: &self.light_viewport,
                    projection: &self.light_projection,
                    scene: inputs.scene,
                    toggles: &self.rsm_toggles,
                    kernels: &self.rsm_kernels,
                },
            );
        });

        self.light_viewport.acknowledge();

        let texel_area = self.rsm_texel_area();

        utils::measure("vpl_processor", || {
            self.vpl_processor.process(
                backend,
                &VplSource {
                    gbuffer: self.rsm.handles(),
                    size: self.rsm.size(),
                    view_projection,
                    texel_area,
                },
                self.params.light_intensity,
                self.params.shuffle,
            );
        });

        let vpls = self.vpl_processor.vpls();

        utils::measure("ism", || {
            self.ism.process(
                backend,
                inputs.scene,
                vpls,
                &IsmSettings {
                    vpl_range: self.params.vpl_range(),
                    scale_isms: self.params.scale_isms(),
                    points_only_into_scaled: self
                        .params
                        .points_only_into_scaled,
                    tess_factor: self.params.tess_factor,
                    use_push_pull: self.params.use_push_pull,
                    z_far: self.light_projection.z_far(),
                },
            );
        });

        let aspect_ratio = inputs.viewport.aspect_ratio();

        utils::measure("clustered_shading", || {
            self.clustered_shading.process(
                backend,
                vpls,
                &ClusteringInputs {
                    view: inputs.camera.view(),
                    projection_inverse: inputs
                        .projection
                        .projection_inverted(aspect_ratio),
                    depth: inputs.gbuffer.depth,
                    z_far: inputs.projection.z_far(),
                    vpl_range: self.params.vpl_range(),
                    clamping: self.params.vpl_clamping,
                },
            );
        });

        utils::measure("final_gathering", || {
            self.final_gathering(backend, inputs);
        });

        utils::measure("gi_blur", || {
            self.blur(backend, inputs);
        });

        self.light_camera.acknowledge();
        self.light_projection.acknowledge();
        self.rsm_toggles.acknowledge();
        self.rsm_kernels.acknowledge();

        Ok(())
    }

    fn resize(&mut self, backend: &mut dyn Backend, size: UVec2) {
        for texture in
            [&mut self.gi, &mut self.gi_blur_temp, &mut self.gi_blur_final]
        {
            texture.resize(backend, size);
        }

        self.clustered_shading.resize(backend, size);
    }

    fn rebuild_fg_program(
        &mut self,
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
    ) -> Result<()> {
        let variant = self.params.fg_variant();

        let program = self.fg_variants.get_or_build(variant, |variant| {
            shaders.compute_program(
                backend,
                "final_gathering",
                "gi/final_gathering.wgsl",
                "main",
                variant.macros(),
            )
        })?;

        self.fg_program = Some(program);
        self.params.clear_fg_dirty();

        Ok(())
    }

    fn rebuild_blur_programs(
        &mut self,
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
    ) -> Result<()> {
        debug!("Rebuilding GI blur programs");

        let mut build = |label: &str, direction: &str| {
            shaders.render_program(
                backend,
                label,
                "gi/gi_blur.wgsl",
                "fullscreen_vs",
                Some("blur_fs"),
                Macros::new().set("DIRECTION", direction),
            )
        };

        let blur_x = build("gi_blur_x", "vec2<i32>(1, 0)")?;
        let blur_y = build("gi_blur_y", "vec2<i32>(0, 1)")?;

        if let Some(programs) = self.blur_programs.replace([blur_x, blur_y]) {
            for program in programs {
                backend.destroy_program(program);
            }
        }

        self.blur_dirty = false;

        Ok(())
    }

    fn move_sun(&mut self) {
        let eye = self.params.sun.eye(self.light_camera.center());

        self.light_camera.update(|camera| {
            camera.set_eye(eye);
        });

        self.params.sun.advance();
    }

    fn light_near_far(&self) -> Vec2 {
        vec2(self.light_projection.z_near(), self.light_projection.z_far())
    }

    /// Returns the world-space area the light's view volume covers, split
    /// evenly among VPLs.
    fn rsm_texel_area(&self) -> f32 {
        let height = LIGHT_PROJECTION_HEIGHT;
        let width = height * self.light_viewport.aspect_ratio();

        width * height / gpu::VPL_COUNT as f32
    }

    fn final_gathering(&self, backend: &mut dyn Backend, inputs: &GiInputs) {
        // Programs are always built before this is reached
        let Some(program) = self.fg_program else {
            return;
        };

        let size = inputs.viewport.size();
        let tiles = ClusteredShading::tiles(size);
        let range = self.params.vpl_range();

        let params = gpu::FinalGatheringPassParams {
            view: inputs.camera.view(),
            view_projection_inverted: inputs.camera.view_inverted()
                * inputs
                    .projection
                    .projection_inverted(inputs.viewport.aspect_ratio()),
            viewport: uvec4(size.x, size.y, tiles.x, 0),
            vpls: uvec4(range.start, range.end, 0, 0),
            gi: vec4(
                self.light_projection.z_far(),
                self.params.gi_factor,
                self.params.vpl_clamping,
                0.0,
            ),
        };

        let workgroups = uvec3(
            GiParams::fg_groups(size.x),
            GiParams::fg_groups(size.y),
            1,
        );

        backend.compute(
            &ComputePass::new("final_gathering", program, workgroups)
                .bind([
                    inputs.gbuffer.face_normal.bind_readable(),
                    inputs.gbuffer.depth.bind_readable(),
                    self.ism
                        .shadowmap(self.params.use_push_pull)
                        .bind_readable(),
                    self.vpl_processor.vpls().bind_readable(),
                    self.clustered_shading.light_list_ids().bind_readable(),
                    self.clustered_shading.light_lists().bind_readable(),
                    self.gi.handle().bind_writable(),
                ])
                .with_params(&params),
        );
    }

    fn blur(&self, backend: &mut dyn Backend, inputs: &GiInputs) {
        let Some([blur_x, blur_y]) = self.blur_programs else {
            return;
        };

        let size = inputs.viewport.size();

        let params = gpu::BlurPassParams {
            projection_inverse: inputs
                .projection
                .projection_inverted(inputs.viewport.aspect_ratio()),
            viewport: uvec4(size.x, size.y, 0, 0),
        };

        for (label, program, input, output) in [
            ("gi_blur_x", blur_x, &self.gi, &self.gi_blur_temp),
            ("gi_blur_y", blur_y, &self.gi_blur_temp, &self.gi_blur_final),
        ] {
            let pass = RenderPass::new(label)
                .with_color(output.handle(), None)
                .draw(
                    DrawCall::new(program, Geometry::FULLSCREEN_TRIANGLE)
                        .with_state(RenderState::FULLSCREEN)
                        .bind([
                            input.handle().bind_readable(),
                            inputs.gbuffer.face_normal.bind_readable(),
                            inputs.gbuffer.depth.bind_readable(),
                        ])
                        .with_params(&params),
                );

            backend.render(&pass);
        }
    }
}
