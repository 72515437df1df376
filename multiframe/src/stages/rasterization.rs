use glam::{vec3, vec4, UVec2, Vec3, Vec4};
use log::{debug, info};

use crate::{
    gpu, Backend, BumpType, Camera, DrawCall, Drawable, Geometry, Kernels,
    Macros, MaskTable, Material, MeshData, Observed,
    OmnidirectionalShadowmap, PointLight, ProgramHandle, Projection,
    RenderPass, RenderState, RenderToggles, Result, Scene, ShaderLibrary,
    Texture, TextureHandle, TextureType, TransparencyMasks, Viewport,
};

const GROUND_HALF_EXTENT: f32 = 50.0;

const MATERIAL_TEXTURES: [(TextureType, u32); 5] = [
    (TextureType::Diffuse, gpu::RasterPassParams::HAS_DIFFUSE),
    (TextureType::Specular, gpu::RasterPassParams::HAS_SPECULAR),
    (TextureType::Emissive, gpu::RasterPassParams::HAS_EMISSIVE),
    (TextureType::Opacity, gpu::RasterPassParams::HAS_OPACITY),
    (TextureType::Bump, gpu::RasterPassParams::HAS_BUMP),
];

/// Handles of the buffers produced by [`RasterizationStage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GBufferHandles {
    pub diffuse: TextureHandle,
    pub specular: TextureHandle,
    pub normal: TextureHandle,
    pub face_normal: TextureHandle,
    pub world_pos: TextureHandle,
    pub reflect_mask: TextureHandle,

    /// Visibility of the sub-frame's point light; always 1 when the stage
    /// renders no point shadows
    pub shadow: TextureHandle,

    pub depth: TextureHandle,
}

/// Everything [`RasterizationStage`] reacts to; a change of any of these
/// restarts the sub-frame accumulation.
#[derive(Clone, Copy, Debug)]
pub struct RasterizationInputs<'a> {
    pub camera: &'a Observed<Camera>,
    pub viewport: &'a Observed<Viewport>,
    pub projection: &'a Observed<Projection>,
    pub scene: &'a Observed<Scene>,
    pub toggles: &'a Observed<RenderToggles>,
    pub kernels: &'a Observed<Kernels>,
}

impl RasterizationInputs<'_> {
    pub fn has_changed(&self) -> bool {
        self.camera.has_changed()
            || self.viewport.has_changed()
            || self.projection.has_changed()
            || self.scene.has_changed()
            || self.toggles.has_changed()
            || self.kernels.has_changed()
    }
}

/// Geometry pass filling the G-buffer, one sub-frame at a time.
///
/// Each sub-frame is rendered with a different sample of the anti-aliasing,
/// depth-of-field and shadow kernels; once `multi_frame_count` sub-frames
/// have been rendered, the stage stops drawing until any of its inputs
/// changes.
///
/// Shadows of the preset's point light come from an omnidirectional
/// shadowmap rendered from the sub-frame's jittered light position; partially
/// transparent surfaces are rendered with stochastic transparency, so that
/// both converge as sub-frames get accumulated.
///
/// The same stage renders the reflective shadow map, driven by the light's
/// capabilities instead of the camera's (and with no point shadows).
#[derive(Debug)]
pub struct RasterizationStage {
    name: &'static str,
    diffuse: Texture,
    specular: Texture,
    normal: Texture,
    face_normal: Texture,
    world_pos: Texture,
    reflect_mask: Texture,
    shadow: Texture,
    depth: Texture,
    fallback: Texture,
    masks: TransparencyMasks,
    point_shadowmap: Option<OmnidirectionalShadowmap>,
    ground: Option<Drawable>,
    ground_height: f32,
    model_program: ProgramHandle,
    z_only_program: ProgramHandle,
    current_frame: u32,
    frame_light_position: Vec3,
    always_process: bool,
}

impl RasterizationStage {
    pub fn new(
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
        name: &'static str,
        size: UVec2,
        point_shadows: bool,
    ) -> Result<Self> {
        info!("Initializing stage: {name}");

        let target = |label: &str, format| {
            Texture::builder(format!("{name}_{label}"))
                .with_size(size)
                .with_format(format)
                .with_usage(wgpu::TextureUsages::RENDER_ATTACHMENT)
                .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
        };

        let diffuse = target("diffuse", wgpu::TextureFormat::Rgba8Unorm)
            .build(backend);

        let specular = target("specular", wgpu::TextureFormat::Rgba8Unorm)
            .build(backend);

        let normal =
            target("normal", wgpu::TextureFormat::Rgba16Float).build(backend);

        let face_normal =
            target("face_normal", wgpu::TextureFormat::Rgba16Float)
                .build(backend);

        let world_pos = target("world_pos", wgpu::TextureFormat::Rgba32Float)
            .build(backend);

        let reflect_mask = target("reflect_mask", wgpu::TextureFormat::R8Unorm)
            .build(backend);

        let shadow =
            target("shadow", wgpu::TextureFormat::R8Unorm).build(backend);

        let depth =
            target("depth", wgpu::TextureFormat::Depth32Float).build(backend);

        // Bound in place of the textures a material doesn't have
        let fallback = Texture::builder(format!("{name}_fallback"))
            .with_size(UVec2::ONE)
            .with_format(wgpu::TextureFormat::Rgba8Unorm)
            .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
            .with_usage(wgpu::TextureUsages::COPY_DST)
            .build(backend);

        backend.write_texture(fallback.handle(), &[255; 4]);

        let masks = TransparencyMasks::new(backend, name);

        let point_shadowmap = if point_shadows {
            Some(OmnidirectionalShadowmap::new(backend, shaders, name)?)
        } else {
            None
        };

        let model_program = shaders.render_program(
            backend,
            &format!("{name}_model"),
            "rasterization/model.wgsl",
            "model_vs",
            Some("model_fs"),
            Macros::new(),
        )?;

        let z_only_program = shaders.render_program(
            backend,
            &format!("{name}_z_only"),
            "rasterization/model.wgsl",
            "model_vs",
            Some("depth_fs"),
            Macros::new(),
        )?;

        Ok(Self {
            name,
            diffuse,
            specular,
            normal,
            face_normal,
            world_pos,
            reflect_mask,
            shadow,
            depth,
            fallback,
            masks,
            point_shadowmap,
            ground: None,
            ground_height: 0.0,
            model_program,
            z_only_program,
            current_frame: 0,
            frame_light_position: Vec3::ZERO,
            always_process: true,
        })
    }

    pub fn handles(&self) -> GBufferHandles {
        GBufferHandles {
            diffuse: self.diffuse.handle(),
            specular: self.specular.handle(),
            normal: self.normal.handle(),
            face_normal: self.face_normal.handle(),
            world_pos: self.world_pos.handle(),
            reflect_mask: self.reflect_mask.handle(),
            shadow: self.shadow.handle(),
            depth: self.depth.handle(),
        }
    }

    /// Returns the atlas of point shadows, if the stage renders them.
    pub fn point_shadowmap(&self) -> Option<&OmnidirectionalShadowmap> {
        self.point_shadowmap.as_ref()
    }

    /// Returns the light position of the sub-frame rendered most recently,
    /// i.e. the preset's one shifted by the shadow kernel.
    pub fn frame_light_position(&self) -> Vec3 {
        self.frame_light_position
    }

    /// Returns the mesh of the ground plane, once it's been built.
    pub fn ground(&self) -> Option<&Drawable> {
        self.ground.as_ref()
    }

    pub fn size(&self) -> UVec2 {
        self.depth.size()
    }

    /// Returns the 1-based index of the sub-frame rendered most recently.
    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// Returns whether the stage is still accumulating sub-frames; once it
    /// stops, downstream stages can skip their work too.
    pub fn always_process(&self) -> bool {
        self.always_process
    }

    /// Renders the next sub-frame; returns whether anything was drawn.
    pub fn process(
        &mut self,
        backend: &mut dyn Backend,
        inputs: &RasterizationInputs,
    ) -> bool {
        if inputs.viewport.has_changed() {
            self.resize(backend, inputs.viewport.size());
        }

        self.current_frame = self.current_frame.saturating_add(1);

        if inputs.has_changed() {
            self.current_frame = 1;
            self.always_process = true;
        }

        if self.current_frame > inputs.toggles.multi_frame_count {
            self.always_process = false;
            return false;
        }

        let ground_height = inputs.scene.preset.ground_height;

        if self.ground.is_none() || self.ground_height != ground_height {
            self.rebuild_ground(backend, ground_height);
        }

        self.render(backend, inputs);

        true
    }

    fn resize(&mut self, backend: &mut dyn Backend, size: UVec2) {
        for texture in [
            &mut self.diffuse,
            &mut self.specular,
            &mut self.normal,
            &mut self.face_normal,
            &mut self.world_pos,
            &mut self.reflect_mask,
            &mut self.shadow,
            &mut self.depth,
        ] {
            texture.resize(backend, size);
        }
    }

    fn rebuild_ground(&mut self, backend: &mut dyn Backend, height: f32) {
        debug!("Rebuilding ground plane: {}; height={height}", self.name);

        if let Some(ground) = self.ground.take() {
            backend.destroy_mesh(ground.mesh());
        }

        self.ground_height = height;

        self.ground = Some(Drawable::new(
            backend,
            &format!("{}_ground", self.name),
            MeshData::ground_plane(height, GROUND_HALF_EXTENT),
        ));
    }

    fn render(
        &mut self,
        backend: &mut dyn Backend,
        inputs: &RasterizationInputs,
    ) {
        let scene = inputs.scene.get();
        let preset = &scene.preset;
        let kernels = inputs.kernels.get();
        let frame = self.current_frame;

        let aa = Kernels::sample(&kernels.antialiasing, frame);
        let ndc_offset = 2.0 * aa / inputs.viewport.size().as_vec2();

        let coc_point = if inputs.toggles.use_dof {
            Kernels::sample(&kernels.depth_of_field, frame) * preset.focal_point
        } else {
            Default::default()
        };

        let light_offset =
            Kernels::sample(&kernels.shadow, frame) * preset.light_max_shift;

        let light_position = preset.light_position
            + vec3(light_offset.x, 0.0, light_offset.y);

        self.frame_light_position = light_position;

        let transparency = vec4(
            preset.alpha,
            MaskTable::masks_offset(frame),
            preset.near_far.y,
            0.0,
        );

        if let Some(point_shadowmap) = &self.point_shadowmap {
            point_shadowmap.render(
                backend,
                PointLight {
                    position: light_position,
                    near_far: preset.near_far,
                },
                scene,
                self.ground.as_ref(),
                &self.masks,
                self.fallback.handle(),
                transparency,
            );
        }

        let mut base_params = gpu::RasterPassParams {
            view: inputs.camera.view(),
            projection: inputs
                .projection
                .projection(inputs.viewport.aspect_ratio()),
            camera_eye: inputs.camera.eye().extend(1.0),
            light_position: light_position.extend(1.0),
            ground_color: preset.ground_color.extend(1.0),
            jitter: vec4(ndc_offset.x, ndc_offset.y, coc_point.x, coc_point.y),
            material: vec4(0.0, preset.focal_dist, 0.0, 0.0),
            transparency,
            flags: Default::default(),
        };

        if self.point_shadowmap.is_some() {
            base_params.flags.x = gpu::RasterPassParams::HAS_POINT_SHADOW;
        }

        let mut prepass = RenderPass::new(format!("{}_prepass", self.name))
            .with_depth(self.depth.handle(), Some(1.0));

        let mut geometry = RenderPass::new(format!("{}_geometry", self.name))
            .with_color(
                self.diffuse.handle(),
                Some(preset.ground_color.extend(1.0)),
            )
            .with_color(self.specular.handle(), Some(Vec4::ZERO))
            .with_color(self.normal.handle(), Some(Vec4::ZERO))
            .with_color(self.face_normal.handle(), Some(Vec4::ZERO))
            .with_color(self.world_pos.handle(), Some(Vec4::splat(f32::MAX)))
            .with_color(self.reflect_mask.handle(), Some(Vec4::ZERO))
            .with_color(self.shadow.handle(), Some(Vec4::ONE))
            .with_depth(self.depth.handle(), None);

        for (&material_id, drawables) in &scene.drawables {
            let material = scene.material(material_id);
            let params =
                Self::material_params(base_params, material, preset.bump_type);

            for drawable in drawables {
                prepass.push(
                    self.draw(self.z_only_program, drawable, material, &params)
                        .with_state(RenderState::DEPTH_PREPASS),
                );

                geometry.push(
                    self.draw(self.model_program, drawable, material, &params)
                        .with_state(RenderState::AFTER_DEPTH_PREPASS),
                );
            }
        }

        if let Some(ground) = &self.ground {
            let mut params = base_params;

            params.flags.x |= gpu::RasterPassParams::IS_GROUND;
            params.transparency.x = 1.0;

            if inputs.toggles.use_reflections {
                params.flags.x |= gpu::RasterPassParams::USE_REFLECTIONS;
            }

            // Not part of the pre-pass, so it has to write its own depth
            geometry.push(
                self.draw(
                    self.model_program,
                    ground,
                    &Material::default(),
                    &params,
                )
                .with_state(RenderState::OPAQUE),
            );
        }

        backend.render(&prepass);
        backend.render(&geometry);
    }

    fn material_params(
        mut params: gpu::RasterPassParams,
        material: &Material,
        bump_type: BumpType,
    ) -> gpu::RasterPassParams {
        let bump_type = if material.has_texture(TextureType::Bump) {
            bump_type
        } else {
            BumpType::None
        };

        params.material.x = material.specular_factor;
        params.material.z = bump_type.as_f32();

        for (ty, flag) in MATERIAL_TEXTURES {
            if material.has_texture(ty) {
                params.flags.x |= flag;
            }
        }

        params
    }

    fn draw(
        &self,
        program: ProgramHandle,
        drawable: &Drawable,
        material: &Material,
        params: &gpu::RasterPassParams,
    ) -> DrawCall {
        let texture = |ty| {
            material
                .texture(ty)
                .unwrap_or(self.fallback.handle())
                .bind_sampled()
        };

        let point_shadow = self
            .point_shadowmap
            .as_ref()
            .map(|shadowmap| shadowmap.distance())
            .unwrap_or(self.fallback.handle());

        DrawCall::new(program, Geometry::Mesh(drawable.mesh()))
            .bind([
                texture(TextureType::Diffuse),
                texture(TextureType::Specular),
                texture(TextureType::Emissive),
                texture(TextureType::Opacity),
                texture(TextureType::Bump),
                self.masks.masks().bind_readable(),
                self.masks.noise().bind_readable(),
                point_shadow.bind_readable(),
            ])
            .with_params(params)
    }
}
