use glam::{UVec2, Vec3};
use log::{debug, info};

use crate::{
    utils, Backend, Camera, DeferredShadingStage, FrameAccumulationStage,
    GBufferHandles, GiInputs, GiStage, Kernels, Observed, PainterConfig,
    Projection, PropertyDescriptor, PropertyValue, RasterizationInputs,
    RasterizationStage, RenderToggles, Result, Scene, ShaderLibrary,
    ShadingInputs, TextureHandle, Viewport, FULL_HD,
};

/// Top-level driver: owns every stage and runs them once per displayed
/// frame.
///
/// Stages render into a virtual viewport which follows the host's viewport,
/// unless full-HD rendering is enabled.
#[derive(Debug)]
pub struct MultiFramePainter {
    shaders: ShaderLibrary,
    full_hd: bool,
    seed: u64,
    camera: Observed<Camera>,
    viewport: Observed<Viewport>,
    virtual_viewport: Observed<Viewport>,
    projection: Observed<Projection>,
    scene: Observed<Scene>,
    toggles: Observed<RenderToggles>,
    kernels: Observed<Kernels>,
    rasterization: RasterizationStage,
    gi: GiStage,
    deferred_shading: DeferredShadingStage,
    frame_accumulation: FrameAccumulationStage,
}

impl MultiFramePainter {
    pub fn new(
        backend: &mut dyn Backend,
        config: PainterConfig,
    ) -> Result<Self> {
        info!("Initializing painter");

        let shaders = match &config.shader_dir {
            Some(dir) => ShaderLibrary::with_override_dir(dir),
            None => ShaderLibrary::new(),
        };

        let size = config.virtual_viewport_size();
        let scene = Scene::default();
        let preset = &scene.preset;

        let camera = Camera::new(preset.cam_eye, preset.cam_center);

        let mut projection = Projection::default();

        projection.set_z_near(preset.near_far.x);
        projection.set_z_far(preset.near_far.y);

        let kernels = Kernels::generate(
            config.toggles.multi_frame_count as usize,
            config.seed,
        );

        let rasterization = RasterizationStage::new(
            backend, &shaders, "gbuffer", size, true,
        )?;

        let gi = GiStage::new(
            backend,
            &shaders,
            size,
            &projection,
            preset,
            config.gi.clone(),
            config.seed,
        )?;

        let deferred_shading = DeferredShadingStage::new(
            backend,
            &shaders,
            size,
            rasterization.handles(),
            gi.handles(),
            gi.shadowmap().vsm(),
        )?;

        let frame_accumulation = FrameAccumulationStage::new(
            backend,
            &shaders,
            size,
            deferred_shading.shaded_frame(),
        )?;

        Ok(Self {
            shaders,
            full_hd: config.full_hd,
            seed: config.seed,
            camera: Observed::new(camera),
            viewport: Observed::new(Viewport::from_size(config.viewport_size)),
            virtual_viewport: Observed::new(Viewport::from_size(size)),
            projection: Observed::new(projection),
            scene: Observed::new(scene),
            toggles: Observed::new(config.toggles),
            kernels: Observed::new(kernels),
            rasterization,
            gi,
            deferred_shading,
            frame_accumulation,
        })
    }

    /// Renders the next sub-frame.
    pub fn paint(&mut self, backend: &mut dyn Backend) -> Result<()> {
        if !self.full_hd && self.viewport.has_changed() {
            self.virtual_viewport.set(*self.viewport);
        }

        utils::measure("rasterization", || {
            self.rasterization.process(
                backend,
                &RasterizationInputs {
                    camera: &self.camera,
                    viewport: &self.virtual_viewport,
                    projection: &self.projection,
                    scene: &self.scene,
                    toggles: &self.toggles,
                    kernels: &self.kernels,
                },
            )
        });

        self.gi.process(
            backend,
            &self.shaders,
            &GiInputs {
                camera: &self.camera,
                viewport: &self.virtual_viewport,
                projection: &self.projection,
                scene: &self.scene,
                gbuffer: self.rasterization.handles(),
            },
        )?;

        utils::measure("deferred_shading", || {
            self.deferred_shading.process(
                backend,
                &ShadingInputs {
                    camera: &self.camera,
                    viewport: &self.virtual_viewport,
                    projection: &self.projection,
                    light_direction: self.gi.light_direction(),
                    light_intensity: self.gi.params().light_intensity,
                    biased_shadow_transform: self
                        .gi
                        .vpl_processor()
                        .biased_shadow_transform(),
                },
            );
        });

        utils::measure("frame_accumulation", || {
            self.frame_accumulation.process(
                backend,
                &self.virtual_viewport,
                self.rasterization.current_frame(),
                self.rasterization.always_process(),
            )
        });

        backend.finish_frame();

        self.virtual_viewport.acknowledge();
        self.viewport.acknowledge();
        self.camera.acknowledge();
        self.projection.acknowledge();
        self.scene.acknowledge();
        self.toggles.acknowledge();
        self.kernels.acknowledge();

        Ok(())
    }

    /// Returns the accumulated image.
    pub fn output(&self) -> TextureHandle {
        self.frame_accumulation.accumulation()
    }

    /// Returns the most recent shaded sub-frame.
    pub fn shaded_frame(&self) -> TextureHandle {
        self.deferred_shading.shaded_frame()
    }

    pub fn gbuffer(&self) -> GBufferHandles {
        self.rasterization.handles()
    }

    pub fn rasterization(&self) -> &RasterizationStage {
        &self.rasterization
    }

    /// Returns the 1-based index of the sub-frame rendered most recently.
    pub fn current_frame(&self) -> u32 {
        self.rasterization.current_frame()
    }

    /// Returns whether the image is still being refined.
    pub fn is_accumulating(&self) -> bool {
        self.rasterization.always_process()
    }

    pub fn resize(&mut self, size: UVec2) {
        self.viewport.set(Viewport::from_size(size));
    }

    pub fn viewport(&self) -> &Observed<Viewport> {
        &self.viewport
    }

    /// Returns the viewport stages actually render at.
    pub fn virtual_viewport(&self) -> &Observed<Viewport> {
        &self.virtual_viewport
    }

    pub fn full_hd(&self) -> bool {
        self.full_hd
    }

    pub fn set_full_hd(&mut self, full_hd: bool) {
        self.full_hd = full_hd;

        if full_hd {
            self.virtual_viewport.set(Viewport::from_size(FULL_HD));
        } else {
            // Picked up by the next `paint()`
            self.viewport.mark_changed();
        }
    }

    pub fn camera(&self) -> &Observed<Camera> {
        &self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera.set(camera);
    }

    pub fn projection(&self) -> &Observed<Projection> {
        &self.projection
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection.set(projection);
    }

    pub fn toggles(&self) -> &Observed<RenderToggles> {
        &self.toggles
    }

    pub fn set_toggles(&mut self, toggles: RenderToggles) {
        if toggles.multi_frame_count != self.toggles.multi_frame_count {
            self.kernels.set(Kernels::generate(
                toggles.multi_frame_count as usize,
                self.seed,
            ));
        }

        self.toggles.set(toggles);
    }

    pub fn scene(&self) -> &Observed<Scene> {
        &self.scene
    }

    /// Replaces the scene and applies its preset: camera, clipping planes
    /// and light placement.
    pub fn set_scene(&mut self, scene: Scene) {
        let preset = &scene.preset;

        debug!("Applying preset: {preset:?}");

        self.camera
            .set(Camera::new(preset.cam_eye, preset.cam_center));

        self.projection.update(|projection| {
            projection.set_z_near(preset.near_far.x);
            projection.set_z_far(preset.near_far.y);
        });

        self.gi.apply_preset(preset);
        self.scene.replace(scene);
    }

    pub fn gi(&self) -> &GiStage {
        &self.gi
    }

    pub fn gi_mut(&mut self) -> &mut GiStage {
        &mut self.gi
    }

    pub fn properties(&self) -> &'static [PropertyDescriptor] {
        self.gi.properties()
    }

    pub fn property(&self, name: &str) -> Result<PropertyValue> {
        self.gi.property(name)
    }

    pub fn set_property(
        &mut self,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        self.gi.set_property(name, value)
    }

    /// Returns where the light currently is.
    pub fn light_position(&self) -> Vec3 {
        self.gi.light_camera().eye()
    }

    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    /// Rebuilds every program whose source may be tweaked at runtime.
    pub fn reload_shaders(&mut self, backend: &mut dyn Backend) {
        self.gi.reload_shaders(backend);
    }
}
