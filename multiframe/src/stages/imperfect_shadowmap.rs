use std::ops::Range;

use glam::{uvec3, uvec4, vec4, UVec2, Vec3, Vec4};
use log::{debug, info};

use crate::{
    gpu, utils, Backend, BufferHandle, ComputePass, Macros,
    MappedStorageBuffer, Observed, ProgramHandle, Result, Scene,
    ShaderLibrary, StorageBuffer, Texture, TextureHandle,
};

/// Roughly how many points get splatted into a single VPL's cell.
pub const ISM_POINTS_PER_VPL: u32 = 8192;

/// Upper bound for the subdivision level of a single triangle.
pub const MAX_TESS_LEVEL: u32 = 32;

/// Upper bound for the number of points generated by subdividing triangles.
pub const MAX_TESSELLATED_POINTS: usize = 1 << 22;

const SPLAT_WORKGROUP_SIZE: u32 = 64;
const CLEAR_WORKGROUP_SIZE: u32 = 64;
const CLEAR_GROUPS_X: u32 = 1024;
const IMAGE_WORKGROUP_SIZE: u32 = 8;

/// Per-frame settings of [`ImperfectShadowmap::process()`].
#[derive(Clone, Debug, PartialEq)]
pub struct IsmSettings {
    pub vpl_range: Range<u32>,
    pub scale_isms: bool,
    pub points_only_into_scaled: bool,
    pub tess_factor: f32,
    pub use_push_pull: bool,
    pub z_far: f32,
}

/// Scene approximated with points; the first `vertex_points` come straight
/// from mesh vertices, the rest from subdivided triangles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Vec4>,
    pub vertex_points: u32,
}

impl PointCloud {
    pub fn build(scene: &Scene, tess_factor: f32) -> Self {
        let mut points: Vec<_> = scene
            .drawables()
            .flat_map(|drawable| &drawable.data().vertices)
            .map(|vertex| vertex.position().extend(1.0))
            .collect();

        let vertex_points = points.len() as u32;
        let mut tessellated = 0;

        'outer: for drawable in scene.drawables() {
            for [a, b, c] in drawable.data().triangles() {
                let (a, b, c) = (a.position(), b.position(), c.position());
                let level = Self::tess_level(a, b, c, tess_factor);

                for i in 0..=level {
                    for j in 0..=(level - i) {
                        let k = level - i - j;

                        // Corners are already there, as vertex points
                        if i == level || j == level || k == level {
                            continue;
                        }

                        if tessellated >= MAX_TESSELLATED_POINTS {
                            break 'outer;
                        }

                        let point = (a * i as f32 + b * j as f32 + c * k as f32)
                            / level as f32;

                        points.push(point.extend(1.0));
                        tessellated += 1;
                    }
                }
            }
        }

        Self {
            points,
            vertex_points,
        }
    }

    /// Subdivision level of a triangle: its longest edge gets split into
    /// `ceil(length * tess_factor)` segments.
    pub fn tess_level(a: Vec3, b: Vec3, c: Vec3, tess_factor: f32) -> u32 {
        let longest = a.distance(b).max(b.distance(c)).max(c.distance(a));
        let level = (longest * tess_factor.max(0.0)).ceil();

        (level as u32).clamp(1, MAX_TESS_LEVEL)
    }

    pub fn len(&self) -> u32 {
        self.points.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Imperfect shadow maps: one low-resolution paraboloid depth map per VPL,
/// splatted out of a point cloud into a shared atlas.
#[derive(Debug)]
pub struct ImperfectShadowmap {
    points: MappedStorageBuffer<Vec4>,
    vertex_points: u32,
    tess_factor: Option<f32>,
    soft_render: StorageBuffer,
    depth: Texture,
    pull: Texture,
    push: Texture,
    push_pull_result: Texture,
    clear_program: ProgramHandle,
    splat_program: ProgramHandle,
    resolve_program: ProgramHandle,
    seed_program: ProgramHandle,
    pull_program: ProgramHandle,
    push_program: ProgramHandle,
}

impl ImperfectShadowmap {
    pub fn new(
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
    ) -> Result<Self> {
        info!("Initializing stage: imperfect_shadowmap");

        let atlas = UVec2::splat(gpu::ISM_ATLAS_SIZE);

        let points =
            MappedStorageBuffer::new(backend, "ism_points", Vec::new());

        let soft_render = StorageBuffer::new(
            backend,
            "ism_soft_render",
            (atlas.x * atlas.y) as u64 * 4,
        );

        let depth = Texture::builder("ism_depth")
            .with_size(atlas)
            .with_format(wgpu::TextureFormat::R32Float)
            .with_usage(wgpu::TextureUsages::STORAGE_BINDING)
            .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
            .build(backend);

        let mut pyramid = |label: &str, mip_levels| {
            Texture::builder(label)
                .with_size(atlas)
                .with_format(wgpu::TextureFormat::Rg32Float)
                .with_mip_levels(mip_levels)
                .with_usage(wgpu::TextureUsages::STORAGE_BINDING)
                .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
                .build(backend)
        };

        let pull = pyramid("ism_pull", gpu::ISM_PUSH_PULL_LEVELS);
        let push = pyramid("ism_push", gpu::ISM_PUSH_PULL_LEVELS);
        let push_pull_result = pyramid("ism_push_pull_result", 1);

        let mut compute = |label: &str, path: &str, entry_point| {
            shaders.compute_program(
                backend,
                label,
                path,
                entry_point,
                Macros::new(),
            )
        };

        let clear_program = compute("ism_clear", "ism/clear.wgsl", "main")?;
        let splat_program = compute("ism_splat", "ism/splat.wgsl", "main")?;

        let resolve_program =
            compute("ism_resolve", "ism/resolve.wgsl", "main")?;

        let seed_program =
            compute("ism_pull_seed", "ism/push_pull.wgsl", "seed")?;

        let pull_program = compute("ism_pull", "ism/push_pull.wgsl", "pull")?;
        let push_program = compute("ism_push", "ism/push_pull.wgsl", "push")?;

        Ok(Self {
            points,
            vertex_points: 0,
            tess_factor: None,
            soft_render,
            depth,
            pull,
            push,
            push_pull_result,
            clear_program,
            splat_program,
            resolve_program,
            seed_program,
            pull_program,
            push_program,
        })
    }

    /// Returns the raw, splatted depth atlas.
    pub fn depth(&self) -> TextureHandle {
        self.depth.handle()
    }

    /// Returns the hole-filled depth atlas.
    pub fn push_pull_result(&self) -> TextureHandle {
        self.push_pull_result.handle()
    }

    /// Returns the atlas final gathering should look at.
    pub fn shadowmap(&self, use_push_pull: bool) -> TextureHandle {
        if use_push_pull {
            self.push_pull_result()
        } else {
            self.depth()
        }
    }

    pub fn point_count(&self) -> u32 {
        self.points.len() as u32
    }

    pub fn process(
        &mut self,
        backend: &mut dyn Backend,
        scene: &Observed<Scene>,
        vpls: BufferHandle,
        settings: &IsmSettings,
    ) {
        if scene.has_changed() || self.tess_factor != Some(settings.tess_factor)
        {
            self.rebuild_points(backend, scene, settings.tess_factor);
        }

        self.clear(backend);
        self.splat(backend, vpls, settings);
        self.resolve(backend);

        if settings.use_push_pull {
            self.push_pull(backend);
        }
    }

    fn rebuild_points(
        &mut self,
        backend: &mut dyn Backend,
        scene: &Scene,
        tess_factor: f32,
    ) {
        let cloud = PointCloud::build(scene, tess_factor);

        debug!(
            "Rebuilding ISM point cloud; points={}, vertex_points={}, \
             tess_factor={tess_factor}",
            cloud.len(),
            cloud.vertex_points,
        );

        *self.points = cloud.points;
        self.vertex_points = cloud.vertex_points;
        self.tess_factor = Some(tess_factor);
        self.points.flush(backend);
    }

    fn clear(&self, backend: &mut dyn Backend) {
        let texels = gpu::ISM_ATLAS_SIZE * gpu::ISM_ATLAS_SIZE;
        let groups = utils::ceil_div(texels, CLEAR_WORKGROUP_SIZE);

        backend.compute(
            &ComputePass::new(
                "ism_clear",
                self.clear_program,
                uvec3(
                    CLEAR_GROUPS_X,
                    utils::ceil_div(groups, CLEAR_GROUPS_X),
                    1,
                ),
            )
            .bind([self.soft_render.handle().bind_writable()]),
        );
    }

    fn splat(
        &self,
        backend: &mut dyn Backend,
        vpls: BufferHandle,
        settings: &IsmSettings,
    ) {
        let points = self.point_count();
        let active = settings.vpl_range.len() as u32;

        if points == 0 || active == 0 {
            return;
        }

        let stride = utils::ceil_div(points, ISM_POINTS_PER_VPL).max(1);
        let points_per_vpl = utils::ceil_div(points, stride);

        let mut flags = 0;

        if settings.scale_isms {
            flags |= gpu::IsmPassParams::SCALE_ISMS;
        }

        if settings.points_only_into_scaled {
            flags |= gpu::IsmPassParams::POINTS_ONLY_INTO_SCALED;
        }

        let params = gpu::IsmPassParams {
            vpls: uvec4(
                settings.vpl_range.start,
                settings.vpl_range.end,
                points,
                self.vertex_points,
            ),
            config: uvec4(stride, flags, 0, 0),
            light: vec4(settings.z_far, 0.0, 0.0, 0.0),
        };

        backend.compute(
            &ComputePass::new(
                "ism_splat",
                self.splat_program,
                uvec3(
                    utils::ceil_div(points_per_vpl, SPLAT_WORKGROUP_SIZE),
                    active,
                    1,
                ),
            )
            .bind([
                self.points.handle().bind_readable(),
                vpls.bind_readable(),
                self.soft_render.handle().bind_writable(),
            ])
            .with_params(&params),
        );
    }

    fn resolve(&self, backend: &mut dyn Backend) {
        let groups = utils::ceil_div(gpu::ISM_ATLAS_SIZE, IMAGE_WORKGROUP_SIZE);

        backend.compute(
            &ComputePass::new(
                "ism_resolve",
                self.resolve_program,
                uvec3(groups, groups, 1),
            )
            .bind([
                self.soft_render.handle().bind_readable(),
                self.depth.handle().bind_writable(),
            ]),
        );
    }

    fn push_pull(&self, backend: &mut dyn Backend) {
        let levels = gpu::ISM_PUSH_PULL_LEVELS;
        let last = levels - 1;

        let pass = |backend: &mut dyn Backend,
                    label: &str,
                    program,
                    level: u32,
                    bindings: [crate::Binding; 3]| {
            let size = gpu::ISM_ATLAS_SIZE >> level;
            let groups = utils::ceil_div(size, IMAGE_WORKGROUP_SIZE);

            let params = gpu::PushPullPassParams {
                level: uvec4(level, size, 0, 0),
            };

            backend.compute(
                &ComputePass::new(label, program, uvec3(groups, groups, 1))
                    .bind(bindings)
                    .with_params(&params),
            );
        };

        // The seed and pull passes never read their third binding, but
        // binding it anyway keeps a single layout for the whole program
        let pull = self.pull.handle();
        let push = self.push.handle();

        pass(
            backend,
            "ism_pull_seed",
            self.seed_program,
            0,
            [
                self.depth.handle().bind_readable(),
                pull.bind_writable_level(0),
                self.depth.handle().bind_readable(),
            ],
        );

        for level in 1..levels {
            pass(
                backend,
                "ism_pull",
                self.pull_program,
                level,
                [
                    pull.bind_readable_level(level - 1),
                    pull.bind_writable_level(level),
                    pull.bind_readable_level(level - 1),
                ],
            );
        }

        for level in (0..last).rev() {
            let coarse = if level + 1 == last {
                pull.bind_readable_level(last)
            } else {
                push.bind_readable_level(level + 1)
            };

            let output = if level == 0 {
                self.push_pull_result.handle().bind_writable()
            } else {
                push.bind_writable_level(level)
            };

            pass(
                backend,
                "ism_push",
                self.push_program,
                level,
                [pull.bind_readable_level(level), output, coarse],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;
    use crate::{Drawable, MaterialId, MeshData, RecordingBackend};

    fn triangle(backend: &mut RecordingBackend, size: f32) -> Scene {
        let vertex = |x: f32, z: f32| {
            gpu::Vertex::new(vec3(x, 0.0, z), Vec3::Y, Default::default())
        };

        let mut scene = Scene::default();

        scene.drawables.insert(
            MaterialId(0),
            vec![Drawable::new(
                backend,
                "triangle",
                MeshData {
                    vertices: vec![
                        vertex(0.0, 0.0),
                        vertex(size, 0.0),
                        vertex(0.0, size),
                    ],
                    indices: vec![0, 1, 2],
                },
            )],
        );

        scene
    }

    #[test]
    fn tess_level() {
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Z);

        assert_eq!(2, PointCloud::tess_level(a, b, c, 1.0));
        assert_eq!(3, PointCloud::tess_level(a, b, c, 2.0));
        assert_eq!(1, PointCloud::tess_level(a, b, c, 0.0));
        assert_eq!(MAX_TESS_LEVEL, PointCloud::tess_level(a, b, c, 1000.0));
    }

    #[test]
    fn point_cloud() {
        let mut backend = RecordingBackend::new();
        let scene = triangle(&mut backend, 1.0);

        // Longest edge is sqrt(2), so level = ceil(1.41 * 2.0) = 3, which
        // yields 10 barycentric points, 3 of which are corners
        let target = PointCloud::build(&scene, 2.0);

        assert_eq!(3, target.vertex_points);
        assert_eq!(3 + 7, target.len());

        for point in &target.points[3..] {
            assert!(point.x >= 0.0 && point.z >= 0.0);
            assert!(point.x + point.z <= 1.0 + 1e-6);
        }

        let target = PointCloud::build(&scene, 0.0);

        assert_eq!(3, target.len());
    }

    #[test]
    fn push_pull_passes() {
        let mut backend = RecordingBackend::new();
        let mut scene = Observed::new(triangle(&mut backend, 1.0));
        let vpls = StorageBuffer::new(&mut backend, "vpls", 48 * 1024);

        let mut target =
            ImperfectShadowmap::new(&mut backend, &ShaderLibrary::new())
                .unwrap();

        let mut settings = IsmSettings {
            vpl_range: 0..1024,
            scale_isms: false,
            points_only_into_scaled: false,
            tess_factor: 2.0,
            use_push_pull: true,
            z_far: 64.0,
        };

        target.process(&mut backend, &scene, vpls.handle(), &settings);

        assert_eq!(vec![uvec3(1024, 64, 1)], backend.dispatches("ism_clear"));
        assert_eq!(vec![uvec3(1, 1024, 1)], backend.dispatches("ism_splat"));
        assert_eq!(1, backend.dispatches("ism_pull_seed").len());
        assert_eq!(6, backend.dispatches("ism_pull").len());

        assert_eq!(
            vec![
                uvec3(8, 8, 1),
                uvec3(16, 16, 1),
                uvec3(32, 32, 1),
                uvec3(64, 64, 1),
                uvec3(128, 128, 1),
                uvec3(256, 256, 1),
            ],
            backend.dispatches("ism_push"),
        );

        scene.acknowledge();
        backend.take_events();

        settings.use_push_pull = false;
        settings.vpl_range = 100..200;
        target.process(&mut backend, &scene, vpls.handle(), &settings);

        assert!(backend.dispatches("ism_push").is_empty());
        assert_eq!(vec![uvec3(1, 100, 1)], backend.dispatches("ism_splat"));
        assert_eq!(target.depth(), target.shadowmap(false));

        // Neither the scene nor the factor changed, so the points stay
        assert!(!backend
            .events()
            .iter()
            .any(|event| matches!(event, crate::Event::BufferWritten { .. })));
    }

    #[test]
    fn point_cloud_follows_tess_factor() {
        let mut backend = RecordingBackend::new();
        let mut scene = Observed::new(triangle(&mut backend, 1.0));
        let vpls = StorageBuffer::new(&mut backend, "vpls", 48 * 1024);

        let mut target =
            ImperfectShadowmap::new(&mut backend, &ShaderLibrary::new())
                .unwrap();

        let mut settings = IsmSettings {
            vpl_range: 0..1024,
            scale_isms: true,
            points_only_into_scaled: true,
            tess_factor: 0.0,
            use_push_pull: false,
            z_far: 64.0,
        };

        target.process(&mut backend, &scene, vpls.handle(), &settings);

        assert_eq!(3, target.point_count());

        scene.acknowledge();
        settings.tess_factor = 2.0;
        target.process(&mut backend, &scene, vpls.handle(), &settings);

        assert_eq!(10, target.point_count());
    }

    #[test]
    fn empty_scene_skips_splatting() {
        let mut backend = RecordingBackend::new();
        let scene = Observed::new(Scene::default());
        let vpls = StorageBuffer::new(&mut backend, "vpls", 48 * 1024);

        let mut target =
            ImperfectShadowmap::new(&mut backend, &ShaderLibrary::new())
                .unwrap();

        target.process(
            &mut backend,
            &scene,
            vpls.handle(),
            &IsmSettings {
                vpl_range: 0..1024,
                scale_isms: false,
                points_only_into_scaled: false,
                tess_factor: 2.0,
                use_push_pull: true,
                z_far: 64.0,
            },
        );

        assert!(backend.dispatches("ism_splat").is_empty());
        assert_eq!(1, backend.dispatches("ism_resolve").len());
    }
}
