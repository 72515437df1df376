use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::sync::Arc;

use derivative::Derivative;
use glam::{vec2, vec3, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{gpu, Backend, MeshHandle, TextureHandle};

pub type MaterialMap = BTreeMap<MaterialId, Material>;
pub type DrawablesMap = BTreeMap<MaterialId, Vec<Drawable>>;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub struct MaterialId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureType {
    Diffuse,
    Specular,
    Emissive,
    Opacity,
    Bump,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub textures: BTreeMap<TextureType, TextureHandle>,
    pub specular_factor: f32,
}

impl Material {
    pub fn with_texture(
        mut self,
        ty: TextureType,
        texture: TextureHandle,
    ) -> Self {
        self.textures.insert(ty, texture);
        self
    }

    pub fn texture(&self, ty: TextureType) -> Option<TextureHandle> {
        self.textures.get(&ty).copied()
    }

    pub fn has_texture(&self, ty: TextureType) -> bool {
        self.textures.contains_key(&ty)
    }
}

/// Triangle list kept on the host, next to its uploaded version.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<gpu::Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangles(&self) -> impl Iterator<Item = [&gpu::Vertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                &self.vertices[tri[0] as usize],
                &self.vertices[tri[1] as usize],
                &self.vertices[tri[2] as usize],
            ]
        })
    }

    /// Square of given half-extent lying flat at `height`, facing up.
    pub fn ground_plane(height: f32, half_extent: f32) -> Self {
        let vertex = |x: f32, z: f32| {
            gpu::Vertex::new(
                vec3(x, height, z),
                Vec3::Y,
                vec2(x, z) / (2.0 * half_extent) + 0.5,
            )
        };

        Self {
            vertices: vec![
                vertex(-half_extent, -half_extent),
                vertex(-half_extent, half_extent),
                vertex(half_extent, half_extent),
                vertex(half_extent, -half_extent),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Drawable {
    mesh: MeshHandle,

    #[derivative(Debug = "ignore")]
    data: Arc<MeshData>,
}

impl Drawable {
    pub fn new(backend: &mut dyn Backend, label: &str, data: MeshData) -> Self {
        let mesh = backend.create_mesh(label, &data.vertices, &data.indices);

        Self {
            mesh,
            data: Arc::new(data),
        }
    }

    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    pub fn data(&self) -> &MeshData {
        &self.data
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BumpType {
    #[default]
    None,
    Height,
    Normal,
}

impl BumpType {
    pub fn as_f32(self) -> f32 {
        match self {
            BumpType::None => 0.0,
            BumpType::Height => 1.0,
            BumpType::Normal => 2.0,
        }
    }
}

/// Per-scene starting point: camera, light and ground setup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub cam_eye: Vec3,
    pub cam_center: Vec3,
    pub near_far: Vec2,
    pub light_position: Vec3,
    pub light_center: Vec3,
    pub light_max_shift: f32,
    pub ground_height: f32,
    pub ground_color: Vec3,
    pub focal_point: f32,
    pub focal_dist: f32,
    pub bump_type: BumpType,

    /// Opacity applied on top of every material's opacity texture
    pub alpha: f32,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            cam_eye: vec3(0.0, 1.5, 6.0),
            cam_center: vec3(0.0, 1.0, 0.0),
            near_far: vec2(0.1, 64.0),
            light_position: vec3(0.0, 8.0, 4.0),
            light_center: Vec3::ZERO,
            light_max_shift: 0.0,
            ground_height: 0.0,
            ground_color: vec3(0.8, 0.8, 0.8),
            focal_point: 0.05,
            focal_dist: 6.0,
            bump_type: BumpType::None,
            alpha: 1.0,
        }
    }
}

/// Everything the host hands over to the painter.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub materials: MaterialMap,
    pub drawables: DrawablesMap,
    pub preset: Preset,
}

impl Scene {
    /// Returns the material of given drawables group.
    ///
    /// Drawables referring to a material that doesn't exist mean the host
    /// handed over a broken scene, hence the panic.
    pub fn material(&self, id: MaterialId) -> &Material {
        self.materials
            .get(&id)
            .unwrap_or_else(|| panic!("Material does not exist: {id:?}"))
    }

    pub fn drawables(&self) -> impl Iterator<Item = &Drawable> + '_ {
        self.drawables.values().flatten()
    }
}

/// Longest kernel [`Kernels::generate()`] produces; longer sub-frame
/// sequences reuse samples.
pub const MAX_KERNEL_SIZE: usize = 4096;

/// Per-sub-frame sample offsets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Kernels {
    /// Sub-pixel offsets, in pixels, within `[-0.5, 0.5]^2`
    pub antialiasing: Vec<Vec2>,

    /// Lens offsets within the unit disk
    pub depth_of_field: Vec<Vec2>,

    /// Light position offsets within the unit disk
    pub shadow: Vec<Vec2>,
}

impl Kernels {
    /// Generates `count` samples of each kernel (at most
    /// [`MAX_KERNEL_SIZE`]); the first sample is always the centered one.
    pub fn generate(count: usize, seed: u64) -> Self {
        let count = count.min(MAX_KERNEL_SIZE);
        let mut rng = StdRng::seed_from_u64(seed);

        let disk = |rng: &mut StdRng| {
            (0..count)
                .map(|idx| {
                    if idx == 0 {
                        return Vec2::ZERO;
                    }

                    let radius = rng.gen::<f32>().sqrt();
                    let angle = rng.gen::<f32>() * TAU;

                    Vec2::from_angle(angle) * radius
                })
                .collect::<Vec<_>>()
        };

        let depth_of_field = disk(&mut rng);
        let shadow = disk(&mut rng);

        let antialiasing = (0..count)
            .map(|idx| {
                if idx == 0 {
                    Vec2::ZERO
                } else {
                    vec2(rng.gen(), rng.gen()) - 0.5
                }
            })
            .collect();

        Self {
            antialiasing,
            depth_of_field,
            shadow,
        }
    }

    /// Returns the sample of given 1-based sub-frame, wrapping around when
    /// the kernel is shorter than the sub-frame count.
    pub fn sample(kernel: &[Vec2], frame: u32) -> Vec2 {
        if kernel.is_empty() {
            return Vec2::ZERO;
        }

        kernel[(frame.max(1) as usize - 1) % kernel.len()]
    }
}

impl Default for Kernels {
    fn default() -> Self {
        Self {
            antialiasing: vec![Vec2::ZERO],
            depth_of_field: vec![Vec2::ZERO],
            shadow: vec![Vec2::ZERO],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderToggles {
    pub use_reflections: bool,
    pub use_dof: bool,

    /// Number of sub-frames accumulated before the image counts as
    /// converged.
    pub multi_frame_count: u32,
}

impl Default for RenderToggles {
    fn default() -> Self {
        Self {
            use_reflections: false,
            use_dof: false,
            multi_frame_count: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingBackend;

    #[test]
    fn kernel_sample() {
        let kernel = [vec2(1.0, 0.0), vec2(2.0, 0.0), vec2(3.0, 0.0)];

        assert_eq!(vec2(1.0, 0.0), Kernels::sample(&kernel, 1));
        assert_eq!(vec2(3.0, 0.0), Kernels::sample(&kernel, 3));
        assert_eq!(vec2(1.0, 0.0), Kernels::sample(&kernel, 4));
        assert_eq!(Vec2::ZERO, Kernels::sample(&[], 4));
    }

    #[test]
    fn generated_kernels() {
        let target = Kernels::generate(16, 1234);

        assert_eq!(16, target.antialiasing.len());
        assert_eq!(Vec2::ZERO, target.shadow[0]);

        assert!(target
            .antialiasing
            .iter()
            .all(|s| s.abs().max_element() <= 0.5));

        assert!(target.depth_of_field.iter().all(|s| s.length() <= 1.0));
        assert_eq!(target, Kernels::generate(16, 1234));
    }

    #[test]
    fn generated_kernels_are_capped() {
        let target = Kernels::generate(u32::MAX as usize, 1234);

        assert_eq!(MAX_KERNEL_SIZE, target.antialiasing.len());
        assert_eq!(MAX_KERNEL_SIZE, target.depth_of_field.len());
        assert_eq!(MAX_KERNEL_SIZE, target.shadow.len());

        assert_eq!(
            target.shadow[1],
            Kernels::sample(&target.shadow, MAX_KERNEL_SIZE as u32 + 2)
        );
    }

    #[test]
    fn ground_plane() {
        let target = MeshData::ground_plane(-1.5, 10.0);

        assert_eq!(2, target.triangles().count());

        for [a, b, c] in target.triangles() {
            let normal = (b.position() - a.position())
                .cross(c.position() - a.position())
                .normalize();

            assert!(normal.abs_diff_eq(Vec3::Y, 1e-6));
            assert_eq!(-1.5, a.position().y);
        }
    }

    #[test]
    #[should_panic(expected = "Material does not exist: MaterialId(7)")]
    fn missing_material() {
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::default();

        scene.drawables.insert(
            MaterialId(7),
            vec![Drawable::new(
                &mut backend,
                "quad",
                MeshData::ground_plane(0.0, 1.0),
            )],
        );

        for id in scene.drawables.keys() {
            scene.material(*id);
        }
    }
}
