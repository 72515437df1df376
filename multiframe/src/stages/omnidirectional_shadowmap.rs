use glam::{uvec2, uvec4, Mat4, UVec2, UVec4, Vec2, Vec3, Vec4};
use log::info;

use crate::{
    gpu, Backend, DrawCall, Drawable, Geometry, Macros, Material,
    ProgramHandle, RenderPass, RenderState, Result, Scene, ShaderLibrary,
    Texture, TextureHandle, TextureType, TransparencyMasks,
};

/// Size of a single cube face within the atlas.
pub const POINT_SHADOW_FACE_SIZE: u32 = 512;

/// Faces are laid out in a 3x2 grid.
pub const POINT_SHADOW_ATLAS_SIZE: UVec2 =
    uvec2(3 * POINT_SHADOW_FACE_SIZE, 2 * POINT_SHADOW_FACE_SIZE);

/// Forward and up vectors of each cube face, in the order `+X, -X, +Y, -Y,
/// +Z, -Z`; `rasterization/model.wgsl` keeps a copy of this table.
pub const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// Point light a [`OmnidirectionalShadowmap`] is rendered from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub near_far: Vec2,
}

impl PointLight {
    /// Returns the view-projection matrix of given cube face.
    pub fn face_transform(&self, face: usize) -> Mat4 {
        let (forward, up) = CUBE_FACES[face];

        let projection = Mat4::perspective_rh(
            90.0f32.to_radians(),
            1.0,
            self.near_far.x,
            self.near_far.y,
        );

        projection
            * Mat4::look_at_rh(self.position, self.position + forward, up)
    }
}

/// Returns where given cube face lives within the atlas, as
/// `(x, y, width, height)`.
pub fn face_viewport(face: usize) -> UVec4 {
    let face = face as u32;

    uvec4(
        (face % 3) * POINT_SHADOW_FACE_SIZE,
        (face / 3) * POINT_SHADOW_FACE_SIZE,
        POINT_SHADOW_FACE_SIZE,
        POINT_SHADOW_FACE_SIZE,
    )
}

/// Distance-to-light shadow map of a point light, with all six cube faces
/// packed into a single atlas.
///
/// Re-rendered for every sub-frame from that sub-frame's light position, so
/// that jittering the light turns hard shadows into soft ones once the
/// sub-frames get accumulated.
#[derive(Debug)]
pub struct OmnidirectionalShadowmap {
    distance: Texture,
    depth: Texture,
    program: ProgramHandle,
}

impl OmnidirectionalShadowmap {
    pub fn new(
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
        name: &str,
    ) -> Result<Self> {
        info!("Initializing stage: {name}_point_shadowmap");

        let distance = Texture::builder(format!("{name}_point_shadow"))
            .with_size(POINT_SHADOW_ATLAS_SIZE)
            .with_format(wgpu::TextureFormat::R32Float)
            .with_usage(wgpu::TextureUsages::RENDER_ATTACHMENT)
            .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
            .build(backend);

        let depth = Texture::builder(format!("{name}_point_shadow_depth"))
            .with_size(POINT_SHADOW_ATLAS_SIZE)
            .with_format(wgpu::TextureFormat::Depth32Float)
            .with_usage(wgpu::TextureUsages::RENDER_ATTACHMENT)
            .build(backend);

        let program = shaders.render_program(
            backend,
            &format!("{name}_point_shadowmap"),
            "rasterization/point_shadowmap.wgsl",
            "point_shadowmap_vs",
            Some("point_shadowmap_fs"),
            Macros::new(),
        )?;

        Ok(Self {
            distance,
            depth,
            program,
        })
    }

    /// Returns the atlas of normalized distances towards the light.
    pub fn distance(&self) -> TextureHandle {
        self.distance.handle()
    }

    /// Renders all six faces; only the first pass clears the atlas.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        backend: &mut dyn Backend,
        light: PointLight,
        scene: &Scene,
        ground: Option<&Drawable>,
        masks: &TransparencyMasks,
        fallback: TextureHandle,
        transparency: Vec4,
    ) {
        let mut params = gpu::PointShadowmapPassParams {
            transform: Mat4::IDENTITY,
            light_position: light.position.extend(light.near_far.y),
            transparency,
            flags: Default::default(),
        };

        for face in 0..CUBE_FACES.len() {
            params.transform = light.face_transform(face);

            let clear = face == 0;

            let mut pass = RenderPass::new("point_shadowmap")
                .with_color(
                    self.distance.handle(),
                    clear.then_some(Vec4::splat(f32::MAX)),
                )
                .with_depth(self.depth.handle(), clear.then_some(1.0))
                .with_viewport(face_viewport(face));

            for (&material_id, drawables) in &scene.drawables {
                let material = scene.material(material_id);

                for drawable in drawables {
                    pass.push(self.draw(
                        drawable, material, masks, fallback, &params,
                    ));
                }
            }

            // The ground is always opaque
            if let Some(ground) = ground {
                let mut params = params;

                params.transparency.x = 1.0;

                pass.push(self.draw(
                    ground,
                    &Material::default(),
                    masks,
                    fallback,
                    &params,
                ));
            }

            backend.render(&pass);
        }
    }

    fn draw(
        &self,
        drawable: &Drawable,
        material: &Material,
        masks: &TransparencyMasks,
        fallback: TextureHandle,
        params: &gpu::PointShadowmapPassParams,
    ) -> DrawCall {
        let mut params = *params;

        let opacity = match material.texture(TextureType::Opacity) {
            Some(texture) => {
                params.flags.x = gpu::RasterPassParams::HAS_OPACITY;
                texture
            }
            None => fallback,
        };

        DrawCall::new(self.program, Geometry::Mesh(drawable.mesh()))
            .with_state(RenderState::OPAQUE)
            .bind([
                opacity.bind_sampled(),
                masks.masks().bind_readable(),
                masks.noise().bind_readable(),
            ])
            .with_params(&params)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::vec3;

    use super::*;

    #[test]
    fn faces_look_along_their_axis() {
        let light = PointLight {
            position: vec3(1.0, 2.0, 3.0),
            near_far: Vec2::new(0.1, 50.0),
        };

        for (face, (forward, _)) in CUBE_FACES.iter().enumerate() {
            let target = light.position + *forward * 4.0;
            let clip = light.face_transform(face) * target.extend(1.0);
            let ndc = clip.truncate() / clip.w;

            assert_relative_eq!(0.0, ndc.x, epsilon = 1e-5);
            assert_relative_eq!(0.0, ndc.y, epsilon = 1e-5);
            assert!(clip.w > 0.0);
        }
    }

    #[test]
    fn faces_tile_the_atlas() {
        let mut covered = Vec::new();

        for face in 0..CUBE_FACES.len() {
            let viewport = face_viewport(face);

            assert!(viewport.x + viewport.z <= POINT_SHADOW_ATLAS_SIZE.x);
            assert!(viewport.y + viewport.w <= POINT_SHADOW_ATLAS_SIZE.y);

            covered.push(viewport.truncate().truncate());
        }

        covered.sort_by_key(|origin| (origin.y, origin.x));
        covered.dedup();

        assert_eq!(CUBE_FACES.len(), covered.len());
    }
}
