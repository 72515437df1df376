use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4, Vec4Swizzles};

/// Virtual point light, as extracted from the reflective shadow map.
///
/// A slot whose RSM texel hit nothing keeps a zero flux and gets ignored by
/// clustering and final gathering.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vpl {
    /// Position (xyz) + unused (w)
    pub position: Vec4,

    /// Normal (xyz) + unused (w)
    pub normal: Vec4,

    /// Flux (rgb) + unused (w)
    pub flux: Vec4,
}

impl Vpl {
    pub fn new(position: Vec3, normal: Vec3, flux: Vec3) -> Self {
        Self {
            position: position.extend(1.0),
            normal: normal.extend(0.0),
            flux: flux.extend(0.0),
        }
    }

    /// Distance beyond which this light's contribution drops below the
    /// clamping value and can be culled.
    pub fn influence_radius(&self, clamping_value: f32) -> f32 {
        (self.flux.xyz().max_element() / clamping_value).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use approx::assert_relative_eq;
    use glam::vec3;

    use super::*;

    #[test]
    fn layout() {
        assert_eq!(48, mem::size_of::<Vpl>());
    }

    #[test]
    fn influence_radius() {
        let vpl = Vpl::new(Vec3::ZERO, Vec3::Y, vec3(0.1, 0.4, 0.2));

        assert_relative_eq!(20.0, vpl.influence_radius(0.001), epsilon = 1e-4);
        assert_eq!(0.0, Vpl::default().influence_radius(0.001));
    }
}
