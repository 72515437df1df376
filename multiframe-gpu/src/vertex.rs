use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};

/// Vertex as consumed by the rasterization, shadowmap and ISM passes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position (xyz) + uv (x)
    pub d0: Vec4,

    /// Normal (xyz) + uv (y)
    pub d1: Vec4,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            d0: position.extend(uv.x),
            d1: normal.extend(uv.y),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.d0.xyz()
    }

    pub fn normal(&self) -> Vec3 {
        self.d1.xyz()
    }

    pub fn uv(&self) -> Vec2 {
        Vec2::new(self.d0.w, self.d1.w)
    }
}
