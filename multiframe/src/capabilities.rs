//! Values shared between stages, each paired with a change flag.
//!
//! Every [`Observed`] has a single writer that acknowledges it once all of its
//! readers have had a chance to react, i.e. at the end of a frame.

use std::ops::{Deref, DerefMut};

use glam::{uvec2, Mat4, UVec2, Vec3};
use serde::{Deserialize, Serialize};

/// Value plus a one-shot "has changed" flag.
///
/// Freshly created values count as changed, so that every reader initializes
/// itself on the first frame.
#[derive(Clone, Debug)]
pub struct Observed<T> {
    value: T,
    changed: bool,
}

impl<T> Observed<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            changed: true,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn has_changed(&self) -> bool {
        self.changed
    }

    pub fn acknowledge(&mut self) {
        self.changed = false;
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Replaces the value, raising the flag unconditionally.
    pub fn replace(&mut self, value: T) -> T {
        self.changed = true;

        std::mem::replace(&mut self.value, value)
    }
}

impl<T> Observed<T>
where
    T: PartialEq,
{
    /// Replaces the value, raising the flag only if it's actually different.
    pub fn set(&mut self, value: T) {
        if self.value != value {
            self.value = value;
            self.changed = true;
        }
    }

    /// Modifies a copy of the value and stores it through [`Self::set()`].
    pub fn update(&mut self, f: impl FnOnce(&mut T))
    where
        T: Clone,
    {
        let mut value = self.value.clone();

        f(&mut value);
        self.set(value);
    }
}

impl<T> Default for Observed<T>
where
    T: Default,
{
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl<T> Deref for Observed<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> DerefMut for Observed<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.changed = true;

        &mut self.value
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    eye: Vec3,
    center: Vec3,
    up: Vec3,
}

impl Camera {
    pub fn new(eye: Vec3, center: Vec3) -> Self {
        Self {
            eye,
            center,
            up: Vec3::Y,
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
    }

    /// Normalized direction the camera is looking at.
    pub fn direction(&self) -> Vec3 {
        (self.center - self.eye).normalize_or_zero()
    }

    pub fn view(&self) -> Mat4 {
        // Looking straight up or down makes `up` degenerate
        let up = if self.direction().cross(self.up).length_squared() < 1e-8 {
            Vec3::Z
        } else {
            self.up
        };

        Mat4::look_at_rh(self.eye, self.center, up)
    }

    pub fn view_inverted(&self) -> Mat4 {
        self.view().inverse()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Viewport {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "Viewport must not be empty");

        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: UVec2) -> Self {
        Self::new(0, 0, size.x, size.y)
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> UVec2 {
        uvec2(self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ProjectionKind {
    Perspective {
        /// Vertical field of view, in radians
        fov_y: f32,
    },
    Orthographic {
        /// Height of the view volume, in world units
        height: f32,
    },
}

/// Projection whose aspect ratio follows a viewport.
///
/// Matrices map depth into wgpu's `[0, 1]` range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    kind: ProjectionKind,
    z_near: f32,
    z_far: f32,
}

impl Projection {
    pub fn perspective(fov_y: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            kind: ProjectionKind::Perspective { fov_y },
            z_near,
            z_far,
        }
    }

    pub fn orthographic(height: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            kind: ProjectionKind::Orthographic { height },
            z_near,
            z_far,
        }
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    pub fn set_z_near(&mut self, z_near: f32) {
        self.z_near = z_near;
    }

    pub fn z_far(&self) -> f32 {
        self.z_far
    }

    pub fn set_z_far(&mut self, z_far: f32) {
        self.z_far = z_far;
    }

    pub fn projection(&self, aspect_ratio: f32) -> Mat4 {
        match self.kind {
            ProjectionKind::Perspective { fov_y } => Mat4::perspective_rh(
                fov_y,
                aspect_ratio,
                self.z_near,
                self.z_far,
            ),

            ProjectionKind::Orthographic { height } => {
                let half_height = height / 2.0;
                let half_width = half_height * aspect_ratio;

                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.z_near,
                    self.z_far,
                )
            }
        }
    }

    pub fn projection_inverted(&self, aspect_ratio: f32) -> Mat4 {
        self.projection(aspect_ratio).inverse()
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::perspective(40f32.to_radians(), 0.1, 64.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{vec3, vec4, Vec4Swizzles};

    use super::*;

    #[test]
    fn observed_set() {
        let mut target = Observed::new(1);

        assert!(target.has_changed());

        target.acknowledge();
        target.set(1);

        assert!(!target.has_changed());

        target.set(2);

        assert!(target.has_changed());
        assert_eq!(2, *target.get());
    }

    #[test]
    fn observed_update() {
        let mut target = Observed::new(Camera::default());

        target.acknowledge();
        target.update(|camera| camera.set_eye(camera.eye()));

        assert!(!target.has_changed());

        target.update(|camera| camera.set_eye(vec3(1.0, 2.0, 3.0)));

        assert!(target.has_changed());
        assert_eq!(vec3(1.0, 2.0, 3.0), target.eye());
    }

    #[test]
    fn observed_deref_mut() {
        let mut target = Observed::new(Viewport::new(0, 0, 4, 4));

        target.acknowledge();
        *target = Viewport::new(0, 0, 8, 8);

        assert!(target.has_changed());
    }

    #[test]
    fn camera_view() {
        let target = Camera::new(vec3(0.0, 0.0, 5.0), Vec3::ZERO);
        let origin = target.view() * vec4(0.0, 0.0, 0.0, 1.0);

        assert_relative_eq!(-5.0, origin.z, epsilon = 1e-5);

        let view_inv = target.view_inverted() * vec4(0.0, 0.0, 0.0, 1.0);

        assert!(view_inv.xyz().abs_diff_eq(target.eye(), 1e-5));
    }

    #[test]
    fn camera_looking_down() {
        let target = Camera::new(vec3(0.0, 5.0, 0.0), Vec3::ZERO);

        assert!(target.view().is_finite());
    }

    #[test]
    fn perspective_depth_range() {
        let target = Projection::perspective(1.0, 0.5, 50.0);
        let matrix = target.projection(2.0);

        let near = matrix * vec4(0.0, 0.0, -0.5, 1.0);
        let far = matrix * vec4(0.0, 0.0, -50.0, 1.0);

        assert_relative_eq!(0.0, near.z / near.w, epsilon = 1e-5);
        assert_relative_eq!(1.0, far.z / far.w, epsilon = 1e-5);
    }

    #[test]
    fn orthographic_extent() {
        let target = Projection::orthographic(5.0, 0.1, 10.0);
        let matrix = target.projection(4.0);
        let corner = matrix * vec4(10.0, 2.5, -0.1, 1.0);

        assert_relative_eq!(1.0, corner.x, epsilon = 1e-5);
        assert_relative_eq!(1.0, corner.y, epsilon = 1e-5);
        assert_relative_eq!(0.0, corner.z, epsilon = 1e-5);
    }

    #[test]
    fn viewport() {
        let target = Viewport::from_size(uvec2(1024, 256));

        assert_eq!(uvec2(1024, 256), target.size());
        assert_relative_eq!(4.0, target.aspect_ratio());
    }
}
