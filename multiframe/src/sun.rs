use glam::{vec3, Vec3};
use serde::{Deserialize, Serialize};

/// Half of the sun's arc, in degrees.
pub const SUN_DEGREE_SPAN: f32 = 80.0;

/// Period of the sun cycle, in cycle-position units.
pub const SUN_CYCLE_PERIOD: f32 = 2.0 * SUN_DEGREE_SPAN;

/// Distance between the light camera's eye and its center.
pub const SUN_DISTANCE: f32 = 4.0;

/// Animated directional light sweeping back and forth over the scene.
///
/// The cycle position maps onto an elevation within
/// `[(180 - span) / 2, (180 + span) / 2]`, i.e. `[50, 130]` degrees,
/// ping-ponging with a period of `2 * span`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sun {
    pub cycle_position: f32,
    pub cycle_speed: f32,
    pub moving: bool,
}

impl Sun {
    /// Returns the sun's elevation, in degrees.
    pub fn elevation(&self) -> f32 {
        let span = SUN_DEGREE_SPAN;

        (self.cycle_position.rem_euclid(2.0 * span) - span).abs()
            + (180.0 - span) / 2.0
    }

    /// Returns the direction light travels in.
    pub fn direction(&self) -> Vec3 {
        let radians = self.elevation().to_radians();

        vec3(0.0, -radians.sin(), radians.cos())
    }

    /// Returns where the light camera should be placed to look at `center`.
    pub fn eye(&self, center: Vec3) -> Vec3 {
        center - self.direction() * SUN_DISTANCE
    }

    /// Moves the sun along its cycle, if it's moving.
    pub fn advance(&mut self) {
        if self.moving {
            self.cycle_position = (self.cycle_position + self.cycle_speed)
                .rem_euclid(SUN_CYCLE_PERIOD);
        }
    }
}

impl Default for Sun {
    fn default() -> Self {
        Self {
            cycle_position: 266.0,
            cycle_speed: 0.1,
            moving: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn sun(cycle_position: f32) -> Sun {
        Sun {
            cycle_position,
            ..Default::default()
        }
    }

    #[test]
    fn elevation() {
        assert_relative_eq!(130.0, sun(0.0).elevation());
        assert_relative_eq!(50.0, sun(80.0).elevation());
        assert_relative_eq!(130.0, sun(160.0).elevation());
        assert_relative_eq!(90.0, sun(40.0).elevation());

        // 266 mod 160 = 106, |106 - 80| + 50
        assert_relative_eq!(76.0, Sun::default().elevation(), epsilon = 1e-4);
    }

    #[test]
    fn direction_points_down() {
        for pos in [0.0, 40.0, 80.0, 120.0] {
            let dir = sun(pos).direction();

            assert!(dir.y < 0.0);
            assert_relative_eq!(1.0, dir.length(), epsilon = 1e-6);
        }

        assert!(sun(40.0).direction().abs_diff_eq(-Vec3::Y, 1e-6));
    }

    #[test]
    fn eye() {
        let center = vec3(1.0, 0.0, 2.0);
        let target = sun(40.0);

        assert!(target.eye(center).abs_diff_eq(vec3(1.0, 4.0, 2.0), 1e-5));
    }

    #[test]
    fn advance() {
        let mut target = Sun {
            cycle_position: 159.95,
            cycle_speed: 0.1,
            moving: true,
        };

        target.advance();

        assert_relative_eq!(0.05, target.cycle_position, epsilon = 1e-3);

        target.moving = false;
        target.advance();

        assert_relative_eq!(0.05, target.cycle_position, epsilon = 1e-3);
    }
}
