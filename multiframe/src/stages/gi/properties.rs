use crate::{
    Error, GiStage, PropertyDescriptor, PropertyKind, PropertyOptions,
    PropertyValue, Result,
};

const ANY: PropertyOptions = PropertyOptions::new(f32::MIN, f32::MAX, 1.0, 0);

const fn property(
    name: &'static str,
    kind: PropertyKind,
    options: PropertyOptions,
) -> PropertyDescriptor {
    PropertyDescriptor {
        name,
        kind,
        options,
    }
}

const fn toggle(name: &'static str) -> PropertyDescriptor {
    property(name, PropertyKind::Bool, ANY)
}

/// Every property [`GiStage`] exposes.
pub const GI_PROPERTIES: [PropertyDescriptor; 18] = [
    property("RSMLightPosition", PropertyKind::Vec3, ANY),
    property("RSMLightCenter", PropertyKind::Vec3, ANY),
    toggle("MoveSun"),
    property("SunCyclePosition", PropertyKind::Float, ANY),
    property("SunCycleSpeed", PropertyKind::Float, ANY),
    property(
        "LightIntensity",
        PropertyKind::Float,
        PropertyOptions::new(0.0, f32::MAX, 0.2, 2),
    ),
    property(
        "GIIntensityFactor",
        PropertyKind::Float,
        PropertyOptions::new(0.0, f32::MAX, 100.0, 1),
    ),
    property(
        "VPLClampingValue",
        PropertyKind::Float,
        PropertyOptions::new(0.0, f32::MAX, 0.0001, 5),
    ),
    property(
        "VPLStartIndex",
        PropertyKind::Int,
        PropertyOptions::new(0.0, 1024.0, 1.0, 0),
    ),
    property(
        "VPLEndIndex",
        PropertyKind::Int,
        PropertyOptions::new(0.0, 1024.0, 1.0, 0),
    ),
    toggle("ScaleISMs"),
    toggle("PointsOnlyToScaledISMs"),
    property(
        "TessLevelFactor",
        PropertyKind::Float,
        PropertyOptions::new(0.0, f32::MAX, 0.05, 3),
    ),
    toggle("UsePushPull"),
    toggle("GIShadowing"),
    toggle("ShowVPLPositions"),
    toggle("UseInterleaving"),
    toggle("ShuffleLights"),
];

impl GiStage {
    pub fn properties(&self) -> &'static [PropertyDescriptor] {
        &GI_PROPERTIES
    }

    pub fn property(&self, name: &str) -> Result<PropertyValue> {
        let params = &self.params;

        let value: PropertyValue = match name {
            "RSMLightPosition" => self.light_camera.eye().into(),
            "RSMLightCenter" => self.light_camera.center().into(),
            "MoveSun" => params.sun.moving.into(),
            "SunCyclePosition" => params.sun.cycle_position.into(),
            "SunCycleSpeed" => params.sun.cycle_speed.into(),
            "LightIntensity" => params.light_intensity.into(),
            "GIIntensityFactor" => params.gi_factor.into(),
            "VPLClampingValue" => params.vpl_clamping.into(),
            "VPLStartIndex" => (params.vpl_start() as i32).into(),
            "VPLEndIndex" => (params.vpl_end() as i32).into(),
            "ScaleISMs" => params.scale_isms().into(),
            "PointsOnlyToScaledISMs" => params.points_only_into_scaled.into(),
            "TessLevelFactor" => params.tess_factor.into(),
            "UsePushPull" => params.use_push_pull.into(),
            "GIShadowing" => params.shadowing().into(),
            "ShowVPLPositions" => params.show_vpl_positions().into(),
            "UseInterleaving" => params.use_interleaving().into(),
            "ShuffleLights" => params.shuffle.into(),

            _ => {
                return Err(Error::UnknownProperty { name: name.into() });
            }
        };

        Ok(value)
    }

    /// Writes a property; VPL indices that would break the `start < end`
    /// ordering (or that are negative) are silently ignored.
    pub fn set_property(
        &mut self,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        let value = value.into();
        let params = &mut self.params;

        match name {
            "RSMLightPosition" => {
                let eye = value.as_vec3(name)?;

                self.light_camera.update(|camera| camera.set_eye(eye));
            }
            "RSMLightCenter" => {
                let center = value.as_vec3(name)?;

                self.light_camera.update(|camera| camera.set_center(center));
            }
            "MoveSun" => params.sun.moving = value.as_bool(name)?,
            "SunCyclePosition" => {
                params.sun.cycle_position = value.as_float(name)?;
            }
            "SunCycleSpeed" => params.sun.cycle_speed = value.as_float(name)?,
            "LightIntensity" => params.light_intensity = value.as_float(name)?,
            "GIIntensityFactor" => params.gi_factor = value.as_float(name)?,
            "VPLClampingValue" => params.vpl_clamping = value.as_float(name)?,
            "VPLStartIndex" => {
                if let Ok(value) = u32::try_from(value.as_int(name)?) {
                    params.set_vpl_start(value);
                }
            }
            "VPLEndIndex" => {
                if let Ok(value) = u32::try_from(value.as_int(name)?) {
                    params.set_vpl_end(value);
                }
            }
            "ScaleISMs" => params.set_scale_isms(value.as_bool(name)?),
            "PointsOnlyToScaledISMs" => {
                params.points_only_into_scaled = value.as_bool(name)?;
            }
            "TessLevelFactor" => params.tess_factor = value.as_float(name)?,
            "UsePushPull" => params.use_push_pull = value.as_bool(name)?,
            "GIShadowing" => params.set_shadowing(value.as_bool(name)?),
            "ShowVPLPositions" => {
                params.set_show_vpl_positions(value.as_bool(name)?);
            }
            "UseInterleaving" => {
                params.set_use_interleaving(value.as_bool(name)?);
            }
            "ShuffleLights" => params.shuffle = value.as_bool(name)?,

            _ => {
                return Err(Error::UnknownProperty { name: name.into() });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::{uvec2, vec3};

    use super::*;
    use crate::{GiParams, Preset, Projection, RecordingBackend, ShaderLibrary};

    fn stage(backend: &mut RecordingBackend) -> GiStage {
        GiStage::new(
            backend,
            &ShaderLibrary::new(),
            uvec2(64, 64),
            &Projection::default(),
            &Preset::default(),
            GiParams::default(),
            0,
        )
        .unwrap()
    }

    #[test]
    fn every_property_is_readable() {
        let mut backend = RecordingBackend::new();
        let target = stage(&mut backend);

        for desc in target.properties() {
            let value = target.property(desc.name).unwrap();

            assert_eq!(desc.kind, value.kind(), "{}", desc.name);
        }
    }

    #[test]
    fn read_write() {
        let mut backend = RecordingBackend::new();
        let mut target = stage(&mut backend);

        target.set_property("LightIntensity", 2.5f32).unwrap();
        target.set_property("MoveSun", true).unwrap();

        target
            .set_property("RSMLightCenter", vec3(1.0, 2.0, 3.0))
            .unwrap();

        assert_eq!(
            PropertyValue::Float(2.5),
            target.property("LightIntensity").unwrap()
        );

        assert!(target.params().sun.moving);
        assert_eq!(vec3(1.0, 2.0, 3.0), target.light_camera().center());
    }

    #[test]
    fn vpl_indices() {
        let mut backend = RecordingBackend::new();
        let mut target = stage(&mut backend);

        target.set_property("VPLEndIndex", 100).unwrap();
        target.set_property("VPLStartIndex", 100).unwrap();
        target.set_property("VPLStartIndex", -5).unwrap();

        assert_eq!(0..100, target.params().vpl_range());

        target.set_property("VPLStartIndex", 99).unwrap();
        target.set_property("VPLEndIndex", 99).unwrap();

        assert_eq!(99..100, target.params().vpl_range());
    }

    #[test]
    fn errors() {
        let mut backend = RecordingBackend::new();
        let mut target = stage(&mut backend);

        assert!(matches!(
            target.set_property("Nope", 1.0f32),
            Err(Error::UnknownProperty { .. })
        ));

        assert!(matches!(
            target.set_property("GIShadowing", 1.0f32),
            Err(Error::PropertyType { .. })
        ));

        assert!(matches!(
            target.property("Nope"),
            Err(Error::UnknownProperty { .. })
        ));
    }

    #[test]
    fn shader_toggles_mark_fg_dirty() {
        let mut backend = RecordingBackend::new();
        let mut target = stage(&mut backend);

        for name in [
            "GIShadowing",
            "ShowVPLPositions",
            "UseInterleaving",
            "ScaleISMs",
        ] {
            target.params_mut().clear_fg_dirty();
            target.set_property(name, true).unwrap();
            assert!(target.params().fg_dirty(), "{name}");
        }

        target.params_mut().clear_fg_dirty();
        target.set_property("UsePushPull", false).unwrap();
        target.set_property("TessLevelFactor", 4.0f32).unwrap();
        target.set_property("ShuffleLights", false).unwrap();
        target.set_property("PointsOnlyToScaledISMs", true).unwrap();
        target.set_property("LightIntensity", 1.0f32).unwrap();
        assert!(!target.params().fg_dirty());
    }
}
