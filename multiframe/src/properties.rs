//! Typed, name-addressable tunables the host can enumerate and edit.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    Vec3,
}

impl PropertyKind {
    pub fn name(self) -> &'static str {
        match self {
            PropertyKind::Bool => "bool",
            PropertyKind::Int => "int",
            PropertyKind::Float => "float",
            PropertyKind::Vec3 => "vec3",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec3(Vec3),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Float(_) => PropertyKind::Float,
            PropertyValue::Vec3(_) => PropertyKind::Vec3,
        }
    }

    pub fn as_bool(self, name: &str) -> Result<bool> {
        match self {
            PropertyValue::Bool(value) => Ok(value),
            _ => Err(self.mismatch(name, PropertyKind::Bool)),
        }
    }

    pub fn as_int(self, name: &str) -> Result<i32> {
        match self {
            PropertyValue::Int(value) => Ok(value),
            _ => Err(self.mismatch(name, PropertyKind::Int)),
        }
    }

    pub fn as_float(self, name: &str) -> Result<f32> {
        match self {
            PropertyValue::Float(value) => Ok(value),
            _ => Err(self.mismatch(name, PropertyKind::Float)),
        }
    }

    pub fn as_vec3(self, name: &str) -> Result<Vec3> {
        match self {
            PropertyValue::Vec3(value) => Ok(value),
            _ => Err(self.mismatch(name, PropertyKind::Vec3)),
        }
    }

    fn mismatch(self, name: &str, expected: PropertyKind) -> Error {
        Error::PropertyType {
            name: name.into(),
            expected: expected.name(),
            actual: self.kind().name(),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<Vec3> for PropertyValue {
    fn from(value: Vec3) -> Self {
        PropertyValue::Vec3(value)
    }
}

/// Hints for whoever builds an editor for the property.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyOptions {
    pub minimum: f32,
    pub maximum: f32,
    pub step: f32,
    pub precision: u32,
}

impl PropertyOptions {
    pub const fn new(
        minimum: f32,
        maximum: f32,
        step: f32,
        precision: u32,
    ) -> Self {
        Self {
            minimum,
            maximum,
            step,
            precision,
        }
    }
}

impl Default for PropertyOptions {
    fn default() -> Self {
        Self::new(f32::MIN, f32::MAX, 1.0, 0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub options: PropertyOptions,
}

impl PropertyDescriptor {
    pub const fn new(name: &'static str, kind: PropertyKind) -> Self {
        Self {
            name,
            kind,
            options: PropertyOptions::new(f32::MIN, f32::MAX, 1.0, 0),
        }
    }

    pub fn with_options(mut self, options: PropertyOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    #[test]
    fn conversions() {
        assert!(PropertyValue::from(true).as_bool("x").unwrap());
        assert_eq!(3, PropertyValue::from(3).as_int("x").unwrap());
        assert_eq!(0.5, PropertyValue::from(0.5f32).as_float("x").unwrap());

        assert_eq!(
            vec3(1.0, 2.0, 3.0),
            PropertyValue::from(vec3(1.0, 2.0, 3.0)).as_vec3("x").unwrap()
        );
    }

    #[test]
    fn mismatch() {
        let err = PropertyValue::Int(1).as_float("LightIntensity").unwrap_err();

        assert_eq!(
            "Property `LightIntensity` expects float, got int",
            err.to_string()
        );
    }
}
