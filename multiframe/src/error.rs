use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while building or running the painter.
#[derive(Error, Debug)]
pub enum Error {
    /// Shader source does not exist, neither on disk nor embedded.
    #[error("Shader not found: {path}")]
    ShaderNotFound { path: String },

    /// Shader source could not be read from the override directory.
    #[error("Couldn't read shader `{}`: {source}", path.display())]
    ShaderRead {
        path: PathBuf,

        #[source]
        source: io::Error,
    },

    /// Shader includes itself, directly or transitively.
    #[error("Shader include cycle detected at: {path}")]
    ShaderIncludeCycle { path: String },

    /// Macro didn't match any `const` declaration of the shader.
    #[error("Shader `{path}` has no `const {name}` to substitute")]
    ShaderMacro { path: String, name: String },

    /// Shader was rejected by the backend.
    #[error("Couldn't compile shader `{label}`: {message}")]
    ShaderCompile { label: String, message: String },

    /// Property registry doesn't know this name.
    #[error("Unknown property: {name}")]
    UnknownProperty { name: String },

    /// Property exists, but has a different type.
    #[error("Property `{name}` expects {expected}, got {actual}")]
    PropertyType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}
