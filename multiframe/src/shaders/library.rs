use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::{
    Backend, Error, Macros, ProgramDescriptor, ProgramHandle, ProgramStages,
    Result,
};

macro_rules! embedded {
    ($($path:literal),* $(,)?) => {
        &[
            $(
                ($path, include_str!(concat!("../../data/shaders/", $path))),
            )*
        ]
    };
}

static EMBEDDED: &[(&str, &str)] = embedded![
    "common/fullscreen.wgsl",
    "common/packing.wgsl",
    "common/transparency.wgsl",
    "common/vpl.wgsl",
    "rasterization/model.wgsl",
    "rasterization/point_shadowmap.wgsl",
    "rasterization/shadowmap.wgsl",
    "gi/vpl_processor.wgsl",
    "ism/clear.wgsl",
    "ism/splat.wgsl",
    "ism/resolve.wgsl",
    "ism/push_pull.wgsl",
    "clustering/light_clustering.wgsl",
    "gi/final_gathering.wgsl",
    "gi/gi_blur.wgsl",
    "shading/deferred_shading.wgsl",
    "shading/accumulation.wgsl",
];

const INCLUDE: &str = "#include";

/// Source of WGSL programs.
///
/// Sources are looked up by their path relative to `data/shaders`; they come
/// embedded into the binary, unless an override directory is set and
/// contains a file with the same path (handy for tweaking shaders without
/// recompiling the crate).
///
/// Lines of form `#include "path"` are replaced with the contents of given
/// file, each file being included at most once per program.
#[derive(Clone, Debug, Default)]
pub struct ShaderLibrary {
    override_dir: Option<PathBuf>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_override_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
        }
    }

    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    /// Returns the raw source of given file, without resolving includes.
    pub fn source(&self, path: &str) -> Result<Cow<'static, str>> {
        if let Some(dir) = &self.override_dir {
            let file = dir.join(path);

            if file.exists() {
                trace!("Loading shader from disk: {}", file.display());

                return fs::read_to_string(&file)
                    .map(Cow::Owned)
                    .map_err(|source| Error::ShaderRead { path: file, source });
            }
        }

        EMBEDDED
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, source)| Cow::Borrowed(*source))
            .ok_or_else(|| Error::ShaderNotFound {
                path: path.to_string(),
            })
    }

    /// Returns the source of given file with includes resolved and macros
    /// applied.
    pub fn load(&self, path: &str, macros: Macros) -> Result<String> {
        let mut stack = Vec::new();
        let mut included = Vec::new();
        let mut out = String::new();

        self.resolve(path, &mut stack, &mut included, &mut out)?;

        macros.apply(path, &out)
    }

    pub fn compute_program(
        &self,
        backend: &mut dyn Backend,
        label: &str,
        path: &str,
        entry_point: &'static str,
        macros: Macros,
    ) -> Result<ProgramHandle> {
        self.program(
            backend,
            label,
            path,
            ProgramStages::Compute { entry_point },
            macros,
        )
    }

    pub fn render_program(
        &self,
        backend: &mut dyn Backend,
        label: &str,
        path: &str,
        vertex: &'static str,
        fragment: Option<&'static str>,
        macros: Macros,
    ) -> Result<ProgramHandle> {
        self.program(
            backend,
            label,
            path,
            ProgramStages::Render { vertex, fragment },
            macros,
        )
    }

    fn program(
        &self,
        backend: &mut dyn Backend,
        label: &str,
        path: &str,
        stages: ProgramStages,
        macros: Macros,
    ) -> Result<ProgramHandle> {
        debug!("Building program `{label}` from `{path}`; macros={macros:?}");

        let source = self.load(path, macros)?;

        backend.create_program(&ProgramDescriptor {
            label: label.to_string(),
            source,
            stages,
        })
    }

    fn resolve(
        &self,
        path: &str,
        stack: &mut Vec<String>,
        included: &mut Vec<String>,
        out: &mut String,
    ) -> Result<()> {
        if stack.iter().any(|p| p == path) {
            return Err(Error::ShaderIncludeCycle {
                path: path.to_string(),
            });
        }

        if included.iter().any(|p| p == path) {
            return Ok(());
        }

        let source = self.source(path)?;

        stack.push(path.to_string());

        for line in source.lines() {
            if let Some(include) = Self::included_path(line) {
                self.resolve(include, stack, included, out)?;
            } else {
                out.push_str(line);
                out.push('\n');
            }
        }

        stack.pop();
        included.push(path.to_string());

        Ok(())
    }

    fn included_path(line: &str) -> Option<&str> {
        line.trim()
            .strip_prefix(INCLUDE)?
            .trim()
            .strip_prefix('"')?
            .strip_suffix('"')
    }
}
