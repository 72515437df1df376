use std::fmt::Debug;
use std::hash::Hash;

use derivative::Derivative;
use fxhash::FxHashMap;
use log::debug;

use crate::{Backend, ProgramHandle, Result};

/// Cache of programs compiled out of the same source with different macros,
/// keyed by whatever selects the macros.
///
/// Switching back to a previously-seen key reuses its program instead of
/// compiling it again.
#[derive(Derivative)]
#[derivative(Debug(bound = "K: Debug"), Default(bound = ""))]
pub struct ShaderVariants<K> {
    programs: FxHashMap<K, ProgramHandle>,
}

impl<K> ShaderVariants<K>
where
    K: Copy + Debug + Eq + Hash,
{
    pub fn get_or_build(
        &mut self,
        key: K,
        build: impl FnOnce(K) -> Result<ProgramHandle>,
    ) -> Result<ProgramHandle> {
        if let Some(program) = self.programs.get(&key) {
            return Ok(*program);
        }

        debug!("Building shader variant: {key:?}");

        let program = build(key)?;

        self.programs.insert(key, program);

        Ok(program)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Destroys every cached program.
    pub fn clear(&mut self, backend: &mut dyn Backend) {
        for (_, program) in self.programs.drain() {
            backend.destroy_program(program);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, RecordingBackend};

    #[test]
    fn get_or_build() {
        let mut target = ShaderVariants::<bool>::default();
        let mut builds = 0;

        for key in [true, false, true, true] {
            target
                .get_or_build(key, |_| {
                    builds += 1;
                    Ok(ProgramHandle::new(builds))
                })
                .unwrap();
        }

        assert_eq!(2, builds);
        assert_eq!(2, target.len());
    }

    #[test]
    fn failed_build_is_not_cached() {
        let mut target = ShaderVariants::<u8>::default();

        let result = target.get_or_build(1, |_| {
            Err(Error::ShaderCompile {
                label: "fg".into(),
                message: "nope".into(),
            })
        });

        assert!(result.is_err());
        assert!(target.is_empty());
    }

    #[test]
    fn clear() {
        use crate::{ProgramDescriptor, ProgramStages};

        let mut backend = RecordingBackend::new();
        let mut target = ShaderVariants::<u8>::default();

        for key in 0..3 {
            target
                .get_or_build(key, |_| {
                    backend.create_program(&ProgramDescriptor {
                        label: format!("variant {key}"),
                        source: Default::default(),
                        stages: ProgramStages::Compute { entry_point: "main" },
                    })
                })
                .unwrap();
        }

        target.clear(&mut backend);

        assert!(target.is_empty());
        assert_eq!(0, backend.live_programs());
    }
}
