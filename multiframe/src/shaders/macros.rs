use crate::{Error, Result};

/// Substitutions applied to a shader's `const` declarations right before
/// compilation.
///
/// A macro named `FOO` replaces the initializer of the top-level line
/// `const FOO: <ty> = <value>;`, keeping its type; every macro must match a
/// declaration, so that a typo doesn't silently compile the default variant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Macros {
    items: Vec<(String, String)>,
}

impl Macros {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set(mut self, name: impl ToString, value: impl ToString) -> Self {
        let name = name.to_string();
        let value = value.to_string();

        if let Some(item) = self.items.iter_mut().find(|(n, _)| *n == name) {
            item.1 = value;
        } else {
            self.items.push((name, value));
        }

        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn apply(&self, path: &str, source: &str) -> Result<String> {
        if self.items.is_empty() {
            return Ok(source.to_string());
        }

        let mut used = vec![false; self.items.len()];
        let mut out = String::with_capacity(source.len());

        for line in source.lines() {
            let replacement = Self::declared_name(line).and_then(|name| {
                let idx = self.items.iter().position(|(n, _)| n == name)?;
                let (head, _) = line.split_once('=')?;

                used[idx] = true;

                Some(format!("{}= {};", head, self.items[idx].1))
            });

            match replacement {
                Some(line) => out.push_str(&line),
                None => out.push_str(line),
            }

            out.push('\n');
        }

        if let Some(idx) = used.iter().position(|used| !used) {
            return Err(Error::ShaderMacro {
                path: path.to_string(),
                name: self.items[idx].0.clone(),
            });
        }

        Ok(out)
    }

    fn declared_name(line: &str) -> Option<&str> {
        let (name, _) = line.strip_prefix("const ")?.split_once(':')?;

        Some(name.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
const ENABLE_SHADOWING: bool = true;
const DIRECTION: vec2<i32> = vec2<i32>(0, 0);

fn main() {
    const ENABLE_SHADOWING: bool = true;
}
";

    #[test]
    fn apply() {
        let actual = Macros::new()
            .set("ENABLE_SHADOWING", false)
            .set("DIRECTION", "vec2<i32>(1, 0)")
            .apply("test.wgsl", SOURCE)
            .unwrap();

        let expected = "\
const ENABLE_SHADOWING: bool = false;
const DIRECTION: vec2<i32> = vec2<i32>(1, 0);

fn main() {
    const ENABLE_SHADOWING: bool = true;
}
";

        assert_eq!(expected, actual);
    }

    #[test]
    fn apply_nothing() {
        assert_eq!(SOURCE, Macros::new().apply("test.wgsl", SOURCE).unwrap());
    }

    #[test]
    fn set_overrides() {
        let target = Macros::new().set("A", 1).set("A", 2);

        assert_eq!(
            "const A: u32 = 2;\n",
            target.apply("test.wgsl", "const A: u32 = 0;").unwrap()
        );
    }

    #[test]
    fn unknown_macro() {
        let err = Macros::new()
            .set("SHOW_VPL_POSITION", true)
            .apply("gi/final_gathering.wgsl", SOURCE)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::ShaderMacro { name, .. } if name == "SHOW_VPL_POSITION"
        ));
    }
}
