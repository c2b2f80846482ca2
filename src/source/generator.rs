//! Live source generation.
//!
//! When a key has no pre-baked text, the provider hands the stage's shader
//! body and the shared prefixes to a [`SourceGenerator`]. Full shading
//! language preprocessing lives outside this crate; [`DefineGenerator`] is
//! the stock implementation that emits one `#define` per non-zero key field
//! ahead of the body.

use std::fmt::Write as _;

use crate::key::KeyField;

use super::{ShaderStage, SourceRequest};

/// Prefix text prepended to every generated stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefixes {
    pub common: String,
    pub vertex: String,
    pub pixel: String,
}

impl Prefixes {
    #[must_use]
    pub fn for_stage(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Pixel => &self.pixel,
        }
    }
}

/// Produces source for a key from prefixes and the family body.
pub trait SourceGenerator {
    fn generate(
        &mut self,
        request: &SourceRequest<'_>,
        prefixes: &Prefixes,
        body: &str,
    ) -> Option<String>;
}

/// Emits `#define <FIELD> <value>` for every non-zero field.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefineGenerator;

impl SourceGenerator for DefineGenerator {
    fn generate(
        &mut self,
        request: &SourceRequest<'_>,
        prefixes: &Prefixes,
        body: &str,
    ) -> Option<String> {
        if body.is_empty() {
            return None;
        }
        let mut out = String::with_capacity(
            prefixes.common.len() + prefixes.for_stage(request.stage).len() + body.len() + 1024,
        );
        for &field in KeyField::ALL {
            let value = request.data.value(field);
            if value != 0 {
                let _ = writeln!(out, "#define {} {value}", field.name());
            }
        }
        out.push_str(&prefixes.common);
        out.push('\n');
        out.push_str(prefixes.for_stage(request.stage));
        out.push('\n');
        out.push_str(body);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{ProgramKeyData, ProgramKey};

    #[test]
    fn test_defines_only_nonzero_fields() {
        let mut data = ProgramKeyData::new();
        data.start();
        data.assign(KeyField::IsLightmap, true).unwrap();
        data.stop().unwrap();
        let request = SourceRequest {
            key: ProgramKey::ZERO,
            data: &data,
            stage: ShaderStage::Pixel,
        };
        let prefixes = Prefixes {
            common: "// common".into(),
            vertex: "// vs".into(),
            pixel: "// ps".into(),
        };
        let text = DefineGenerator.generate(&request, &prefixes, "void main() {}").unwrap();
        assert!(text.starts_with("#define IsLightmap 1\n// common\n// ps\n"));
        assert!(!text.contains("// vs"));
        assert!(!text.contains("IsSkinned"));
    }

    #[test]
    fn test_empty_body_yields_none() {
        let data = ProgramKeyData::unpack(ProgramKey::ZERO);
        let request = SourceRequest {
            key: ProgramKey::ZERO,
            data: &data,
            stage: ShaderStage::Vertex,
        };
        assert!(DefineGenerator.generate(&request, &Prefixes::default(), "").is_none());
    }
}
