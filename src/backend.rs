//! Graphics Backend Abstraction
//!
//! The cache never talks to a GPU API directly. Every driver call goes
//! through [`GraphicsBackend`], which a renderer implements on top of its
//! real context (or a test double records).
//!
//! Only `compile_stage` and `link_program` can fail; their error string is
//! the driver info log. Everything else is treated as infallible.

use crate::key::BlendMode;
use crate::resources::uniform_value::SetterKind;
use crate::source::ShaderStage;

/// Backend program object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Backend shader-stage object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageHandle(pub u32);

/// Location of a uniform inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// One typed uniform upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformUpload<'a> {
    pub kind: SetterKind,
    /// Number of elements of `kind` in `data`.
    pub count: usize,
    pub data: &'a [f32],
}

impl UniformUpload<'_> {
    /// Integer view of the payload for [`SetterKind::Int`] uploads.
    #[must_use]
    pub fn as_ints(&self) -> &[i32] {
        bytemuck::cast_slice(self.data)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.data)
    }
}

// ---------------------------------------------------------------------------
// Fixed-function state used by the warming pass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorWriteMask {
    Rgba,
    Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SourceAlpha,
    InverseSourceAlpha,
    DestColor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendState {
    pub color_src: BlendFactor,
    pub color_dst: BlendFactor,
    pub alpha_src: BlendFactor,
    pub alpha_dst: BlendFactor,
    /// Alpha-test reference in `0..=1`, or `None` to disable the test.
    pub alpha_test: Option<f32>,
}

impl BlendState {
    pub const OPAQUE: Self = Self {
        color_src: BlendFactor::One,
        color_dst: BlendFactor::Zero,
        alpha_src: BlendFactor::One,
        alpha_dst: BlendFactor::Zero,
        alpha_test: None,
    };

    const fn color(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            color_src: src,
            color_dst: dst,
            alpha_src: BlendFactor::Zero,
            alpha_dst: BlendFactor::One,
            alpha_test: None,
        }
    }

    /// Blend state a program built for `mode` will be drawn with, or `None`
    /// when the mode leaves the current state untouched.
    #[must_use]
    pub fn for_blend_mode(mode: BlendMode) -> Option<Self> {
        use BlendFactor::{DestColor, InverseSourceAlpha, One, SourceAlpha, Zero};
        match mode {
            BlendMode::Opaque => Some(Self::OPAQUE),
            BlendMode::Masked => Some(Self {
                alpha_test: Some(f32::from(255u8 / 3) / 255.0),
                ..Self::OPAQUE
            }),
            BlendMode::Translucent => Some(Self::color(SourceAlpha, InverseSourceAlpha)),
            BlendMode::Additive => Some(Self::color(One, One)),
            BlendMode::Modulate => Some(Self::color(DestColor, Zero)),
            BlendMode::ModulateAndAdd => Some(Self {
                color_src: DestColor,
                color_dst: One,
                ..Self::OPAQUE
            }),
            BlendMode::SoftMasked | BlendMode::AlphaComposite => None,
        }
    }
}

// ---------------------------------------------------------------------------
// GraphicsBackend
// ---------------------------------------------------------------------------

/// Opaque GPU API consumed by the cache.
pub trait GraphicsBackend {
    // ---- Program construction ----
    fn create_program(&mut self) -> ProgramHandle;
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageHandle, String>;
    fn attach_stage(&mut self, program: ProgramHandle, stage: StageHandle);
    fn link_program(&mut self, program: ProgramHandle) -> Result<(), String>;
    fn delete_stage(&mut self, stage: StageHandle);
    fn delete_program(&mut self, program: ProgramHandle);

    // ---- Reflection ----
    /// Location of a vertex attribute, or `None` if the program does not use it.
    fn attribute_location(&mut self, program: ProgramHandle, name: &str) -> Option<u32>;
    /// Location of a uniform, or `None` if the linker removed it.
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    // ---- Binding ----
    fn current_program(&self) -> Option<ProgramHandle>;
    fn use_program(&mut self, program: ProgramHandle);
    fn set_sampler_unit(&mut self, location: UniformLocation, unit: u32);
    fn upload_uniform(&mut self, location: UniformLocation, upload: UniformUpload<'_>);

    // ---- Draw state used by warming ----
    fn max_vertex_attribs(&self) -> u32;
    fn validate_program(&mut self, program: ProgramHandle) -> bool;
    fn set_vertex_attrib_enabled(&mut self, index: u32, enabled: bool);
    /// Points attribute `index` at a stream of `floats` zeros.
    fn set_degenerate_stream(&mut self, index: u32, floats: usize);
    fn set_color_write_mask(&mut self, mask: ColorWriteMask);
    fn set_blend_state(&mut self, state: &BlendState);
    fn draw_indexed_triangles(&mut self, indices: &[u16]);
    /// Forgets all shadowed fixed-function state and unbinds the program.
    fn reset_state(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_uses_third_alpha_test() {
        let state = BlendState::for_blend_mode(BlendMode::Masked).unwrap();
        let reference = state.alpha_test.unwrap();
        assert!((reference - 85.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_translucent_blends_source_alpha() {
        let state = BlendState::for_blend_mode(BlendMode::Translucent).unwrap();
        assert_eq!(state.color_src, BlendFactor::SourceAlpha);
        assert_eq!(state.color_dst, BlendFactor::InverseSourceAlpha);
        assert!(BlendState::for_blend_mode(BlendMode::SoftMasked).is_none());
    }

    #[test]
    fn test_upload_int_view() {
        let data = [f32::from_bits(7_u32), f32::from_bits((-3_i32).cast_unsigned())];
        let upload = UniformUpload {
            kind: SetterKind::Int,
            count: 2,
            data: &data,
        };
        assert_eq!(upload.as_ints(), &[7, -3]);
    }
}
