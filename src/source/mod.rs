//! Shader Source Providers
//!
//! The cache asks a [`ShaderSourceProvider`] for the text of each stage it
//! has to compile. Providers resolve a key either from a pre-baked
//! [`ShaderArchive`](archive::ShaderArchive) or from a [`SourceGenerator`]
//! that expands the key's fields into source.
//!
//! Shader files are named after the primitive family and stage, e.g.
//! `DefaultVertexShader` or `ParticleSpritePixelShader`.

pub mod archive;
pub mod generator;

use crate::errors::Result;
use crate::key::{GlobalShaderType, PrimitiveType, ProgramKey, ProgramKeyData};

pub use archive::{ArchiveCategory, ArchiveSourceProvider, ShaderArchive};
pub use generator::{DefineGenerator, Prefixes, SourceGenerator};

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Pixel];

    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Vertex => "VertexShader",
            Self::Pixel => "PixelShader",
        }
    }
}

/// Base file name shared by every key of a primitive family.
#[must_use]
pub fn shader_family_name(
    primitive: PrimitiveType,
    global: GlobalShaderType,
    stage: ShaderStage,
) -> &'static str {
    use GlobalShaderType as G;
    let pixel = stage == ShaderStage::Pixel;
    match primitive {
        PrimitiveType::Default => "Default",
        PrimitiveType::Particle => "ParticleSprite",
        PrimitiveType::BeamTrailParticle if pixel => "ParticleSprite",
        PrimitiveType::BeamTrailParticle => "BeamTrail",
        PrimitiveType::LensFlare if pixel => "ParticleSprite",
        PrimitiveType::LensFlare => "LensFlare",
        PrimitiveType::Simple => "Simple",
        PrimitiveType::DistanceFieldFont if pixel => "DistanceFieldFont",
        PrimitiveType::DistanceFieldFont => "Simple",
        PrimitiveType::GlobalShader => match global {
            G::None => "Default",
            G::GammaCorrection => "GammaCorrection",
            G::Filter1 => "Filter1",
            G::Filter4 => "Filter4",
            G::Filter16 => "Filter16",
            G::LUTBlender => "LUTBlender",
            G::UberPostProcess => "UberPostProcess",
            G::LightShaftDownSampleNoDepth if pixel => "LightShaftDownSample_NoDepth_",
            G::LightShaftDownSample | G::LightShaftDownSampleNoDepth => "LightShaftDownSample",
            G::LightShaftBlur => "LightShaftBlur",
            G::LightShaftApply => "LightShaftApply",
            G::SimpleF32 => "SimpleF32",
            G::PositionOnly => "PositionOnly",
            G::ShadowProjection => "ShadowProjection",
            G::BloomGather | G::DOFAndBloomGather => "DOFGather",
            G::MobileUberPostProcess1
            | G::MobileUberPostProcess3
            | G::MobileUberPostProcess4
            | G::MobileUberPostProcess5
            | G::MobileUberPostProcess7 => "MobileUberPostProcess",
            G::VisualizeTexture => "VisualizeTexture",
            G::RadialBlur => "RadialBlur",
            G::FXAA => "MobileFXAA",
        },
    }
}

/// Full shader name for a key's stage, e.g. `LensFlareVertexShader`.
#[must_use]
pub fn shader_name(data: &ProgramKeyData, stage: ShaderStage) -> String {
    let global = GlobalShaderType::from_value(data.value(crate::key::KeyField::GlobalShaderType))
        .unwrap_or_default();
    let family = shader_family_name(data.primitive_type(), global, stage);
    format!("{family}{}", stage.suffix())
}

/// One stage the cache needs source for.
#[derive(Debug, Clone, Copy)]
pub struct SourceRequest<'a> {
    pub key: ProgramKey,
    pub data: &'a ProgramKeyData,
    pub stage: ShaderStage,
}

/// Source text returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSource {
    pub text: String,
    /// `true` when the text came pre-baked rather than generated.
    pub preprocessed: bool,
}

/// Resolves keys to shading-language source.
pub trait ShaderSourceProvider {
    /// Source for one stage, or `None` if it cannot be produced.
    fn load(&mut self, request: &SourceRequest<'_>) -> Option<StageSource>;

    /// Drops and re-reads cached prefix text. Called before a compile retry.
    fn reload_prefixes(&mut self) -> Result<()>;

    /// Frees lookup tables only needed while bulk-loading a manifest.
    fn release_preprocessed(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names_differ_per_stage() {
        assert_eq!(
            shader_family_name(PrimitiveType::LensFlare, GlobalShaderType::None, ShaderStage::Vertex),
            "LensFlare"
        );
        assert_eq!(
            shader_family_name(PrimitiveType::LensFlare, GlobalShaderType::None, ShaderStage::Pixel),
            "ParticleSprite"
        );
        assert_eq!(
            shader_family_name(
                PrimitiveType::GlobalShader,
                GlobalShaderType::MobileUberPostProcess5,
                ShaderStage::Pixel
            ),
            "MobileUberPostProcess"
        );
    }

    #[test]
    fn test_shader_name_from_key_data() {
        let mut data = ProgramKeyData::new();
        data.start();
        data.assign(crate::key::KeyField::PrimitiveType, PrimitiveType::GlobalShader)
            .unwrap();
        data.assign(crate::key::KeyField::GlobalShaderType, GlobalShaderType::FXAA)
            .unwrap();
        data.stop().unwrap();
        assert_eq!(shader_name(&data, ShaderStage::Pixel), "MobileFXAAPixelShader");
    }
}
