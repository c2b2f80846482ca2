//! Render State → Program Key
//!
//! [`RenderState`] is the plain snapshot of everything the renderer knows
//! at draw time that can change the generated shader. Deriving a key from it
//! is a deterministic pure function of the state plus the resolved
//! [`PlatformCaps`].

use bitflags::bitflags;

use crate::errors::Result;
use crate::settings::PlatformCaps;

use super::fields::{
    AlphaValueSource, AmbientOcclusionSource, BlendMode, ColorMultiplySource, DepthShaderType,
    EmissiveColorSource, EnvironmentBlendMode, GlobalShaderType, KeyField,
    ParticleScreenAlignment, PrimitiveType, SpecularMask, TexCoordsSource,
    TextureBlendFactorSource, ValueSource,
};
use super::key_data::ProgramKeyData;
use super::program_key::ProgramKey;

bitflags! {
    /// Features advertised by the vertex factory of the primitive being drawn.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VertexFactoryFlags: u32 {
        const LIGHTMAP             = 1 << 0;
        const DIRECTIONAL_LIGHTMAP = 1 << 1;
        const GPU_SKINNING         = 1 << 2;
        const DECAL                = 1 << 3;
        const SUB_UV_PARTICLES     = 1 << 4;
        const LANDSCAPE            = 1 << 5;
    }
}

/// Per-material shader settings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaterialSettings {
    pub lighting: bool,
    pub base_tex_coords: TexCoordsSource,
    pub detail_tex_coords: TexCoordsSource,
    pub mask_tex_coords: TexCoordsSource,

    pub base_texture_transformed: bool,
    pub emissive_texture_transformed: bool,
    pub normal_texture_transformed: bool,
    pub mask_texture_transformed: bool,
    pub detail_texture_transformed: bool,

    pub specular: bool,
    pub pixel_specular: bool,
    pub specular_mask: SpecularMask,
    pub normal_mapping: bool,
    pub detail_normal: bool,
    pub bump_offset: bool,
    pub wave_vertex_movement: bool,

    pub environment_mapping: bool,
    pub environment_blend_mode: EnvironmentBlendMode,
    pub environment_fresnel_amount: f32,
    pub environment_mask_source: ValueSource,

    pub one_detail_texture: bool,
    pub two_detail_textures: bool,
    pub three_detail_textures: bool,
    /// Keeps the detail-texture flags from being stripped by platform rules.
    pub color_texture_blending_locked: bool,
    pub texture_blend_factor_source: TextureBlendFactorSource,

    pub ambient_occlusion_source: AmbientOcclusionSource,
    pub uniform_color_multiply: bool,
    pub vertex_color_multiply: bool,
    pub color_multiply_source: ColorMultiplySource,
    pub landscape_monochrome_layer_blending: bool,

    pub rim_lighting: bool,
    pub rim_lighting_mask_source: ValueSource,

    pub emissive: bool,
    pub emissive_color_source: EmissiveColorSource,
    pub emissive_mask_source: ValueSource,

    pub alpha_value_source: AlphaValueSource,
}

/// Snapshot of the render state relevant to shader selection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderState {
    pub primitive_type: PrimitiveType,
    /// Promotes `Simple` to `DistanceFieldFont`.
    pub distance_field_font: bool,
    pub global_shader_type: GlobalShaderType,
    pub blend_mode: BlendMode,

    pub depth_only: bool,
    pub shadow_depth_only: bool,
    pub forward_shadow_projection: bool,

    pub gradient_fog: bool,
    pub fog_saturated: bool,
    pub height_fog: bool,
    pub gamma_correction: bool,
    pub color_grading: bool,

    pub particle_screen_alignment: ParticleScreenAlignment,
    pub vertex_factory: VertexFactoryFlags,
    pub fallback_color_stream: bool,

    pub material: MaterialSettings,
}

impl RenderState {
    /// Primitive type after the distance-field-font promotion.
    #[must_use]
    pub fn effective_primitive_type(&self) -> PrimitiveType {
        if self.primitive_type == PrimitiveType::Simple && self.distance_field_font {
            PrimitiveType::DistanceFieldFont
        } else {
            self.primitive_type
        }
    }

    /// Derives the normalized program key for this state.
    pub fn derive_key(&self, caps: &PlatformCaps) -> Result<(ProgramKey, ProgramKeyData)> {
        use KeyField as F;

        let m = &self.material;
        let vf = self.vertex_factory;
        let landscape = vf.contains(VertexFactoryFlags::LANDSCAPE);

        let mut data = ProgramKeyData::new();
        data.start();

        data.assign(F::PlatformFeatures, caps.features)?;
        data.assign(F::PrimitiveType, self.effective_primitive_type())?;

        data.assign(F::IsDepthOnlyRendering, self.depth_only || self.shadow_depth_only)?;
        data.assign(F::IsGradientFogEnabled, self.gradient_fog && !self.fog_saturated)?;
        data.assign(F::IsHeightFogEnabled, self.height_fog)?;
        data.assign(F::TwoSided, false)?;
        data.assign(F::ParticleScreenAlignment, self.particle_screen_alignment)?;
        data.assign(F::ForwardShadowProjection, self.forward_shadow_projection)?;
        data.assign(F::IsColorGradingEnabled, self.color_grading)?;

        data.assign(F::IsLightmap, vf.contains(VertexFactoryFlags::LIGHTMAP))?;
        data.assign(
            F::IsDirectionalLightmap,
            vf.contains(VertexFactoryFlags::DIRECTIONAL_LIGHTMAP),
        )?;
        data.assign(F::IsSkinned, vf.contains(VertexFactoryFlags::GPU_SKINNING))?;
        data.assign(F::IsDecal, vf.contains(VertexFactoryFlags::DECAL))?;
        data.assign(F::IsSubUV, vf.contains(VertexFactoryFlags::SUB_UV_PARTICLES))?;
        data.assign(F::IsLandscape, landscape)?;

        data.assign(F::IsLightingEnabled, m.lighting)?;
        data.assign(F::BlendMode, self.blend_mode)?;
        data.assign(F::BaseTextureTexCoordsSource, m.base_tex_coords)?;
        data.assign(F::DetailTextureTexCoordsSource, m.detail_tex_coords)?;
        data.assign(F::MaskTextureTexCoordsSource, m.mask_tex_coords)?;

        data.assign(F::IsBaseTextureTransformed, m.base_texture_transformed)?;
        data.assign(F::IsEmissiveTextureTransformed, m.emissive_texture_transformed)?;
        data.assign(F::IsNormalTextureTransformed, m.normal_texture_transformed)?;
        data.assign(F::IsMaskTextureTransformed, m.mask_texture_transformed)?;
        data.assign(F::IsDetailTextureTransformed, m.detail_texture_transformed)?;

        data.assign(F::IsSpecularEnabled, m.specular)?;
        data.assign(F::IsDetailNormalEnabled, m.detail_normal)?;
        data.assign(F::IsPixelSpecularEnabled, m.pixel_specular)?;
        data.assign(F::IsNormalMappingEnabled, m.normal_mapping)?;
        data.assign(F::IsEnvironmentMappingEnabled, m.environment_mapping)?;
        data.assign(F::EnvironmentBlendMode, m.environment_blend_mode)?;
        data.assign(
            F::IsEnvironmentFresnelEnabled,
            m.environment_fresnel_amount != 0.0,
        )?;
        data.assign(F::IsBumpOffsetEnabled, m.bump_offset)?;

        data.assign(F::IsUsingOneDetailTexture, m.one_detail_texture)?;
        data.assign(F::IsUsingTwoDetailTexture, m.two_detail_textures)?;
        data.assign(F::IsUsingThreeDetailTexture, m.three_detail_textures)?;
        for field in [
            F::IsUsingOneDetailTexture,
            F::IsUsingTwoDetailTexture,
            F::IsUsingThreeDetailTexture,
        ] {
            data.lock(field, m.color_texture_blending_locked)?;
        }

        data.assign(F::TextureBlendFactorSource, m.texture_blend_factor_source)?;
        data.assign(F::IsWaveVertexMovementEnabled, m.wave_vertex_movement)?;
        data.assign(F::SpecularMask, m.specular_mask)?;
        data.assign(F::AmbientOcclusionSource, m.ambient_occlusion_source)?;
        data.assign(F::UseUniformColorMultiply, m.uniform_color_multiply)?;
        data.assign(F::UseVertexColorMultiply, m.vertex_color_multiply)?;
        data.assign(
            F::UseLandscapeMonochromeLayerBlending,
            landscape && m.landscape_monochrome_layer_blending,
        )?;
        data.assign(F::ColorMultiplySource, m.color_multiply_source)?;
        data.assign(F::UseFallbackStreamColor, self.fallback_color_stream)?;
        data.assign(F::IsRimLightingEnabled, m.rim_lighting)?;
        data.assign(F::RimLightingMaskSource, m.rim_lighting_mask_source)?;
        data.assign(F::EnvironmentMaskSource, m.environment_mask_source)?;
        data.assign(F::IsEmissiveEnabled, m.emissive)?;
        data.assign(F::EmissiveColorSource, m.emissive_color_source)?;

        let global = if self.primitive_type == PrimitiveType::GlobalShader {
            self.global_shader_type
        } else {
            GlobalShaderType::None
        };
        data.assign(F::GlobalShaderType, global)?;

        let depth = if self.depth_only {
            DepthShaderType::Normal
        } else if self.shadow_depth_only {
            DepthShaderType::Shadow
        } else {
            DepthShaderType::None
        };
        data.assign(F::DepthShaderType, depth)?;

        data.assign(F::EmissiveMaskSource, m.emissive_mask_source)?;
        data.assign(F::UseGammaCorrection, self.gamma_correction)?;
        data.assign(F::AlphaValueSource, m.alpha_value_source)?;

        data.normalize(caps)?;
        data.stop()?;
        let key = data.packed()?;
        Ok((key, data))
    }
}

/// Key with every field cleared except the primitive-type selector.
///
/// Used as the one-shot fallback when a requested permutation cannot be
/// built.
pub fn minimized_key(primitive_type: PrimitiveType) -> Result<(ProgramKey, ProgramKeyData)> {
    let mut data = ProgramKeyData::new();
    data.start();
    data.override_value(KeyField::PrimitiveType, primitive_type)?;
    data.stop()?;
    let key = data.packed()?;
    Ok((key, data))
}
