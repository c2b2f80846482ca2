//! Program Key Field Table
//!
//! Single source of truth for every render-state attribute encoded in a
//! [`ProgramKey`](super::ProgramKey). Each field occupies a fixed number of
//! bits in one of the two 64-bit key halves.
//!
//! # Layout
//!
//! Fields are packed most-significant-first in declaration order within each
//! half. The last field of a half therefore sits in the lowest bits.
//!
//! | Half | Fields | Bits used |
//! |------|--------|-----------|
//! | 0    | platform, primitive, material and texture-source state | 64 |
//! | 1    | global shader selector, depth pass, lighting toggles   | 32 |
//!
//! Bit widths are validated against the enum value counts at compile time.

/// Declares a small enum whose discriminant is stored in a key field.
macro_rules! key_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $first:ident $(, $rest:ident)* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[repr(u16)]
        pub enum $name {
            #[default]
            $first,
            $($rest,)*
        }

        impl $name {
            pub const ALL: &'static [Self] = &[Self::$first $(, Self::$rest)*];
            /// Number of variants; the exclusive max value of the field.
            pub const COUNT: u16 = Self::ALL.len() as u16;

            #[inline]
            #[must_use]
            pub const fn value(self) -> u16 {
                self as u16
            }

            #[must_use]
            pub fn from_value(value: u16) -> Option<Self> {
                Self::ALL.get(value as usize).copied()
            }
        }

        impl KeyValue for $name {
            #[inline]
            fn key_value(self) -> u16 {
                self as u16
            }
        }
    };
}

/// Values that can be written into a key field.
pub trait KeyValue: Copy {
    fn key_value(self) -> u16;
}

impl KeyValue for bool {
    #[inline]
    fn key_value(self) -> u16 {
        u16::from(self)
    }
}

impl KeyValue for u16 {
    #[inline]
    fn key_value(self) -> u16 {
        self
    }
}

// ============================================================================
// Field Value Enums
// ============================================================================

key_enum! {
    /// Feature level the key was built for.
    pub enum PlatformFeatures { HighEnd, LowEnd }
}

key_enum! {
    /// Shader family selector.
    pub enum PrimitiveType {
        Default,
        Particle,
        BeamTrailParticle,
        LensFlare,
        Simple,
        DistanceFieldFont,
        GlobalShader,
    }
}

key_enum! {
    pub enum ParticleScreenAlignment { CameraFacing, Velocity, LockedAxis }
}

key_enum! {
    /// Material blend mode. Also selects the warm-up blend state.
    pub enum BlendMode {
        Opaque,
        Masked,
        Translucent,
        Additive,
        Modulate,
        ModulateAndAdd,
        SoftMasked,
        AlphaComposite,
    }
}

key_enum! {
    pub enum TexCoordsSource { TexCoords0, TexCoords1, TexCoords2, TexCoords3 }
}

key_enum! {
    pub enum SpecularMask {
        Constant,
        Luminance,
        DiffuseRed,
        DiffuseGreen,
        DiffuseBlue,
        DiffuseAlpha,
        MaskRed,
        MaskGreen,
        MaskBlue,
        MaskAlpha,
        EnvironmentMask,
    }
}

key_enum! {
    pub enum AmbientOcclusionSource {
        None,
        VertexColorRed,
        VertexColorGreen,
        VertexColorBlue,
        VertexColorAlpha,
    }
}

key_enum! {
    /// Channel source shared by the rim, environment and emissive masks.
    pub enum ValueSource {
        Constant,
        VertexColorRed,
        VertexColorGreen,
        VertexColorBlue,
        VertexColorAlpha,
        BaseTextureRed,
        BaseTextureGreen,
        BaseTextureBlue,
        BaseTextureAlpha,
        MaskTextureRed,
        MaskTextureGreen,
        MaskTextureBlue,
        MaskTextureAlpha,
        NormalTextureRed,
        NormalTextureGreen,
        NormalTextureBlue,
        NormalTextureAlpha,
        EmissiveTextureRed,
        EmissiveTextureGreen,
        EmissiveTextureBlue,
        EmissiveTextureAlpha,
    }
}

key_enum! {
    pub enum EmissiveColorSource { EmissiveTexture, BaseTexture, Constant }
}

key_enum! {
    pub enum AlphaValueSource { DiffuseAlpha, MaskRed, MaskGreen, MaskBlue }
}

key_enum! {
    pub enum ColorMultiplySource {
        None,
        BaseTextureRed,
        BaseTextureGreen,
        BaseTextureBlue,
        BaseTextureAlpha,
        MaskTextureRed,
        MaskTextureGreen,
        MaskTextureBlue,
        MaskTextureAlpha,
        VertexColorRed,
        VertexColorGreen,
        VertexColorBlue,
        VertexColorAlpha,
    }
}

key_enum! {
    pub enum EnvironmentBlendMode { Add, Lerp }
}

key_enum! {
    pub enum TextureBlendFactorSource { VertexColor, MaskTexture }
}

key_enum! {
    pub enum DepthShaderType { None, Normal, Shadow }
}

key_enum! {
    /// Selector for engine-owned full-screen and utility shaders.
    pub enum GlobalShaderType {
        None,
        GammaCorrection,
        Filter1,
        Filter4,
        Filter16,
        LUTBlender,
        UberPostProcess,
        LightShaftDownSample,
        LightShaftDownSampleNoDepth,
        LightShaftBlur,
        LightShaftApply,
        SimpleF32,
        PositionOnly,
        ShadowProjection,
        BloomGather,
        DOFAndBloomGather,
        MobileUberPostProcess1,
        MobileUberPostProcess3,
        MobileUberPostProcess4,
        MobileUberPostProcess5,
        MobileUberPostProcess7,
        VisualizeTexture,
        RadialBlur,
        FXAA,
    }
}

// ============================================================================
// Field Table
// ============================================================================

/// Static description of one key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    /// Which 64-bit half of the key the field lives in.
    pub half: u8,
    pub bits: u8,
    /// Exclusive upper bound on the stored value.
    pub max: u16,
}

impl FieldInfo {
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }
}

const BOOL: u16 = 2;

macro_rules! define_key_fields {
    ( $( $field:ident : half $half:literal, bits $bits:literal, max $max:expr; )* ) => {
        /// Every field of a program key, in packing order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum KeyField {
            $($field,)*
        }

        impl KeyField {
            pub const ALL: &'static [KeyField] = &[$(KeyField::$field),*];
            pub const COUNT: usize = Self::ALL.len();
        }

        pub const FIELD_INFO: [FieldInfo; KeyField::COUNT] = [
            $(FieldInfo { name: stringify!($field), half: $half, bits: $bits, max: $max },)*
        ];
    };
}

define_key_fields! {
    PlatformFeatures:                    half 0, bits 2,  max PlatformFeatures::COUNT;
    PrimitiveType:                       half 0, bits 3,  max PrimitiveType::COUNT;
    IsDepthOnlyRendering:                half 0, bits 1,  max BOOL;
    IsGradientFogEnabled:                half 0, bits 1,  max BOOL;
    ParticleScreenAlignment:             half 0, bits 2,  max ParticleScreenAlignment::COUNT;
    UseGammaCorrection:                  half 0, bits 1,  max BOOL;
    IsLightmap:                          half 0, bits 1,  max BOOL;
    IsSkinned:                           half 0, bits 1,  max BOOL;
    IsDecal:                             half 0, bits 1,  max BOOL;
    IsSubUV:                             half 0, bits 1,  max BOOL;
    BlendMode:                           half 0, bits 3,  max BlendMode::COUNT;
    BaseTextureTexCoordsSource:          half 0, bits 2,  max TexCoordsSource::COUNT;
    DetailTextureTexCoordsSource:        half 0, bits 2,  max TexCoordsSource::COUNT;
    MaskTextureTexCoordsSource:          half 0, bits 2,  max TexCoordsSource::COUNT;
    IsBaseTextureTransformed:            half 0, bits 1,  max BOOL;
    IsEmissiveTextureTransformed:        half 0, bits 1,  max BOOL;
    IsNormalTextureTransformed:          half 0, bits 1,  max BOOL;
    IsMaskTextureTransformed:            half 0, bits 1,  max BOOL;
    IsDetailTextureTransformed:          half 0, bits 1,  max BOOL;
    IsEnvironmentMappingEnabled:         half 0, bits 1,  max BOOL;
    EnvironmentBlendMode:                half 0, bits 1,  max EnvironmentBlendMode::COUNT;
    IsUsingThreeDetailTexture:           half 0, bits 1,  max BOOL;
    IsUsingTwoDetailTexture:             half 0, bits 1,  max BOOL;
    IsUsingOneDetailTexture:             half 0, bits 1,  max BOOL;
    TextureBlendFactorSource:            half 0, bits 1,  max TextureBlendFactorSource::COUNT;
    SpecularMask:                        half 0, bits 4,  max SpecularMask::COUNT;
    AmbientOcclusionSource:              half 0, bits 3,  max AmbientOcclusionSource::COUNT;
    UseUniformColorMultiply:             half 0, bits 1,  max BOOL;
    UseVertexColorMultiply:              half 0, bits 1,  max BOOL;
    IsRimLightingEnabled:                half 0, bits 1,  max BOOL;
    RimLightingMaskSource:               half 0, bits 5,  max ValueSource::COUNT;
    EnvironmentMaskSource:               half 0, bits 5,  max ValueSource::COUNT;
    IsEmissiveEnabled:                   half 0, bits 1,  max BOOL;
    EmissiveColorSource:                 half 0, bits 2,  max EmissiveColorSource::COUNT;
    EmissiveMaskSource:                  half 0, bits 5,  max ValueSource::COUNT;
    AlphaValueSource:                    half 0, bits 2,  max AlphaValueSource::COUNT;

    GlobalShaderType:                    half 1, bits 10, max GlobalShaderType::COUNT;
    DepthShaderType:                     half 1, bits 2,  max DepthShaderType::COUNT;
    ForwardShadowProjection:             half 1, bits 1,  max BOOL;
    IsDirectionalLightmap:               half 1, bits 1,  max BOOL;
    IsLightingEnabled:                   half 1, bits 1,  max BOOL;
    IsSpecularEnabled:                   half 1, bits 1,  max BOOL;
    IsPixelSpecularEnabled:              half 1, bits 1,  max BOOL;
    IsNormalMappingEnabled:              half 1, bits 1,  max BOOL;
    IsHeightFogEnabled:                  half 1, bits 1,  max BOOL;
    TwoSided:                            half 1, bits 1,  max BOOL;
    IsWaveVertexMovementEnabled:         half 1, bits 1,  max BOOL;
    IsDetailNormalEnabled:               half 1, bits 1,  max BOOL;
    IsEnvironmentFresnelEnabled:         half 1, bits 1,  max BOOL;
    IsBumpOffsetEnabled:                 half 1, bits 1,  max BOOL;
    IsColorGradingEnabled:               half 1, bits 1,  max BOOL;
    ColorMultiplySource:                 half 1, bits 4,  max ColorMultiplySource::COUNT;
    UseFallbackStreamColor:              half 1, bits 1,  max BOOL;
    IsLandscape:                         half 1, bits 1,  max BOOL;
    UseLandscapeMonochromeLayerBlending: half 1, bits 1,  max BOOL;
}

/// Bit offset of each field inside its half.
pub const FIELD_SHIFT: [u8; KeyField::COUNT] = compute_shifts();

const fn compute_shifts() -> [u8; KeyField::COUNT] {
    let mut shifts = [0u8; KeyField::COUNT];
    let mut used = [0u32; 2];
    let mut i = KeyField::COUNT;
    while i > 0 {
        i -= 1;
        let half = FIELD_INFO[i].half as usize;
        shifts[i] = used[half] as u8;
        used[half] += FIELD_INFO[i].bits as u32;
    }
    shifts
}

const _: () = {
    assert!(KeyField::COUNT <= 64, "lock mask holds at most 64 fields");
    let mut used = [0u32; 2];
    let mut i = 0;
    while i < KeyField::COUNT {
        let info = FIELD_INFO[i];
        assert!(info.half < 2, "key field half out of range");
        assert!(
            info.max as u32 <= 1u32 << info.bits,
            "key field max value exceeds its bit width"
        );
        used[info.half as usize] += info.bits as u32;
        i += 1;
    }
    assert!(used[0] <= 64, "key half 0 overflows 64 bits");
    assert!(used[1] <= 64, "key half 1 overflows 64 bits");
};

impl KeyField {
    #[inline]
    #[must_use]
    pub const fn info(self) -> FieldInfo {
        FIELD_INFO[self as usize]
    }

    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        FIELD_SHIFT[self as usize] as u32
    }

    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.info().name
    }

    /// Bit of this field inside a per-field `u64` mask.
    #[inline]
    #[must_use]
    pub(crate) const fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_widths() {
        let mut used = [0u32; 2];
        for field in KeyField::ALL {
            used[field.info().half as usize] += u32::from(field.info().bits);
        }
        assert_eq!(used[0], 64);
        assert_eq!(used[1], 32);
    }

    #[test]
    fn test_last_field_of_half_has_zero_shift() {
        assert_eq!(KeyField::AlphaValueSource.shift(), 0);
        assert_eq!(KeyField::UseLandscapeMonochromeLayerBlending.shift(), 0);
        assert_eq!(KeyField::PlatformFeatures.shift(), 62);
        assert_eq!(KeyField::GlobalShaderType.shift(), 22);
    }

    #[test]
    fn test_enum_counts_fit_widths() {
        for field in KeyField::ALL {
            let info = field.info();
            assert!(
                u32::from(info.max) <= 1u32 << info.bits,
                "{} does not fit {} bits",
                info.name,
                info.bits
            );
        }
    }

    #[test]
    fn test_enum_from_value() {
        assert_eq!(BlendMode::from_value(3), Some(BlendMode::Additive));
        assert_eq!(BlendMode::from_value(BlendMode::COUNT), None);
        assert_eq!(PrimitiveType::default(), PrimitiveType::Default);
    }
}
