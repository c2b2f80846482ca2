//! Program Key Builder
//!
//! [`ProgramKeyData`] is the unpacked, named-field view of a key used while it
//! is being derived from render state.
//!
//! # Lifecycle
//!
//! ```text
//! start() ─▶ assign / lock / override_value / reset / clear ─▶ stop() ─▶ packed()
//! ```
//!
//! `assign` is ignored for locked fields; `override_value` always writes.
//! Fields that were never written pack as zero.

use crate::errors::{Result, ShaderCacheError};
use crate::settings::PlatformCaps;

use super::fields::{
    DepthShaderType, KeyField, KeyValue, PlatformFeatures, PrimitiveType,
};
use super::program_key::ProgramKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Idle,
    Started,
    Stopped,
}

/// Named-field view of a [`ProgramKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramKeyData {
    values: [u16; KeyField::COUNT],
    locked: u64,
    state: BuildState,
}

impl Default for ProgramKeyData {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramKeyData {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: [0; KeyField::COUNT],
            locked: 0,
            state: BuildState::Idle,
        }
    }

    /// Unpacks a key into a stopped data set.
    #[must_use]
    pub fn unpack(key: ProgramKey) -> Self {
        let mut values = [0u16; KeyField::COUNT];
        for &field in KeyField::ALL {
            let info = field.info();
            let raw = (key.half(info.half as usize) >> field.shift()) & info.mask();
            values[field as usize] = raw as u16;
        }
        Self {
            values,
            locked: 0,
            state: BuildState::Stopped,
        }
    }

    /// Begins a new derivation, clearing every value and lock.
    pub fn start(&mut self) {
        self.values = [0; KeyField::COUNT];
        self.locked = 0;
        self.state = BuildState::Started;
    }

    /// Seals the data set so it can be packed.
    pub fn stop(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.state = BuildState::Stopped;
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state == BuildState::Started
    }

    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state == BuildState::Stopped
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.state {
            BuildState::Started => Ok(()),
            BuildState::Idle => Err(ShaderCacheError::KeyDataNotStarted),
            BuildState::Stopped => Err(ShaderCacheError::KeyDataSealed),
        }
    }

    fn checked(field: KeyField, value: u16) -> Result<u16> {
        let max = field.info().max;
        if value >= max {
            return Err(ShaderCacheError::FieldValueOutOfRange { field, value, max });
        }
        Ok(value)
    }

    // ─── Writes ─────────────────────────────────────────────────────────────

    /// Writes a field unless it is locked.
    pub fn assign(&mut self, field: KeyField, value: impl KeyValue) -> Result<()> {
        self.ensure_writable()?;
        let value = Self::checked(field, value.key_value())?;
        if !self.is_locked(field) {
            self.values[field as usize] = value;
        }
        Ok(())
    }

    /// Freezes (or releases) a field against further [`assign`](Self::assign).
    pub fn lock(&mut self, field: KeyField, locked: bool) -> Result<()> {
        self.ensure_writable()?;
        if locked {
            self.locked |= field.bit();
        } else {
            self.locked &= !field.bit();
        }
        Ok(())
    }

    /// Writes a field regardless of its lock.
    pub fn override_value(&mut self, field: KeyField, value: impl KeyValue) -> Result<()> {
        self.ensure_writable()?;
        let value = Self::checked(field, value.key_value())?;
        self.values[field as usize] = value;
        Ok(())
    }

    /// Returns a field to zero and releases its lock.
    pub fn reset(&mut self, field: KeyField) -> Result<()> {
        self.ensure_writable()?;
        self.values[field as usize] = 0;
        self.locked &= !field.bit();
        Ok(())
    }

    /// Zeroes every field and releases every lock.
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.values = [0; KeyField::COUNT];
        self.locked = 0;
        Ok(())
    }

    // ─── Reads ──────────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn value(&self, field: KeyField) -> u16 {
        self.values[field as usize]
    }

    #[inline]
    #[must_use]
    pub fn flag(&self, field: KeyField) -> bool {
        self.values[field as usize] != 0
    }

    #[inline]
    #[must_use]
    pub fn is_locked(&self, field: KeyField) -> bool {
        self.locked & field.bit() != 0
    }

    #[must_use]
    pub fn primitive_type(&self) -> PrimitiveType {
        PrimitiveType::from_value(self.value(KeyField::PrimitiveType)).unwrap_or_default()
    }

    #[must_use]
    pub fn platform_features(&self) -> PlatformFeatures {
        PlatformFeatures::from_value(self.value(KeyField::PlatformFeatures)).unwrap_or_default()
    }

    // ─── Packing ────────────────────────────────────────────────────────────

    /// Packs the stopped field buffer into a key.
    ///
    /// Debug builds unpack the result again and panic if any field fails to
    /// survive the trip.
    pub fn packed(&self) -> Result<ProgramKey> {
        if self.state != BuildState::Stopped {
            return Err(ShaderCacheError::KeyDataNotStopped);
        }
        let mut halves = [0u64; 2];
        for &field in KeyField::ALL {
            let info = field.info();
            halves[info.half as usize] |=
                (u64::from(self.values[field as usize]) & info.mask()) << field.shift();
        }
        let key = ProgramKey::from_halves(halves[0], halves[1]);

        #[cfg(debug_assertions)]
        {
            let check = Self::unpack(key);
            for &field in KeyField::ALL {
                assert!(
                    check.values[field as usize] == self.values[field as usize],
                    "program key self-check failed for {} ({} != {}), key {key}",
                    field.name(),
                    check.values[field as usize],
                    self.values[field as usize],
                );
            }
        }

        Ok(key)
    }

    // ─── Normalization ──────────────────────────────────────────────────────

    /// Canonicalizes fields that cannot affect the generated shader so that
    /// equivalent render states share one key. Must be called between
    /// `start()` and `stop()`.
    ///
    /// Locked fields survive every rule except the depth/shadow pass, which
    /// releases the detail-texture locks before clearing them.
    pub fn normalize(&mut self, caps: &PlatformCaps) -> Result<()> {
        use KeyField as F;

        self.ensure_writable()?;
        let primitive = self.primitive_type();

        if primitive == PrimitiveType::GlobalShader {
            for &field in KeyField::ALL {
                if !matches!(
                    field,
                    F::GlobalShaderType | F::PrimitiveType | F::BlendMode
                ) {
                    self.zero(&[field]);
                }
            }
            return Ok(());
        }

        // Irrelevant for the primitive family.
        if primitive != PrimitiveType::Default {
            self.zero(&[
                F::IsDepthOnlyRendering,
                F::IsSkinned,
                F::IsDecal,
                F::IsLightingEnabled,
                F::ForwardShadowProjection,
                F::IsLandscape,
            ]);
        }
        if primitive != PrimitiveType::Particle {
            self.zero(&[F::ParticleScreenAlignment, F::IsSubUV]);
        }
        if matches!(
            primitive,
            PrimitiveType::Simple | PrimitiveType::DistanceFieldFont
        ) {
            for &field in &KeyField::ALL[F::IsDepthOnlyRendering as usize..] {
                if !matches!(
                    field,
                    F::BlendMode | F::IsBaseTextureTransformed | F::PrimitiveType | F::PlatformFeatures
                ) {
                    self.zero(&[field]);
                }
            }
        }

        // Platform minimization.
        if caps.minimize_shaders {
            if self.platform_features() == PlatformFeatures::LowEnd {
                self.zero(&[
                    F::IsGradientFogEnabled,
                    F::IsHeightFogEnabled,
                    F::IsBumpOffsetEnabled,
                    F::IsEnvironmentMappingEnabled,
                    F::IsRimLightingEnabled,
                    F::IsSpecularEnabled,
                    F::IsPixelSpecularEnabled,
                    F::IsDetailNormalEnabled,
                    F::IsNormalMappingEnabled,
                ]);
                if !self.flag(F::IsLandscape) {
                    self.zero(&[
                        F::IsUsingOneDetailTexture,
                        F::IsUsingTwoDetailTexture,
                        F::IsUsingThreeDetailTexture,
                    ]);
                }
            } else {
                // High-end grading runs as a post process.
                self.zero(&[F::IsColorGradingEnabled]);
            }
        }

        if self.value(F::DepthShaderType) != DepthShaderType::None.value() {
            self.values[F::IsDepthOnlyRendering as usize] = 1;
        }

        if self.flag(F::IsDepthOnlyRendering) || self.flag(F::ForwardShadowProjection) {
            self.locked &= !(F::IsUsingOneDetailTexture.bit()
                | F::IsUsingTwoDetailTexture.bit()
                | F::IsUsingThreeDetailTexture.bit());
            self.zero(&[
                F::IsUsingOneDetailTexture,
                F::IsUsingTwoDetailTexture,
                F::IsUsingThreeDetailTexture,
                F::IsDecal,
                F::IsGradientFogEnabled,
                F::IsHeightFogEnabled,
                F::IsLightmap,
                F::IsDirectionalLightmap,
                F::IsLightingEnabled,
                F::BaseTextureTexCoordsSource,
                F::DetailTextureTexCoordsSource,
                F::MaskTextureTexCoordsSource,
                F::IsColorGradingEnabled,
                F::IsDetailTextureTransformed,
                F::IsBaseTextureTransformed,
                F::IsEmissiveTextureTransformed,
                F::IsNormalTextureTransformed,
                F::IsMaskTextureTransformed,
                F::BlendMode,
                F::AlphaValueSource,
                F::IsSubUV,
                F::TextureBlendFactorSource,
                F::UseVertexColorMultiply,
                F::ColorMultiplySource,
                F::UseFallbackStreamColor,
                F::UseLandscapeMonochromeLayerBlending,
                F::UseUniformColorMultiply,
                F::AmbientOcclusionSource,
                F::IsSpecularEnabled,
                F::IsDetailNormalEnabled,
                F::IsNormalMappingEnabled,
                F::IsEnvironmentMappingEnabled,
                F::EnvironmentBlendMode,
                F::IsBumpOffsetEnabled,
                F::IsRimLightingEnabled,
                F::IsEmissiveEnabled,
                F::EmissiveColorSource,
                F::TwoSided,
                F::EmissiveMaskSource,
                F::EnvironmentMaskSource,
            ]);
        } else if !self.flag(F::IsEmissiveEnabled) {
            self.zero(&[
                F::EmissiveColorSource,
                F::EmissiveMaskSource,
                F::IsEmissiveTextureTransformed,
            ]);
        }

        // Dependent fields follow their parent toggle.
        if !self.flag(F::IsNormalMappingEnabled) {
            self.zero(&[F::IsNormalTextureTransformed]);
        }
        if !self.flag(F::IsEnvironmentMappingEnabled) {
            self.zero(&[
                F::EnvironmentBlendMode,
                F::IsEnvironmentFresnelEnabled,
                F::EnvironmentMaskSource,
            ]);
        }
        if !self.flag(F::IsLightingEnabled) {
            self.zero(&[F::IsLightmap]);
        }
        if !self.flag(F::IsLightmap) {
            self.zero(&[F::IsDirectionalLightmap]);
        }
        if !self.flag(F::IsSpecularEnabled) {
            self.zero(&[F::IsPixelSpecularEnabled, F::SpecularMask]);
        }
        if !self.flag(F::IsRimLightingEnabled) {
            self.zero(&[F::RimLightingMaskSource]);
        }
        if !self.flag(F::IsUsingOneDetailTexture) {
            self.zero(&[
                F::IsDetailTextureTransformed,
                F::TextureBlendFactorSource,
                F::DetailTextureTexCoordsSource,
            ]);
        }
        if !self.flag(F::UseVertexColorMultiply) && !self.flag(F::UseUniformColorMultiply) {
            self.zero(&[F::ColorMultiplySource]);
        }
        if !self.flag(F::IsDepthOnlyRendering) {
            self.zero(&[F::DepthShaderType]);
        }
        if self.flag(F::IsLandscape) {
            self.zero(&[F::MaskTextureTexCoordsSource]);
        } else {
            self.zero(&[F::UseLandscapeMonochromeLayerBlending]);
        }

        Ok(())
    }

    /// Clears fields on behalf of system rules; locked fields keep their value.
    fn zero(&mut self, fields: &[KeyField]) {
        for &field in fields {
            if !self.is_locked(field) {
                self.values[field as usize] = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::fields::{BlendMode, GlobalShaderType};

    fn caps(features: PlatformFeatures, minimize: bool) -> PlatformCaps {
        PlatformCaps {
            features,
            minimize_shaders: minimize,
            max_vertex_attribs: 16,
        }
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut data = ProgramKeyData::new();
        assert!(matches!(
            data.assign(KeyField::IsLightmap, true),
            Err(ShaderCacheError::KeyDataNotStarted)
        ));
        data.start();
        assert!(matches!(
            data.packed(),
            Err(ShaderCacheError::KeyDataNotStopped)
        ));
        data.stop().unwrap();
        assert!(matches!(
            data.assign(KeyField::IsLightmap, true),
            Err(ShaderCacheError::KeyDataSealed)
        ));
    }

    #[test]
    fn test_lock_blocks_assign_but_not_override() {
        let mut data = ProgramKeyData::new();
        data.start();
        data.assign(KeyField::IsUsingOneDetailTexture, true).unwrap();
        data.lock(KeyField::IsUsingOneDetailTexture, true).unwrap();
        data.assign(KeyField::IsUsingOneDetailTexture, false).unwrap();
        assert!(data.flag(KeyField::IsUsingOneDetailTexture));

        data.override_value(KeyField::IsUsingOneDetailTexture, false).unwrap();
        assert!(!data.flag(KeyField::IsUsingOneDetailTexture));

        data.reset(KeyField::IsUsingOneDetailTexture).unwrap();
        assert!(!data.is_locked(KeyField::IsUsingOneDetailTexture));
    }

    #[test]
    fn test_out_of_range_value_rejected() {
        let mut data = ProgramKeyData::new();
        data.start();
        let err = data.assign(KeyField::PrimitiveType, 7u16).unwrap_err();
        assert!(matches!(
            err,
            ShaderCacheError::FieldValueOutOfRange { value: 7, max: 7, .. }
        ));
    }

    #[test]
    fn test_every_field_at_max_roundtrips() {
        let mut data = ProgramKeyData::new();
        data.start();
        for &field in KeyField::ALL {
            data.assign(field, field.info().max - 1).unwrap();
        }
        data.stop().unwrap();
        let key = data.packed().unwrap();
        let back = ProgramKeyData::unpack(key);
        for &field in KeyField::ALL {
            assert_eq!(back.value(field), data.value(field), "{}", field.name());
        }
        assert_eq!(back.packed().unwrap(), key);
    }

    #[test]
    fn test_normalize_global_shader_keeps_selector_only() {
        let mut data = ProgramKeyData::new();
        data.start();
        data.assign(KeyField::PrimitiveType, PrimitiveType::GlobalShader).unwrap();
        data.assign(KeyField::GlobalShaderType, GlobalShaderType::FXAA).unwrap();
        data.assign(KeyField::BlendMode, BlendMode::Translucent).unwrap();
        data.assign(KeyField::IsLightmap, true).unwrap();
        data.assign(KeyField::PlatformFeatures, PlatformFeatures::LowEnd).unwrap();
        data.normalize(&caps(PlatformFeatures::HighEnd, true)).unwrap();

        assert_eq!(data.value(KeyField::GlobalShaderType), GlobalShaderType::FXAA.value());
        assert_eq!(data.value(KeyField::BlendMode), BlendMode::Translucent.value());
        assert!(!data.flag(KeyField::IsLightmap));
        assert_eq!(data.value(KeyField::PlatformFeatures), 0);
    }

    #[test]
    fn test_normalize_depth_only_clears_material_state() {
        let mut data = ProgramKeyData::new();
        data.start();
        data.assign(KeyField::DepthShaderType, DepthShaderType::Shadow).unwrap();
        data.assign(KeyField::IsUsingOneDetailTexture, true).unwrap();
        data.lock(KeyField::IsUsingOneDetailTexture, true).unwrap();
        data.assign(KeyField::BlendMode, BlendMode::Masked).unwrap();
        data.assign(KeyField::IsEmissiveEnabled, true).unwrap();
        data.normalize(&caps(PlatformFeatures::HighEnd, false)).unwrap();

        assert!(data.flag(KeyField::IsDepthOnlyRendering));
        assert_eq!(data.value(KeyField::DepthShaderType), DepthShaderType::Shadow.value());
        assert!(!data.flag(KeyField::IsUsingOneDetailTexture));
        assert!(!data.is_locked(KeyField::IsUsingOneDetailTexture));
        assert_eq!(data.value(KeyField::BlendMode), 0);
        assert!(!data.flag(KeyField::IsEmissiveEnabled));
    }

    #[test]
    fn test_normalize_lighting_chain() {
        let mut data = ProgramKeyData::new();
        data.start();
        data.assign(KeyField::IsLightmap, true).unwrap();
        data.assign(KeyField::IsDirectionalLightmap, true).unwrap();
        data.normalize(&caps(PlatformFeatures::HighEnd, false)).unwrap();
        assert!(!data.flag(KeyField::IsLightmap));
        assert!(!data.flag(KeyField::IsDirectionalLightmap));
    }

    #[test]
    fn test_normalize_low_end_minimization() {
        let mut data = ProgramKeyData::new();
        data.start();
        data.assign(KeyField::PlatformFeatures, PlatformFeatures::LowEnd).unwrap();
        data.assign(KeyField::IsSpecularEnabled, true).unwrap();
        data.assign(KeyField::IsHeightFogEnabled, true).unwrap();
        data.assign(KeyField::IsColorGradingEnabled, true).unwrap();
        data.normalize(&caps(PlatformFeatures::LowEnd, true)).unwrap();
        assert!(!data.flag(KeyField::IsSpecularEnabled));
        assert!(!data.flag(KeyField::IsHeightFogEnabled));
        assert!(data.flag(KeyField::IsColorGradingEnabled));
    }

    #[test]
    fn test_normalize_respects_detail_texture_lock() {
        let mut data = ProgramKeyData::new();
        data.start();
        data.assign(KeyField::PlatformFeatures, PlatformFeatures::LowEnd).unwrap();
        data.assign(KeyField::IsUsingOneDetailTexture, true).unwrap();
        data.lock(KeyField::IsUsingOneDetailTexture, true).unwrap();
        data.normalize(&caps(PlatformFeatures::LowEnd, true)).unwrap();
        assert!(data.flag(KeyField::IsUsingOneDetailTexture));
    }

    #[test]
    fn test_normalize_simple_keeps_blend_and_transform() {
        let mut data = ProgramKeyData::new();
        data.start();
        data.assign(KeyField::PrimitiveType, PrimitiveType::Simple).unwrap();
        data.assign(KeyField::BlendMode, BlendMode::Additive).unwrap();
        data.assign(KeyField::IsBaseTextureTransformed, true).unwrap();
        data.assign(KeyField::TwoSided, true).unwrap();
        data.assign(KeyField::IsGradientFogEnabled, true).unwrap();
        data.normalize(&caps(PlatformFeatures::HighEnd, false)).unwrap();
        assert_eq!(data.value(KeyField::BlendMode), BlendMode::Additive.value());
        assert!(data.flag(KeyField::IsBaseTextureTransformed));
        assert!(!data.flag(KeyField::TwoSided));
        assert!(!data.flag(KeyField::IsGradientFogEnabled));
    }
}
