//! Cache Settings & Platform Capabilities
//!
//! [`CacheSettings`] is the user-facing configuration, loadable from JSON.
//! [`PlatformCaps`] is the small capability struct resolved once at context
//! construction and consulted by key derivation and the warming pass.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use shader_permutation::settings::CacheSettings;
//!
//! let settings = CacheSettings {
//!     share_pixel_shaders: false,
//!     ..Default::default()
//! };
//!
//! let from_disk = CacheSettings::from_json_str(r#"{ "bone_count": 60 }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::backend::GraphicsBackend;
use crate::errors::Result;
use crate::key::PlatformFeatures;

/// Manifest version this build understands.
pub const SHADER_MANIFEST_VERSION: u32 = 5;

/// Number of logical vertex attributes an instance can remap.
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

// ---------------------------------------------------------------------------
// CacheSettings
// ---------------------------------------------------------------------------

/// Configuration for the permutation cache.
///
/// Every field has a default, so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Feature level keys are built for. Manifest keys for another level
    /// are skipped during precompilation.
    pub platform_features: PlatformFeaturesSetting,

    /// Bones supported by the skinning shaders. Sizes the bone-matrix slot.
    pub bone_count: u32,

    /// Look up pre-baked source in the archive before generating it.
    pub use_preprocessed_shaders: bool,

    /// Apply vertex equivalence groups from the manifest.
    pub share_vertex_shaders: bool,

    /// Apply pixel equivalence groups from the manifest.
    pub share_pixel_shaders: bool,

    /// Fold whole programs whose vertex and pixel masters match. Implies
    /// loading both kinds of equivalence groups.
    pub share_shader_programs: bool,

    /// Run the warming pass after precompiling manifest keys.
    pub warm_up_preprocessed_shaders: bool,

    /// Log every warmed key.
    pub debug_show_warmed_keys: bool,

    /// Strip features the platform level does not render.
    pub minimize_shaders: bool,

    /// Expected `version:` tag of the equivalence manifest.
    pub manifest_version: u32,
}

/// Serializable mirror of [`PlatformFeatures`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlatformFeaturesSetting {
    #[default]
    HighEnd,
    LowEnd,
}

impl From<PlatformFeaturesSetting> for PlatformFeatures {
    fn from(value: PlatformFeaturesSetting) -> Self {
        match value {
            PlatformFeaturesSetting::HighEnd => PlatformFeatures::HighEnd,
            PlatformFeaturesSetting::LowEnd => PlatformFeatures::LowEnd,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            platform_features: PlatformFeaturesSetting::HighEnd,
            bone_count: 75,
            use_preprocessed_shaders: true,
            share_vertex_shaders: true,
            share_pixel_shaders: true,
            share_shader_programs: true,
            warm_up_preprocessed_shaders: true,
            debug_show_warmed_keys: false,
            minimize_shaders: true,
            manifest_version: SHADER_MANIFEST_VERSION,
        }
    }
}

impl CacheSettings {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    #[inline]
    #[must_use]
    pub fn loads_vertex_groups(&self) -> bool {
        self.share_vertex_shaders || self.share_shader_programs
    }

    #[inline]
    #[must_use]
    pub fn loads_pixel_groups(&self) -> bool {
        self.share_pixel_shaders || self.share_shader_programs
    }
}

// ---------------------------------------------------------------------------
// PlatformCaps
// ---------------------------------------------------------------------------

/// Capabilities resolved once from settings and the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCaps {
    pub features: PlatformFeatures,
    pub minimize_shaders: bool,
    /// Vertex attribute slots the backend exposes, clamped to
    /// [`MAX_VERTEX_ATTRIBUTES`].
    pub max_vertex_attribs: u32,
}

impl PlatformCaps {
    #[must_use]
    pub fn resolve<B: GraphicsBackend + ?Sized>(settings: &CacheSettings, backend: &B) -> Self {
        Self {
            features: settings.platform_features.into(),
            minimize_shaders: settings.minimize_shaders,
            max_vertex_attribs: backend.max_vertex_attribs().min(MAX_VERTEX_ATTRIBUTES as u32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings =
            CacheSettings::from_json_str(r#"{ "bone_count": 60, "platform_features": "LowEnd" }"#)
                .unwrap();
        assert_eq!(settings.bone_count, 60);
        assert_eq!(settings.platform_features, PlatformFeaturesSetting::LowEnd);
        assert!(settings.share_vertex_shaders);
        assert_eq!(settings.manifest_version, SHADER_MANIFEST_VERSION);
    }

    #[test]
    fn test_program_sharing_implies_groups() {
        let settings = CacheSettings {
            share_vertex_shaders: false,
            share_pixel_shaders: false,
            share_shader_programs: true,
            ..Default::default()
        };
        assert!(settings.loads_vertex_groups());
        assert!(settings.loads_pixel_groups());
    }

    #[test]
    fn test_bad_json_is_error() {
        assert!(CacheSettings::from_json_str("{ bone_count: }").is_err());
    }
}
