//! Program Key Tests
//!
//! Tests for:
//! - Round-trip: derived keys unpack to the exact field values they packed
//! - Textual keys: manifest spelling parses back to the same key
//! - Canonicalization: equivalent render states share one key, relevant
//!   differences never collide
//! - Platform minimization of low-end keys

use std::collections::HashSet;

use shader_permutation::key::{
    EnvironmentBlendMode, GlobalShaderType, ParticleScreenAlignment, SpecularMask,
};
use shader_permutation::{
    BlendMode, KeyField, PlatformCaps, PlatformFeatures, PrimitiveType, ProgramKey,
    ProgramKeyData, RenderState, VertexFactoryFlags,
};

fn caps(features: PlatformFeatures) -> PlatformCaps {
    PlatformCaps {
        features,
        minimize_shaders: true,
        max_vertex_attribs: 16,
    }
}

fn sample_states() -> Vec<RenderState> {
    let mut lit = RenderState {
        vertex_factory: VertexFactoryFlags::LIGHTMAP | VertexFactoryFlags::DIRECTIONAL_LIGHTMAP,
        height_fog: true,
        ..Default::default()
    };
    lit.material.lighting = true;
    lit.material.normal_mapping = true;
    lit.material.specular = true;
    lit.material.specular_mask = SpecularMask::MaskRed;

    let mut skinned = RenderState {
        vertex_factory: VertexFactoryFlags::GPU_SKINNING,
        blend_mode: BlendMode::Masked,
        ..Default::default()
    };
    skinned.material.environment_mapping = true;
    skinned.material.environment_blend_mode = EnvironmentBlendMode::Lerp;
    skinned.material.rim_lighting = true;

    vec![
        RenderState::default(),
        lit,
        skinned,
        RenderState {
            primitive_type: PrimitiveType::Particle,
            particle_screen_alignment: ParticleScreenAlignment::LockedAxis,
            vertex_factory: VertexFactoryFlags::SUB_UV_PARTICLES,
            blend_mode: BlendMode::Additive,
            ..Default::default()
        },
        RenderState {
            primitive_type: PrimitiveType::Simple,
            distance_field_font: true,
            blend_mode: BlendMode::Translucent,
            ..Default::default()
        },
        RenderState {
            primitive_type: PrimitiveType::GlobalShader,
            global_shader_type: GlobalShaderType::MobileUberPostProcess5,
            ..Default::default()
        },
    ]
}

// ============================================================================
// Round-trip
// ============================================================================

#[test]
fn derived_keys_unpack_to_their_fields() {
    for features in [PlatformFeatures::HighEnd, PlatformFeatures::LowEnd] {
        for state in sample_states() {
            let (key, data) = state.derive_key(&caps(features)).unwrap();
            let unpacked = ProgramKeyData::unpack(key);

            for &field in KeyField::ALL {
                assert_eq!(
                    unpacked.value(field),
                    data.value(field),
                    "Field {field:?} lost in packing for {state:?}"
                );
            }
            assert_eq!(unpacked.packed().unwrap(), key);
        }
    }
}

#[test]
fn key_text_parses_back() {
    for state in sample_states() {
        let (key, _) = state.derive_key(&caps(PlatformFeatures::HighEnd)).unwrap();
        let text = key.to_string();

        assert_eq!(text.parse::<ProgramKey>().unwrap(), key);
        assert_eq!(ProgramKey::parse_hex(&format!("0x{text}\r")).unwrap(), key);
    }
}

// ============================================================================
// Canonicalization
// ============================================================================

#[test]
fn sample_states_have_distinct_keys() {
    let keys: HashSet<ProgramKey> = sample_states()
        .iter()
        .map(|s| s.derive_key(&caps(PlatformFeatures::HighEnd)).unwrap().0)
        .collect();
    assert_eq!(keys.len(), sample_states().len());
}

#[test]
fn global_shader_key_ignores_material_state() {
    let plain = RenderState {
        primitive_type: PrimitiveType::GlobalShader,
        global_shader_type: GlobalShaderType::FXAA,
        ..Default::default()
    };
    let mut noisy = plain;
    noisy.height_fog = true;
    noisy.vertex_factory = VertexFactoryFlags::GPU_SKINNING;
    noisy.material.lighting = true;

    let high = caps(PlatformFeatures::HighEnd);
    let (a, _) = plain.derive_key(&high).unwrap();
    let (b, data) = noisy.derive_key(&high).unwrap();

    assert_eq!(a, b);
    assert_eq!(data.value(KeyField::GlobalShaderType), GlobalShaderType::FXAA as u16);
}

#[test]
fn lightmap_without_lighting_is_dropped() {
    let unlit = RenderState {
        vertex_factory: VertexFactoryFlags::LIGHTMAP,
        ..Default::default()
    };
    let (_, data) = unlit.derive_key(&caps(PlatformFeatures::HighEnd)).unwrap();
    assert!(!data.flag(KeyField::IsLightmap));
}

#[test]
fn low_end_minimization_strips_expensive_features() {
    let mut state = RenderState {
        height_fog: true,
        ..Default::default()
    };
    state.material.lighting = true;
    state.material.normal_mapping = true;
    state.material.rim_lighting = true;

    let (_, high) = state.derive_key(&caps(PlatformFeatures::HighEnd)).unwrap();
    let (_, low) = state.derive_key(&caps(PlatformFeatures::LowEnd)).unwrap();

    assert!(high.flag(KeyField::IsHeightFogEnabled));
    assert!(!low.flag(KeyField::IsHeightFogEnabled));
    assert!(!low.flag(KeyField::IsNormalMappingEnabled));
    assert!(!low.flag(KeyField::IsRimLightingEnabled));
    assert_eq!(low.platform_features(), PlatformFeatures::LowEnd);
}
