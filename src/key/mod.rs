//! Program Key Codec
//!
//! Turns render state into a compact, collision-free [`ProgramKey`]:
//!
//! - [`fields`]: the ordered field table and the small value enums
//! - [`key_data`]: the named-field builder with per-field locks
//! - [`program_key`]: the packed 128-bit key
//! - [`state`]: derivation from a [`RenderState`] snapshot

pub mod fields;
pub mod key_data;
pub mod program_key;
pub mod state;

pub use fields::{
    AlphaValueSource, AmbientOcclusionSource, BlendMode, ColorMultiplySource, DepthShaderType,
    EmissiveColorSource, EnvironmentBlendMode, FieldInfo, GlobalShaderType, KeyField, KeyValue,
    ParticleScreenAlignment, PlatformFeatures, PrimitiveType, SpecularMask, TexCoordsSource,
    TextureBlendFactorSource, ValueSource,
};
pub use key_data::ProgramKeyData;
pub use program_key::ProgramKey;
pub use state::{MaterialSettings, RenderState, VertexFactoryFlags, minimized_key};
