#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Shader permutation cache for a mobile-class renderer.
//!
//! Render state is packed into a [`ProgramKey`]; the [`PermutationCache`]
//! compiles at most one backend program per (equivalence-folded) key and
//! each [`ProgramInstance`] uploads only the uniforms whose values changed.
//! [`ShaderCacheContext`] ties it together behind the draw-time API.

pub mod backend;
pub mod context;
pub mod errors;
pub mod key;
pub mod pipeline;
pub mod resources;
pub mod settings;
pub mod source;

pub use backend::{GraphicsBackend, ProgramHandle, StageHandle, UniformLocation, UniformUpload};
pub use context::{DrawBinding, FrameStats, ParameterName, ShaderCacheContext};
pub use errors::{Result, ShaderCacheError};
pub use key::{
    BlendMode, GlobalShaderType, KeyField, MaterialSettings, PlatformFeatures, PrimitiveType,
    ProgramKey, ProgramKeyData, RenderState, VertexFactoryFlags, minimized_key,
};
pub use pipeline::{Manifest, PermutationCache, ProgramId, ProgramInstance};
pub use resources::{ParameterStore, SetterKind, UniformArray, UniformSlot, UniformValue};
pub use settings::{CacheSettings, PlatformCaps};
pub use source::{
    ArchiveSourceProvider, DefineGenerator, ShaderArchive, ShaderSourceProvider, ShaderStage,
};
