//! Program pipeline.
//!
//! - [`PermutationCache`]: key → program storage with equivalence folding
//! - [`ProgramInstance`]: linked program, attribute map and uniform bindings
//! - [`Manifest`]: startup key list and equivalence groups
//! - [`warm_all`]: throwaway draws that force driver compilation

pub mod attributes;
pub mod cache;
pub mod equivalence;
pub mod instance;
pub mod manifest;
pub mod program_id;
pub mod warm;

pub use attributes::{AttributeMapping, AttributeMask, VertexUsage};
pub use cache::{BuildContext, CacheStats, PermutationCache, SharingPolicy};
pub use equivalence::EquivalenceIndex;
pub use instance::{ProgramInstance, SamplerBinding, StageRef, UniformBinding};
pub use manifest::{EquivalenceGroup, Manifest};
pub use program_id::ProgramId;
pub use warm::{WarmOptions, warm_all};
