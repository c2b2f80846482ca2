//! Uniform slots and the versioned parameter store.

pub mod uniform_slot;
pub mod uniform_value;
pub mod version_tracker;

pub use uniform_slot::{FLOATS_PER_BONE, SLOT_INFO, SlotInfo, SlotRegistry, UniformSlot};
pub use uniform_value::{SetterKind, UniformArray, UniformValue};
pub use version_tracker::{ParameterStore, VersionedParameter};
