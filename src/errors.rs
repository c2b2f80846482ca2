//! Error Types
//!
//! This module defines the error types used throughout the shader cache.
//!
//! # Overview
//!
//! The main error type [`ShaderCacheError`] covers the failure modes that can
//! leave the subsystem:
//! - Parameter store misuse (oversized writes, unknown names)
//! - Key builder misuse (writes outside `start()..stop()`)
//! - Archive and settings decoding
//! - The unrecoverable "no usable program" outcome of the fallback path
//!
//! Source misses, first-attempt compile failures and warm-time validation
//! failures are handled locally and only logged; they never reach callers.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, ShaderCacheError>`.

use thiserror::Error;

use crate::key::{KeyField, ProgramKey};
use crate::pipeline::ProgramId;
use crate::resources::uniform_slot::UniformSlot;
use crate::source::ShaderStage;

/// The main error type for the shader permutation cache.
#[derive(Error, Debug)]
pub enum ShaderCacheError {
    // ========================================================================
    // Parameter Store Errors
    // ========================================================================
    /// A write would overflow the slot's fixed float capacity.
    #[error("Parameter {slot:?} too large: capacity {capacity} floats, requested {requested}")]
    ParameterTooLarge {
        slot: UniformSlot,
        capacity: usize,
        requested: usize,
    },

    /// A boundary lookup used a name that is not a standard slot.
    #[error("Unknown uniform name: {0}")]
    UnknownUniformName(String),

    /// An untyped write could not be mapped to a setter for this slot size.
    #[error("Unsupported size {floats} for untyped write to {slot:?}")]
    UnsupportedSlotSize { slot: UniformSlot, floats: usize },

    // ========================================================================
    // Key Codec Errors
    // ========================================================================
    /// A raw value does not fit the field's bit width.
    #[error("Value {value} out of range for key field {field:?} (max {max})")]
    FieldValueOutOfRange { field: KeyField, value: u16, max: u16 },

    /// The key builder was written to before `start()`.
    #[error("Program key data used before start()")]
    KeyDataNotStarted,

    /// The key builder was written to after `stop()`.
    #[error("Program key data is sealed; call start() to build a new key")]
    KeyDataSealed,

    /// A packed key was requested before `stop()`.
    #[error("Program key data must be stopped before packing")]
    KeyDataNotStopped,

    /// A textual key could not be parsed.
    #[error("Invalid program key string: {0:?}")]
    InvalidKeyString(String),

    // ========================================================================
    // Source & Archive Errors
    // ========================================================================
    /// Neither the archive nor the generator produced text for a stage.
    #[error("No source for {stage:?} stage of key {key}")]
    SourceNotFound { key: ProgramKey, stage: ShaderStage },

    /// An archive index file could not be decoded.
    #[error("Archive index corrupt: {0}")]
    ArchiveIndexCorrupt(String),

    /// An index entry points outside the blob.
    #[error("Archive entry {name:?} out of bounds (offset {offset}, size {size})")]
    ArchiveEntryOutOfBounds { name: String, offset: u32, size: u32 },

    /// An archive entry is not valid UTF-8 text.
    #[error("Archive entry {0:?} is not valid UTF-8")]
    ArchiveEntryNotText(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// A shader stage failed to compile on both attempts.
    #[error("Failed to compile {stage:?} stage of key {key}:\n{log}")]
    CompileFailed {
        key: ProgramKey,
        stage: ShaderStage,
        log: String,
    },

    /// A program failed to link.
    #[error("Failed to link program for key {key}:\n{log}")]
    LinkFailed { key: ProgramKey, log: String },

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Both the requested key and its minimized fallback failed to build.
    #[error("No usable program for key {key} (fallback {fallback} also failed)")]
    NoUsableProgram { key: ProgramKey, fallback: ProgramKey },

    /// A program id or key did not name a live instance.
    #[error("Unknown program for key {0}")]
    UnknownProgram(ProgramKey),

    /// A program id names an instance that has been cleared.
    #[error("Program id {0:?} does not name a live instance")]
    StaleProgramId(ProgramId),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings JSON could not be decoded.
    #[error("Settings parse error: {0}")]
    SettingsError(#[from] serde_json::Error),
}

/// Alias for `Result<T, ShaderCacheError>`.
pub type Result<T> = std::result::Result<T, ShaderCacheError>;
