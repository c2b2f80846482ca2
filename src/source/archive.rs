//! Pre-baked Shader Archive
//!
//! A single blob file plus one index per category. Each index maps a name
//! to a packed `u64`: offset in the high 32 bits, size in the low 32 bits.
//!
//! | File | Contents |
//! |------|----------|
//! | `AllShaders.bin` | concatenated source text |
//! | `EngineShadersInfo.bin` | index of family bodies and prefix files |
//! | `PreprocessedShadersInfo.bin` | index of per-key preprocessed stages (optional) |
//!
//! Index encoding: `u32` LE entry count, then per entry a `u32` LE name
//! length, the UTF-8 name, and the `u64` LE packed location.

use std::path::Path;

use log::{debug, warn};
use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_64;

use crate::errors::{Result, ShaderCacheError};

use super::generator::{Prefixes, SourceGenerator};
use super::{ShaderSourceProvider, SourceRequest, StageSource, shader_name};

pub const BLOB_FILE: &str = "AllShaders.bin";
pub const ENGINE_INDEX_FILE: &str = "EngineShadersInfo.bin";
pub const PREPROCESSED_INDEX_FILE: &str = "PreprocessedShadersInfo.bin";

pub const PREFIX_COMMON: &str = "Prefix_Common.msf";
pub const PREFIX_VERTEX: &str = "Prefix_VertexShader.msf";
pub const PREFIX_PIXEL: &str = "Prefix_PixelShader.msf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveCategory {
    Engine,
    Preprocessed,
}

#[inline]
#[must_use]
pub const fn pack_location(offset: u32, size: u32) -> u64 {
    ((offset as u64) << 32) | size as u64
}

#[inline]
#[must_use]
pub const fn unpack_location(packed: u64) -> (u32, u32) {
    ((packed >> 32) as u32, packed as u32)
}

const MIN_ENTRY_BYTES: usize = 4 + 8;

/// Decodes one index file.
pub fn parse_index(bytes: &[u8]) -> Result<FxHashMap<String, u64>> {
    let mut reader = ByteReader { bytes, pos: 0 };
    let count = reader.u32()? as usize;
    // Every entry takes at least a name length and a packed location.
    let max_entries = bytes.len().saturating_sub(4) / MIN_ENTRY_BYTES;
    if count > max_entries {
        return Err(ShaderCacheError::ArchiveIndexCorrupt(format!(
            "{count} entries declared, at most {max_entries} fit in {} bytes",
            bytes.len()
        )));
    }
    let mut index = FxHashMap::default();
    index.reserve(count);
    for _ in 0..count {
        let len = reader.u32()? as usize;
        let name = std::str::from_utf8(reader.take(len)?)
            .map_err(|e| ShaderCacheError::ArchiveIndexCorrupt(format!("entry name: {e}")))?
            .to_owned();
        let packed = reader.u64()?;
        index.insert(name, packed);
    }
    if reader.pos != bytes.len() {
        return Err(ShaderCacheError::ArchiveIndexCorrupt(format!(
            "{} trailing bytes",
            bytes.len() - reader.pos
        )));
    }
    Ok(index)
}

/// Encodes an index file. Entry order is preserved.
#[must_use]
pub fn encode_index<'a>(entries: impl IntoIterator<Item = (&'a str, u64)>) -> Vec<u8> {
    let entries: Vec<_> = entries.into_iter().collect();
    let mut out = Vec::with_capacity(4 + entries.len() * 32);
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (name, packed) in entries {
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&packed.to_le_bytes());
    }
    out
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                ShaderCacheError::ArchiveIndexCorrupt(format!(
                    "truncated at byte {} (wanted {len})",
                    self.pos
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }
}

// ─── ShaderArchive ───────────────────────────────────────────────────────────

/// In-memory view of the blob and its indices.
#[derive(Debug, Clone, Default)]
pub struct ShaderArchive {
    blob: Vec<u8>,
    engine: FxHashMap<String, u64>,
    preprocessed: FxHashMap<String, u64>,
}

impl ShaderArchive {
    /// Reads the archive files from `dir`. The preprocessed index is
    /// optional.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let blob = std::fs::read(dir.join(BLOB_FILE))?;
        let engine = std::fs::read(dir.join(ENGINE_INDEX_FILE))?;
        let preprocessed = match std::fs::read(dir.join(PREPROCESSED_INDEX_FILE)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Self::from_parts(blob, &engine, preprocessed.as_deref())
    }

    pub fn from_parts(blob: Vec<u8>, engine_index: &[u8], preprocessed_index: Option<&[u8]>) -> Result<Self> {
        let engine = parse_index(engine_index)?;
        let preprocessed = match preprocessed_index {
            Some(bytes) => parse_index(bytes)?,
            None => FxHashMap::default(),
        };
        debug!(
            "Shader archive: {} bytes, {} engine entries, {} preprocessed entries",
            blob.len(),
            engine.len(),
            preprocessed.len()
        );
        Ok(Self {
            blob,
            engine,
            preprocessed,
        })
    }

    fn index(&self, category: ArchiveCategory) -> &FxHashMap<String, u64> {
        match category {
            ArchiveCategory::Engine => &self.engine,
            ArchiveCategory::Preprocessed => &self.preprocessed,
        }
    }

    #[must_use]
    pub fn contains(&self, category: ArchiveCategory, name: &str) -> bool {
        self.index(category).contains_key(name)
    }

    #[must_use]
    pub fn len(&self, category: ArchiveCategory) -> usize {
        self.index(category).len()
    }

    /// Text of an entry, or `Ok(None)` if the name is not indexed.
    pub fn read(&self, category: ArchiveCategory, name: &str) -> Result<Option<&str>> {
        let Some(&packed) = self.index(category).get(name) else {
            return Ok(None);
        };
        let (offset, size) = unpack_location(packed);
        let start = offset as usize;
        let end = start + size as usize;
        let bytes = self.blob.get(start..end).ok_or_else(|| {
            ShaderCacheError::ArchiveEntryOutOfBounds {
                name: name.to_owned(),
                offset,
                size,
            }
        })?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ShaderCacheError::ArchiveEntryNotText(name.to_owned()))?;
        Ok(Some(text))
    }

    /// Drops the per-key index once bulk loading is done.
    pub fn release_preprocessed_index(&mut self) {
        self.preprocessed = FxHashMap::default();
    }

    /// Reads the three prefix files. Missing prefixes read as empty.
    pub fn prefixes(&self) -> Result<Prefixes> {
        let read = |name| -> Result<String> {
            Ok(self
                .read(ArchiveCategory::Engine, name)?
                .unwrap_or_default()
                .to_owned())
        };
        Ok(Prefixes {
            common: read(PREFIX_COMMON)?,
            vertex: read(PREFIX_VERTEX)?,
            pixel: read(PREFIX_PIXEL)?,
        })
    }
}

/// Name of a key's preprocessed stage inside the archive.
#[must_use]
pub fn preprocessed_entry_name(request: &SourceRequest<'_>) -> String {
    format!("{}\\{}.msf.i", request.key, shader_name(request.data, request.stage))
}

// ─── ArchiveSourceProvider ───────────────────────────────────────────────────

/// Serves pre-baked text when present and falls back to a generator.
pub struct ArchiveSourceProvider<G: SourceGenerator> {
    archive: ShaderArchive,
    generator: G,
    use_preprocessed: bool,
    prefixes: Option<Prefixes>,
}

impl<G: SourceGenerator> ArchiveSourceProvider<G> {
    #[must_use]
    pub fn new(archive: ShaderArchive, generator: G, use_preprocessed: bool) -> Self {
        Self {
            archive,
            generator,
            use_preprocessed,
            prefixes: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn archive(&self) -> &ShaderArchive {
        &self.archive
    }

    fn load_preprocessed(&self, request: &SourceRequest<'_>) -> Option<StageSource> {
        let entry = preprocessed_entry_name(request);
        match self.archive.read(ArchiveCategory::Preprocessed, &entry) {
            Ok(Some(text)) if !text.is_empty() => {
                debug!("Loaded {entry} ({:016x})", xxh3_64(text.as_bytes()));
                Some(StageSource {
                    text: text.to_owned(),
                    preprocessed: true,
                })
            }
            Ok(_) => {
                warn!("Preprocessed shader {entry} not found in archive");
                None
            }
            Err(e) => {
                warn!("Preprocessed shader {entry} unreadable: {e}");
                None
            }
        }
    }

    fn generate(&mut self, request: &SourceRequest<'_>) -> Option<StageSource> {
        if self.prefixes.is_none() {
            match self.archive.prefixes() {
                Ok(prefixes) => self.prefixes = Some(prefixes),
                Err(e) => {
                    warn!("Failed to load shader prefixes: {e}");
                    return None;
                }
            }
        }
        let name = format!("{}.msf", shader_name(request.data, request.stage));
        let body = match self.archive.read(ArchiveCategory::Engine, &name) {
            Ok(Some(body)) => body,
            Ok(None) => {
                warn!("Shader body {name} not found in archive");
                return None;
            }
            Err(e) => {
                warn!("Shader body {name} unreadable: {e}");
                return None;
            }
        };
        let prefixes = self.prefixes.as_ref()?;
        let text = self.generator.generate(request, prefixes, body)?;
        debug!("Generated {name} for key {} ({:016x})", request.key, xxh3_64(text.as_bytes()));
        Some(StageSource {
            text,
            preprocessed: false,
        })
    }
}

impl<G: SourceGenerator> ShaderSourceProvider for ArchiveSourceProvider<G> {
    fn load(&mut self, request: &SourceRequest<'_>) -> Option<StageSource> {
        if self.use_preprocessed
            && let Some(source) = self.load_preprocessed(request)
        {
            return Some(source);
        }
        self.generate(request)
    }

    fn reload_prefixes(&mut self) -> Result<()> {
        self.prefixes = Some(self.archive.prefixes()?);
        Ok(())
    }

    fn release_preprocessed(&mut self) {
        self.archive.release_preprocessed_index();
    }
}
