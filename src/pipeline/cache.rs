//! Permutation Cache
//!
//! Central owner of every [`ProgramInstance`]. Instances are stored in a
//! contiguous `Vec` and addressed through [`ProgramId`] handles; program
//! keys resolve to ids through the instance table or, for keys folded into
//! an equivalence master, through the redirect table.
//!
//! # Lookup order
//!
//! 1. Instance table, then redirect table.
//! 2. Equivalence masters: borrow already compiled vertex / pixel stages,
//!    and when both masters already form a linked program, redirect the key
//!    to it without touching the backend.
//! 3. Compile the missing stages (one retry after reloading prefixes),
//!    link, bind, and store a new instance.
//! 4. If that fails, fall back once to the minimized key of the same
//!    primitive type. A second failure is [`ShaderCacheError::NoUsableProgram`].
//!
//! At most one backend program exists per master key.

use log::{debug, error, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::backend::{GraphicsBackend, StageHandle};
use crate::errors::{Result, ShaderCacheError};
use crate::key::{PlatformFeatures, ProgramKey, ProgramKeyData, minimized_key};
use crate::settings::CacheSettings;
use crate::source::{ShaderSourceProvider, ShaderStage, SourceRequest};

use super::equivalence::EquivalenceIndex;
use super::instance::{ProgramInstance, StageRef};
use super::program_id::ProgramId;

/// Counters kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub stages_compiled: u32,
    pub programs_linked: u32,
    pub vertex_stages_avoided: u32,
    pub pixel_stages_avoided: u32,
    pub programs_avoided: u32,
    pub fallbacks: u32,
}

/// Which equivalence relations the cache may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharingPolicy {
    pub vertex_shaders: bool,
    pub pixel_shaders: bool,
    pub programs: bool,
}

impl From<&CacheSettings> for SharingPolicy {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            vertex_shaders: settings.share_vertex_shaders,
            pixel_shaders: settings.share_pixel_shaders,
            programs: settings.share_shader_programs,
        }
    }
}

/// Collaborators needed to build a program.
pub struct BuildContext<'a, B: ?Sized, S: ?Sized> {
    pub backend: &'a mut B,
    pub source: &'a mut S,
}

pub struct PermutationCache {
    // ---- Storage (indexed by ProgramId) ----
    instances: Vec<Option<ProgramInstance>>,

    // ---- Lookups ----
    by_key: FxHashMap<ProgramKey, ProgramId>,
    redirects: FxHashMap<ProgramKey, ProgramKey>,
    equivalence: EquivalenceIndex,

    // ---- Bookkeeping ----
    compiled: FxHashSet<ProgramKey>,
    missing_preprocessed: Vec<String>,
    stats: CacheStats,

    sharing: SharingPolicy,
    features: PlatformFeatures,
}

impl PermutationCache {
    #[must_use]
    pub fn new(sharing: SharingPolicy, features: PlatformFeatures) -> Self {
        Self {
            instances: Vec::with_capacity(64),
            by_key: FxHashMap::default(),
            redirects: FxHashMap::default(),
            equivalence: EquivalenceIndex::new(),
            compiled: FxHashSet::default(),
            missing_preprocessed: Vec::new(),
            stats: CacheStats::default(),
            sharing,
            features,
        }
    }

    // ─── Retrieval ───────────────────────────────────────────────────────

    /// Instance for an id, or `None` once it has been cleared.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ProgramId) -> Option<&ProgramInstance> {
        self.instances.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ProgramId) -> Option<&mut ProgramInstance> {
        self.instances.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Resolves a key through the instance and redirect tables.
    #[must_use]
    pub fn lookup(&self, key: ProgramKey) -> Option<ProgramId> {
        if let Some(&id) = self.by_key.get(&key) {
            return Some(id);
        }
        let master = self.redirects.get(&key)?;
        self.by_key.get(master).copied()
    }

    /// Live instances in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ProgramId, &ProgramInstance)> {
        self.instances
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|inst| (ProgramId(i as u32), inst)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ProgramInstance> {
        self.instances.iter_mut().flatten()
    }

    #[inline]
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.by_key.len()
    }

    #[inline]
    #[must_use]
    pub fn compiled_count(&self) -> usize {
        self.compiled.len()
    }

    #[inline]
    #[must_use]
    pub fn is_compiled(&self, key: ProgramKey) -> bool {
        self.compiled.contains(&key)
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    #[inline]
    #[must_use]
    pub fn equivalence(&self) -> &EquivalenceIndex {
        &self.equivalence
    }

    #[inline]
    pub fn equivalence_mut(&mut self) -> &mut EquivalenceIndex {
        &mut self.equivalence
    }

    #[inline]
    #[must_use]
    pub fn sharing(&self) -> SharingPolicy {
        self.sharing
    }

    // ─── Get or create ───────────────────────────────────────────────────

    /// Returns the instance for `key`, building it on a miss.
    ///
    /// A key that cannot be built is redirected to the minimized key of its
    /// primitive type; later requests hit that redirect directly.
    pub fn get_or_create<B, S>(
        &mut self,
        key: ProgramKey,
        data: &ProgramKeyData,
        ctx: BuildContext<'_, B, S>,
    ) -> Result<ProgramId>
    where
        B: GraphicsBackend + ?Sized,
        S: ShaderSourceProvider + ?Sized,
    {
        if let Some(id) = self.lookup(key) {
            return Ok(id);
        }

        let BuildContext { backend, source } = ctx;
        let failure = match self.build(key, data, backend, source) {
            Ok(id) => return Ok(id),
            Err(e) => e,
        };

        let (fallback, fallback_data) = minimized_key(data.primitive_type())?;
        warn!("Program {key} unusable, falling back to {fallback}: {failure}");
        self.stats.fallbacks += 1;

        let id = match self.lookup(fallback) {
            Some(id) => id,
            None if fallback == key => {
                error!("Fallback program {fallback} is the failing key itself");
                return Err(ShaderCacheError::NoUsableProgram { key, fallback });
            }
            None => self.build(fallback, &fallback_data, backend, source).map_err(|e| {
                error!("Fallback program {fallback} failed to build: {e}");
                ShaderCacheError::NoUsableProgram { key, fallback }
            })?,
        };
        // Redirect to the key that owns the instance; the fallback may
        // itself be folded into an equivalence master.
        let target = self.get(id).map_or(fallback, ProgramInstance::key);
        self.redirects.insert(key, target);
        Ok(id)
    }

    /// Builds a key listed in a startup manifest.
    ///
    /// Keys for another platform tier and keys already compiled this run are
    /// skipped. Returns the instance when one was built or found.
    pub fn precompile<B, S>(
        &mut self,
        key: ProgramKey,
        ctx: BuildContext<'_, B, S>,
    ) -> Result<Option<ProgramId>>
    where
        B: GraphicsBackend + ?Sized,
        S: ShaderSourceProvider + ?Sized,
    {
        let data = ProgramKeyData::unpack(key);
        if data.platform_features() != self.features {
            debug!("Skipping {key}: built for {:?}", data.platform_features());
            return Ok(None);
        }
        if !self.compiled.insert(key) {
            return Ok(None);
        }
        if let Some(id) = self.lookup(key) {
            return Ok(Some(id));
        }
        self.build(key, &data, ctx.backend, ctx.source).map(Some)
    }

    #[allow(clippy::too_many_lines)]
    fn build<B, S>(
        &mut self,
        key: ProgramKey,
        data: &ProgramKeyData,
        backend: &mut B,
        source: &mut S,
    ) -> Result<ProgramId>
    where
        B: GraphicsBackend + ?Sized,
        S: ShaderSourceProvider + ?Sized,
    {
        let sharing = self.sharing;

        // ---- Equivalence masters ----
        let vertex_master = (sharing.vertex_shaders || sharing.programs)
            .then(|| self.equivalence.master(ShaderStage::Vertex, key))
            .flatten();
        let pixel_master = (sharing.pixel_shaders || sharing.programs)
            .then(|| self.equivalence.master(ShaderStage::Pixel, key))
            .flatten();

        let vertex = vertex_master
            .filter(|_| sharing.vertex_shaders)
            .and_then(|m| self.equivalence.stage(ShaderStage::Vertex, m))
            .map(|handle| StageRef {
                handle,
                owned: false,
            });
        let pixel = pixel_master
            .filter(|_| sharing.pixel_shaders)
            .and_then(|m| self.equivalence.stage(ShaderStage::Pixel, m))
            .map(|handle| StageRef {
                handle,
                owned: false,
            });

        if sharing.programs
            && vertex.is_some()
            && pixel.is_some()
            && let (Some(vm), Some(pm)) = (vertex_master, pixel_master)
            && let Some(existing) = self.equivalence.program(vm, pm)
            && let Some(&id) = self.by_key.get(&existing)
        {
            debug!("Program {key} shares linked program {existing}");
            self.redirects.insert(key, existing);
            self.stats.programs_avoided += 1;
            return Ok(id);
        }

        // ---- Compile missing stages ----
        if vertex.is_some() {
            self.stats.vertex_stages_avoided += 1;
        }
        if pixel.is_some() {
            self.stats.pixel_stages_avoided += 1;
        }

        let mut generated = false;
        let vertex = match vertex {
            Some(shared) => shared,
            None => StageRef {
                handle: self.compile_stage(key, data, ShaderStage::Vertex, backend, source, &mut generated)?,
                owned: true,
            },
        };
        let pixel = match pixel {
            Some(shared) => shared,
            None => match self.compile_stage(key, data, ShaderStage::Pixel, backend, source, &mut generated) {
                Ok(handle) => StageRef {
                    handle,
                    owned: true,
                },
                Err(e) => {
                    if vertex.owned {
                        backend.delete_stage(vertex.handle);
                    }
                    return Err(e);
                }
            },
        };

        if generated {
            self.missing_preprocessed.push(format!(
                "Key {key} was not preprocessed. This has been compiled from source"
            ));
        }

        // ---- Link ----
        let program = backend.create_program();
        let instance = match ProgramInstance::link(backend, program, key, data, vertex, pixel) {
            Ok(instance) => instance,
            Err(log) => {
                warn!("Failed to link program {key}:\n{log}");
                backend.delete_program(program);
                for stage in [vertex, pixel] {
                    if stage.owned {
                        backend.delete_stage(stage.handle);
                    }
                }
                return Err(ShaderCacheError::LinkFailed { key, log });
            }
        };
        self.stats.programs_linked += 1;

        if let Some(vm) = vertex_master
            && vertex.owned
        {
            self.equivalence.set_stage(ShaderStage::Vertex, vm, vertex.handle);
        }
        if let Some(pm) = pixel_master
            && pixel.owned
        {
            self.equivalence.set_stage(ShaderStage::Pixel, pm, pixel.handle);
        }
        if let (Some(vm), Some(pm)) = (vertex_master, pixel_master) {
            self.equivalence.set_program(vm, pm, key);
        }

        let id = ProgramId(self.instances.len() as u32);
        self.instances.push(Some(instance));
        self.by_key.insert(key, id);
        self.compiled.insert(key);
        debug!("Compiled program {key} as {id:?}");
        Ok(id)
    }

    /// Loads and compiles one stage, retrying once with reloaded prefixes
    /// when the backend rejects the source.
    fn compile_stage<B, S>(
        &mut self,
        key: ProgramKey,
        data: &ProgramKeyData,
        stage: ShaderStage,
        backend: &mut B,
        source: &mut S,
        generated: &mut bool,
    ) -> Result<StageHandle>
    where
        B: GraphicsBackend + ?Sized,
        S: ShaderSourceProvider + ?Sized,
    {
        let request = SourceRequest { key, data, stage };
        let mut failure = None;
        for attempt in 0..2 {
            if attempt > 0
                && let Err(e) = source.reload_prefixes()
            {
                warn!("Reloading shader prefixes failed: {e}");
            }
            let Some(text) = source.load(&request) else {
                warn!("No {stage:?} source for key {key}");
                return Err(ShaderCacheError::SourceNotFound { key, stage });
            };
            *generated |= !text.preprocessed;

            self.stats.stages_compiled += 1;
            match backend.compile_stage(stage, &text.text) {
                Ok(handle) => return Ok(handle),
                Err(log) => {
                    warn!("Failed to compile {stage:?} stage of {key} (attempt {}):\n{log}", attempt + 1);
                    failure = Some(log);
                }
            }
        }
        Err(ShaderCacheError::CompileFailed {
            key,
            stage,
            log: failure.unwrap_or_default(),
        })
    }

    // ─── Invalidation ────────────────────────────────────────────────────

    /// Forgets which keys were compiled this run.
    pub fn clear_compiled(&mut self) {
        self.compiled.clear();
    }

    /// Destroys the instance for `key` and everything that redirects to it,
    /// so the next request rebuilds it. Returns whether anything was removed.
    pub fn clear_one<B: GraphicsBackend + ?Sized>(&mut self, key: ProgramKey, backend: &mut B) -> bool {
        self.compiled.remove(&key);
        let redirected = self.redirects.remove(&key).is_some();

        let Some(id) = self.by_key.remove(&key) else {
            return redirected;
        };
        self.redirects.retain(|_, master| *master != key);
        self.equivalence.forget_program(key);

        if let Some(instance) = self.instances.get_mut(id.index()).and_then(Option::take) {
            for (stage, r) in [
                (ShaderStage::Vertex, instance.vertex_stage()),
                (ShaderStage::Pixel, instance.pixel_stage()),
            ] {
                if r.owned {
                    self.equivalence.forget_stage(stage, r.handle);
                }
            }
            instance.release(backend);
        }
        debug!("Cleared program {key}");
        true
    }

    /// Destroys every instance and resets the backend's bound program.
    /// Ids are never reissued, so stale ids keep resolving to `None`.
    pub fn clear_all<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        let count = self.by_key.len();
        for slot in &mut self.instances {
            if let Some(instance) = slot.take() {
                instance.release(backend);
            }
        }
        self.by_key.clear();
        self.redirects.clear();
        self.equivalence.clear_compiled();
        backend.reset_state();
        info!("Cleared {count} compiled shader programs");
    }

    /// Drops the equivalence groups and master stage tables. Called once
    /// the startup manifest has been applied.
    pub fn release_equivalence_groups(&mut self) {
        self.equivalence.release_groups();
    }

    // ─── Diagnostics ─────────────────────────────────────────────────────

    /// Keys that were built from generated rather than pre-baked source.
    #[must_use]
    pub fn missing_preprocessed(&self) -> &[String] {
        &self.missing_preprocessed
    }

    pub fn print_missing_shader_keys(&self) {
        if self.missing_preprocessed.is_empty() {
            info!("All compiled shader keys were preprocessed");
            return;
        }
        for line in &self.missing_preprocessed {
            warn!("{line}");
        }
        info!("{} shader keys were not preprocessed", self.missing_preprocessed.len());
    }
}
