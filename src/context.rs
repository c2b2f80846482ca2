//! Shader Cache Context
//!
//! [`ShaderCacheContext`] is the one object the renderer talks to. It owns
//! the settings, the resolved [`PlatformCaps`], the parameter store, the
//! permutation cache, the backend and the source provider, plus the
//! per-draw state that used to be process-wide: the current program, the
//! active attribute mapping and the next-draw global shader hint.
//!
//! # Per-draw flow
//!
//! ```text
//! set_uniform / set_shader_parameter   (any time before the draw)
//!            │
//! prepare_draw(state)
//!   ├─ derive_key ─▶ get_or_create ─▶ ProgramId
//!   ├─ activate ─▶ switched?
//!   └─ sync_uniforms(switched) ─▶ uploads
//! ```
//!
//! Everything runs on the thread that owns the backend. There is no
//! internal locking.

use log::{debug, info, warn};

use crate::backend::GraphicsBackend;
use crate::errors::{Result, ShaderCacheError};
use crate::key::{GlobalShaderType, PrimitiveType, ProgramKey, ProgramKeyData, RenderState};
use crate::pipeline::{
    AttributeMapping, BuildContext, Manifest, PermutationCache, ProgramId, ProgramInstance,
    SharingPolicy, WarmOptions, warm_all,
};
use crate::resources::{ParameterStore, UniformArray, UniformSlot, UniformValue};
use crate::settings::{CacheSettings, PlatformCaps};
use crate::source::{ShaderSourceProvider, ShaderStage};

/// Result of [`ShaderCacheContext::prepare_draw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawBinding {
    pub id: ProgramId,
    pub key: ProgramKey,
    pub switched: bool,
    pub uploads: usize,
}

/// Counters reset by [`ShaderCacheContext::new_frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draws: u32,
    pub program_switches: u32,
    pub uniform_uploads: u32,
}

/// Which symbolic slot a boundary write addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterName<'a> {
    Slot(UniformSlot),
    Engine(&'a str),
}

impl From<UniformSlot> for ParameterName<'_> {
    fn from(slot: UniformSlot) -> Self {
        Self::Slot(slot)
    }
}

impl<'a> From<&'a str> for ParameterName<'a> {
    fn from(name: &'a str) -> Self {
        Self::Engine(name)
    }
}

pub struct ShaderCacheContext<B: GraphicsBackend, S: ShaderSourceProvider> {
    settings: CacheSettings,
    caps: PlatformCaps,
    params: ParameterStore,
    cache: PermutationCache,
    backend: B,
    source: S,

    // ---- Draw state ----
    current: Option<ProgramId>,
    active_attributes: AttributeMapping,
    next_global_shader: GlobalShaderType,
    frame: FrameStats,
    frame_index: u64,
}

impl<B: GraphicsBackend, S: ShaderSourceProvider> ShaderCacheContext<B, S> {
    #[must_use]
    pub fn new(settings: CacheSettings, backend: B, source: S) -> Self {
        let caps = PlatformCaps::resolve(&settings, &backend);
        info!(
            "Shader cache: {:?}, {} vertex attributes, {} bones",
            caps.features, caps.max_vertex_attribs, settings.bone_count
        );
        Self {
            params: ParameterStore::new(settings.bone_count),
            cache: PermutationCache::new(SharingPolicy::from(&settings), caps.features),
            settings,
            caps,
            backend,
            source,
            current: None,
            active_attributes: AttributeMapping::UNUSED,
            next_global_shader: GlobalShaderType::None,
            frame: FrameStats::default(),
            frame_index: 0,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn caps(&self) -> &PlatformCaps {
        &self.caps
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &PermutationCache {
        &self.cache
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[inline]
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    #[inline]
    #[must_use]
    pub fn instance(&self, id: ProgramId) -> Option<&ProgramInstance> {
        self.cache.get(id)
    }

    /// Program most recently activated through this context.
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<ProgramId> {
        self.current
    }

    /// Attribute mapping of the last program switched to.
    #[inline]
    #[must_use]
    pub fn active_attributes(&self) -> &AttributeMapping {
        &self.active_attributes
    }

    #[inline]
    #[must_use]
    pub fn frame_stats(&self) -> FrameStats {
        self.frame
    }

    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    // ─── Draw path ───────────────────────────────────────────────────────

    /// Derives the key for `state`, makes its program current and pushes
    /// changed uniforms.
    pub fn prepare_draw(&mut self, state: &RenderState) -> Result<DrawBinding> {
        let state = self.apply_global_shader_hint(state);
        let (key, data) = state.derive_key(&self.caps)?;
        let id = self.get_or_create_key(key, &data)?;
        let switched = self.activate(id)?;
        let uploads = self.sync_uniforms(id, switched)?;

        self.frame.draws += 1;
        Ok(DrawBinding {
            id,
            key,
            switched,
            uploads,
        })
    }

    /// Instance for a render state, building it on a miss.
    pub fn get_or_create(&mut self, state: &RenderState) -> Result<ProgramId> {
        let (key, data) = state.derive_key(&self.caps)?;
        self.get_or_create_key(key, &data)
    }

    /// Instance for an already derived key.
    pub fn get_or_create_key(&mut self, key: ProgramKey, data: &ProgramKeyData) -> Result<ProgramId> {
        self.cache.get_or_create(
            key,
            data,
            BuildContext {
                backend: &mut self.backend,
                source: &mut self.source,
            },
        )
    }

    /// Makes `id` the backend's current program. Returns whether a switch
    /// happened; on a switch the instance's attribute mapping is published.
    pub fn activate(&mut self, id: ProgramId) -> Result<bool> {
        let instance = self
            .cache
            .get_mut(id)
            .ok_or(ShaderCacheError::StaleProgramId(id))?;
        let switched = instance.activate(&mut self.backend);
        if switched {
            self.active_attributes = *instance.attributes();
            self.frame.program_switches += 1;
        }
        self.current = Some(id);
        Ok(switched)
    }

    /// Uploads the uniforms of `id` that changed since it last saw them.
    pub fn sync_uniforms(&mut self, id: ProgramId, switched: bool) -> Result<usize> {
        let instance = self
            .cache
            .get_mut(id)
            .ok_or(ShaderCacheError::StaleProgramId(id))?;
        let uploads = instance.sync_uniforms(&self.params, &mut self.backend, switched);
        self.frame.uniform_uploads += uploads as u32;
        Ok(uploads)
    }

    fn apply_global_shader_hint(&mut self, state: &RenderState) -> RenderState {
        let hint = std::mem::replace(&mut self.next_global_shader, GlobalShaderType::None);
        let mut state = *state;
        if hint != GlobalShaderType::None
            && matches!(state.primitive_type, PrimitiveType::Default | PrimitiveType::Simple)
        {
            state.primitive_type = PrimitiveType::GlobalShader;
            state.global_shader_type = hint;
        }
        state
    }

    /// Routes the next draw of a default or simple primitive to `shader`.
    pub fn set_next_draw_global_shader(&mut self, shader: GlobalShaderType) {
        self.next_global_shader = shader;
    }

    #[inline]
    #[must_use]
    pub fn next_draw_global_shader(&self) -> GlobalShaderType {
        self.next_global_shader
    }

    // ─── Parameters ──────────────────────────────────────────────────────

    pub fn set_uniform(&mut self, slot: UniformSlot, value: impl Into<UniformValue>) -> Result<()> {
        self.params.set(slot, value)
    }

    pub fn set_uniform_array(&mut self, slot: UniformSlot, array: UniformArray<'_>) -> Result<()> {
        self.params.set_array(slot, array)
    }

    /// Untyped boundary write by slot or engine-side name.
    ///
    /// Writing a slot owned by a global shader hints the next draw to use
    /// that shader.
    pub fn set_shader_parameter<'a>(
        &mut self,
        name: impl Into<ParameterName<'a>>,
        data: &[f32],
    ) -> Result<()> {
        let slot = match name.into() {
            ParameterName::Slot(slot) => slot,
            ParameterName::Engine(name) => self
                .params
                .registry_mut()
                .lookup_by_name(name)
                .map(|(slot, _)| slot)
                .ok_or_else(|| ShaderCacheError::UnknownUniformName(name.to_owned()))?,
        };
        let owner = self.params.set_raw(slot, data)?;
        if owner != GlobalShaderType::None {
            self.next_global_shader = owner;
        }
        Ok(())
    }

    pub fn set_bone_count(&mut self, bone_count: u32) {
        self.settings.bone_count = bone_count;
        self.params.set_bone_count(bone_count);
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Starts a new frame. The current program and every uniform value are
    /// kept; frame counters and the global shader hint are reset.
    pub fn new_frame(&mut self) -> FrameStats {
        let last = std::mem::take(&mut self.frame);
        self.next_global_shader = GlobalShaderType::None;
        self.frame_index += 1;
        last
    }

    /// Warms every compiled program that has not been warmed yet.
    pub fn warm_all(&mut self) -> usize {
        let warmed = warm_all(
            &mut self.cache,
            &mut self.backend,
            &self.caps,
            WarmOptions {
                show_keys: self.settings.debug_show_warmed_keys,
            },
        );
        // Warming leaves no program bound.
        self.current = None;
        warmed
    }

    /// Destroys every compiled program.
    pub fn clear_all(&mut self) {
        self.cache.clear_all(&mut self.backend);
        self.current = None;
        self.active_attributes = AttributeMapping::UNUSED;
    }

    /// Destroys the program for `key` so the next request rebuilds it.
    pub fn clear_one(&mut self, key: ProgramKey) -> bool {
        if self
            .current
            .and_then(|id| self.cache.get(id))
            .is_some_and(|inst| inst.key() == key)
        {
            self.current = None;
        }
        self.cache.clear_one(key, &mut self.backend)
    }

    /// Rebuilds the program for `key` from source.
    pub fn recompile(&mut self, key: ProgramKey) -> Result<ProgramId> {
        if !self.clear_one(key) {
            return Err(ShaderCacheError::UnknownProgram(key));
        }
        let data = ProgramKeyData::unpack(key);
        self.get_or_create_key(key, &data)
    }

    /// Applies a startup manifest: registers equivalence groups, builds
    /// every listed key, warms the result and releases the bulk-loading
    /// tables. Returns the number of programs available for listed keys.
    pub fn load_manifest(&mut self, text: &str) -> usize {
        if !self.settings.use_preprocessed_shaders {
            debug!("Preprocessed shaders disabled, manifest ignored");
            return 0;
        }
        let Some(manifest) = Manifest::parse(text, self.settings.manifest_version) else {
            return 0;
        };

        let mut grouped = 0;
        for group in &manifest.groups {
            let enabled = match group.stage {
                ShaderStage::Vertex => self.settings.loads_vertex_groups(),
                ShaderStage::Pixel => self.settings.loads_pixel_groups(),
            };
            if enabled {
                grouped += self
                    .cache
                    .equivalence_mut()
                    .add_group(group.stage, &group.keys);
            }
        }

        let mut ready = 0;
        for &key in &manifest.keys {
            let ctx = BuildContext {
                backend: &mut self.backend,
                source: &mut self.source,
            };
            match self.cache.precompile(key, ctx) {
                Ok(Some(_)) => ready += 1,
                Ok(None) => {}
                Err(e) => warn!("Failed to precompile {key}: {e}"),
            }
        }

        self.source.release_preprocessed();
        if self.settings.warm_up_preprocessed_shaders {
            self.warm_all();
        }
        self.cache.release_equivalence_groups();

        info!(
            "Shader manifest: {} keys, {grouped} grouped, {ready} programs ready, {} instances",
            manifest.keys.len(),
            self.cache.instance_count()
        );
        ready
    }

    pub fn print_missing_shader_keys(&self) {
        self.cache.print_missing_shader_keys();
    }
}
