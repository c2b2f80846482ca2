//! Program Instance
//!
//! One linked backend program plus everything needed to draw with it:
//! the attribute remap table, fixed sampler units and one
//! [`UniformBinding`] per standard slot the linker kept.
//!
//! # Uniform sync
//!
//! Each binding remembers the store version it last uploaded and a private
//! snapshot of the bytes. [`ProgramInstance::sync_uniforms`] uploads a slot
//! only when its version moved; for single-element values on an already
//! bound program it also skips the upload when the bytes did not change.
//! The upload count per draw therefore equals the number of slots whose
//! value actually changed since the program last saw them.

use log::debug;
use smallvec::SmallVec;

use crate::backend::{
    GraphicsBackend, ProgramHandle, StageHandle, UniformLocation, UniformUpload,
};
use crate::key::{BlendMode, KeyField, ProgramKey, ProgramKeyData};
use crate::resources::uniform_slot::UniformSlot;
use crate::resources::version_tracker::ParameterStore;

use super::attributes::{AttributeMapping, AttributeMask, attribute_bindings};

// ─── Sampler units ───────────────────────────────────────────────────────────

/// Material textures and their fixed units.
pub const MATERIAL_SAMPLERS: [(&str, u32); 10] = [
    ("TextureBase", 0),
    ("TextureDetail", 1),
    ("TextureLightmap", 2),
    ("TextureNormal", 3),
    ("TextureEnvironment", 4),
    ("TextureMask", 5),
    ("TextureEmissive", 6),
    ("TextureLightmap2", 7),
    ("TextureDetail2", 8),
    ("TextureDetail3", 9),
];

/// Landscape layer textures. Layers 2 and 3 reuse the environment and
/// emissive units, which landscape never samples.
pub const LANDSCAPE_SAMPLERS: [(&str, u32); 7] = [
    ("TextureBase", 0),
    ("TextureDetail", 1),
    ("TextureDetail2", 4),
    ("TextureDetail3", 6),
    ("TextureLightmap", 2),
    ("TextureNormal", 3),
    ("TextureMask", 5),
];

/// Inputs of the post-process family.
pub const POST_PROCESS_SAMPLERS: [(&str, u32); 12] = [
    ("SourceTexture", 0),
    ("ApplySourceTexture", 1),
    ("SceneDepthTexture", 1),
    ("Texture1", 0),
    ("Texture2", 1),
    ("Texture3", 2),
    ("Texture4", 3),
    ("SceneColorTexture", 0),
    ("FilterColor2Texture", 1),
    ("DoFBlurBuffer", 2),
    ("ColorGradingLUT", 3),
    ("ShadowDepthTexture", 2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: &'static str,
    pub location: UniformLocation,
    pub unit: u32,
}

// ─── Bindings ────────────────────────────────────────────────────────────────

/// A compiled shader stage and whether the instance is responsible for
/// deleting it. Stages borrowed from an equivalence master are not owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRef {
    pub handle: StageHandle,
    pub owned: bool,
}

/// A standard slot present in a linked program.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBinding {
    pub slot: UniformSlot,
    pub location: UniformLocation,
    /// Store version last uploaded; `0` before the first upload.
    pub synced_version: u64,
    snapshot: Vec<f32>,
}

impl UniformBinding {
    #[must_use]
    pub fn new(slot: UniformSlot, location: UniformLocation) -> Self {
        Self {
            slot,
            location,
            synced_version: 0,
            snapshot: Vec::new(),
        }
    }

    /// Bytes last uploaded for this slot.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> &[f32] {
        &self.snapshot
    }

    fn snapshot_matches(&self, bytes: &[u8]) -> bool {
        bytemuck::cast_slice::<f32, u8>(&self.snapshot) == bytes
    }
}

// ─── ProgramInstance ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ProgramInstance {
    key: ProgramKey,
    program: ProgramHandle,
    vertex: StageRef,
    pixel: StageRef,
    blend_mode: BlendMode,
    attributes: AttributeMapping,
    attribute_mask: AttributeMask,
    uniforms: SmallVec<[UniformBinding; 16]>,
    samplers: SmallVec<[SamplerBinding; 8]>,
    activated: bool,
    warmed: bool,
}

impl ProgramInstance {
    /// Attaches both stages to `program`, links it and resolves attributes,
    /// sampler units and uniform locations.
    ///
    /// On failure the driver info log is returned and no backend object is
    /// released; the caller owns cleanup.
    pub fn link<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        program: ProgramHandle,
        key: ProgramKey,
        data: &ProgramKeyData,
        vertex: StageRef,
        pixel: StageRef,
    ) -> Result<Self, String> {
        backend.attach_stage(program, pixel.handle);
        backend.attach_stage(program, vertex.handle);
        backend.link_program(program)?;

        let skinned = data.flag(KeyField::IsSkinned);
        let landscape = data.flag(KeyField::IsLandscape);
        let (attributes, attribute_mask) = AttributeMapping::resolve(
            backend,
            program,
            attribute_bindings(skinned, landscape),
        );

        backend.use_program(program);
        let material: &[(&'static str, u32)] = if landscape {
            &LANDSCAPE_SAMPLERS
        } else {
            &MATERIAL_SAMPLERS
        };
        let mut samplers = SmallVec::new();
        for &(name, unit) in material.iter().chain(POST_PROCESS_SAMPLERS.iter()) {
            if let Some(location) = backend.uniform_location(program, name) {
                backend.set_sampler_unit(location, unit);
                samplers.push(SamplerBinding {
                    name,
                    location,
                    unit,
                });
            }
        }

        let uniforms: SmallVec<[UniformBinding; 16]> = UniformSlot::ALL
            .iter()
            .filter_map(|&slot| {
                backend
                    .uniform_location(program, slot.info().shader_name)
                    .map(|location| UniformBinding::new(slot, location))
            })
            .collect();

        debug!(
            "Linked program {key}: {} uniforms, {} samplers, attribute mask {:#06x}",
            uniforms.len(),
            samplers.len(),
            attribute_mask.bits()
        );

        let blend_mode = BlendMode::from_value(data.value(KeyField::BlendMode)).unwrap_or_default();

        Ok(Self {
            key,
            program,
            vertex,
            pixel,
            blend_mode,
            attributes,
            attribute_mask,
            uniforms,
            samplers,
            activated: false,
            warmed: false,
        })
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn key(&self) -> ProgramKey {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    #[inline]
    #[must_use]
    pub fn vertex_stage(&self) -> StageRef {
        self.vertex
    }

    #[inline]
    #[must_use]
    pub fn pixel_stage(&self) -> StageRef {
        self.pixel
    }

    #[inline]
    #[must_use]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &AttributeMapping {
        &self.attributes
    }

    #[inline]
    #[must_use]
    pub fn attribute_mask(&self) -> AttributeMask {
        self.attribute_mask
    }

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> &[UniformBinding] {
        &self.uniforms
    }

    #[inline]
    #[must_use]
    pub fn samplers(&self) -> &[SamplerBinding] {
        &self.samplers
    }

    #[must_use]
    pub fn binds(&self, slot: UniformSlot) -> bool {
        self.uniforms.iter().any(|b| b.slot == slot)
    }

    #[inline]
    #[must_use]
    pub fn is_warmed(&self) -> bool {
        self.warmed
    }

    pub(crate) fn mark_warmed(&mut self) {
        self.warmed = true;
    }

    // ─── Draw-time ───────────────────────────────────────────────────────

    /// Binds the program unless the backend already has it current.
    ///
    /// Returns whether a switch happened. The first activation of a new
    /// instance always counts as a switch so its uniforms are pushed in full.
    pub fn activate<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) -> bool {
        let switched = !self.activated || backend.current_program() != Some(self.program);
        if switched {
            backend.use_program(self.program);
            self.activated = true;
        }
        switched
    }

    /// Uploads every bound slot whose value changed since this program last
    /// saw it. Returns the number of upload calls issued.
    pub fn sync_uniforms<B: GraphicsBackend + ?Sized>(
        &mut self,
        store: &ParameterStore,
        backend: &mut B,
        switched: bool,
    ) -> usize {
        let mut uploads = 0;
        for binding in &mut self.uniforms {
            let param = store.get(binding.slot);
            let version = param.version();
            if version == 0 || version == binding.synced_version {
                continue;
            }
            binding.synced_version = version;

            if param.count() == 0 {
                continue;
            }
            if param.count() == 1 && !switched && binding.snapshot_matches(param.as_bytes()) {
                continue;
            }

            let values = param.values();
            binding.snapshot.clear();
            binding.snapshot.extend_from_slice(values);
            backend.upload_uniform(
                binding.location,
                UniformUpload {
                    kind: param.setter(),
                    count: param.count(),
                    data: values,
                },
            );
            uploads += 1;
        }
        uploads
    }

    /// Deletes the program and any stage this instance owns.
    pub(crate) fn release<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        backend.delete_program(self.program);
        if self.vertex.owned {
            backend.delete_stage(self.vertex.handle);
        }
        if self.pixel.owned {
            backend.delete_stage(self.pixel.handle);
        }
    }
}
