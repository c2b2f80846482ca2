//! Shared test doubles.
//!
//! - `MockBackend`: records every driver call; exposes the attributes and
//!   uniforms whose names appear as tokens in the attached stage sources
//! - `MockSource`: in-memory provider whose text lists the uniforms a key
//!   would declare

#![allow(dead_code)]

use std::collections::HashSet;

use shader_permutation::backend::{BlendState, ColorWriteMask};
use shader_permutation::source::{SourceRequest, StageSource};
use shader_permutation::{
    CacheSettings, GraphicsBackend, KeyField, ProgramHandle, ProgramKey, SetterKind,
    ShaderCacheContext, ShaderSourceProvider, ShaderStage, StageHandle, UniformLocation,
    UniformUpload,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Attribute names the mock linker assigns locations to, in location order.
const LINKED_ATTRIBUTES: [&str; 6] = [
    "Position",
    "TexCoords0",
    "TangentZ",
    "LightMapCoordinate",
    "BlendWeight",
    "BlendIndices",
];

/// One recorded `upload_uniform` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpload {
    pub program: Option<ProgramHandle>,
    pub location: UniformLocation,
    pub kind: SetterKind,
    pub count: usize,
    pub data: Vec<f32>,
}

#[derive(Debug)]
pub struct MockBackend {
    next_handle: u32,
    stages: Vec<(StageHandle, String)>,
    attached: Vec<(ProgramHandle, StageHandle)>,
    uniform_names: Vec<String>,
    current: Option<ProgramHandle>,

    // ---- Recorded calls ----
    pub compile_attempts: usize,
    pub compiled: Vec<(ShaderStage, String)>,
    pub links: usize,
    pub use_program_calls: usize,
    pub uploads: Vec<RecordedUpload>,
    pub sampler_units: Vec<(UniformLocation, u32)>,
    pub deleted_programs: Vec<ProgramHandle>,
    pub deleted_stages: Vec<StageHandle>,
    pub draws: usize,
    pub resets: usize,
    pub write_masks: Vec<ColorWriteMask>,
    pub blend_states: Vec<BlendState>,
    pub enabled_attributes: u32,

    // ---- Failure injection ----
    /// Compiles of text containing this marker fail.
    pub fail_compile_marker: Option<String>,
    /// The next N compiles fail regardless of text.
    pub fail_next_compiles: usize,
    /// Links of programs whose stages contain this marker fail.
    pub fail_link_marker: Option<String>,
    pub validation_passes: bool,
    pub max_attribs: u32,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            stages: Vec::new(),
            attached: Vec::new(),
            uniform_names: Vec::new(),
            current: None,
            compile_attempts: 0,
            compiled: Vec::new(),
            links: 0,
            use_program_calls: 0,
            uploads: Vec::new(),
            sampler_units: Vec::new(),
            deleted_programs: Vec::new(),
            deleted_stages: Vec::new(),
            draws: 0,
            resets: 0,
            write_masks: Vec::new(),
            blend_states: Vec::new(),
            enabled_attributes: 0,
            fail_compile_marker: None,
            fail_next_compiles: 0,
            fail_link_marker: None,
            validation_passes: true,
            max_attribs: 16,
        }
    }

    fn next(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn program_text(&self, program: ProgramHandle) -> Vec<&str> {
        self.attached
            .iter()
            .filter(|(p, _)| *p == program)
            .filter_map(|(_, s)| self.stages.iter().find(|(h, _)| h == s))
            .map(|(_, text)| text.as_str())
            .collect()
    }

    fn declares(&self, program: ProgramHandle, name: &str) -> bool {
        self.program_text(program).iter().any(|text| {
            text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .any(|token| token == name)
        })
    }

    /// Uploads recorded for the uniform `name` of `program`.
    pub fn uploads_named(&self, program: ProgramHandle, name: &str) -> Vec<&RecordedUpload> {
        let Some(index) = self.uniform_names.iter().position(|n| n == name) else {
            return Vec::new();
        };
        let location = UniformLocation(program.0 * 1000 + index as u32);
        self.uploads
            .iter()
            .filter(|u| u.program == Some(program) && u.location == location)
            .collect()
    }

    pub fn live_stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl GraphicsBackend for MockBackend {
    fn create_program(&mut self) -> ProgramHandle {
        ProgramHandle(self.next())
    }

    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageHandle, String> {
        self.compile_attempts += 1;
        if self.fail_next_compiles > 0 {
            self.fail_next_compiles -= 1;
            return Err("ERROR: 0:1: injected failure".to_owned());
        }
        if let Some(marker) = &self.fail_compile_marker
            && source.contains(marker.as_str())
        {
            return Err(format!("ERROR: 0:1: '{marker}' rejected"));
        }
        let handle = StageHandle(self.next());
        self.stages.push((handle, source.to_owned()));
        self.compiled.push((stage, source.to_owned()));
        Ok(handle)
    }

    fn attach_stage(&mut self, program: ProgramHandle, stage: StageHandle) {
        self.attached.push((program, stage));
    }

    fn link_program(&mut self, program: ProgramHandle) -> Result<(), String> {
        if let Some(marker) = &self.fail_link_marker
            && self
                .program_text(program)
                .iter()
                .any(|text| text.contains(marker.as_str()))
        {
            return Err("Link failed: varying mismatch".to_owned());
        }
        self.links += 1;
        Ok(())
    }

    fn delete_stage(&mut self, stage: StageHandle) {
        self.stages.retain(|(h, _)| *h != stage);
        self.deleted_stages.push(stage);
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.deleted_programs.push(program);
        if self.current == Some(program) {
            self.current = None;
        }
    }

    fn attribute_location(&mut self, program: ProgramHandle, name: &str) -> Option<u32> {
        let location = LINKED_ATTRIBUTES.iter().position(|&a| a == name)?;
        self.declares(program, name).then_some(location as u32)
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        if !self.declares(program, name) {
            return None;
        }
        let index = match self.uniform_names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.uniform_names.push(name.to_owned());
                self.uniform_names.len() - 1
            }
        };
        Some(UniformLocation(program.0 * 1000 + index as u32))
    }

    fn current_program(&self) -> Option<ProgramHandle> {
        self.current
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.use_program_calls += 1;
        self.current = Some(program);
    }

    fn set_sampler_unit(&mut self, location: UniformLocation, unit: u32) {
        self.sampler_units.push((location, unit));
    }

    fn upload_uniform(&mut self, location: UniformLocation, upload: UniformUpload<'_>) {
        self.uploads.push(RecordedUpload {
            program: self.current,
            location,
            kind: upload.kind,
            count: upload.count,
            data: upload.data.to_vec(),
        });
    }

    fn max_vertex_attribs(&self) -> u32 {
        self.max_attribs
    }

    fn validate_program(&mut self, _program: ProgramHandle) -> bool {
        self.validation_passes
    }

    fn set_vertex_attrib_enabled(&mut self, index: u32, enabled: bool) {
        if enabled {
            self.enabled_attributes |= 1 << index;
        } else {
            self.enabled_attributes &= !(1 << index);
        }
    }

    fn set_degenerate_stream(&mut self, _index: u32, _floats: usize) {}

    fn set_color_write_mask(&mut self, mask: ColorWriteMask) {
        self.write_masks.push(mask);
    }

    fn set_blend_state(&mut self, state: &BlendState) {
        self.blend_states.push(*state);
    }

    fn draw_indexed_triangles(&mut self, _indices: &[u16]) {
        self.draws += 1;
    }

    fn reset_state(&mut self) {
        self.resets += 1;
        self.current = None;
    }
}

// ============================================================================
// MockSource
// ============================================================================

/// Generates a small token list per key:
/// `key <KEY> <stage>` followed by the attributes and uniforms it declares.
#[derive(Debug, Default)]
pub struct MockSource {
    pub loads: usize,
    pub reloads: usize,
    pub released: bool,
    /// Keys for which no source exists.
    pub missing: HashSet<ProgramKey>,
    /// Keys served as generated rather than pre-baked text.
    pub generated: HashSet<ProgramKey>,
}

pub fn mock_source_text(request: &SourceRequest<'_>) -> String {
    let data = request.data;
    let mut text = format!(
        "key {} {:?}\nattribute Position\nattribute TexCoords0\nuniform LocalToProjection\nuniform AlphaTestRef\nuniform FogColor\n",
        request.key, request.stage
    );
    if data.flag(KeyField::IsLightmap) {
        text.push_str("attribute LightMapCoordinate\nuniform LightmapCoordinateScaleBias\n");
    }
    if data.flag(KeyField::IsSkinned) {
        text.push_str("attribute BlendWeight\nattribute BlendIndices\nuniform BoneMatrices\n");
    }
    if data.value(KeyField::GlobalShaderType) != 0 {
        text.push_str("uniform LUTWeights\nuniform GammaOverlayColor\n");
    }
    text
}

impl ShaderSourceProvider for MockSource {
    fn load(&mut self, request: &SourceRequest<'_>) -> Option<StageSource> {
        self.loads += 1;
        if self.missing.contains(&request.key) {
            return None;
        }
        Some(StageSource {
            text: mock_source_text(request),
            preprocessed: !self.generated.contains(&request.key),
        })
    }

    fn reload_prefixes(&mut self) -> shader_permutation::Result<()> {
        self.reloads += 1;
        Ok(())
    }

    fn release_preprocessed(&mut self) {
        self.released = true;
    }
}

pub type TestContext = ShaderCacheContext<MockBackend, MockSource>;

pub fn context(settings: CacheSettings) -> TestContext {
    init_logger();
    ShaderCacheContext::new(settings, MockBackend::new(), MockSource::default())
}
