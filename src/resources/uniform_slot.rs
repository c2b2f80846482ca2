//! Standard Uniform Slots
//!
//! Every shader constant the engine knows how to feed is a [`UniformSlot`]:
//! a dense `u16` index with a parallel constant metadata table
//! ([`SLOT_INFO`]). Both are generated from a single macro invocation so the
//! enum and the table cannot drift apart.
//!
//! Name lookup exists only at the boundary ([`UniformSlot::from_engine_name`],
//! [`SlotRegistry::lookup_by_name`]), where external configuration resolves
//! to a slot index.
//!
//! The bone-matrix slot is the single entry whose size depends on game
//! configuration; [`SlotRegistry`] recomputes it lazily.

use crate::key::GlobalShaderType;

/// Static metadata for one standard slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    /// Name of the uniform in shader source.
    pub shader_name: &'static str,
    /// Name used by engine-side parameter producers.
    pub engine_name: &'static str,
    /// Global shader that owns the slot; writing it hints the next draw.
    pub owner: GlobalShaderType,
    /// Capacity in `f32` units.
    pub floats: usize,
}

macro_rules! engine_name_or {
    ($shader:literal) => {
        $shader
    };
    ($shader:literal, $engine:literal) => {
        $engine
    };
}

macro_rules! owner_or_none {
    () => {
        GlobalShaderType::None
    };
    ($owner:ident) => {
        GlobalShaderType::$owner
    };
}

macro_rules! define_uniform_slots {
    (
        $(
            $slot:ident = $shader:literal $(as $engine:literal)?, $floats:expr $(, owner $owner:ident)?;
        )*
    ) => {
        /// Dense index of a standard shader constant.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum UniformSlot {
            $($slot,)*
        }

        impl UniformSlot {
            pub const ALL: &'static [UniformSlot] = &[$(UniformSlot::$slot),*];
            pub const COUNT: usize = Self::ALL.len();
        }

        pub const SLOT_INFO: [SlotInfo; UniformSlot::COUNT] = [
            $(
                SlotInfo {
                    shader_name: $shader,
                    engine_name: engine_name_or!($shader $(, $engine)?),
                    owner: owner_or_none!($($owner)?),
                    floats: $floats,
                },
            )*
        ];
    };
}

/// Floats per bone: a 3x4 affine matrix.
pub const FLOATS_PER_BONE: usize = 12;

define_uniform_slots! {
    // ---- Transforms ----
    LocalToWorld = "LocalToWorld", 16;
    LocalToWorldRotation = "LocalToWorldRotation", 9;
    WorldToView = "WorldToView", 16;
    ViewProjection = "ViewProjection", 16;
    LocalToProjection = "LocalToProjection", 16;
    LightMapScale = "LightMapScale", 4 * 2;
    LightmapScaleBias = "LightmapCoordinateScaleBias", 4;
    Transform = "Transform", 16;

    // ---- Camera & particles ----
    CameraWorldPosition = "CameraWorldPosition", 4;
    CameraRight = "CameraRight", 4;
    CameraUp = "CameraUp", 4;
    AxisRotationVectorSourceIndex = "AxisRotationVectorSourceIndex", 1;
    AxisRotationVectors = "AxisRotationVectors", 4 * 2;
    ParticleUpRightResultScalars = "ParticleUpRightResultScalars", 3;

    // ---- Material ----
    AlphaTestRef = "AlphaTestRef", 1;
    TextureTransform = "TextureTransform", 9;
    FogOneOverSquaredRange = "FogOneOverSquaredRange", 1;
    FogStartSquared = "FogStartSquared", 1;
    FogColor = "FogColor", 4;
    UniformMultiplyColor = "UniformMultiplyColor", 4;
    FadeColorAndAmount = "FadeColorAndAmount", 4;

    // Sized by `SlotRegistry` from the configured bone count.
    BoneMatrices = "BoneMatrices", 0;

    // ---- Lighting ----
    LightPositionAndInvRadius = "LightPositionAndInvRadius", 4;
    LightDirectionAndDirectional = "LightDirectionAndbDirectional", 4;
    DirectionalLightColor = "DirectionalLightColor" as "LightColorAndFalloffExponent", 4;
    UpperSkyColor = "UpperSkyColor", 4;
    LowerSkyColor = "LowerSkyColor", 4;
    SpecularColor = "SpecularColor", 3;
    LightColorTimesSpecularColor = "LightColorTimesSpecularColor", 3;
    SpecularPower = "SpecularPower", 1;
    EnvironmentColorScale = "EnvironmentColorScale", 3;
    EnvironmentParameters = "EnvironmentParameters", 3;
    RimLightingColorAndExponent = "RimLightingColorAndExponent", 4;
    VertexMovementConstants = "VertexMovementConstants", 3;
    VertexSwayMatrix = "VertexSwayMatrix", 16;
    DecalMatrix = "DecalMatrix", 16;
    DecalLocation = "DecalLocation", 3;
    DecalOffset = "DecalOffset", 2;
    PreMultipliedBumpReferencePlane = "PreMultipliedBumpReferencePlane", 1;
    BumpHeightRatio = "BumpHeightRatio", 1;
    ConstantEmissiveColor = "ConstantEmissiveColor", 4;

    // ---- Height fog ----
    FogDistanceScale = "FogDistanceScale", 4;
    FogExtinctionDistance = "FogExtinctionDistance", 4;
    FogStartDistance = "FogStartDistance", 4;
    FogMinHeight = "FogMinHeight", 4;
    FogMaxHeight = "FogMaxHeight", 4;
    FogInScattering = "FogInScattering", 16;

    // ---- Post process ----
    InverseGamma = "InverseGamma", 1;
    SampleOffsets4 = "SampleOffsets4", 8;
    SampleWeights4 = "SampleWeights4", 16;
    LutWeights = "LUTWeights", 5, owner LUTBlender;
    SceneShadowsAndDesaturation = "SceneShadowsAndDesaturation", 4, owner LUTBlender;
    SceneInverseHighLights = "SceneInverseHighLights", 4, owner LUTBlender;
    SceneMidTones = "SceneMidTones", 4, owner LUTBlender;
    SceneScaledLuminanceWeights = "SceneScaledLuminanceWeights", 4, owner LUTBlender;
    SceneColorize = "SceneColorize", 4, owner LUTBlender;
    GammaColorScaleAndInverse = "GammaColorScaleAndInverse", 4, owner LUTBlender;
    GammaOverlayColor = "GammaOverlayColor", 4, owner LUTBlender;
    BloomScaleAndThreshold = "BloomScaleAndThreshold", 4;
    ColorScale = "ColorScale", 4;
    OverlayColor = "OverlayColor", 4;
    SceneCoordinate1ScaleBias = "SceneCoordinate1ScaleBias", 4;
    SceneCoordinate2ScaleBias = "SceneCoordinate2ScaleBias", 4;
    SceneCoordinate3ScaleBias = "SceneCoordinate3ScaleBias", 4;
    BloomTintAndScreenBlendThreshold = "BloomTintAndScreenBlendThreshold", 4, owner UberPostProcess;
    ImageAdjustments1 = "ImageAdjustments1", 4, owner UberPostProcess;
    ImageAdjustments2 = "ImageAdjustments2", 4, owner UberPostProcess;
    ImageAdjustments3 = "ImageAdjustments3", 4, owner UberPostProcess;
    HalfResMaskRect = "HalfResMaskRect", 4, owner UberPostProcess;
    ReferenceDofKernelSize = "ReferenceDOFKernelSize", 4, owner UberPostProcess;

    // ---- Light shafts ----
    ScreenToWorld = "ScreenToWorld", 16;
    MinZMaxZRatio = "MinZ_MaxZRatio", 4;
    TextureSpaceBlurOrigin = "TextureSpaceBlurOrigin", 2;
    UvMinMax = "UVMinMax", 4;
    AspectRatioAndInvAspectRatio = "AspectRatioAndInvAspectRatio", 4;
    LightShaftParameters = "LightShaftParameters", 4;
    LightShaftBlurParameters = "LightShaftBlurParameters", 4;
    BloomTintAndThreshold = "BloomTintAndThreshold", 4;
    LightShaftSampleOffsets = "LightShaftSampleOffsets", 8;
    SourceTextureScaleBias = "SourceTextureScaleBias", 4, owner LightShaftApply;
    SceneColorScaleBias = "SceneColorScaleBias", 4, owner LightShaftApply;
    DistanceFade = "DistanceFade", 1, owner LightShaftApply;
    BloomScreenBlendThreshold = "BloomScreenBlendThreshold", 1, owner LightShaftApply;

    // ---- Shadows ----
    ScreenToShadowMatrix = "ScreenToShadowMatrix", 16, owner ShadowProjection;
    HomShadowStartPos = "HomShadowStartPos", 4, owner ShadowProjection;
    ShadowFadeFraction = "ShadowFadeFraction", 1;
    ShadowBufferSizeAndSoftTransitionScale = "ShadowBufferSizeAndSoftTransitionScale", 3;
    ShadowTexelSize = "ShadowTexelSize", 2;
    ScreenPositionScaleBias = "ScreenPositionScaleBias", 4;
    ShadowModulateColor = "ShadowModulateColor", 4;
    ProjectionMatrix = "ProjectionMatrix", 16;
    InvMaxSubjectDepth = "InvMaxSubjectDepth", 1;
    DepthBias = "DepthBias", 1;
    SampleOffsets16 = "SampleOffsets16", 32;
    SampleWeights16 = "SampleWeights16", 64;
    ShadowCasterWorldPosition = "ShadowCasterWorldPosition", 3;
    ModShadowColor = "ModShadowColor", 3;
    VisualizeParam = "VisualizeParam", 8;
    ViewportScaleBias = "ViewportScaleBias", 4;

    // ---- Mobile color grading & DOF ----
    MobileColorGradingBlend = "MobileColorGradingBlend", 1;
    MobileColorGradingDesaturation = "MobileColorGradingDesaturation", 1;
    MobileColorGradingHighlightsMinusShadows = "MobileColorGradingHighlightsMinusShadows", 4;
    MobileColorGradingMidTones = "MobileColorGradingMidTones", 4;
    MobileColorGradingShadows = "MobileColorGradingShadows", 4;
    MobileOpacityMultiplier = "MobileOpacityMultiplier", 1;
    TiltShiftParameters = "TiltShiftParameters", 4;
    DofPackedParameters = "DOFPackedParameters", 4;
    DofFactor = "DOFFactor", 1;
    DofMinMaxBlurClamp = "DOFMinMaxBlurClamp", 4;

    // ---- Distance field fonts ----
    SmoothWidth = "SmoothWidth", 1;
    ShadowMultiplier = "ShadowMultiplier", 1;
    ShadowDirection = "ShadowDirection", 2;
    ShadowColor = "ShadowColor", 4;
    ShadowSmoothWidth = "ShadowSmoothWidth", 1;
    GlowMultiplier = "GlowMultiplier", 1;
    GlowColor = "GlowColor", 4;
    GlowOuterRadius = "GlowOuterRadius", 2;
    GlowInnerRadius = "GlowInnerRadius", 2;

    // ---- Radial blur & FXAA ----
    RadialBlurScale = "RadialBlurScale", 1;
    RadialBlurFalloffExp = "RadialBlurFalloffExp", 1;
    RadialBlurOpacity = "RadialBlurOpacity", 1;
    RadialBlurScreenPositionCenter = "RadialBlurScreenPositionCenter", 4;
    FxaaQualityRcpFrame = "fxaaQualityRcpFrame", 2;
    FxaaConsoleRcpFrameOpt = "fxaaConsoleRcpFrameOpt", 4;
    FxaaConsoleRcpFrameOpt2 = "fxaaConsoleRcpFrameOpt2", 4;

    // ---- Landscape ----
    LandscapeLightmapScaleBias = "LightmapScaleBias", 4;
    LayerUvScaleBias = "LayerUVScaleBias", 4;
    LodValues = "LodValues", 4;
    LodDistancesValues = "LodDistancesValues", 4;
    LandscapeMonochromeLayerColors = "LandscapeMonochromeLayerColors", 3 * 4;
}

impl UniformSlot {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    #[must_use]
    pub const fn info(self) -> SlotInfo {
        SLOT_INFO[self as usize]
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Resolves an engine-side parameter name.
    #[must_use]
    pub fn from_engine_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|slot| slot.info().engine_name == name)
    }

    #[must_use]
    pub fn from_shader_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|slot| slot.info().shader_name == name)
    }
}

// ============================================================================
// SlotRegistry
// ============================================================================

/// Slot sizes with the bone-matrix entry resolved against configuration.
#[derive(Debug, Clone)]
pub struct SlotRegistry {
    bone_count: u32,
    /// `None` until first queried after a bone-count change.
    bone_floats: Option<usize>,
}

impl SlotRegistry {
    #[must_use]
    pub fn new(bone_count: u32) -> Self {
        Self {
            bone_count,
            bone_floats: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> u32 {
        self.bone_count
    }

    /// Changes the bone count; the slot size is recomputed on next query.
    pub fn set_bone_count(&mut self, bone_count: u32) {
        if bone_count != self.bone_count {
            self.bone_count = bone_count;
            self.bone_floats = None;
        }
    }

    /// Capacity of `slot` in floats.
    pub fn floats(&mut self, slot: UniformSlot) -> usize {
        if slot == UniformSlot::BoneMatrices {
            *self
                .bone_floats
                .get_or_insert(FLOATS_PER_BONE * self.bone_count as usize)
        } else {
            slot.info().floats
        }
    }

    /// Capacity of `slot` if already resolved. Never recomputes.
    #[must_use]
    pub fn floats_cached(&self, slot: UniformSlot) -> Option<usize> {
        if slot == UniformSlot::BoneMatrices {
            self.bone_floats
        } else {
            Some(slot.info().floats)
        }
    }

    /// Resolves an engine-side name to its slot and byte size.
    pub fn lookup_by_name(&mut self, name: &str) -> Option<(UniformSlot, usize)> {
        let slot = UniformSlot::from_engine_name(name)?;
        Some((slot, self.floats(slot) * size_of::<f32>()))
    }
}
