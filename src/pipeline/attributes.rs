//! Vertex Attribute Binding
//!
//! Vertex streams are described by engine-side attribute indices: a usage
//! base plus a usage index. After a program links, each attribute name the
//! program might declare is looked up and the backend location recorded in
//! the instance's [`AttributeMapping`].
//!
//! | Usage | Base index |
//! |-------|-----------|
//! | Position | 0 |
//! | BlendWeight | 1 |
//! | Normal | 2 |
//! | Color | 3 |
//! | Tangent | 5 |
//! | Binormal | 6 |
//! | BlendIndices | 7 |
//! | TexCoord | 8 |

use bitflags::bitflags;
use log::warn;

use crate::backend::{GraphicsBackend, ProgramHandle};
use crate::settings::MAX_VERTEX_ATTRIBUTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexUsage {
    Position,
    BlendWeight,
    Normal,
    Color,
    Tangent,
    Binormal,
    BlendIndices,
    TexCoord,
}

impl VertexUsage {
    #[inline]
    #[must_use]
    pub const fn base_index(self) -> usize {
        match self {
            Self::Position => 0,
            Self::BlendWeight => 1,
            Self::Normal => 2,
            Self::Color => 3,
            Self::Tangent => 5,
            Self::Binormal => 6,
            Self::BlendIndices => 7,
            Self::TexCoord => 8,
        }
    }

    /// Engine attribute index of the `usage_index`-th stream of this usage.
    #[inline]
    #[must_use]
    pub const fn engine_index(self, usage_index: usize) -> usize {
        self.base_index() + usage_index
    }
}

/// One named shader attribute and the engine stream it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    pub name: &'static str,
    pub usage: VertexUsage,
    pub usage_index: usize,
}

const fn bind(name: &'static str, usage: VertexUsage, usage_index: usize) -> AttributeBinding {
    AttributeBinding {
        name,
        usage,
        usage_index,
    }
}

/// Bound for every program.
pub const COMMON_ATTRIBUTES: [AttributeBinding; 7] = [
    bind("Position", VertexUsage::Position, 0),
    bind("TexCoords0", VertexUsage::TexCoord, 0),
    bind("TexCoords1", VertexUsage::TexCoord, 1),
    bind("TexCoords2", VertexUsage::TexCoord, 2),
    bind("TexCoords3", VertexUsage::TexCoord, 3),
    bind("TangentZ", VertexUsage::Normal, 0),
    bind("TangentX", VertexUsage::Tangent, 0),
];

/// Bound for GPU-skinned programs.
pub const SKINNED_ATTRIBUTES: [AttributeBinding; 3] = [
    bind("VertexColor", VertexUsage::Color, 0),
    bind("BlendWeight", VertexUsage::BlendWeight, 0),
    bind("BlendIndices", VertexUsage::BlendIndices, 0),
];

/// Bound for programs that are neither skinned nor landscape. Several
/// names alias the same stream because different families reuse slots.
pub const STATIC_ATTRIBUTES: [AttributeBinding; 9] = [
    bind("LightMapA", VertexUsage::TexCoord, 5),
    bind("LightMapCoordinate", VertexUsage::Color, 0),
    bind("Color", VertexUsage::Color, 0),
    bind("VertexColor", VertexUsage::Color, 1),
    bind("OldPosition", VertexUsage::Normal, 0),
    bind("Size", VertexUsage::Tangent, 0),
    bind("Rotation_Sizer", VertexUsage::BlendWeight, 0),
    bind("ParticleColor", VertexUsage::TexCoord, 1),
    bind("Interp_Sizer", VertexUsage::TexCoord, 2),
];

/// Attribute names to look up for a program with the given vertex factory.
pub fn attribute_bindings(
    skinned: bool,
    landscape: bool,
) -> impl Iterator<Item = &'static AttributeBinding> {
    let extra: &'static [AttributeBinding] = if skinned {
        &SKINNED_ATTRIBUTES
    } else if !landscape {
        &STATIC_ATTRIBUTES
    } else {
        &[]
    };
    COMMON_ATTRIBUTES.iter().chain(extra.iter())
}

bitflags! {
    /// Backend attribute locations a program reads.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttributeMask: u16 {
        const _ = !0;
    }
}

impl AttributeMask {
    #[inline]
    #[must_use]
    pub fn location(location: u32) -> Self {
        Self::from_bits_retain(1 << location)
    }

    #[inline]
    #[must_use]
    pub fn uses(self, location: u32) -> bool {
        location < MAX_VERTEX_ATTRIBUTES as u32 && self.contains(Self::location(location))
    }
}

/// Engine attribute index → backend location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeMapping {
    locations: [Option<u32>; MAX_VERTEX_ATTRIBUTES],
}

impl AttributeMapping {
    pub const UNUSED: Self = Self {
        locations: [None; MAX_VERTEX_ATTRIBUTES],
    };

    /// Backend location for an engine attribute, or `None` if the program
    /// does not read it.
    #[inline]
    #[must_use]
    pub fn location(&self, engine_index: usize) -> Option<u32> {
        self.locations.get(engine_index).copied().flatten()
    }

    #[inline]
    #[must_use]
    pub fn location_for(&self, usage: VertexUsage, usage_index: usize) -> Option<u32> {
        self.location(usage.engine_index(usage_index))
    }

    /// Resolves every binding against a linked program.
    pub fn resolve<'a, B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        program: ProgramHandle,
        bindings: impl IntoIterator<Item = &'a AttributeBinding>,
    ) -> (Self, AttributeMask) {
        let mut mapping = Self::UNUSED;
        let mut mask = AttributeMask::empty();
        for binding in bindings {
            let Some(location) = backend.attribute_location(program, binding.name) else {
                continue;
            };
            if location >= MAX_VERTEX_ATTRIBUTES as u32 {
                warn!(
                    "Attribute {} at location {location} exceeds the {MAX_VERTEX_ATTRIBUTES} supported slots",
                    binding.name
                );
                continue;
            }
            let engine_index = binding.usage.engine_index(binding.usage_index);
            mapping.locations[engine_index] = Some(location);
            mask |= AttributeMask::location(location);
        }
        (mapping, mask)
    }
}
