//! Cache warming.
//!
//! Drivers often finish compiling a program on its first draw. Issuing one
//! throwaway draw per program while loading moves that stall out of
//! gameplay.

use log::{debug, info, warn};

use crate::backend::{BlendState, ColorWriteMask, GraphicsBackend};
use crate::settings::PlatformCaps;

use super::attributes::AttributeMask;
use super::cache::PermutationCache;

/// Floats in the zero stream every attribute points at while warming.
pub const DEGENERATE_STREAM_FLOATS: usize = 12;

const WARM_INDICES: [u16; 3] = [0, 1, 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WarmOptions {
    /// Log each warmed key at debug level.
    pub show_keys: bool,
}

/// Draws every not-yet-warmed instance once per colour write mask.
///
/// Validation failures are logged and the draw skipped; the instance still
/// counts as warmed. Returns the number of instances warmed.
pub fn warm_all<B: GraphicsBackend + ?Sized>(
    cache: &mut PermutationCache,
    backend: &mut B,
    caps: &PlatformCaps,
    options: WarmOptions,
) -> usize {
    backend.reset_state();

    let streams = caps.max_vertex_attribs;
    for stream in 0..streams {
        backend.set_vertex_attrib_enabled(stream, false);
        backend.set_degenerate_stream(stream, DEGENERATE_STREAM_FLOATS);
    }

    let mut active = AttributeMask::empty();
    let mut warmed = 0;

    for instance in cache.iter_mut() {
        if instance.is_warmed() {
            continue;
        }
        if options.show_keys {
            debug!("[WARM KEY]:{}", instance.key());
        }
        instance.mark_warmed();

        let wanted = instance.attribute_mask();
        for stream in 0..streams {
            let needed = wanted.uses(stream);
            if needed != active.uses(stream) {
                backend.set_vertex_attrib_enabled(stream, needed);
                active.set(AttributeMask::location(stream), needed);
            }
        }

        backend.use_program(instance.program());
        let blend = BlendState::for_blend_mode(instance.blend_mode());
        for mask in [ColorWriteMask::Rgba, ColorWriteMask::Rgb] {
            backend.set_color_write_mask(mask);
            if let Some(state) = &blend {
                backend.set_blend_state(state);
            }
            if backend.validate_program(instance.program()) {
                backend.draw_indexed_triangles(&WARM_INDICES);
            } else {
                warn!("Program {} failed to validate during warm", instance.key());
            }
        }
        warmed += 1;
    }

    backend.reset_state();
    info!("Warmed {warmed} shader programs");
    warmed
}
