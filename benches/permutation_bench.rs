//! Hot-path benchmarks: key derivation, cache hits and uniform sync.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::{Mat4, Vec4};

use shader_permutation::backend::{BlendState, ColorWriteMask};
use shader_permutation::source::{SourceRequest, StageSource};
use shader_permutation::{
    BlendMode, CacheSettings, GraphicsBackend, PlatformCaps, PlatformFeatures, ProgramHandle,
    RenderState, ShaderCacheContext, ShaderSourceProvider, ShaderStage, StageHandle,
    UniformLocation, UniformSlot, UniformUpload, VertexFactoryFlags,
};

/// Backend that accepts everything and resolves every name.
#[derive(Default)]
struct NullBackend {
    next: u32,
    current: Option<ProgramHandle>,
}

impl GraphicsBackend for NullBackend {
    fn create_program(&mut self) -> ProgramHandle {
        self.next += 1;
        ProgramHandle(self.next)
    }

    fn compile_stage(&mut self, _: ShaderStage, _: &str) -> Result<StageHandle, String> {
        self.next += 1;
        Ok(StageHandle(self.next))
    }

    fn attach_stage(&mut self, _: ProgramHandle, _: StageHandle) {}

    fn link_program(&mut self, _: ProgramHandle) -> Result<(), String> {
        Ok(())
    }

    fn delete_stage(&mut self, _: StageHandle) {}
    fn delete_program(&mut self, _: ProgramHandle) {}

    fn attribute_location(&mut self, _: ProgramHandle, name: &str) -> Option<u32> {
        (name == "Position").then_some(0)
    }

    fn uniform_location(&mut self, _: ProgramHandle, name: &str) -> Option<UniformLocation> {
        Some(UniformLocation(name.len() as u32))
    }

    fn current_program(&self) -> Option<ProgramHandle> {
        self.current
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current = Some(program);
    }

    fn set_sampler_unit(&mut self, _: UniformLocation, _: u32) {}

    fn upload_uniform(&mut self, _: UniformLocation, upload: UniformUpload<'_>) {
        black_box(upload.data);
    }

    fn max_vertex_attribs(&self) -> u32 {
        16
    }

    fn validate_program(&mut self, _: ProgramHandle) -> bool {
        true
    }

    fn set_vertex_attrib_enabled(&mut self, _: u32, _: bool) {}
    fn set_degenerate_stream(&mut self, _: u32, _: usize) {}
    fn set_color_write_mask(&mut self, _: ColorWriteMask) {}
    fn set_blend_state(&mut self, _: &BlendState) {}
    fn draw_indexed_triangles(&mut self, _: &[u16]) {}

    fn reset_state(&mut self) {
        self.current = None;
    }
}

struct StaticSource;

impl ShaderSourceProvider for StaticSource {
    fn load(&mut self, request: &SourceRequest<'_>) -> Option<StageSource> {
        Some(StageSource {
            text: format!("// {} {:?}", request.key, request.stage),
            preprocessed: true,
        })
    }

    fn reload_prefixes(&mut self) -> shader_permutation::Result<()> {
        Ok(())
    }
}

fn caps() -> PlatformCaps {
    PlatformCaps {
        features: PlatformFeatures::HighEnd,
        minimize_shaders: true,
        max_vertex_attribs: 16,
    }
}

fn lit_state() -> RenderState {
    let mut state = RenderState {
        vertex_factory: VertexFactoryFlags::LIGHTMAP,
        height_fog: true,
        ..Default::default()
    };
    state.material.lighting = true;
    state.material.normal_mapping = true;
    state
}

fn bench_derive_key(c: &mut Criterion) {
    let caps = caps();
    let states = [
        RenderState::default(),
        lit_state(),
        RenderState {
            blend_mode: BlendMode::Translucent,
            vertex_factory: VertexFactoryFlags::GPU_SKINNING,
            ..Default::default()
        },
    ];

    c.bench_function("derive_key", |b| {
        b.iter(|| {
            for state in &states {
                black_box(black_box(state).derive_key(&caps).ok());
            }
        });
    });
}

fn bench_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare_draw");

    let mut ctx =
        ShaderCacheContext::new(CacheSettings::default(), NullBackend::default(), StaticSource);
    let lit = lit_state();
    let translucent = RenderState {
        blend_mode: BlendMode::Translucent,
        ..Default::default()
    };
    // Populate the cache so every iteration is a hit.
    let _ = ctx.prepare_draw(&lit);
    let _ = ctx.prepare_draw(&translucent);

    group.bench_function("hit_same_program", |b| {
        b.iter(|| black_box(ctx.prepare_draw(black_box(&lit)).ok()));
    });

    group.bench_function("hit_alternating_programs", |b| {
        b.iter(|| {
            black_box(ctx.prepare_draw(&lit).ok());
            black_box(ctx.prepare_draw(&translucent).ok());
        });
    });

    let mut frame = 0.0_f32;
    group.bench_function("hit_with_uniform_writes", |b| {
        b.iter(|| {
            frame += 1.0;
            let _ = ctx.set_uniform(UniformSlot::LocalToWorld, Mat4::from_rotation_y(frame));
            let _ = ctx.set_uniform(UniformSlot::FogColor, Vec4::new(frame, 0.5, 0.5, 1.0));
            black_box(ctx.prepare_draw(&lit).ok());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_derive_key, bench_draw);
criterion_main!(benches);
