//! Built-in WGSL sources.
//!
//! Every pass draws the same full-screen triangle. Fragment stages receive
//! [`VertexOutput`](FULLSCREEN_VERTEX) with `uv` in `[0, 1]`, origin at the top left to match
//! texture coordinates, so sampling another pass's output at `in.uv` reproduces it.

/// Vertex stage shared by every program: one triangle covering clip space.
pub const FULLSCREEN_VERTEX: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
}

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> VertexOutput {
    // (-1,-1), (3,-1), (-1,3)
    let x = f32((vi << 1u) & 2u) * 2.0 - 1.0;
    let y = f32(vi & 2u) * 2.0 - 1.0;
    var out: VertexOutput;
    out.position = vec4f(x, y, 0.0, 1.0);
    out.uv = vec2f(x * 0.5 + 0.5, 0.5 - y * 0.5);
    return out;
}
"#;

/// Copies `map` onto the destination, sampling by fragment position.
pub const COPY_TO_SCREEN: &str = r#"
struct Uniforms {
    resolution: vec2f,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var map: texture_2d<f32>;
@group(0) @binding(2) var map_sampler: sampler;

@fragment
fn fs(in: VertexOutput) -> @location(0) vec4f {
    return textureSample(map, map_sampler, in.position.xy / u.resolution);
}
"#;

/// Linear blend from `from` to `to` by `progress`.
///
/// Transition shaders follow this layout: the two automatic vector uniforms, then
/// `progress`, then the two textures.
pub const CROSSFADE: &str = r#"
struct Uniforms {
    resolution: vec2f,
    surface_resolution: vec2f,
    progress: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var from_texture: texture_2d<f32>;
@group(0) @binding(2) var from_sampler: sampler;
@group(0) @binding(3) var to_texture: texture_2d<f32>;
@group(0) @binding(4) var to_sampler: sampler;

@fragment
fn fs(in: VertexOutput) -> @location(0) vec4f {
    let a = textureSample(from_texture, from_sampler, in.uv);
    let b = textureSample(to_texture, to_sampler, in.uv);
    return mix(a, b, u.progress);
}
"#;

/// Prepend the shared vertex stage to a fragment-only module.
pub fn with_fullscreen_vertex(fragment: &str) -> String {
    format!("{FULLSCREEN_VERTEX}\n{fragment}")
}
