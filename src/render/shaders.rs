pub(crate) const SCENE_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    sky_inverse: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
    light_position: vec4<f32>,
    light_color: vec4<f32>,
}

struct Object {
    model: mat4x4<f32>,
    color: vec4<f32>,
    // x: 1.0 when the body ignores lighting
    params: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> object: Object;

@group(2) @binding(0)
var surface_texture: texture_2d<f32>;
@group(2) @binding(1)
var surface_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;
    out.normal = normalize((object.model * vec4<f32>(input.normal, 0.0)).xyz);
    out.uv = input.uv;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let base = textureSample(surface_texture, surface_sampler, input.uv).rgb * object.color.rgb;
    if (object.params.x > 0.5) {
        return vec4<f32>(base, 1.0);
    }
    let normal = normalize(input.normal);
    let light_dir = normalize(globals.light_position.xyz - input.world_pos);
    let diffuse = max(dot(normal, light_dir), 0.0);
    let lit = base * (globals.ambient.rgb + globals.light_color.rgb * diffuse);
    return vec4<f32>(lit, 1.0);
}
"#;

pub(crate) const SKY_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    sky_inverse: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
    light_position: vec4<f32>,
    light_color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var sky_texture: texture_cube<f32>;
@group(1) @binding(1)
var sky_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
}

@vertex
fn vs_sky(@builtin(vertex_index) index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.ndc = uv * 2.0 - 1.0;
    out.position = vec4<f32>(out.ndc, 1.0, 1.0);
    return out;
}

@fragment
fn fs_sky(input: VertexOutput) -> @location(0) vec4<f32> {
    let world = globals.sky_inverse * vec4<f32>(input.ndc, 1.0, 1.0);
    let dir = world.xyz / world.w;
    // faces are authored for a mirrored lookup
    return textureSample(sky_texture, sky_sampler, vec3<f32>(-dir.x, dir.y, dir.z));
}
"#;

pub(crate) const POST_SHADER: &str = r#"
struct BloomParams {
    threshold: f32,
    strength: f32,
    radius: f32,
    smooth_width: f32,
    direction: vec2<f32>,
    padding: vec2<f32>,
}

@group(0) @binding(0)
var<uniform> params: BloomParams;
@group(0) @binding(1)
var source: texture_2d<f32>;
@group(0) @binding(2)
var overlay: texture_2d<f32>;
@group(0) @binding(3)
var linear_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

@fragment
fn fs_extract(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(source, linear_sampler, input.uv).rgb;
    let luma = dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
    let weight = smoothstep(params.threshold, params.threshold + params.smooth_width, luma);
    return vec4<f32>(color * weight, 1.0);
}

@fragment
fn fs_blur(input: VertexOutput) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.22702703, 0.1945946, 0.12162162, 0.054054055, 0.016216216);
    let texel = 1.0 / vec2<f32>(textureDimensions(source));
    let spread = params.direction * texel * (1.0 + params.radius * 4.0);
    var color = textureSample(source, linear_sampler, input.uv).rgb * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = spread * f32(i);
        color += textureSample(source, linear_sampler, input.uv + offset).rgb * weights[i];
        color += textureSample(source, linear_sampler, input.uv - offset).rgb * weights[i];
    }
    return vec4<f32>(color, 1.0);
}

@fragment
fn fs_composite(input: VertexOutput) -> @location(0) vec4<f32> {
    let scene = textureSample(source, linear_sampler, input.uv).rgb;
    let bloom = textureSample(overlay, linear_sampler, input.uv).rgb;
    return vec4<f32>(min(scene + bloom * params.strength, vec3<f32>(1.0)), 1.0);
}
"#;
