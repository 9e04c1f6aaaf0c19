/// Placeholder replaced by the light array size when a program is built.
pub const MAX_LIGHTS_TOKEN: &str = "__MAX_LIGHTS__";

/// Declarations shared by the scene vertex and fragment stages.
///
/// Member order and types fix the byte offsets used by `layout.rs`.
pub const SCENE_PRELUDE: &str = r#"
const MAX_LIGHTS: u32 = __MAX_LIGHTS__u;

struct Light {
    position: vec3<f32>,
    range: f32,
    intensity: vec3<f32>,
    direction: vec3<f32>,
};

struct FrameUniforms {
    view_xform: mat4x4<f32>,
    projection_xform: mat4x4<f32>,
    ambient_intensity: vec3<f32>,
    camera_pos: vec3<f32>,
    lights: array<Light, __MAX_LIGHTS__>,
};

struct Material {
    ambient_colour: vec3<f32>,
    shininess: f32,
    diffuse_colour: vec3<f32>,
    has_diffuse: f32,
    specular_colour: vec3<f32>,
    has_specular: f32,
};

struct DrawUniforms {
    projection_view_model_xform: mat4x4<f32>,
    model_xform: mat4x4<f32>,
    mat: Material,
    diffuse_sampler: i32,
    specular_sampler: i32,
};

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

@group(1) @binding(0)
var<uniform> draw: DrawUniforms;

@group(2) @binding(0)
var diffuse_map: texture_2d<f32>;
@group(2) @binding(1)
var diffuse_map_sampler: sampler;
@group(2) @binding(2)
var specular_map: texture_2d<f32>;
@group(2) @binding(3)
var specular_map_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};
"#;

/// Scene vertex stage. Inputs sit at locations 0, 1 and 3.
pub const SCENE_VERTEX: &str = r#"
struct VertexInput {
    @location(0) vertex_position: vec3<f32>,
    @location(1) vertex_normal: vec3<f32>,
    @location(3) vertex_uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let world = draw.model_xform * vec4<f32>(in.vertex_position, 1.0);

    var out: VertexOutput;
    out.clip_position = draw.projection_view_model_xform * vec4<f32>(in.vertex_position, 1.0);
    out.world_position = world.xyz;
    out.world_normal = (draw.model_xform * vec4<f32>(in.vertex_normal, 0.0)).xyz;
    out.uv = in.vertex_uv;
    return out;
}
"#;

/// Scene fragment stage: Blinn-Phong over the light array.
///
/// Light kinds by slot contents:
/// - positive range and a direction: spot light, range is the cone half-angle
///   in degrees and the edge softens over the outer fifth of the cone;
/// - positive range, no direction: point light attenuating to zero at range;
/// - zero range and a direction: directional light.
///
/// Unused slots have zero intensity and contribute nothing.
pub const SCENE_FRAGMENT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let n = normalize(in.world_normal);
    let v = normalize(frame.camera_pos - in.world_position);

    let diffuse_texel = textureSample(diffuse_map, diffuse_map_sampler, in.uv).rgb;
    let specular_texel = textureSample(specular_map, specular_map_sampler, in.uv).rgb;
    let kd = mix(draw.mat.diffuse_colour, draw.mat.diffuse_colour * diffuse_texel, draw.mat.has_diffuse);
    let ks = mix(draw.mat.specular_colour, draw.mat.specular_colour * specular_texel, draw.mat.has_specular);

    var colour = frame.ambient_intensity * draw.mat.ambient_colour * kd;
    for (var i = 0u; i < MAX_LIGHTS; i = i + 1u) {
        let light = frame.lights[i];

        let to_light = light.position - in.world_position;
        let dist = length(to_light);
        let aimed = length(light.direction) > 0.0;

        var l = vec3<f32>(0.0, 1.0, 0.0);
        var attenuation = 1.0;
        if (light.range > 0.0 && aimed) {
            l = to_light / max(dist, 0.0001);
            let outer = cos(radians(light.range));
            let inner = cos(radians(light.range * 0.8));
            attenuation = smoothstep(outer, inner, dot(-l, normalize(light.direction)));
        } else if (light.range > 0.0) {
            l = to_light / max(dist, 0.0001);
            attenuation = 1.0 - smoothstep(0.0, light.range, dist);
        } else if (aimed) {
            l = -normalize(light.direction);
        } else {
            continue;
        }

        let lambert = max(dot(n, l), 0.0);
        let h = normalize(l + v);
        let shine = select(0.0, pow(max(dot(n, h), 0.0), max(draw.mat.shininess, 1.0)), lambert > 0.0);
        colour = colour + light.intensity * attenuation * (kd * lambert + ks * shine);
    }
    return vec4<f32>(colour, 1.0);
}
"#;

/// Full-screen triangle that downsamples one mip level into the next.
pub const MIPMAP_BLIT: &str = r#"
struct BlitOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0)
var source: texture_2d<f32>;
@group(0) @binding(1)
var source_sampler: sampler;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> BlitOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: BlitOutput;
    out.position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: BlitOutput) -> @location(0) vec4<f32> {
    return textureSample(source, source_sampler, in.uv);
}
"#;

/// Complete WGSL for one stage of the scene program.
pub fn stage_source(prelude: &str, stage: &str, light_capacity: usize) -> String {
    let mut source = String::with_capacity(prelude.len() + stage.len());
    source.push_str(prelude);
    source.push_str(stage);
    source.replace(MAX_LIGHTS_TOKEN, &light_capacity.max(1).to_string())
}
