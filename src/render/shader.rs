/// Flat-colour shader: position-only vertices, model/view/projection
/// transforms and one RGBA colour per draw.
pub(crate) const FLAT_COLOR: &str = r#"
struct Globals {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return globals.projection * globals.view * object.model * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return object.color;
}
"#;
