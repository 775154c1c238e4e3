//! Generated WGSL for every shader permutation.
//!
//! Interface shared by all modules:
//!
//!  Group  Binding  Resource
//!  ---------------------------------------------------------
//!  0      0        vertex constants (projection)
//!  0      1        texture dimensions
//!  0      2        pixel constants (12 floats)
//!  0      3        effect constants (16 floats)
//!  1      0, 1     pattern texture, sampler
//!  1      2, 3     ramps texture, sampler
//!  1      4, 5     image texture, sampler
//!  1      6, 7     glyphs texture, sampler
//!  1      8, 9     shadow texture, sampler
//!
//! Vertex attributes keep their fixed locations; the vertex stage always
//! writes the full `VsOut`, filling absent attributes with neutral values.

use std::fmt::Write;

use crate::error::DeviceError;
use crate::shader::{Attribute, BlurTaps, Effect, Paint, ShaderId};

use super::shaders::{ShaderLibrary, ShaderStage};

/// Distance-field encoding of the glyph atlas: texel value to distance in texels.
const SDF_SCALE: f32 = 7.96875;
const SDF_BIAS: f32 = 0.50196;

const PRELUDE: &str = r#"struct VertexConstants {
    proj: mat4x4<f32>,
}

struct PixelConstants {
    v: array<vec4<f32>, 3>,
}

struct EffectConstants {
    v: array<vec4<f32>, 4>,
}

@group(0) @binding(0) var<uniform> vc: VertexConstants;
@group(0) @binding(1) var<uniform> texdims: vec4<f32>;
@group(0) @binding(2) var<uniform> pc: PixelConstants;
@group(0) @binding(3) var<uniform> ec: EffectConstants;

@group(1) @binding(0) var pattern_tex: texture_2d<f32>;
@group(1) @binding(1) var pattern_smp: sampler;
@group(1) @binding(2) var ramps_tex: texture_2d<f32>;
@group(1) @binding(3) var ramps_smp: sampler;
@group(1) @binding(4) var image_tex: texture_2d<f32>;
@group(1) @binding(5) var image_smp: sampler;
@group(1) @binding(6) var glyphs_tex: texture_2d<f32>;
@group(1) @binding(7) var glyphs_smp: sampler;
@group(1) @binding(8) var shadow_tex: texture_2d<f32>;
@group(1) @binding(9) var shadow_smp: sampler;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv0: vec2<f32>,
    @location(2) uv1: vec2<f32>,
    @location(3) rect: vec4<f32>,
    @location(4) coverage: f32,
    @location(5) st: vec2<f32>,
}
"#;

/// Shader library that generates its sources.
#[derive(Debug, Default, Copy, Clone)]
pub struct BuiltinShaders;

impl ShaderLibrary for BuiltinShaders {
    fn source(&self, shader: ShaderId, stage: ShaderStage) -> Result<String, DeviceError> {
        Ok(match stage {
            ShaderStage::Vertex => vertex_wgsl(shader),
            ShaderStage::Fragment => fragment_wgsl(shader),
        })
    }
}

fn attribute_decl(attribute: Attribute) -> (&'static str, &'static str) {
    match attribute {
        Attribute::Position => ("pos", "vec2<f32>"),
        Attribute::Color => ("color", "vec4<f32>"),
        Attribute::Tex0 => ("uv0", "vec2<f32>"),
        Attribute::Tex1 => ("uv1", "vec2<f32>"),
        Attribute::Tex2 => ("rect", "vec4<f32>"),
        Attribute::Coverage => ("coverage", "f32"),
    }
}

/// Vertex stage for the attribute set of `shader`.
pub fn vertex_wgsl(shader: ShaderId) -> String {
    let format = shader.format();
    let has = |a: Attribute| format.contains(a.flag());

    let mut out = String::from(PRELUDE);
    out.push_str("\nstruct VsIn {\n");
    for attribute in Attribute::ALL {
        if has(attribute) {
            let (name, ty) = attribute_decl(attribute);
            let _ = writeln!(out, "    @location({}) {name}: {ty},", attribute.location());
        }
    }
    out.push_str("}\n\n");

    out.push_str("@vertex\nfn vs_main(input: VsIn) -> VsOut {\n");
    out.push_str("    var out: VsOut;\n");
    out.push_str("    out.pos = vc.proj * vec4<f32>(input.pos, 0.0, 1.0);\n");

    let passthrough = |a: Attribute, neutral: &str| -> String {
        let (name, _) = attribute_decl(a);
        if has(a) {
            format!("    out.{name} = input.{name};\n")
        } else {
            format!("    out.{name} = {neutral};\n")
        }
    };
    out.push_str(&passthrough(Attribute::Color, "vec4<f32>(1.0)"));
    out.push_str(&passthrough(Attribute::Tex0, "vec2<f32>(0.0)"));
    out.push_str(&passthrough(Attribute::Tex1, "vec2<f32>(0.0)"));
    out.push_str(&passthrough(Attribute::Tex2, "vec4<f32>(0.0, 0.0, 1.0, 1.0)"));
    out.push_str(&passthrough(Attribute::Coverage, "1.0"));

    if shader.is_sdf() {
        out.push_str("    out.st = input.uv1 * texdims.xy;\n");
    } else {
        out.push_str("    out.st = vec2<f32>(0.0);\n");
    }
    out.push_str("    return out;\n}\n");
    out
}

fn paint_wgsl(paint: Paint) -> &'static str {
    match paint {
        Paint::Solid => "    let paint = input.color;\n",
        Paint::Linear => {
            "    let paint = textureSample(ramps_tex, ramps_smp, input.uv0) * pc.v[0].x;\n"
        }
        Paint::Pattern => {
            "    let paint = textureSample(pattern_tex, pattern_smp, input.uv0) * pc.v[0].x;\n"
        }
        Paint::Radial => concat!(
            "    let g0 = pc.v[0];\n",
            "    let g1 = pc.v[1];\n",
            "    let dd = g1.x * input.uv0.x - g1.y * input.uv0.y;\n",
            "    let r2 = max(dot(input.uv0, input.uv0) - dd * dd, 0.0);\n",
            "    let u = g0.x * input.uv0.x + g0.y * input.uv0.y + g0.z * sqrt(r2);\n",
            "    let paint = textureSample(ramps_tex, ramps_smp, vec2<f32>(u, g1.z)) * pc.v[2].x;\n",
        ),
    }
}

/// Separable gaussian over `tex`, stepping along `axis` and clamped to the
/// vertex rect. Leaves the weighted sum in `blur`.
fn blur_wgsl(out: &mut String, taps: BlurTaps, tex: &str, axis: &str) {
    let count = taps.count();
    let half = count / 2;
    let sigma = count as f32 / 6.0;
    let _ = write!(
        out,
        concat!(
            "    var acc = vec4<f32>(0.0);\n",
            "    var wsum = 0.0;\n",
            "    for (var i = 0; i < {count}; i += 1) {{\n",
            "        let o = f32(i - {half});\n",
            "        let w = exp(-0.5 * o * o / ({sigma:?} * {sigma:?}));\n",
            "        let uv = clamp(input.uv1 + {axis} * o, input.rect.xy, input.rect.zw);\n",
            "        acc += w * textureSampleLevel({tex}_tex, {tex}_smp, uv, 0.0);\n",
            "        wsum += w;\n",
            "    }}\n",
            "    let blur = acc / wsum;\n",
        ),
        count = count,
        half = half,
        sigma = sigma,
        axis = axis,
        tex = tex,
    );
}

const VERTICAL: &str = "vec2<f32>(0.0, texdims.w)";
const HORIZONTAL: &str = "vec2<f32>(texdims.z, 0.0)";

/// Fragment stage for `shader`.
pub fn fragment_wgsl(shader: ShaderId) -> String {
    let mut out = String::from(PRELUDE);
    out.push_str("\n@fragment\nfn fs_main(input: VsOut) -> @location(0) vec4<f32> {\n");

    if let Some(paint) = shader.paint() {
        out.push_str(paint_wgsl(paint));
    }

    match shader.effect() {
        Effect::Rgba => out.push_str("    return pc.v[0];\n"),
        Effect::Mask => out.push_str("    return vec4<f32>(1.0);\n"),
        Effect::Path => out.push_str("    return paint;\n"),
        Effect::PathAa => out.push_str("    return paint * input.coverage;\n"),
        Effect::Sdf | Effect::SdfLcd => {
            let _ = write!(
                out,
                concat!(
                    "    let r = textureSample(glyphs_tex, glyphs_smp, input.uv1).r;\n",
                    "    let dist = {scale:?} * (r - {bias:?});\n",
                    "    let width = max(length(fwidth(input.st)) * 0.7071, 0.0001);\n",
                    "    let alpha = clamp(dist / width + 0.5, 0.0, 1.0);\n",
                    "    return paint * alpha;\n",
                ),
                scale = SDF_SCALE,
                bias = SDF_BIAS,
            );
        }
        Effect::ImageOpacity => {
            out.push_str("    return textureSample(image_tex, image_smp, input.uv1) * paint.a;\n");
        }
        Effect::ShadowV(taps) => {
            blur_wgsl(&mut out, taps, "image", VERTICAL);
            out.push_str("    return vec4<f32>(0.0, 0.0, 0.0, blur.a);\n");
        }
        Effect::BlurV(taps) => {
            blur_wgsl(&mut out, taps, "image", VERTICAL);
            out.push_str("    return blur;\n");
        }
        Effect::ShadowH(taps) => {
            out.push_str("    let img = textureSample(image_tex, image_smp, input.uv1);\n");
            blur_wgsl(&mut out, taps, "shadow", HORIZONTAL);
            out.push_str("    let shadow = ec.v[0] * blur.a;\n");
            out.push_str("    return (img + shadow * (1.0 - img.a)) * paint.a;\n");
        }
        Effect::BlurH(taps) => {
            blur_wgsl(&mut out, taps, "shadow", HORIZONTAL);
            out.push_str("    return blur * paint.a;\n");
        }
    }

    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(source: &str, label: &str) {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|err| panic!("{label} WGSL parse failed: {}", err.emit_to_string(source)));
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        );
        validator
            .validate(&module)
            .unwrap_or_else(|err| panic!("{label} WGSL validation failed: {err:?}"));
    }

    #[test]
    fn every_vertex_stage_validates() {
        for &shader in ShaderId::ALL {
            validate(&vertex_wgsl(shader), &shader.vertex_shader_key());
        }
    }

    #[test]
    fn every_fragment_stage_validates() {
        for &shader in ShaderId::ALL {
            validate(&fragment_wgsl(shader), &shader.fragment_shader_key());
        }
    }

    #[test]
    fn modules_export_stage_entry_points() {
        let library = BuiltinShaders;
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let source = library.source(ShaderId::PathSolid, stage).unwrap();
            assert!(source.contains(&format!("fn {}(", stage.entry_point())));
        }
    }

    #[test]
    fn vertex_inputs_follow_format() {
        let source = vertex_wgsl(ShaderId::PathAaLinear);
        let start = source.find("struct VsIn").unwrap();
        let end = start + source[start..].find('}').unwrap();
        let inputs = &source[start..end];

        assert!(inputs.contains("@location(0) pos: vec2<f32>"));
        assert!(inputs.contains("@location(2) uv0: vec2<f32>"));
        assert!(inputs.contains("@location(5) coverage: f32"));
        assert!(!inputs.contains("color"));
        assert!(source.contains("out.color = vec4<f32>(1.0);"));
    }

    #[test]
    fn sdf_vertex_stage_emits_texel_coordinates() {
        assert!(vertex_wgsl(ShaderId::SdfSolid).contains("out.st = input.uv1 * texdims.xy;"));
        assert!(vertex_wgsl(ShaderId::ImageOpacitySolid).contains("out.st = vec2<f32>(0.0);"));
    }

    #[test]
    fn blur_width_matches_taps() {
        assert!(fragment_wgsl(ShaderId::ImageBlur127V).contains("i < 127"));
        assert!(fragment_wgsl(ShaderId::ImageShadow35HSolid).contains("i < 35"));
    }
}
