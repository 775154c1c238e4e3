use crate::error::DeviceError;

use super::layout::{Attribute, VertexFormat, VertexLayout};

/// Paint source of a shader permutation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Paint {
    /// Per-vertex color.
    Solid,
    /// Gradient ramp sampled along `uv0`.
    Linear,
    /// Radial gradient evaluated from the pixel constants, sampled from the ramp.
    Radial,
    /// Pattern texture sampled at `uv0`.
    Pattern,
}

/// Kernel width of the shadow and blur passes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlurTaps {
    T35,
    T63,
    T127,
}

impl BlurTaps {
    pub const fn count(self) -> u32 {
        match self {
            BlurTaps::T35 => 35,
            BlurTaps::T63 => 63,
            BlurTaps::T127 => 127,
        }
    }
}

/// Shading family of a shader permutation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Effect {
    /// Solid color from the pixel constants.
    Rgba,
    /// Stencil mask; writes no meaningful color.
    Mask,
    Path,
    /// Path with per-vertex coverage for anti-aliased edges.
    PathAa,
    /// Signed-distance-field glyphs.
    Sdf,
    /// Signed-distance-field glyphs, subpixel variant.
    SdfLcd,
    ImageOpacity,
    ShadowV(BlurTaps),
    ShadowH(BlurTaps),
    BlurV(BlurTaps),
    BlurH(BlurTaps),
}

macro_rules! attrs {
    ($($flag:ident)|+) => {
        VertexFormat::from_bits_retain(0 $(| VertexFormat::$flag.bits())+)
    };
}

macro_rules! shader_table {
    ($($variant:ident = $name:literal, $effect:expr, $paint:expr, [$($flag:ident)|+];)+) => {
        /// Shader permutation requested by a batch.
        ///
        /// Discriminants follow the wire order of the UI library; do not reorder.
        #[repr(u8)]
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub enum ShaderId {
            $($variant,)+
        }

        impl ShaderId {
            /// Every shader id, ordered by discriminant.
            pub const ALL: &'static [ShaderId] = &[$(ShaderId::$variant,)+];

            /// Name used by shader source keys (`Path_Solid`).
            pub const fn name(self) -> &'static str {
                match self {
                    $(ShaderId::$variant => $name,)+
                }
            }

            /// Vertex attributes consumed by this permutation.
            pub const fn format(self) -> VertexFormat {
                match self {
                    $(ShaderId::$variant => attrs!($($flag)|+),)+
                }
            }

            pub const fn effect(self) -> Effect {
                match self {
                    $(ShaderId::$variant => $effect,)+
                }
            }

            /// Paint source, or `None` for permutations that do not paint
            /// (`Rgba`, `Mask`, vertical blur/shadow passes).
            pub const fn paint(self) -> Option<Paint> {
                match self {
                    $(ShaderId::$variant => $paint,)+
                }
            }
        }
    };
}

use BlurTaps::{T127, T35, T63};
use Effect::*;
use Paint::{Linear, Pattern, Radial, Solid};

shader_table! {
    Rgba = "RGBA", Rgba, None, [POS];
    Mask = "Mask", Mask, None, [POS];

    PathSolid = "Path_Solid", Path, Some(Solid), [POS | COLOR];
    PathLinear = "Path_Linear", Path, Some(Linear), [POS | TEX0];
    PathRadial = "Path_Radial", Path, Some(Radial), [POS | TEX0];
    PathPattern = "Path_Pattern", Path, Some(Pattern), [POS | TEX0];

    PathAaSolid = "PathAA_Solid", PathAa, Some(Solid), [POS | COLOR | COVERAGE];
    PathAaLinear = "PathAA_Linear", PathAa, Some(Linear), [POS | TEX0 | COVERAGE];
    PathAaRadial = "PathAA_Radial", PathAa, Some(Radial), [POS | TEX0 | COVERAGE];
    PathAaPattern = "PathAA_Pattern", PathAa, Some(Pattern), [POS | TEX0 | COVERAGE];

    SdfSolid = "SDF_Solid", Sdf, Some(Solid), [POS | COLOR | TEX1];
    SdfLinear = "SDF_Linear", Sdf, Some(Linear), [POS | TEX0 | TEX1];
    SdfRadial = "SDF_Radial", Sdf, Some(Radial), [POS | TEX0 | TEX1];
    SdfPattern = "SDF_Pattern", Sdf, Some(Pattern), [POS | TEX0 | TEX1];

    SdfLcdSolid = "SDF_LCD_Solid", SdfLcd, Some(Solid), [POS | COLOR | TEX1];
    SdfLcdLinear = "SDF_LCD_Linear", SdfLcd, Some(Linear), [POS | TEX0 | TEX1];
    SdfLcdRadial = "SDF_LCD_Radial", SdfLcd, Some(Radial), [POS | TEX0 | TEX1];
    SdfLcdPattern = "SDF_LCD_Pattern", SdfLcd, Some(Pattern), [POS | TEX0 | TEX1];

    ImageOpacitySolid = "Image_Opacity_Solid", ImageOpacity, Some(Solid), [POS | COLOR | TEX1];
    ImageOpacityLinear = "Image_Opacity_Linear", ImageOpacity, Some(Linear), [POS | TEX0 | TEX1];
    ImageOpacityRadial = "Image_Opacity_Radial", ImageOpacity, Some(Radial), [POS | TEX0 | TEX1];
    ImageOpacityPattern = "Image_Opacity_Pattern", ImageOpacity, Some(Pattern), [POS | TEX0 | TEX1];

    ImageShadow35V = "Image_Shadow35V", ShadowV(T35), None, [POS | COLOR | TEX1 | TEX2];
    ImageShadow63V = "Image_Shadow63V", ShadowV(T63), None, [POS | COLOR | TEX1 | TEX2];
    ImageShadow127V = "Image_Shadow127V", ShadowV(T127), None, [POS | COLOR | TEX1 | TEX2];

    ImageShadow35HSolid = "Image_Shadow35H_Solid", ShadowH(T35), Some(Solid), [POS | COLOR | TEX1 | TEX2];
    ImageShadow35HLinear = "Image_Shadow35H_Linear", ShadowH(T35), Some(Linear), [POS | TEX0 | TEX1 | TEX2];
    ImageShadow35HRadial = "Image_Shadow35H_Radial", ShadowH(T35), Some(Radial), [POS | TEX0 | TEX1 | TEX2];
    ImageShadow35HPattern = "Image_Shadow35H_Pattern", ShadowH(T35), Some(Pattern), [POS | TEX0 | TEX1 | TEX2];

    ImageShadow63HSolid = "Image_Shadow63H_Solid", ShadowH(T63), Some(Solid), [POS | COLOR | TEX1 | TEX2];
    ImageShadow63HLinear = "Image_Shadow63H_Linear", ShadowH(T63), Some(Linear), [POS | TEX0 | TEX1 | TEX2];
    ImageShadow63HRadial = "Image_Shadow63H_Radial", ShadowH(T63), Some(Radial), [POS | TEX0 | TEX1 | TEX2];
    ImageShadow63HPattern = "Image_Shadow63H_Pattern", ShadowH(T63), Some(Pattern), [POS | TEX0 | TEX1 | TEX2];

    ImageShadow127HSolid = "Image_Shadow127H_Solid", ShadowH(T127), Some(Solid), [POS | COLOR | TEX1 | TEX2];
    ImageShadow127HLinear = "Image_Shadow127H_Linear", ShadowH(T127), Some(Linear), [POS | TEX0 | TEX1 | TEX2];
    ImageShadow127HRadial = "Image_Shadow127H_Radial", ShadowH(T127), Some(Radial), [POS | TEX0 | TEX1 | TEX2];
    ImageShadow127HPattern = "Image_Shadow127H_Pattern", ShadowH(T127), Some(Pattern), [POS | TEX0 | TEX1 | TEX2];

    ImageBlur35V = "Image_Blur35V", BlurV(T35), None, [POS | COLOR | TEX1 | TEX2];
    ImageBlur63V = "Image_Blur63V", BlurV(T63), None, [POS | COLOR | TEX1 | TEX2];
    ImageBlur127V = "Image_Blur127V", BlurV(T127), None, [POS | COLOR | TEX1 | TEX2];

    ImageBlur35HSolid = "Image_Blur35H_Solid", BlurH(T35), Some(Solid), [POS | COLOR | TEX1 | TEX2];
    ImageBlur35HLinear = "Image_Blur35H_Linear", BlurH(T35), Some(Linear), [POS | TEX0 | TEX1 | TEX2];
    ImageBlur35HRadial = "Image_Blur35H_Radial", BlurH(T35), Some(Radial), [POS | TEX0 | TEX1 | TEX2];
    ImageBlur35HPattern = "Image_Blur35H_Pattern", BlurH(T35), Some(Pattern), [POS | TEX0 | TEX1 | TEX2];

    ImageBlur63HSolid = "Image_Blur63H_Solid", BlurH(T63), Some(Solid), [POS | COLOR | TEX1 | TEX2];
    ImageBlur63HLinear = "Image_Blur63H_Linear", BlurH(T63), Some(Linear), [POS | TEX0 | TEX1 | TEX2];
    ImageBlur63HRadial = "Image_Blur63H_Radial", BlurH(T63), Some(Radial), [POS | TEX0 | TEX1 | TEX2];
    ImageBlur63HPattern = "Image_Blur63H_Pattern", BlurH(T63), Some(Pattern), [POS | TEX0 | TEX1 | TEX2];

    ImageBlur127HSolid = "Image_Blur127H_Solid", BlurH(T127), Some(Solid), [POS | COLOR | TEX1 | TEX2];
    ImageBlur127HLinear = "Image_Blur127H_Linear", BlurH(T127), Some(Linear), [POS | TEX0 | TEX1 | TEX2];
    ImageBlur127HRadial = "Image_Blur127H_Radial", BlurH(T127), Some(Radial), [POS | TEX0 | TEX1 | TEX2];
    ImageBlur127HPattern = "Image_Blur127H_Pattern", BlurH(T127), Some(Pattern), [POS | TEX0 | TEX1 | TEX2];
}

impl ShaderId {
    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Glyph permutations whose vertex stage emits texel-space coordinates.
    pub const fn is_sdf(self) -> bool {
        matches!(self.effect(), Effect::Sdf | Effect::SdfLcd)
    }

    pub fn vertex_layout(self) -> VertexLayout {
        VertexLayout::new(self.format())
    }

    /// Key of the vertex shader source, e.g. `PosColorTex1_SDF_VS`.
    ///
    /// Permutations with the same attribute set share a vertex shader.
    pub fn vertex_shader_key(self) -> String {
        let format = self.format();
        let mut key = String::with_capacity(32);
        for attribute in Attribute::ALL {
            if format.contains(attribute.flag()) {
                key.push_str(attribute.key());
            }
        }
        if self.is_sdf() {
            key.push_str("_SDF");
        }
        key.push_str("_VS");
        key
    }

    /// Key of the fragment shader source, e.g. `Path_Solid_FS`.
    pub fn fragment_shader_key(self) -> String {
        format!("{}_FS", self.name())
    }
}

impl TryFrom<u8> for ShaderId {
    type Error = DeviceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ShaderId::ALL
            .get(value as usize)
            .copied()
            .ok_or(DeviceError::UnknownShader(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Format rule shared by all families: paint picks COLOR or TEX0, the
    /// effect adds its own attributes.
    fn expected_format(id: ShaderId) -> VertexFormat {
        let paint = match id.paint() {
            Some(Paint::Solid) => VertexFormat::COLOR,
            Some(_) => VertexFormat::TEX0,
            None => VertexFormat::empty(),
        };
        let effect = match id.effect() {
            Effect::Rgba | Effect::Mask | Effect::Path => VertexFormat::empty(),
            Effect::PathAa => VertexFormat::COVERAGE,
            Effect::Sdf | Effect::SdfLcd | Effect::ImageOpacity => VertexFormat::TEX1,
            Effect::ShadowV(_) | Effect::BlurV(_) => {
                VertexFormat::COLOR | VertexFormat::TEX1 | VertexFormat::TEX2
            }
            Effect::ShadowH(_) | Effect::BlurH(_) => VertexFormat::TEX1 | VertexFormat::TEX2,
        };
        VertexFormat::POS | paint | effect
    }

    // ── table ─────────────────────────────────────────────────────────────

    #[test]
    fn table_has_fifty_two_permutations() {
        assert_eq!(ShaderId::COUNT, 52);
        assert_eq!(ShaderId::ImageBlur127HPattern as u8, 51);
    }

    #[test]
    fn discriminants_match_table_order() {
        for (i, id) in ShaderId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i, "{id:?}");
        }
    }

    #[test]
    fn documented_formats() {
        assert_eq!(ShaderId::Rgba.format(), VertexFormat::POS);
        assert_eq!(ShaderId::PathSolid.format(), VertexFormat::POS | VertexFormat::COLOR);
        assert_eq!(ShaderId::PathRadial.format(), VertexFormat::POS | VertexFormat::TEX0);
        assert_eq!(
            ShaderId::PathAaSolid.format(),
            VertexFormat::POS | VertexFormat::COLOR | VertexFormat::COVERAGE
        );
        assert_eq!(
            ShaderId::SdfLcdPattern.format(),
            VertexFormat::POS | VertexFormat::TEX0 | VertexFormat::TEX1
        );
        assert_eq!(
            ShaderId::ImageShadow63V.format(),
            VertexFormat::POS | VertexFormat::COLOR | VertexFormat::TEX1 | VertexFormat::TEX2
        );
        assert_eq!(
            ShaderId::ImageBlur35HLinear.format(),
            VertexFormat::POS | VertexFormat::TEX0 | VertexFormat::TEX1 | VertexFormat::TEX2
        );
    }

    #[test]
    fn every_format_follows_the_family_rule() {
        for &id in ShaderId::ALL {
            assert_eq!(id.format(), expected_format(id), "{id:?}");
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = ShaderId::ALL.iter().map(|id| id.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ShaderId::COUNT);
    }

    // ── keys ──────────────────────────────────────────────────────────────

    #[test]
    fn vertex_shader_keys() {
        assert_eq!(ShaderId::Rgba.vertex_shader_key(), "Pos_VS");
        assert_eq!(ShaderId::PathAaLinear.vertex_shader_key(), "PosTex0Coverage_VS");
        assert_eq!(ShaderId::SdfSolid.vertex_shader_key(), "PosColorTex1_SDF_VS");
        assert_eq!(ShaderId::ImageOpacitySolid.vertex_shader_key(), "PosColorTex1_VS");
        assert_eq!(
            ShaderId::ImageShadow35HRadial.vertex_shader_key(),
            "PosTex0Tex1Tex2_VS"
        );
    }

    #[test]
    fn fragment_shader_keys() {
        assert_eq!(ShaderId::PathSolid.fragment_shader_key(), "Path_Solid_FS");
        assert_eq!(ShaderId::SdfLcdRadial.fragment_shader_key(), "SDF_LCD_Radial_FS");
    }

    #[test]
    fn sdf_flag_only_on_glyph_permutations() {
        let sdf: Vec<_> = ShaderId::ALL.iter().filter(|id| id.is_sdf()).collect();
        assert_eq!(sdf.len(), 8);
        assert!(!ShaderId::ImageOpacitySolid.is_sdf());
    }

    // ── decoding ──────────────────────────────────────────────────────────

    #[test]
    fn decodes_in_range_bytes() {
        assert_eq!(ShaderId::try_from(2).unwrap(), ShaderId::PathSolid);
        assert_eq!(ShaderId::try_from(51).unwrap(), ShaderId::ImageBlur127HPattern);
    }

    #[test]
    fn rejects_out_of_range_bytes() {
        assert!(matches!(ShaderId::try_from(52), Err(DeviceError::UnknownShader(52))));
    }

    #[test]
    fn layout_strides() {
        assert_eq!(ShaderId::PathSolid.vertex_layout().stride(), 12);
        assert_eq!(ShaderId::PathAaSolid.vertex_layout().stride(), 16);
        assert_eq!(ShaderId::ImageShadow35HLinear.vertex_layout().stride(), 32);
    }
}
