use bitflags::bitflags;

bitflags! {
    /// Vertex attributes consumed by a shader permutation.
    ///
    ///  Name       Format               Size (bytes)   Semantic
    ///  -----------------------------------------------------------------
    ///  POS        Float32x2            8              position (x, y)
    ///  COLOR      Unorm8x4             4              color (rgba)
    ///  TEX0       Float32x2            8              paint uv
    ///  TEX1       Float32x2            8              image/glyph uv
    ///  TEX2       Unorm16x4            8              rect (x0, y0, x1, y1)
    ///  COVERAGE   Float32              4              coverage
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct VertexFormat: u8 {
        const POS = 1 << 0;
        const COLOR = 1 << 1;
        const TEX0 = 1 << 2;
        const TEX1 = 1 << 3;
        const TEX2 = 1 << 4;
        const COVERAGE = 1 << 5;
    }
}

/// Semantic of a single vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Attribute {
    Position,
    Color,
    Tex0,
    Tex1,
    Tex2,
    Coverage,
}

impl Attribute {
    /// All attributes in vertex order.
    pub const ALL: [Attribute; 6] = [
        Attribute::Position,
        Attribute::Color,
        Attribute::Tex0,
        Attribute::Tex1,
        Attribute::Tex2,
        Attribute::Coverage,
    ];

    pub const fn flag(self) -> VertexFormat {
        match self {
            Attribute::Position => VertexFormat::POS,
            Attribute::Color => VertexFormat::COLOR,
            Attribute::Tex0 => VertexFormat::TEX0,
            Attribute::Tex1 => VertexFormat::TEX1,
            Attribute::Tex2 => VertexFormat::TEX2,
            Attribute::Coverage => VertexFormat::COVERAGE,
        }
    }

    pub const fn format(self) -> AttributeFormat {
        match self {
            Attribute::Position | Attribute::Tex0 | Attribute::Tex1 => AttributeFormat::Float32x2,
            Attribute::Color => AttributeFormat::Unorm8x4,
            Attribute::Tex2 => AttributeFormat::Unorm16x4,
            Attribute::Coverage => AttributeFormat::Float32,
        }
    }

    /// Shader input location. Locations are fixed per attribute, not packed,
    /// so one shader source can serve every layout that contains the attribute.
    pub const fn location(self) -> u32 {
        match self {
            Attribute::Position => 0,
            Attribute::Color => 1,
            Attribute::Tex0 => 2,
            Attribute::Tex1 => 3,
            Attribute::Tex2 => 4,
            Attribute::Coverage => 5,
        }
    }

    /// Fragment used to build vertex shader keys (`PosColorTex1_VS`).
    pub const fn key(self) -> &'static str {
        match self {
            Attribute::Position => "Pos",
            Attribute::Color => "Color",
            Attribute::Tex0 => "Tex0",
            Attribute::Tex1 => "Tex1",
            Attribute::Tex2 => "Tex2",
            Attribute::Coverage => "Coverage",
        }
    }
}

/// Backend-neutral element format.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AttributeFormat {
    Float32x2,
    Unorm8x4,
    Unorm16x4,
    Float32,
}

impl AttributeFormat {
    pub const fn size(self) -> u32 {
        match self {
            AttributeFormat::Float32x2 | AttributeFormat::Unorm16x4 => 8,
            AttributeFormat::Unorm8x4 | AttributeFormat::Float32 => 4,
        }
    }
}

/// One attribute placed inside an interleaved vertex.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    pub attribute: Attribute,
    pub format: AttributeFormat,
    pub offset: u32,
    pub location: u32,
}

/// Interleaved vertex layout derived from a [`VertexFormat`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VertexLayout {
    format: VertexFormat,
    stride: u32,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new(format: VertexFormat) -> Self {
        let mut offset = 0;
        let mut attributes = Vec::with_capacity(Attribute::ALL.len());

        for attribute in Attribute::ALL {
            if !format.contains(attribute.flag()) {
                continue;
            }
            let element = attribute.format();
            attributes.push(VertexAttribute {
                attribute,
                format: element,
                offset,
                location: attribute.location(),
            });
            offset += element.size();
        }

        Self {
            format,
            stride: offset,
            attributes,
        }
    }

    #[inline]
    pub fn format(&self) -> VertexFormat {
        self.format
    }

    /// Size of one vertex in bytes.
    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[inline]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, attribute: Attribute) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.attribute == attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_only_layout() {
        let layout = VertexLayout::new(VertexFormat::POS);
        assert_eq!(layout.stride(), 8);
        assert_eq!(layout.attributes().len(), 1);
        assert_eq!(layout.attributes()[0].location, 0);
    }

    #[test]
    fn offsets_are_packed_in_attribute_order() {
        let layout = VertexLayout::new(
            VertexFormat::POS | VertexFormat::COLOR | VertexFormat::TEX1 | VertexFormat::TEX2,
        );
        let offsets: Vec<_> = layout.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 8, 12, 20]);
        assert_eq!(layout.stride(), 28);
    }

    #[test]
    fn locations_do_not_depend_on_presence_of_other_attributes() {
        let layout = VertexLayout::new(VertexFormat::POS | VertexFormat::COVERAGE);
        let coverage = layout.attribute(Attribute::Coverage).unwrap();
        assert_eq!(coverage.location, 5);
        assert_eq!(coverage.offset, 8);
        assert_eq!(coverage.format, AttributeFormat::Float32);
    }
}
