use crate::batch::{BlendMode, RenderState, StencilMode};
use crate::shader::{AttributeFormat, ShaderId, VertexLayout};

use super::shaders::ShaderStage;

/// The part of a render state that is baked into a wgpu pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) struct PipelineKey {
    pub shader: ShaderId,
    pub color_enable: bool,
    pub blend: BlendMode,
    pub stencil: StencilMode,
}

impl PipelineKey {
    pub fn new(shader: ShaderId, state: RenderState, stencil_available: bool) -> Self {
        Self {
            shader,
            color_enable: state.color_enable,
            blend: state.blend,
            stencil: if stencil_available {
                state.stencil
            } else {
                StencilMode::Disabled
            },
        }
    }

    pub fn base(shader: ShaderId) -> Self {
        Self::new(shader, RenderState::default(), true)
    }
}

// ── blend ────────────────────────────────────────────────────────────────

pub(crate) fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

pub(crate) fn color_target(key: PipelineKey, format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format,
        blend: match key.blend {
            BlendMode::Src => None,
            BlendMode::SrcOver => Some(premul_alpha_blend()),
        },
        write_mask: if key.color_enable {
            wgpu::ColorWrites::ALL
        } else {
            wgpu::ColorWrites::empty()
        },
    }
}

// ── stencil ──────────────────────────────────────────────────────────────

pub(crate) fn stencil_state(mode: StencilMode) -> wgpu::StencilState {
    let (compare, pass_op) = match mode {
        StencilMode::Disabled => (wgpu::CompareFunction::Always, wgpu::StencilOperation::Keep),
        StencilMode::EqualKeep => (wgpu::CompareFunction::Equal, wgpu::StencilOperation::Keep),
        StencilMode::EqualIncr => (
            wgpu::CompareFunction::Equal,
            wgpu::StencilOperation::IncrementClamp,
        ),
        StencilMode::EqualDecr => (
            wgpu::CompareFunction::Equal,
            wgpu::StencilOperation::DecrementClamp,
        ),
        StencilMode::Clear => (wgpu::CompareFunction::Always, wgpu::StencilOperation::Zero),
    };
    let face = wgpu::StencilFaceState {
        compare,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    };
    let writes = pass_op != wgpu::StencilOperation::Keep;
    wgpu::StencilState {
        front: face,
        back: face,
        read_mask: 0xff,
        write_mask: if writes { 0xff } else { 0 },
    }
}

pub(crate) fn depth_stencil(
    key: PipelineKey,
    format: Option<wgpu::TextureFormat>,
) -> Option<wgpu::DepthStencilState> {
    format.map(|format| wgpu::DepthStencilState {
        format,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: stencil_state(key.stencil),
        bias: wgpu::DepthBiasState::default(),
    })
}

// ── vertex layout ────────────────────────────────────────────────────────

pub(crate) fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
        AttributeFormat::Unorm16x4 => wgpu::VertexFormat::Unorm16x4,
        AttributeFormat::Float32 => wgpu::VertexFormat::Float32,
    }
}

pub(crate) fn vertex_attributes(layout: &VertexLayout) -> Vec<wgpu::VertexAttribute> {
    layout
        .attributes()
        .iter()
        .map(|a| wgpu::VertexAttribute {
            format: vertex_format(a.format),
            offset: a.offset as u64,
            shader_location: a.location,
        })
        .collect()
}

/// Everything needed to build one pipeline variant.
pub(crate) struct PipelineDesc<'a> {
    pub key: PipelineKey,
    pub layout: &'a wgpu::PipelineLayout,
    pub vertex_layout: &'a VertexLayout,
    pub vertex_module: &'a wgpu::ShaderModule,
    pub fragment_module: &'a wgpu::ShaderModule,
    pub color_format: wgpu::TextureFormat,
    pub stencil_format: Option<wgpu::TextureFormat>,
}

pub(crate) fn create_pipeline(device: &wgpu::Device, desc: &PipelineDesc<'_>) -> wgpu::RenderPipeline {
    let attributes = vertex_attributes(desc.vertex_layout);
    let label = format!("gilded {} pipeline", desc.key.shader.name());

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label.as_str()),
        layout: Some(desc.layout),
        vertex: wgpu::VertexState {
            module: desc.vertex_module,
            entry_point: Some(ShaderStage::Vertex.entry_point()),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: desc.vertex_layout.stride() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.fragment_module,
            entry_point: Some(ShaderStage::Fragment.entry_point()),
            compilation_options: Default::default(),
            targets: &[Some(color_target(desc.key, desc.color_format))],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth_stencil(desc.key, desc.stencil_format),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stencil_is_dropped_without_attachment() {
        let state = RenderState {
            stencil: StencilMode::EqualIncr,
            ..RenderState::default()
        };
        assert_eq!(
            PipelineKey::new(ShaderId::Mask, state, false).stencil,
            StencilMode::Disabled
        );
        assert_eq!(
            PipelineKey::new(ShaderId::Mask, state, true).stencil,
            StencilMode::EqualIncr
        );
    }

    #[test]
    fn wireframe_does_not_split_pipelines() {
        let wire = RenderState {
            wireframe: true,
            ..RenderState::default()
        };
        assert_eq!(
            PipelineKey::new(ShaderId::PathSolid, wire, true),
            PipelineKey::base(ShaderId::PathSolid)
        );
    }

    #[test]
    fn stencil_writes_only_when_modifying() {
        assert_eq!(stencil_state(StencilMode::EqualKeep).write_mask, 0);
        assert_eq!(stencil_state(StencilMode::EqualIncr).write_mask, 0xff);
        let clear = stencil_state(StencilMode::Clear);
        assert_eq!(clear.front.compare, wgpu::CompareFunction::Always);
        assert_eq!(clear.front.pass_op, wgpu::StencilOperation::Zero);
    }

    #[test]
    fn color_target_follows_render_state() {
        let format = wgpu::TextureFormat::Bgra8Unorm;
        let masked = PipelineKey::new(
            ShaderId::Mask,
            RenderState {
                color_enable: false,
                blend: BlendMode::Src,
                ..RenderState::default()
            },
            true,
        );
        let target = color_target(masked, format);
        assert_eq!(target.write_mask, wgpu::ColorWrites::empty());
        assert!(target.blend.is_none());

        let target = color_target(PipelineKey::base(ShaderId::PathSolid), format);
        assert_eq!(target.blend, Some(premul_alpha_blend()));
    }

    #[test]
    fn attributes_keep_fixed_locations() {
        let attributes = vertex_attributes(&ShaderId::ImageShadow35HLinear.vertex_layout());
        let locations: Vec<u32> = attributes.iter().map(|a| a.shader_location).collect();
        assert_eq!(locations, vec![0, 2, 3, 4]);
        assert_eq!(attributes[3].format, wgpu::VertexFormat::Unorm16x4);
        assert_eq!(attributes[3].offset, 24);
    }
}
