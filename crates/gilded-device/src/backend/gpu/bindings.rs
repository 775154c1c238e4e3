use std::num::NonZeroU64;

use crate::backend::ConstantBuffer;
use crate::batch::{MinMagFilter, MipFilter, SamplerState, TextureSlot, WrapMode};

/// Texture id and sampler bits of every slot; identifies one group 1 bind group.
pub(crate) type TextureSetKey = [Option<(u64, u8)>; TextureSlot::COUNT];

pub(crate) fn constants_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = ConstantBuffer::ALL
        .iter()
        .map(|buffer| wgpu::BindGroupLayoutEntry {
            binding: buffer.index() as u32,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(buffer.size() as u64),
            },
            count: None,
        })
        .collect();

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("gilded constants layout"),
        entries: &entries,
    })
}

pub(crate) fn constants_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    arena: &wgpu::Buffer,
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry<'_>> = ConstantBuffer::ALL
        .iter()
        .map(|buffer| wgpu::BindGroupEntry {
            binding: buffer.index() as u32,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: arena,
                offset: 0,
                size: NonZeroU64::new(buffer.size() as u64),
            }),
        })
        .collect();

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("gilded constants"),
        layout,
        entries: &entries,
    })
}

/// Texture binding of `slot`; its sampler sits at the next binding.
#[inline]
pub(crate) const fn texture_binding(slot: TextureSlot) -> u32 {
    slot.index() as u32 * 2
}

pub(crate) fn textures_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = Vec::with_capacity(TextureSlot::COUNT * 2);
    for slot in TextureSlot::ALL {
        let binding = texture_binding(slot);
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: binding + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("gilded textures layout"),
        entries: &entries,
    })
}

pub(crate) fn textures_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    slots: [(&wgpu::TextureView, &wgpu::Sampler); TextureSlot::COUNT],
) -> wgpu::BindGroup {
    let mut entries = Vec::with_capacity(TextureSlot::COUNT * 2);
    for (slot, (view, sampler)) in TextureSlot::ALL.into_iter().zip(slots) {
        let binding = texture_binding(slot);
        entries.push(wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: binding + 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("gilded textures"),
        layout,
        entries: &entries,
    })
}

fn address_modes(wrap: WrapMode, border: bool) -> (wgpu::AddressMode, wgpu::AddressMode) {
    use wgpu::AddressMode::*;
    match wrap {
        WrapMode::ClampToEdge => (ClampToEdge, ClampToEdge),
        WrapMode::ClampToZero if border => (ClampToBorder, ClampToBorder),
        WrapMode::ClampToZero => (ClampToEdge, ClampToEdge),
        WrapMode::Repeat => (Repeat, Repeat),
        WrapMode::MirrorU => (MirrorRepeat, Repeat),
        WrapMode::MirrorV => (Repeat, MirrorRepeat),
        WrapMode::Mirror => (MirrorRepeat, MirrorRepeat),
    }
}

/// Sampler for `state`. `border` is whether `ADDRESS_MODE_CLAMP_TO_BORDER`
/// is enabled; without it clamp-to-zero degrades to clamp-to-edge.
pub(crate) fn sampler_descriptor(state: SamplerState, border: bool) -> wgpu::SamplerDescriptor<'static> {
    let (u, v) = address_modes(state.wrap, border);
    let filter = match state.filter {
        MinMagFilter::Nearest => wgpu::FilterMode::Nearest,
        MinMagFilter::Linear => wgpu::FilterMode::Linear,
    };
    let (mipmap_filter, lod_max_clamp) = match state.mip {
        MipFilter::Disabled => (wgpu::MipmapFilterMode::Nearest, 0.0),
        MipFilter::Nearest => (wgpu::MipmapFilterMode::Nearest, 32.0),
        MipFilter::Linear => (wgpu::MipmapFilterMode::Linear, 32.0),
    };
    let clamps_to_border = u == wgpu::AddressMode::ClampToBorder;

    wgpu::SamplerDescriptor {
        label: Some("gilded sampler"),
        address_mode_u: u,
        address_mode_v: v,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter,
        lod_min_clamp: 0.0,
        lod_max_clamp,
        border_color: clamps_to_border.then_some(wgpu::SamplerBorderColor::TransparentBlack),
        ..Default::default()
    }
}
