//! Packed render and sampler state bytes.
//!
//! Both arrive as single bytes in the batch record and are decoded here.
//!
//! Render state:  bit 0 color enable, bits 1..=2 blend mode, bits 3..=5 stencil
//!                mode, bit 6 wireframe.
//! Sampler state: bits 0..=2 wrap mode, bit 3 min/mag filter, bits 4..=5 mip filter.

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BlendMode {
    /// Replace destination.
    Src,
    /// Premultiplied source-over.
    #[default]
    SrcOver,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum StencilMode {
    #[default]
    Disabled,
    /// Pass where stencil equals the reference; keep.
    EqualKeep,
    /// Pass where stencil equals the reference; increment (saturating).
    EqualIncr,
    /// Pass where stencil equals the reference; decrement (saturating).
    EqualDecr,
    /// Always pass; write zero.
    Clear,
}

/// Decoded render state of a batch.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RenderState {
    pub color_enable: bool,
    pub blend: BlendMode,
    pub stencil: StencilMode,
    pub wireframe: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            color_enable: true,
            blend: BlendMode::SrcOver,
            stencil: StencilMode::Disabled,
            wireframe: false,
        }
    }
}

impl RenderState {
    pub fn from_bits(bits: u8) -> Self {
        let blend = match (bits >> 1) & 0b11 {
            0 => BlendMode::Src,
            _ => BlendMode::SrcOver,
        };
        let stencil = match (bits >> 3) & 0b111 {
            1 => StencilMode::EqualKeep,
            2 => StencilMode::EqualIncr,
            3 => StencilMode::EqualDecr,
            4 => StencilMode::Clear,
            _ => StencilMode::Disabled,
        };
        Self {
            color_enable: bits & 1 != 0,
            blend,
            stencil,
            wireframe: bits & (1 << 6) != 0,
        }
    }

    pub fn to_bits(self) -> u8 {
        let blend = match self.blend {
            BlendMode::Src => 0,
            BlendMode::SrcOver => 1,
        };
        let stencil = match self.stencil {
            StencilMode::Disabled => 0,
            StencilMode::EqualKeep => 1,
            StencilMode::EqualIncr => 2,
            StencilMode::EqualDecr => 3,
            StencilMode::Clear => 4,
        };
        u8::from(self.color_enable) | (blend << 1) | (stencil << 3) | (u8::from(self.wireframe) << 6)
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    /// Clamp to transparent black outside [0, 1].
    ClampToZero,
    Repeat,
    MirrorU,
    MirrorV,
    Mirror,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum MinMagFilter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum MipFilter {
    #[default]
    Disabled,
    Nearest,
    Linear,
}

/// Decoded sampler state of a texture slot.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct SamplerState {
    pub wrap: WrapMode,
    pub filter: MinMagFilter,
    pub mip: MipFilter,
}

impl SamplerState {
    pub fn from_bits(bits: u8) -> Self {
        let wrap = match bits & 0b111 {
            1 => WrapMode::ClampToZero,
            2 => WrapMode::Repeat,
            3 => WrapMode::MirrorU,
            4 => WrapMode::MirrorV,
            5 => WrapMode::Mirror,
            _ => WrapMode::ClampToEdge,
        };
        let filter = if bits & (1 << 3) != 0 {
            MinMagFilter::Linear
        } else {
            MinMagFilter::Nearest
        };
        let mip = match (bits >> 4) & 0b11 {
            1 => MipFilter::Nearest,
            2 => MipFilter::Linear,
            _ => MipFilter::Disabled,
        };
        Self { wrap, filter, mip }
    }

    pub fn to_bits(self) -> u8 {
        let wrap = match self.wrap {
            WrapMode::ClampToEdge => 0,
            WrapMode::ClampToZero => 1,
            WrapMode::Repeat => 2,
            WrapMode::MirrorU => 3,
            WrapMode::MirrorV => 4,
            WrapMode::Mirror => 5,
        };
        let filter = match self.filter {
            MinMagFilter::Nearest => 0,
            MinMagFilter::Linear => 1,
        };
        let mip = match self.mip {
            MipFilter::Disabled => 0,
            MipFilter::Nearest => 1,
            MipFilter::Linear => 2,
        };
        wrap | (filter << 3) | (mip << 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_render_state_is_color_src_over() {
        let state = RenderState::from_bits(0b0000_0011);
        assert_eq!(state, RenderState::default());
        assert_eq!(RenderState::default().to_bits(), 0b0000_0011);
    }

    #[test]
    fn render_state_fields() {
        let state = RenderState::from_bits((2 << 3) | (1 << 6));
        assert!(!state.color_enable);
        assert_eq!(state.blend, BlendMode::Src);
        assert_eq!(state.stencil, StencilMode::EqualIncr);
        assert!(state.wireframe);
    }

    #[test]
    fn unknown_stencil_modes_fall_back_to_disabled() {
        assert_eq!(RenderState::from_bits(7 << 3).stencil, StencilMode::Disabled);
    }

    #[test]
    fn sampler_state_fields() {
        let sampler = SamplerState::from_bits(2 | (1 << 3) | (2 << 4));
        assert_eq!(sampler.wrap, WrapMode::Repeat);
        assert_eq!(sampler.filter, MinMagFilter::Linear);
        assert_eq!(sampler.mip, MipFilter::Linear);
        assert_eq!(sampler.to_bits(), 2 | (1 << 3) | (2 << 4));
    }

    #[test]
    fn zero_sampler_is_nearest_clamp() {
        let sampler = SamplerState::from_bits(0);
        assert_eq!(sampler.wrap, WrapMode::ClampToEdge);
        assert_eq!(sampler.filter, MinMagFilter::Nearest);
        assert_eq!(sampler.mip, MipFilter::Disabled);
        assert_eq!(sampler, SamplerState::default());
        assert_eq!(SamplerState::default().to_bits(), 0);
    }
}
