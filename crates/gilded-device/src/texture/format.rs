use crate::error::DeviceError;

/// Pixel formats the UI library requests.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, premultiplied alpha.
    Rgba8,
    /// 8-bit RGB with an unused alpha channel.
    Rgbx8,
    /// Single 8-bit channel (glyph atlases, masks).
    R8,
}

impl TextureFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8 | TextureFormat::Rgbx8 => 4,
            TextureFormat::R8 => 1,
        }
    }
}

impl TryFrom<u8> for TextureFormat {
    type Error = DeviceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TextureFormat::Rgba8),
            1 => Ok(TextureFormat::Rgbx8),
            2 => Ok(TextureFormat::R8),
            other => Err(DeviceError::UnknownTextureFormat(other)),
        }
    }
}

/// How a texture is going to be used by the backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureUsage {
    /// Sampled by batches; contents come from the CPU.
    Sampled,
    /// Color target of an offscreen pass, later sampled.
    RenderTarget { sample_count: u32 },
}

/// Immutable description of a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    /// True when the V coordinate starts at the bottom of the image.
    pub inverted: bool,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32, mip_levels: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            mip_levels: mip_levels.max(1),
            format,
            usage: TextureUsage::Sampled,
            inverted: false,
        }
    }

    #[inline]
    pub fn has_mipmaps(&self) -> bool {
        self.mip_levels > 1
    }

    /// Dimensions of `level`, clamped to one texel.
    pub fn level_size(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    /// Byte size of a tightly packed `level`.
    pub fn level_bytes(&self, level: u32) -> usize {
        let (w, h) = self.level_size(level);
        w as usize * h as usize * self.format.bytes_per_pixel() as usize
    }

    /// Length of the full mip chain, `floor(log2(max(width, height))) + 1`.
    pub fn max_mip_levels(&self) -> u32 {
        u32::BITS - self.width.max(self.height).max(1).leading_zeros()
    }

    /// Checks the dimensions against `max_dimension` and the level count
    /// against the full mip chain.
    pub fn validate_size(&self, max_dimension: u32) -> Result<(), DeviceError> {
        if self.width > max_dimension || self.height > max_dimension || self.mip_levels > self.max_mip_levels() {
            return Err(DeviceError::InvalidTextureSize {
                width: self.width,
                height: self.height,
                mip_levels: self.mip_levels,
                max_dimension,
            });
        }
        Ok(())
    }

    /// Checks initial data: one slice per mip level, each tightly packed.
    pub fn validate_levels(&self, levels: &[&[u8]]) -> Result<(), DeviceError> {
        for (level, data) in levels.iter().enumerate().take(self.mip_levels as usize) {
            let level = level as u32;
            let expected = self.level_bytes(level);
            if data.len() < expected {
                return Err(DeviceError::InvalidTextureData {
                    level,
                    expected,
                    actual: data.len(),
                });
            }
        }
        Ok(())
    }
}

/// Sub-rectangle of one mip level.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn byte_len(&self, format: TextureFormat) -> usize {
        self.width as usize * self.height as usize * format.bytes_per_pixel() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_sizes_clamp_to_one_texel() {
        let desc = TextureDesc::new(8, 2, 4, TextureFormat::Rgba8);
        assert_eq!(desc.level_size(0), (8, 2));
        assert_eq!(desc.level_size(2), (2, 1));
        assert_eq!(desc.level_size(3), (1, 1));
        assert_eq!(desc.level_bytes(1), 16);
    }

    #[test]
    fn zero_levels_means_one() {
        let desc = TextureDesc::new(4, 4, 0, TextureFormat::R8);
        assert_eq!(desc.mip_levels, 1);
        assert!(!desc.has_mipmaps());
    }

    #[test]
    fn short_level_data_is_rejected() {
        let desc = TextureDesc::new(2, 2, 2, TextureFormat::R8);
        let level0 = [0u8; 4];
        let level1 = [0u8; 0];
        let err = desc.validate_levels(&[&level0, &level1]).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::InvalidTextureData { level: 1, expected: 1, actual: 0 }
        ));
    }

    #[test]
    fn mip_chain_length() {
        assert_eq!(TextureDesc::new(1, 1, 1, TextureFormat::R8).max_mip_levels(), 1);
        assert_eq!(TextureDesc::new(256, 64, 1, TextureFormat::R8).max_mip_levels(), 9);
        assert_eq!(TextureDesc::new(5, 3, 1, TextureFormat::R8).max_mip_levels(), 3);
    }

    #[test]
    fn oversized_descriptions_are_rejected() {
        assert!(TextureDesc::new(256, 64, 9, TextureFormat::Rgba8).validate_size(256).is_ok());
        assert!(matches!(
            TextureDesc::new(256, 64, 10, TextureFormat::Rgba8).validate_size(256),
            Err(DeviceError::InvalidTextureSize { mip_levels: 10, .. })
        ));
        assert!(matches!(
            TextureDesc::new(512, 64, 1, TextureFormat::Rgba8).validate_size(256),
            Err(DeviceError::InvalidTextureSize { max_dimension: 256, .. })
        ));
    }

    #[test]
    fn format_ids() {
        assert_eq!(TextureFormat::try_from(2).unwrap(), TextureFormat::R8);
        assert!(TextureFormat::try_from(9).is_err());
    }
}
