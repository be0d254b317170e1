//! Texture formats and pooled texture descriptors.

/// Backend-neutral texture formats used by pooled denoiser textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Format {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    R16Uint,
    R16Sfloat,
    Rg16Sfloat,
    Rgba16Sfloat,
    R32Sfloat,
    Rgba32Sfloat,
    R10G10B10A2Unorm,
    R11G11B10Ufloat,
}

impl Format {
    /// Size of one texel in bytes.
    #[inline]
    #[must_use]
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::Rg8Unorm | Self::R16Uint | Self::R16Sfloat => 2,
            Self::Rgba8Unorm
            | Self::Rg16Sfloat
            | Self::R32Sfloat
            | Self::R10G10B10A2Unorm
            | Self::R11G11B10Ufloat => 4,
            Self::Rgba16Sfloat => 8,
            Self::Rgba32Sfloat => 16,
        }
    }
}

/// Description of one pooled texture.
///
/// Dimensions are stored as 16-bit values, which bounds every denoiser
/// resolution to `65535 × 65535`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub format: Format,
    pub width: u16,
    pub height: u16,
    pub mip_num: u16,
}

impl TextureDesc {
    #[must_use]
    pub const fn new(format: Format, width: u16, height: u16, mip_num: u16) -> Self {
        Self {
            format,
            width,
            height,
            mip_num,
        }
    }

    /// Approximate memory footprint including the full mip chain.
    ///
    /// Levels past the 1×1 tail count as 1×1.
    #[must_use]
    pub fn size_in_bytes(&self) -> u64 {
        let texel = u64::from(self.format.bytes_per_texel());
        let level = |size: u16, mip: u16| u64::from(size.checked_shr(u32::from(mip)).unwrap_or(0).max(1));
        (0..self.mip_num)
            .map(|mip| level(self.width, mip) * level(self.height, mip) * texel)
            .sum()
    }
}

/// Largest mip chain that fits `width × height`, clamped to `max_mips`.
#[must_use]
pub fn clamp_mip_num(width: u16, height: u16, max_mips: u16) -> u16 {
    let largest = width.max(height).max(1);
    let full_chain = (u16::BITS - largest.leading_zeros()) as u16;
    full_chain.min(max_mips).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_is_clamped_by_resolution() {
        assert_eq!(clamp_mip_num(1920, 1080, 5), 5);
        assert_eq!(clamp_mip_num(8, 4, 5), 4);
        assert_eq!(clamp_mip_num(1, 1, 5), 1);
    }

    #[test]
    fn size_accounts_for_mips() {
        let desc = TextureDesc::new(Format::Rgba8Unorm, 4, 4, 3);
        assert_eq!(desc.size_in_bytes(), (16 + 4 + 1) * 4);
    }

    #[test]
    fn oversized_mip_chain_counts_tail_levels() {
        let desc = TextureDesc::new(Format::R8Unorm, 4, 4, 17);
        assert_eq!(desc.size_in_bytes(), 16 + 4 + 15);
    }
}
