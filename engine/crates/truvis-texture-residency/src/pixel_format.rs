//! 源像素格式到 Vulkan 格式的映射，以及 staging 中的数据布局
//!
//! - 块压缩数据（BC1/2/3/7）按原样拷贝
//! - 8bpp 与单通道 AA bitmap 使用 `R8_UNORM`
//! - 其余非压缩数据统一展开为 `B8G8R8A8_UNORM`：24bpp 补 alpha，16bpp 按 5-6-5 展开

use ash::vk;

use crate::error::RejectReason;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockCompression {
    Bc1,
    /// DXT3
    Bc2,
    /// DXT5
    Bc3,
    Bc7,
}

/// 一帧源像素数据的格式描述
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelFrameInfo {
    pub width: u32,
    pub height: u32,
    /// 源数据的 bits per pixel，块压缩数据忽略该值
    pub bpp: u8,
    pub compression: Option<BlockCompression>,
    /// 单通道 AA bitmap，每个像素 1 字节
    pub single_channel: bool,
}

impl PixelFrameInfo {
    pub fn uncompressed(width: u32, height: u32, bpp: u8) -> Self {
        Self {
            width,
            height,
            bpp,
            compression: None,
            single_channel: false,
        }
    }

    pub fn compressed(width: u32, height: u32, compression: BlockCompression) -> Self {
        Self {
            width,
            height,
            bpp: 32,
            compression: Some(compression),
            single_channel: false,
        }
    }

    pub fn alpha_bitmap(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bpp: 8,
            compression: None,
            single_channel: true,
        }
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// 源数据一层所需的字节数；不支持的 bpp 返回 None
    pub fn source_size(&self) -> Option<u64> {
        let pixels = self.width as u64 * self.height as u64;
        match (self.compression, self.single_channel, self.bpp) {
            (Some(_), _, _) => Some(compressed_size(self.width, self.height, select_format(self))),
            (None, true, _) | (None, false, 8) => Some(pixels),
            (None, false, 16) => Some(pixels * 2),
            (None, false, 24) => Some(pixels * 3),
            (None, false, 32) => Some(pixels * 4),
            _ => None,
        }
    }
}

pub fn select_format(info: &PixelFrameInfo) -> vk::Format {
    match info.compression {
        Some(BlockCompression::Bc1) => vk::Format::BC1_RGBA_UNORM_BLOCK,
        Some(BlockCompression::Bc2) => vk::Format::BC2_UNORM_BLOCK,
        Some(BlockCompression::Bc3) => vk::Format::BC3_UNORM_BLOCK,
        Some(BlockCompression::Bc7) => vk::Format::BC7_UNORM_BLOCK,
        None if info.single_channel || info.bpp == 8 => vk::Format::R8_UNORM,
        None => vk::Format::B8G8R8A8_UNORM,
    }
}

#[inline]
pub fn is_block_compressed(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::BC1_RGBA_UNORM_BLOCK
            | vk::Format::BC2_UNORM_BLOCK
            | vk::Format::BC3_UNORM_BLOCK
            | vk::Format::BC7_UNORM_BLOCK
    )
}

/// 块压缩格式的字节数：每 4x4 像素一块，BC1 每块 8 字节，其余 16 字节
#[inline]
pub fn compressed_size(width: u32, height: u32, format: vk::Format) -> u64 {
    let block_bytes = if format == vk::Format::BC1_RGBA_UNORM_BLOCK { 8 } else { 16 };
    width.div_ceil(4) as u64 * height.div_ceil(4) as u64 * block_bytes
}

/// GPU 端一层 mip 0 的字节数
#[inline]
pub fn layer_size(width: u32, height: u32, format: vk::Format) -> u64 {
    if is_block_compressed(format) {
        compressed_size(width, height, format)
    } else if format == vk::Format::R8_UNORM {
        width as u64 * height as u64
    } else {
        width as u64 * height as u64 * 4
    }
}

/// 完整 mip 链的层数：`floor(log2(max(w, h))) + 1`
#[inline]
pub fn full_mip_levels(width: u32, height: u32) -> u32 {
    let max_dim = width.max(height);
    if max_dim == 0 { 1 } else { u32::BITS - max_dim.leading_zeros() }
}

/// 多层数据在 staging buffer 中的布局，每层的起始 offset 和总大小都按 alignment 对齐
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadLayout {
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    pub layer_size: u64,
    pub layer_offsets: Vec<u64>,
    pub total_size: u64,
}

impl UploadLayout {
    pub fn new(width: u32, height: u32, format: vk::Format, layers: u32, alignment: u64) -> Self {
        let layer_size = layer_size(width, height, format);
        let mut layer_offsets = Vec::with_capacity(layers as usize);
        let mut cursor = 0u64;
        for _ in 0..layers {
            cursor = cursor.next_multiple_of(alignment);
            layer_offsets.push(cursor);
            cursor += layer_size;
        }

        Self {
            width,
            height,
            format,
            layer_size,
            layer_offsets,
            total_size: cursor.next_multiple_of(alignment),
        }
    }

    #[inline]
    pub fn layers(&self) -> u32 {
        self.layer_offsets.len() as u32
    }

    /// 每层一个拷贝区域，`base_offset` 为 staging 分配的起始位置
    pub fn copy_regions(&self, base_offset: u64) -> Vec<vk::BufferImageCopy> {
        self.layer_offsets
            .iter()
            .enumerate()
            .map(|(layer, offset)| vk::BufferImageCopy {
                buffer_offset: base_offset + offset,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: layer as u32,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                image_extent: vk::Extent3D {
                    width: self.width,
                    height: self.height,
                    depth: 1,
                },
            })
            .collect()
    }
}

/// 将一层源数据转换为 GPU 格式写入 `dst`
///
/// `dst` 的长度必须是该层的 [`layer_size`]
pub fn write_layer(dst: &mut [u8], src: &[u8], info: &PixelFrameInfo, layer: u32) -> Result<(), RejectReason> {
    let expected = info.source_size().ok_or(RejectReason::UnsupportedBpp(info.bpp))?;
    if (src.len() as u64) < expected {
        return Err(RejectReason::TruncatedSource {
            layer,
            expected,
            actual: src.len() as u64,
        });
    }
    let src = &src[..expected as usize];

    match (info.compression, info.single_channel, info.bpp) {
        (None, false, 24) => {
            for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(3)) {
                d[..3].copy_from_slice(s);
                d[3] = 255;
            }
        }
        (None, false, 16) => {
            for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(2)) {
                let pixel = u16::from_le_bytes([s[0], s[1]]) as u32;
                d[0] = ((pixel & 0x1F) * 255 / 31) as u8;
                d[1] = (((pixel >> 5) & 0x3F) * 255 / 63) as u8;
                d[2] = (((pixel >> 11) & 0x1F) * 255 / 31) as u8;
                d[3] = 255;
            }
        }
        // 压缩、单通道、32bpp：格式一致，直接拷贝
        _ => dst[..src.len()].copy_from_slice(src),
    }
    Ok(())
}
