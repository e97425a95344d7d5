use ash::vk;
use truvis_gfx::commands::barrier::GfxImageBarrier;

use crate::{error::ResidencyError, pixel_format::full_mip_levels};

/// render target 固定使用的格式
pub const RENDER_TARGET_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct RenderTargetFlags: u32 {
        /// 6 个面，宽高取较大值
        const CUBEMAP = 1;
        /// 只创建 mip 0
        const NO_MIPMAPS = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTargetInfo {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub cubemap: bool,
}

impl RenderTargetInfo {
    /// 根据请求的尺寸和 flags 推导最终的形状
    pub fn from_request(width: u32, height: u32, flags: RenderTargetFlags) -> Result<Self, ResidencyError> {
        if width == 0 || height == 0 {
            return Err(ResidencyError::InvalidExtent { width, height });
        }

        let cubemap = flags.contains(RenderTargetFlags::CUBEMAP);
        let (width, height) = if cubemap {
            let side = width.max(height);
            (side, side)
        } else {
            (width, height)
        };
        let mip_levels = if flags.contains(RenderTargetFlags::NO_MIPMAPS) {
            1
        } else {
            full_mip_levels(width, height)
        };

        Ok(Self {
            extent: vk::Extent2D { width, height },
            format: RENDER_TARGET_FORMAT,
            mip_levels,
            array_layers: if cubemap { 6 } else { 1 },
            cubemap,
        })
    }
}

/// render target 当前的用途
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderTargetUsage {
    /// 作为 color attachment 被写入
    Attachment,
    /// 被 shader 采样
    Sampled,
}

impl RenderTargetUsage {
    #[inline]
    pub fn layout(self) -> vk::ImageLayout {
        match self {
            Self::Attachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            Self::Sampled => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    fn stage_access(layout: vk::ImageLayout) -> (vk::PipelineStageFlags2, vk::AccessFlags2) {
        match layout {
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE | vk::AccessFlags2::COLOR_ATTACHMENT_READ,
            ),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
                vk::PipelineStageFlags2::FRAGMENT_SHADER | vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_SAMPLED_READ,
            ),
            _ => (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty()),
        }
    }
}

/// 整个 render target 从 `old_layout` 转换到 `new_layout` 的 barrier
pub fn render_target_barrier(
    image: vk::Image,
    info: &RenderTargetInfo,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> GfxImageBarrier {
    let (src_stage, src_access) = RenderTargetUsage::stage_access(old_layout);
    let (dst_stage, dst_access) = RenderTargetUsage::stage_access(new_layout);
    GfxImageBarrier::new()
        .image(image)
        .whole_image(info.mip_levels, info.array_layers)
        .layout_transfer(old_layout, new_layout)
        .src_mask(src_stage, src_access)
        .dst_mask(dst_stage, dst_access)
}
