//! residency 子系统依赖的外部服务
//!
//! 核心逻辑只通过这些 trait 访问 GPU 和像素数据；Vulkan 实现见 [`crate::vulkan`]。

use ash::vk;
use truvis_gfx::commands::barrier::GfxImageBarrier;

use crate::{
    error::SourceError, pixel_format::PixelFrameInfo, sampler_key::SamplerKey, texture_id::TextureId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuImageKind {
    /// 只用于采样，`array_layers > 1` 时是 2D array
    Sampled,
    /// 可以作为 color attachment，每个 layer 有独立的 attachment view
    RenderTarget { cubemap: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GpuImageDesc {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub kind: GpuImageKind,
    pub name: String,
}

/// GPU image 以及它的 view；drop 即销毁
pub trait GpuImage {
    fn vk_image(&self) -> vk::Image;

    /// 覆盖全部 mip 和 layer 的采样 view
    fn sampled_view(&self) -> vk::ImageView;

    /// render target 第 `face` 个 layer 的 attachment view
    fn attachment_view(&self, face: u32) -> Option<vk::ImageView>;
}

pub trait GpuSampler {
    fn vk_sampler(&self) -> vk::Sampler;
}

pub trait TextureDevice {
    type Image: GpuImage;
    type Sampler: GpuSampler;

    /// 创建未初始化内容的 image，layout 为 UNDEFINED
    fn create_image(&mut self, desc: &GpuImageDesc) -> Result<Self::Image, vk::Result>;

    /// 1x1 的纯色纹理，返回时已经处于 SHADER_READ_ONLY_OPTIMAL
    fn create_solid_image(&mut self, rgba: [u8; 4], name: &str) -> Result<Self::Image, vk::Result>;

    fn create_sampler(&mut self, key: SamplerKey) -> Result<Self::Sampler, vk::Result>;
}

/// staging 分配结果
pub struct StagingSlice<'a> {
    pub buffer: vk::Buffer,
    /// 在 buffer 中的 offset
    pub offset: u64,
    pub bytes: &'a mut [u8],
}

/// 帧内线性分配的 host visible 内存，容量固定
pub trait StagingAllocator {
    fn capacity(&self) -> u64;

    fn remaining(&self) -> u64;

    /// 空间不足时返回 None
    fn try_allocate(&mut self, size: u64, align: u64) -> Option<StagingSlice<'_>>;

    /// 本帧的写入对 GPU 可见，upload phase 结束时调用
    fn flush(&mut self) -> Result<(), vk::Result>;
}

pub trait CommandRecorder {
    fn image_barriers(&mut self, barriers: &[GfxImageBarrier]);

    /// dst image 必须处于 TRANSFER_DST_OPTIMAL
    fn copy_buffer_to_image(&mut self, src: vk::Buffer, dst: vk::Image, regions: &[vk::BufferImageCopy]);
}

pub trait CompletionSerialSource {
    /// GPU 已经执行完成的最大 submit serial
    fn completed_serial(&self) -> Result<u64, vk::Result>;
}

/// 像素数据的提供者，按纹理 id 访问
///
/// 任何方法返回 [`SourceError`] 都表示暂时不可用：本轮丢弃该纹理，之后可以重新请求。
pub trait PixelSource {
    /// 纹理的帧数，大于 1 时作为 2D array 上传
    fn layer_count(&mut self, id: TextureId) -> Result<u32, SourceError>;

    fn frame_info(&mut self, id: TextureId, layer: u32) -> Result<PixelFrameInfo, SourceError>;

    /// 锁定一帧并返回其字节；之后一定会调用对应的 [`PixelSource::unlock`]
    fn lock(&mut self, id: TextureId, layer: u32) -> Result<&[u8], SourceError>;

    fn unlock(&mut self, _id: TextureId, _layer: u32) {}
}
