use std::collections::HashMap;

use ash::vk;

use crate::{
    backend::GpuImage, render_target::RenderTargetInfo, sampler_key::SamplerKey, texture_id::TextureId,
};

/// 最近一次被使用的帧和 submit serial
///
/// `last_used_serial <= completed serial` 时 GPU 已经不再引用该纹理，可以安全驱逐
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UsageTracking {
    pub last_used_frame: u64,
    pub last_used_serial: u64,
}

impl UsageTracking {
    pub fn new(frame: u64, serial: u64) -> Self {
        Self {
            last_used_frame: frame,
            last_used_serial: serial,
        }
    }

    /// 只会向前推进
    #[inline]
    pub fn touch(&mut self, frame: u64, serial: u64) {
        self.last_used_frame = self.last_used_frame.max(frame);
        self.last_used_serial = self.last_used_serial.max(serial);
    }
}

/// 可采样的驻留纹理
pub struct ResidentTexture<I> {
    pub(crate) image: I,
    /// 从 sampler cache 借用，不随纹理销毁
    pub(crate) sampler: vk::Sampler,
    pub(crate) sampler_key: SamplerKey,
    pub(crate) layout: vk::ImageLayout,
    pub(crate) extent: vk::Extent2D,
    pub(crate) format: vk::Format,
    pub(crate) mip_levels: u32,
    pub(crate) array_layers: u32,
    pub(crate) usage: UsageTracking,
}

impl<I: GpuImage> ResidentTexture<I> {
    #[inline]
    pub fn descriptor(&self, sampler: vk::Sampler) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler,
            image_view: self.image.sampled_view(),
            image_layout: self.layout,
        }
    }

    #[inline]
    pub fn bound_descriptor(&self) -> vk::DescriptorImageInfo {
        self.descriptor(self.sampler)
    }
}

impl<I> ResidentTexture<I> {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    #[inline]
    pub fn sampler_key(&self) -> SamplerKey {
        self.sampler_key
    }

    #[inline]
    pub fn usage(&self) -> UsageTracking {
        self.usage
    }
}

/// 驻留的 render target，image 与身份同时创建、同时销毁
pub struct ResidentRenderTarget<I> {
    pub(crate) image: I,
    pub(crate) extent: vk::Extent2D,
    pub(crate) format: vk::Format,
    pub(crate) mip_levels: u32,
    pub(crate) array_layers: u32,
    pub(crate) cubemap: bool,
    pub(crate) layout: vk::ImageLayout,
    pub(crate) usage: UsageTracking,
}

impl<I> ResidentRenderTarget<I> {
    #[inline]
    pub fn info(&self) -> RenderTargetInfo {
        RenderTargetInfo {
            extent: self.extent,
            format: self.format,
            mip_levels: self.mip_levels,
            array_layers: self.array_layers,
            cubemap: self.cubemap,
        }
    }

    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    #[inline]
    pub fn usage(&self) -> UsageTracking {
        self.usage
    }
}

/// 驻留纹理的存储：采样纹理与 render target 两个互斥的容器
///
/// 插入时会先把同一 id 在两个容器中的旧条目取出并返回其 image，
/// 因此同一 id 不可能同时出现在两个容器中。
pub struct ResidentStore<I> {
    sampled: HashMap<TextureId, ResidentTexture<I>>,
    render_targets: HashMap<TextureId, ResidentRenderTarget<I>>,
}

impl<I> Default for ResidentStore<I> {
    fn default() -> Self {
        Self {
            sampled: HashMap::new(),
            render_targets: HashMap::new(),
        }
    }
}

// insert & take
impl<I> ResidentStore<I> {
    /// 返回被替换的旧 image
    #[must_use]
    pub fn insert_sampled(&mut self, id: TextureId, texture: ResidentTexture<I>) -> Option<I> {
        let displaced = self.take(id);
        self.sampled.insert(id, texture);
        displaced
    }

    /// 返回被替换的旧 image
    #[must_use]
    pub fn insert_render_target(&mut self, id: TextureId, target: ResidentRenderTarget<I>) -> Option<I> {
        let displaced = self.take(id);
        self.render_targets.insert(id, target);
        displaced
    }

    /// 从任一容器中移除并返回 image 的所有权
    pub fn take(&mut self, id: TextureId) -> Option<I> {
        if let Some(texture) = self.sampled.remove(&id) {
            return Some(texture.image);
        }
        self.render_targets.remove(&id).map(|target| target.image)
    }

    /// 取出所有 image，用于 shutdown
    pub fn drain(&mut self) -> impl Iterator<Item = I> + '_ {
        self.sampled
            .drain()
            .map(|(_, texture)| texture.image)
            .chain(self.render_targets.drain().map(|(_, target)| target.image))
    }
}

// query
impl<I> ResidentStore<I> {
    #[inline]
    pub fn sampled(&self, id: TextureId) -> Option<&ResidentTexture<I>> {
        self.sampled.get(&id)
    }

    #[inline]
    pub fn sampled_mut(&mut self, id: TextureId) -> Option<&mut ResidentTexture<I>> {
        self.sampled.get_mut(&id)
    }

    #[inline]
    pub fn render_target(&self, id: TextureId) -> Option<&ResidentRenderTarget<I>> {
        self.render_targets.get(&id)
    }

    #[inline]
    pub fn render_target_mut(&mut self, id: TextureId) -> Option<&mut ResidentRenderTarget<I>> {
        self.render_targets.get_mut(&id)
    }

    #[inline]
    pub fn is_resident(&self, id: TextureId) -> bool {
        self.sampled.contains_key(&id) || self.render_targets.contains_key(&id)
    }

    #[inline]
    pub fn is_render_target(&self, id: TextureId) -> bool {
        self.render_targets.contains_key(&id)
    }

    pub fn usage(&self, id: TextureId) -> Option<UsageTracking> {
        self.sampled
            .get(&id)
            .map(|texture| texture.usage)
            .or_else(|| self.render_targets.get(&id).map(|target| target.usage))
    }

    /// 返回是否找到该纹理
    pub fn touch(&mut self, id: TextureId, frame: u64, serial: u64) -> bool {
        if let Some(texture) = self.sampled.get_mut(&id) {
            texture.usage.touch(frame, serial);
            return true;
        }
        if let Some(target) = self.render_targets.get_mut(&id) {
            target.usage.touch(frame, serial);
            return true;
        }
        false
    }

    pub fn sampled_ids(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.sampled.keys().copied()
    }

    #[inline]
    pub fn sampled_count(&self) -> usize {
        self.sampled.len()
    }

    #[inline]
    pub fn render_target_count(&self) -> usize {
        self.render_targets.len()
    }
}
