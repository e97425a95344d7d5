use ash::vk;

/// 便捷创建 image memory barrier 的结构体
///
/// 默认作用于 color aspect 的第 0 层 mip 和第 0 个 layer
#[derive(Clone, Copy, Debug)]
pub struct GfxImageBarrier {
    inner: vk::ImageMemoryBarrier2<'static>,
}

impl Default for GfxImageBarrier {
    fn default() -> Self {
        Self {
            inner: vk::ImageMemoryBarrier2 {
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::UNDEFINED,
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_array_layer: 0,
                    layer_count: 1,
                    base_mip_level: 0,
                    level_count: 1,
                },
                ..Default::default()
            },
        }
    }
}

impl GfxImageBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inner(&self) -> &vk::ImageMemoryBarrier2<'static> {
        &self.inner
    }

    #[inline]
    pub fn vk_image(&self) -> vk::Image {
        self.inner.image
    }

    #[inline]
    pub fn old_layout(&self) -> vk::ImageLayout {
        self.inner.old_layout
    }

    #[inline]
    pub fn new_layout(&self) -> vk::ImageLayout {
        self.inner.new_layout
    }

    #[inline]
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        self.inner.subresource_range
    }

    /// builder
    #[inline]
    pub fn layout_transfer(mut self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.inner.old_layout = old_layout;
        self.inner.new_layout = new_layout;
        self
    }

    /// builder
    #[inline]
    pub fn src_mask(mut self, src_stage_mask: vk::PipelineStageFlags2, src_access_mask: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = src_stage_mask;
        self.inner.src_access_mask = src_access_mask;
        self
    }

    /// builder
    #[inline]
    pub fn dst_mask(mut self, dst_stage_mask: vk::PipelineStageFlags2, dst_access_mask: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = dst_stage_mask;
        self.inner.dst_access_mask = dst_access_mask;
        self
    }

    /// builder
    #[inline]
    pub fn image_aspect_flag(mut self, aspect_mask: vk::ImageAspectFlags) -> Self {
        self.inner.subresource_range.aspect_mask = aspect_mask;
        self
    }

    /// builder
    ///
    /// 覆盖全部 mip 和 layer
    #[inline]
    pub fn whole_image(mut self, mip_levels: u32, array_layers: u32) -> Self {
        self.inner.subresource_range.base_mip_level = 0;
        self.inner.subresource_range.level_count = mip_levels;
        self.inner.subresource_range.base_array_layer = 0;
        self.inner.subresource_range.layer_count = array_layers;
        self
    }

    /// builder
    #[inline]
    pub fn image(mut self, image: vk::Image) -> Self {
        self.inner.image = image;
        self
    }
}

/// 常用的 barrier 模板
impl GfxImageBarrier {
    /// 任意内容 -> transfer dst，旧内容会被丢弃
    pub fn undefined_to_transfer_dst(image: vk::Image, mip_levels: u32, array_layers: u32) -> Self {
        Self::new()
            .image(image)
            .whole_image(mip_levels, array_layers)
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
    }

    /// 上一次采样结束 -> transfer dst，用于原地更新
    pub fn shader_read_to_transfer_dst(image: vk::Image, mip_levels: u32, array_layers: u32) -> Self {
        Self::new()
            .image(image)
            .whole_image(mip_levels, array_layers)
            .layout_transfer(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_SAMPLED_READ)
            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
    }

    /// transfer dst -> 片元/计算着色器可读
    pub fn transfer_dst_to_shader_read(image: vk::Image, mip_levels: u32, array_layers: u32) -> Self {
        Self::new()
            .image(image)
            .whole_image(mip_levels, array_layers)
            .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .dst_mask(
                vk::PipelineStageFlags2::FRAGMENT_SHADER | vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_SAMPLED_READ,
            )
    }
}
