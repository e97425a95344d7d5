//! 基于 truvis-gfx 的后端实现

use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use truvis_gfx::{
    commands::{
        barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer, immediate::GfxImmediateSubmit,
        semaphore::GfxTimelineSemaphore,
    },
    foundation::device::GfxDevice,
    resources::{
        image::{GfxImage, GfxImageCreateInfo},
        image_view::{GfxImageView, GfxImageViewDesc},
        stage_ring::GfxStageRing,
    },
    sampler::GfxSampler,
};

use crate::{
    backend::{
        CommandRecorder, CompletionSerialSource, GpuImage, GpuImageDesc, GpuImageKind, GpuSampler, StagingAllocator,
        StagingSlice, TextureDevice,
    },
    manager::BindlessWrite,
    sampler_key::SamplerKey,
};

/// image 与它的 view，view 先于 image 销毁
pub struct GfxTextureImage {
    sampled_view: GfxImageView,
    /// render target 每个 layer 一个
    attachment_views: Vec<GfxImageView>,
    image: GfxImage,
}

impl GfxTextureImage {
    #[inline]
    pub fn image(&self) -> &GfxImage {
        &self.image
    }
}

impl GpuImage for GfxTextureImage {
    #[inline]
    fn vk_image(&self) -> vk::Image {
        self.image.handle()
    }

    #[inline]
    fn sampled_view(&self) -> vk::ImageView {
        self.sampled_view.handle()
    }

    fn attachment_view(&self, face: u32) -> Option<vk::ImageView> {
        self.attachment_views.get(face as usize).map(GfxImageView::handle)
    }
}

impl GpuSampler for GfxSampler {
    #[inline]
    fn vk_sampler(&self) -> vk::Sampler {
        self.handle()
    }
}

/// 使用 VMA 分配 image 的 [`TextureDevice`]
///
/// 默认纹理通过 immediate submit 同步上传，只在 manager 创建时使用
pub struct GfxTextureDevice {
    immediate: GfxImmediateSubmit,
    device: Rc<GfxDevice>,
}

// new & init
impl GfxTextureDevice {
    pub fn new(device: Rc<GfxDevice>, queue_family_index: u32, queue: vk::Queue) -> anyhow::Result<Self> {
        let immediate = GfxImmediateSubmit::new(device.clone(), queue_family_index, queue)?;
        Ok(Self { immediate, device })
    }
}

// tools
impl GfxTextureDevice {
    fn sampled_view_type(desc: &GpuImageDesc) -> vk::ImageViewType {
        match desc.kind {
            GpuImageKind::RenderTarget { cubemap: true } => vk::ImageViewType::CUBE,
            _ if desc.array_layers > 1 => vk::ImageViewType::TYPE_2D_ARRAY,
            _ => vk::ImageViewType::TYPE_2D,
        }
    }

    fn upload_solid(&self, image: vk::Image, rgba: [u8; 4], name: &str) -> anyhow::Result<()> {
        let mut stage = GfxStageRing::new(self.device.clone(), 4, format!("{name}-stage"))?;
        let (offset, bytes) = stage.allocate(4, 4).ok_or_else(|| anyhow::anyhow!("stage buffer for {name} is too small"))?;
        bytes.copy_from_slice(&rgba);
        stage.flush()?;

        let region = vk::BufferImageCopy {
            buffer_offset: offset,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_extent: vk::Extent3D {
                width: 1,
                height: 1,
                depth: 1,
            },
            ..Default::default()
        };
        self.immediate.exec(
            |cmd| {
                cmd.image_memory_barrier(
                    vk::DependencyFlags::empty(),
                    &[GfxImageBarrier::undefined_to_transfer_dst(image, 1, 1)],
                );
                cmd.cmd_copy_buffer_to_image(stage.handle(), image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);
                cmd.image_memory_barrier(
                    vk::DependencyFlags::empty(),
                    &[GfxImageBarrier::transfer_dst_to_shader_read(image, 1, 1)],
                );
            },
            name,
        )
    }
}

impl TextureDevice for GfxTextureDevice {
    type Image = GfxTextureImage;
    type Sampler = GfxSampler;

    fn create_image(&mut self, desc: &GpuImageDesc) -> Result<GfxTextureImage, vk::Result> {
        let render_target = matches!(desc.kind, GpuImageKind::RenderTarget { .. });
        let usage = if render_target {
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::COLOR_ATTACHMENT
        } else {
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST
        };

        let mut image_info = GfxImageCreateInfo::new_image_2d_info(desc.extent, desc.format, usage)
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers);
        if let GpuImageKind::RenderTarget { cubemap: true } = desc.kind {
            image_info = image_info.cube_compatible();
        }
        let image = GfxImage::new_device_local(self.device.clone(), &image_info, &desc.name)?;

        let sampled_view = GfxImageView::new(
            self.device.clone(),
            image.handle(),
            GfxImageViewDesc::new(
                desc.format,
                Self::sampled_view_type(desc),
                vk::ImageAspectFlags::COLOR,
                (0, desc.mip_levels),
                (0, desc.array_layers),
            ),
        )?;

        let attachment_views = if render_target {
            (0..desc.array_layers)
                .map(|face| {
                    GfxImageView::new(
                        self.device.clone(),
                        image.handle(),
                        GfxImageViewDesc::new(
                            desc.format,
                            vk::ImageViewType::TYPE_2D,
                            vk::ImageAspectFlags::COLOR,
                            (0, 1),
                            (face, 1),
                        ),
                    )
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        Ok(GfxTextureImage {
            sampled_view,
            attachment_views,
            image,
        })
    }

    fn create_solid_image(&mut self, rgba: [u8; 4], name: &str) -> Result<GfxTextureImage, vk::Result> {
        let format = vk::Format::R8G8B8A8_UNORM;
        let image_info = GfxImageCreateInfo::new_image_2d_info(
            vk::Extent2D { width: 1, height: 1 },
            format,
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
        );
        let image = GfxImage::new_device_local(self.device.clone(), &image_info, name)?;
        let sampled_view = GfxImageView::new(
            self.device.clone(),
            image.handle(),
            GfxImageViewDesc::new_2d(format, vk::ImageAspectFlags::COLOR),
        )?;

        self.upload_solid(image.handle(), rgba, name).map_err(|e| {
            log::error!("Failed to upload builtin texture {}: {:?}", name, e);
            vk::Result::ERROR_INITIALIZATION_FAILED
        })?;

        Ok(GfxTextureImage {
            sampled_view,
            attachment_views: Vec::new(),
            image,
        })
    }

    fn create_sampler(&mut self, key: SamplerKey) -> Result<GfxSampler, vk::Result> {
        GfxSampler::new(self.device.clone(), &key.to_gfx_desc())
    }
}

impl StagingAllocator for GfxStageRing {
    #[inline]
    fn capacity(&self) -> u64 {
        GfxStageRing::capacity(self)
    }

    #[inline]
    fn remaining(&self) -> u64 {
        GfxStageRing::remaining(self)
    }

    fn try_allocate(&mut self, size: u64, align: u64) -> Option<StagingSlice<'_>> {
        let buffer = self.handle();
        let (offset, bytes) = self.allocate(size, align)?;
        Some(StagingSlice { buffer, offset, bytes })
    }

    #[inline]
    fn flush(&mut self) -> Result<(), vk::Result> {
        GfxStageRing::flush(self)
    }
}

impl CommandRecorder for GfxCommandBuffer {
    #[inline]
    fn image_barriers(&mut self, barriers: &[GfxImageBarrier]) {
        self.image_memory_barrier(vk::DependencyFlags::empty(), barriers);
    }

    #[inline]
    fn copy_buffer_to_image(&mut self, src: vk::Buffer, dst: vk::Image, regions: &[vk::BufferImageCopy]) {
        self.cmd_copy_buffer_to_image(src, dst, vk::ImageLayout::TRANSFER_DST_OPTIMAL, regions);
    }
}

impl CompletionSerialSource for GfxTimelineSemaphore {
    #[inline]
    fn completed_serial(&self) -> Result<u64, vk::Result> {
        self.completed_value()
    }
}

/// 将 [`crate::TextureResidencyManager::bindless_writes`] 的结果写入 bindless descriptor set
///
/// `set` 应当是当前帧的 descriptor set，binding 类型为 COMBINED_IMAGE_SAMPLER
pub fn write_bindless_descriptors(device: &GfxDevice, set: vk::DescriptorSet, binding: u32, writes: &[BindlessWrite]) {
    if writes.is_empty() {
        return;
    }

    let image_infos = writes.iter().map(|write| [write.info]).collect_vec();
    let descriptor_writes = writes
        .iter()
        .zip(&image_infos)
        .map(|(write, info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(binding)
                .dst_array_element(write.slot)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(info)
        })
        .collect_vec();
    device.write_descriptor_sets(&descriptor_writes);
}
