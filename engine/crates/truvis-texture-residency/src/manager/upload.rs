use ash::vk;
use truvis_gfx::commands::barrier::GfxImageBarrier;

use crate::{
    backend::{GpuImage, GpuImageDesc, GpuImageKind, PixelSource, TextureDevice},
    error::{RejectReason, ResidencyError, SourceError},
    manager::{FlushReport, TextureResidencyManager},
    pixel_format::{PixelFrameInfo, UploadLayout, is_block_compressed, select_format, write_layer},
    resident::{ResidentTexture, UsageTracking},
    texture_id::TextureId,
    upload_phase::UploadPhase,
};

/// 单个纹理的上传结果
#[derive(Debug)]
enum UploadOutcome {
    Uploaded,
    /// 已驻留或已拒绝，无需处理
    Skipped,
    /// staging 剩余空间不足
    Deferred,
    Rejected(RejectReason),
    Dropped(SourceError),
}

impl From<RejectReason> for UploadOutcome {
    fn from(reason: RejectReason) -> Self {
        Self::Rejected(reason)
    }
}

impl From<SourceError> for UploadOutcome {
    fn from(e: SourceError) -> Self {
        Self::Dropped(e)
    }
}

/// 检查通过的源数据：第 0 帧决定整个数组的尺寸和格式
struct UploadPlan {
    frames: Vec<PixelFrameInfo>,
    layout: UploadLayout,
}

impl UploadPlan {
    fn new(pixels: &mut dyn PixelSource, id: TextureId, alignment: u64) -> Result<Self, UploadOutcome> {
        let layers = pixels.layer_count(id)?;
        if layers == 0 {
            return Err(RejectReason::EmptySource.into());
        }

        let first = pixels.frame_info(id, 0)?;
        if first.is_empty() {
            return Err(RejectReason::EmptySource.into());
        }
        if first.source_size().is_none() {
            return Err(RejectReason::UnsupportedBpp(first.bpp).into());
        }
        let format = select_format(&first);

        let mut frames = Vec::with_capacity(layers as usize);
        frames.push(first);
        for layer in 1..layers {
            let info = pixels.frame_info(id, layer)?;
            if info.extent() != first.extent() {
                return Err(RejectReason::ArrayShapeMismatch {
                    layer,
                    width: info.width,
                    height: info.height,
                    expected_width: first.width,
                    expected_height: first.height,
                }
                .into());
            }
            if info.compression != first.compression {
                return Err(RejectReason::MixedCompression { layer }.into());
            }
            if info.source_size().is_none() {
                return Err(RejectReason::UnsupportedBpp(info.bpp).into());
            }
            if select_format(&info) != format {
                return Err(RejectReason::MixedFormat { layer }.into());
            }
            frames.push(info);
        }

        Ok(Self {
            layout: UploadLayout::new(first.width, first.height, format, layers, alignment),
            frames,
        })
    }
}

// upload phase: 上传
impl<D: TextureDevice> TextureResidencyManager<D> {
    /// upload phase 的主流程：
    /// 1. 退役显式删除的纹理
    /// 2. 已驻留纹理切换 sampler
    /// 3. 按请求顺序上传队列中的纹理；staging 不足的纹理保留到下一次，顺序不变
    /// 4. 为有需求的纹理分配 slot
    ///
    /// 只有设备错误会返回 Err，此时当前纹理被丢弃，其余未处理的纹理保留在队列中
    pub fn flush_pending_uploads(
        &mut self,
        phase: &mut UploadPhase<'_>,
        pixels: &mut dyn PixelSource,
    ) -> Result<FlushReport, ResidencyError> {
        let _span = tracy_client::span!("TextureResidencyManager::flush_pending_uploads");

        let mut report = FlushReport {
            retired: self.retire_deleted(),
            ..Default::default()
        };
        self.rebind_samplers()?;

        let mut queue = self.pending.drain_all().into_iter();
        while let Some(id) = queue.next() {
            match self.upload_one(phase, pixels, id) {
                Ok(UploadOutcome::Uploaded) => {
                    self.sampler_requests.remove(&id);
                    report.uploaded.push(id);
                }
                Ok(UploadOutcome::Skipped) => {}
                Ok(UploadOutcome::Deferred) => report.deferred.push(id),
                Ok(UploadOutcome::Rejected(reason)) => {
                    log::warn!("Reject texture {:?}: {}", id, reason);
                    self.sampler_requests.remove(&id);
                    self.slots.clear_interest(id);
                    self.rejected.insert(id, reason);
                    report.rejected.push((id, reason));
                }
                Ok(UploadOutcome::Dropped(e)) => {
                    log::debug!("Drop upload of texture {:?}: {}", id, e);
                    // 重新请求时再记录 slot 需求
                    self.sampler_requests.remove(&id);
                    self.slots.clear_interest(id);
                    report.dropped.push((id, e));
                }
                Err(e) => {
                    log::error!("Failed to upload texture {:?}: {}", id, e);
                    self.sampler_requests.remove(&id);
                    report.deferred.iter().copied().chain(queue).for_each(|id| {
                        self.pending.enqueue(id);
                    });
                    return Err(e);
                }
            }
        }
        for &id in &report.deferred {
            self.pending.enqueue(id);
        }

        report.slots = self.assign_slots(phase);
        if !report.uploaded.is_empty() || !report.deferred.is_empty() {
            log::debug!(
                "Flush uploads: {} uploaded, {} deferred, {} rejected, {} dropped",
                report.uploaded.len(),
                report.deferred.len(),
                report.rejected.len(),
                report.dropped.len()
            );
        }
        Ok(report)
    }

    /// 原地更新已驻留纹理的内容，尺寸和格式必须一致
    ///
    /// 只支持单层、非压缩的采样纹理
    pub fn update_contents(
        &mut self,
        phase: &mut UploadPhase<'_>,
        raw: i32,
        pixels: &[u8],
        info: PixelFrameInfo,
    ) -> Result<(), ResidencyError> {
        let id = TextureId::try_from(raw)?;
        if self.store.is_render_target(id) {
            return Err(ResidencyError::NotUpdatable {
                id,
                reason: "render target contents are produced on the GPU",
            });
        }
        let texture = self.store.sampled(id).ok_or(ResidencyError::NotResident(id))?;
        if texture.array_layers > 1 {
            return Err(ResidencyError::NotUpdatable {
                id,
                reason: "texture arrays cannot be updated",
            });
        }
        if is_block_compressed(texture.format) || info.compression.is_some() {
            return Err(ResidencyError::NotUpdatable {
                id,
                reason: "compressed textures cannot be updated",
            });
        }
        if info.extent() != texture.extent {
            return Err(ResidencyError::ExtentMismatch {
                id,
                expected: texture.extent,
                actual: info.extent(),
            });
        }
        if info.source_size().is_some() && select_format(&info) != texture.format {
            return Err(ResidencyError::NotUpdatable {
                id,
                reason: "pixel format differs from the resident texture",
            });
        }

        let vk_image = texture.image.vk_image();
        let layout = UploadLayout::new(
            texture.extent.width,
            texture.extent.height,
            texture.format,
            1,
            self.settings.copy_offset_alignment,
        );

        let remaining = phase.staging.remaining();
        let Some(slice) = phase.staging.try_allocate(layout.total_size, self.settings.copy_offset_alignment) else {
            return Err(ResidencyError::StagingExhausted {
                required: layout.total_size,
                remaining,
            });
        };
        let (buffer, offset) = (slice.buffer, slice.offset);
        write_layer(&mut slice.bytes[..layout.layer_size as usize], pixels, &info, 0)?;

        phase.recorder.image_barriers(&[GfxImageBarrier::shader_read_to_transfer_dst(vk_image, 1, 1)]);
        phase.recorder.copy_buffer_to_image(buffer, vk_image, &layout.copy_regions(offset));
        phase.recorder.image_barriers(&[GfxImageBarrier::transfer_dst_to_shader_read(vk_image, 1, 1)]);

        self.store.touch(id, phase.frame_index(), phase.submit_serial());
        Ok(())
    }
}

// tools
impl<D: TextureDevice> TextureResidencyManager<D> {
    fn retire_deleted(&mut self) -> Vec<TextureId> {
        let deletions = std::mem::take(&mut self.pending_deletions);
        deletions.into_iter().filter(|&id| self.retire(id)).collect()
    }

    /// 已驻留纹理切换到请求的 sampler，slot 需要重新写入
    fn rebind_samplers(&mut self) -> Result<(), ResidencyError> {
        let requests = self
            .sampler_requests
            .iter()
            .filter(|(id, _)| self.store.sampled(**id).is_some())
            .map(|(&id, &key)| (id, key))
            .collect::<Vec<_>>();

        for (id, key) in requests {
            let sampler = self.sampler_for(key)?;
            self.sampler_requests.remove(&id);

            let Some(texture) = self.store.sampled_mut(id) else {
                continue;
            };
            if texture.sampler_key == key {
                continue;
            }
            texture.sampler = sampler;
            texture.sampler_key = key;
            if let Some(slot) = self.slots.try_get_slot(id) {
                self.slots.mark_dirty(slot);
            }
            log::debug!("Texture {:?} switches sampler to {:?}", id, key);
        }
        Ok(())
    }

    fn upload_one(
        &mut self,
        phase: &mut UploadPhase<'_>,
        pixels: &mut dyn PixelSource,
        id: TextureId,
    ) -> Result<UploadOutcome, ResidencyError> {
        if self.store.is_resident(id) || self.rejected.contains(id) {
            return Ok(UploadOutcome::Skipped);
        }

        let alignment = self.settings.copy_offset_alignment;
        let plan = match UploadPlan::new(pixels, id, alignment) {
            Ok(plan) => plan,
            Err(outcome) => return Ok(outcome),
        };
        let layout = &plan.layout;

        let required = layout.total_size;
        let capacity = phase.staging.capacity();
        if required > capacity {
            return Ok(RejectReason::ExceedsStagingCapacity { required, capacity }.into());
        }
        if required > phase.staging.remaining() {
            return Ok(UploadOutcome::Deferred);
        }
        let Some(slice) = phase.staging.try_allocate(required, alignment) else {
            return Ok(UploadOutcome::Deferred);
        };
        let (buffer, offset) = (slice.buffer, slice.offset);

        for (layer, info) in plan.frames.iter().enumerate() {
            let layer = layer as u32;
            let start = layout.layer_offsets[layer as usize] as usize;
            let dst = &mut slice.bytes[start..start + layout.layer_size as usize];

            // 失败时已分配的 staging 空间不回收，帧结束时随 staging 一起重置
            let written = match pixels.lock(id, layer) {
                Ok(src) => write_layer(dst, src, info, layer),
                Err(e) => return Ok(e.into()),
            };
            pixels.unlock(id, layer);
            if let Err(reason) = written {
                return Ok(reason.into());
            }
        }

        let sampler_key = self.sampler_requests.get(&id).copied().unwrap_or(self.settings.default_sampler);
        let sampler = self.sampler_for(sampler_key)?;

        let layers = layout.layers();
        let image = self.device.create_image(&GpuImageDesc {
            extent: vk::Extent2D {
                width: layout.width,
                height: layout.height,
            },
            format: layout.format,
            mip_levels: 1,
            array_layers: layers,
            kind: GpuImageKind::Sampled,
            name: format!("texture-{}", id),
        })?;
        let vk_image = image.vk_image();

        phase.recorder.image_barriers(&[GfxImageBarrier::undefined_to_transfer_dst(vk_image, 1, layers)]);
        phase.recorder.copy_buffer_to_image(buffer, vk_image, &layout.copy_regions(offset));
        phase.recorder.image_barriers(&[GfxImageBarrier::transfer_dst_to_shader_read(vk_image, 1, layers)]);

        let texture = ResidentTexture {
            image,
            sampler,
            sampler_key,
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            extent: vk::Extent2D {
                width: layout.width,
                height: layout.height,
            },
            format: layout.format,
            mip_levels: 1,
            array_layers: layers,
            usage: UsageTracking::new(phase.frame_index(), phase.submit_serial()),
        };
        let displaced = self.store.insert_sampled(id, texture);
        self.defer_release(displaced);

        log::debug!("Uploaded texture {:?}: {}x{} {:?} x{}", id, layout.width, layout.height, layout.format, layers);
        Ok(UploadOutcome::Uploaded)
    }
}
