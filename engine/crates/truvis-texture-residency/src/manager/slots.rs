use std::collections::HashSet;

use ash::vk;

use crate::{
    backend::{GpuImage, TextureDevice},
    bindless_slots::SlotContent,
    manager::TextureResidencyManager,
    sampler_key::SamplerKey,
    texture_id::TextureId,
    upload_phase::UploadPhase,
};

/// 一次 slot 分配的结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub assigned: Vec<(TextureId, u32)>,
    /// 为了腾出 slot 被驱逐的纹理，GPU 资源已经进入延迟释放队列
    pub evicted: Vec<TextureId>,
    /// 没有空闲 slot 也没有可驱逐的纹理，需求保留到下一帧
    pub unresolved: usize,
}

/// 需要写入 bindless descriptor set 的一项
#[derive(Clone, Copy, Debug)]
pub struct BindlessWrite {
    pub slot: u32,
    pub info: vk::DescriptorImageInfo,
}

// upload phase: slot
impl<D: TextureDevice> TextureResidencyManager<D> {
    /// 为有需求且已驻留的纹理分配 slot，按 id 升序处理
    ///
    /// 没有空闲 slot 时驱逐最久未使用的采样纹理，前提是 GPU 已经执行完最后一次引用它的提交。
    /// 本次刚分配的纹理和 render target 不会被驱逐。
    pub fn assign_slots(&mut self, phase: &UploadPhase<'_>) -> SlotAssignment {
        let mut result = SlotAssignment::default();
        let mut assigned_now = HashSet::new();

        for id in self.slots.interested() {
            if !self.store.is_resident(id) {
                continue;
            }

            let slot = match self.slots.take_free() {
                Some(slot) => Some(slot),
                None => match self.eviction_candidate(phase.completed_serial(), &assigned_now) {
                    Some(victim) => {
                        log::debug!("Evict texture {:?} for {:?}", victim, id);
                        self.retire(victim);
                        self.pending_deletions.remove(&victim);
                        self.sampler_requests.remove(&victim);
                        result.evicted.push(victim);
                        self.slots.take_free()
                    }
                    None => None,
                },
            };

            match slot {
                Some(slot) => {
                    self.slots.assign(id, slot);
                    assigned_now.insert(id);
                    result.assigned.push((id, slot));
                }
                None => result.unresolved += 1,
            }
        }

        if result.unresolved > 0 {
            log::debug!(
                "{} slot requests unresolved, completed serial {}",
                result.unresolved,
                phase.completed_serial()
            );
        }
        result
    }

    /// 本帧需要写入 bindless descriptor set 的 slot 内容
    ///
    /// slot 内容变化后会在连续 `frames_in_flight` 次调用中返回，每帧写入当前帧的 descriptor set
    pub fn bindless_writes(&mut self, _phase: &UploadPhase<'_>) -> Vec<BindlessWrite> {
        let default_sampler = self.settings.default_sampler;
        self.slots
            .take_dirty()
            .into_iter()
            .map(|(slot, content)| {
                let info = match content {
                    SlotContent::Builtin(builtin) => self.builtin_descriptor(builtin, default_sampler),
                    SlotContent::Texture(id) => self.slot_descriptor(id, default_sampler),
                    SlotContent::Empty => self.fallback_descriptor(default_sampler),
                };
                BindlessWrite { slot, info }
            })
            .collect()
    }

    /// render target 在 slot 中总是以采样 layout 出现，shader 只在采样用途下读取它
    fn slot_descriptor(&self, id: TextureId, sampler: SamplerKey) -> vk::DescriptorImageInfo {
        if let Some(texture) = self.store.sampled(id) {
            return texture.bound_descriptor();
        }
        match self.store.render_target(id) {
            Some(target) => vk::DescriptorImageInfo {
                sampler: self.cached_sampler_or_default(sampler),
                image_view: target.image.sampled_view(),
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
            None => self.fallback_descriptor(sampler),
        }
    }

    /// 最久未使用的已分配采样纹理，`last_used_frame` 相同时取 id 较小者
    fn eviction_candidate(
        &self,
        completed_serial: u64,
        assigned_now: &HashSet<TextureId>,
    ) -> Option<TextureId> {
        self.slots
            .assignments()
            .filter(|(id, _)| !assigned_now.contains(id))
            .filter_map(|(id, _)| self.store.sampled(id).map(|texture| (id, texture.usage)))
            .filter(|(_, usage)| usage.last_used_serial <= completed_serial)
            .min_by_key(|(id, usage)| (usage.last_used_frame, *id))
            .map(|(id, _)| id)
    }
}
