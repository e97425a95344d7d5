//! 纹理驻留管理器
//!
//! 对外分为两类接口：
//! - draw path：任意时刻可调用，只做查询和意图记录（`&self` 或只追加 bookkeeping）
//! - upload phase：需要 [`UploadPhase`] 凭证，执行上传、退役、slot 分配
//!
//! [`UploadPhase`]: crate::upload_phase::UploadPhase

mod render_targets;
mod slots;
mod upload;

#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashMap};

use ash::vk;

use crate::{
    backend::{GpuImage, GpuSampler, TextureDevice},
    bindless_slots::{BindlessSlotTable, BuiltinTexture, ReservedSlots},
    deferred_release::DeferredReleaseQueue,
    error::{RejectReason, ResidencyError, SourceError},
    frame::DrawRecording,
    pending_uploads::PendingUploadSet,
    rejected::RejectedSet,
    resident::ResidentStore,
    sampler_key::SamplerKey,
    settings::ResidencySettings,
    texture_id::TextureId,
};

pub use slots::{BindlessWrite, SlotAssignment};

/// 纹理当前所处的状态，由所在的容器决定
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Residency {
    Sampled,
    RenderTarget,
    Pending,
    Rejected,
    Absent,
}

/// 一次 [`TextureResidencyManager::flush_pending_uploads`] 的结果
#[derive(Debug, Default)]
pub struct FlushReport {
    pub uploaded: Vec<TextureId>,
    /// staging 不足，保留到下一次 upload phase，顺序不变
    pub deferred: Vec<TextureId>,
    /// 永久拒绝
    pub rejected: Vec<(TextureId, RejectReason)>,
    /// 像素数据暂时不可读，本轮丢弃
    pub dropped: Vec<(TextureId, SourceError)>,
    /// 显式删除后退役
    pub retired: Vec<TextureId>,
    pub slots: SlotAssignment,
}

/// 保留 slot 上的默认纹理，与 manager 同生共死
struct BuiltinImages<I> {
    fallback: I,
    default_base: I,
    default_normal: I,
    default_spec: I,
}

impl<I> BuiltinImages<I> {
    fn new<D: TextureDevice<Image = I>>(device: &mut D) -> Result<Self, vk::Result> {
        let mut create = |builtin: BuiltinTexture| device.create_solid_image(builtin.rgba(), builtin.debug_name());
        Ok(Self {
            fallback: create(BuiltinTexture::Fallback)?,
            default_base: create(BuiltinTexture::DefaultBase)?,
            default_normal: create(BuiltinTexture::DefaultNormal)?,
            default_spec: create(BuiltinTexture::DefaultSpec)?,
        })
    }

    fn get(&self, builtin: BuiltinTexture) -> &I {
        match builtin {
            BuiltinTexture::Fallback => &self.fallback,
            BuiltinTexture::DefaultBase => &self.default_base,
            BuiltinTexture::DefaultNormal => &self.default_normal,
            BuiltinTexture::DefaultSpec => &self.default_spec,
        }
    }
}

pub struct TextureResidencyManager<D: TextureDevice> {
    settings: ResidencySettings,

    pending: PendingUploadSet,
    rejected: RejectedSet,
    /// 显式删除的纹理，在下一次 upload phase 开始时退役
    pending_deletions: BTreeSet<TextureId>,
    /// 上传或重新绑定时使用的 sampler
    sampler_requests: HashMap<TextureId, SamplerKey>,

    store: ResidentStore<D::Image>,
    slots: BindlessSlotTable,
    releases: DeferredReleaseQueue<D::Image>,

    samplers: HashMap<SamplerKey, D::Sampler>,
    builtins: BuiltinImages<D::Image>,

    /// 下一次 submit 的 serial，退役的资源在该 serial 完成之后才会销毁
    upcoming_serial: u64,
    completed_serial: u64,

    device: D,
}

// new & init
impl<D: TextureDevice> TextureResidencyManager<D> {
    pub fn new(mut device: D, settings: ResidencySettings) -> Result<Self, ResidencyError> {
        let _span = tracy_client::span!("TextureResidencyManager::new");
        settings.validate()?;

        let builtins = BuiltinImages::new(&mut device)?;
        let mut samplers = HashMap::new();
        samplers.insert(settings.default_sampler, device.create_sampler(settings.default_sampler)?);

        log::info!(
            "TextureResidencyManager created: {} bindless slots ({} dynamic), {} frames in flight",
            settings.max_bindless_textures,
            settings.dynamic_slot_count(),
            settings.frames_in_flight
        );

        Ok(Self {
            settings,
            pending: PendingUploadSet::new(),
            rejected: RejectedSet::default(),
            pending_deletions: BTreeSet::new(),
            sampler_requests: HashMap::new(),
            store: ResidentStore::default(),
            slots: BindlessSlotTable::new(settings.max_bindless_textures, settings.frames_in_flight),
            releases: DeferredReleaseQueue::new(),
            samplers,
            builtins,
            upcoming_serial: 1,
            completed_serial: 0,
            device,
        })
    }
}

impl<D: TextureDevice> Drop for TextureResidencyManager<D> {
    fn drop(&mut self) {
        log::info!(
            "Dropping TextureResidencyManager: {} sampled, {} render targets, {} pending release",
            self.store.sampled_count(),
            self.store.render_target_count(),
            self.releases.len()
        );
        self.releases.clear();
        self.store.drain().for_each(drop);
    }
}

// draw path: 意图记录
impl<D: TextureDevice> TextureResidencyManager<D> {
    /// 请求上传；无效句柄、已拒绝、已驻留的纹理直接忽略
    ///
    /// 返回是否新加入了上传队列
    pub fn queue_upload(&mut self, raw: i32, frame_index: u64, sampler: SamplerKey) -> bool {
        let Some(id) = TextureId::try_from_raw(raw) else {
            log::debug!("Ignore upload request for invalid handle {}", raw);
            return false;
        };
        if self.rejected.contains(id) {
            return false;
        }

        if let Some(texture) = self.store.sampled_mut(id) {
            texture.usage.last_used_frame = texture.usage.last_used_frame.max(frame_index);
            if texture.sampler_key != sampler {
                self.sampler_requests.insert(id, sampler);
            }
            // 再次请求表示仍然需要它
            self.pending_deletions.remove(&id);
            return false;
        }
        if self.store.is_render_target(id) {
            return false;
        }

        self.sampler_requests.insert(id, sampler);
        let queued = self.pending.enqueue(id);
        if queued {
            log::debug!("Request upload texture: {:?}", id);
        }
        queued
    }

    /// 外部即将复用该句柄：立即从所有容器中移除
    ///
    /// GPU 资源仍然按 serial 延迟销毁
    pub fn release(&mut self, raw: i32) {
        let Some(id) = TextureId::try_from_raw(raw) else {
            return;
        };

        self.pending.remove(id);
        self.rejected.remove(id);
        self.slots.clear_interest(id);
        self.pending_deletions.remove(&id);
        self.sampler_requests.remove(&id);
        if self.retire(id) {
            log::debug!("Released texture {:?}, destroy after serial {}", id, self.upcoming_serial);
        }
    }

    /// 显式卸载：立即取消所有请求，驻留资源在下一次 upload phase 退役
    pub fn delete_texture(&mut self, raw: i32) {
        let Some(id) = TextureId::try_from_raw(raw) else {
            return;
        };

        self.pending.remove(id);
        self.rejected.remove(id);
        self.slots.clear_interest(id);
        self.sampler_requests.remove(&id);
        if self.store.is_resident(id) {
            self.pending_deletions.insert(id);
        }
    }

    /// 只记录需求，slot 在 upload phase 中分配
    #[inline]
    pub fn request_slot(&mut self, id: TextureId) {
        self.slots.request_slot(id);
    }

    /// 已分配则返回 slot，否则记录需求并返回 fallback slot
    ///
    /// 驻留的纹理同时记为本帧使用，避免被仍在执行的帧引用时驱逐
    pub fn bindless_index(&mut self, id: TextureId, draw: &DrawRecording<'_>) -> u32 {
        self.mark_used(id, draw);
        match self.slots.try_get_slot(id) {
            Some(slot) => slot,
            None => {
                self.slots.request_slot(id);
                ReservedSlots::FALLBACK
            }
        }
    }

    /// 本帧的 draw 命令会引用该纹理
    pub fn mark_used(&mut self, id: TextureId, draw: &DrawRecording<'_>) -> bool {
        self.store.touch(id, draw.frame_index(), draw.submit_serial())
    }

    /// 已驻留时记为本帧使用并返回 descriptor，否则请求上传并返回 fallback
    pub fn descriptor_or_fallback(
        &mut self,
        raw: i32,
        draw: &DrawRecording<'_>,
        sampler: SamplerKey,
    ) -> vk::DescriptorImageInfo {
        if let Some(id) = TextureId::try_from_raw(raw) {
            if let Some(descriptor) = self.try_get_descriptor(id, sampler) {
                self.mark_used(id, draw);
                return descriptor;
            }
        }
        self.queue_upload(raw, draw.frame_index(), sampler);
        self.fallback_descriptor(sampler)
    }
}

// draw path: 查询
impl<D: TextureDevice> TextureResidencyManager<D> {
    /// 未驻留时返回 None
    ///
    /// `sampler` 尚未被创建时使用纹理当前绑定的 sampler；
    /// render target 只有处于 shader read layout 时才可以采样
    pub fn try_get_descriptor(&self, id: TextureId, sampler: SamplerKey) -> Option<vk::DescriptorImageInfo> {
        if let Some(texture) = self.store.sampled(id) {
            let sampler = self.samplers.get(&sampler).map(GpuSampler::vk_sampler).unwrap_or(texture.sampler);
            return Some(texture.descriptor(sampler));
        }

        let target = self.store.render_target(id)?;
        (target.layout == vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL).then(|| vk::DescriptorImageInfo {
            sampler: self.cached_sampler_or_default(sampler),
            image_view: target.image.sampled_view(),
            image_layout: target.layout,
        })
    }

    #[inline]
    pub fn try_get_slot(&self, id: TextureId) -> Option<u32> {
        self.slots.try_get_slot(id)
    }

    /// 始终有效的黑色纹理，对应 slot 0
    #[inline]
    pub fn fallback_descriptor(&self, sampler: SamplerKey) -> vk::DescriptorImageInfo {
        self.builtin_descriptor(BuiltinTexture::Fallback, sampler)
    }

    pub fn builtin_descriptor(&self, builtin: BuiltinTexture, sampler: SamplerKey) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.cached_sampler_or_default(sampler),
            image_view: self.builtins.get(builtin).sampled_view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    pub fn residency(&self, id: TextureId) -> Residency {
        if self.store.sampled(id).is_some() {
            Residency::Sampled
        } else if self.store.is_render_target(id) {
            Residency::RenderTarget
        } else if self.pending.contains(id) {
            Residency::Pending
        } else if self.rejected.contains(id) {
            Residency::Rejected
        } else {
            Residency::Absent
        }
    }

    #[inline]
    pub fn reject_reason(&self, id: TextureId) -> Option<RejectReason> {
        self.rejected.reason(id)
    }

    #[inline]
    pub fn pending_upload_count(&self) -> usize {
        self.pending.len()
    }

    /// 已退役、等待 GPU 完成后销毁的资源数量
    #[inline]
    pub fn pending_release_count(&self) -> usize {
        self.releases.len()
    }

    #[inline]
    pub fn settings(&self) -> &ResidencySettings {
        &self.settings
    }

    #[inline]
    pub fn slot_table(&self) -> &BindlessSlotTable {
        &self.slots
    }

    #[inline]
    pub fn resident_store(&self) -> &ResidentStore<D::Image> {
        &self.store
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn cached_sampler_or_default(&self, sampler: SamplerKey) -> vk::Sampler {
        self.samplers
            .get(&sampler)
            .or_else(|| self.samplers.get(&self.settings.default_sampler))
            .map(GpuSampler::vk_sampler)
            .unwrap_or_default()
    }
}

// 退役
impl<D: TextureDevice> TextureResidencyManager<D> {
    /// upload phase 开始时由 orchestrator 调用
    pub(crate) fn begin_upload_phase(&mut self, submit_serial: u64, completed_serial: u64) {
        self.upcoming_serial = submit_serial;
        self.completed_serial = completed_serial;

        let released = self.releases.collect(completed_serial);
        if released > 0 {
            log::debug!("Destroyed {} retired textures, completed serial {}", released, completed_serial);
        }
    }

    /// 释放 slot，移出驻留容器，GPU 资源交给延迟释放队列
    ///
    /// 返回该纹理是否驻留
    fn retire(&mut self, id: TextureId) -> bool {
        if let Some(slot) = self.slots.release(id) {
            log::debug!("Texture {:?} gives back slot {}", id, slot);
        }
        match self.store.take(id) {
            Some(image) => {
                self.releases.enqueue(image, self.upcoming_serial);
                true
            }
            None => false,
        }
    }

    /// 被替换下来的旧 image 同样需要等待 GPU
    fn defer_release(&mut self, displaced: Option<D::Image>) {
        if let Some(image) = displaced {
            self.releases.enqueue(image, self.upcoming_serial);
        }
    }

    /// 在 upload phase 中按需创建 sampler
    fn sampler_for(&mut self, key: SamplerKey) -> Result<vk::Sampler, vk::Result> {
        if let Some(sampler) = self.samplers.get(&key) {
            return Ok(sampler.vk_sampler());
        }
        let sampler = self.device.create_sampler(key)?;
        let handle = sampler.vk_sampler();
        log::debug!("Created sampler for {:?}", key);
        self.samplers.insert(key, sampler);
        Ok(handle)
    }
}
