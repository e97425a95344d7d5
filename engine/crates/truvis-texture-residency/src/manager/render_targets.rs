use ash::vk;

use crate::{
    backend::{GpuImage, GpuImageDesc, GpuImageKind, TextureDevice},
    error::ResidencyError,
    frame::DrawRecording,
    manager::TextureResidencyManager,
    render_target::{RenderTargetFlags, RenderTargetInfo, RenderTargetUsage, render_target_barrier},
    resident::{ResidentRenderTarget, UsageTracking},
    texture_id::TextureId,
    upload_phase::UploadPhase,
};

// render target
impl<D: TextureDevice> TextureResidencyManager<D> {
    /// 创建 render target，替换该 id 之前的任何内容
    ///
    /// 创建后处于 SHADER_READ_ONLY_OPTIMAL，内容未定义
    pub fn create_render_target(
        &mut self,
        phase: &mut UploadPhase<'_>,
        raw: i32,
        width: u32,
        height: u32,
        flags: RenderTargetFlags,
    ) -> Result<RenderTargetInfo, ResidencyError> {
        let id = TextureId::try_from(raw)?;
        let info = RenderTargetInfo::from_request(width, height, flags)?;

        let image = self.device.create_image(&GpuImageDesc {
            extent: info.extent,
            format: info.format,
            mip_levels: info.mip_levels,
            array_layers: info.array_layers,
            kind: GpuImageKind::RenderTarget { cubemap: info.cubemap },
            name: format!("render-target-{}", id),
        })?;

        self.pending.remove(id);
        self.rejected.remove(id);
        self.pending_deletions.remove(&id);
        self.sampler_requests.remove(&id);
        self.retire(id);

        phase.recorder.image_barriers(&[render_target_barrier(
            image.vk_image(),
            &info,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )]);

        let target = ResidentRenderTarget {
            image,
            extent: info.extent,
            format: info.format,
            mip_levels: info.mip_levels,
            array_layers: info.array_layers,
            cubemap: info.cubemap,
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            usage: UsageTracking::new(phase.frame_index(), phase.submit_serial()),
        };
        let displaced = self.store.insert_render_target(id, target);
        self.defer_release(displaced);

        log::info!(
            "Created render target {:?}: {}x{}, {} mips, {} layers",
            id,
            info.extent.width,
            info.extent.height,
            info.mip_levels,
            info.array_layers
        );
        Ok(info)
    }

    /// 在 draw 阶段切换 render target 的用途，返回是否录制了 barrier
    ///
    /// 已处于目标 layout 或不是 render target 时什么都不做
    pub fn transition_render_target(
        &mut self,
        draw: &mut DrawRecording<'_>,
        id: TextureId,
        usage: RenderTargetUsage,
    ) -> bool {
        let Some(target) = self.store.render_target_mut(id) else {
            return false;
        };
        let new_layout = usage.layout();
        if target.layout == new_layout {
            return false;
        }

        let barrier = render_target_barrier(target.image.vk_image(), &target.info(), target.layout, new_layout);
        draw.recorder().image_barriers(&[barrier]);
        target.layout = new_layout;
        target.usage.touch(draw.frame_index(), draw.submit_serial());
        true
    }

    #[inline]
    pub fn has_render_target(&self, id: TextureId) -> bool {
        self.store.is_render_target(id)
    }

    pub fn render_target_info(&self, id: TextureId) -> Option<RenderTargetInfo> {
        self.store.render_target(id).map(|target| target.info())
    }

    /// render target 第 `face` 层的 attachment view；非 cubemap 只有第 0 层
    pub fn render_target_attachment_view(&self, id: TextureId, face: u32) -> Option<vk::ImageView> {
        self.store.render_target(id)?.image.attachment_view(face)
    }
}
