use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::{commands::barrier::GfxImageBarrier, foundation::device::GfxDevice};

/// 对外部分配的 command buffer 的封装
///
/// 不负责 command buffer 的分配和释放，pool 的所有者负责回收
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    device: Rc<GfxDevice>,
}

// init
impl GfxCommandBuffer {
    #[inline]
    pub fn from_raw(device: Rc<GfxDevice>, vk_handle: vk::CommandBuffer) -> Self {
        Self { vk_handle, device }
    }
}

// begin & end
impl GfxCommandBuffer {
    #[inline]
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags) -> anyhow::Result<()> {
        unsafe {
            self.device
                .begin_command_buffer(self.vk_handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))?;
        }
        Ok(())
    }

    #[inline]
    pub fn end(&self) -> anyhow::Result<()> {
        unsafe {
            self.device.end_command_buffer(self.vk_handle)?;
        }
        Ok(())
    }
}

// getters
impl GfxCommandBuffer {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }
}

// transfer 类型的命令
impl GfxCommandBuffer {
    /// - command type: action
    /// - supported queue types: transfer, graphics, compute
    #[inline]
    pub fn cmd_copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device.cmd_copy_buffer_to_image(self.vk_handle, src, dst, dst_layout, regions);
        }
    }
}

// 同步命令
impl GfxCommandBuffer {
    /// - command type: synchronization
    /// - supported queue types: transfer, graphics, compute
    #[inline]
    pub fn image_memory_barrier(&self, dependency_flags: vk::DependencyFlags, barriers: &[GfxImageBarrier]) {
        let barriers = barriers.iter().map(|b| *b.inner()).collect_vec();
        unsafe {
            self.device.cmd_pipeline_barrier2(
                self.vk_handle,
                &vk::DependencyInfo::default().image_memory_barriers(&barriers).dependency_flags(dependency_flags),
            );
        }
    }
}
