use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::{commands::command_buffer::GfxCommandBuffer, foundation::device::GfxDevice};

/// 用于初始化阶段的一次性提交：录制、提交、等待 queue idle
///
/// 会阻塞 CPU，只适合启动时创建默认资源，不能在帧循环中使用
pub struct GfxImmediateSubmit {
    pool: vk::CommandPool,
    queue: vk::Queue,
    device: Rc<GfxDevice>,
}

// new & init
impl GfxImmediateSubmit {
    pub fn new(device: Rc<GfxDevice>, queue_family_index: u32, queue: vk::Queue) -> anyhow::Result<Self> {
        let pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .queue_family_index(queue_family_index)
                    .flags(vk::CommandPoolCreateFlags::TRANSIENT),
                None,
            )
        }
        .context("Failed to create immediate command pool")?;

        Ok(Self { pool, queue, device })
    }
}

// tools
impl GfxImmediateSubmit {
    /// 录制并同步执行 `record` 中的命令
    pub fn exec<R>(&self, record: impl FnOnce(&GfxCommandBuffer) -> R, name: &str) -> anyhow::Result<R> {
        let _span = tracy_client::span!("GfxImmediateSubmit::exec");

        let command_buffers = unsafe {
            self.device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )
        }
        .with_context(|| format!("Failed to allocate command buffer for {name}"))?;

        let result = self.record_and_wait(command_buffers[0], record, name);

        unsafe {
            self.device.free_command_buffers(self.pool, &command_buffers);
        }
        result
    }

    fn record_and_wait<R>(
        &self,
        vk_handle: vk::CommandBuffer,
        record: impl FnOnce(&GfxCommandBuffer) -> R,
        name: &str,
    ) -> anyhow::Result<R> {
        let cmd = GfxCommandBuffer::from_raw(self.device.clone(), vk_handle);
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        let ret = record(&cmd);
        cmd.end()?;

        let command_buffers = [vk_handle];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe {
            self.device
                .queue_submit(self.queue, std::slice::from_ref(&submit_info), vk::Fence::null())
                .with_context(|| format!("Failed to submit {name}"))?;
            self.device.queue_wait_idle(self.queue).with_context(|| format!("Failed to wait {name}"))?;
        }
        Ok(ret)
    }
}

impl Drop for GfxImmediateSubmit {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
