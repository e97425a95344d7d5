use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::foundation::device::GfxDevice;

/// timeline semaphore，当前值即 GPU 已完成的 submit 序号
pub struct GfxTimelineSemaphore {
    handle: vk::Semaphore,
    device: Rc<GfxDevice>,
}

// new & init
impl GfxTimelineSemaphore {
    pub fn new(device: Rc<GfxDevice>, initial_value: u64) -> anyhow::Result<Self> {
        let mut timeline_type_ci = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let timeline_semaphore_ci = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_type_ci);
        let handle = unsafe { device.create_semaphore(&timeline_semaphore_ci, None) }
            .context("Failed to create timeline semaphore")?;

        Ok(Self { handle, device })
    }
}

// getters
impl GfxTimelineSemaphore {
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }

    /// GPU 已经 signal 的最大值
    #[inline]
    pub fn completed_value(&self) -> Result<u64, vk::Result> {
        unsafe { self.device.get_semaphore_counter_value(self.handle) }
    }
}

// tools
impl GfxTimelineSemaphore {
    #[inline]
    pub fn wait(&self, timeline_value: u64, timeout_ns: u64) -> Result<(), vk::Result> {
        let semaphores = [self.handle];
        let values = [timeline_value];
        let wait_info = vk::SemaphoreWaitInfo::default().semaphores(&semaphores).values(&values);
        unsafe { self.device.wait_semaphores(&wait_info, timeout_ns) }
    }
}

impl Drop for GfxTimelineSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.handle, None);
        }
    }
}
