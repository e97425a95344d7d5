use std::ops::Deref;
use std::rc::Rc;

use anyhow::Context;
use ash::vk;

/// Vulkan 逻辑设备与 VMA allocator 的组合
///
/// `ash::Device` 由外部创建，也由外部在所有 [`GfxDevice`] 引用释放之后销毁；
/// 这里只保存函数表，并负责 allocator 的生命周期。
pub struct GfxDevice {
    /// 必须先于 device 被销毁，字段顺序即 drop 顺序
    allocator: vk_mem::Allocator,
    device: ash::Device,
    pdevice: vk::PhysicalDevice,
}

// 构造
impl GfxDevice {
    /// 由于 vma 的生命周期设定：需要引用 Instance 以及 Device，
    /// 因此需要在 device 创建完成之后再初始化 vma
    pub fn new(instance: &ash::Instance, device: ash::Device, pdevice: vk::PhysicalDevice) -> anyhow::Result<Rc<Self>> {
        let _span = tracy_client::span!("GfxDevice::new");

        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance, &device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;

        let allocator = unsafe { vk_mem::Allocator::new(vma_ci) }.context("Failed to create vma allocator")?;
        log::info!("GfxDevice created, physical device: {:?}", pdevice);

        Ok(Rc::new(Self {
            allocator,
            device,
            pdevice,
        }))
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    #[inline]
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.pdevice
    }
}

// tools
impl GfxDevice {
    /// 批量写入 descriptor，不使用 copy
    #[inline]
    pub fn write_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        unsafe {
            self.device.update_descriptor_sets(writes, &[]);
        }
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl Drop for GfxDevice {
    fn drop(&mut self) {
        log::info!("Dropping GfxDevice");
    }
}
