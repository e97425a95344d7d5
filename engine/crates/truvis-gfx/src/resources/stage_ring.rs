use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use vk_mem::Alloc;

use crate::foundation::device::GfxDevice;

/// 一帧使用的 host visible staging buffer，线性（bump）分配
///
/// 每个 frame in flight 持有一个；在该帧的 fence/timeline 完成之后调用 [`GfxStageRing::reset`]
/// 重新从头分配。容量固定，不会自动扩容，也不会回绕。
pub struct GfxStageRing {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,
    /// 在初始化阶段写死，生命周期与 allocation 相同
    map_ptr: *mut u8,

    capacity: vk::DeviceSize,
    offset: vk::DeviceSize,

    name: String,
    device: Rc<GfxDevice>,
}

// init & destroy
impl GfxStageRing {
    pub fn new(device: Rc<GfxDevice>, capacity: vk::DeviceSize, name: impl AsRef<str>) -> anyhow::Result<Self> {
        let buffer_ci = vk::BufferCreateInfo::default()
            .size(capacity)
            .usage(vk::BufferUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferHost,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            ..Default::default()
        };

        let (handle, mut allocation) = unsafe { device.allocator().create_buffer(&buffer_ci, &alloc_ci) }
            .with_context(|| format!("Failed to create stage buffer {}", name.as_ref()))?;
        let map_ptr = match unsafe { device.allocator().map_memory(&mut allocation) } {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { device.allocator().destroy_buffer(handle, &mut allocation) };
                return Err(e).with_context(|| format!("Failed to map stage buffer {}", name.as_ref()));
            }
        };

        log::info!("Created stage buffer {} with {} bytes", name.as_ref(), capacity);
        Ok(Self {
            handle,
            allocation,
            map_ptr,
            capacity,
            offset: 0,
            name: name.as_ref().to_string(),
            device,
        })
    }
}

impl Drop for GfxStageRing {
    fn drop(&mut self) {
        log::debug!("Destroying stage buffer: {}", self.name);
        unsafe {
            let allocator = self.device.allocator();
            allocator.unmap_memory(&mut self.allocation);
            allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}

// getters
impl GfxStageRing {
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn capacity(&self) -> vk::DeviceSize {
        self.capacity
    }

    #[inline]
    pub fn used(&self) -> vk::DeviceSize {
        self.offset
    }

    #[inline]
    pub fn remaining(&self) -> vk::DeviceSize {
        self.capacity - self.offset
    }
}

// tools
impl GfxStageRing {
    /// 分配 `size` 字节，起始 offset 对齐到 `align`（必须是 2 的幂）
    ///
    /// 剩余空间不足时返回 None，不修改任何状态
    pub fn allocate(&mut self, size: vk::DeviceSize, align: vk::DeviceSize) -> Option<(vk::DeviceSize, &mut [u8])> {
        debug_assert!(align.is_power_of_two());
        let begin = self.offset.next_multiple_of(align);
        let end = begin.checked_add(size)?;
        if end > self.capacity {
            return None;
        }
        self.offset = end;

        // begin..end 在 capacity 之内，且每次分配的区间互不重叠
        let bytes = unsafe { std::slice::from_raw_parts_mut(self.map_ptr.add(begin as usize), size as usize) };
        Some((begin, bytes))
    }

    /// 将本帧写入的范围 flush 到 device，非 HOST_COHERENT 内存需要
    pub fn flush(&self) -> Result<(), vk::Result> {
        if self.offset == 0 {
            return Ok(());
        }
        self.device.allocator().flush_allocation(&self.allocation, 0, self.offset)
    }

    /// 调用前必须确认 GPU 已经不再读取本 buffer 上一次的内容
    #[inline]
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}
