use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::foundation::device::GfxDevice;

/// 创建 image 所需的参数
#[derive(Clone, Copy, Debug)]
pub struct GfxImageCreateInfo {
    inner: vk::ImageCreateInfo<'static>,
}

impl GfxImageCreateInfo {
    /// 2D 图像，单 mip 单 layer，tiling 为 OPTIMAL
    pub fn new_image_2d_info(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            inner: vk::ImageCreateInfo {
                image_type: vk::ImageType::TYPE_2D,
                format,
                extent: vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
        }
    }

    /// builder
    #[inline]
    pub fn mip_levels(mut self, mip_levels: u32) -> Self {
        self.inner.mip_levels = mip_levels;
        self
    }

    /// builder
    #[inline]
    pub fn array_layers(mut self, array_layers: u32) -> Self {
        self.inner.array_layers = array_layers;
        self
    }

    /// builder
    ///
    /// 需要 6 个 layer 才能创建 cube view
    #[inline]
    pub fn cube_compatible(mut self) -> Self {
        self.inner.flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        self
    }

    #[inline]
    pub fn as_info(&self) -> &vk::ImageCreateInfo<'static> {
        &self.inner
    }
}

/// 由 VMA 分配的 image，drop 时释放内存
pub struct GfxImage {
    handle: vk::Image,
    allocation: vk_mem::Allocation,

    extent: vk::Extent2D,
    format: vk::Format,
    mip_levels: u32,
    array_layers: u32,

    name: String,
    device: Rc<GfxDevice>,
}

// new & init
impl GfxImage {
    pub fn new(
        device: Rc<GfxDevice>,
        image_info: &GfxImageCreateInfo,
        alloc_info: &vk_mem::AllocationCreateInfo,
        name: impl AsRef<str>,
    ) -> Result<Self, vk::Result> {
        let (handle, allocation) = unsafe { device.allocator().create_image(image_info.as_info(), alloc_info)? };
        let info = image_info.as_info();
        log::debug!("Created GfxImage: {}", name.as_ref());

        Ok(Self {
            handle,
            allocation,
            extent: vk::Extent2D {
                width: info.extent.width,
                height: info.extent.height,
            },
            format: info.format,
            mip_levels: info.mip_levels,
            array_layers: info.array_layers,
            name: name.as_ref().to_string(),
            device,
        })
    }

    /// 设备本地内存上的 image
    pub fn new_device_local(
        device: Rc<GfxDevice>,
        image_info: &GfxImageCreateInfo,
        name: impl AsRef<str>,
    ) -> Result<Self, vk::Result> {
        Self::new(
            device,
            image_info,
            &vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            name,
        )
    }
}

// getters
impl GfxImage {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }
}

impl Drop for GfxImage {
    fn drop(&mut self) {
        log::debug!("Destroying GfxImage: {}", self.name);
        unsafe {
            self.device.allocator().destroy_image(self.handle, &mut self.allocation);
        }
    }
}

impl std::fmt::Display for GfxImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GfxImage({}, {:?})", self.name, self.handle)
    }
}
