use std::rc::Rc;

use ash::vk;

use crate::foundation::device::GfxDevice;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxImageViewDesc {
    /// format 可以基于 vk::Image 重解释
    format: vk::Format,
    view_type: vk::ImageViewType,
    aspect_mask: vk::ImageAspectFlags,
    /// base mip level 和 mip level count
    mip: (u32, u32),
    /// base layer 和 layer count
    layer: (u32, u32),
}

impl GfxImageViewDesc {
    pub fn new_2d(format: vk::Format, aspect: vk::ImageAspectFlags) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D,
            aspect_mask: aspect,
            mip: (0, 1),
            layer: (0, 1),
        }
    }

    /// - `mip_range`: (base_mip_level, level_count)
    /// - `layer_range`: (base_array_layer, layer_count)
    pub fn new(
        format: vk::Format,
        view_type: vk::ImageViewType,
        aspect_mask: vk::ImageAspectFlags,
        mip_range: (u32, u32),
        layer_range: (u32, u32),
    ) -> Self {
        Self {
            format,
            view_type,
            aspect_mask,
            mip: mip_range,
            layer: layer_range,
        }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn view_type(&self) -> vk::ImageViewType {
        self.view_type
    }

    #[inline]
    pub fn mip_range(&self) -> (u32, u32) {
        self.mip
    }

    #[inline]
    pub fn layer_range(&self) -> (u32, u32) {
        self.layer
    }
}

pub struct GfxImageView {
    handle: vk::ImageView,
    desc: GfxImageViewDesc,
    device: Rc<GfxDevice>,
}

// new & init
impl GfxImageView {
    pub fn new(device: Rc<GfxDevice>, image: vk::Image, desc: GfxImageViewDesc) -> Result<Self, vk::Result> {
        let info = vk::ImageViewCreateInfo {
            image,
            view_type: desc.view_type,
            format: desc.format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: desc.aspect_mask,
                base_mip_level: desc.mip.0,
                level_count: desc.mip.1,
                base_array_layer: desc.layer.0,
                layer_count: desc.layer.1,
            },
            ..Default::default()
        };

        let handle = unsafe { device.create_image_view(&info, None)? };
        Ok(Self { handle, desc, device })
    }
}

// getters
impl GfxImageView {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }

    #[inline]
    pub fn desc(&self) -> &GfxImageViewDesc {
        &self.desc
    }
}

impl Drop for GfxImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.handle, None);
        }
    }
}
