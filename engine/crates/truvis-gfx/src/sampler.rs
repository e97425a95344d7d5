use std::rc::Rc;

use ash::vk;

use crate::foundation::device::GfxDevice;

/// Sampler 的创建参数，可作为 cache 的 key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GfxSamplerDesc {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub address_mode_u: vk::SamplerAddressMode,
    pub address_mode_v: vk::SamplerAddressMode,
    pub address_mode_w: vk::SamplerAddressMode,
    pub max_anisotropy: u32,
    pub mipmap_mode: vk::SamplerMipmapMode,
}

impl Default for GfxSamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            address_mode_u: vk::SamplerAddressMode::REPEAT,
            address_mode_v: vk::SamplerAddressMode::REPEAT,
            address_mode_w: vk::SamplerAddressMode::REPEAT,
            max_anisotropy: 0,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
        }
    }
}

impl GfxSamplerDesc {
    /// 三个方向使用同一种 filter 和 address mode
    pub fn uniform(filter: vk::Filter, address: vk::SamplerAddressMode) -> Self {
        let mipmap_mode = match filter {
            vk::Filter::NEAREST => vk::SamplerMipmapMode::NEAREST,
            _ => vk::SamplerMipmapMode::LINEAR,
        };
        Self {
            mag_filter: filter,
            min_filter: filter,
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            max_anisotropy: 0,
            mipmap_mode,
        }
    }

    fn create_info(&self) -> vk::SamplerCreateInfo<'static> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(self.mag_filter)
            .min_filter(self.min_filter)
            .address_mode_u(self.address_mode_u)
            .address_mode_v(self.address_mode_v)
            .address_mode_w(self.address_mode_w)
            .mipmap_mode(self.mipmap_mode)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .compare_enable(false);

        if self.max_anisotropy > 0 {
            create_info.anisotropy_enable(true).max_anisotropy(self.max_anisotropy as f32)
        } else {
            create_info.anisotropy_enable(false)
        }
    }
}

pub struct GfxSampler {
    handle: vk::Sampler,
    desc: GfxSamplerDesc,
    device: Rc<GfxDevice>,
}

// new & init
impl GfxSampler {
    pub fn new(device: Rc<GfxDevice>, desc: &GfxSamplerDesc) -> Result<Self, vk::Result> {
        let handle = unsafe { device.create_sampler(&desc.create_info(), None)? };
        log::debug!("Created sampler {:?}", desc);

        Ok(Self {
            handle,
            desc: *desc,
            device,
        })
    }
}

// getters
impl GfxSampler {
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }

    #[inline]
    pub fn desc(&self) -> &GfxSamplerDesc {
        &self.desc
    }
}

impl Drop for GfxSampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.handle, None);
        }
    }
}
