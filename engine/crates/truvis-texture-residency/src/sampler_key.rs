use ash::vk;
use truvis_gfx::sampler::GfxSamplerDesc;

/// 共享 sampler 的 cache key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SamplerKey {
    pub filter: vk::Filter,
    pub address: vk::SamplerAddressMode,
}

impl Default for SamplerKey {
    fn default() -> Self {
        Self {
            filter: vk::Filter::LINEAR,
            address: vk::SamplerAddressMode::REPEAT,
        }
    }
}

impl SamplerKey {
    #[inline]
    pub fn new(filter: vk::Filter, address: vk::SamplerAddressMode) -> Self {
        Self { filter, address }
    }

    #[inline]
    pub fn to_gfx_desc(self) -> GfxSamplerDesc {
        GfxSamplerDesc::uniform(self.filter, self.address)
    }
}
