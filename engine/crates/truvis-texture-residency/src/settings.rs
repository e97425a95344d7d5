use crate::{bindless_slots::ReservedSlots, error::ResidencyError, sampler_key::SamplerKey};

/// 默认配置
pub struct DefaultResidencySettings;
impl DefaultResidencySettings {
    /// shader 中 bindless 纹理数组的长度
    pub const MAX_BINDLESS_TEXTURES: u32 = 1024;
    pub const FRAMES_IN_FLIGHT: u32 = 2;
    /// buffer -> image 拷贝时 buffer offset 的对齐
    pub const COPY_OFFSET_ALIGNMENT: u64 = 4;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResidencySettings {
    /// bindless 数组长度，包含保留的 slot
    pub max_bindless_textures: u32,
    /// 每个 frame in flight 都有一份 bindless descriptor set，slot 变化需要写入每一份
    pub frames_in_flight: u32,
    /// 必须是 2 的幂
    pub copy_offset_alignment: u64,
    /// 上传时没有指定 sampler 的纹理使用该 sampler
    pub default_sampler: SamplerKey,
}

impl Default for ResidencySettings {
    fn default() -> Self {
        Self {
            max_bindless_textures: DefaultResidencySettings::MAX_BINDLESS_TEXTURES,
            frames_in_flight: DefaultResidencySettings::FRAMES_IN_FLIGHT,
            copy_offset_alignment: DefaultResidencySettings::COPY_OFFSET_ALIGNMENT,
            default_sampler: SamplerKey::default(),
        }
    }
}

impl ResidencySettings {
    pub fn validate(&self) -> Result<(), ResidencyError> {
        if self.max_bindless_textures <= ReservedSlots::FIRST_DYNAMIC {
            return Err(ResidencyError::InvalidSettings("max_bindless_textures leaves no dynamic slot"));
        }
        if self.frames_in_flight == 0 {
            return Err(ResidencyError::InvalidSettings("frames_in_flight must be at least 1"));
        }
        if !self.copy_offset_alignment.is_power_of_two() {
            return Err(ResidencyError::InvalidSettings("copy_offset_alignment must be a power of two"));
        }
        Ok(())
    }

    /// 可以被动态分配的 slot 数量
    #[inline]
    pub fn dynamic_slot_count(&self) -> u32 {
        self.max_bindless_textures.saturating_sub(ReservedSlots::FIRST_DYNAMIC)
    }
}
