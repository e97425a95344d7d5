use crate::error::ResidencyError;

/// 经过校验的纹理标识
///
/// 外部传入的是可能为负数的原始整数句柄；只有 [`TextureId::try_from_raw`] 能把它转换为
/// `TextureId`。已经持有 `TextureId` 的内部代码不再重复校验。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(u32);

impl TextureId {
    /// 负数句柄返回 None
    #[inline]
    pub fn try_from_raw(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().map(Self)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl TryFrom<i32> for TextureId {
    type Error = ResidencyError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::try_from_raw(raw).ok_or(ResidencyError::InvalidHandle(raw))
    }
}

impl std::fmt::Debug for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tex#{}", self.0)
    }
}

impl std::fmt::Display for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
