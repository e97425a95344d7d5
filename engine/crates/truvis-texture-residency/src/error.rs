use ash::vk;

use crate::texture_id::TextureId;

/// residency 子系统对调用者报告的错误
///
/// 上传流程中的单个纹理失败（拒绝、延后、暂时不可读）不会作为错误返回，
/// 而是记录在 `FlushReport` 中；只有设备级错误会中断 flush。
#[derive(Debug, thiserror::Error)]
pub enum ResidencyError {
    #[error("invalid texture handle: {0}")]
    InvalidHandle(i32),

    #[error("texture {0} is not resident")]
    NotResident(TextureId),

    #[error("texture {id} cannot be updated in place: {reason}")]
    NotUpdatable { id: TextureId, reason: &'static str },

    #[error("texture {id} is {expected:?}, update provides {actual:?}")]
    ExtentMismatch {
        id: TextureId,
        expected: vk::Extent2D,
        actual: vk::Extent2D,
    },

    #[error("render target extent must be non-zero, got {width}x{height}")]
    InvalidExtent { width: u32, height: u32 },

    #[error("staging budget exhausted: need {required} bytes, {remaining} remaining")]
    StagingExhausted { required: u64, remaining: u64 },

    #[error("pixel data rejected: {0}")]
    Rejected(#[from] RejectReason),

    #[error("invalid residency settings: {0}")]
    InvalidSettings(&'static str),

    #[error("GPU device error: {0}")]
    Device(#[from] vk::Result),
}

/// 输入超出上传算法支持的范围，永久拒绝，不会重试
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("array frame {layer} is {width}x{height}, frame 0 is {expected_width}x{expected_height}")]
    ArrayShapeMismatch {
        layer: u32,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("array frame {layer} uses a different compression than frame 0")]
    MixedCompression { layer: u32 },

    #[error("array frame {layer} uses a different pixel format than frame 0")]
    MixedFormat { layer: u32 },

    #[error("source has no layers or a zero extent")]
    EmptySource,

    #[error("unsupported bits per pixel: {0}")]
    UnsupportedBpp(u8),

    #[error("upload needs {required} staging bytes, capacity is {capacity}")]
    ExceedsStagingCapacity { required: u64, capacity: u64 },

    #[error("layer {layer} provides {actual} bytes, {expected} required")]
    TruncatedSource { layer: u32, expected: u64, actual: u64 },
}

/// 暂时无法读取像素数据；本轮丢弃，不缓存，调用者之后可以重新请求
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("pixel source is locked")]
    Locked,

    #[error("pixel source is unavailable")]
    Unavailable,
}
