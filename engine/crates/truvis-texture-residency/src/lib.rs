//! GPU 纹理驻留与 bindless slot 管理
//!
//! # 每帧的数据流
//!
//! 1. draw 阶段只记录意图：[`TextureResidencyManager::queue_upload`]、
//!    [`TextureResidencyManager::request_slot`]，不做任何 GPU 工作
//! 2. 帧开始的 upload phase（[`FrameOrchestrator::run_upload_phase`]）中，先按 completion serial
//!    回收延迟释放的资源，再统一执行上传、退役和 slot 分配
//! 3. 之后 draw 阶段读取更新后的查找表
//!
//! 所有会修改 slot 表、分配 staging、录制上传命令的接口都要求 [`UploadPhase`] 参数，
//! 它只能由 [`FrameOrchestrator`] 构造。
//!
//! # 状态
//!
//! 纹理处于哪个状态，完全由它所在的容器决定：pending / rejected / sampled / render target，
//! 不存在 "标记为 resident 但没有 GPU 对象" 的情况。

pub mod backend;
pub mod bindless_slots;
pub mod deferred_release;
pub mod error;
pub mod frame;
pub mod manager;
pub mod pending_uploads;
pub mod pixel_format;
pub mod rejected;
pub mod render_target;
pub mod resident;
pub mod sampler_key;
pub mod settings;
pub mod texture_id;
pub mod upload_phase;
pub mod vulkan;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::ResidencyError;
pub use frame::{DrawRecording, FrameOrchestrator};
pub use manager::{FlushReport, Residency, TextureResidencyManager};
pub use sampler_key::SamplerKey;
pub use texture_id::TextureId;
pub use upload_phase::UploadPhase;
