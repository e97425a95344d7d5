//! Vulkan GFX 抽象层
//!
//! 对 ash 和 vk-mem 的薄封装。所有资源持有 [`foundation::device::GfxDevice`] 的 `Rc`，
//! 在 `Drop` 时自行销毁，因此资源的销毁时机完全由所有权决定。
//!
//! 注意：GPU 仍在使用的资源不能直接 drop，需要由上层按 timeline 的完成值延迟释放。

pub mod commands;
pub mod foundation;
pub mod resources;
pub mod sampler;
