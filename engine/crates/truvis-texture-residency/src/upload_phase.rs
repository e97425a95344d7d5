use crate::backend::{CommandRecorder, StagingAllocator};

/// upload phase 的凭证
///
/// 只能由 [`crate::FrameOrchestrator::run_upload_phase`] 在安全点构造：此时已经读取了最新的
/// completion serial、回收了到期的延迟释放资源，并且没有正在录制的 draw 命令。
/// 所有会分配 staging、修改 slot 表或录制上传命令的接口都需要它。
///
/// 不能 Clone、不能 Default，也不能逃出 `run_upload_phase` 的闭包。
pub struct UploadPhase<'a> {
    frame_index: u64,
    submit_serial: u64,
    completed_serial: u64,
    pub(crate) staging: &'a mut dyn StagingAllocator,
    pub(crate) recorder: &'a mut dyn CommandRecorder,
}

impl<'a> UploadPhase<'a> {
    pub(crate) fn new(
        frame_index: u64,
        submit_serial: u64,
        completed_serial: u64,
        staging: &'a mut dyn StagingAllocator,
        recorder: &'a mut dyn CommandRecorder,
    ) -> Self {
        Self {
            frame_index,
            submit_serial,
            completed_serial,
            staging,
            recorder,
        }
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// 本帧提交时使用的 serial；本帧录制的命令在 completion serial 达到该值之后才算完成
    #[inline]
    pub fn submit_serial(&self) -> u64 {
        self.submit_serial
    }

    #[inline]
    pub fn completed_serial(&self) -> u64 {
        self.completed_serial
    }

    /// 供调用者在同一 phase 中做其他上传
    #[inline]
    pub fn staging(&mut self) -> &mut (dyn StagingAllocator + 'a) {
        &mut *self.staging
    }

    #[inline]
    pub fn recorder(&mut self) -> &mut (dyn CommandRecorder + 'a) {
        &mut *self.recorder
    }
}
