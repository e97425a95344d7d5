use std::marker::PhantomData;

use crate::{
    backend::{CommandRecorder, CompletionSerialSource, StagingAllocator, TextureDevice},
    manager::TextureResidencyManager,
    upload_phase::UploadPhase,
};

/// 帧的驱动者：推进帧序号和 submit serial，并且是 [`UploadPhase`] 唯一的构造点
///
/// 一帧的顺序：
/// 1. [`FrameOrchestrator::begin_frame`]
/// 2. [`FrameOrchestrator::run_upload_phase`]
/// 3. [`FrameOrchestrator::begin_draw_recording`]，draw 期间借用 orchestrator，无法进入 upload phase
/// 4. [`FrameOrchestrator::submit`]
pub struct FrameOrchestrator {
    /// 当前帧的序号，从 1 开始
    frame_id: u64,
    /// 下一次 submit 使用的 serial，从 1 开始，0 表示 "没有任何提交"
    next_submit_serial: u64,
    /// 观察到的最大 completion serial
    completed_serial: u64,
}

impl Default for FrameOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl FrameOrchestrator {
    pub fn new() -> Self {
        Self {
            frame_id: 0,
            next_submit_serial: 1,
            completed_serial: 0,
        }
    }
}

// getters
impl FrameOrchestrator {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub fn next_submit_serial(&self) -> u64 {
        self.next_submit_serial
    }

    #[inline]
    pub fn completed_serial(&self) -> u64 {
        self.completed_serial
    }

    /// 用于日志
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}]", self.frame_id)
    }
}

// frame phases
impl FrameOrchestrator {
    pub fn begin_frame(&mut self) -> u64 {
        self.frame_id = self.frame_id.wrapping_add(1);
        self.frame_id
    }

    /// 进入 upload phase：
    /// 1. 读取 completion serial，只会增大
    /// 2. 回收到期的延迟释放资源
    /// 3. 构造 [`UploadPhase`] 并执行 `body`
    /// 4. flush staging，之后录制的 copy 命令才能读到正确的数据
    pub fn run_upload_phase<D: TextureDevice, R>(
        &mut self,
        manager: &mut TextureResidencyManager<D>,
        serials: &dyn CompletionSerialSource,
        staging: &mut dyn StagingAllocator,
        recorder: &mut dyn CommandRecorder,
        body: impl FnOnce(&mut TextureResidencyManager<D>, &mut UploadPhase<'_>) -> R,
    ) -> R {
        let _span = tracy_client::span!("FrameOrchestrator::run_upload_phase");

        let completed = self.observe_completed_serial(serials);
        manager.begin_upload_phase(self.next_submit_serial, completed);

        let result = {
            let mut phase = UploadPhase::new(self.frame_id, self.next_submit_serial, completed, staging, recorder);
            body(manager, &mut phase)
        };

        if let Err(e) = staging.flush() {
            log::error!("{} failed to flush staging memory: {:?}", self.frame_name(), e);
        }
        result
    }

    /// draw 阶段；返回值存活期间 orchestrator 被借用
    pub fn begin_draw_recording<'a>(&'a mut self, recorder: &'a mut dyn CommandRecorder) -> DrawRecording<'a> {
        DrawRecording {
            frame_index: self.frame_id,
            submit_serial: self.next_submit_serial,
            recorder,
            _orchestrator: PhantomData,
        }
    }

    /// 本帧的命令已经提交，返回本帧使用的 serial
    pub fn submit(&mut self) -> u64 {
        let serial = self.next_submit_serial;
        self.next_submit_serial += 1;
        serial
    }

    fn observe_completed_serial(&mut self, serials: &dyn CompletionSerialSource) -> u64 {
        match serials.completed_serial() {
            Ok(value) if value < self.completed_serial => {
                log::warn!(
                    "{} completion serial went backwards: {} -> {}, keep {}",
                    self.frame_name(),
                    self.completed_serial,
                    value,
                    self.completed_serial
                );
            }
            Ok(value) => self.completed_serial = value,
            Err(e) => {
                log::error!("{} failed to query completion serial: {:?}", self.frame_name(), e);
            }
        }
        self.completed_serial
    }
}

/// 正在录制 draw 命令
///
/// 持有 orchestrator 的可变借用，因此 draw 期间不可能构造 [`UploadPhase`]
pub struct DrawRecording<'a> {
    frame_index: u64,
    submit_serial: u64,
    recorder: &'a mut dyn CommandRecorder,
    _orchestrator: PhantomData<&'a mut FrameOrchestrator>,
}

impl<'a> DrawRecording<'a> {
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// 本帧 draw 命令提交时的 serial
    #[inline]
    pub fn submit_serial(&self) -> u64 {
        self.submit_serial
    }

    #[inline]
    pub fn recorder(&mut self) -> &mut (dyn CommandRecorder + 'a) {
        &mut *self.recorder
    }
}
