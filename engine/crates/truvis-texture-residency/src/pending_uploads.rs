use indexmap::IndexSet;

use crate::texture_id::TextureId;

/// 去重的上传请求 FIFO
///
/// 同一个纹理在 drain 之前重复入队只保留第一次的位置；队列中不保存任何上传参数，
/// 上传时根据当前状态重新推导。
#[derive(Default, Debug)]
pub struct PendingUploadSet {
    queue: IndexSet<TextureId>,
}

impl PendingUploadSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回是否是新插入的
    #[inline]
    pub fn enqueue(&mut self, id: TextureId) -> bool {
        self.queue.insert(id)
    }

    /// 按入队顺序取出全部请求，队列清空
    pub fn drain_all(&mut self) -> Vec<TextureId> {
        std::mem::take(&mut self.queue).into_iter().collect()
    }

    /// 移除单个请求，其余请求的相对顺序不变
    #[inline]
    pub fn remove(&mut self, id: TextureId) -> bool {
        self.queue.shift_remove(&id)
    }

    #[inline]
    pub fn contains(&self, id: TextureId) -> bool {
        self.queue.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
