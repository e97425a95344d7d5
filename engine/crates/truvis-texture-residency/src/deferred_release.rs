/// 按 GPU completion serial 延迟释放的资源队列
///
/// 资源在 enqueue 之后不再被任何其他组件访问；当 completed serial 达到 retire serial 时，
/// 在 [`DeferredReleaseQueue::collect`] 中 drop。
pub struct DeferredReleaseQueue<T> {
    entries: Vec<DeferredReleaseEntry<T>>,
}

struct DeferredReleaseEntry<T> {
    resource: T,
    retire_serial: u64,
}

impl<T> Default for DeferredReleaseQueue<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> DeferredReleaseQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn enqueue(&mut self, resource: T, retire_serial: u64) {
        self.entries.push(DeferredReleaseEntry { resource, retire_serial });
    }

    /// 释放所有 `retire_serial <= completed_serial` 的资源，返回释放的数量
    ///
    /// 未到期的资源保持原有的相对顺序
    pub fn collect(&mut self, completed_serial: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.retire_serial > completed_serial);
        before - self.entries.len()
    }

    /// 无条件释放全部资源，调用前必须确认 device 已经 idle
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按入队顺序排列的 retire serial
    pub fn retire_serials(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().map(|entry| entry.retire_serial)
    }

    /// 按入队顺序访问尚未释放的资源
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.iter().map(|entry| &entry.resource)
    }
}
