use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::texture_id::TextureId;

/// bindless 数组开头的保留 slot，始终指向有效的默认纹理
pub struct ReservedSlots;
impl ReservedSlots {
    /// 未分配 slot 的纹理在 shader 中使用该 slot
    pub const FALLBACK: u32 = 0;
    pub const DEFAULT_BASE: u32 = 1;
    pub const DEFAULT_NORMAL: u32 = 2;
    pub const DEFAULT_SPEC: u32 = 3;
    pub const FIRST_DYNAMIC: u32 = 4;
}

/// 保留 slot 上的默认纹理
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinTexture {
    Fallback,
    DefaultBase,
    DefaultNormal,
    DefaultSpec,
}

impl BuiltinTexture {
    pub const ALL: [Self; 4] = [Self::Fallback, Self::DefaultBase, Self::DefaultNormal, Self::DefaultSpec];

    #[inline]
    pub fn slot(self) -> u32 {
        match self {
            Self::Fallback => ReservedSlots::FALLBACK,
            Self::DefaultBase => ReservedSlots::DEFAULT_BASE,
            Self::DefaultNormal => ReservedSlots::DEFAULT_NORMAL,
            Self::DefaultSpec => ReservedSlots::DEFAULT_SPEC,
        }
    }

    pub fn from_slot(slot: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.slot() == slot)
    }

    /// RGBA 顺序，默认纹理使用 R8G8B8A8_UNORM
    #[inline]
    pub fn rgba(self) -> [u8; 4] {
        match self {
            Self::Fallback => [0, 0, 0, 255],
            Self::DefaultBase => [255, 255, 255, 255],
            Self::DefaultNormal => [128, 128, 255, 255],
            Self::DefaultSpec => [0, 0, 0, 255],
        }
    }

    #[inline]
    pub fn debug_name(self) -> &'static str {
        match self {
            Self::Fallback => "builtin-fallback",
            Self::DefaultBase => "builtin-default-base",
            Self::DefaultNormal => "builtin-default-normal",
            Self::DefaultSpec => "builtin-default-spec",
        }
    }
}

/// 纹理 id 到 shader 可见 slot 的映射
///
/// - draw 阶段只能调用 [`BindlessSlotTable::request_slot`] 记录需求
/// - 分配、释放只在 upload phase 中由 manager 执行
///
/// 每个 frame in flight 都有一份 descriptor set，slot 内容变化后需要写入 `frames_in_flight` 次，
/// 未写完的 slot 记录在 `dirty` 中。
pub struct BindlessSlotTable {
    assignments: HashMap<TextureId, u32>,
    owners: HashMap<u32, TextureId>,
    /// 总是优先分配最小的 slot
    free: BTreeSet<u32>,
    /// 请求了 slot 但尚未分配的纹理，按 id 升序遍历
    interest: BTreeSet<TextureId>,
    /// slot -> 还需要写入的 descriptor set 数量
    dirty: BTreeMap<u32, u32>,

    frames_in_flight: u32,
    max_slots: u32,
}

/// 一个需要写入 bindless descriptor 的 slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotContent {
    Builtin(BuiltinTexture),
    Texture(TextureId),
    /// 空闲的动态 slot，写入 fallback
    Empty,
}

// new & init
impl BindlessSlotTable {
    /// 创建时所有 slot 都标记为 dirty，第一次写入会覆盖整个数组
    pub fn new(max_slots: u32, frames_in_flight: u32) -> Self {
        debug_assert!(max_slots > ReservedSlots::FIRST_DYNAMIC);
        Self {
            assignments: HashMap::new(),
            owners: HashMap::new(),
            free: (ReservedSlots::FIRST_DYNAMIC..max_slots).collect(),
            interest: BTreeSet::new(),
            dirty: (0..max_slots).map(|slot| (slot, frames_in_flight)).collect(),
            frames_in_flight,
            max_slots,
        }
    }
}

// draw path
impl BindlessSlotTable {
    /// 只记录需求；已经分配的纹理不会重复记录
    #[inline]
    pub fn request_slot(&mut self, id: TextureId) {
        if !self.assignments.contains_key(&id) {
            self.interest.insert(id);
        }
    }

    #[inline]
    pub fn try_get_slot(&self, id: TextureId) -> Option<u32> {
        self.assignments.get(&id).copied()
    }

    #[inline]
    pub fn has_interest(&self, id: TextureId) -> bool {
        self.interest.contains(&id)
    }
}

// upload phase
impl BindlessSlotTable {
    /// 取出最小的空闲 slot
    #[inline]
    pub(crate) fn take_free(&mut self) -> Option<u32> {
        self.free.pop_first()
    }

    /// `slot` 必须来自 [`Self::take_free`] 或刚刚 [`Self::release`] 的结果
    pub(crate) fn assign(&mut self, id: TextureId, slot: u32) {
        debug_assert!(slot >= ReservedSlots::FIRST_DYNAMIC && slot < self.max_slots);
        debug_assert!(!self.owners.contains_key(&slot), "slot {slot} is already assigned");
        debug_assert!(!self.free.contains(&slot));

        if let Some(previous) = self.assignments.insert(id, slot) {
            self.owners.remove(&previous);
            self.free.insert(previous);
            self.mark_dirty(previous);
        }
        self.owners.insert(slot, id);
        self.interest.remove(&id);
        self.mark_dirty(slot);
    }

    /// 归还 slot 到空闲池，返回被释放的 slot
    pub(crate) fn release(&mut self, id: TextureId) -> Option<u32> {
        let slot = self.assignments.remove(&id)?;
        self.owners.remove(&slot);
        self.free.insert(slot);
        self.mark_dirty(slot);
        Some(slot)
    }

    #[inline]
    pub(crate) fn clear_interest(&mut self, id: TextureId) -> bool {
        self.interest.remove(&id)
    }

    /// 当前的需求列表快照，按 id 升序
    pub(crate) fn interested(&self) -> Vec<TextureId> {
        self.interest.iter().copied().collect()
    }

    /// slot 指向的内容发生了变化（例如 sampler 或 image 被替换）
    #[inline]
    pub(crate) fn mark_dirty(&mut self, slot: u32) {
        self.dirty.insert(slot, self.frames_in_flight);
    }

    /// 取出本帧需要写入的 slot，每个 slot 的剩余次数减一
    pub(crate) fn take_dirty(&mut self) -> Vec<(u32, SlotContent)> {
        let slots = self
            .dirty
            .iter()
            .map(|(&slot, _)| (slot, self.content(slot)))
            .collect::<Vec<_>>();

        self.dirty.retain(|_, remaining| {
            *remaining -= 1;
            *remaining > 0
        });
        slots
    }

    fn content(&self, slot: u32) -> SlotContent {
        if let Some(builtin) = BuiltinTexture::from_slot(slot) {
            return SlotContent::Builtin(builtin);
        }
        match self.owners.get(&slot) {
            Some(&id) => SlotContent::Texture(id),
            None => SlotContent::Empty,
        }
    }
}

// getters
impl BindlessSlotTable {
    pub fn assignments(&self) -> impl Iterator<Item = (TextureId, u32)> + '_ {
        self.assignments.iter().map(|(&id, &slot)| (id, slot))
    }

    #[inline]
    pub fn assigned_count(&self) -> usize {
        self.assignments.len()
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn interest_count(&self) -> usize {
        self.interest.len()
    }

    #[inline]
    pub fn max_slots(&self) -> u32 {
        self.max_slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: i32) -> TextureId {
        TextureId::try_from_raw(raw).unwrap()
    }

    #[test]
    fn test_request_only_records_interest() {
        let mut table = BindlessSlotTable::new(8, 2);
        table.request_slot(id(1));
        table.request_slot(id(1));

        assert_eq!(table.try_get_slot(id(1)), None);
        assert_eq!(table.interest_count(), 1);
        assert_eq!(table.free_count(), 4);
    }

    #[test]
    fn test_free_pool_and_assignments_stay_disjoint() {
        let mut table = BindlessSlotTable::new(8, 1);
        table.request_slot(id(7));

        let slot = table.take_free().unwrap();
        assert_eq!(slot, ReservedSlots::FIRST_DYNAMIC);
        table.assign(id(7), slot);
        assert_eq!(table.try_get_slot(id(7)), Some(slot));
        assert!(!table.has_interest(id(7)));
        assert_eq!(table.free_count() + table.assigned_count(), 4);

        // 已分配的纹理再次请求不会产生新的需求
        table.request_slot(id(7));
        assert_eq!(table.interest_count(), 0);

        assert_eq!(table.release(id(7)), Some(slot));
        assert_eq!(table.release(id(7)), None);
        assert_eq!(table.free_count(), 4);
        // 释放的 slot 重新成为最小的空闲 slot
        assert_eq!(table.take_free(), Some(slot));
    }

    #[test]
    fn test_dirty_slots_are_written_once_per_frame_in_flight() {
        let mut table = BindlessSlotTable::new(6, 2);

        // 初始时所有 slot 都要写入
        let first = table.take_dirty();
        assert_eq!(first.len(), 6);
        assert_eq!(first[0], (0, SlotContent::Builtin(BuiltinTexture::Fallback)));
        assert_eq!(first[2], (2, SlotContent::Builtin(BuiltinTexture::DefaultNormal)));
        assert_eq!(first[5], (5, SlotContent::Empty));
        assert_eq!(table.take_dirty().len(), 6);
        assert!(table.take_dirty().is_empty());

        let slot = table.take_free().unwrap();
        table.assign(id(3), slot);
        assert_eq!(table.take_dirty(), vec![(slot, SlotContent::Texture(id(3)))]);

        // 第二份 descriptor set 写入之前 slot 被释放，写入的应是空 slot
        table.release(id(3));
        assert_eq!(table.take_dirty(), vec![(slot, SlotContent::Empty)]);
        assert_eq!(table.take_dirty(), vec![(slot, SlotContent::Empty)]);
        assert!(table.take_dirty().is_empty());
    }
}
