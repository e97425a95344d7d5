use std::collections::HashMap;

use crate::{error::RejectReason, texture_id::TextureId};

/// 被永久拒绝上传的纹理
///
/// 只有 release 或 delete 才会把纹理移出该集合
#[derive(Default, Debug)]
pub struct RejectedSet {
    entries: HashMap<TextureId, RejectReason>,
}

impl RejectedSet {
    #[inline]
    pub fn insert(&mut self, id: TextureId, reason: RejectReason) {
        self.entries.insert(id, reason);
    }

    #[inline]
    pub fn remove(&mut self, id: TextureId) -> bool {
        self.entries.remove(&id).is_some()
    }

    #[inline]
    pub fn contains(&self, id: TextureId) -> bool {
        self.entries.contains_key(&id)
    }

    /// 第一次被拒绝时的原因
    #[inline]
    pub fn reason(&self, id: TextureId) -> Option<RejectReason> {
        self.entries.get(&id).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
