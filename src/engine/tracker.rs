// src/engine/tracker.rs
use crate::klcommon::SeriesId;

/// 记录两次发布之间发生变化的序列
#[derive(Debug)]
pub struct DirtyTracker {
    updated: Vec<SeriesId>,
    is_dirty_flags: [bool; SeriesId::ALL.len()],
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self {
            updated: Vec::with_capacity(SeriesId::ALL.len()),
            is_dirty_flags: [false; SeriesId::ALL.len()],
        }
    }

    pub fn mark_dirty(&mut self, id: SeriesId) {
        let flag = &mut self.is_dirty_flags[id.index()];
        if !*flag {
            *flag = true;
            self.updated.push(id);
        }
    }

    pub fn mark_all(&mut self) {
        for id in SeriesId::ALL {
            self.mark_dirty(id);
        }
    }

    /// 收集所有脏序列，并重置追踪器。
    pub fn collect_and_reset(&mut self) -> Vec<SeriesId> {
        if self.updated.is_empty() {
            return Vec::new();
        }
        let dirty = std::mem::take(&mut self.updated);
        for id in &dirty {
            self.is_dirty_flags[id.index()] = false;
        }
        dirty
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
    }
}
