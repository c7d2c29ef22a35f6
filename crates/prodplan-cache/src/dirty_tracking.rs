//! 髒標記追蹤

use chrono::{DateTime, Utc};
use prodplan_core::EntityRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 髒標記追蹤器
///
/// 記錄每個實體最後一次被標記的時間；計算時間早於標記的計劃視為過期。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirtyTracker {
    #[serde(with = "prodplan_core::catalog::entity_timestamps")]
    marks: BTreeMap<EntityRef, DateTime<Utc>>,
}

impl DirtyTracker {
    /// 創建新的追蹤器
    pub fn new() -> Self {
        Self::default()
    }

    /// 標記實體為髒
    pub fn mark_dirty(&mut self, entity: EntityRef, at: DateTime<Utc>) {
        let mark = self.marks.entry(entity).or_insert(at);
        if at > *mark {
            *mark = at;
        }
    }

    /// 實體在指定時間之後（含）是否被標記過
    pub fn is_dirty_since(&self, entity: &EntityRef, since: DateTime<Utc>) -> bool {
        self.marks.get(entity).is_some_and(|mark| *mark >= since)
    }

    /// 最後標記時間
    pub fn marked_at(&self, entity: &EntityRef) -> Option<DateTime<Utc>> {
        self.marks.get(entity).copied()
    }

    /// 清除早於指定時間的標記
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) {
        self.marks.retain(|_, mark| *mark >= cutoff);
    }

    /// 清除所有髒標記
    pub fn clear(&mut self) {
        self.marks.clear();
    }

    /// 獲取所有髒實體
    pub fn dirty_entities(&self) -> Vec<EntityRef> {
        self.marks.keys().cloned().collect()
    }
}
