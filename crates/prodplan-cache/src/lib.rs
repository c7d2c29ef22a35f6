//! # Production Plan Cache
//!
//! 計劃快取、過期判斷與髒標記

pub mod dirty_tracking;
pub mod staleness;

// Re-export 主要類型
pub use dirty_tracking::DirtyTracker;
pub use staleness::{PlanCache, PlanSnapshot, StaleReason, StalenessVerdict};

use uuid::Uuid;

/// 快取錯誤
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("找不到計劃快取: {0}")]
    UnknownPlan(Uuid),

    #[error("快取序列化失敗: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;
