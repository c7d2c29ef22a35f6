//! # Production Planning Core
//!
//! 核心資料模型、單位換算與持久層介面

pub mod catalog;
pub mod config;
pub mod event;
pub mod inventory;
pub mod snapshot;
pub mod store;
pub mod target;
pub mod units;

// Re-export 主要類型
pub use catalog::{
    Bundle, Catalog, Component, ComponentKind, EntityRef, Ingredient, MemoryCatalog, Recipe,
    YieldConfig,
};
pub use config::EngineConfig;
pub use event::{AssemblyEvent, ConsumptionRecord, ConsumptionSource, EventKind, ProductionEvent};
pub use inventory::{FinishedGoods, InventoryLot};
pub use snapshot::{BundleSnapshot, RecipeSnapshot};
pub use store::{InventoryRead, MemoryStore, MemoryTransaction, Savepoint, UnitOfWork};
pub use target::{Target, TargetKind};
pub use units::{Dimension, ItemConversion, UnitConverter};

use rust_decimal::Decimal;

/// 配置錯誤（致命，不重試）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("組合結構存在循環: {}", path.join(" → "))]
    CyclicComposition { path: Vec<String> },

    #[error("配方 {recipe} 缺少產量配置")]
    MissingYieldConfig { recipe: String },

    #[error("組合 {bundle} 巢狀深度 {depth} 超過上限 {limit}")]
    CompositionTooDeep {
        bundle: String,
        depth: usize,
        limit: usize,
    },

    #[error("組合 {bundle} 對成品 {recipe} 的用量 {quantity} 不是整數")]
    FractionalUnitQuantity {
        bundle: String,
        recipe: String,
        quantity: Decimal,
    },

    #[error("配方 {recipe} 的產量必須為正數，實際為 {yield_per_batch}")]
    NonPositiveYield {
        recipe: String,
        yield_per_batch: Decimal,
    },
}

/// 生產計劃錯誤類型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("配置錯誤: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("庫存不足：物料 {item}（{unit}）需要 {needed}，可用 {available}，短缺 {shortfall}")]
    InsufficientInventory {
        item: String,
        unit: String,
        needed: Decimal,
        available: Decimal,
        shortfall: Decimal,
    },

    #[error("單位不相容：物料 {item} 無法由 {from} 換算為 {to}")]
    IncompatibleUnits {
        item: String,
        from: String,
        to: String,
    },

    #[error("無效的數量：{field} = {value}")]
    InvalidQuantity { field: String, value: Decimal },

    #[error("找不到{kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("持久層錯誤: {0}")]
    Storage(String),
}

impl PlanError {
    /// 建立庫存不足錯誤（短缺量自動計算）
    pub fn insufficient(item: &str, unit: &str, needed: Decimal, available: Decimal) -> Self {
        Self::InsufficientInventory {
            item: item.to_string(),
            unit: unit.to_string(),
            needed,
            available,
            shortfall: (needed - available).max(Decimal::ZERO),
        }
    }

    /// 建立無效數量錯誤
    pub fn invalid_quantity(field: &str, value: Decimal) -> Self {
        Self::InvalidQuantity {
            field: field.to_string(),
            value,
        }
    }

    /// 是否為配置類錯誤
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;

/// 計劃警告
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlanWarning {
    pub subject: String,
    pub message: String,
    pub severity: WarningSeverity,
}

impl PlanWarning {
    pub fn new(subject: String, message: String, severity: WarningSeverity) -> Self {
        Self {
            subject,
            message,
            severity,
        }
    }

    pub fn info(subject: String, message: String) -> Self {
        Self::new(subject, message, WarningSeverity::Info)
    }

    pub fn warning(subject: String, message: String) -> Self {
        Self::new(subject, message, WarningSeverity::Warning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WarningSeverity {
    Info,
    Warning,
}
