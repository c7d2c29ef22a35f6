//! 生產目標模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::EntityRef;
use crate::{PlanError, Result};

/// 目標類型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// 成品數量（配方產出的單位）
    RecipeUnits(String),
    /// 批數
    RecipeBatches(String),
    /// 組合數量
    Bundle(String),
}

impl TargetKind {
    /// 目標所指向的目錄實體
    pub fn entity(&self) -> EntityRef {
        match self {
            TargetKind::RecipeUnits(id) | TargetKind::RecipeBatches(id) => {
                EntityRef::Recipe(id.clone())
            }
            TargetKind::Bundle(id) => EntityRef::Bundle(id.clone()),
        }
    }
}

/// 生產目標
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// 目標ID
    pub id: String,

    /// 目標類型
    pub kind: TargetKind,

    /// 目標數量
    pub quantity: Decimal,

    /// 最後修改時間
    pub modified_at: DateTime<Utc>,
}

impl Target {
    /// 創建新的目標
    pub fn new(id: &str, kind: TargetKind, quantity: Decimal) -> Self {
        Self {
            id: id.to_string(),
            kind,
            quantity,
            modified_at: Utc::now(),
        }
    }

    /// 成品數量目標
    pub fn units(id: &str, recipe_id: &str, quantity: Decimal) -> Self {
        Self::new(id, TargetKind::RecipeUnits(recipe_id.to_string()), quantity)
    }

    /// 批數目標
    pub fn batches(id: &str, recipe_id: &str, batches: Decimal) -> Self {
        Self::new(id, TargetKind::RecipeBatches(recipe_id.to_string()), batches)
    }

    /// 組合數量目標
    pub fn bundle(id: &str, bundle_id: &str, quantity: Decimal) -> Self {
        Self::new(id, TargetKind::Bundle(bundle_id.to_string()), quantity)
    }

    /// 建構器模式：設置修改時間
    pub fn with_modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = at;
        self
    }

    /// 驗證目標數量為正數
    pub fn validate(&self) -> Result<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(PlanError::invalid_quantity(
                &format!("target {} quantity", self.id),
                self.quantity,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_entity() {
        let target = Target::batches("T1", "COOKIE-001", Decimal::from(4));

        assert_eq!(target.kind.entity(), EntityRef::Recipe("COOKIE-001".to_string()));
        assert!(target.validate().is_ok());
    }

    #[test]
    fn test_reject_non_positive_target() {
        let target = Target::bundle("T2", "BOX-001", Decimal::ZERO);

        assert!(matches!(
            target.validate(),
            Err(PlanError::InvalidQuantity { .. })
        ));
    }
}
