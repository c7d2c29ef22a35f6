//! 可行性檢查：現有庫存能否完成剩餘數量

use prodplan_calc::{FifoLedger, GapResult, PlanCalculator};
use prodplan_core::{
    Catalog, EngineConfig, InventoryRead, PlanWarning, Target, TargetKind, UnitConverter,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 單一物料短缺
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortage {
    pub item_id: String,
    pub unit: String,
    pub needed: Decimal,
    pub available: Decimal,
    pub shortfall: Decimal,
}

impl From<&GapResult> for Shortage {
    fn from(gap: &GapResult) -> Self {
        Self {
            item_id: gap.item_id.clone(),
            unit: gap.unit.clone(),
            needed: gap.needed,
            available: gap.on_hand,
            shortfall: gap.gap,
        }
    }
}

/// 可行性結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feasibility {
    pub feasible: bool,
    /// 剩餘數量（目標單位）
    pub remaining: Decimal,
    /// 完成剩餘數量還需的批數
    pub batches_required: u64,
    /// 以 FIFO 模擬扣料估算的原料成本（僅計算可取得的部分）
    pub estimated_cost: Decimal,
    pub shortages: Vec<Shortage>,
    pub warnings: Vec<PlanWarning>,
}

impl Feasibility {
    /// 已無剩餘數量
    pub fn complete() -> Self {
        Self {
            feasible: true,
            remaining: Decimal::ZERO,
            batches_required: 0,
            estimated_cost: Decimal::ZERO,
            shortages: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// 可行性檢查器
///
/// 每個目標獨立評估，不考慮多個目標之間對同一批庫存的競爭。
/// 組合目標的成品與已組裝子組合庫存是組裝原料，一律計入可用量；配方目標的成品庫存本身就是已完成量，不再重複扣除。
pub struct FeasibilityChecker<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    converter: &'a UnitConverter,
    config: &'a EngineConfig,
}

impl<'a, C: Catalog + ?Sized> FeasibilityChecker<'a, C> {
    pub fn new(catalog: &'a C, converter: &'a UnitConverter, config: &'a EngineConfig) -> Self {
        Self {
            catalog,
            converter,
            config,
        }
    }

    /// 檢查剩餘數量是否可由現有成品與原料完成
    pub fn check<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        kind: &TargetKind,
        remaining: Decimal,
    ) -> prodplan_core::Result<Feasibility> {
        if remaining <= Decimal::ZERO {
            return Ok(Feasibility::complete());
        }

        let config = self
            .config
            .clone()
            .with_net_finished_goods(matches!(kind, TargetKind::Bundle(_)));
        let target = Target::new("feasibility", kind.clone(), remaining);
        let plan = PlanCalculator::new(self.catalog, self.converter, &config)
            .calculate(store, &[target])?;

        let ledger = FifoLedger::new(self.converter);
        let mut estimated_cost = Decimal::ZERO;
        for line in &plan.requirements {
            estimated_cost += ledger
                .trace(store, &line.item_id, line.quantity, &line.unit)?
                .total_cost;
        }

        let shortages: Vec<Shortage> = plan.gaps.purchase_items.iter().map(Shortage::from).collect();

        Ok(Feasibility {
            feasible: shortages.is_empty(),
            remaining,
            batches_required: plan.total_batches(),
            estimated_cost,
            shortages,
            warnings: plan.warnings,
        })
    }
}
