//! 採購缺口計算

use prodplan_core::{InventoryRead, PlanWarning, UnitConverter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregation::RequirementLine;
use crate::fifo::FifoLedger;

/// 單一物料的缺口
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapResult {
    pub item_id: String,
    pub unit: String,
    pub needed: Decimal,
    pub on_hand: Decimal,
    /// `max(0, needed - on_hand)`
    pub gap: Decimal,
}

impl GapResult {
    /// 計算缺口（永不為負）
    pub fn new(item_id: String, unit: String, needed: Decimal, on_hand: Decimal) -> Self {
        Self {
            item_id,
            unit,
            needed,
            on_hand,
            gap: (needed - on_hand).max(Decimal::ZERO),
        }
    }

    /// 是否需要採購
    pub fn needs_purchase(&self) -> bool {
        self.gap > Decimal::ZERO
    }
}

/// 缺口報表：每筆需求恰好落在兩類之一
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    /// 需採購
    pub purchase_items: Vec<GapResult>,
    /// 庫存足夠
    pub sufficient_items: Vec<GapResult>,
    /// 警告
    pub warnings: Vec<PlanWarning>,
}

impl GapReport {
    /// 報表涵蓋的需求筆數
    pub fn total_lines(&self) -> usize {
        self.purchase_items.len() + self.sufficient_items.len()
    }

    /// 查詢單一物料的缺口
    pub fn find(&self, item_id: &str, unit: &str) -> Option<&GapResult> {
        self.purchase_items
            .iter()
            .chain(self.sufficient_items.iter())
            .find(|g| g.item_id == item_id && g.unit == unit)
    }

    fn push(&mut self, result: GapResult) {
        if result.needs_purchase() {
            self.purchase_items.push(result);
        } else {
            self.sufficient_items.push(result);
        }
    }
}

/// 缺口計算器
pub struct GapCalculator<'a> {
    ledger: FifoLedger<'a>,
    converter: &'a UnitConverter,
}

impl<'a> GapCalculator<'a> {
    pub fn new(converter: &'a UnitConverter) -> Self {
        Self {
            ledger: FifoLedger::new(converter),
            converter,
        }
    }

    /// 計算缺口
    ///
    /// 沒有任何庫存紀錄時現有量為 0（不是錯誤）；單位無法換算的批次不計入現有量。
    pub fn calculate<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        requirements: &[RequirementLine],
    ) -> prodplan_core::Result<GapReport> {
        let mut report = GapReport::default();

        for line in requirements {
            let on_hand = self.ledger.available(store, &line.item_id, &line.unit)?;

            if on_hand.is_zero() {
                self.warn_unconvertible(store, line, &mut report)?;
            }

            report.push(GapResult::new(
                line.item_id.clone(),
                line.unit.clone(),
                line.quantity,
                on_hand,
            ));
        }

        tracing::info!(
            "缺口計算完成：需採購 {} 項，足夠 {} 項",
            report.purchase_items.len(),
            report.sufficient_items.len()
        );
        Ok(report)
    }

    /// 有庫存但單位全部無法換算時加入警告
    fn warn_unconvertible<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        line: &RequirementLine,
        report: &mut GapReport,
    ) -> prodplan_core::Result<()> {
        let lots = self.ledger.ordered_lots(store, &line.item_id)?;
        let units: Vec<&str> = lots
            .iter()
            .filter(|lot| !self.converter.is_compatible(&lot.unit, &line.unit, &line.item_id))
            .map(|lot| lot.unit.as_str())
            .collect();

        if !units.is_empty() {
            report.warnings.push(PlanWarning::warning(
                line.item_id.clone(),
                format!(
                    "庫存單位 {:?} 無法換算為 {}，視為無庫存",
                    units, line.unit
                ),
            ));
        }
        Ok(())
    }
}
