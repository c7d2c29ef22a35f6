//! FIFO 庫存帳
//!
//! 依收貨時間（同時間以批次ID決勝）由舊到新扣料，成本取自各批次收貨單價。

use chrono::{DateTime, Utc};
use prodplan_core::{InventoryLot, InventoryRead, PlanError, UnitConverter, UnitOfWork};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 單一批次的扣料明細
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotDraw {
    /// 批次ID
    pub lot_id: Uuid,
    /// 扣料數量（批次單位）
    pub quantity: Decimal,
    /// 批次單位
    pub unit: String,
    /// 扣料當下的批次單價
    pub cost_per_unit: Decimal,
    /// 扣料成本
    pub cost: Decimal,
    /// 扣料後剩餘
    pub remaining_after: Decimal,
}

/// 扣料軌跡
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionTrace {
    pub item_id: String,
    /// 請求單位
    pub unit: String,
    /// 請求數量
    pub requested: Decimal,
    /// 已滿足數量（請求單位）
    pub consumed: Decimal,
    pub draws: Vec<LotDraw>,
    pub total_cost: Decimal,
    pub satisfied: bool,
    pub dry_run: bool,
}

impl ConsumptionTrace {
    fn empty(item_id: &str, unit: &str, requested: Decimal, dry_run: bool) -> Self {
        Self {
            item_id: item_id.to_string(),
            unit: unit.to_string(),
            requested,
            consumed: Decimal::ZERO,
            draws: Vec::new(),
            total_cost: Decimal::ZERO,
            satisfied: true,
            dry_run,
        }
    }

    /// 短缺數量
    pub fn shortfall(&self) -> Decimal {
        (self.requested - self.consumed).max(Decimal::ZERO)
    }
}

/// 可用量查詢結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub satisfied: bool,
    pub available: Decimal,
}

/// FIFO 庫存帳
pub struct FifoLedger<'a> {
    converter: &'a UnitConverter,
}

impl<'a> FifoLedger<'a> {
    /// 創建新的庫存帳
    pub fn new(converter: &'a UnitConverter) -> Self {
        Self { converter }
    }

    /// 收貨：建立新批次
    pub fn receive<W: UnitOfWork + ?Sized>(
        &self,
        tx: &mut W,
        item_id: &str,
        quantity: Decimal,
        unit: &str,
        cost_per_unit: Decimal,
        received_at: DateTime<Utc>,
    ) -> prodplan_core::Result<InventoryLot> {
        let lot = InventoryLot::new(
            item_id.to_string(),
            quantity,
            unit.to_string(),
            cost_per_unit,
            received_at,
        )?;
        tx.insert_lot(lot.clone())?;

        tracing::debug!("收貨: {} {} {} @ {}", item_id, quantity, unit, cost_per_unit);
        Ok(lot)
    }

    /// 依 FIFO 順序取得尚有剩餘的批次
    pub fn ordered_lots<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        item_id: &str,
    ) -> prodplan_core::Result<Vec<InventoryLot>> {
        let mut lots: Vec<InventoryLot> = store
            .lots_for_item(item_id)?
            .into_iter()
            .filter(|lot| !lot.is_exhausted())
            .collect();
        lots.sort_by_key(|lot| lot.fifo_key());
        Ok(lots)
    }

    /// 以請求單位計算現有可用量
    ///
    /// 無法換算單位的批次視為 0，不會被當成相同單位。
    pub fn available<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        item_id: &str,
        unit: &str,
    ) -> prodplan_core::Result<Decimal> {
        let mut total = Decimal::ZERO;
        for lot in self.ordered_lots(store, item_id)? {
            match self.converter.convert(lot.quantity_remaining, &lot.unit, unit, item_id) {
                Ok(qty) => total += qty,
                Err(PlanError::IncompatibleUnits { .. }) => {
                    tracing::warn!(
                        "物料 {} 批次 {} 單位 {} 無法換算為 {}，視為不可用",
                        item_id,
                        lot.id,
                        lot.unit,
                        unit
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// 查詢可用量（不修改任何資料）
    pub fn check_availability<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        item_id: &str,
        quantity: Decimal,
        unit: &str,
    ) -> prodplan_core::Result<Availability> {
        let available = self.available(store, item_id, unit)?;
        Ok(Availability {
            satisfied: available >= quantity,
            available,
        })
    }

    /// 模擬扣料（唯讀），庫存不足時返回 `satisfied = false` 的部分軌跡
    pub fn trace<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        item_id: &str,
        quantity: Decimal,
        unit: &str,
    ) -> prodplan_core::Result<ConsumptionTrace> {
        self.build_trace(store, item_id, quantity, unit, true)
    }

    /// 扣料
    ///
    /// - `dry_run = true`: 不修改批次，庫存不足時返回部分軌跡
    /// - `dry_run = false`: 庫存不足時返回錯誤且不寫入任何批次
    pub fn consume<W: UnitOfWork + ?Sized>(
        &self,
        tx: &mut W,
        item_id: &str,
        quantity: Decimal,
        unit: &str,
        dry_run: bool,
    ) -> prodplan_core::Result<ConsumptionTrace> {
        let trace = self.build_trace(&*tx, item_id, quantity, unit, dry_run)?;

        if dry_run {
            return Ok(trace);
        }

        if !trace.satisfied {
            return Err(PlanError::insufficient(item_id, unit, quantity, trace.consumed));
        }

        for draw in &trace.draws {
            tx.update_lot_remaining(draw.lot_id, draw.remaining_after)?;
        }

        tracing::debug!(
            "扣料: {} {} {}，批次 {} 個，成本 {}",
            item_id,
            quantity,
            unit,
            trace.draws.len(),
            trace.total_cost
        );

        Ok(trace)
    }

    fn build_trace<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        item_id: &str,
        quantity: Decimal,
        unit: &str,
        dry_run: bool,
    ) -> prodplan_core::Result<ConsumptionTrace> {
        if quantity < Decimal::ZERO {
            return Err(PlanError::invalid_quantity("consume quantity", quantity));
        }

        let mut trace = ConsumptionTrace::empty(item_id, unit, quantity, dry_run);
        if quantity.is_zero() {
            return Ok(trace);
        }

        let mut still_needed = quantity;

        for lot in self.ordered_lots(store, item_id)? {
            if still_needed <= Decimal::ZERO {
                break;
            }

            // 以請求單位表示的批次剩餘量
            let lot_available =
                match self.converter.convert(lot.quantity_remaining, &lot.unit, unit, item_id) {
                    Ok(qty) => qty,
                    Err(PlanError::IncompatibleUnits { .. }) => {
                        tracing::warn!(
                            "物料 {} 批次 {} 單位 {} 無法換算為 {}，跳過",
                            item_id,
                            lot.id,
                            lot.unit,
                            unit
                        );
                        continue;
                    }
                    Err(e) => return Err(e),
                };

            let draw_qty = if lot_available >= still_needed {
                let in_lot_unit = self.converter.convert(still_needed, unit, &lot.unit, item_id)?;
                let drawn = in_lot_unit.min(lot.quantity_remaining);
                // 換算捨入超出批次剩餘量的部分轉給下一個批次
                still_needed = self
                    .converter
                    .convert(in_lot_unit - drawn, &lot.unit, unit, item_id)?;
                drawn
            } else {
                still_needed -= lot_available;
                lot.quantity_remaining
            };

            let cost = draw_qty * lot.cost_per_unit;
            trace.draws.push(LotDraw {
                lot_id: lot.id,
                quantity: draw_qty,
                unit: lot.unit.clone(),
                cost_per_unit: lot.cost_per_unit,
                cost,
                remaining_after: lot.quantity_remaining - draw_qty,
            });
            trace.total_cost += cost;
        }

        trace.consumed = quantity - still_needed.max(Decimal::ZERO);
        trace.satisfied = still_needed <= Decimal::ZERO;
        Ok(trace)
    }
}
