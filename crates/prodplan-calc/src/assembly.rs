//! 成品組裝紀錄
//!
//! 與生產紀錄相同的流程：組合快照 → 展開 → 扣成品（整數）與包材（FIFO）→ 組合入庫 → 寫入事件。
//! 已組裝好的子組合庫存優先取用，不足的部分才展開到配方成品。

use chrono::{DateTime, Utc};
use prodplan_core::event::summarize_cost;
use prodplan_core::{
    AssemblyEvent, BundleSnapshot, Catalog, ConfigurationError, ConsumptionRecord,
    ConsumptionSource, EngineConfig, EventKind, InventoryRead, PlanError, TargetKind,
    UnitConverter, UnitOfWork,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregation::{Expansion, RequirementAggregator};
use crate::atomic::atomically;
use crate::fifo::FifoLedger;

/// 組裝請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyRequest {
    pub bundle_id: String,
    pub quantity: u64,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl AssemblyRequest {
    pub fn new(bundle_id: &str, quantity: u64) -> Self {
        Self {
            bundle_id: bundle_id.to_string(),
            quantity,
            recorded_at: None,
        }
    }

    /// 建構器模式：設置紀錄時間
    pub fn with_recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }
}

/// 組裝紀錄器
pub struct AssemblyRecorder<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    converter: &'a UnitConverter,
    config: &'a EngineConfig,
}

impl<'a, C: Catalog + ?Sized> AssemblyRecorder<'a, C> {
    pub fn new(catalog: &'a C, converter: &'a UnitConverter, config: &'a EngineConfig) -> Self {
        Self {
            catalog,
            converter,
            config,
        }
    }

    /// 紀錄一次組裝（在呼叫端的交易內執行）
    pub fn record<W: UnitOfWork + ?Sized>(
        &self,
        tx: &mut W,
        request: &AssemblyRequest,
    ) -> prodplan_core::Result<AssemblyEvent> {
        if request.quantity == 0 {
            return Err(PlanError::invalid_quantity("assembly quantity", Decimal::ZERO));
        }

        let bundle = self.catalog.require_bundle(&request.bundle_id)?;
        let recorded_at = request.recorded_at.unwrap_or_else(Utc::now);

        tracing::info!("紀錄組裝：組合 {} × {}", bundle.id, request.quantity);

        atomically(tx, "紀錄組裝", |tx| {
            // 快照先於任何扣料，展開只讀快照
            let snapshot = BundleSnapshot::capture(self.catalog, &bundle, recorded_at);
            tx.insert_bundle_snapshot(snapshot.clone())?;

            let mut expansion = Expansion::default();
            RequirementAggregator::new(&snapshot, self.config).expand_from_stock(
                &*tx,
                &TargetKind::Bundle(bundle.id.clone()),
                Decimal::from(request.quantity),
                &mut expansion,
            )?;

            let event_id = Uuid::new_v4();
            let mut consumptions = Vec::new();

            // 已組裝子組合與已生產成品：整數扣減，以平均成本計價
            for (sub_id, units) in &expansion.stocked {
                let whole = whole_units(&bundle.id, sub_id, *units)?;
                consumptions.push(issue_finished(tx, event_id, sub_id, whole, recorded_at)?);
            }
            for (recipe_id, units) in &expansion.units {
                let whole = whole_units(&bundle.id, recipe_id, *units)?;
                consumptions.push(issue_finished(tx, event_id, recipe_id, whole, recorded_at)?);
            }

            // 包材：FIFO
            let ledger = FifoLedger::new(self.converter);
            for line in expansion.packaging.lines() {
                let trace = ledger.consume(tx, &line.item_id, line.quantity, &line.unit, false)?;
                for draw in trace.draws {
                    consumptions.push(ConsumptionRecord::new(
                        event_id,
                        EventKind::Assembly,
                        ConsumptionSource::Lot(draw.lot_id),
                        line.item_id.clone(),
                        draw.quantity,
                        draw.unit,
                        draw.cost_per_unit,
                        recorded_at,
                    ));
                }
            }

            let (total_cost, per_unit_cost) =
                summarize_cost(&consumptions, request.quantity, self.config.cost_scale);

            let mut assembled = tx.finished_goods(&bundle.id)?;
            assembled.receive(request.quantity, total_cost);
            tx.save_finished_goods(assembled)?;

            let event = AssemblyEvent {
                id: event_id,
                bundle_id: bundle.id.clone(),
                snapshot_id: snapshot.id,
                quantity: request.quantity,
                total_cost,
                per_unit_cost,
                recorded_at,
                consumptions,
            };
            tx.insert_assembly_event(event.clone())?;

            tracing::info!(
                "組裝完成：事件 {}，總成本 {}，單位成本 {:?}",
                event.id,
                event.total_cost,
                event.per_unit_cost
            );
            Ok(event)
        })
    }
}

fn issue_finished<W: UnitOfWork + ?Sized>(
    tx: &mut W,
    event_id: Uuid,
    product_id: &str,
    units: u64,
    recorded_at: DateTime<Utc>,
) -> prodplan_core::Result<ConsumptionRecord> {
    let mut goods = tx.finished_goods(product_id)?;
    let cost = goods.issue(units)?;
    tx.save_finished_goods(goods)?;

    let mut record = ConsumptionRecord::new(
        event_id,
        EventKind::Assembly,
        ConsumptionSource::FinishedGoods(product_id.to_string()),
        product_id.to_string(),
        Decimal::from(units),
        "each".to_string(),
        cost / Decimal::from(units),
        recorded_at,
    );
    record.total_cost = cost;
    Ok(record)
}

/// 成品用量必須為整數
fn whole_units(bundle_id: &str, recipe_id: &str, units: Decimal) -> prodplan_core::Result<u64> {
    if !units.fract().is_zero() {
        return Err(ConfigurationError::FractionalUnitQuantity {
            bundle: bundle_id.to_string(),
            recipe: recipe_id.to_string(),
            quantity: units,
        }
        .into());
    }
    units
        .to_u64()
        .ok_or_else(|| PlanError::invalid_quantity("finished units", units))
}
