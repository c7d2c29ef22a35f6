//! 批次生產紀錄
//!
//! 嚴格依序：驗證 → 配方快照 → 由快照展開原料 → FIFO 扣料 → 成品入庫 → 寫入事件。
//! 快照必須在扣料之前建立；任何一步失敗都會回滾整個操作。

use chrono::{DateTime, Utc};
use prodplan_core::event::summarize_cost;
use prodplan_core::{
    Catalog, ConsumptionRecord, ConsumptionSource, EngineConfig, EventKind, InventoryRead,
    PlanError, ProductionEvent, RecipeSnapshot, UnitConverter, UnitOfWork,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregation::Requirements;
use crate::atomic::atomically;
use crate::fifo::FifoLedger;

/// 生產請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRequest {
    pub recipe_id: String,
    pub batches: u64,
    /// 實際產量（可少於預期）
    pub actual_yield: u64,
    pub scale_factor: Decimal,
    /// 產量配置名稱（None 使用標準配置）
    pub yield_label: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl ProductionRequest {
    pub fn new(recipe_id: &str, batches: u64, actual_yield: u64) -> Self {
        Self {
            recipe_id: recipe_id.to_string(),
            batches,
            actual_yield,
            scale_factor: Decimal::ONE,
            yield_label: None,
            recorded_at: None,
        }
    }

    /// 建構器模式：設置縮放倍數
    pub fn with_scale_factor(mut self, scale_factor: Decimal) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// 建構器模式：指定產量配置
    pub fn with_yield_label(mut self, label: &str) -> Self {
        self.yield_label = Some(label.to_string());
        self
    }

    /// 建構器模式：設置紀錄時間
    pub fn with_recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }
}

/// 生產紀錄器
pub struct ProductionRecorder<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    converter: &'a UnitConverter,
    config: &'a EngineConfig,
}

impl<'a, C: Catalog + ?Sized> ProductionRecorder<'a, C> {
    pub fn new(catalog: &'a C, converter: &'a UnitConverter, config: &'a EngineConfig) -> Self {
        Self {
            catalog,
            converter,
            config,
        }
    }

    /// 紀錄一次批次生產（在呼叫端的交易內執行）
    pub fn record<W: UnitOfWork + ?Sized>(
        &self,
        tx: &mut W,
        request: &ProductionRequest,
    ) -> prodplan_core::Result<ProductionEvent> {
        // Phase 1: 驗證（無副作用）
        if request.batches == 0 {
            return Err(PlanError::invalid_quantity("batches", Decimal::ZERO));
        }
        if request.scale_factor <= Decimal::ZERO {
            return Err(PlanError::invalid_quantity("scale_factor", request.scale_factor));
        }

        let recipe = self.catalog.require_recipe(&request.recipe_id)?;
        let yield_config = match &request.yield_label {
            Some(label) => recipe
                .yield_configs
                .iter()
                .find(|c| &c.label == label)
                .ok_or_else(|| PlanError::NotFound {
                    kind: "產量配置",
                    id: format!("{}:{}", recipe.id, label),
                })?,
            None => recipe.primary_yield()?,
        };
        recipe.validate_yield(yield_config)?;

        let recorded_at = request.recorded_at.unwrap_or_else(Utc::now);

        tracing::info!(
            "紀錄生產：配方 {}，{} 批，實際產量 {}",
            recipe.id,
            request.batches,
            request.actual_yield
        );

        atomically(tx, "紀錄生產", |tx| {
            // Phase 2: 快照先於任何扣料
            let snapshot =
                RecipeSnapshot::capture(&recipe, yield_config, request.scale_factor, recorded_at);
            tx.insert_recipe_snapshot(snapshot.clone())?;

            // Phase 3: 由快照（而非現行配方）展開原料
            let mut requirements = Requirements::new();
            for ingredient in snapshot.requirements_for(request.batches) {
                requirements.add(&ingredient.item_id, &ingredient.unit, ingredient.quantity);
            }

            // Phase 4: FIFO 扣料
            let event_id = Uuid::new_v4();
            let ledger = FifoLedger::new(self.converter);
            let mut consumptions = Vec::new();
            for line in requirements.lines() {
                let trace = ledger.consume(tx, &line.item_id, line.quantity, &line.unit, false)?;
                for draw in trace.draws {
                    consumptions.push(ConsumptionRecord::new(
                        event_id,
                        EventKind::Production,
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
                summarize_cost(&consumptions, request.actual_yield, self.config.cost_scale);

            // Phase 5: 成品入庫
            if request.actual_yield > 0 {
                let mut goods = tx.finished_goods(&recipe.id)?;
                goods.receive(request.actual_yield, total_cost);
                tx.save_finished_goods(goods)?;
            } else {
                tracing::warn!("配方 {} 本次生產實際產量為 0，成本 {} 不入庫", recipe.id, total_cost);
            }

            // Phase 6: 寫入事件
            let event = ProductionEvent {
                id: event_id,
                recipe_id: recipe.id.clone(),
                snapshot_id: snapshot.id,
                batches: request.batches,
                expected_yield: snapshot.expected_yield(request.batches),
                actual_yield: request.actual_yield,
                total_cost,
                per_unit_cost,
                recorded_at,
                consumptions,
            };
            tx.insert_production_event(event.clone())?;

            tracing::info!(
                "生產完成：事件 {}，總成本 {}，單位成本 {:?}",
                event.id,
                event.total_cost,
                event.per_unit_cost
            );
            Ok(event)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use prodplan_core::{MemoryCatalog, MemoryStore, MemoryTransaction, Recipe, YieldConfig};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, day, 9, 0, 0).unwrap()
    }

    fn setup() -> (MemoryCatalog, UnitConverter, EngineConfig, MemoryStore, MemoryTransaction) {
        let mut catalog = MemoryCatalog::new();
        catalog.upsert_recipe(
            Recipe::new("COOKIE", "Sugar Cookie")
                .with_yield(Decimal::from(48))
                .with_yield_config(YieldConfig::new("half", Decimal::from(24), Decimal::new(5, 1)))
                .with_ingredient("FLOUR", Decimal::from(500), "g")
                .with_ingredient("SUGAR", Decimal::from(200), "g"),
        );

        let converter = UnitConverter::new();
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let ledger = FifoLedger::new(&converter);
        ledger
            .receive(&mut tx, "FLOUR", Decimal::from(1), "kg", Decimal::from(3), at(1))
            .unwrap();
        ledger
            .receive(&mut tx, "SUGAR", Decimal::from(300), "g", Decimal::new(1, 2), at(1))
            .unwrap();

        (catalog, converter, EngineConfig::default(), store, tx)
    }

    fn remaining(tx: &MemoryTransaction, item: &str) -> Decimal {
        tx.lots_for_item(item)
            .unwrap()
            .iter()
            .map(|l| l.quantity_remaining)
            .sum()
    }

    #[test]
    fn test_record_production() {
        let (catalog, converter, config, _store, mut tx) = setup();
        let recorder = ProductionRecorder::new(&catalog, &converter, &config);

        let event = recorder
            .record(&mut tx, &ProductionRequest::new("COOKIE", 1, 48))
            .unwrap();

        // 0.5 kg × 3 + 200 g × 0.01
        assert_eq!(event.total_cost, Decimal::new(35, 1));
        assert_eq!(event.per_unit_cost, Some(Decimal::new(729, 4)));
        assert_eq!(event.expected_yield, Decimal::from(48));
        assert_eq!(event.consumptions.len(), 2);
        assert_eq!(remaining(&tx, "FLOUR"), Decimal::new(5, 1));
        assert_eq!(remaining(&tx, "SUGAR"), Decimal::from(100));

        let goods = tx.finished_goods("COOKIE").unwrap();
        assert_eq!(goods.on_hand, 48);
        assert_eq!(goods.carrying_value, Decimal::new(35, 1));

        let snapshot = tx.recipe_snapshot(event.snapshot_id).unwrap().unwrap();
        assert_eq!(snapshot.recipe_id, "COOKIE");
        assert_eq!(tx.production_events("COOKIE").unwrap().len(), 1);
    }

    #[test]
    fn test_insufficient_rolls_back_everything() {
        let (catalog, converter, config, _store, mut tx) = setup();
        let recorder = ProductionRecorder::new(&catalog, &converter, &config);

        // 2 批需要 400 g 糖，只有 300 g；麵粉（排序在前）會先被扣光
        let err = recorder
            .record(&mut tx, &ProductionRequest::new("COOKIE", 2, 96))
            .unwrap_err();

        assert!(matches!(err, PlanError::InsufficientInventory { .. }));
        assert_eq!(remaining(&tx, "FLOUR"), Decimal::ONE);
        assert_eq!(remaining(&tx, "SUGAR"), Decimal::from(300));
        assert!(tx.production_events("COOKIE").unwrap().is_empty());
        assert_eq!(tx.finished_goods("COOKIE").unwrap().on_hand, 0);
    }

    #[test]
    fn test_under_yield_is_recorded() {
        let (catalog, converter, config, _store, mut tx) = setup();
        let recorder = ProductionRecorder::new(&catalog, &converter, &config);

        let event = recorder
            .record(&mut tx, &ProductionRequest::new("COOKIE", 1, 40))
            .unwrap();
        assert_eq!(event.yield_variance(), Decimal::from(-8));

        let failed = recorder
            .record(
                &mut tx,
                &ProductionRequest::new("COOKIE", 1, 0).with_yield_label("half"),
            )
            .unwrap();
        assert_eq!(failed.actual_yield, 0);
        assert_eq!(failed.per_unit_cost, None);
        assert_eq!(tx.finished_goods("COOKIE").unwrap().on_hand, 40);
    }

    #[test]
    fn test_scale_factor_and_yield_label() {
        let (catalog, converter, config, _store, mut tx) = setup();
        let recorder = ProductionRecorder::new(&catalog, &converter, &config);

        // half 配置 × 1.5：每批麵粉 500 × 0.5 × 1.5 = 375 g
        let event = recorder
            .record(
                &mut tx,
                &ProductionRequest::new("COOKIE", 2, 36)
                    .with_yield_label("half")
                    .with_scale_factor(Decimal::new(15, 1)),
            )
            .unwrap();

        assert_eq!(event.expected_yield, Decimal::from(72));
        assert_eq!(remaining(&tx, "FLOUR"), Decimal::new(25, 2));
    }

    #[test]
    fn test_boundary_validation() {
        let (catalog, converter, config, _store, mut tx) = setup();
        let recorder = ProductionRecorder::new(&catalog, &converter, &config);

        assert!(matches!(
            recorder.record(&mut tx, &ProductionRequest::new("COOKIE", 0, 10)),
            Err(PlanError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            recorder.record(
                &mut tx,
                &ProductionRequest::new("COOKIE", 1, 10).with_scale_factor(Decimal::ZERO)
            ),
            Err(PlanError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            recorder.record(&mut tx, &ProductionRequest::new("NOPE", 1, 10)),
            Err(PlanError::NotFound { .. })
        ));
        assert!(matches!(
            recorder.record(
                &mut tx,
                &ProductionRequest::new("COOKIE", 1, 10).with_yield_label("jumbo")
            ),
            Err(PlanError::NotFound { .. })
        ));
    }
}
