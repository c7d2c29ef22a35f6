//! # Production Planning
//!
//! 小批量生產與組裝的計劃、FIFO 成本與進度引擎。
//!
//! 所有寫入操作都在呼叫端傳入的交易內執行，引擎本身不開啟或提交交易。

pub use prodplan_cache::{PlanCache, StaleReason, StalenessVerdict};
pub use prodplan_calc::{
    AssemblyRequest, ConsumptionTrace, GapReport, PlanLine, ProductionPlan, ProductionRequest,
};
pub use prodplan_core::{
    AssemblyEvent, Bundle, Catalog, EngineConfig, EntityRef, InventoryLot, InventoryRead,
    MemoryCatalog, MemoryStore, PlanError, ProductionEvent, Recipe, Target, UnitConverter,
    UnitOfWork,
};
pub use prodplan_report::{ProgressReport, ProgressStatus};

use chrono::{DateTime, Utc};
use prodplan_calc::{AssemblyRecorder, FifoLedger, PlanCalculator, ProductionRecorder};
use prodplan_report::ProgressEvaluator;
use rust_decimal::Decimal;
use uuid::Uuid;

/// 計劃引擎：目錄、單位換算、配置與計劃快取的組合入口
pub struct PlanningEngine<C: Catalog> {
    catalog: C,
    converter: UnitConverter,
    config: EngineConfig,
    cache: PlanCache,
}

impl<C: Catalog> PlanningEngine<C> {
    pub fn new(catalog: C, converter: UnitConverter, config: EngineConfig) -> Self {
        Self {
            catalog,
            converter,
            config,
            cache: PlanCache::new(),
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// 修改目錄（之後的過期判斷會看到新的修改時間）
    pub fn catalog_mut(&mut self) -> &mut C {
        &mut self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &PlanCache {
        &self.cache
    }

    /// 收貨：建立新批次
    pub fn receive_lot<W: UnitOfWork + ?Sized>(
        &self,
        tx: &mut W,
        item_id: &str,
        quantity: Decimal,
        unit: &str,
        cost_per_unit: Decimal,
        received_at: DateTime<Utc>,
    ) -> prodplan_core::Result<InventoryLot> {
        FifoLedger::new(&self.converter).receive(tx, item_id, quantity, unit, cost_per_unit, received_at)
    }

    /// 模擬扣料（唯讀）
    pub fn check_consumption<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        item_id: &str,
        quantity: Decimal,
        unit: &str,
    ) -> prodplan_core::Result<ConsumptionTrace> {
        FifoLedger::new(&self.converter).trace(store, item_id, quantity, unit)
    }

    /// 計算生產計劃並存入快取
    pub fn calculate_plan<R: InventoryRead + ?Sized>(
        &mut self,
        store: &R,
        targets: &[Target],
    ) -> prodplan_core::Result<ProductionPlan> {
        let plan = PlanCalculator::new(&self.catalog, &self.converter, &self.config)
            .calculate(store, targets)?;
        self.cache.store(plan.clone());
        Ok(plan)
    }

    /// 紀錄一次批次生產
    pub fn record_production<W: UnitOfWork + ?Sized>(
        &self,
        tx: &mut W,
        request: &ProductionRequest,
    ) -> prodplan_core::Result<ProductionEvent> {
        ProductionRecorder::new(&self.catalog, &self.converter, &self.config).record(tx, request)
    }

    /// 紀錄一次組裝
    pub fn record_assembly<W: UnitOfWork + ?Sized>(
        &self,
        tx: &mut W,
        request: &AssemblyRequest,
    ) -> prodplan_core::Result<AssemblyEvent> {
        AssemblyRecorder::new(&self.catalog, &self.converter, &self.config).record(tx, request)
    }

    /// 判斷快取中的計劃是否過期（僅供提示）
    pub fn check_staleness(&self, plan_id: Uuid) -> prodplan_cache::Result<StalenessVerdict> {
        self.cache.check_staleness(plan_id, &self.catalog)
    }

    /// 明確標記實體為髒
    pub fn mark_dirty(&mut self, entity: EntityRef) {
        self.cache.mark_dirty(entity);
    }
}

impl<C: Catalog + Sync> PlanningEngine<C> {
    /// 目標進度報表
    pub fn evaluate_progress<R: InventoryRead + Sync + ?Sized>(
        &self,
        store: &R,
        targets: &[Target],
    ) -> prodplan_core::Result<ProgressReport> {
        ProgressEvaluator::new(&self.catalog, &self.converter, &self.config).evaluate(store, targets)
    }
}
