//! 生產/組裝事件與耗用紀錄

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 事件類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// 批次生產
    Production,
    /// 成品組裝
    Assembly,
}

/// 耗用來源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumptionSource {
    /// 原料/包材批次
    Lot(Uuid),
    /// 成品庫存（不分批次）
    FinishedGoods(String),
}

/// 耗用紀錄（寫入後不可變）
///
/// 成本於扣料當下自批次複製，之後不再重新計算。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub event_kind: EventKind,
    pub source: ConsumptionSource,
    pub item_id: String,
    pub quantity: Decimal,
    pub unit: String,
    pub cost_per_unit: Decimal,
    pub total_cost: Decimal,
    pub consumed_at: DateTime<Utc>,
}

impl ConsumptionRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        event_kind: EventKind,
        source: ConsumptionSource,
        item_id: String,
        quantity: Decimal,
        unit: String,
        cost_per_unit: Decimal,
        consumed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            event_kind,
            source,
            item_id,
            quantity,
            unit,
            cost_per_unit,
            total_cost: quantity * cost_per_unit,
            consumed_at,
        }
    }

    /// 來源批次ID（成品庫存時為 None）
    pub fn lot_id(&self) -> Option<Uuid> {
        match self.source {
            ConsumptionSource::Lot(id) => Some(id),
            ConsumptionSource::FinishedGoods(_) => None,
        }
    }
}

/// 生產事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionEvent {
    pub id: Uuid,
    pub recipe_id: String,

    /// 對應的配方快照
    pub snapshot_id: Uuid,

    pub batches: u64,
    pub expected_yield: Decimal,

    /// 實際產量（可少於預期，例如失敗批次）
    pub actual_yield: u64,

    /// 總成本（耗用紀錄合計）
    pub total_cost: Decimal,

    /// 單位成本（實際產量為 0 時為 None）
    pub per_unit_cost: Option<Decimal>,

    pub recorded_at: DateTime<Utc>,
    pub consumptions: Vec<ConsumptionRecord>,
}

impl ProductionEvent {
    /// 產量差異（實際 - 預期）
    pub fn yield_variance(&self) -> Decimal {
        Decimal::from(self.actual_yield) - self.expected_yield
    }
}

/// 組裝事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyEvent {
    pub id: Uuid,
    pub bundle_id: String,

    /// 對應的組合快照
    pub snapshot_id: Uuid,

    pub quantity: u64,
    pub total_cost: Decimal,
    pub per_unit_cost: Option<Decimal>,
    pub recorded_at: DateTime<Utc>,
    pub consumptions: Vec<ConsumptionRecord>,
}

/// 由耗用紀錄計算總成本與單位成本
pub fn summarize_cost(
    consumptions: &[ConsumptionRecord],
    output_units: u64,
    cost_scale: u32,
) -> (Decimal, Option<Decimal>) {
    let total: Decimal = consumptions.iter().map(|c| c.total_cost).sum();
    let per_unit = if output_units == 0 {
        None
    } else {
        Some((total / Decimal::from(output_units)).round_dp(cost_scale))
    };
    (total, per_unit)
}
