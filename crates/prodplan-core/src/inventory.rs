//! 庫存模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{PlanError, Result};

/// 庫存批次（一次收貨）
///
/// `quantity_remaining` 只會遞減，且永遠介於 0 與 `quantity_received` 之間。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLot {
    /// 批次ID
    pub id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 收貨數量
    pub quantity_received: Decimal,

    /// 剩餘數量
    pub quantity_remaining: Decimal,

    /// 計量單位
    pub unit: String,

    /// 收貨時單位成本（不可變）
    pub cost_per_unit: Decimal,

    /// 收貨時間（FIFO 排序鍵）
    pub received_at: DateTime<Utc>,
}

impl InventoryLot {
    /// 創建新的收貨批次
    pub fn new(
        item_id: String,
        quantity: Decimal,
        unit: String,
        cost_per_unit: Decimal,
        received_at: DateTime<Utc>,
    ) -> Result<Self> {
        if quantity <= Decimal::ZERO {
            return Err(PlanError::invalid_quantity("quantity_received", quantity));
        }
        if cost_per_unit < Decimal::ZERO {
            return Err(PlanError::invalid_quantity("cost_per_unit", cost_per_unit));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            item_id,
            quantity_received: quantity,
            quantity_remaining: quantity,
            unit,
            cost_per_unit,
            received_at,
        })
    }

    /// 建構器模式：指定批次ID
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// FIFO 排序鍵：收貨時間，同時間以批次ID決勝
    pub fn fifo_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.received_at, self.id)
    }

    /// 是否已耗盡
    pub fn is_exhausted(&self) -> bool {
        self.quantity_remaining <= Decimal::ZERO
    }

    /// 已消耗數量
    pub fn quantity_consumed(&self) -> Decimal {
        self.quantity_received - self.quantity_remaining
    }

    /// 扣減剩餘數量
    pub fn draw(&mut self, quantity: Decimal) -> Result<()> {
        if quantity < Decimal::ZERO {
            return Err(PlanError::invalid_quantity("draw", quantity));
        }
        if quantity > self.quantity_remaining {
            return Err(PlanError::insufficient(
                &self.item_id,
                &self.unit,
                quantity,
                self.quantity_remaining,
            ));
        }
        self.quantity_remaining -= quantity;
        Ok(())
    }
}

/// 成品庫存（可互換、不分批次，以移動平均計價）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedGoods {
    /// 配方或組合ID
    pub product_id: String,

    /// 現有數量
    pub on_hand: u64,

    /// 帳面價值
    pub carrying_value: Decimal,
}

impl FinishedGoods {
    /// 創建空的成品庫存
    pub fn empty(product_id: String) -> Self {
        Self {
            product_id,
            on_hand: 0,
            carrying_value: Decimal::ZERO,
        }
    }

    /// 平均單位成本
    pub fn average_cost(&self) -> Decimal {
        if self.on_hand == 0 {
            Decimal::ZERO
        } else {
            self.carrying_value / Decimal::from(self.on_hand)
        }
    }

    /// 入庫
    pub fn receive(&mut self, units: u64, value: Decimal) {
        self.on_hand += units;
        self.carrying_value += value;
    }

    /// 出庫，返回出庫成本
    pub fn issue(&mut self, units: u64) -> Result<Decimal> {
        if units > self.on_hand {
            return Err(PlanError::insufficient(
                &self.product_id,
                "each",
                Decimal::from(units),
                Decimal::from(self.on_hand),
            ));
        }

        let cost = if units == self.on_hand {
            self.carrying_value
        } else {
            self.average_cost() * Decimal::from(units)
        };

        self.on_hand -= units;
        self.carrying_value -= cost;
        Ok(cost)
    }
}
