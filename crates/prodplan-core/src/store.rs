//! 持久層介面與記憶體實作
//!
//! 核心從不自行開啟或提交交易：呼叫端傳入交易（unit of work），
//! 核心只在其上讀寫，並以保存點保證單一操作全有或全無。

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::event::{AssemblyEvent, ProductionEvent};
use crate::inventory::{FinishedGoods, InventoryLot};
use crate::snapshot::{BundleSnapshot, RecipeSnapshot};
use crate::{PlanError, Result};

/// 保存點標記
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(pub usize);

/// 唯讀視圖（單一一致快照）
pub trait InventoryRead {
    /// 物料的所有批次（順序不保證）
    fn lots_for_item(&self, item_id: &str) -> Result<Vec<InventoryLot>>;

    /// 成品庫存（不存在時返回空庫存）
    fn finished_goods(&self, product_id: &str) -> Result<FinishedGoods>;

    /// 配方的生產事件
    fn production_events(&self, recipe_id: &str) -> Result<Vec<ProductionEvent>>;

    /// 組合的組裝事件
    fn assembly_events(&self, bundle_id: &str) -> Result<Vec<AssemblyEvent>>;

    /// 查詢配方快照
    fn recipe_snapshot(&self, id: Uuid) -> Result<Option<RecipeSnapshot>>;

    /// 查詢組合快照
    fn bundle_snapshot(&self, id: Uuid) -> Result<Option<BundleSnapshot>>;
}

/// 可寫交易
pub trait UnitOfWork: InventoryRead {
    /// 建立保存點
    fn savepoint(&mut self) -> Result<Savepoint>;

    /// 回滾至保存點（保存點之後的寫入全部捨棄）
    fn rollback_to(&mut self, savepoint: Savepoint) -> Result<()>;

    /// 釋放保存點（保留寫入）
    fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<()>;

    /// 新增收貨批次
    fn insert_lot(&mut self, lot: InventoryLot) -> Result<()>;

    /// 更新批次剩餘數量（只能遞減）
    fn update_lot_remaining(&mut self, lot_id: Uuid, remaining: Decimal) -> Result<()>;

    /// 保存成品庫存
    fn save_finished_goods(&mut self, goods: FinishedGoods) -> Result<()>;

    /// 寫入配方快照（只寫一次）
    fn insert_recipe_snapshot(&mut self, snapshot: RecipeSnapshot) -> Result<()>;

    /// 寫入組合快照（只寫一次）
    fn insert_bundle_snapshot(&mut self, snapshot: BundleSnapshot) -> Result<()>;

    /// 寫入生產事件（含耗用紀錄）
    fn insert_production_event(&mut self, event: ProductionEvent) -> Result<()>;

    /// 寫入組裝事件（含耗用紀錄）
    fn insert_assembly_event(&mut self, event: AssemblyEvent) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    lots: HashMap<Uuid, InventoryLot>,
    finished: HashMap<String, FinishedGoods>,
    recipe_snapshots: HashMap<Uuid, RecipeSnapshot>,
    bundle_snapshots: HashMap<Uuid, BundleSnapshot>,
    production_events: Vec<ProductionEvent>,
    assembly_events: Vec<AssemblyEvent>,
}

/// 記憶體持久層
///
/// 用於測試與示例。`begin` 複製整份狀態（快照隔離），`commit` 以版本號檢查衝突後整體替換。
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<(u64, MemoryState)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 開啟交易
    pub fn begin(&self) -> Result<MemoryTransaction> {
        let guard = self
            .inner
            .read()
            .map_err(|_| PlanError::Storage("lock poisoned".to_string()))?;

        Ok(MemoryTransaction {
            base_version: guard.0,
            state: guard.1.clone(),
            savepoints: Vec::new(),
        })
    }

    /// 提交交易
    pub fn commit(&self, tx: MemoryTransaction) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| PlanError::Storage("lock poisoned".to_string()))?;

        if guard.0 != tx.base_version {
            tracing::warn!("交易衝突，放棄提交：預期版本 {}，實際版本 {}", tx.base_version, guard.0);
            return Err(PlanError::Storage(format!(
                "交易衝突：預期版本 {}，實際版本 {}",
                tx.base_version, guard.0
            )));
        }

        guard.0 += 1;
        guard.1 = tx.state;
        tracing::debug!("交易已提交，版本 {}", guard.0);
        Ok(())
    }

    /// 回滾交易（直接丟棄）
    pub fn rollback(&self, tx: MemoryTransaction) {
        drop(tx);
    }
}

/// 記憶體交易
#[derive(Debug, Clone)]
pub struct MemoryTransaction {
    base_version: u64,
    state: MemoryState,
    savepoints: Vec<MemoryState>,
}

impl InventoryRead for MemoryTransaction {
    fn lots_for_item(&self, item_id: &str) -> Result<Vec<InventoryLot>> {
        Ok(self
            .state
            .lots
            .values()
            .filter(|lot| lot.item_id == item_id)
            .cloned()
            .collect())
    }

    fn finished_goods(&self, product_id: &str) -> Result<FinishedGoods> {
        Ok(self
            .state
            .finished
            .get(product_id)
            .cloned()
            .unwrap_or_else(|| FinishedGoods::empty(product_id.to_string())))
    }

    fn production_events(&self, recipe_id: &str) -> Result<Vec<ProductionEvent>> {
        Ok(self
            .state
            .production_events
            .iter()
            .filter(|e| e.recipe_id == recipe_id)
            .cloned()
            .collect())
    }

    fn assembly_events(&self, bundle_id: &str) -> Result<Vec<AssemblyEvent>> {
        Ok(self
            .state
            .assembly_events
            .iter()
            .filter(|e| e.bundle_id == bundle_id)
            .cloned()
            .collect())
    }

    fn recipe_snapshot(&self, id: Uuid) -> Result<Option<RecipeSnapshot>> {
        Ok(self.state.recipe_snapshots.get(&id).cloned())
    }

    fn bundle_snapshot(&self, id: Uuid) -> Result<Option<BundleSnapshot>> {
        Ok(self.state.bundle_snapshots.get(&id).cloned())
    }
}

impl UnitOfWork for MemoryTransaction {
    fn savepoint(&mut self) -> Result<Savepoint> {
        self.savepoints.push(self.state.clone());
        Ok(Savepoint(self.savepoints.len() - 1))
    }

    fn rollback_to(&mut self, savepoint: Savepoint) -> Result<()> {
        if savepoint.0 >= self.savepoints.len() {
            return Err(PlanError::Storage(format!("保存點不存在: {}", savepoint.0)));
        }
        self.savepoints.truncate(savepoint.0 + 1);
        if let Some(saved) = self.savepoints.pop() {
            self.state = saved;
        }
        Ok(())
    }

    fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<()> {
        if savepoint.0 >= self.savepoints.len() {
            return Err(PlanError::Storage(format!("保存點不存在: {}", savepoint.0)));
        }
        self.savepoints.truncate(savepoint.0);
        Ok(())
    }

    fn insert_lot(&mut self, lot: InventoryLot) -> Result<()> {
        if self.state.lots.contains_key(&lot.id) {
            return Err(PlanError::Storage(format!("批次已存在: {}", lot.id)));
        }
        self.state.lots.insert(lot.id, lot);
        Ok(())
    }

    fn update_lot_remaining(&mut self, lot_id: Uuid, remaining: Decimal) -> Result<()> {
        let lot = self
            .state
            .lots
            .get_mut(&lot_id)
            .ok_or_else(|| PlanError::NotFound {
                kind: "批次",
                id: lot_id.to_string(),
            })?;

        if remaining < Decimal::ZERO || remaining > lot.quantity_remaining {
            return Err(PlanError::Storage(format!(
                "批次 {} 剩餘數量只能遞減：{} → {}",
                lot_id, lot.quantity_remaining, remaining
            )));
        }

        lot.quantity_remaining = remaining;
        Ok(())
    }

    fn save_finished_goods(&mut self, goods: FinishedGoods) -> Result<()> {
        self.state.finished.insert(goods.product_id.clone(), goods);
        Ok(())
    }

    fn insert_recipe_snapshot(&mut self, snapshot: RecipeSnapshot) -> Result<()> {
        if self.state.recipe_snapshots.contains_key(&snapshot.id) {
            return Err(PlanError::Storage(format!("快照不可覆寫: {}", snapshot.id)));
        }
        self.state.recipe_snapshots.insert(snapshot.id, snapshot);
        Ok(())
    }

    fn insert_bundle_snapshot(&mut self, snapshot: BundleSnapshot) -> Result<()> {
        if self.state.bundle_snapshots.contains_key(&snapshot.id) {
            return Err(PlanError::Storage(format!("快照不可覆寫: {}", snapshot.id)));
        }
        self.state.bundle_snapshots.insert(snapshot.id, snapshot);
        Ok(())
    }

    fn insert_production_event(&mut self, event: ProductionEvent) -> Result<()> {
        self.state.production_events.push(event);
        Ok(())
    }

    fn insert_assembly_event(&mut self, event: AssemblyEvent) -> Result<()> {
        self.state.assembly_events.push(event);
        Ok(())
    }
}
