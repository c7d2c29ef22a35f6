//! 計劃快取與過期判斷
//!
//! 比較計劃計算時間與各參與實體的最後修改時間。時間戳比較本質上是盡力而為：
//! 修改可能恰好落在計算與比較之間，因此結果僅供提示，重新計算一律由呼叫端觸發。

use chrono::{DateTime, Utc};
use prodplan_calc::ProductionPlan;
use prodplan_core::{Catalog, EntityRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{CacheError, DirtyTracker, Result};

/// 快取中的計劃（整份替換，不作為資料來源）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub plan: ProductionPlan,
    pub cached_at: DateTime<Utc>,
}

impl PlanSnapshot {
    pub fn new(plan: ProductionPlan) -> Self {
        Self {
            plan,
            cached_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.plan.id
    }

    pub fn calculated_at(&self) -> DateTime<Utc> {
        self.plan.calculated_at
    }

    /// 計算當下的參與實體修改時間
    pub fn contributors(&self) -> &BTreeMap<EntityRef, DateTime<Utc>> {
        &self.plan.contributors
    }
}

/// 過期原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaleReason {
    /// 實體在計算之後被修改
    Modified {
        entity: EntityRef,
        modified_at: DateTime<Utc>,
    },
    /// 實體已不存在
    Removed { entity: EntityRef },
    /// 實體被明確標記為髒
    MarkedDirty {
        entity: EntityRef,
        marked_at: DateTime<Utc>,
    },
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::Modified {
                entity,
                modified_at,
            } => write!(f, "{entity} 於 {modified_at} 被修改"),
            StaleReason::Removed { entity } => write!(f, "{entity} 已刪除"),
            StaleReason::MarkedDirty { entity, marked_at } => {
                write!(f, "{entity} 於 {marked_at} 被標記為髒")
            }
        }
    }
}

/// 過期判斷結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessVerdict {
    pub stale: bool,
    pub reason: Option<StaleReason>,
}

impl StalenessVerdict {
    pub fn fresh() -> Self {
        Self {
            stale: false,
            reason: None,
        }
    }

    pub fn stale(reason: StaleReason) -> Self {
        Self {
            stale: true,
            reason: Some(reason),
        }
    }

    /// 供呼叫端顯示的原因
    pub fn reason_text(&self) -> Option<String> {
        self.reason.as_ref().map(|r| r.to_string())
    }
}

/// 計劃快取
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanCache {
    plans: BTreeMap<Uuid, PlanSnapshot>,
    dirty: DirtyTracker,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 存入計劃，同 ID 的舊快照整份替換
    pub fn store(&mut self, plan: ProductionPlan) -> Uuid {
        let snapshot = PlanSnapshot::new(plan);
        let id = snapshot.id();
        if self.plans.insert(id, snapshot).is_some() {
            tracing::debug!("替換計劃快取 {}", id);
        }
        self.prune_dirty_marks();
        id
    }

    pub fn get(&self, plan_id: Uuid) -> Option<&PlanSnapshot> {
        self.plans.get(&plan_id)
    }

    pub fn remove(&mut self, plan_id: Uuid) -> Option<PlanSnapshot> {
        let removed = self.plans.remove(&plan_id);
        self.prune_dirty_marks();
        removed
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// 明確標記實體為髒：所有依賴該實體的快取計劃都會被判定過期
    pub fn mark_dirty(&mut self, entity: EntityRef) {
        self.mark_dirty_at(entity, Utc::now());
    }

    pub fn mark_dirty_at(&mut self, entity: EntityRef, at: DateTime<Utc>) {
        let affected = self
            .plans
            .values()
            .filter(|s| s.contributors().contains_key(&entity))
            .count();
        tracing::debug!("標記 {} 為髒，影響 {} 份計劃", entity, affected);
        self.dirty.mark_dirty(entity, at);
    }

    /// 判斷計劃是否過期
    pub fn check_staleness<C: Catalog + ?Sized>(
        &self,
        plan_id: Uuid,
        catalog: &C,
    ) -> Result<StalenessVerdict> {
        let snapshot = self
            .plans
            .get(&plan_id)
            .ok_or(CacheError::UnknownPlan(plan_id))?;
        let calculated_at = snapshot.calculated_at();

        for (entity, recorded) in snapshot.contributors() {
            if self.dirty.is_dirty_since(entity, calculated_at) {
                let marked_at = self.dirty.marked_at(entity).unwrap_or(calculated_at);
                return Ok(self.verdict(plan_id, StaleReason::MarkedDirty {
                    entity: entity.clone(),
                    marked_at,
                }));
            }

            match catalog.last_modified(entity) {
                // 目錄未追蹤的目標：只有計算時紀錄的時間可比，無從判斷變更
                None if matches!(entity, EntityRef::Target(_)) => {}
                None => {
                    return Ok(self.verdict(plan_id, StaleReason::Removed {
                        entity: entity.clone(),
                    }));
                }
                Some(modified_at) if modified_at > calculated_at || modified_at > *recorded => {
                    return Ok(self.verdict(plan_id, StaleReason::Modified {
                        entity: entity.clone(),
                        modified_at,
                    }));
                }
                Some(_) => {}
            }
        }

        Ok(StalenessVerdict::fresh())
    }

    /// 所有過期計劃的 ID
    pub fn stale_plans<C: Catalog + ?Sized>(&self, catalog: &C) -> Result<Vec<Uuid>> {
        let mut stale = Vec::new();
        for id in self.plans.keys() {
            if self.check_staleness(*id, catalog)?.stale {
                stale.push(*id);
            }
        }
        Ok(stale)
    }

    /// 序列化為 JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 從 JSON 還原
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn verdict(&self, plan_id: Uuid, reason: StaleReason) -> StalenessVerdict {
        tracing::info!("計劃 {} 已過期：{}", plan_id, reason);
        StalenessVerdict::stale(reason)
    }

    /// 早於最舊快取計劃的標記已不影響任何計劃
    fn prune_dirty_marks(&mut self) {
        match self.plans.values().map(|s| s.calculated_at()).min() {
            Some(oldest) => self.dirty.prune_before(oldest),
            None => self.dirty.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use prodplan_calc::PlanCalculator;
    use prodplan_core::{
        Bundle, EngineConfig, MemoryCatalog, MemoryStore, Recipe, Target, UnitConverter,
    };
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.upsert_recipe_at(
            Recipe::new("COOKIE", "Cookie")
                .with_yield(Decimal::from(24))
                .with_ingredient("FLOUR", Decimal::from(300), "g"),
            t0(),
        );
        catalog.upsert_bundle_at(
            Bundle::new("BOX", "Box").with_unit("COOKIE", Decimal::from(12)),
            t0(),
        );
        catalog.touch_target("T1", t0());
        catalog
    }

    fn plan(catalog: &MemoryCatalog) -> ProductionPlan {
        let converter = UnitConverter::new();
        let config = EngineConfig::default();
        let store = MemoryStore::new();
        let tx = store.begin().unwrap();
        PlanCalculator::new(catalog, &converter, &config)
            .calculate(
                &tx,
                &[Target::bundle("T1", "BOX", Decimal::from(4)).with_modified_at(t0())],
            )
            .unwrap()
    }

    #[test]
    fn test_fresh_plan() {
        let catalog = catalog();
        let mut cache = PlanCache::new();
        let id = cache.store(plan(&catalog));

        let verdict = cache.check_staleness(id, &catalog).unwrap();
        assert_eq!(verdict, StalenessVerdict::fresh());
    }

    #[rstest]
    #[case::recipe(EntityRef::Recipe("COOKIE".to_string()))]
    #[case::bundle(EntityRef::Bundle("BOX".to_string()))]
    #[case::target(EntityRef::Target("T1".to_string()))]
    fn test_contributor_edit_makes_stale(#[case] entity: EntityRef) {
        let mut catalog = catalog();
        let mut cache = PlanCache::new();
        let plan = plan(&catalog);
        let later = plan.calculated_at + Duration::seconds(5);
        let id = cache.store(plan);

        match &entity {
            EntityRef::Recipe(id) => {
                let recipe = catalog.recipe(id).unwrap();
                catalog.upsert_recipe_at(recipe, later);
            }
            EntityRef::Bundle(id) => {
                let bundle = catalog.bundle(id).unwrap();
                catalog.upsert_bundle_at(bundle, later);
            }
            EntityRef::Target(id) => catalog.touch_target(id, later),
        }

        let verdict = cache.check_staleness(id, &catalog).unwrap();
        assert!(verdict.stale);
        assert_eq!(
            verdict.reason,
            Some(StaleReason::Modified {
                entity,
                modified_at: later
            })
        );
    }

    #[test]
    fn test_removed_contributor() {
        let mut catalog = catalog();
        let mut cache = PlanCache::new();
        let id = cache.store(plan(&catalog));

        catalog.remove_recipe("COOKIE");

        let verdict = cache.check_staleness(id, &catalog).unwrap();
        assert!(matches!(verdict.reason, Some(StaleReason::Removed { .. })));
    }

    #[test]
    fn test_untracked_target_stays_fresh() {
        let mut catalog = catalog();
        let converter = UnitConverter::new();
        let config = EngineConfig::default();
        let store = MemoryStore::new();
        let tx = store.begin().unwrap();
        let plan = PlanCalculator::new(&catalog, &converter, &config)
            .calculate(&tx, &[Target::bundle("ORDER-1", "BOX", Decimal::ONE)])
            .unwrap();
        let mut cache = PlanCache::new();
        let id = cache.store(plan);

        assert_eq!(cache.check_staleness(id, &catalog).unwrap(), StalenessVerdict::fresh());

        // 其他貢獻者的變更仍會被偵測
        catalog.remove_recipe("COOKIE");
        let verdict = cache.check_staleness(id, &catalog).unwrap();
        assert_eq!(
            verdict.reason,
            Some(StaleReason::Removed { entity: EntityRef::Recipe("COOKIE".to_string()) })
        );
    }

    #[test]
    fn test_mark_dirty() {
        let catalog = catalog();
        let mut cache = PlanCache::new();
        let plan = plan(&catalog);
        let calculated_at = plan.calculated_at;
        let id = cache.store(plan);

        // 與計劃無關的實體不影響
        cache.mark_dirty_at(EntityRef::Recipe("OTHER".to_string()), calculated_at);
        assert!(!cache.check_staleness(id, &catalog).unwrap().stale);

        cache.mark_dirty_at(EntityRef::Bundle("BOX".to_string()), calculated_at);
        let verdict = cache.check_staleness(id, &catalog).unwrap();
        assert!(matches!(verdict.reason, Some(StaleReason::MarkedDirty { .. })));
        assert!(verdict.reason_text().unwrap().contains("bundle:BOX"));
        assert_eq!(cache.stale_plans(&catalog).unwrap(), vec![id]);
    }

    #[test]
    fn test_recalculated_plan_replaces_and_is_fresh() {
        let catalog = catalog();
        let mut cache = PlanCache::new();
        let first = plan(&catalog);
        cache.mark_dirty_at(EntityRef::Bundle("BOX".to_string()), first.calculated_at);
        let first_id = cache.store(first);
        assert!(cache.check_staleness(first_id, &catalog).unwrap().stale);

        cache.remove(first_id);
        let mut second = plan(&catalog);
        second.calculated_at += Duration::seconds(1);
        let second_id = cache.store(second);

        assert_eq!(cache.len(), 1);
        assert!(!cache.check_staleness(second_id, &catalog).unwrap().stale);
    }

    #[test]
    fn test_unknown_plan() {
        let cache = PlanCache::new();
        assert!(matches!(
            cache.check_staleness(Uuid::new_v4(), &catalog()),
            Err(CacheError::UnknownPlan(_))
        ));
    }

    #[test]
    fn test_json_round_trip_keeps_verdict() {
        let mut catalog = catalog();
        let mut cache = PlanCache::new();
        let plan = plan(&catalog);
        let later = plan.calculated_at + Duration::minutes(1);
        let id = cache.store(plan);

        let restored = PlanCache::from_json(&cache.to_json().unwrap()).unwrap();
        assert_eq!(restored, cache);

        catalog.touch_target("T1", later);
        assert!(restored.check_staleness(id, &catalog).unwrap().stale);
    }
}
