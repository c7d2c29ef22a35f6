//! 需求展開
//!
//! 將目標（成品或組合）遞迴展開為基礎物料需求。以 (物料, 單位) 為鍵累加，
//! 同一物料的不同單位不會自動合併。

use prodplan_core::{
    Catalog, ComponentKind, ConfigurationError, EngineConfig, InventoryRead, PlanError, TargetKind,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 需求明細（僅存在於記憶體，不持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementLine {
    pub item_id: String,
    pub unit: String,
    pub quantity: Decimal,
}

/// 以 (物料, 單位) 為鍵的需求彙總
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    lines: BTreeMap<(String, String), Decimal>,
}

impl Requirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加需求
    pub fn add(&mut self, item_id: &str, unit: &str, quantity: Decimal) {
        *self
            .lines
            .entry((item_id.to_string(), unit.to_string()))
            .or_insert(Decimal::ZERO) += quantity;
    }

    /// 合併另一份需求
    pub fn merge(&mut self, other: &Requirements) {
        for ((item, unit), qty) in &other.lines {
            self.add(item, unit, *qty);
        }
    }

    /// 查詢需求數量
    pub fn get(&self, item_id: &str, unit: &str) -> Option<Decimal> {
        self.lines
            .get(&(item_id.to_string(), unit.to_string()))
            .copied()
    }

    /// 需求明細（依物料、單位排序）
    pub fn lines(&self) -> Vec<RequirementLine> {
        self.lines
            .iter()
            .map(|((item_id, unit), quantity)| RequirementLine {
                item_id: item_id.clone(),
                unit: unit.clone(),
                quantity: *quantity,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// 組合展開結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    /// 各配方所需成品數量
    pub units: BTreeMap<String, Decimal>,

    /// 包材需求
    pub packaging: Requirements,

    /// 展開過程中經過的組合
    pub bundles: BTreeSet<String>,

    /// 直接取用現有庫存的子組合數量（不再往下展開）
    pub stocked: BTreeMap<String, Decimal>,
}

impl Expansion {
    fn add_units(&mut self, recipe_id: &str, quantity: Decimal) {
        *self
            .units
            .entry(recipe_id.to_string())
            .or_insert(Decimal::ZERO) += quantity;
    }

    /// 合併另一份展開結果
    pub fn merge(&mut self, other: Expansion) {
        for (recipe_id, qty) in other.units {
            self.add_units(&recipe_id, qty);
        }
        self.packaging.merge(&other.packaging);
        self.bundles.extend(other.bundles);
        for (bundle_id, qty) in other.stocked {
            *self.stocked.entry(bundle_id).or_insert(Decimal::ZERO) += qty;
        }
    }

    /// 已分配給本次展開的子組合庫存
    pub fn stocked(&self, bundle_id: &str) -> Decimal {
        self.stocked.get(bundle_id).copied().unwrap_or(Decimal::ZERO)
    }
}

/// 需求展開器
pub struct RequirementAggregator<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    config: &'a EngineConfig,
}

impl<'a, C: Catalog + ?Sized> RequirementAggregator<'a, C> {
    /// 創建新的展開器
    pub fn new(catalog: &'a C, config: &'a EngineConfig) -> Self {
        Self { catalog, config }
    }

    /// 展開為基礎物料需求
    ///
    /// 成品依 `數量 / 每批產量` 換算配方原料（配方以批定義）。
    pub fn aggregate(&self, target: &TargetKind, quantity: Decimal) -> prodplan_core::Result<Requirements> {
        let expansion = self.expand(target, quantity)?;

        let mut requirements = expansion.packaging;
        for (recipe_id, units) in &expansion.units {
            requirements.merge(&self.ingredients_for_units(recipe_id, *units)?);
        }

        tracing::debug!(
            "需求展開 {:?} × {}: {} 項基礎物料",
            target,
            quantity,
            requirements.len()
        );
        Ok(requirements)
    }

    /// 展開到成品與包材層級
    pub fn expand(&self, target: &TargetKind, quantity: Decimal) -> prodplan_core::Result<Expansion> {
        let mut expansion = Expansion::default();
        self.expand_into(target, quantity, &mut |_| Ok(Decimal::ZERO), &mut expansion)?;
        Ok(expansion)
    }

    /// 展開並優先取用已組裝的子組合庫存
    ///
    /// 子組合先以整數從成品庫存扣用，只有不足的部分才往下展開。
    /// 已記在 `expansion` 中的分配量視為已被佔用，多個目標可累加到同一份展開結果。
    pub fn expand_from_stock<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        target: &TargetKind,
        quantity: Decimal,
        expansion: &mut Expansion,
    ) -> prodplan_core::Result<()> {
        self.expand_into(
            target,
            quantity,
            &mut |bundle_id| Ok(Decimal::from(store.finished_goods(bundle_id)?.on_hand)),
            expansion,
        )
    }

    fn expand_into(
        &self,
        target: &TargetKind,
        quantity: Decimal,
        on_hand: &mut dyn FnMut(&str) -> prodplan_core::Result<Decimal>,
        expansion: &mut Expansion,
    ) -> prodplan_core::Result<()> {
        if quantity <= Decimal::ZERO {
            return Err(PlanError::invalid_quantity("target quantity", quantity));
        }

        match target {
            TargetKind::RecipeUnits(recipe_id) => {
                self.catalog.require_recipe(recipe_id)?;
                expansion.add_units(recipe_id, quantity);
            }
            TargetKind::RecipeBatches(recipe_id) => {
                let recipe = self.catalog.require_recipe(recipe_id)?;
                let yield_per_batch = recipe.primary_yield()?.yield_per_batch;
                expansion.add_units(recipe_id, quantity * yield_per_batch);
            }
            TargetKind::Bundle(bundle_id) => {
                let mut path = Vec::new();
                self.expand_bundle(bundle_id, quantity, &mut path, on_hand, expansion)?;
            }
        }
        Ok(())
    }

    /// 成品數量對應的配方原料（依標準產量，允許非整數批）
    pub fn ingredients_for_units(&self, recipe_id: &str, units: Decimal) -> prodplan_core::Result<Requirements> {
        let recipe = self.catalog.require_recipe(recipe_id)?;
        let config = recipe.primary_yield()?;
        let batches = units / config.yield_per_batch;

        let mut requirements = Requirements::new();
        for ingredient in &recipe.ingredients {
            requirements.add(
                &ingredient.item_id,
                &ingredient.unit,
                ingredient.quantity * config.ingredient_scale * batches,
            );
        }
        Ok(requirements)
    }

    /// 遞迴展開組合
    ///
    /// `path` 為目前的祖先鏈；組合出現在自己的祖先鏈中即為循環。
    /// 同一子組合可從不同分支重複出現（菱形結構），這不是循環。
    fn expand_bundle(
        &self,
        bundle_id: &str,
        quantity: Decimal,
        path: &mut Vec<String>,
        on_hand: &mut dyn FnMut(&str) -> prodplan_core::Result<Decimal>,
        expansion: &mut Expansion,
    ) -> prodplan_core::Result<()> {
        self.check_nesting(bundle_id, path)?;

        let bundle = self.catalog.require_bundle(bundle_id)?;
        expansion.bundles.insert(bundle.id.clone());
        path.push(bundle.id.clone());

        for component in &bundle.components {
            if component.quantity <= Decimal::ZERO {
                return Err(PlanError::invalid_quantity(
                    &format!("bundle {} component quantity", bundle.id),
                    component.quantity,
                ));
            }

            let needed = component.quantity * quantity;
            match &component.kind {
                ComponentKind::Bundle(sub_id) => {
                    self.check_nesting(sub_id, path)?;

                    let free = (on_hand(sub_id)? - expansion.stocked(sub_id)).max(Decimal::ZERO);
                    let from_stock = free.min(needed).floor();
                    if from_stock > Decimal::ZERO {
                        *expansion
                            .stocked
                            .entry(sub_id.clone())
                            .or_insert(Decimal::ZERO) += from_stock;
                    }

                    let shortfall = needed - from_stock;
                    if shortfall > Decimal::ZERO {
                        self.expand_bundle(sub_id, shortfall, path, on_hand, expansion)?;
                    } else {
                        expansion.bundles.insert(sub_id.clone());
                    }
                }
                ComponentKind::Recipe(recipe_id) => {
                    expansion.add_units(recipe_id, needed);
                }
                ComponentKind::Packaging { item_id, unit } => {
                    expansion.packaging.add(item_id, unit, needed);
                }
            }
        }

        path.pop();
        Ok(())
    }

    /// 循環與深度檢查（`path` 為 `bundle_id` 的祖先鏈）
    fn check_nesting(&self, bundle_id: &str, path: &[String]) -> prodplan_core::Result<()> {
        if path.iter().any(|id| id == bundle_id) {
            let mut cycle = path.to_vec();
            cycle.push(bundle_id.to_string());
            return Err(ConfigurationError::CyclicComposition { path: cycle }.into());
        }

        let depth = path.len();
        if self.config.depth_exceeded(depth) {
            return Err(ConfigurationError::CompositionTooDeep {
                bundle: path.first().cloned().unwrap_or_else(|| bundle_id.to_string()),
                depth,
                limit: self.config.max_composition_depth.unwrap_or(depth),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodplan_core::{Bundle, MemoryCatalog, MemoryStore, Recipe, UnitOfWork};

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.upsert_recipe(
            Recipe::new("COOKIE", "Sugar Cookie")
                .with_yield(Decimal::from(48))
                .with_ingredient("FLOUR", Decimal::from(480), "g")
                .with_ingredient("BUTTER", Decimal::from(240), "g"),
        );
        catalog.upsert_recipe(
            Recipe::new("FUDGE", "Fudge")
                .with_yield(Decimal::from(24))
                .with_ingredient("BUTTER", Decimal::from(120), "g")
                .with_ingredient("BUTTER", Decimal::new(5, 1), "cup"),
        );
        catalog.upsert_bundle(
            Bundle::new("TIN", "Cookie Tin")
                .with_unit("COOKIE", Decimal::from(12))
                .with_packaging("TIN-CAN", Decimal::ONE, "each"),
        );
        catalog.upsert_bundle(
            Bundle::new("HAMPER", "Holiday Hamper")
                .with_sub_bundle("TIN", Decimal::from(2))
                .with_unit("FUDGE", Decimal::from(6))
                .with_packaging("RIBBON", Decimal::new(15, 1), "m"),
        );
        catalog
    }

    #[test]
    fn test_recipe_units_scaled_by_yield() {
        let catalog = catalog();
        let config = EngineConfig::default();
        let aggregator = RequirementAggregator::new(&catalog, &config);

        // 24 片 = 半批
        let reqs = aggregator
            .aggregate(&TargetKind::RecipeUnits("COOKIE".to_string()), Decimal::from(24))
            .unwrap();

        assert_eq!(reqs.get("FLOUR", "g"), Some(Decimal::from(240)));
        assert_eq!(reqs.get("BUTTER", "g"), Some(Decimal::from(120)));
    }

    #[test]
    fn test_recipe_batches_target() {
        let catalog = catalog();
        let config = EngineConfig::default();
        let aggregator = RequirementAggregator::new(&catalog, &config);

        let expansion = aggregator
            .expand(&TargetKind::RecipeBatches("COOKIE".to_string()), Decimal::from(2))
            .unwrap();

        assert_eq!(expansion.units.get("COOKIE"), Some(&Decimal::from(96)));
    }

    #[test]
    fn test_nested_bundle_expansion() {
        let catalog = catalog();
        let config = EngineConfig::default();
        let aggregator = RequirementAggregator::new(&catalog, &config);

        let expansion = aggregator
            .expand(&TargetKind::Bundle("HAMPER".to_string()), Decimal::from(2))
            .unwrap();

        // 2 籃 × 2 罐 × 12 片
        assert_eq!(expansion.units.get("COOKIE"), Some(&Decimal::from(48)));
        assert_eq!(expansion.units.get("FUDGE"), Some(&Decimal::from(12)));
        assert_eq!(expansion.packaging.get("TIN-CAN", "each"), Some(Decimal::from(4)));
        assert_eq!(expansion.packaging.get("RIBBON", "m"), Some(Decimal::from(3)));
        assert_eq!(expansion.bundles.len(), 2);
    }

    #[test]
    fn test_same_item_different_units_not_merged() {
        let catalog = catalog();
        let config = EngineConfig::default();
        let aggregator = RequirementAggregator::new(&catalog, &config);

        let reqs = aggregator
            .aggregate(&TargetKind::RecipeUnits("FUDGE".to_string()), Decimal::from(24))
            .unwrap();

        assert_eq!(reqs.get("BUTTER", "g"), Some(Decimal::from(120)));
        assert_eq!(reqs.get("BUTTER", "cup"), Some(Decimal::new(5, 1)));
        assert_eq!(reqs.len(), 2);
    }

    #[test]
    fn test_cycle_detected() {
        let mut catalog = catalog();
        catalog.upsert_bundle(Bundle::new("A", "A").with_sub_bundle("B", Decimal::ONE));
        catalog.upsert_bundle(Bundle::new("B", "B").with_sub_bundle("A", Decimal::ONE));
        let config = EngineConfig::default();
        let aggregator = RequirementAggregator::new(&catalog, &config);

        let err = aggregator
            .expand(&TargetKind::Bundle("A".to_string()), Decimal::ONE)
            .unwrap_err();

        assert_eq!(
            err,
            PlanError::Configuration(ConfigurationError::CyclicComposition {
                path: vec!["A".to_string(), "B".to_string(), "A".to_string()],
            })
        );
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut catalog = catalog();
        catalog.upsert_bundle(
            Bundle::new("DUO", "Two Tins")
                .with_sub_bundle("TIN", Decimal::ONE)
                .with_sub_bundle("TIN", Decimal::ONE),
        );
        let config = EngineConfig::default();
        let aggregator = RequirementAggregator::new(&catalog, &config);

        let expansion = aggregator
            .expand(&TargetKind::Bundle("DUO".to_string()), Decimal::ONE)
            .unwrap();
        assert_eq!(expansion.units.get("COOKIE"), Some(&Decimal::from(24)));
    }

    #[test]
    fn test_depth_limit() {
        let catalog = catalog();
        let config = EngineConfig::default().with_max_composition_depth(0);
        let aggregator = RequirementAggregator::new(&catalog, &config);

        // 單層組合允許
        assert!(aggregator
            .expand(&TargetKind::Bundle("TIN".to_string()), Decimal::ONE)
            .is_ok());

        let err = aggregator
            .expand(&TargetKind::Bundle("HAMPER".to_string()), Decimal::ONE)
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::Configuration(ConfigurationError::CompositionTooDeep { depth: 1, limit: 0, .. })
        ));
    }

    #[test]
    fn test_sub_bundle_stock_used_before_expanding() {
        let catalog = catalog();
        let config = EngineConfig::default();
        let aggregator = RequirementAggregator::new(&catalog, &config);
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let mut tins = tx.finished_goods("TIN").unwrap();
        tins.receive(3, Decimal::from(30));
        tx.save_finished_goods(tins).unwrap();

        // 2 籃需要 4 罐：3 罐取自庫存，1 罐展開
        let mut expansion = Expansion::default();
        aggregator
            .expand_from_stock(&tx, &TargetKind::Bundle("HAMPER".to_string()), Decimal::from(2), &mut expansion)
            .unwrap();
        assert_eq!(expansion.stocked("TIN"), Decimal::from(3));
        assert_eq!(expansion.units.get("COOKIE"), Some(&Decimal::from(12)));
        assert_eq!(expansion.packaging.get("TIN-CAN", "each"), Some(Decimal::ONE));

        // 第二個目標：庫存已被佔用，全部展開
        aggregator
            .expand_from_stock(&tx, &TargetKind::Bundle("HAMPER".to_string()), Decimal::ONE, &mut expansion)
            .unwrap();
        assert_eq!(expansion.stocked("TIN"), Decimal::from(3));
        assert_eq!(expansion.units.get("COOKIE"), Some(&Decimal::from(36)));
    }

    #[test]
    fn test_unknown_entities() {
        let catalog = catalog();
        let config = EngineConfig::default();
        let aggregator = RequirementAggregator::new(&catalog, &config);

        assert!(matches!(
            aggregator.expand(&TargetKind::Bundle("NOPE".to_string()), Decimal::ONE),
            Err(PlanError::NotFound { .. })
        ));
        assert!(matches!(
            aggregator.expand(&TargetKind::RecipeUnits("COOKIE".to_string()), Decimal::ZERO),
            Err(PlanError::InvalidQuantity { .. })
        ));
    }
}
