//! 生產計劃主計算器

use chrono::{DateTime, Utc};
use prodplan_core::{
    Catalog, EngineConfig, EntityRef, InventoryRead, PlanWarning, Target, UnitConverter,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::aggregation::{Expansion, RequirementAggregator, RequirementLine, Requirements};
use crate::batching::{BatchCalculator, BatchPlanEntry};
use crate::gap::{GapCalculator, GapReport};

/// 單一配方的計劃明細
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanLine {
    pub recipe_id: String,
    /// 目標所需成品總數
    pub units_required: Decimal,
    /// 現有成品庫存
    pub finished_on_hand: Decimal,
    /// 需要生產的數量
    pub units_to_produce: Decimal,
    /// 批次計劃（無需生產時為 None）
    pub batch: Option<BatchPlanEntry>,
}

/// 生產計劃
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionPlan {
    pub id: Uuid,
    pub calculated_at: DateTime<Utc>,
    pub targets: Vec<Target>,
    pub lines: Vec<PlanLine>,

    /// 直接取用現有庫存的子組合數量
    #[serde(default)]
    pub bundles_from_stock: BTreeMap<String, Decimal>,

    /// 原料與包材需求（以整批計）
    pub requirements: Vec<RequirementLine>,

    pub gaps: GapReport,
    pub warnings: Vec<PlanWarning>,

    /// 參與計算的實體及其計算當下的修改時間
    #[serde(with = "prodplan_core::catalog::entity_timestamps")]
    pub contributors: BTreeMap<EntityRef, DateTime<Utc>>,

    /// 計算耗時（毫秒）
    pub calculation_time_ms: Option<u64>,
}

impl ProductionPlan {
    /// 查詢配方的計劃明細
    pub fn line(&self, recipe_id: &str) -> Option<&PlanLine> {
        self.lines.iter().find(|l| l.recipe_id == recipe_id)
    }

    /// 總批數
    pub fn total_batches(&self) -> u64 {
        self.lines
            .iter()
            .filter_map(|l| l.batch.as_ref())
            .map(|b| b.batches_to_run)
            .sum()
    }

    /// 添加警告
    pub fn add_warning(&mut self, warning: PlanWarning) {
        self.warnings.push(warning);
    }
}

/// 生產計劃計算器
pub struct PlanCalculator<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    converter: &'a UnitConverter,
    config: &'a EngineConfig,
}

impl<'a, C: Catalog + ?Sized> PlanCalculator<'a, C> {
    /// 創建新的計劃計算器
    pub fn new(catalog: &'a C, converter: &'a UnitConverter, config: &'a EngineConfig) -> Self {
        Self {
            catalog,
            converter,
            config,
        }
    }

    /// 主計算入口（唯讀，在單一一致快照上執行）
    pub fn calculate<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        targets: &[Target],
    ) -> prodplan_core::Result<ProductionPlan> {
        tracing::info!("開始計劃計算：目標 {} 筆", targets.len());
        let start_time = std::time::Instant::now();
        let calculated_at = Utc::now();

        let mut warnings = Vec::new();
        let mut contributors = BTreeMap::new();

        // Step 1: 展開目標
        tracing::debug!("Step 1: 展開目標");
        let aggregator = RequirementAggregator::new(self.catalog, self.config);
        let mut expansion = Expansion::default();
        for target in targets {
            target.validate()?;
            if self.config.net_finished_goods {
                aggregator.expand_from_stock(store, &target.kind, target.quantity, &mut expansion)?;
            } else {
                expansion.merge(aggregator.expand(&target.kind, target.quantity)?);
            }
            contributors.insert(EntityRef::Target(target.id.clone()), target.modified_at);
        }

        // Step 2: 扣除成品庫存並計算批數
        tracing::debug!("Step 2: 批數計算，配方 {} 個", expansion.units.len());
        let mut lines = Vec::new();
        let mut requirements = expansion.packaging.clone();
        for (recipe_id, units_required) in &expansion.units {
            let recipe = self.catalog.require_recipe(recipe_id)?;
            let line = self.plan_recipe(store, recipe_id, *units_required, &recipe.yield_configs, &mut warnings)?;

            // Step 3: 以整批計算原料
            if let Some(batch) = &line.batch {
                let multiplier = batch.ingredient_scale * Decimal::from(batch.batches_to_run);
                for ingredient in &recipe.ingredients {
                    requirements.add(&ingredient.item_id, &ingredient.unit, ingredient.quantity * multiplier);
                }
            }

            contributors.insert(EntityRef::Recipe(recipe.id.clone()), recipe.modified_at);
            lines.push(line);
        }

        for bundle_id in &expansion.bundles {
            if let Some(modified_at) = self.catalog.last_modified(&EntityRef::Bundle(bundle_id.clone())) {
                contributors.insert(EntityRef::Bundle(bundle_id.clone()), modified_at);
            }
        }

        // Step 4: 缺口計算
        tracing::debug!("Step 4: 缺口計算，需求 {} 項", requirements.len());
        let gaps = GapCalculator::new(self.converter).calculate(store, &requirements.lines())?;
        warnings.extend(gaps.warnings.iter().cloned());

        let plan = ProductionPlan {
            id: Uuid::new_v4(),
            calculated_at,
            targets: targets.to_vec(),
            lines,
            bundles_from_stock: expansion.stocked,
            requirements: requirements.lines(),
            gaps,
            warnings,
            contributors,
            calculation_time_ms: Some(start_time.elapsed().as_millis() as u64),
        };

        tracing::info!(
            "計劃計算完成，耗時 {:?}：{} 批，需採購 {} 項",
            start_time.elapsed(),
            plan.total_batches(),
            plan.gaps.purchase_items.len()
        );
        Ok(plan)
    }

    /// 純展開：目標對應的基礎物料需求（非整數批）
    pub fn aggregate(&self, target: &Target) -> prodplan_core::Result<Requirements> {
        RequirementAggregator::new(self.catalog, self.config).aggregate(&target.kind, target.quantity)
    }

    fn plan_recipe<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        recipe_id: &str,
        units_required: Decimal,
        yield_configs: &[prodplan_core::YieldConfig],
        warnings: &mut Vec<PlanWarning>,
    ) -> prodplan_core::Result<PlanLine> {
        let finished_on_hand = if self.config.net_finished_goods {
            Decimal::from(store.finished_goods(recipe_id)?.on_hand)
        } else {
            Decimal::ZERO
        };

        let units_to_produce = (units_required - finished_on_hand).max(Decimal::ZERO);

        let batch = if units_to_produce > Decimal::ZERO {
            Some(BatchCalculator::select(recipe_id, units_to_produce, yield_configs)?)
        } else {
            warnings.push(PlanWarning::info(
                recipe_id.to_string(),
                format!("現有成品 {} 已足夠需求 {}，無需生產", finished_on_hand, units_required),
            ));
            None
        };

        Ok(PlanLine {
            recipe_id: recipe_id.to_string(),
            units_required,
            finished_on_hand,
            units_to_produce,
            batch,
        })
    }
}
