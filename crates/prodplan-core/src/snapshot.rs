//! 不可變定義快照
//!
//! 記錄生產/組裝當下的配方與組合定義；歷史成本一律讀取快照，不讀取可能已被修改的現行定義。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Bundle, Catalog, ComponentKind, EntityRef, Ingredient, Recipe, YieldConfig};

/// 配方快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSnapshot {
    /// 快照ID
    pub id: Uuid,

    /// 配方ID
    pub recipe_id: String,

    /// 配方名稱
    pub recipe_name: String,

    /// 每批原料（擷取當下）
    pub ingredients: Vec<Ingredient>,

    /// 使用的產量配置
    pub yield_config: YieldConfig,

    /// 額外縮放倍數
    pub scale_factor: Decimal,

    /// 擷取時間
    pub captured_at: DateTime<Utc>,

    /// 擷取時配方的修改時間
    pub source_modified_at: DateTime<Utc>,
}

impl RecipeSnapshot {
    /// 擷取配方快照（深拷貝，之後修改配方不影響快照）
    pub fn capture(
        recipe: &Recipe,
        yield_config: &YieldConfig,
        scale_factor: Decimal,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipe_id: recipe.id.clone(),
            recipe_name: recipe.name.clone(),
            ingredients: recipe.ingredients.clone(),
            yield_config: yield_config.clone(),
            scale_factor,
            captured_at,
            source_modified_at: recipe.modified_at,
        }
    }

    /// 每批的實際原料倍數
    pub fn batch_multiplier(&self) -> Decimal {
        self.yield_config.ingredient_scale * self.scale_factor
    }

    /// 指定批數的原料需求
    pub fn requirements_for(&self, batches: u64) -> Vec<Ingredient> {
        let multiplier = self.batch_multiplier() * Decimal::from(batches);
        self.ingredients
            .iter()
            .map(|ing| Ingredient {
                item_id: ing.item_id.clone(),
                quantity: ing.quantity * multiplier,
                unit: ing.unit.clone(),
            })
            .collect()
    }

    /// 指定批數的預期產量
    pub fn expected_yield(&self, batches: u64) -> Decimal {
        self.yield_config.yield_per_batch * self.scale_factor * Decimal::from(batches)
    }
}

/// 組合快照（含所有可達子組合的定義）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleSnapshot {
    /// 快照ID
    pub id: Uuid,

    /// 組合ID
    pub bundle_id: String,

    /// 組合及其子組合定義（第一筆為根組合）
    pub definitions: Vec<Bundle>,

    /// 擷取時間
    pub captured_at: DateTime<Utc>,
}

impl BundleSnapshot {
    /// 從目錄擷取組合及所有可達子組合
    ///
    /// 找不到的子組合不在此報錯，展開時會回報。
    pub fn capture<C: Catalog + ?Sized>(
        catalog: &C,
        root: &Bundle,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let mut definitions = vec![root.clone()];
        let mut pending: Vec<String> = sub_bundle_ids(root);

        while let Some(id) = pending.pop() {
            if definitions.iter().any(|b| b.id == id) {
                continue;
            }
            if let Some(bundle) = catalog.bundle(&id) {
                pending.extend(sub_bundle_ids(&bundle));
                definitions.push(bundle);
            }
        }

        Self {
            id: Uuid::new_v4(),
            bundle_id: root.id.clone(),
            definitions,
            captured_at,
        }
    }

    /// 根組合定義
    pub fn root(&self) -> Option<&Bundle> {
        self.definitions.first()
    }
}

/// 快照作為唯讀目錄，只提供組合定義
impl Catalog for BundleSnapshot {
    fn recipe(&self, _id: &str) -> Option<Recipe> {
        None
    }

    fn bundle(&self, id: &str) -> Option<Bundle> {
        self.definitions.iter().find(|b| b.id == id).cloned()
    }

    fn last_modified(&self, entity: &EntityRef) -> Option<DateTime<Utc>> {
        match entity {
            EntityRef::Bundle(id) => self.bundle(id).map(|b| b.modified_at),
            _ => None,
        }
    }
}

fn sub_bundle_ids(bundle: &Bundle) -> Vec<String> {
    bundle
        .components
        .iter()
        .filter_map(|c| match &c.kind {
            ComponentKind::Bundle(id) => Some(id.clone()),
            _ => None,
        })
        .collect()
}
