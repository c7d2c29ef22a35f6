//! 目錄模型（配方、組合）與目錄介面

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{ConfigurationError, PlanError, Result};

/// 配方原料（每批用量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// 物料ID
    pub item_id: String,

    /// 每批用量
    pub quantity: Decimal,

    /// 計量單位
    pub unit: String,
}

impl Ingredient {
    pub fn new(item_id: &str, quantity: Decimal, unit: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            quantity,
            unit: unit.to_string(),
        }
    }
}

/// 產量配置
///
/// 一批產出 `yield_per_batch` 個成品，原料用量為配方定義 × `ingredient_scale`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldConfig {
    pub label: String,
    pub yield_per_batch: Decimal,
    pub ingredient_scale: Decimal,
}

impl YieldConfig {
    pub fn new(label: &str, yield_per_batch: Decimal, ingredient_scale: Decimal) -> Self {
        Self {
            label: label.to_string(),
            yield_per_batch,
            ingredient_scale,
        }
    }
}

/// 配方（以「批」為單位定義，而非單個成品）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// 配方ID（亦為成品ID）
    pub id: String,

    /// 名稱
    pub name: String,

    /// 每批原料
    pub ingredients: Vec<Ingredient>,

    /// 產量配置（第一筆為標準配置）
    pub yield_configs: Vec<YieldConfig>,

    /// 最後修改時間
    pub modified_at: DateTime<Utc>,
}

impl Recipe {
    /// 創建新的配方（尚無產量配置）
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ingredients: Vec::new(),
            yield_configs: Vec::new(),
            modified_at: Utc::now(),
        }
    }

    /// 建構器模式：設置標準產量
    pub fn with_yield(self, yield_per_batch: Decimal) -> Self {
        self.with_yield_config(YieldConfig::new("standard", yield_per_batch, Decimal::ONE))
    }

    /// 建構器模式：加入產量配置
    pub fn with_yield_config(mut self, config: YieldConfig) -> Self {
        self.yield_configs.push(config);
        self
    }

    /// 建構器模式：加入原料
    pub fn with_ingredient(mut self, item_id: &str, quantity: Decimal, unit: &str) -> Self {
        self.ingredients.push(Ingredient::new(item_id, quantity, unit));
        self
    }

    /// 標準產量配置
    pub fn primary_yield(&self) -> Result<&YieldConfig> {
        let config = self.yield_configs.first().ok_or_else(|| {
            PlanError::from(ConfigurationError::MissingYieldConfig {
                recipe: self.id.clone(),
            })
        })?;
        self.validate_yield(config)?;
        Ok(config)
    }

    /// 驗證產量配置為正數
    pub fn validate_yield(&self, config: &YieldConfig) -> Result<()> {
        if config.yield_per_batch <= Decimal::ZERO {
            return Err(ConfigurationError::NonPositiveYield {
                recipe: self.id.clone(),
                yield_per_batch: config.yield_per_batch,
            }
            .into());
        }
        Ok(())
    }
}

/// 組合元件類型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// 子組合
    Bundle(String),
    /// 已生產成品（配方產出）
    Recipe(String),
    /// 包材
    Packaging { item_id: String, unit: String },
}

/// 組合元件（每個組合的用量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub kind: ComponentKind,
    pub quantity: Decimal,
}

/// 組合（由成品、子組合及包材組裝）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// 組合ID
    pub id: String,

    /// 名稱
    pub name: String,

    /// 元件
    pub components: Vec<Component>,

    /// 最後修改時間
    pub modified_at: DateTime<Utc>,
}

impl Bundle {
    /// 創建新的組合
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            components: Vec::new(),
            modified_at: Utc::now(),
        }
    }

    /// 建構器模式：加入成品元件
    pub fn with_unit(mut self, recipe_id: &str, quantity: Decimal) -> Self {
        self.components.push(Component {
            kind: ComponentKind::Recipe(recipe_id.to_string()),
            quantity,
        });
        self
    }

    /// 建構器模式：加入子組合
    pub fn with_sub_bundle(mut self, bundle_id: &str, quantity: Decimal) -> Self {
        self.components.push(Component {
            kind: ComponentKind::Bundle(bundle_id.to_string()),
            quantity,
        });
        self
    }

    /// 建構器模式：加入包材
    pub fn with_packaging(mut self, item_id: &str, quantity: Decimal, unit: &str) -> Self {
        self.components.push(Component {
            kind: ComponentKind::Packaging {
                item_id: item_id.to_string(),
                unit: unit.to_string(),
            },
            quantity,
        });
        self
    }
}

/// 參與計劃計算的實體（用於過期判斷）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityRef {
    Target(String),
    Recipe(String),
    Bundle(String),
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Target(id) => write!(f, "target:{id}"),
            EntityRef::Recipe(id) => write!(f, "recipe:{id}"),
            EntityRef::Bundle(id) => write!(f, "bundle:{id}"),
        }
    }
}

/// `EntityRef → 時間` 映射的序列化
///
/// JSON 物件的鍵必須是字串，因此以 `[實體, 時間]` 陣列序列化。
pub mod entity_timestamps {
    use super::EntityRef;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<EntityRef, DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<EntityRef, DateTime<Utc>>, D::Error> {
        let entries: Vec<(EntityRef, DateTime<Utc>)> = Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

/// 目錄介面（配方、組合定義與修改時間）
pub trait Catalog {
    /// 查詢配方
    fn recipe(&self, id: &str) -> Option<Recipe>;

    /// 查詢組合
    fn bundle(&self, id: &str) -> Option<Bundle>;

    /// 實體最後修改時間（實體不存在時返回 None）
    fn last_modified(&self, entity: &EntityRef) -> Option<DateTime<Utc>>;

    /// 查詢配方，不存在時返回錯誤
    fn require_recipe(&self, id: &str) -> Result<Recipe> {
        self.recipe(id).ok_or_else(|| PlanError::NotFound {
            kind: "配方",
            id: id.to_string(),
        })
    }

    /// 查詢組合，不存在時返回錯誤
    fn require_bundle(&self, id: &str) -> Result<Bundle> {
        self.bundle(id).ok_or_else(|| PlanError::NotFound {
            kind: "組合",
            id: id.to_string(),
        })
    }
}

/// 記憶體目錄
///
/// 用於測試與示例；每次寫入都會更新修改時間。
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    recipes: HashMap<String, Recipe>,
    bundles: HashMap<String, Bundle>,
    targets: HashMap<String, DateTime<Utc>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新增或更新配方（修改時間設為現在）
    pub fn upsert_recipe(&mut self, recipe: Recipe) {
        self.upsert_recipe_at(recipe, Utc::now());
    }

    /// 新增或更新配方（指定修改時間）
    pub fn upsert_recipe_at(&mut self, mut recipe: Recipe, at: DateTime<Utc>) {
        recipe.modified_at = at;
        self.recipes.insert(recipe.id.clone(), recipe);
    }

    /// 新增或更新組合（修改時間設為現在）
    pub fn upsert_bundle(&mut self, bundle: Bundle) {
        self.upsert_bundle_at(bundle, Utc::now());
    }

    /// 新增或更新組合（指定修改時間）
    pub fn upsert_bundle_at(&mut self, mut bundle: Bundle, at: DateTime<Utc>) {
        bundle.modified_at = at;
        self.bundles.insert(bundle.id.clone(), bundle);
    }

    /// 記錄目標的修改時間
    pub fn touch_target(&mut self, target_id: &str, at: DateTime<Utc>) {
        self.targets.insert(target_id.to_string(), at);
    }

    /// 刪除配方
    pub fn remove_recipe(&mut self, id: &str) -> Option<Recipe> {
        self.recipes.remove(id)
    }
}

impl Catalog for MemoryCatalog {
    fn recipe(&self, id: &str) -> Option<Recipe> {
        self.recipes.get(id).cloned()
    }

    fn bundle(&self, id: &str) -> Option<Bundle> {
        self.bundles.get(id).cloned()
    }

    fn last_modified(&self, entity: &EntityRef) -> Option<DateTime<Utc>> {
        match entity {
            EntityRef::Target(id) => self.targets.get(id).copied(),
            EntityRef::Recipe(id) => self.recipes.get(id).map(|r| r.modified_at),
            EntityRef::Bundle(id) => self.bundles.get(id).map(|b| b.modified_at),
        }
    }
}
