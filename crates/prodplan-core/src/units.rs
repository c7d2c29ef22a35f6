//! 單位換算

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{PlanError, Result};

/// 計量維度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// 重量（基準：公克）
    Mass,
    /// 體積（基準：毫升）
    Volume,
    /// 長度（基準：毫米）
    Length,
    /// 計數（基準：個）
    Count,
}

/// 物料專屬換算規則：1 `from` = `factor` `to`
///
/// 用於跨維度換算（例如 1 杯麵粉 = 120 公克），僅對指定物料生效。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemConversion {
    pub item_id: String,
    pub from_unit: String,
    pub to_unit: String,
    pub factor: Decimal,
}

impl ItemConversion {
    pub fn new(item_id: &str, from_unit: &str, to_unit: &str, factor: Decimal) -> Self {
        Self {
            item_id: item_id.to_string(),
            from_unit: normalize_unit(from_unit),
            to_unit: normalize_unit(to_unit),
            factor,
        }
    }
}

/// 單位換算器
///
/// 內建同維度換算；跨維度必須有物料專屬規則，不做任何猜測。
#[derive(Debug, Clone, Default)]
pub struct UnitConverter {
    item_conversions: HashMap<String, Vec<ItemConversion>>,
}

impl UnitConverter {
    /// 創建只含內建規則的換算器
    pub fn new() -> Self {
        Self::default()
    }

    /// 建構器模式：加入物料專屬換算規則
    pub fn with_item_conversion(mut self, conversion: ItemConversion) -> Self {
        self.add_item_conversion(conversion);
        self
    }

    /// 加入物料專屬換算規則
    pub fn add_item_conversion(&mut self, conversion: ItemConversion) {
        self.item_conversions
            .entry(conversion.item_id.clone())
            .or_default()
            .push(conversion);
    }

    /// 換算數量
    pub fn convert(&self, qty: Decimal, from_unit: &str, to_unit: &str, item_id: &str) -> Result<Decimal> {
        self.factor(from_unit, to_unit, item_id)
            .map(|factor| qty * factor)
            .ok_or_else(|| PlanError::IncompatibleUnits {
                item: item_id.to_string(),
                from: from_unit.to_string(),
                to: to_unit.to_string(),
            })
    }

    /// 檢查兩個單位對該物料是否可換算
    pub fn is_compatible(&self, from_unit: &str, to_unit: &str, item_id: &str) -> bool {
        self.factor(from_unit, to_unit, item_id).is_some()
    }

    /// 換算係數（1 `from` = 係數 `to`）
    fn factor(&self, from_unit: &str, to_unit: &str, item_id: &str) -> Option<Decimal> {
        let from = normalize_unit(from_unit);
        let to = normalize_unit(to_unit);

        if let Some(factor) = same_dimension_factor(&from, &to) {
            return Some(factor);
        }

        let bridges = self.item_conversions.get(item_id)?;
        for bridge in bridges {
            // 正向：from → bridge.from → bridge.to → to
            if let (Some(head), Some(tail)) = (
                same_dimension_factor(&from, &bridge.from_unit),
                same_dimension_factor(&bridge.to_unit, &to),
            ) {
                return Some(head * bridge.factor * tail);
            }

            // 反向：from → bridge.to → bridge.from → to
            if bridge.factor.is_zero() {
                continue;
            }
            if let (Some(head), Some(tail)) = (
                same_dimension_factor(&from, &bridge.to_unit),
                same_dimension_factor(&bridge.from_unit, &to),
            ) {
                return Some(head / bridge.factor * tail);
            }
        }

        None
    }
}

/// 正規化單位名稱（去空白、小寫、別名）
pub fn normalize_unit(unit: &str) -> String {
    let lowered = unit.trim().to_lowercase();
    let canonical = match lowered.as_str() {
        "g" | "gram" | "grams" | "gr" => "g",
        "kg" | "kgs" | "kilogram" | "kilograms" => "kg",
        "oz" | "ounce" | "ounces" => "oz",
        "lb" | "lbs" | "pound" | "pounds" => "lb",
        "ml" | "milliliter" | "milliliters" | "millilitre" => "ml",
        "l" | "liter" | "liters" | "litre" | "litres" => "l",
        "tsp" | "teaspoon" | "teaspoons" => "tsp",
        "tbsp" | "tablespoon" | "tablespoons" => "tbsp",
        "cup" | "cups" => "cup",
        "fl_oz" | "fl oz" | "floz" => "fl_oz",
        "mm" | "millimeter" | "millimeters" => "mm",
        "cm" | "centimeter" | "centimeters" => "cm",
        "m" | "meter" | "meters" | "metre" | "metres" => "m",
        "each" | "ea" | "unit" | "units" | "pc" | "pcs" | "piece" | "pieces" => "each",
        "dozen" | "dz" => "dozen",
        _ => return lowered,
    };
    canonical.to_string()
}

/// 內建單位的維度與基準係數
pub fn builtin_unit(unit: &str) -> Option<(Dimension, Decimal)> {
    let def = match unit {
        "g" => (Dimension::Mass, Decimal::ONE),
        "kg" => (Dimension::Mass, Decimal::from(1000)),
        "oz" => (Dimension::Mass, Decimal::new(28_349_523_125, 9)),
        "lb" => (Dimension::Mass, Decimal::new(45_359_237, 5)),
        "ml" => (Dimension::Volume, Decimal::ONE),
        "l" => (Dimension::Volume, Decimal::from(1000)),
        "tsp" => (Dimension::Volume, Decimal::new(492_892_159_375, 11)),
        "tbsp" => (Dimension::Volume, Decimal::new(1_478_676_478_125, 11)),
        "cup" => (Dimension::Volume, Decimal::new(2_365_882_365, 7)),
        "fl_oz" => (Dimension::Volume, Decimal::new(295_735_295_625, 10)),
        "mm" => (Dimension::Length, Decimal::ONE),
        "cm" => (Dimension::Length, Decimal::from(10)),
        "m" => (Dimension::Length, Decimal::from(1000)),
        "each" => (Dimension::Count, Decimal::ONE),
        "dozen" => (Dimension::Count, Decimal::from(12)),
        _ => return None,
    };
    Some(def)
}

/// 已正規化單位之間的同維度係數
fn same_dimension_factor(from: &str, to: &str) -> Option<Decimal> {
    if from == to {
        return Some(Decimal::ONE);
    }

    let (from_dim, from_base) = builtin_unit(from)?;
    let (to_dim, to_base) = builtin_unit(to)?;
    if from_dim != to_dim {
        return None;
    }

    Some(from_base / to_base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("kg", "g", Decimal::from(2), Decimal::from(2000))]
    #[case("g", "kg", Decimal::from(250), Decimal::new(25, 2))]
    #[case("L", "ml", Decimal::ONE, Decimal::from(1000))]
    #[case("dozen", "each", Decimal::from(3), Decimal::from(36))]
    #[case("m", "cm", Decimal::new(15, 1), Decimal::from(150))]
    #[case(" Grams ", "g", Decimal::from(5), Decimal::from(5))]
    fn test_builtin_conversions(
        #[case] from: &str,
        #[case] to: &str,
        #[case] qty: Decimal,
        #[case] expected: Decimal,
    ) {
        let converter = UnitConverter::new();
        assert_eq!(converter.convert(qty, from, to, "ANY").unwrap(), expected);
    }

    #[test]
    fn test_custom_unit_matches_only_itself() {
        let converter = UnitConverter::new();

        assert_eq!(
            converter.convert(Decimal::from(4), "Sheet", "sheet", "PAPER").unwrap(),
            Decimal::from(4)
        );
        assert!(!converter.is_compatible("sheet", "roll", "PAPER"));
    }

    #[test]
    fn test_cross_dimension_without_rule_fails() {
        let converter = UnitConverter::new();
        let err = converter
            .convert(Decimal::ONE, "cup", "g", "FLOUR")
            .unwrap_err();

        assert!(matches!(err, PlanError::IncompatibleUnits { .. }));
    }

    #[test]
    fn test_item_bridge_both_directions() {
        let converter = UnitConverter::new().with_item_conversion(ItemConversion::new(
            "FLOUR",
            "cup",
            "g",
            Decimal::from(120),
        ));

        // 正向：2 杯 = 240 g
        assert_eq!(
            converter.convert(Decimal::from(2), "cups", "g", "FLOUR").unwrap(),
            Decimal::from(240)
        );
        // 經由同維度：2 杯 = 0.24 kg
        assert_eq!(
            converter.convert(Decimal::from(2), "cup", "kg", "FLOUR").unwrap(),
            Decimal::new(24, 2)
        );
        // 反向：360 g = 3 杯
        assert_eq!(
            converter.convert(Decimal::from(360), "g", "cup", "FLOUR").unwrap(),
            Decimal::from(3)
        );
        // 規則只對該物料生效
        assert!(!converter.is_compatible("cup", "g", "SUGAR"));
    }
}
