//! 批數計算
//!
//! 保證 `批數 × 每批產量 ≥ 需求數量`：寧可多做造成損耗，也不可少做。

use prodplan_core::{ConfigurationError, PlanError, YieldConfig};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 批次計劃
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPlanEntry {
    /// 產量配置名稱
    pub yield_label: String,
    /// 需求數量
    pub units_needed: Decimal,
    /// 每批產量
    pub yield_per_batch: Decimal,
    /// 原料倍數
    pub ingredient_scale: Decimal,
    /// 批數（≥1）
    pub batches_to_run: u64,
    /// 預期產量（≥ 需求數量）
    pub expected_yield: Decimal,
    /// 損耗 = 預期產量 - 需求數量（≥0）
    pub waste: Decimal,
}

/// 批數計算器
pub struct BatchCalculator;

impl BatchCalculator {
    /// 計算批數：`ceil(需求 / 每批產量)`
    pub fn calculate_batches(units_needed: Decimal, yield_per_batch: Decimal) -> prodplan_core::Result<u64> {
        if units_needed <= Decimal::ZERO {
            return Err(PlanError::invalid_quantity("units_needed", units_needed));
        }
        if yield_per_batch <= Decimal::ZERO {
            return Err(PlanError::invalid_quantity("yield_per_batch", yield_per_batch));
        }

        let mut batches = (units_needed / yield_per_batch)
            .ceil()
            .to_u64()
            .ok_or_else(|| PlanError::invalid_quantity("units_needed", units_needed))?;

        // 除法捨入可能少一批
        while Decimal::from(batches) * yield_per_batch < units_needed {
            batches += 1;
        }

        Ok(batches)
    }

    /// 以單一產量配置建立批次計劃
    pub fn plan(units_needed: Decimal, config: &YieldConfig) -> prodplan_core::Result<BatchPlanEntry> {
        let batches = Self::calculate_batches(units_needed, config.yield_per_batch)?;
        let expected_yield = Decimal::from(batches) * config.yield_per_batch;

        Ok(BatchPlanEntry {
            yield_label: config.label.clone(),
            units_needed,
            yield_per_batch: config.yield_per_batch,
            ingredient_scale: config.ingredient_scale,
            batches_to_run: batches,
            expected_yield,
            waste: expected_yield - units_needed,
        })
    }

    /// 在多個產量配置中選擇損耗最少者，損耗相同時選批數最少者
    pub fn select(
        recipe_id: &str,
        units_needed: Decimal,
        configs: &[YieldConfig],
    ) -> prodplan_core::Result<BatchPlanEntry> {
        if configs.is_empty() {
            return Err(ConfigurationError::MissingYieldConfig {
                recipe: recipe_id.to_string(),
            }
            .into());
        }

        let mut best: Option<BatchPlanEntry> = None;
        for config in configs {
            if config.yield_per_batch <= Decimal::ZERO {
                return Err(ConfigurationError::NonPositiveYield {
                    recipe: recipe_id.to_string(),
                    yield_per_batch: config.yield_per_batch,
                }
                .into());
            }

            let candidate = Self::plan(units_needed, config)?;
            let better = match &best {
                None => true,
                Some(current) => {
                    (candidate.waste, candidate.batches_to_run)
                        < (current.waste, current.batches_to_run)
                }
            };
            if better {
                best = Some(candidate);
            }
        }

        let entry = best.ok_or_else(|| {
            PlanError::from(ConfigurationError::MissingYieldConfig {
                recipe: recipe_id.to_string(),
            })
        })?;

        tracing::debug!(
            "配方 {} 需求 {}：選用 {}，{} 批，損耗 {}",
            recipe_id,
            units_needed,
            entry.yield_label,
            entry.batches_to_run,
            entry.waste
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_never_short_example() {
        let entry = BatchCalculator::plan(
            Decimal::from(49),
            &YieldConfig::new("standard", Decimal::from(48), Decimal::ONE),
        )
        .unwrap();

        assert_eq!(entry.batches_to_run, 2);
        assert_eq!(entry.expected_yield, Decimal::from(96));
        assert_eq!(entry.waste, Decimal::from(47));
    }

    #[rstest]
    #[case(48, 48, 1)]
    #[case(1, 48, 1)]
    #[case(97, 48, 3)]
    #[case(100, 7, 15)]
    fn test_calculate_batches(#[case] needed: i64, #[case] per_batch: i64, #[case] expected: u64) {
        assert_eq!(
            BatchCalculator::calculate_batches(Decimal::from(needed), Decimal::from(per_batch))
                .unwrap(),
            expected
        );
    }

    #[rstest]
    #[case(0, 48)]
    #[case(-5, 48)]
    #[case(10, 0)]
    #[case(10, -1)]
    fn test_invalid_inputs(#[case] needed: i64, #[case] per_batch: i64) {
        assert!(matches!(
            BatchCalculator::calculate_batches(Decimal::from(needed), Decimal::from(per_batch)),
            Err(PlanError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_select_min_waste() {
        let configs = vec![
            YieldConfig::new("standard", Decimal::from(48), Decimal::ONE),
            YieldConfig::new("mini", Decimal::from(20), Decimal::new(5, 1)),
        ];

        // 60：standard 2 批損耗 36；mini 3 批損耗 0
        let entry = BatchCalculator::select("COOKIE", Decimal::from(60), &configs).unwrap();
        assert_eq!(entry.yield_label, "mini");
        assert_eq!(entry.batches_to_run, 3);
        assert_eq!(entry.waste, Decimal::ZERO);
    }

    #[test]
    fn test_select_tie_breaks_on_fewest_batches() {
        let configs = vec![
            YieldConfig::new("single", Decimal::from(12), Decimal::ONE),
            YieldConfig::new("double", Decimal::from(24), Decimal::from(2)),
        ];

        // 48：兩者損耗皆為 0，double 只需 2 批
        let entry = BatchCalculator::select("ROLL", Decimal::from(48), &configs).unwrap();
        assert_eq!(entry.yield_label, "double");
        assert_eq!(entry.batches_to_run, 2);
    }

    #[test]
    fn test_select_without_configs() {
        let err = BatchCalculator::select("ROLL", Decimal::from(48), &[]).unwrap_err();
        assert!(err.is_configuration());
    }

    proptest! {
        #[test]
        fn prop_batches_never_short(needed in 1i64..1_000_000, per_batch in 1i64..10_000) {
            let needed = Decimal::from(needed);
            let per_batch = Decimal::from(per_batch);
            let batches = BatchCalculator::calculate_batches(needed, per_batch).unwrap();

            prop_assert!(batches >= 1);
            prop_assert!(Decimal::from(batches) * per_batch >= needed);
            // 少一批就不夠
            prop_assert!(Decimal::from(batches - 1) * per_batch < needed);
        }

        #[test]
        fn prop_fractional_yield_never_short(needed in 1i64..100_000, per_batch in 1i64..100_000, scale in 0u32..4) {
            let needed = Decimal::new(needed, scale);
            let per_batch = Decimal::new(per_batch, scale);
            let entry = BatchCalculator::plan(needed, &YieldConfig::new("x", per_batch, Decimal::ONE)).unwrap();

            prop_assert!(entry.expected_yield >= needed);
            prop_assert!(entry.waste >= Decimal::ZERO);
        }
    }
}
