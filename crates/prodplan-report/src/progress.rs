//! 目標完成度評估
//!
//! 超額生產（>100%）是中性狀態：只報告，不阻擋。

use chrono::{DateTime, Utc};
use prodplan_core::{Catalog, EngineConfig, InventoryRead, Target, TargetKind, UnitConverter};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::feasibility::{Feasibility, FeasibilityChecker};

/// 完成狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Complete,
    Exceeded,
}

impl ProgressStatus {
    /// 由已完成量與目標量判斷狀態
    pub fn classify(produced: Decimal, target: Decimal) -> Self {
        if produced <= Decimal::ZERO {
            ProgressStatus::NotStarted
        } else if produced < target {
            ProgressStatus::InProgress
        } else if produced == target {
            ProgressStatus::Complete
        } else {
            ProgressStatus::Exceeded
        }
    }
}

/// 單一目標的進度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProgress {
    pub target_id: String,
    pub kind: TargetKind,
    pub target_quantity: Decimal,
    /// 已完成量（與目標同單位：批數、成品數或組合數）
    pub produced: Decimal,
    /// 完成百分比（兩位小數）
    pub percent: Decimal,
    pub status: ProgressStatus,
    /// 剩餘數量的可行性（已完成或關閉檢查時為 None）
    pub feasibility: Option<Feasibility>,
}

impl TargetProgress {
    pub fn remaining(&self) -> Decimal {
        (self.target_quantity - self.produced).max(Decimal::ZERO)
    }
}

/// 進度報表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub evaluated_at: DateTime<Utc>,
    pub targets: Vec<TargetProgress>,
}

impl ProgressReport {
    /// 指定狀態的目標數
    pub fn count(&self, status: ProgressStatus) -> usize {
        self.targets.iter().filter(|t| t.status == status).count()
    }

    pub fn find(&self, target_id: &str) -> Option<&TargetProgress> {
        self.targets.iter().find(|t| t.target_id == target_id)
    }

    /// 所有目標是否都已完成（含超額）
    pub fn all_done(&self) -> bool {
        self.targets
            .iter()
            .all(|t| matches!(t.status, ProgressStatus::Complete | ProgressStatus::Exceeded))
    }
}

/// 進度評估器
pub struct ProgressEvaluator<'a, C: Catalog + Sync + ?Sized> {
    catalog: &'a C,
    converter: &'a UnitConverter,
    config: &'a EngineConfig,
}

impl<'a, C: Catalog + Sync + ?Sized> ProgressEvaluator<'a, C> {
    pub fn new(catalog: &'a C, converter: &'a UnitConverter, config: &'a EngineConfig) -> Self {
        Self {
            catalog,
            converter,
            config,
        }
    }

    /// 並行評估所有目標（同一個唯讀視圖）
    pub fn evaluate<R: InventoryRead + Sync + ?Sized>(
        &self,
        store: &R,
        targets: &[Target],
    ) -> prodplan_core::Result<ProgressReport> {
        tracing::info!("開始進度評估：目標 {} 筆", targets.len());
        let start_time = std::time::Instant::now();

        let progress = targets
            .par_iter()
            .map(|target| self.evaluate_target(store, target))
            .collect::<prodplan_core::Result<Vec<_>>>()?;

        let report = ProgressReport {
            evaluated_at: Utc::now(),
            targets: progress,
        };

        tracing::info!(
            "進度評估完成，耗時 {:?}：完成 {}，超額 {}，進行中 {}，未開始 {}",
            start_time.elapsed(),
            report.count(ProgressStatus::Complete),
            report.count(ProgressStatus::Exceeded),
            report.count(ProgressStatus::InProgress),
            report.count(ProgressStatus::NotStarted)
        );
        Ok(report)
    }

    /// 評估單一目標
    pub fn evaluate_target<R: InventoryRead + ?Sized>(
        &self,
        store: &R,
        target: &Target,
    ) -> prodplan_core::Result<TargetProgress> {
        target.validate()?;

        let produced = produced_so_far(store, &target.kind)?;
        let status = ProgressStatus::classify(produced, target.quantity);
        let percent = (produced / target.quantity * Decimal::from(100)).round_dp(2);

        if status == ProgressStatus::Exceeded {
            tracing::debug!("目標 {} 超額完成 {}%", target.id, percent);
        }

        let remaining = (target.quantity - produced).max(Decimal::ZERO);
        let feasibility = if self.config.feasibility_check && remaining > Decimal::ZERO {
            let checker = FeasibilityChecker::new(self.catalog, self.converter, self.config);
            Some(checker.check(store, &target.kind, remaining)?)
        } else {
            None
        };

        Ok(TargetProgress {
            target_id: target.id.clone(),
            kind: target.kind.clone(),
            target_quantity: target.quantity,
            produced,
            percent,
            status,
            feasibility,
        })
    }
}

/// 已完成量：批數目標計批數，成品目標計實際產量，組合目標計組裝數量
fn produced_so_far<R: InventoryRead + ?Sized>(
    store: &R,
    kind: &TargetKind,
) -> prodplan_core::Result<Decimal> {
    let total = match kind {
        TargetKind::RecipeBatches(recipe_id) => store
            .production_events(recipe_id)?
            .iter()
            .map(|e| e.batches)
            .sum::<u64>(),
        TargetKind::RecipeUnits(recipe_id) => store
            .production_events(recipe_id)?
            .iter()
            .map(|e| e.actual_yield)
            .sum::<u64>(),
        TargetKind::Bundle(bundle_id) => store
            .assembly_events(bundle_id)?
            .iter()
            .map(|e| e.quantity)
            .sum::<u64>(),
    };
    Ok(Decimal::from(total))
}
