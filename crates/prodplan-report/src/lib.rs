//! # Production Progress Report
//!
//! 目標完成度與可行性報表（唯讀）

pub mod feasibility;
pub mod progress;

// Re-export 主要類型
pub use feasibility::{Feasibility, FeasibilityChecker, Shortage};
pub use progress::{ProgressEvaluator, ProgressReport, ProgressStatus, TargetProgress};
