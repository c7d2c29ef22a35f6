//! # Production Planning Engine
//!
//! 需求展開、批數計算、FIFO 扣料與生產/組裝紀錄

pub mod aggregation;
pub mod assembly;
pub mod atomic;
pub mod batching;
pub mod fifo;
pub mod gap;
pub mod planner;
pub mod production;

// Re-export 主要類型
pub use aggregation::{Expansion, RequirementAggregator, RequirementLine, Requirements};
pub use assembly::{AssemblyRecorder, AssemblyRequest};
pub use atomic::atomically;
pub use batching::{BatchCalculator, BatchPlanEntry};
pub use fifo::{Availability, ConsumptionTrace, FifoLedger, LotDraw};
pub use gap::{GapCalculator, GapReport, GapResult};
pub use planner::{PlanCalculator, PlanLine, ProductionPlan};
pub use production::{ProductionRecorder, ProductionRequest};
