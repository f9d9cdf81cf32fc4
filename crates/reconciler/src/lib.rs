//! # Reconciler
//!
//! 同步引擎：把源端集合与目标端集合对齐。
//!
//! 负责：
//! - 匹配策略选择 (identity / fuzzy)
//! - 部分失败过滤 (保护来源拉取失败的记录不被删除)
//! - 生成 add / update / delete 计划
//! - 按固定顺序执行计划, 支持 simulate 与缓存镜像
//!
//! ## 使用示例
//!
//! ```ignore
//! use reconciler::{OrchestratorConfig, SyncOrchestrator};
//!
//! let mut orchestrator = SyncOrchestrator::new(source, destination, OrchestratorConfig::default());
//! let report = orchestrator.run().await?;
//! println!("{} changes", report.changes());
//! ```

mod matching;
mod orchestrator;
mod planner;
mod protection;

pub use matching::{select_strategy, Matcher};
pub use orchestrator::{OrchestratorConfig, RunState, SyncOrchestrator};
pub use planner::{plan, project, PlanOptions};
pub use protection::protection_for;

// Re-export contracts types
pub use contracts::{MatchStrategy, Plan, ProtectionReason, RunReport};
