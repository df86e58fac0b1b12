//! # 批量处理模块
//!
//! 提供结构文件的批量收集与并行提交能力。
//!
//! ## 功能
//! - 自动检测输入类型（文件/目录）
//! - 收集匹配的结构文件列表
//! - 并行提交优化作业
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchResult, BatchRunner, JobOutcome};
