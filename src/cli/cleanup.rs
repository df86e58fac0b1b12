//! # cleanup 子命令 CLI 定义
//!
//! 按修改时间清理旧作业目录
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/cleanup.rs`

use clap::Args;
use std::path::PathBuf;

/// cleanup 子命令参数
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Working directory for calculations
    #[arg(long, default_value = "./work", env = "DFTBOPT_WORK_DIR")]
    pub work_dir: PathBuf,

    /// Remove job directories older than this many hours (must stay well
    /// beyond the per-job timeout; the sweep is unaware of in-flight jobs)
    #[arg(long, default_value_t = 24)]
    pub max_age_hours: u64,

    /// Only report what would be removed
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
