//! # batch 子命令 CLI 定义
//!
//! 批量提交目录下的 CIF 结构做几何优化
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/batch.rs`

use super::EngineOpts;
use clap::Args;
use std::path::PathBuf;

/// batch 子命令参数
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory (or single file) containing CIF structures
    #[arg(long)]
    pub input: PathBuf,

    /// Filename pattern(s), comma separated
    #[arg(long, default_value = "*.cif")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel submissions (0 = all CPU cores)
    #[arg(long, default_value_t = 0)]
    pub jobs: usize,

    /// Semi-empirical method: GFN1-xTB or GFN2-xTB
    #[arg(long, default_value = "GFN2-xTB")]
    pub method: String,

    /// Force convergence threshold (positive, engine units)
    #[arg(long, default_value_t = 0.001)]
    pub fmax: f64,

    /// Re-submit structures whose job directory already holds a completed result
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Write a CSV summary to this file
    #[arg(long, default_value = "batch_results.csv")]
    pub summary: PathBuf,

    #[command(flatten)]
    pub engine: EngineOpts,
}
