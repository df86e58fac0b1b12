//! # optimize 子命令 CLI 定义
//!
//! 提交单个 CIF 结构做 DFTB+ 几何优化
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/optimize.rs`

use super::EngineOpts;
use clap::Args;
use std::path::PathBuf;

/// optimize 子命令参数
#[derive(Args, Debug)]
pub struct OptimizeArgs {
    /// Path to the input CIF structure file
    #[arg(long, required_unless_present = "request", conflicts_with = "request")]
    pub cif: Option<PathBuf>,

    /// Path to a JSON request record (alternative to --cif)
    #[arg(long)]
    pub request: Option<PathBuf>,

    /// Semi-empirical method: GFN1-xTB or GFN2-xTB
    #[arg(long, default_value = "GFN2-xTB")]
    pub method: String,

    /// Force convergence threshold (positive, engine units)
    #[arg(long, default_value_t = 0.001)]
    pub fmax: f64,

    /// Request identifier (generated when omitted)
    #[arg(long)]
    pub request_id: Option<String>,

    /// Write the JSON response record to this file
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Decode the optimized structure payload to this file
    #[arg(long)]
    pub save_cif: Option<PathBuf>,

    #[command(flatten)]
    pub engine: EngineOpts,
}
