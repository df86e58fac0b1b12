//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `optimize`: 提交单个结构的几何优化
//! - `batch`: 批量提交目录下的结构文件
//! - `status`: 查询作业状态
//! - `cleanup`: 按时限清理旧作业目录
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: optimize, batch, status, cleanup

pub mod batch;
pub mod cleanup;
pub mod optimize;
pub mod status;

use crate::engine::EngineConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// dftbopt - DFTB+ 几何优化作业流水线
#[derive(Parser)]
#[command(name = "dftbopt")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "A DFTB+ geometry optimization job pipeline for crystal structures", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a single CIF structure for geometry optimization
    Optimize(optimize::OptimizeArgs),

    /// Submit a directory of CIF structures in parallel
    Batch(batch::BatchArgs),

    /// Query the lifecycle status of submitted jobs
    Status(status::StatusArgs),

    /// Remove job directories older than a retention limit
    Cleanup(cleanup::CleanupArgs),
}

/// 引擎运行公共参数
#[derive(Args, Debug, Clone)]
pub struct EngineOpts {
    /// Working directory for calculations
    #[arg(long, default_value = "./work", env = "DFTBOPT_WORK_DIR")]
    pub work_dir: PathBuf,

    /// Path to the DFTB+ executable
    #[arg(long, default_value = "dftb+", env = "DFTBOPT_DFTB_PATH")]
    pub dftb_path: PathBuf,

    /// Calculation timeout in seconds
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// Maximum number of concurrently running jobs
    #[arg(long, default_value_t = 10)]
    pub max_jobs: usize,

    /// Use the general triclinic cell transform instead of the orthogonal approximation
    #[arg(long, default_value_t = false)]
    pub triclinic: bool,
}

impl EngineOpts {
    pub fn to_config(&self) -> EngineConfig {
        EngineConfig {
            work_dir: self.work_dir.clone(),
            dftb_path: self.dftb_path.clone(),
            timeout_secs: self.timeout,
            max_jobs: self.max_jobs,
        }
    }
}
