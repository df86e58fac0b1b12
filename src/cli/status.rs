//! # status 子命令 CLI 定义
//!
//! 查询作业状态：单个请求或列出全部作业目录
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/status.rs`

use clap::{ArgGroup, Args};
use std::path::PathBuf;

/// status 子命令参数
#[derive(Args, Debug)]
#[command(group = ArgGroup::new("target").required(true))]
pub struct StatusArgs {
    /// Request identifier to query
    #[arg(long, group = "target")]
    pub request_id: Option<String>,

    /// List every job directory under the work root
    #[arg(long, group = "target", default_value_t = false)]
    pub all: bool,

    /// Working directory for calculations
    #[arg(long, default_value = "./work", env = "DFTBOPT_WORK_DIR")]
    pub work_dir: PathBuf,
}
