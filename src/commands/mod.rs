//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `engine/`, `parsers/`, `models/`, `utils/`
//! - 子模块: optimize, batch, status, cleanup

pub mod batch;
pub mod cleanup;
pub mod optimize;
pub mod status;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Optimize(args) => optimize::execute(args),
        Commands::Batch(args) => batch::execute(args),
        Commands::Status(args) => status::execute(args),
        Commands::Cleanup(args) => cleanup::execute(args),
    }
}
