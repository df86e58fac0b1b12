//! # dftbopt - DFTB+ 几何优化作业流水线
//!
//! 接收晶体结构文件（CIF），驱动外部 DFTB+ 引擎完成几何优化，
//! 返回解析后的数值结果与更新的结构文件。
//!
//! ## 子命令
//! - `optimize` - 提交单个结构的几何优化
//! - `batch`    - 批量提交目录下的结构文件
//! - `status`   - 查询作业生命周期状态
//! - `cleanup`  - 按时限清理旧作业目录
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   ├── engine/     (输入合成、作业监督、输出解释、状态登记)
//!   ├── parsers/    (CIF 解析与写出)
//!   ├── models/     (数据模型)
//!   ├── batch/      (批量收集与并行提交)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod engine;
mod error;
mod models;
mod parsers;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
