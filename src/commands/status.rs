//! # status 命令实现
//!
//! 查询作业生命周期状态。状态完全由作业目录中的文件系统工件推导，
//! 因此查询不依赖提交进程仍然存活。
//!
//! ## 依赖关系
//! - 使用 `cli/status.rs` 定义的参数
//! - 使用 `engine/status.rs`
//! - 使用 `utils/output.rs`，`tabled` 生成总览表格

use crate::cli::status::StatusArgs;
use crate::engine::status::{job_status, status_of_dir};
use crate::error::{DftbError, Result};
use crate::utils::output;

use std::fs;
use std::path::Path;
use tabled::{Table, Tabled};

/// 总览表格行
#[derive(Debug, Clone, Tabled)]
struct StatusRow {
    #[tabled(rename = "Request ID")]
    request_id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

/// 执行 status 命令
pub fn execute(args: StatusArgs) -> Result<()> {
    if let Some(ref request_id) = args.request_id {
        let status = job_status(&args.work_dir, request_id);

        output::print_header("Job Status");
        output::print_kv("Request ID", request_id);
        output::print_kv("Status", &status.to_string());
        return Ok(());
    }

    // --all: 扫描作业根目录下的全部作业
    output::print_header("Job Status Overview");

    if !args.work_dir.exists() {
        output::print_warning(&format!(
            "Work directory '{}' does not exist yet",
            args.work_dir.display()
        ));
        return Ok(());
    }

    let mut entries: Vec<_> = fs::read_dir(&args.work_dir)
        .map_err(|e| DftbError::FileReadError {
            path: args.work_dir.display().to_string(),
            source: e,
        })?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .collect();

    entries.sort_by_key(|e| e.file_name());

    let rows: Vec<StatusRow> = entries
        .iter()
        .map(|entry| StatusRow {
            request_id: entry.file_name().to_string_lossy().to_string(),
            status: status_of_dir(&entry.path()).to_string(),
            modified: modified_timestamp(&entry.path()),
        })
        .collect();

    if rows.is_empty() {
        output::print_warning("No job directories found.");
        return Ok(());
    }

    let table = Table::new(&rows);
    println!("{}", table);

    output::print_info(&format!("{} job(s) under '{}'", rows.len(), args.work_dir.display()));

    Ok(())
}

/// 目录修改时间的本地时间戳表示
fn modified_timestamp(path: &Path) -> String {
    path.metadata()
        .and_then(|m| m.modified())
        .map(|t| {
            chrono::DateTime::<chrono::Local>::from(t)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| "-".to_string())
}
