//! # cleanup 命令实现
//!
//! 带外的保留期清理：按目录修改时间删除旧作业目录。
//!
//! 清理对在途作业一无所知，保留期必须显著超过单个作业的最大超时，
//! 因此拒绝过短的 `--max-age-hours`。
//!
//! ## 依赖关系
//! - 使用 `cli/cleanup.rs` 定义的参数
//! - 使用 `utils/output.rs`

use crate::cli::cleanup::CleanupArgs;
use crate::error::{DftbError, Result};
use crate::utils::output;

use std::fs;
use std::time::{Duration, SystemTime};

/// 执行 cleanup 命令
pub fn execute(args: CleanupArgs) -> Result<()> {
    output::print_header("Job Directory Cleanup");

    if args.max_age_hours == 0 {
        return Err(DftbError::InvalidArgument(
            "max-age-hours must be at least 1".to_string(),
        ));
    }

    if !args.work_dir.exists() {
        return Err(DftbError::DirectoryNotFound {
            path: args.work_dir.display().to_string(),
        });
    }

    let max_age = Duration::from_secs(args.max_age_hours * 3600);
    let now = SystemTime::now();

    let entries: Vec<_> = fs::read_dir(&args.work_dir)
        .map_err(|e| DftbError::FileReadError {
            path: args.work_dir.display().to_string(),
            source: e,
        })?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .collect();

    let mut removed = 0usize;
    let mut retained = 0usize;

    for entry in &entries {
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| now.duration_since(t).ok());

        let expired = matches!(age, Some(age) if age > max_age);

        if !expired {
            retained += 1;
            continue;
        }

        let path = entry.path();
        if args.dry_run {
            output::print_info(&format!("[DRY] would remove {}", path.display()));
            removed += 1;
        } else {
            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    output::print_skip(&format!("Removed {}", path.display()));
                    removed += 1;
                }
                Err(e) => {
                    output::print_warning(&format!(
                        "Failed to remove {}: {}",
                        path.display(),
                        e
                    ));
                    retained += 1;
                }
            }
        }
    }

    output::print_done(&format!(
        "Cleanup finished: {} removed, {} retained (cutoff {} h)",
        removed, retained, args.max_age_hours
    ));

    Ok(())
}
