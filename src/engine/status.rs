//! # 作业状态登记
//!
//! 仅凭文件系统工件推导作业生命周期状态，自身不持有任何内存状态，
//! 因此查询可以跨进程重启存活，并且在作业任意阶段（包括目录尚未
//! 创建、监督器仍在写入时）都可安全调用。
//!
//! 判定顺序：目录缺失 → not_found；错误标记存在 → error；
//! 主输出工件存在 → completed；否则 → running。
//!
//! ## 依赖关系
//! - 被 `commands/status.rs`, `engine/runner.rs` 使用
//! - 使用 `engine/mod.rs` 的文件名常量

use crate::engine::{ERROR_FILE, OUTPUT_FILE};
use serde::Serialize;
use std::path::Path;

/// 从文件系统推导的作业状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    NotFound,
    Running,
    Completed,
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::NotFound => "not_found",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// 查询某请求的作业状态
pub fn job_status(work_dir: &Path, request_id: &str) -> JobStatus {
    status_of_dir(&work_dir.join(request_id))
}

/// 查询某作业目录的状态
pub fn status_of_dir(job_dir: &Path) -> JobStatus {
    if !job_dir.exists() {
        return JobStatus::NotFound;
    }

    if job_dir.join(ERROR_FILE).exists() {
        return JobStatus::Error;
    }

    if job_dir.join(OUTPUT_FILE).exists() {
        return JobStatus::Completed;
    }

    JobStatus::Running
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_status_lifecycle_from_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path();

        // 目录尚不存在
        assert_eq!(job_status(work_dir, "job-1"), JobStatus::NotFound);

        // 目录创建后、输出出现前：运行中
        let job_dir = work_dir.join("job-1");
        fs::create_dir_all(&job_dir).unwrap();
        fs::write(job_dir.join("dftb_in.hsd"), "x").unwrap();
        assert_eq!(job_status(work_dir, "job-1"), JobStatus::Running);

        // 仅凭输出工件出现即转为完成，无需其他信号
        fs::write(job_dir.join(OUTPUT_FILE), "Total energy: -1.0 H\n").unwrap();
        assert_eq!(job_status(work_dir, "job-1"), JobStatus::Completed);
    }

    #[test]
    fn test_error_marker_takes_precedence() {
        let root = tempfile::tempdir().unwrap();
        let job_dir = root.path().join("job-2");
        fs::create_dir_all(&job_dir).unwrap();

        fs::write(job_dir.join(ERROR_FILE), "boom").unwrap();
        assert_eq!(job_status(root.path(), "job-2"), JobStatus::Error);

        // 输出与错误标记并存时仍报告 error
        fs::write(job_dir.join(OUTPUT_FILE), "x").unwrap();
        assert_eq!(job_status(root.path(), "job-2"), JobStatus::Error);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::NotFound.to_string(), "not_found");
        assert_eq!(JobStatus::Completed.to_string(), "completed");
    }
}
