//! # batch 命令实现
//!
//! 批量提交目录下的 CIF 结构做几何优化。
//!
//! ## 功能
//! - 收集匹配的结构文件
//! - 经同一运行器并行提交（并发上限仍然生效）
//! - 已完成的作业默认跳过
//! - 写出 CSV 汇总
//!
//! ## 依赖关系
//! - 使用 `cli/batch.rs` 定义的参数
//! - 使用 `batch/`, `engine/`
//! - 使用 `utils/output.rs`

use crate::batch::{BatchResult, BatchRunner, FileCollector, JobOutcome};
use crate::cli::batch::BatchArgs;
use crate::engine::status::{status_of_dir, JobStatus};
use crate::engine::{DftbRunner, TriclinicCell};
use crate::error::{DftbError, Result};
use crate::models::OptimizationRequest;
use crate::parsers::cif;
use crate::utils::output;

use std::fs;
use std::path::Path;

/// 执行 batch 命令
pub fn execute(args: BatchArgs) -> Result<()> {
    output::print_header("Batch Geometry Optimization");

    if !args.input.exists() {
        return Err(DftbError::DirectoryNotFound {
            path: args.input.display().to_string(),
        });
    }

    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect();

    if files.is_empty() {
        output::print_warning(&format!(
            "No files matched '{}' under {}",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    output::print_info(&format!("Found {} structures to optimize", files.len()));

    let mut runner = DftbRunner::new(args.engine.to_config());
    if args.engine.triclinic {
        runner = runner.with_convention(Box::new(TriclinicCell));
    }
    let runner = &runner;

    let work_dir = runner.config().work_dir.clone();
    let overwrite = args.overwrite;
    let method = args.method.clone();
    let fmax = args.fmax;

    let result = BatchRunner::new(args.jobs).run(files, |file| {
        let name = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("structure")
            .to_string();

        // 已有完成结果的作业默认不重跑
        if !overwrite && status_of_dir(&work_dir.join(&name)) == JobStatus::Completed {
            return JobOutcome::Skipped { name };
        }

        let content = match fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                return JobOutcome::Failed {
                    name,
                    message: format!("failed to read file: {}", e),
                };
            }
        };

        let request = OptimizationRequest {
            request_id: name.clone(),
            structure_file: cif::encode_structure_payload(&content),
            method: method.clone(),
            fmax,
            original_filename: file.file_name().map(|n| n.to_string_lossy().to_string()),
        };

        let response = runner.run_optimization(&request);

        if response.is_success() {
            let energy_ev = response
                .parsed_data
                .as_ref()
                .and_then(|record| record.total_energy_ev());
            JobOutcome::Completed { name, energy_ev }
        } else {
            JobOutcome::Failed {
                name,
                message: response.error_message.unwrap_or_default(),
            }
        }
    });

    write_summary_csv(&result, &args.summary)?;

    output::print_separator();
    output::print_done(&format!(
        "Processed {} structures: {} completed, {} skipped, {} failed",
        result.total(),
        result.completed,
        result.skipped,
        result.failed
    ));
    output::print_info(&format!("Summary saved to '{}'", args.summary.display()));

    Ok(())
}

/// 保存批量结果到 CSV
fn write_summary_csv(result: &BatchResult, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(DftbError::CsvError)?;

    wtr.write_record(["structure", "status", "total_energy_eV", "detail"])
        .map_err(DftbError::CsvError)?;

    for outcome in &result.outcomes {
        let record = match outcome {
            JobOutcome::Completed { name, energy_ev } => [
                name.clone(),
                "completed".to_string(),
                energy_ev.map(|e| format!("{:.6}", e)).unwrap_or_default(),
                String::new(),
            ],
            JobOutcome::Skipped { name } => [
                name.clone(),
                "skipped".to_string(),
                String::new(),
                String::new(),
            ],
            JobOutcome::Failed { name, message } => [
                name.clone(),
                "failed".to_string(),
                String::new(),
                message.clone(),
            ],
        };
        wtr.write_record(&record).map_err(DftbError::CsvError)?;
    }

    wtr.flush().map_err(|e| DftbError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}
