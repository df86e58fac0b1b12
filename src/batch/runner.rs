//! # 批量执行器
//!
//! 并行提交多个优化作业并汇总结果。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代
//! - 进度条显示
//! - 逐作业结果收集与汇总统计
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行提交

use crate::utils::progress;

use rayon::prelude::*;
use std::path::PathBuf;

/// 单个作业的提交结果
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// 作业完成
    Completed {
        name: String,
        energy_ev: Option<f64>,
    },
    /// 跳过（作业目录中已有完成的结果）
    Skipped { name: String },
    /// 作业失败
    Failed { name: String, message: String },
}

impl JobOutcome {
    pub fn name(&self) -> &str {
        match self {
            JobOutcome::Completed { name, .. } => name,
            JobOutcome::Skipped { name } => name,
            JobOutcome::Failed { name, .. } => name,
        }
    }
}

/// 批量提交结果统计
#[derive(Debug, Default)]
pub struct BatchResult {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// 逐作业结果，顺序与输入文件一致
    pub outcomes: Vec<JobOutcome>,
}

impl BatchResult {
    fn merge(&mut self, outcome: JobOutcome) {
        match &outcome {
            JobOutcome::Completed { .. } => self.completed += 1,
            JobOutcome::Skipped { .. } => self.skipped += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行提交数
    jobs: usize,
}

impl BatchRunner {
    /// 创建新的批量执行器，0 表示使用全部 CPU 核心
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    /// 并行处理文件列表
    pub fn run<F>(&self, files: Vec<PathBuf>, processor: F) -> BatchResult
    where
        F: Fn(&PathBuf) -> JobOutcome + Sync + Send,
    {
        let total = files.len();
        let pb = progress::create_progress_bar(total as u64, "Optimizing");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .unwrap();

        let outcomes: Vec<JobOutcome> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let outcome = processor(file);
                    if let JobOutcome::Failed { name, message } = &outcome {
                        pb.suspend(|| {
                            crate::utils::output::print_error(&format!("{}: {}", name, message));
                        });
                    }
                    pb.inc(1);
                    outcome
                })
                .collect()
        });

        pb.finish_and_clear();

        let mut result = BatchResult::default();
        for outcome in outcomes {
            result.merge(outcome);
        }

        result
    }
}
