//! # 引擎驱动模块
//!
//! 驱动外部 DFTB+ 引擎完成几何优化：输入合成、作业监督（隔离目录、
//! 超时、并发上限）、输出解释与作业状态查询。
//!
//! ## 作业目录布局
//! ```text
//! <work-root>/<request-id>/
//!   dftb_in.hsd    (合成器写入)
//!   geometry.gen   (合成器写入)
//!   dftb_out.hsd   (引擎写入，主输出工件)
//!   results.tag    (引擎写入)
//!   geo_end.gen    (引擎写入，可选的终态几何)
//!   error.log      (监督器写入，失败标记)
//!   optimized.cif  (解释器写入)
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/`, `parsers/`
//! - 子模块: input, runner, output, status

pub mod input;
pub mod output;
pub mod runner;
pub mod status;

pub use input::{DftbInput, LatticeConvention, OrthogonalCell, TriclinicCell};
pub use runner::{DftbRunner, JobState, ProcessOutcome, ProcessRunner, SystemProcessRunner};
pub use status::JobStatus;

use std::path::PathBuf;

/// 作业目录内的固定文件名
pub const INPUT_FILE: &str = "dftb_in.hsd";
pub const GEOMETRY_FILE: &str = "geometry.gen";
pub const OUTPUT_FILE: &str = "dftb_out.hsd";
pub const RESULTS_FILE: &str = "results.tag";
pub const GEO_END_FILE: &str = "geo_end.gen";
pub const ERROR_FILE: &str = "error.log";
pub const OPTIMIZED_FILE: &str = "optimized.cif";

/// Hartree → eV 换算系数
pub const HARTREE_TO_EV: f64 = 27.211386245988;

/// 引擎运行配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 作业根目录，每个请求在其下获得独占子目录
    pub work_dir: PathBuf,

    /// DFTB+ 可执行文件路径
    pub dftb_path: PathBuf,

    /// 单个作业的墙钟超时（秒）
    pub timeout_secs: u64,

    /// 同时处于运行态的作业上限
    pub max_jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            work_dir: PathBuf::from("./work"),
            dftb_path: PathBuf::from("dftb+"),
            timeout_secs: 300,
            max_jobs: 10,
        }
    }
}

impl EngineConfig {
    /// 某请求的作业目录路径
    pub fn job_dir(&self, request_id: &str) -> PathBuf {
        self.work_dir.join(request_id)
    }
}
