//! # 作业监督器
//!
//! 驱动单个优化作业的完整生命周期：校验请求、在作业根目录下创建
//! 独占工作目录、写入引擎输入、以硬性墙钟超时启动外部 DFTB+ 进程、
//! 解释输出并合成优化后结构。
//!
//! ## 作业状态机
//! ```text
//! created → running → { completed | failed | timed_out }
//! ```
//!
//! ## 并发纪律
//! - 同时处于运行态的作业数受准入计数（原子计数 + RAII 许可）约束，
//!   超限的提交在进入文件系统之前被拒绝，不排队
//! - 作业目录彼此独占，监督器绝不读写其他作业的目录
//! - 校验与解析错误在任何子进程启动之前即返回
//! - 对已通过校验的提交总是返回响应记录，监督层自身不崩溃
//!
//! ## 依赖关系
//! - 被 `commands/optimize.rs`, `commands/batch.rs` 使用
//! - 使用 `engine/input.rs`, `engine/output.rs`, `parsers/cif.rs`
//! - 测试通过注入 `ProcessRunner` 伪实现覆盖超时/失败路径

use crate::engine::input::{self, LatticeConvention, OrthogonalCell};
use crate::engine::{output, EngineConfig, ERROR_FILE, GEOMETRY_FILE, INPUT_FILE, OUTPUT_FILE};
use crate::error::{DftbError, Result};
use crate::models::{OptimizationRequest, OptimizationResponse, XtbMethod};
use crate::parsers::cif;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// 作业生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl JobState {
    /// 合法的状态转移
    pub fn can_advance(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Created, JobState::Running)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Failed)
                | (JobState::Running, JobState::TimedOut)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::TimedOut
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Created => "created",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
        };
        write!(f, "{}", s)
    }
}

/// 一个提交的作业及其隔离执行上下文
#[derive(Debug)]
pub struct Job {
    pub request_id: String,
    pub dir: PathBuf,
    state: JobState,
}

impl Job {
    pub fn new(request_id: impl Into<String>, dir: PathBuf) -> Self {
        Job {
            request_id: request_id.into(),
            dir,
            state: JobState::Created,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// 带守卫的状态转移，非法转移报错
    pub fn advance(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_advance(next) {
            return Err(DftbError::InvalidArgument(format!(
                "job {}: illegal state transition {} -> {}",
                self.request_id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }
}

/// 子进程运行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 进程自行退出
    Exited { success: bool },
    /// 超过墙钟时限，进程已被强制终止
    TimedOut,
}

/// 子进程运行抽象，测试中注入伪实现
pub trait ProcessRunner: Send + Sync {
    fn run(&self, executable: &Path, work_dir: &Path, timeout: Duration) -> Result<ProcessOutcome>;
}

/// 真实子进程运行器：无参数启动，工作目录即作业目录
pub struct SystemProcessRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, executable: &Path, work_dir: &Path, timeout: Duration) -> Result<ProcessOutcome> {
        let mut child = Command::new(executable)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DftbError::EngineExecution {
                reason: format!("failed to launch process: {}", e),
            })?;

        let deadline = Instant::now() + timeout;

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Ok(ProcessOutcome::Exited {
                        success: status.success(),
                    });
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        child.kill().ok();
                        child.wait().ok();
                        return Ok(ProcessOutcome::TimedOut);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(DftbError::EngineExecution {
                        reason: format!("failed to wait for process: {}", e),
                    });
                }
            }
        }
    }
}

/// 准入许可，析构时释放计数
struct AdmissionPermit {
    counter: Arc<AtomicUsize>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// DFTB+ 作业运行器
pub struct DftbRunner {
    config: EngineConfig,
    convention: Box<dyn LatticeConvention>,
    process: Box<dyn ProcessRunner>,
    active: Arc<AtomicUsize>,
}

impl DftbRunner {
    pub fn new(config: EngineConfig) -> Self {
        DftbRunner {
            config,
            convention: Box::new(OrthogonalCell),
            process: Box::new(SystemProcessRunner),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 替换晶格几何约定（如通用三斜变换）
    pub fn with_convention(mut self, convention: Box<dyn LatticeConvention>) -> Self {
        self.convention = convention;
        self
    }

    /// 替换子进程运行器（测试注入）
    pub fn with_process_runner(mut self, process: Box<dyn ProcessRunner>) -> Self {
        self.process = process;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 当前处于运行态的作业数
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 校验优化请求，任何子进程启动之前执行
    pub fn validate_request(&self, request: &OptimizationRequest) -> Result<()> {
        if request.request_id.is_empty() {
            return Err(DftbError::ValidationError(
                "request ID is required".to_string(),
            ));
        }

        // 请求标识同时是目录名，不允许越出作业根目录
        if request.request_id.contains('/')
            || request.request_id.contains('\\')
            || request.request_id.contains("..")
        {
            return Err(DftbError::ValidationError(
                "request ID must not contain path separators".to_string(),
            ));
        }

        if request.structure_file.is_empty() {
            return Err(DftbError::ValidationError(
                "structure file is required".to_string(),
            ));
        }

        request
            .method
            .parse::<XtbMethod>()
            .map_err(DftbError::ValidationError)?;

        if request.fmax <= 0.0 {
            return Err(DftbError::ValidationError(
                "fmax must be positive".to_string(),
            ));
        }

        if request.fmax < 0.001 {
            return Err(DftbError::ValidationError(
                "fmax must be at least 0.001".to_string(),
            ));
        }

        Ok(())
    }

    /// 运行一次几何优化
    ///
    /// 对任何请求都返回响应记录：成功形态或携带请求标识与可读消息的
    /// 错误形态，绝不向上抛出未处理故障。
    pub fn run_optimization(&self, request: &OptimizationRequest) -> OptimizationResponse {
        match self.try_run(request) {
            Ok(response) => response,
            Err(e) => OptimizationResponse::error(&request.request_id, e.to_string()),
        }
    }

    fn try_run(&self, request: &OptimizationRequest) -> Result<OptimizationResponse> {
        // 校验与解析全部先于文件系统写入和子进程启动
        self.validate_request(request)?;

        let content = cif::decode_structure_payload(&request.structure_file)?;
        cif::validate_cif_content(&content)?;
        let crystal = cif::parse_cif_content(&content)?;

        // validate_request 已确认方法合法
        let method: XtbMethod = request
            .method
            .parse()
            .map_err(DftbError::ValidationError)?;

        let input = input::synthesize(&crystal, method, request.fmax, &*self.convention)?;

        if !self.config.dftb_path.exists() {
            return Err(DftbError::EngineUnavailable {
                path: self.config.dftb_path.display().to_string(),
            });
        }

        let _permit = self.try_acquire()?;

        let job_dir = self.config.job_dir(&request.request_id);
        let mut job = Job::new(&request.request_id, job_dir);
        self.prepare_job_dir(&job, &input)?;

        job.advance(JobState::Running)?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let outcome = match self.process.run(&self.config.dftb_path, &job.dir, timeout) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail_job(&mut job, JobState::Failed, &e);
                return Err(e);
            }
        };

        match outcome {
            ProcessOutcome::TimedOut => {
                let e = DftbError::Timeout {
                    seconds: self.config.timeout_secs,
                };
                self.fail_job(&mut job, JobState::TimedOut, &e);
                return Err(e);
            }
            ProcessOutcome::Exited { success: false } => {
                let e = DftbError::EngineExecution {
                    reason: "process exited with failure status".to_string(),
                };
                self.fail_job(&mut job, JobState::Failed, &e);
                return Err(e);
            }
            ProcessOutcome::Exited { success: true } => {}
        }

        let output_path = job.dir.join(OUTPUT_FILE);
        if !output_path.exists() {
            let e = DftbError::EngineExecution {
                reason: "output file not found after engine exit".to_string(),
            };
            self.fail_job(&mut job, JobState::Failed, &e);
            return Err(e);
        }

        let record = match output::interpret(&output_path) {
            Ok(record) => record,
            Err(e) => {
                self.fail_job(&mut job, JobState::Failed, &e);
                return Err(e);
            }
        };

        let optimized_path =
            output::write_optimized_cif(&job.dir, &crystal, method, &*self.convention)?;

        let optimized_content =
            fs::read_to_string(&optimized_path).map_err(|e| DftbError::FileReadError {
                path: optimized_path.display().to_string(),
                source: e,
            })?;

        job.advance(JobState::Completed)?;

        Ok(OptimizationResponse::success(
            &request.request_id,
            record,
            cif::encode_structure_payload(&optimized_content),
        ))
    }

    /// 创建作业目录并写入引擎输入文件
    fn prepare_job_dir(&self, job: &Job, input: &input::DftbInput) -> Result<()> {
        fs::create_dir_all(&job.dir).map_err(|e| DftbError::FileWriteError {
            path: job.dir.display().to_string(),
            source: e,
        })?;

        let input_path = job.dir.join(INPUT_FILE);
        fs::write(&input_path, input::hsd_content(input)).map_err(|e| {
            DftbError::FileWriteError {
                path: input_path.display().to_string(),
                source: e,
            }
        })?;

        let geometry_path = job.dir.join(GEOMETRY_FILE);
        fs::write(&geometry_path, input::gen_content(input)).map_err(|e| {
            DftbError::FileWriteError {
                path: geometry_path.display().to_string(),
                source: e,
            }
        })?;

        Ok(())
    }

    /// 进入终态失败分支：写错误标记，推进状态机
    ///
    /// 标记内容保留具体失败原因，超时与一般执行失败在日志中可区分。
    fn fail_job(&self, job: &mut Job, terminal: JobState, err: &DftbError) {
        fs::write(job.dir.join(ERROR_FILE), format!("{}\n", err)).ok();
        job.advance(terminal).ok();
    }

    fn try_acquire(&self) -> Result<AdmissionPermit> {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n < self.config.max_jobs {
                    Some(n + 1)
                } else {
                    None
                }
            })
            .map(|_| AdmissionPermit {
                counter: Arc::clone(&self.active),
            })
            .map_err(|_| DftbError::AdmissionLimit {
                limit: self.config.max_jobs,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::status::{job_status, JobStatus};
    use crate::engine::RESULTS_FILE;

    const TEST_CIF: &str = r#"
data_test
_cell_length_a    10.0
_cell_length_b    10.0
_cell_length_c    10.0
_cell_angle_alpha 90.0
_cell_angle_beta  90.0
_cell_angle_gamma 90.0

loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
C1 C 0.0 0.0 0.0
C2 C 0.5 0.5 0.0
"#;

    const SAMPLE_OUTPUT: &str = "\
Total energy:                      -4.2423949718 H         -115.4414 eV
Fermi level:                       -0.2116243498 H           -5.7586 eV
Total charge:                       0.00000000
SCC converged
Geometry converged
";

    /// 总是成功并留下输出工件的伪引擎
    struct SucceedingEngine;

    impl ProcessRunner for SucceedingEngine {
        fn run(&self, _exe: &Path, work_dir: &Path, _t: Duration) -> Result<ProcessOutcome> {
            fs::write(work_dir.join(OUTPUT_FILE), SAMPLE_OUTPUT).unwrap();
            fs::write(work_dir.join(RESULTS_FILE), "total_energy :real:0:\n").unwrap();
            Ok(ProcessOutcome::Exited { success: true })
        }
    }

    /// 总是超时的伪引擎
    struct TimingOutEngine;

    impl ProcessRunner for TimingOutEngine {
        fn run(&self, _exe: &Path, _dir: &Path, _t: Duration) -> Result<ProcessOutcome> {
            Ok(ProcessOutcome::TimedOut)
        }
    }

    /// 以非零状态退出的伪引擎
    struct FailingEngine;

    impl ProcessRunner for FailingEngine {
        fn run(&self, _exe: &Path, _dir: &Path, _t: Duration) -> Result<ProcessOutcome> {
            Ok(ProcessOutcome::Exited { success: false })
        }
    }

    /// 干净退出但不写任何输出的伪引擎
    struct SilentEngine;

    impl ProcessRunner for SilentEngine {
        fn run(&self, _exe: &Path, _dir: &Path, _t: Duration) -> Result<ProcessOutcome> {
            Ok(ProcessOutcome::Exited { success: true })
        }
    }

    fn test_config(root: &Path) -> EngineConfig {
        // 指向真实存在的文件以通过引擎可用性检查
        let exe = root.join("dftb+");
        fs::write(&exe, "").unwrap();

        EngineConfig {
            work_dir: root.join("work"),
            dftb_path: exe,
            timeout_secs: 5,
            max_jobs: 4,
        }
    }

    fn carbon_request(id: &str) -> OptimizationRequest {
        OptimizationRequest {
            request_id: id.to_string(),
            structure_file: cif::encode_structure_payload(TEST_CIF),
            method: "GFN2-xTB".to_string(),
            fmax: 0.001,
            original_filename: None,
        }
    }

    #[test]
    fn test_job_state_transitions() {
        assert!(JobState::Created.can_advance(JobState::Running));
        assert!(JobState::Running.can_advance(JobState::Completed));
        assert!(JobState::Running.can_advance(JobState::Failed));
        assert!(JobState::Running.can_advance(JobState::TimedOut));

        assert!(!JobState::Created.can_advance(JobState::Completed));
        assert!(!JobState::Completed.can_advance(JobState::Running));
        assert!(!JobState::TimedOut.can_advance(JobState::Failed));

        assert!(JobState::TimedOut.is_terminal());
        assert!(!JobState::Running.is_terminal());

        let mut job = Job::new("j", PathBuf::from("/tmp/j"));
        assert_eq!(job.state(), JobState::Created);
        assert!(job.advance(JobState::Completed).is_err());
        job.advance(JobState::Running).unwrap();
        job.advance(JobState::TimedOut).unwrap();
        assert!(job.advance(JobState::Running).is_err());
    }

    #[test]
    fn test_two_atom_carbon_optimization_completes() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let work_dir = config.work_dir.clone();
        let runner = DftbRunner::new(config).with_process_runner(Box::new(SucceedingEngine));

        let response = runner.run_optimization(&carbon_request("carbon-1"));

        assert!(response.is_success(), "{:?}", response.error_message);
        assert_eq!(response.request_id, "carbon-1");

        let record = response.parsed_data.unwrap();
        assert!((record.energies_ev["total"] - (-115.4414)).abs() < 1e-6);
        assert!(record.convergence_info.scc_converged);

        let optimized = cif::decode_structure_payload(&response.optimized_cif.unwrap()).unwrap();
        assert!(optimized.contains("data_test_optimized"));

        assert_eq!(job_status(&work_dir, "carbon-1"), JobStatus::Completed);
        assert_eq!(runner.active_jobs(), 0);
    }

    #[test]
    fn test_engine_failure_writes_error_marker() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let work_dir = config.work_dir.clone();
        let runner = DftbRunner::new(config).with_process_runner(Box::new(FailingEngine));

        let response = runner.run_optimization(&carbon_request("fail-1"));

        assert!(!response.is_success());
        assert!(response
            .error_message
            .as_deref()
            .unwrap()
            .contains("failure status"));
        assert!(work_dir.join("fail-1").join(ERROR_FILE).exists());
        assert_eq!(job_status(&work_dir, "fail-1"), JobStatus::Error);
    }

    #[test]
    fn test_timeout_reported_distinctly_but_same_status() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let work_dir = config.work_dir.clone();
        let runner = DftbRunner::new(config).with_process_runner(Box::new(TimingOutEngine));

        let response = runner.run_optimization(&carbon_request("slow-1"));

        assert!(!response.is_success());
        let message = response.error_message.unwrap();
        assert!(message.contains("timed out after 5 seconds"));

        // 错误标记保留了超时原因，对外状态与一般失败一致
        let marker = fs::read_to_string(work_dir.join("slow-1").join(ERROR_FILE)).unwrap();
        assert!(marker.contains("timed out"));
        assert_eq!(job_status(&work_dir, "slow-1"), JobStatus::Error);
    }

    #[test]
    fn test_missing_output_after_clean_exit_fails() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let work_dir = config.work_dir.clone();
        let runner = DftbRunner::new(config).with_process_runner(Box::new(SilentEngine));

        let response = runner.run_optimization(&carbon_request("silent-1"));

        assert!(!response.is_success());
        assert!(response
            .error_message
            .as_deref()
            .unwrap()
            .contains("output file not found"));
        assert_eq!(job_status(&work_dir, "silent-1"), JobStatus::Error);
    }

    #[test]
    fn test_bad_method_rejected_before_any_launch() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let work_dir = config.work_dir.clone();
        let runner = DftbRunner::new(config).with_process_runner(Box::new(SucceedingEngine));

        let mut request = carbon_request("bad-method");
        request.method = "BAD-METHOD".to_string();

        let response = runner.run_optimization(&request);

        assert!(!response.is_success());
        assert!(response
            .error_message
            .as_deref()
            .unwrap()
            .contains("invalid method: BAD-METHOD"));
        // 校验失败不会留下作业目录
        assert_eq!(job_status(&work_dir, "bad-method"), JobStatus::NotFound);
    }

    #[test]
    fn test_zero_fmax_rejected() {
        let root = tempfile::tempdir().unwrap();
        let runner = DftbRunner::new(test_config(root.path()))
            .with_process_runner(Box::new(SucceedingEngine));

        let mut request = carbon_request("zero-fmax");
        request.fmax = 0.0;

        let response = runner.run_optimization(&request);
        assert!(response
            .error_message
            .as_deref()
            .unwrap()
            .contains("fmax must be positive"));

        request.request_id = "tiny-fmax".to_string();
        request.fmax = 0.0005;

        let response = runner.run_optimization(&request);
        assert!(response
            .error_message
            .as_deref()
            .unwrap()
            .contains("at least 0.001"));
    }

    #[test]
    fn test_bad_base64_payload_rejected() {
        let root = tempfile::tempdir().unwrap();
        let runner = DftbRunner::new(test_config(root.path()))
            .with_process_runner(Box::new(SucceedingEngine));

        let mut request = carbon_request("bad-payload");
        request.structure_file = "@@@not base64@@@".to_string();

        let response = runner.run_optimization(&request);
        assert!(!response.is_success());
        assert!(response
            .error_message
            .as_deref()
            .unwrap()
            .contains("decode"));
    }

    #[test]
    fn test_admission_limit_rejects_and_releases() {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        config.max_jobs = 0;
        let runner = DftbRunner::new(config).with_process_runner(Box::new(SucceedingEngine));

        let response = runner.run_optimization(&carbon_request("over-limit"));
        assert!(response
            .error_message
            .as_deref()
            .unwrap()
            .contains("submission rejected"));

        // 上限为 1 时顺序提交互不影响：许可随作业结束释放
        let root2 = tempfile::tempdir().unwrap();
        let mut config2 = test_config(root2.path());
        config2.max_jobs = 1;
        let runner2 = DftbRunner::new(config2).with_process_runner(Box::new(SucceedingEngine));

        assert!(runner2.run_optimization(&carbon_request("seq-1")).is_success());
        assert!(runner2.run_optimization(&carbon_request("seq-2")).is_success());
        assert_eq!(runner2.active_jobs(), 0);
    }

    #[test]
    fn test_request_id_with_path_separator_rejected() {
        let root = tempfile::tempdir().unwrap();
        let runner = DftbRunner::new(test_config(root.path()))
            .with_process_runner(Box::new(SucceedingEngine));

        let request = carbon_request("../escape");
        let response = runner.run_optimization(&request);
        assert!(response
            .error_message
            .as_deref()
            .unwrap()
            .contains("path separators"));
    }

    #[cfg(unix)]
    mod system_process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            fs::write(&path, body).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_system_runner_reports_exit_status() {
            let dir = tempfile::tempdir().unwrap();
            let ok = write_script(dir.path(), "ok.sh", "#!/bin/sh\nexit 0\n");
            let bad = write_script(dir.path(), "bad.sh", "#!/bin/sh\nexit 3\n");

            let runner = SystemProcessRunner;
            assert_eq!(
                runner.run(&ok, dir.path(), Duration::from_secs(5)).unwrap(),
                ProcessOutcome::Exited { success: true }
            );
            assert_eq!(
                runner.run(&bad, dir.path(), Duration::from_secs(5)).unwrap(),
                ProcessOutcome::Exited { success: false }
            );
        }

        #[test]
        fn test_system_runner_kills_on_timeout() {
            let dir = tempfile::tempdir().unwrap();
            let slow = write_script(dir.path(), "slow.sh", "#!/bin/sh\nsleep 30\n");

            let runner = SystemProcessRunner;
            let started = Instant::now();
            let outcome = runner
                .run(&slow, dir.path(), Duration::from_millis(300))
                .unwrap();

            assert_eq!(outcome, ProcessOutcome::TimedOut);
            // 进程被强制终止，不会等满 30 秒
            assert!(started.elapsed() < Duration::from_secs(5));
        }
    }
}
