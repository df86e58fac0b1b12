//! # optimize 命令实现
//!
//! 提交单个 CIF 结构做 DFTB+ 几何优化并报告结果。
//!
//! ## 功能
//! - 从 CIF 文件或 JSON 请求记录构造优化请求
//! - 驱动作业运行器完成整条流水线
//! - 打印能量/收敛摘要，按需写出响应记录与优化后结构
//!
//! ## 依赖关系
//! - 使用 `cli/optimize.rs` 定义的参数
//! - 使用 `engine/runner.rs`, `parsers/cif.rs`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::optimize::OptimizeArgs;
use crate::engine::{DftbRunner, TriclinicCell};
use crate::error::{DftbError, Result};
use crate::models::{OptimizationRequest, OptimizationResponse, ResultRecord};
use crate::parsers::cif;
use crate::utils::{output, progress};

use std::fs;
use std::path::Path;

/// 执行 optimize 命令
pub fn execute(args: OptimizeArgs) -> Result<()> {
    output::print_header("DFTB+ Geometry Optimization");

    let mut request = build_request(&args)?;
    request.ensure_request_id();

    let mut runner = DftbRunner::new(args.engine.to_config());
    if args.engine.triclinic {
        runner = runner.with_convention(Box::new(TriclinicCell));
    }

    output::print_kv("Request ID", &request.request_id);
    output::print_kv("Method", &request.method);
    output::print_kv("fmax", &format!("{}", request.fmax));

    if let Some(ref cif_path) = args.cif {
        if let Ok(crystal) = cif::parse_cif_file(cif_path) {
            output::print_kv(
                "Structure",
                &format!(
                    "{} ({}, {} atoms)",
                    crystal.name,
                    crystal.formula(),
                    crystal.atoms.len()
                ),
            );
        }
    }
    println!();

    let spinner = progress::create_spinner("Running DFTB+ geometry optimization...");
    let response = runner.run_optimization(&request);
    spinner.finish_and_clear();

    if let Some(ref json_path) = args.json {
        write_response_record(&response, json_path)?;
        output::print_info(&format!(
            "Response record written to '{}'",
            json_path.display()
        ));
    }

    if !response.is_success() {
        let message = response
            .error_message
            .as_deref()
            .unwrap_or("unknown failure");
        output::print_error(&format!("{}: {}", response.request_id, message));
        std::process::exit(1);
    }

    output::print_success(&format!("Optimization completed: {}", response.request_id));

    if let Some(ref record) = response.parsed_data {
        print_result(record);
    }

    if let Some(ref cif_path) = args.save_cif {
        save_optimized_cif(&response, cif_path)?;
        output::print_success(&format!(
            "Optimized structure saved to '{}'",
            cif_path.display()
        ));
    }

    Ok(())
}

/// 从命令行参数构造优化请求
fn build_request(args: &OptimizeArgs) -> Result<OptimizationRequest> {
    if let Some(ref request_path) = args.request {
        let text = fs::read_to_string(request_path).map_err(|e| DftbError::FileReadError {
            path: request_path.display().to_string(),
            source: e,
        })?;

        let mut request: OptimizationRequest = serde_json::from_str(&text).map_err(|e| {
            DftbError::InvalidArgument(format!("Invalid request record: {}", e))
        })?;

        if let Some(ref id) = args.request_id {
            request.request_id = id.clone();
        }
        return Ok(request);
    }

    let Some(cif_path) = args.cif.as_ref() else {
        return Err(DftbError::InvalidArgument(
            "either --cif or --request is required".to_string(),
        ));
    };

    let content = fs::read_to_string(cif_path).map_err(|e| DftbError::FileReadError {
        path: cif_path.display().to_string(),
        source: e,
    })?;

    Ok(OptimizationRequest {
        request_id: args.request_id.clone().unwrap_or_default(),
        structure_file: cif::encode_structure_payload(&content),
        method: args.method.clone(),
        fmax: args.fmax,
        original_filename: cif_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string()),
    })
}

/// 打印结果摘要
fn print_result(record: &ResultRecord) {
    if let Some(total) = record.energies_ev.get("total") {
        output::print_kv("Total energy (eV)", &format!("{:.6}", total));
    }
    if let Some(total) = record.energies_hartree.get("total") {
        output::print_kv("Total energy (Hartree)", &format!("{:.10}", total));
    }
    output::print_kv(
        "SCC converged",
        if record.convergence_info.scc_converged {
            "yes"
        } else {
            "no"
        },
    );
    output::print_kv("Geometry", &record.summary.convergence_status);

    if let Some(fermi) = record.electronic_properties.fermi_level_ev {
        output::print_kv("Fermi level (eV)", &format!("{:.4}", fermi));
    }

    for warning in &record.summary.warnings {
        output::print_warning(warning);
    }
}

/// 写出 JSON 响应记录
fn write_response_record(response: &OptimizationResponse, path: &Path) -> Result<()> {
    // 自有类型的序列化不会失败
    let text = serde_json::to_string_pretty(response).unwrap();

    fs::write(path, text).map_err(|e| DftbError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 解码并保存优化后的结构文件
fn save_optimized_cif(response: &OptimizationResponse, path: &Path) -> Result<()> {
    let Some(ref payload) = response.optimized_cif else {
        return Err(DftbError::InvalidArgument(
            "response carries no optimized structure payload".to_string(),
        ));
    };

    let content = cif::decode_structure_payload(payload)?;

    fs::write(path, content).map_err(|e| DftbError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
