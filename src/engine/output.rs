//! # 引擎输出解释器
//!
//! 解析 DFTB+ 主输出工件，提取能量、收敛标志与电子性质，并合成
//! 带出处信息的优化后 CIF 结构文件。
//!
//! 解释是内容的纯函数：同一工件重复解释产生逐位一致的结果记录。
//!
//! ## 依赖关系
//! - 被 `engine/runner.rs`, `commands/` 使用
//! - 使用 `models/`, `parsers/cif.rs`
//! - 使用 `regex` 提取数值，`chrono` 生成出处日期

use crate::engine::input::LatticeConvention;
use crate::engine::{GEO_END_FILE, HARTREE_TO_EV, OPTIMIZED_FILE};
use crate::error::{DftbError, Result};
use crate::models::{Crystal, DipoleMoment, ResultRecord, XtbMethod};
use crate::parsers::cif::to_cif_string;

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// 解析主输出工件为结果记录
///
/// 工件不可读或缺少总能量时失败。
pub fn interpret(path: &Path) -> Result<ResultRecord> {
    let content = fs::read_to_string(path).map_err(|e| DftbError::OutputParseError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let record = interpret_content(&content);

    if record.total_energy_ev().is_none() {
        return Err(DftbError::OutputParseError {
            path: path.display().to_string(),
            reason: "no total energy found in output".to_string(),
        });
    }

    Ok(record)
}

/// 从工件文本构建结果记录（纯函数）
fn interpret_content(content: &str) -> ResultRecord {
    let mut record = ResultRecord::default();
    let mut geometry_converged = false;

    for line in content.lines() {
        let line = line.trim();

        if line.contains("WARNING") {
            record.summary.warnings.push(line.to_string());
            continue;
        }

        if line.contains("SCC is NOT converged") {
            record.convergence_info.scc_converged = false;
            record.summary.warnings.push(line.to_string());
            continue;
        }

        if line.contains("SCC converged") {
            record.convergence_info.scc_converged = true;
            continue;
        }

        if line.contains("Geometry converged") {
            geometry_converged = true;
            continue;
        }

        if let Some(rest) = line.strip_prefix("Total energy:") {
            store_energy(&mut record, "total", rest);
        } else if let Some(rest) = line.strip_prefix("Total Electronic energy:") {
            store_energy(&mut record, "electronic", rest);
        } else if let Some(rest) = line.strip_prefix("Repulsive energy:") {
            store_energy(&mut record, "repulsive", rest);
        } else if let Some(rest) = line.strip_prefix("Fermi level:") {
            let (hartree, ev) = extract_unit_values(rest);
            record.electronic_properties.fermi_level_ev =
                ev.or_else(|| hartree.map(|h| h * HARTREE_TO_EV));
        } else if let Some(rest) = line.strip_prefix("Total charge:") {
            record.electronic_properties.total_charge = first_number(rest);
        } else if let Some(rest) = line.strip_prefix("Dipole moment:") {
            // au 与 Debye 两行都会出现，只保留 Debye
            if rest.contains("Debye") {
                record.electronic_properties.dipole_moment_debye = extract_dipole(rest);
            }
        } else if line.starts_with("ERROR!") {
            record.summary.error = Some(line.to_string());
        }
    }

    record.summary.convergence_status = if geometry_converged {
        "converged".to_string()
    } else {
        "not_converged".to_string()
    };

    record.summary.calculation_status = if record.summary.error.is_none() {
        "completed".to_string()
    } else {
        "failed".to_string()
    };

    record
}

/// 将一条能量行写入两套单位制映射，缺失的单位按系数换算补齐
fn store_energy(record: &mut ResultRecord, label: &str, rest: &str) {
    let (hartree, ev) = extract_unit_values(rest);

    let hartree = hartree.or_else(|| ev.map(|v| v / HARTREE_TO_EV));
    let ev = ev.or_else(|| hartree.map(|v| v * HARTREE_TO_EV));

    if let (Some(h), Some(e)) = (hartree, ev) {
        record.energies_hartree.insert(label.to_string(), h);
        record.energies_ev.insert(label.to_string(), e);
    }
}

/// 提取 "value H ... value eV" 形式的带单位数值对
fn extract_unit_values(rest: &str) -> (Option<f64>, Option<f64>) {
    let re = Regex::new(r"(-?[0-9]+\.?[0-9]*(?:[eE][+-]?[0-9]+)?)\s*(H|eV)\b").unwrap();

    let mut hartree = None;
    let mut ev = None;

    for cap in re.captures_iter(rest) {
        let value: f64 = match cap[1].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        match &cap[2] {
            "H" => hartree = hartree.or(Some(value)),
            "eV" => ev = ev.or(Some(value)),
            _ => {}
        }
    }

    (hartree, ev)
}

/// 行内第一个数值
fn first_number(rest: &str) -> Option<f64> {
    rest.split_whitespace().find_map(|tok| tok.parse().ok())
}

/// 行内前三个数值作为偶极矩分量
fn extract_dipole(rest: &str) -> Option<DipoleMoment> {
    let values: Vec<f64> = rest
        .split_whitespace()
        .filter_map(|tok| tok.parse().ok())
        .take(3)
        .collect();

    if values.len() == 3 {
        Some(DipoleMoment {
            x: values[0],
            y: values[1],
            z: values[2],
        })
    } else {
        None
    }
}

/// 合成优化后的 CIF 结构文件并写入作业目录
///
/// 引擎留有终态几何文件且原子数一致时，其坐标经晶格约定折回分数
/// 坐标；否则沿用输入坐标。新结构是独立副本，带 `_audit_*` 出处
/// 元数据，不与解析得到的原结构共享存储。
pub fn write_optimized_cif(
    job_dir: &Path,
    crystal: &Crystal,
    method: XtbMethod,
    convention: &dyn LatticeConvention,
) -> Result<PathBuf> {
    let mut optimized = crystal.clone();
    optimized.name = format!("{}_optimized", crystal.name);

    let geo_end = job_dir.join(GEO_END_FILE);
    if let Ok(text) = fs::read_to_string(&geo_end) {
        if let Some((flag, coords)) = parse_gen_coordinates(&text) {
            if coords.len() == optimized.atoms.len() {
                for (atom, coord) in optimized.atoms.iter_mut().zip(&coords) {
                    atom.fract = if flag == 'F' {
                        *coord
                    } else {
                        convention.fractional(&crystal.cell, *coord)
                    };
                }
            }
        }
    }

    for atom in &mut optimized.atoms {
        if atom.u_iso.is_none() {
            atom.u_iso = Some(0.01);
        }
    }

    optimized.metadata.insert(
        "_audit_creation_method".to_string(),
        format!("DFTB+ geometry optimization ({})", method),
    );
    optimized.metadata.insert(
        "_audit_creation_date".to_string(),
        chrono::Local::now().format("%Y-%m-%d").to_string(),
    );

    let path = job_dir.join(OPTIMIZED_FILE);
    fs::write(&path, to_cif_string(&optimized)).map_err(|e| DftbError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(path)
}

/// 解析 gen 几何文件的坐标行
///
/// 返回 (周期标志, 坐标)。标志 'F' 表示分数坐标，'S'/'C' 为笛卡尔。
fn parse_gen_coordinates(text: &str) -> Option<(char, Vec<[f64; 3]>)> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let header = lines.next()?;
    let mut parts = header.split_whitespace();
    let count: usize = parts.next()?.parse().ok()?;
    let flag = parts.next()?.chars().next()?;

    // 元素类型行
    lines.next()?;

    let mut coords = Vec::with_capacity(count);
    for line in lines.take(count) {
        let values: Vec<f64> = line
            .split_whitespace()
            .skip(2) // 序号与元素索引
            .filter_map(|tok| tok.parse().ok())
            .take(3)
            .collect();
        if values.len() != 3 {
            return None;
        }
        coords.push([values[0], values[1], values[2]]);
    }

    if coords.len() == count {
        Some((flag, coords))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::input::OrthogonalCell;
    use crate::models::{AtomSite, Cell};
    use crate::parsers::cif::parse_cif_content;

    const SAMPLE_OUTPUT: &str = "\
Geometry optimization step: 12

Total Electronic energy:           -4.3954221810 H         -119.6057 eV
Repulsive energy:                   0.1530272092 H            4.1640 eV
Total energy:                      -4.2423949718 H         -115.4414 eV

Fermi level:                       -0.2116243498 H           -5.7586 eV
Total charge:                       0.00000000
Dipole moment:                      0.00000000  0.12000000  0.00000000 au
Dipole moment:                      0.00000000  0.30500000  0.00000000 Debye

SCC converged
Geometry converged
";

    #[test]
    fn test_interpret_sample_output() {
        let record = interpret_content(SAMPLE_OUTPUT);

        assert!((record.energies_ev["total"] - (-115.4414)).abs() < 1e-6);
        assert!((record.energies_hartree["total"] - (-4.2423949718)).abs() < 1e-10);
        assert!((record.energies_ev["electronic"] - (-119.6057)).abs() < 1e-6);
        assert!((record.energies_hartree["repulsive"] - 0.1530272092).abs() < 1e-10);

        assert!(record.convergence_info.scc_converged);
        assert_eq!(record.summary.convergence_status, "converged");
        assert_eq!(record.summary.calculation_status, "completed");

        let props = &record.electronic_properties;
        assert!((props.fermi_level_ev.unwrap() - (-5.7586)).abs() < 1e-6);
        assert_eq!(props.total_charge, Some(0.0));
        assert!((props.dipole_moment_debye.unwrap().y - 0.305).abs() < 1e-6);
    }

    #[test]
    fn test_interpret_is_idempotent() {
        let first = interpret_content(SAMPLE_OUTPUT);
        let second = interpret_content(SAMPLE_OUTPUT);
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_unit_energy_converted() {
        let record = interpret_content("Total energy: -115.4414 eV\nSCC converged\n");

        let hartree = record.energies_hartree["total"];
        assert!((hartree - (-115.4414 / HARTREE_TO_EV)).abs() < 1e-9);
        assert!((record.energies_ev["total"] - (-115.4414)).abs() < 1e-9);
    }

    #[test]
    fn test_warnings_and_failed_scc() {
        let content = "\
WARNING! Dubious parameters
Total energy: -1.0 H
SCC is NOT converged, maximal SCC iterations exceeded
";
        let record = interpret_content(content);

        assert!(!record.convergence_info.scc_converged);
        assert_eq!(record.summary.convergence_status, "not_converged");
        assert_eq!(record.summary.warnings.len(), 2);
    }

    #[test]
    fn test_interpret_rejects_artifact_without_total_energy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dftb_out.hsd");
        fs::write(&path, "nothing useful here\n").unwrap();

        let err = interpret(&path).unwrap_err();
        assert!(matches!(err, DftbError::OutputParseError { .. }));
    }

    #[test]
    fn test_interpret_missing_artifact() {
        let err = interpret(Path::new("/nonexistent/dftb_out.hsd")).unwrap_err();
        assert!(matches!(err, DftbError::OutputParseError { .. }));
    }

    fn two_carbon_crystal() -> Crystal {
        let mut crystal = Crystal::new("test");
        crystal.cell = Cell::new(10.0, 10.0, 10.0, 90.0, 90.0, 90.0);
        crystal.atoms = vec![
            AtomSite::new("C1", "C", [0.0, 0.0, 0.0]),
            AtomSite::new("C2", "C", [0.5, 0.5, 0.0]),
        ];
        crystal
    }

    #[test]
    fn test_write_optimized_cif_without_end_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let crystal = two_carbon_crystal();

        let path =
            write_optimized_cif(dir.path(), &crystal, XtbMethod::Gfn2Xtb, &OrthogonalCell)
                .unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let optimized = parse_cif_content(&written).unwrap();

        assert_eq!(optimized.name, "test_optimized");
        assert_eq!(optimized.atoms.len(), 2);
        assert_eq!(optimized.atoms[1].fract, [0.5, 0.5, 0.0]);
        assert_eq!(
            optimized
                .metadata
                .get("_audit_creation_method")
                .map(String::as_str),
            Some("DFTB+ geometry optimization (GFN2-xTB)")
        );
        assert!(optimized.metadata.contains_key("_audit_creation_date"));

        // 原结构不受影响
        assert_eq!(crystal.name, "test");
        assert_eq!(crystal.atoms[0].u_iso, None);
    }

    #[test]
    fn test_write_optimized_cif_folds_back_end_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let crystal = two_carbon_crystal();

        let gen = "\
2 S
C
1 1   0.00000000   0.00000000   0.00000000
2 1   5.50000000   4.50000000   0.00000000
  0.00000000   0.00000000   0.00000000
 10.00000000   0.00000000   0.00000000
  0.00000000  10.00000000   0.00000000
  0.00000000   0.00000000  10.00000000
";
        fs::write(dir.path().join(GEO_END_FILE), gen).unwrap();

        let path =
            write_optimized_cif(dir.path(), &crystal, XtbMethod::Gfn2Xtb, &OrthogonalCell)
                .unwrap();

        let optimized = parse_cif_content(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!((optimized.atoms[1].fract[0] - 0.55).abs() < 1e-9);
        assert!((optimized.atoms[1].fract[1] - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_parse_gen_coordinates_fractional_flag() {
        let gen = "\
1 F
C
1 1 0.25 0.25 0.5
0.0 0.0 0.0
10.0 0.0 0.0
0.0 10.0 0.0
0.0 0.0 10.0
";
        let (flag, coords) = parse_gen_coordinates(gen).unwrap();
        assert_eq!(flag, 'F');
        assert_eq!(coords, vec![[0.25, 0.25, 0.5]]);
    }
}
