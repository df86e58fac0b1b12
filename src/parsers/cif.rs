//! # CIF 格式解析器
//!
//! 解析晶体学信息文件 (CIF) 格式，并提供反向写出。
//!
//! ## CIF 格式说明
//! ```text
//! data_block_name
//! _cell_length_a    10.000
//! _cell_angle_alpha 90.0
//!
//! loop_
//! _atom_site_label
//! _atom_site_type_symbol
//! _atom_site_fract_x
//! _atom_site_fract_y
//! _atom_site_fract_z
//! C1 C 0.0 0.0 0.0
//! ```
//!
//! 解析按逻辑记录推进：`data_` 行开启新块（多块时后者覆盖前者），
//! `loop_` 行开启表头/数据行收集，列数与表头不符的数据行被静默丢弃，
//! 循环外的键值行进入元数据（六个晶胞几何键除外）。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `engine/` 使用
//! - 使用 `models/structure.rs`

use crate::error::{DftbError, Result};
use crate::models::{AtomSite, Crystal, SymmetryOp};
use base64::Engine as _;
use std::fs;
use std::path::Path;

/// 解码 base64 传输的结构文件内容
pub fn decode_structure_payload(payload: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| DftbError::DecodeError {
            reason: e.to_string(),
        })?;

    String::from_utf8(bytes).map_err(|e| DftbError::DecodeError {
        reason: e.to_string(),
    })
}

/// 将内容编码为 base64 传输形式
pub fn encode_structure_payload(content: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(content.as_bytes())
}

/// 解析 CIF 文件
pub fn parse_cif_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| DftbError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_cif_content(&content)
}

/// 从字符串内容解析 CIF 格式
///
/// 文本中出现多个 `data_` 块时只保留最后一个（后者覆盖前者，
/// 属约定行为）。没有任何 `data_` 声明时解析失败。
pub fn parse_cif_content(content: &str) -> Result<Crystal> {
    let mut current: Option<Crystal> = None;
    let mut in_loop = false;
    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for raw_line in content.lines() {
        let line = raw_line.trim();

        // 跳过空行和注释
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // data_ 块声明：结束进行中的循环，重置所有解析状态
        if line.starts_with("data_") {
            if let Some(ref mut block) = current {
                flush_loop(block, &mut in_loop, &mut headers, &mut rows);
            }
            in_loop = false;
            headers.clear();
            rows.clear();
            current = Some(Crystal::new(line.trim_start_matches("data_")));
            continue;
        }

        // data_ 块之前的内容没有归属，忽略
        let Some(block) = current.as_mut() else {
            continue;
        };

        if line.starts_with("loop_") {
            flush_loop(block, &mut in_loop, &mut headers, &mut rows);
            in_loop = true;
            continue;
        }

        if in_loop {
            if line.starts_with('_') && rows.is_empty() {
                // 表头行：记录字段名（小写便于匹配）
                let name = line.split_whitespace().next().unwrap_or("");
                headers.push(name.to_ascii_lowercase());
                continue;
            }

            if !line.starts_with('_') {
                // 数据行：列数必须与表头数完全一致，否则丢弃
                let fields: Vec<String> =
                    line.split_whitespace().map(|s| s.to_string()).collect();
                if fields.len() == headers.len() {
                    rows.push(fields);
                }
                continue;
            }

            // 数据行之后再次出现键行：循环结束，该行按键值行处理
            flush_loop(block, &mut in_loop, &mut headers, &mut rows);
        }

        handle_key_value(block, line);
    }

    if let Some(ref mut block) = current {
        flush_loop(block, &mut in_loop, &mut headers, &mut rows);
    }

    current.ok_or_else(|| DftbError::FormatError {
        reason: "missing data block declaration".to_string(),
    })
}

/// 轻量预检：在提交作业前检查 CIF 内容的基本要素
pub fn validate_cif_content(content: &str) -> Result<()> {
    if !content.contains("data_") {
        return Err(DftbError::ValidationError(
            "missing data block declaration".to_string(),
        ));
    }

    if !content.contains("_cell_length_") && !content.contains("_cell_angle_") {
        return Err(DftbError::ValidationError(
            "missing cell parameters".to_string(),
        ));
    }

    if !content.contains("_atom_site") && !content.contains("loop_") {
        return Err(DftbError::ValidationError(
            "missing atom site information".to_string(),
        ));
    }

    Ok(())
}

/// 结束进行中的循环，将收集到的表头/数据行写入结构
fn flush_loop(
    block: &mut Crystal,
    in_loop: &mut bool,
    headers: &mut Vec<String>,
    rows: &mut Vec<Vec<String>>,
) {
    if *in_loop && !headers.is_empty() {
        process_loop(block, headers, rows);
    }
    *in_loop = false;
    headers.clear();
    rows.clear();
}

const ATOM_SITE_HEADERS: [&str; 5] = [
    "_atom_site_label",
    "_atom_site_type_symbol",
    "_atom_site_fract_x",
    "_atom_site_fract_y",
    "_atom_site_fract_z",
];

const SYMMETRY_HEADERS: [&str; 3] = [
    "_symmetry_equiv_pos_as_xyz_x",
    "_symmetry_equiv_pos_as_xyz_y",
    "_symmetry_equiv_pos_as_xyz_z",
];

/// 根据表头分类循环：原子位点、对称操作，或无关循环（丢弃）
fn process_loop(block: &mut Crystal, headers: &[String], rows: &[Vec<String>]) {
    if contains_all_headers(headers, &ATOM_SITE_HEADERS) {
        for row in rows {
            let mut atom = AtomSite::new("", "", [0.0, 0.0, 0.0]);

            for (i, header) in headers.iter().enumerate() {
                let value = row[i].as_str();
                match header.as_str() {
                    "_atom_site_label" => atom.label = value.to_string(),
                    "_atom_site_type_symbol" => atom.type_symbol = value.to_string(),
                    "_atom_site_fract_x" => atom.fract[0] = value.parse().unwrap_or(0.0),
                    "_atom_site_fract_y" => atom.fract[1] = value.parse().unwrap_or(0.0),
                    "_atom_site_fract_z" => atom.fract[2] = value.parse().unwrap_or(0.0),
                    "_atom_site_u_iso_or_equiv" => {
                        if let Ok(v) = value.parse() {
                            atom.u_iso = Some(v);
                        }
                    }
                    _ => {}
                }
            }

            block.atoms.push(atom);
        }
        return;
    }

    if contains_all_headers(headers, &SYMMETRY_HEADERS) {
        for row in rows {
            let mut op = SymmetryOp {
                x: String::new(),
                y: String::new(),
                z: String::new(),
            };

            for (i, header) in headers.iter().enumerate() {
                let value = row[i].clone();
                match header.as_str() {
                    "_symmetry_equiv_pos_as_xyz_x" => op.x = value,
                    "_symmetry_equiv_pos_as_xyz_y" => op.y = value,
                    "_symmetry_equiv_pos_as_xyz_z" => op.z = value,
                    _ => {}
                }
            }

            block.symmetry.push(op);
        }
    }
}

fn contains_all_headers(headers: &[String], required: &[&str]) -> bool {
    required.iter().all(|req| headers.iter().any(|h| h == req))
}

/// 处理循环外的键值行
///
/// 六个晶胞几何键写入专用字段（数值不可解析时静默保持 0.0），
/// 其余键值对进入元数据。
fn handle_key_value(block: &mut Crystal, line: &str) {
    let mut parts = line.splitn(2, char::is_whitespace);
    let key = parts.next().unwrap_or("").trim();
    let value = match parts.next() {
        Some(v) => strip_quotes(v.trim()),
        None => return, // 孤立键名，无值可记
    };

    match key {
        "_cell_length_a" => block.cell.a = value.parse().unwrap_or(0.0),
        "_cell_length_b" => block.cell.b = value.parse().unwrap_or(0.0),
        "_cell_length_c" => block.cell.c = value.parse().unwrap_or(0.0),
        "_cell_angle_alpha" => block.cell.alpha = value.parse().unwrap_or(0.0),
        "_cell_angle_beta" => block.cell.beta = value.parse().unwrap_or(0.0),
        "_cell_angle_gamma" => block.cell.gamma = value.parse().unwrap_or(0.0),
        _ => {
            block.metadata.insert(key.to_string(), value);
        }
    }
}

/// 去除成对的单引号或双引号
fn strip_quotes(value: &str) -> String {
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

/// 将 Crystal 写出为 CIF 格式字符串
///
/// 元数据键值（含 `_audit_*` 出处信息）在晶胞参数之前写出；
/// 有对称操作时写对称循环，否则写固定的 P 1 头。
pub fn to_cif_string(crystal: &Crystal) -> String {
    let mut result = String::new();
    result.push_str(&format!("data_{}\n", crystal.name.replace(' ', "_")));

    for (key, value) in &crystal.metadata {
        if value.contains(char::is_whitespace) {
            result.push_str(&format!("{} '{}'\n", key, value));
        } else {
            result.push_str(&format!("{} {}\n", key, value));
        }
    }

    if crystal.symmetry.is_empty() {
        result.push_str("_symmetry_space_group_name_H-M    'P 1'\n");
        result.push_str("_symmetry_Int_Tables_number       1\n");
    }
    result.push('\n');

    result.push_str(&format!("_cell_length_a    {:.6}\n", crystal.cell.a));
    result.push_str(&format!("_cell_length_b    {:.6}\n", crystal.cell.b));
    result.push_str(&format!("_cell_length_c    {:.6}\n", crystal.cell.c));
    result.push_str(&format!("_cell_angle_alpha {:.4}\n", crystal.cell.alpha));
    result.push_str(&format!("_cell_angle_beta  {:.4}\n", crystal.cell.beta));
    result.push_str(&format!("_cell_angle_gamma {:.4}\n\n", crystal.cell.gamma));

    if !crystal.symmetry.is_empty() {
        result.push_str("loop_\n");
        result.push_str("_symmetry_equiv_pos_as_xyz_x\n");
        result.push_str("_symmetry_equiv_pos_as_xyz_y\n");
        result.push_str("_symmetry_equiv_pos_as_xyz_z\n");
        for op in &crystal.symmetry {
            result.push_str(&format!("{} {} {}\n", op.x, op.y, op.z));
        }
        result.push('\n');
    }

    result.push_str("loop_\n");
    result.push_str("_atom_site_label\n");
    result.push_str("_atom_site_type_symbol\n");
    result.push_str("_atom_site_fract_x\n");
    result.push_str("_atom_site_fract_y\n");
    result.push_str("_atom_site_fract_z\n");
    result.push_str("_atom_site_U_iso_or_equiv\n");

    for (i, atom) in crystal.atoms.iter().enumerate() {
        let label = if atom.label.is_empty() {
            format!("{}{}", atom.type_symbol, i + 1)
        } else {
            atom.label.clone()
        };
        result.push_str(&format!(
            "{} {} {:12.8} {:12.8} {:12.8} {:8.6}\n",
            label,
            atom.type_symbol,
            atom.fract[0],
            atom.fract[1],
            atom.fract[2],
            atom.u_iso.unwrap_or(0.01)
        ));
    }

    result
}
