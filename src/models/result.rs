//! # 计算结果数据模型
//!
//! 存储从 DFTB+ 输出工件提取的结果记录：状态摘要、收敛信息、
//! 两套单位制的能量映射与电子性质。
//!
//! ## 依赖关系
//! - 被 `engine/output.rs` 和 `commands/` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 计算状态摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub warnings: Vec<String>,

    /// "converged" 或 "not_converged"
    pub convergence_status: String,

    /// "completed" 或 "failed"
    pub calculation_status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 自洽场收敛信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceInfo {
    pub scc_converged: bool,
}

/// 偶极矩分量（Debye）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DipoleMoment {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// 电子性质
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElectronicProperties {
    #[serde(rename = "fermi_level_eV", skip_serializing_if = "Option::is_none")]
    pub fermi_level_ev: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_charge: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dipole_moment_debye: Option<DipoleMoment>,
}

impl ElectronicProperties {
    pub fn is_empty(&self) -> bool {
        self.fermi_level_ev.is_none()
            && self.total_charge.is_none()
            && self.dipole_moment_debye.is_none()
    }
}

/// 一次完成作业的结构化结果
///
/// 能量映射使用 BTreeMap，键序固定，同一工件重复解析产生
/// 逐位一致的记录。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub summary: Summary,

    pub convergence_info: ConvergenceInfo,

    #[serde(rename = "energies_eV")]
    pub energies_ev: BTreeMap<String, f64>,

    pub energies_hartree: BTreeMap<String, f64>,

    #[serde(skip_serializing_if = "ElectronicProperties::is_empty", default)]
    pub electronic_properties: ElectronicProperties,
}

impl ResultRecord {
    /// 总能量（eV），若存在
    pub fn total_energy_ev(&self) -> Option<f64> {
        self.energies_ev.get("total").copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_record_json_keys() {
        let mut record = ResultRecord::default();
        record.summary.convergence_status = "converged".to_string();
        record.summary.calculation_status = "completed".to_string();
        record.convergence_info.scc_converged = true;
        record.energies_ev.insert("total".to_string(), -100.0);
        record.energies_hartree.insert("total".to_string(), -3.6749);
        record.electronic_properties.fermi_level_ev = Some(-5.0);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"energies_eV\""));
        assert!(json.contains("\"fermi_level_eV\""));
        assert!(json.contains("\"scc_converged\":true"));
    }

    #[test]
    fn test_total_energy_accessor() {
        let mut record = ResultRecord::default();
        assert!(record.total_energy_ev().is_none());

        record.energies_ev.insert("total".to_string(), -115.44);
        assert_eq!(record.total_energy_ev(), Some(-115.44));
    }

    #[test]
    fn test_empty_electronic_properties_skipped() {
        let record = ResultRecord::default();
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("electronic_properties"));
    }
}
