//! # 晶体结构数据模型
//!
//! 定义从 CIF 解析得到的晶体结构表示：晶胞参数、原子位点、对称操作与
//! 附加元数据。结构一经解析不再修改；优化后的结构总是新建实例。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `engine/` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 晶胞参数（长度单位 Å，角度单位度）
///
/// 解析失败的数值保持为 0.0，由下游校验拦截。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Cell {
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        Cell {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
        }
    }

    /// 三个晶胞长度是否均已给出
    pub fn has_lengths(&self) -> bool {
        self.a > 0.0 && self.b > 0.0 && self.c > 0.0
    }

    /// 晶胞长度数组 [a, b, c]
    pub fn lengths(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }
}

/// 原子位点
///
/// 顺序在整条流水线中保持不变：元素-坐标对应关系由位点顺序决定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomSite {
    /// 位点标签（在同一结构内约定唯一，如 "C1"）
    pub label: String,

    /// 元素符号
    pub type_symbol: String,

    /// 分数坐标 [x, y, z]，约定范围 [0, 1) 但不强制
    pub fract: [f64; 3],

    /// 可选：各向同性位移参数
    pub u_iso: Option<f64>,
}

impl AtomSite {
    pub fn new(label: impl Into<String>, type_symbol: impl Into<String>, fract: [f64; 3]) -> Self {
        AtomSite {
            label: label.into(),
            type_symbol: type_symbol.into(),
            fract,
            u_iso: None,
        }
    }

    pub fn with_u_iso(mut self, u_iso: f64) -> Self {
        self.u_iso = Some(u_iso);
        self
    }
}

/// 对称操作（xyz 位置表达式，保持原始字符串）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetryOp {
    pub x: String,
    pub y: String,
    pub z: String,
}

/// 晶体结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称（data_ 块名）
    pub name: String,

    /// 晶胞参数
    pub cell: Cell,

    /// 原子位点列表（顺序即解析顺序）
    pub atoms: Vec<AtomSite>,

    /// 对称操作列表
    pub symmetry: Vec<SymmetryOp>,

    /// 未识别的键值对元数据
    pub metadata: BTreeMap<String, String>,
}

impl Crystal {
    pub fn new(name: impl Into<String>) -> Self {
        Crystal {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.type_symbol.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// 晶格向量矩阵表示
///
/// 行向量表示 a, b, c：[[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lattice {
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶胞参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let alpha_rad = alpha.to_radians();
        let beta_rad = beta.to_radians();
        let gamma_rad = gamma.to_radians();

        let cos_alpha = alpha_rad.cos();
        let cos_beta = beta_rad.cos();
        let cos_gamma = gamma_rad.cos();
        let sin_gamma = gamma_rad.sin();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();
        let c_vec = [c1, c2, c3];

        Lattice {
            matrix: [a_vec, b_vec, c_vec],
        }
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let a_vec = self.matrix[0];
        let b_vec = self.matrix[1];
        let c_vec = self.matrix[2];

        let a = (a_vec[0].powi(2) + a_vec[1].powi(2) + a_vec[2].powi(2)).sqrt();
        let b = (b_vec[0].powi(2) + b_vec[1].powi(2) + b_vec[2].powi(2)).sqrt();
        let c = (c_vec[0].powi(2) + c_vec[1].powi(2) + c_vec[2].powi(2)).sqrt();

        let dot_bc: f64 = b_vec.iter().zip(c_vec.iter()).map(|(x, y)| x * y).sum();
        let dot_ac: f64 = a_vec.iter().zip(c_vec.iter()).map(|(x, y)| x * y).sum();
        let dot_ab: f64 = a_vec.iter().zip(b_vec.iter()).map(|(x, y)| x * y).sum();

        let alpha = (dot_bc / (b * c)).acos().to_degrees();
        let beta = (dot_ac / (a * c)).acos().to_degrees();
        let gamma = (dot_ab / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }
}
