//! # 引擎输入合成器
//!
//! 将晶体结构与方法/收敛参数转换为 DFTB+ 原生输入：
//! `dftb_in.hsd` 主输入与 `geometry.gen` 几何文件。
//!
//! 晶格向量推导隔离在 `LatticeConvention` 策略之后：默认的正交近似
//! 将分数坐标按各轴晶胞长度缩放；通用三斜变换单独提供，不做静默替换。
//!
//! ## 依赖关系
//! - 被 `engine/runner.rs`, `engine/output.rs` 使用
//! - 使用 `models/structure.rs`, `models/request.rs`

use crate::error::{DftbError, Result};
use crate::models::{Cell, Crystal, Lattice, XtbMethod};

/// 晶格几何约定：晶胞参数与笛卡尔坐标之间的换算策略
pub trait LatticeConvention: Send + Sync {
    /// 由晶胞参数计算 3x3 晶格向量矩阵（行向量 a, b, c）
    fn lattice_vectors(&self, cell: &Cell) -> [[f64; 3]; 3];

    /// 分数坐标 → 笛卡尔坐标
    fn cartesian(&self, cell: &Cell, fract: [f64; 3]) -> [f64; 3];

    /// 笛卡尔坐标 → 分数坐标
    fn fractional(&self, cell: &Cell, cart: [f64; 3]) -> [f64; 3];
}

/// 正交晶胞近似：晶格矩阵为对角阵，坐标换算退化为按轴缩放
///
/// 对 α=β=γ=90° 的晶胞精确；其他晶系下是已知近似。
#[derive(Debug, Clone, Copy, Default)]
pub struct OrthogonalCell;

impl LatticeConvention for OrthogonalCell {
    fn lattice_vectors(&self, cell: &Cell) -> [[f64; 3]; 3] {
        [
            [cell.a, 0.0, 0.0],
            [0.0, cell.b, 0.0],
            [0.0, 0.0, cell.c],
        ]
    }

    fn cartesian(&self, cell: &Cell, fract: [f64; 3]) -> [f64; 3] {
        [fract[0] * cell.a, fract[1] * cell.b, fract[2] * cell.c]
    }

    fn fractional(&self, cell: &Cell, cart: [f64; 3]) -> [f64; 3] {
        [cart[0] / cell.a, cart[1] / cell.b, cart[2] / cell.c]
    }
}

/// 通用三斜变换：标准晶胞参数 → 笛卡尔坐标系
#[derive(Debug, Clone, Copy, Default)]
pub struct TriclinicCell;

impl LatticeConvention for TriclinicCell {
    fn lattice_vectors(&self, cell: &Cell) -> [[f64; 3]; 3] {
        Lattice::from_parameters(cell.a, cell.b, cell.c, cell.alpha, cell.beta, cell.gamma).matrix
    }

    fn cartesian(&self, cell: &Cell, fract: [f64; 3]) -> [f64; 3] {
        let m = self.lattice_vectors(cell);
        [
            fract[0] * m[0][0] + fract[1] * m[1][0] + fract[2] * m[2][0],
            fract[0] * m[0][1] + fract[1] * m[1][1] + fract[2] * m[2][1],
            fract[0] * m[0][2] + fract[1] * m[1][2] + fract[2] * m[2][2],
        ]
    }

    fn fractional(&self, cell: &Cell, cart: [f64; 3]) -> [f64; 3] {
        let m = self.lattice_vectors(cell);
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);

        if det.abs() < 1e-10 {
            return cart; // 奇异矩阵，返回原始
        }

        let inv = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
            ],
        ];

        // 行向量约定：f = c · M⁻¹
        [
            cart[0] * inv[0][0] + cart[1] * inv[1][0] + cart[2] * inv[2][0],
            cart[0] * inv[0][1] + cart[1] * inv[1][1] + cart[2] * inv[2][1],
            cart[0] * inv[0][2] + cart[1] * inv[1][2] + cart[2] * inv[2][2],
        ]
    }
}

/// 一次性派生的引擎输入值
///
/// 由结构计算一次，随即被文件合成消费，不再保留。
#[derive(Debug, Clone)]
pub struct DftbInput {
    pub periodic: bool,

    /// 晶格向量矩阵（行向量）
    pub lattice_vectors: [[f64; 3]; 3],

    /// 元素列表，按首次出现顺序去重
    pub elements: Vec<String>,

    /// 笛卡尔坐标，逐原子，顺序与结构的位点顺序一致
    pub coordinates: Vec<[f64; 3]>,

    /// 每个原子在 `elements` 中的 1 基索引
    pub species: Vec<usize>,

    pub method: XtbMethod,

    /// 力收敛阈值
    pub fmax: f64,

    /// 固定启用力计算
    pub forces: bool,
}

/// 由结构合成引擎输入
pub fn synthesize(
    crystal: &Crystal,
    method: XtbMethod,
    fmax: f64,
    convention: &dyn LatticeConvention,
) -> Result<DftbInput> {
    if crystal.name.is_empty() {
        return Err(DftbError::ValidationError(
            "structure has no name".to_string(),
        ));
    }

    if !crystal.cell.has_lengths() {
        return Err(DftbError::ValidationError(
            "structure has no cell lengths".to_string(),
        ));
    }

    let mut elements: Vec<String> = Vec::new();
    let mut species: Vec<usize> = Vec::new();
    let mut coordinates: Vec<[f64; 3]> = Vec::new();

    for atom in &crystal.atoms {
        let index = match elements.iter().position(|e| e == &atom.type_symbol) {
            Some(i) => i + 1,
            None => {
                elements.push(atom.type_symbol.clone());
                elements.len()
            }
        };
        species.push(index);
        coordinates.push(convention.cartesian(&crystal.cell, atom.fract));
    }

    Ok(DftbInput {
        periodic: true,
        lattice_vectors: convention.lattice_vectors(&crystal.cell),
        elements,
        coordinates,
        species,
        method,
        fmax,
        forces: true,
    })
}

/// 元素的最大角动量壳层
fn max_angular_momentum(element: &str) -> &'static str {
    match element {
        "H" => "s",
        "C" | "N" | "O" | "F" => "p",
        "Si" | "P" | "S" | "Cl" => "d",
        _ => "p",
    }
}

/// 生成 dftb_in.hsd 主输入内容
pub fn hsd_content(input: &DftbInput) -> String {
    let mut content = String::new();

    content.push_str("Geometry = GenFormat {\n");
    content.push_str("  <<< geometry.gen\n");
    content.push_str("}\n\n");

    content.push_str(&format!("Hamiltonian = {} {{\n", input.method));
    content.push_str("  MaxAngularMomentum {\n");
    for element in &input.elements {
        content.push_str(&format!(
            "    {} = {}\n",
            element,
            max_angular_momentum(element)
        ));
    }
    content.push_str("  }\n");
    content.push_str("}\n\n");

    content.push_str("Driver = GeometryOptimization {\n");
    content.push_str("  Convergence = Grad {\n");
    content.push_str(&format!("    MaxForceComponent = {:.6}\n", input.fmax));
    content.push_str("  }\n");
    content.push_str("  MaxSteps = 1000\n");
    content.push_str("  MovedAtoms = 1:-1\n");
    content.push_str("}\n\n");

    content.push_str("Analysis = {\n");
    if input.forces {
        content.push_str("  CalculateForces = Yes\n");
    }
    content.push_str("  PrintEigenvalues = Yes\n");
    content.push_str("  PrintBandStructure = No\n");
    content.push_str("}\n\n");

    content.push_str("Options {\n");
    content.push_str("  WriteDetailedOut = Yes\n");
    content.push_str("  WriteResultsTag = Yes\n");
    content.push_str("}\n");

    content
}

/// 生成 geometry.gen 几何文件内容
///
/// 周期结构使用 "S" 形式：笛卡尔坐标行之后附原点与晶格向量。
pub fn gen_content(input: &DftbInput) -> String {
    let mut content = String::new();

    let flag = if input.periodic { "S" } else { "C" };
    content.push_str(&format!("{} {}\n", input.coordinates.len(), flag));
    content.push_str(&format!("{}\n", input.elements.join(" ")));

    for (i, coord) in input.coordinates.iter().enumerate() {
        content.push_str(&format!(
            "{} {} {:12.8} {:12.8} {:12.8}\n",
            i + 1,
            input.species[i],
            coord[0],
            coord[1],
            coord[2]
        ));
    }

    if input.periodic {
        content.push_str(&format!("{:12.8} {:12.8} {:12.8}\n", 0.0, 0.0, 0.0));
        for row in &input.lattice_vectors {
            content.push_str(&format!(
                "{:12.8} {:12.8} {:12.8}\n",
                row[0], row[1], row[2]
            ));
        }
    }

    content
}
