//! # 数据模型模块
//!
//! 定义晶体结构、请求/响应记录与计算结果数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `engine/`, `commands/` 使用
//! - 子模块: structure, request, result

pub mod request;
pub mod result;
pub mod structure;

pub use request::{OptimizationRequest, OptimizationResponse, ResponseStatus, XtbMethod};
pub use result::{DipoleMoment, ResultRecord};
pub use structure::{AtomSite, Cell, Crystal, Lattice, SymmetryOp};
