//! # 解析器模块
//!
//! 提供 CIF 结构文件的解析与写出，以及传输编码的解码。
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `engine/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: cif

pub mod cif;

pub use cif::{
    decode_structure_payload, encode_structure_payload, parse_cif_content, parse_cif_file,
    to_cif_string, validate_cif_content,
};
